//! Artifact records as they appear in the snapshot, tagged by their `type` field.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Container {
	#[serde(default)]
	pub registry_url: Option<String>,
	pub repository: String,
	pub image_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct File {
	pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Maven {
	#[serde(default)]
	pub repository_url: Option<String>,
	pub group_id: String,
	pub artifact_id: String,
	pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rpm {
	#[serde(default)]
	pub repository_url: Option<String>,
	pub name: String,
	pub version: String,
	pub release: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
	Container(Container),
	File(File),
	Maven(Maven),
	Rpm(Rpm),
	/// An unrecognized `type`, or a known one that lacks required fields.
	Unknown { kind: Option<String> },
}

impl Artifact {
	/// Never fails: anything that doesn't fit a known kind becomes [`Artifact::Unknown`].
	#[must_use]
	pub fn from_value(value: &Value) -> Self {
		let kind = value.get("type").and_then(Value::as_str);
		let parsed = match kind {
			Some("container") => Container::deserialize(value).map(Self::Container),
			Some("file") => File::deserialize(value).map(Self::File),
			Some("maven") => Maven::deserialize(value).map(Self::Maven),
			Some("rpm") => Rpm::deserialize(value).map(Self::Rpm),
			_ => return Self::unknown(kind),
		};
		parsed.unwrap_or_else(|_| Self::unknown(kind))
	}

	fn unknown(kind: Option<&str>) -> Self {
		Self::Unknown { kind: kind.map(ToOwned::to_owned) }
	}

	/// The `type` tag as found in the snapshot.
	#[must_use]
	pub fn kind(&self) -> Option<&str> {
		match self {
			Self::Container(_) => Some("container"),
			Self::File(_) => Some("file"),
			Self::Maven(_) => Some("maven"),
			Self::Rpm(_) => Some("rpm"),
			Self::Unknown { kind } => kind.as_deref(),
		}
	}

	/// A short human-readable identifier, or `"-"` if there is none.
	#[must_use]
	pub fn coordinates(&self) -> String {
		match self {
			Self::Container(container) => format!("{}/{}", container.repository, container.image_id),
			Self::File(file) => file_name(&file.url).unwrap_or("-").to_owned(),
			Self::Maven(maven) => format!("{}:{}:{}", maven.group_id, maven.artifact_id, maven.version),
			Self::Rpm(rpm) => format!("{}-{}-{}", rpm.name, rpm.version, rpm.release),
			Self::Unknown { .. } => "-".to_owned(),
		}
	}
}

/// The last path segment of an absolute URL, which may be empty.
fn file_name(url: &str) -> Option<&str> {
	let (scheme, rest) = url.split_at(url.find("://")?);
	if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
		return None;
	}
	let rest = &rest["://".len()..];
	let rest = &rest[..rest.find(&['?', '#'][..]).unwrap_or_else(|| rest.len())];
	let path = &rest[rest.find('/').unwrap_or_else(|| rest.len())..];
	Some(&path[path.rfind('/').map_or(0, |slash| slash + 1)..])
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn coordinates_by_kind() {
		let cases = [
			(json!({"type": "container", "repository": "stagger", "image_id": "abc123"}), "stagger/abc123"),
			(json!({"type": "file", "url": "https://example.net/dist/stagger-1.0.tar.gz?sig=x"}), "stagger-1.0.tar.gz"),
			(json!({"type": "maven", "group_id": "org.example", "artifact_id": "stagger", "version": "1.0"}), "org.example:stagger:1.0"),
			(json!({"type": "rpm", "name": "stagger", "version": "1.0", "release": "2.fc33"}), "stagger-1.0-2.fc33"),
			(json!({"type": "deb", "name": "stagger"}), "-"),
		];
		for (value, expected) in &cases {
			assert_eq!(Artifact::from_value(value).coordinates(), *expected, "{}", value);
		}
	}

	#[test]
	fn relative_file_url_has_no_coordinates() {
		let artifact = Artifact::from_value(&json!({"type": "file", "url": "dist/stagger.tar.gz"}));
		assert_eq!(artifact.coordinates(), "-");
	}

	#[test]
	fn file_url_without_path() {
		assert_eq!(file_name("https://example.net"), Some(""));
		assert_eq!(file_name("https://example.net/"), Some(""));
	}

	#[test]
	fn incomplete_known_kind_is_unknown() {
		let artifact = Artifact::from_value(&json!({"type": "maven", "group_id": "org.example"}));
		assert_eq!(artifact, Artifact::Unknown { kind: Some("maven".to_owned()) });
		assert_eq!(artifact.kind(), Some("maven"));
	}

	#[test]
	fn missing_type() {
		assert_eq!(Artifact::from_value(&json!({"url": "https://x/y"})), Artifact::Unknown { kind: None });
	}
}
