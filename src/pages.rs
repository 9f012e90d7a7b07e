//! Page templates. Each returns the element that becomes `#content`.

use crate::{
	artifact::Artifact,
	router::{ArtifactKey, Site, TagKey},
	view::{element, field_table, json_block, link, navigation_link, optional_link, table, Element, View},
};
use serde_json::Value;

const TITLE: &str = "Stagger";
const EVENT_PORT: u16 = 5672;

fn string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
	value.get(key).and_then(Value::as_str)
}

fn entries<'a>(value: Option<&'a Value>) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
	value.and_then(Value::as_object).into_iter().flatten()
}

/// Commit ids longer than eight characters are cut to seven.
fn commit_link(href: Option<&str>, id: Option<&str>) -> View {
	let short = id.map(|id| match id.char_indices().nth(7) {
		Some((end, _)) if id.chars().count() > 8 => &id[..end],
		_ => id,
	});
	optional_link(href, short, "-")
}

/// Breadcrumbs: every entry but the last is a link.
fn header(content: &mut Element, title: &str, trail: &[(&str, &str)], current: &str) {
	let mut nav = element("nav").attribute("class", "context");
	for (href, text) in trail {
		nav.push(navigation_link(href, *text));
		nav.push(" \u{a0}>\u{a0} ");
	}
	nav.push(current);
	content.push(nav);
	content.push(element("h1").text(title));
}

fn footer(content: &mut Element) {
	content.push(element("nav").attribute("class", "footer").child(link("/docs.html", "Documentation")));
}

fn commands(content: &mut Element, api_url: &str, event_url: &str) {
	let code = |text: String| View::from(element("code").text(text));
	content.push(element("h2").text("Example commands"));
	content.push(field_table(vec![
		("Get data", code(format!("curl {}", api_url))),
		("Create or update", code(format!("curl -X PUT {} -d @data.json", api_url))),
		("Delete", code(format!("curl -X DELETE {}", api_url))),
		("Check for updates", code(format!("curl --head -H 'If-None-Match: <etag>' {}", api_url))),
		("Listen for events", code(format!("qreceive {}", event_url))),
	]));
}

/// API and event URLs for a resource below `repos/`.
fn resource_urls(site: &Site, key: &TagKey, artifact: Option<&str>) -> (String, String) {
	let mut api_path = format!("api/repos/{}/branches/{}/tags/{}", key.repo, key.branch, key.tag);
	let mut event_path = format!("events/{}", key.display_name());
	if let Some(artifact) = artifact {
		api_path = format!("{}/artifacts/{}", api_path, artifact);
		event_path = format!("{}/{}", event_path, artifact);
	}
	(
		format!("{}/{}", site.origin, api_path),
		format!("amqp://{}:{}/{}", site.hostname, EVENT_PORT, event_path),
	)
}

/// Every tag in the snapshot. An absent snapshot renders an empty table.
#[must_use]
pub fn main(snapshot: Option<&Value>) -> Element {
	let mut rows = Vec::new();
	for (repo_id, repo) in entries(snapshot.and_then(|snapshot| snapshot.get("repos"))) {
		for (branch_id, branch) in entries(repo.get("branches")) {
			for (tag_id, tag) in entries(branch.get("tags")) {
				let key = TagKey {
					repo: repo_id.clone(),
					branch: branch_id.clone(),
					tag: tag_id.clone(),
				};
				rows.push(vec![
					navigation_link(&key.page_path(), key.display_name()).into(),
					optional_link(string(tag, "build_url"), string(tag, "build_id"), "-"),
					commit_link(string(tag, "commit_url"), string(tag, "commit_id")),
					"-".into(),
				]);
			}
		}
	}

	let mut content = element("div");
	content.push(element("h1").text(TITLE));
	content.push(table(&["Tag", "Build", "Commit", "Updated"], rows));
	footer(&mut content);
	content
}

#[must_use]
pub fn tag(site: &Site, key: &TagKey, data: &Value) -> Element {
	let name = key.display_name();
	let (api_url, event_url) = resource_urls(site, key, None);

	let mut content = element("div");
	header(&mut content, &name, &[("/", TITLE)], &format!("Tag {}", name));

	content.push(element("h2").text("Properties"));
	content.push(field_table(vec![
		("API URL", link(&api_url, api_url.as_str()).into()),
		("Event URL", link(&event_url, event_url.as_str()).into()),
		("Build", optional_link(string(data, "build_url"), string(data, "build_id"), "-")),
		("Commit", optional_link(string(data, "commit_url"), string(data, "commit_id"), "-")),
		("Updated", "-".into()),
	]));

	content.push(element("h2").text("Artifacts"));
	let rows: Vec<Vec<View>> = entries(data.get("artifacts"))
		.map(|(artifact_id, value)| {
			let key = ArtifactKey {
				tag: key.clone(),
				artifact: artifact_id.clone(),
			};
			let artifact = Artifact::from_value(value);
			vec![
				View::from(navigation_link(&key.page_path(), artifact_id.as_str())),
				artifact.kind().unwrap_or("-").into(),
				artifact.coordinates().into(),
			]
		})
		.collect();
	content.push(table(&["Artifacts", "Type", "Coordinates"], rows));

	commands(&mut content, &api_url, &event_url);

	content.push(element("h2").text("Data"));
	content.push(json_block(data));
	footer(&mut content);
	content
}

#[must_use]
pub fn artifact(site: &Site, key: &ArtifactKey, data: &Value) -> Element {
	let tag_name = key.tag.display_name();
	let (api_url, event_url) = resource_urls(site, &key.tag, Some(key.artifact.as_str()));
	let artifact = Artifact::from_value(data);

	let tag_path = key.tag.page_path();
	let tag_title = format!("Tag {}", tag_name);

	let mut content = element("div");
	header(
		&mut content,
		&key.artifact,
		&[("/", TITLE), (tag_path.as_str(), tag_title.as_str())],
		&format!("Artifact {}", key.artifact),
	);

	content.push(element("h2").text("Properties"));
	let url_link = |url: Option<&str>| optional_link(url, url, "-");
	let mut fields: Vec<(&str, View)> = vec![
		("API URL", link(&api_url, api_url.as_str()).into()),
		("Event URL", link(&event_url, event_url.as_str()).into()),
		("Type", artifact.kind().unwrap_or("-").into()),
	];
	match &artifact {
		Artifact::Container(container) => fields.extend(vec![
			("Registry URL", url_link(container.registry_url.as_deref())),
			("Repository", container.repository.as_str().into()),
			("Image", container.image_id.as_str().into()),
		]),
		Artifact::File(file) => fields.push(("URL", url_link(Some(file.url.as_str())))),
		Artifact::Maven(maven) => fields.extend(vec![
			("Repository URL", url_link(maven.repository_url.as_deref())),
			("Group", maven.group_id.as_str().into()),
			("Artifact", maven.artifact_id.as_str().into()),
			("Version", maven.version.as_str().into()),
		]),
		Artifact::Rpm(rpm) => fields.extend(vec![
			("Repository URL", url_link(rpm.repository_url.as_deref())),
			("Name", rpm.name.as_str().into()),
			("Version", rpm.version.as_str().into()),
			("Release", rpm.release.as_str().into()),
		]),
		Artifact::Unknown { .. } => (),
	}
	fields.push(("Updated", "-".into()));
	content.push(field_table(fields));

	commands(&mut content, &api_url, &event_url);

	content.push(element("h2").text("Data"));
	content.push(json_block(data));
	footer(&mut content);
	content
}

/// Shown for deep links before the first snapshot arrived.
#[must_use]
pub fn loading() -> Element {
	element("div").child(element("p").attribute("class", "loading").text("Loading\u{2026}"))
}

/// Shown when path ids don't exist in the current snapshot.
#[must_use]
pub fn not_found(what: &str) -> Element {
	let mut content = element("div");
	header(&mut content, "Not found", &[("/", TITLE)], "Not found");
	content.push(element("p").text(format!("{} does not exist (anymore).", what)));
	footer(&mut content);
	content
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn commit_ids_are_shortened() {
		assert_eq!(commit_link(None, Some("0123456789abcdef")).text_content(), "0123456");
		assert_eq!(commit_link(None, Some("01234567")).text_content(), "01234567");
		assert_eq!(commit_link(None, Some("012345678")).text_content(), "0123456");
		assert_eq!(commit_link(None, None).text_content(), "-");
	}

	#[test]
	fn resource_urls_for_artifacts() {
		let key = TagKey {
			repo: "r".to_owned(),
			branch: "b".to_owned(),
			tag: "t".to_owned(),
		};
		let site = Site {
			origin: "https://stagger.example".to_owned(),
			hostname: "stagger.example".to_owned(),
		};
		assert_eq!(
			resource_urls(&site, &key, Some("a")),
			(
				"https://stagger.example/api/repos/r/branches/b/tags/t/artifacts/a".to_owned(),
				"amqp://stagger.example:5672/events/r/b/t/a".to_owned(),
			)
		);
	}
}
