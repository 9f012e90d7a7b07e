//! Chooses and renders a page for the current request.

use crate::{navigation::NavigationRequest, pages, view::View};
use serde_json::Value;
use tracing::{trace, warn};

/// Coordinates of a tag, taken from path segments without validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagKey {
	pub repo: String,
	pub branch: String,
	pub tag: String,
}

impl TagKey {
	/// `repo/branch/tag`
	#[must_use]
	pub fn display_name(&self) -> String {
		format!("{}/{}/{}", self.repo, self.branch, self.tag)
	}

	#[must_use]
	pub fn page_path(&self) -> String {
		format!("/tags/{}", self.display_name())
	}

	/// The tag's record in `snapshot`, if present.
	#[must_use]
	pub fn lookup<'a>(&self, snapshot: &'a Value) -> Option<&'a Value> {
		snapshot
			.get("repos")?
			.get(&self.repo)?
			.get("branches")?
			.get(&self.branch)?
			.get("tags")?
			.get(&self.tag)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactKey {
	pub tag: TagKey,
	pub artifact: String,
}

impl ArtifactKey {
	#[must_use]
	pub fn page_path(&self) -> String {
		format!("/artifacts/{}/{}", self.tag.display_name(), self.artifact)
	}

	#[must_use]
	pub fn lookup<'a>(&self, snapshot: &'a Value) -> Option<&'a Value> {
		self.tag.lookup(snapshot)?.get("artifacts")?.get(&self.artifact)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
	Main,
	Tag(TagKey),
	Artifact(ArtifactKey),
}

impl Route {
	/// Dispatches on the first path segment. Missing segments become empty ids.
	#[must_use]
	pub fn from_path(path: &str) -> Self {
		let mut segments = path.split('/').skip(1);
		let prefix = segments.next().unwrap_or_default();
		let mut next = || segments.next().unwrap_or_default().to_owned();

		match prefix {
			"tags" => Self::Tag(TagKey {
				repo: next(),
				branch: next(),
				tag: next(),
			}),
			"artifacts" => Self::Artifact(ArtifactKey {
				tag: TagKey {
					repo: next(),
					branch: next(),
					tag: next(),
				},
				artifact: next(),
			}),
			_ => Self::Main,
		}
	}
}

/// Where the console is served from, for building absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
	/// `scheme://host[:port]`
	pub origin: String,
	pub hostname: String,
}

impl Default for Site {
	fn default() -> Self {
		Self {
			origin: "http://localhost:8080".to_owned(),
			hostname: "localhost".to_owned(),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct ViewRouter {
	site: Site,
}

impl ViewRouter {
	#[must_use]
	pub fn new(site: Site) -> Self {
		Self { site }
	}

	#[must_use]
	pub fn site(&self) -> &Site {
		&self.site
	}

	/// Renders the complete `#content` subtree for `request`.
	///
	/// Never waits for data: without a `snapshot`, the page degrades to an empty or loading state.
	#[must_use]
	pub fn render(&self, request: &NavigationRequest, snapshot: Option<&Value>) -> View {
		let route = Route::from_path(&request.path);
		trace!(?route, has_snapshot = snapshot.is_some(), "Rendering.");

		let page = match (&route, snapshot) {
			(Route::Main, snapshot) => pages::main(snapshot),
			(Route::Tag(_), None) | (Route::Artifact(_), None) => pages::loading(),
			(Route::Tag(key), Some(snapshot)) => match key.lookup(snapshot) {
				Some(tag) => pages::tag(&self.site, key, tag),
				None => {
					warn!(tag = key.display_name().as_str(), "Tag not found in snapshot.");
					pages::not_found(&format!("Tag {}", key.display_name()))
				}
			},
			(Route::Artifact(key), Some(snapshot)) => match key.lookup(snapshot) {
				Some(artifact) => pages::artifact(&self.site, key, artifact),
				None => {
					warn!(artifact = key.artifact.as_str(), "Artifact not found in snapshot.");
					pages::not_found(&format!("Artifact {}", key.artifact))
				}
			},
		};
		page.attribute("id", "content").into()
	}
}
