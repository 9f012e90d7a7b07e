//! An owned markup tree that replaces the page content wholesale on each render.

use core::fmt::{self, Display, Formatter, Write as _};
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer, Value};

/// Anchors carrying this attribute are handled as in-app navigation.
pub const NAVIGATE_ATTRIBUTE: &str = "data-navigate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
	Element(Element),
	Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	pub name: &'static str,
	pub attributes: Vec<(&'static str, String)>,
	pub children: Vec<View>,
}

impl Element {
	#[must_use]
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			attributes: Vec::new(),
			children: Vec::new(),
		}
	}

	#[must_use]
	pub fn attribute(mut self, name: &'static str, value: impl Into<String>) -> Self {
		self.attributes.push((name, value.into()));
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<View>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn text(self, text: impl Into<String>) -> Self {
		self.child(View::Text(text.into()))
	}

	pub fn push(&mut self, child: impl Into<View>) {
		self.children.push(child.into());
	}

	#[must_use]
	pub fn get_attribute(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|(n, _)| *n == name).map(|(_, value)| value.as_str())
	}
}

impl From<Element> for View {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}

impl From<&str> for View {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}

impl From<String> for View {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

impl View {
	#[must_use]
	pub fn as_element(&self) -> Option<&Element> {
		match self {
			Self::Element(element) => Some(element),
			Self::Text(_) => None,
		}
	}

	/// Concatenated text of this subtree.
	#[must_use]
	pub fn text_content(&self) -> String {
		let mut text = String::new();
		self.collect_text(&mut text);
		text
	}

	fn collect_text(&self, text: &mut String) {
		match self {
			Self::Text(t) => text.push_str(t),
			Self::Element(element) => element.children.iter().for_each(|child| child.collect_text(text)),
		}
	}

	/// All elements in document order, including `self`.
	#[must_use]
	pub fn elements(&self) -> Vec<&Element> {
		let mut elements = Vec::new();
		let mut stack = vec![self];
		while let Some(view) = stack.pop() {
			if let Self::Element(element) = view {
				elements.push(element);
				stack.extend(element.children.iter().rev());
			}
		}
		elements
	}

	/// The `href`s of all in-app navigation links.
	#[must_use]
	pub fn navigation_targets(&self) -> Vec<&str> {
		self.elements()
			.into_iter()
			.filter(|element| element.name == "a" && element.get_attribute(NAVIGATE_ATTRIBUTE).is_some())
			.filter_map(|element| element.get_attribute("href"))
			.collect()
	}
}

/// Renders escaped HTML.
impl Display for View {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Text(text) => write_escaped(f, text),
			Self::Element(element) => {
				write!(f, "<{}", element.name)?;
				for (name, value) in &element.attributes {
					write!(f, " {}=\"", name)?;
					write_escaped(f, value)?;
					f.write_char('"')?;
				}
				f.write_char('>')?;
				for child in &element.children {
					write!(f, "{}", child)?;
				}
				write!(f, "</{}>", element.name)
			}
		}
	}
}

fn write_escaped(f: &mut Formatter<'_>, text: &str) -> fmt::Result {
	for c in text.chars() {
		match c {
			'&' => f.write_str("&amp;")?,
			'<' => f.write_str("&lt;")?,
			'>' => f.write_str("&gt;")?,
			'"' => f.write_str("&quot;")?,
			c => f.write_char(c)?,
		}
	}
	Ok(())
}

#[must_use]
pub fn element(name: &'static str) -> Element {
	Element::new(name)
}

/// A plain link, followed by the browser.
#[must_use]
pub fn link(href: &str, text: impl Into<String>) -> Element {
	element("a").attribute("href", href).text(text)
}

/// A link that navigates within the page.
#[must_use]
pub fn navigation_link(href: &str, text: impl Into<String>) -> Element {
	link(href, text).attribute(NAVIGATE_ATTRIBUTE, "")
}

/// A link if there's an `href`, otherwise just text. Missing text is replaced with `fallback`.
#[must_use]
pub fn optional_link(href: Option<&str>, text: Option<&str>, fallback: &str) -> View {
	let text = text.filter(|text| !text.is_empty()).unwrap_or(fallback);
	match href.filter(|href| !href.is_empty()) {
		Some(href) => link(href, text).into(),
		None => text.into(),
	}
}

#[must_use]
pub fn table(headings: &[&str], rows: Vec<Vec<View>>) -> Element {
	let mut head_row = element("tr");
	for heading in headings {
		head_row.push(element("th").text(*heading));
	}

	let mut body = element("tbody");
	for row in rows {
		let mut tr = element("tr");
		for cell in row {
			tr.push(element("td").child(cell));
		}
		body.push(tr);
	}

	element("table").child(element("thead").child(head_row)).child(body)
}

/// A two-column table of labelled values.
#[must_use]
pub fn field_table(fields: Vec<(&str, View)>) -> Element {
	let mut body = element("tbody");
	for (label, value) in fields {
		body.push(element("tr").child(element("th").text(label)).child(element("td").child(value)));
	}
	element("table").attribute("class", "fields").child(body)
}

/// Pretty-printed JSON with four-space indentation.
#[must_use]
pub fn json_block(value: &Value) -> Element {
	let mut buffer = Vec::new();
	let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
	let json = match value.serialize(&mut serializer) {
		Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
		Err(_) => value.to_string(),
	};
	element("pre").attribute("class", "json").text(json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn display_escapes() {
		let view: View = link("/a?b=1&c=\"2\"", "<x>").into();
		assert_eq!(view.to_string(), "<a href=\"/a?b=1&amp;c=&quot;2&quot;\">&lt;x&gt;</a>");
	}

	#[test]
	fn optional_link_fallback() {
		assert_eq!(optional_link(None, None, "-"), View::Text("-".to_owned()));
		assert_eq!(optional_link(Some(""), Some("b1"), "-"), View::Text("b1".to_owned()));
		assert_eq!(optional_link(Some("https://ci/b1"), Some(""), "-").text_content(), "-");
	}

	#[test]
	fn json_block_indents_four_spaces() {
		let block = json_block(&json!({"a": 1}));
		assert_eq!(View::from(block).text_content(), "{\n    \"a\": 1\n}");
	}

	#[test]
	fn navigation_targets_skip_plain_links() {
		let view: View = element("nav").child(navigation_link("/", "Stagger")).child(link("/docs.html", "Documentation")).into();
		assert_eq!(view.navigation_targets(), ["/"]);
	}
}
