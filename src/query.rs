//! Flat key-value query strings, as found in `location.search`.
//!
//! Decoding accepts both `&` and `;` as pair separators and percent-decodes keys and values.
//! Encoding percent-encodes and always joins with `;`.
//!
//! ```
//! use stagger_web::query::{emit_query_string, parse_query_string};
//!
//! let query = parse_query_string("?b=2&a=1;flag");
//! assert_eq!(query["a"], "1");
//! assert_eq!(query["flag"], "");
//! assert_eq!(emit_query_string(&query), "a=1;b=2;flag=");
//! ```

use std::{borrow::Cow, collections::BTreeMap};
use tracing::trace;

/// Decoded query parameters.
///
/// Repeated keys are not collected: the last occurrence wins.
pub type Query = BTreeMap<String, String>;

#[must_use]
pub fn parse_query_string(query_string: &str) -> Query {
	let query_string = query_string.strip_prefix('?').unwrap_or(query_string);

	let mut query = Query::new();
	for token in query_string.split(&['&', ';'][..]) {
		if token.is_empty() {
			continue;
		}

		let mut split = token.splitn(2, '=');
		let name = decode_component(split.next().unwrap_or_default());
		let value = decode_component(split.next().unwrap_or_default());

		if name.is_empty() {
			trace!("Skipping query token without a name.");
			continue;
		}

		query.insert(name.into_owned(), value.into_owned());
	}
	query
}

#[must_use]
pub fn emit_query_string(query: &Query) -> String {
	query
		.iter()
		.map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
		.collect::<Vec<_>>()
		.join(";")
}

/// Percent-decodes one key or value.
///
/// Malformed input (a decoded byte sequence that isn't UTF-8) is kept verbatim.
fn decode_component(component: &str) -> Cow<'_, str> {
	match urlencoding::decode(component) {
		Ok(decoded) => decoded,
		Err(_) => {
			trace!("Query component is not valid percent-encoded UTF-8; keeping it as-is.");
			Cow::Borrowed(component)
		}
	}
}
