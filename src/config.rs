use crate::{backoff::BackoffConfig, error::ConfigError};
use core::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
	/// The polled resource.
	pub data_path: String,
	/// `id` of the element that is replaced on each render.
	pub content_id: String,
	pub backoff: BackoffConfig,
}

impl Default for ConsoleConfig {
	fn default() -> Self {
		Self {
			data_path: "/api/data".to_owned(),
			content_id: "content".to_owned(),
			backoff: BackoffConfig::default(),
		}
	}
}

impl ConsoleConfig {
	/// Applies overrides from `lookup`, which is queried for
	/// `poll-path`, `min-fetch-interval`, `max-fetch-interval` (milliseconds) and `discard-superseded` (`true`/`false`).
	///
	/// # Errors
	///
	/// Iff a value doesn't parse or the resulting intervals are invalid.
	pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		if let Some(path) = lookup("poll-path") {
			self.data_path = path;
		}

		let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
			match lookup(key) {
				None => Ok(default),
				Some(value) => value
					.trim()
					.parse()
					.map(Duration::from_millis)
					.map_err(|_| ConfigError::InvalidValue { key, value }),
			}
		};
		let min_interval = millis("min-fetch-interval", self.backoff.min_interval())?;
		let max_interval = millis("max-fetch-interval", self.backoff.max_interval())?;

		let discard_superseded = match lookup("discard-superseded") {
			None => self.backoff.discards_superseded(),
			Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
				key: "discard-superseded",
				value,
			})?,
		};

		self.backoff = BackoffConfig::new(min_interval, max_interval)?.discard_superseded(discard_superseded);
		Ok(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
		move |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v).to_owned())
	}

	#[test]
	fn no_overrides() {
		assert_eq!(ConsoleConfig::default().with_overrides(lookup(&[])), Ok(ConsoleConfig::default()));
	}

	#[test]
	fn overrides() {
		let config = ConsoleConfig::default()
			.with_overrides(lookup(&[
				("poll-path", "/api/v2/data"),
				("min-fetch-interval", "250"),
				("max-fetch-interval", " 4000 "),
				("discard-superseded", "true"),
			]))
			.unwrap();
		assert_eq!(config.data_path, "/api/v2/data");
		assert_eq!(config.backoff.min_interval(), Duration::from_millis(250));
		assert_eq!(config.backoff.max_interval(), Duration::from_millis(4000));
		assert!(config.backoff.discards_superseded());
	}

	#[test]
	fn bad_values() {
		assert_eq!(
			ConsoleConfig::default().with_overrides(lookup(&[("min-fetch-interval", "soon")])),
			Err(ConfigError::InvalidValue {
				key: "min-fetch-interval",
				value: "soon".to_owned(),
			})
		);
		assert_eq!(
			ConsoleConfig::default().with_overrides(lookup(&[("max-fetch-interval", "100")])),
			Err(ConfigError::InvertedBounds { min_ms: 500, max_ms: 100 })
		);
	}
}
