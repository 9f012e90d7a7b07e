//! Error types.

use thiserror::Error;

/// A request that did not produce a usable response.
///
/// Recovered locally by the poller: the cycle keeps running and backoff keeps growing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// No response was received at all.
	#[error("request failed: {message}")]
	Network { message: String },

	/// A response arrived, but with a status that is neither 2xx nor 304.
	#[error("unexpected status {status}")]
	Status { status: u16 },
}

/// Why a single conditional fetch did not yield a document.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// A 2xx body that isn't valid JSON.
	#[error("malformed JSON document: {0}")]
	Decode(#[from] serde_json::Error),
}

impl FetchError {
	#[must_use]
	pub fn is_decode(&self) -> bool {
		matches!(self, Self::Decode(_))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	#[error("the minimum fetch interval must be positive")]
	ZeroInterval,

	#[error("the minimum fetch interval ({min_ms} ms) exceeds the maximum ({max_ms} ms)")]
	InvertedBounds { min_ms: u128, max_ms: u128 },

	#[error("invalid value {value:?} for {key}")]
	InvalidValue { key: &'static str, value: String },
}

/// A history entry whose state isn't a serialized navigation request.
#[derive(Debug, Error)]
#[error("history entry does not hold a navigation request: {0}")]
pub struct HistoryStateError(#[from] pub serde_json::Error);
