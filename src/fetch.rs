//! Single conditional GETs, with per-path validator and failure bookkeeping.

use crate::{
	error::{FetchError, TransportError},
	host::{Clock, RawResponse, TimerHandle, Timestamp, Transport},
};
use core::{cell::RefCell, time::Duration};
use hashbrown::HashMap;
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, trace, trace_span, warn};

/// Polling bookkeeping for one resource path.
///
/// Created on first use and kept for the lifetime of the owning [`ConditionalFetcher`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
	pub(crate) current_interval: Option<Duration>,
	pub(crate) pending_timer: Option<TimerHandle>,
	/// Incremented each time a periodic cycle is (re)started for this path.
	pub(crate) cycle: u64,
	consecutive_failures: u32,
	cache_validator: Option<String>,
	last_attempt_at: Option<Timestamp>,
}

impl FetchState {
	/// The delay before the next tick, or [`None`] if no cycle was started yet.
	#[must_use]
	pub fn current_interval(&self) -> Option<Duration> {
		self.current_interval
	}

	#[must_use]
	pub fn pending_timer(&self) -> Option<TimerHandle> {
		self.pending_timer
	}

	#[must_use]
	pub fn cycle(&self) -> u64 {
		self.cycle
	}

	#[must_use]
	pub fn consecutive_failures(&self) -> u32 {
		self.consecutive_failures
	}

	/// The `ETag` of the last successfully decoded response.
	#[must_use]
	pub fn cache_validator(&self) -> Option<&str> {
		self.cache_validator.as_deref()
	}

	/// When the last definitive (success or not-modified) response arrived.
	#[must_use]
	pub fn last_attempt_at(&self) -> Option<Timestamp> {
		self.last_attempt_at
	}

	fn record(&mut self, outcome: &FetchOutcome, now: Timestamp) {
		match outcome {
			FetchOutcome::Success { validator, .. } => {
				self.consecutive_failures = 0;
				self.cache_validator = validator.clone();
				self.last_attempt_at = Some(now);
			}
			FetchOutcome::NotModified => {
				self.consecutive_failures = 0;
				self.last_attempt_at = Some(now);
			}
			FetchOutcome::Failed(_) => self.consecutive_failures = self.consecutive_failures.saturating_add(1),
		}
	}
}

#[derive(Debug)]
pub enum FetchOutcome {
	Success { document: Rc<Value>, validator: Option<String> },
	NotModified,
	Failed(FetchError),
}

impl FetchOutcome {
	/// Interprets what the transport delivered.
	///
	/// 2xx is parsed as JSON, 304 is taken as-is without looking at the body, and anything else is a [`TransportError`].
	#[must_use]
	pub fn classify(response: Result<RawResponse, TransportError>) -> Self {
		let response = match response {
			Ok(response) => response,
			Err(error) => return Self::Failed(error.into()),
		};

		match response.status {
			200..=299 => match serde_json::from_str(&response.body) {
				Ok(document) => Self::Success {
					document: Rc::new(document),
					validator: response.validator,
				},
				Err(error) => Self::Failed(error.into()),
			},
			304 => Self::NotModified,
			status => Self::Failed(TransportError::Status { status }.into()),
		}
	}

	#[must_use]
	pub fn document(&self) -> Option<&Rc<Value>> {
		match self {
			Self::Success { document, .. } => Some(document),
			Self::NotModified | Self::Failed(_) => None,
		}
	}
}

/// Issues conditional GETs and owns the [`FetchState`] of every path it has seen.
pub struct ConditionalFetcher {
	transport: Rc<dyn Transport>,
	clock: Rc<dyn Clock>,
	states: RefCell<HashMap<String, FetchState>>,
}

impl ConditionalFetcher {
	#[must_use]
	pub fn new(transport: Rc<dyn Transport>, clock: Rc<dyn Clock>) -> Rc<Self> {
		Rc::new(Self {
			transport,
			clock,
			states: RefCell::default(),
		})
	}

	/// A copy of the current bookkeeping for `path`, if it was ever fetched or scheduled.
	#[must_use]
	pub fn state(&self, path: &str) -> Option<FetchState> {
		self.states.borrow().get(path).cloned()
	}

	/// Runs `f` on the state for `path`, creating it first if necessary.
	///
	/// `f` must not call back into this fetcher.
	pub(crate) fn with_state<R>(&self, path: &str, f: impl FnOnce(&mut FetchState) -> R) -> R {
		let mut states = self.states.borrow_mut();
		let (_, state) = states.raw_entry_mut().from_key(path).or_insert_with(|| (path.to_owned(), FetchState::default()));
		f(state)
	}

	/// Sends one conditional GET for `path`.
	///
	/// `on_outcome` runs after the path's [`FetchState`] has been updated,
	/// even if a newer cycle was started in the meantime.
	pub fn fetch(self: &Rc<Self>, path: &str, on_outcome: impl FnOnce(&FetchOutcome) + 'static) {
		let validator = self.with_state(path, |state| state.cache_validator.clone());
		debug!(path, conditional = validator.is_some(), "Fetching data.");

		let this = Rc::clone(self);
		let owned_path = path.to_owned();
		self.transport.get(
			path,
			validator.as_deref(),
			Box::new(move |response| {
				let span = trace_span!("fetch completion", path = owned_path.as_str());
				let _enter = span.enter();

				if cfg!(feature = "dangerous-logging") {
					if let Ok(response) = &response {
						trace!(body = response.body.as_str(), "Raw response.");
					}
				}

				let outcome = FetchOutcome::classify(response);
				let now = this.clock.now();
				let failures = this.with_state(&owned_path, |state| {
					state.record(&outcome, now);
					state.consecutive_failures
				});

				match &outcome {
					FetchOutcome::Success { validator, .. } => trace!(?validator, "Received new document."),
					FetchOutcome::NotModified => trace!("Not modified."),
					FetchOutcome::Failed(error) if error.is_decode() => {
						warn!(%error, failures, "Discarding undecodable response; keeping the previous snapshot.");
					}
					FetchOutcome::Failed(error) => warn!(%error, failures, "Fetch failed."),
				}

				on_outcome(&outcome);
			}),
		);
	}
}

impl core::fmt::Debug for ConditionalFetcher {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ConditionalFetcher").field("states", &self.states).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redirect_status_is_a_transport_error() {
		let outcome = FetchOutcome::classify(Ok(RawResponse {
			status: 302,
			validator: None,
			body: String::new(),
		}));
		assert!(matches!(outcome, FetchOutcome::Failed(FetchError::Transport(TransportError::Status { status: 302 }))));
	}

	#[test]
	fn not_modified_ignores_body() {
		let outcome = FetchOutcome::classify(Ok(RawResponse {
			status: 304,
			validator: Some("\"v2\"".to_owned()),
			body: "not json".to_owned(),
		}));
		assert!(matches!(outcome, FetchOutcome::NotModified));
	}

	#[test]
	fn decode_failure_keeps_validator() {
		let mut state = FetchState::default();
		state.record(&FetchOutcome::classify(Ok(RawResponse::ok("{}", Some("v1")))), Timestamp(1));
		state.record(&FetchOutcome::classify(Ok(RawResponse::ok("{", Some("v2")))), Timestamp(2));

		assert_eq!(state.cache_validator(), Some("v1"));
		assert_eq!(state.last_attempt_at(), Some(Timestamp(1)));
		assert_eq!(state.consecutive_failures(), 1);
	}

	#[test]
	fn success_without_validator_clears_it() {
		let mut state = FetchState::default();
		state.record(&FetchOutcome::classify(Ok(RawResponse::ok("{}", Some("v1")))), Timestamp(1));
		state.record(&FetchOutcome::classify(Ok(RawResponse::ok("[]", None))), Timestamp(2));
		assert_eq!(state.cache_validator(), None);
	}
}
