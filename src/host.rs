//! The seams between the polling/navigation core and whatever drives it.
//!
//! In a browser, [`crate::web`] implements these on top of `window`.
//! [`crate::deterministic`] implements them with an explicitly advanced virtual clock,
//! which is what the tests use.

use crate::{error::TransportError, navigation::NavigationRequest};
use core::time::Duration;

/// Identifies one scheduled timer so that it can be cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub i32);

pub trait Timers {
	/// Runs `callback` once after `delay`, unless cleared first.
	fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle;

	/// Runs `callback` every `period` until cleared.
	fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerHandle;

	/// Prevents any further invocation of the timer's callback.
	///
	/// Clearing a spent or unknown handle does nothing.
	fn clear(&self, handle: TimerHandle);
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

pub trait Clock {
	fn now(&self) -> Timestamp;
}

/// A response as seen by the transport, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
	pub status: u16,
	/// The `ETag` response header.
	pub validator: Option<String>,
	pub body: String,
}

impl RawResponse {
	#[must_use]
	pub fn ok(body: impl Into<String>, validator: Option<&str>) -> Self {
		Self {
			status: 200,
			validator: validator.map(ToOwned::to_owned),
			body: body.into(),
		}
	}

	#[must_use]
	pub fn not_modified() -> Self {
		Self {
			status: 304,
			validator: None,
			body: String::new(),
		}
	}
}

pub type Completion = Box<dyn FnOnce(Result<RawResponse, TransportError>)>;

pub trait Transport {
	/// Sends a GET to `path`.
	///
	/// If `validator` is present, it's sent as `If-None-Match`.
	/// `on_complete` must be called exactly once, after `get` has returned.
	/// Requests that were sent can't be aborted.
	fn get(&self, path: &str, validator: Option<&str>, on_complete: Completion);
}

/// Session history with a serialized [`NavigationRequest`] attached to each entry.
pub trait History {
	fn push(&self, state: &NavigationRequest, url: &str);
	fn replace(&self, state: &NavigationRequest, url: &str);
}
