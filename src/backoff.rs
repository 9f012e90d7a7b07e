//! Periodic fetching with exponentially growing delays.
//!
//! Each (re)started cycle fetches immediately, then again after the minimum interval,
//! and keeps doubling the delay until it reaches the maximum.
//! From then on it fetches at a fixed rate.
//! Failures don't shorten the delay.

use crate::{
	error::ConfigError,
	fetch::{ConditionalFetcher, FetchOutcome, FetchState},
	host::Timers,
};
use core::time::Duration;
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
	min_interval: Duration,
	max_interval: Duration,
	discard_superseded: bool,
}

impl Default for BackoffConfig {
	fn default() -> Self {
		Self {
			min_interval: Duration::from_millis(500),
			max_interval: Duration::from_secs(10 * 60),
			discard_superseded: false,
		}
	}
}

impl BackoffConfig {
	/// # Errors
	///
	/// Iff `min_interval` is zero or greater than `max_interval`.
	pub fn new(min_interval: Duration, max_interval: Duration) -> Result<Self, ConfigError> {
		if min_interval == Duration::ZERO {
			return Err(ConfigError::ZeroInterval);
		}
		if min_interval > max_interval {
			return Err(ConfigError::InvertedBounds {
				min_ms: min_interval.as_millis(),
				max_ms: max_interval.as_millis(),
			});
		}
		Ok(Self {
			min_interval,
			max_interval,
			discard_superseded: false,
		})
	}

	/// Drop documents from requests whose cycle has since been restarted, instead of letting the last response win.
	///
	/// The fetch bookkeeping is updated either way.
	#[must_use]
	pub fn discard_superseded(self, discard_superseded: bool) -> Self {
		Self { discard_superseded, ..self }
	}

	#[must_use]
	pub fn min_interval(&self) -> Duration {
		self.min_interval
	}

	#[must_use]
	pub fn max_interval(&self) -> Duration {
		self.max_interval
	}

	#[must_use]
	pub fn discards_superseded(&self) -> bool {
		self.discard_superseded
	}

	/// The delay after `interval`.
	#[must_use]
	pub fn next_interval(&self, interval: Duration) -> Duration {
		interval.saturating_mul(2).min(self.max_interval)
	}
}

type DataHandler = Rc<dyn Fn(Rc<Value>)>;

/// Drives one periodic cycle per path through a shared [`ConditionalFetcher`].
///
/// At most one timer is live per path. Restarting a cycle clears it.
pub struct BackoffScheduler {
	config: BackoffConfig,
	fetcher: Rc<ConditionalFetcher>,
	timers: Rc<dyn Timers>,
}

impl BackoffScheduler {
	#[must_use]
	pub fn new(config: BackoffConfig, fetcher: Rc<ConditionalFetcher>, timers: Rc<dyn Timers>) -> Rc<Self> {
		Rc::new(Self { config, fetcher, timers })
	}

	#[must_use]
	pub fn config(&self) -> &BackoffConfig {
		&self.config
	}

	#[must_use]
	pub fn fetcher(&self) -> &Rc<ConditionalFetcher> {
		&self.fetcher
	}

	#[must_use]
	pub fn state(&self, path: &str) -> Option<FetchState> {
		self.fetcher.state(path)
	}

	/// (Re)starts periodic fetching of `path` at the minimum interval, fetching right away.
	///
	/// Any timer of a previous cycle for `path` is cleared first.
	/// Requests that are already in flight still complete and still reach their own `on_data`
	/// unless [`BackoffConfig::discard_superseded`] is set.
	#[instrument(skip(self, on_data))]
	pub fn start_periodic(self: &Rc<Self>, path: &str, on_data: impl Fn(Rc<Value>) + 'static) {
		let min_interval = self.config.min_interval;
		let (previous, cycle) = self.fetcher.with_state(path, |state| {
			state.current_interval = Some(min_interval);
			state.cycle += 1;
			(state.pending_timer.take(), state.cycle)
		});
		if let Some(previous) = previous {
			self.timers.clear(previous);
		}
		info!(cycle, "Started periodic fetching.");

		self.tick(Rc::from(path), Rc::new(on_data), cycle);
	}

	/// Clears the pending timer for `path`, if any.
	///
	/// In-flight requests are not affected.
	pub fn stop(&self, path: &str) {
		let previous = self.fetcher.with_state(path, |state| {
			state.cycle += 1;
			state.current_interval = None;
			state.pending_timer.take()
		});
		if let Some(previous) = previous {
			self.timers.clear(previous);
			debug!(path, "Stopped periodic fetching.");
		}
	}

	fn tick(self: &Rc<Self>, path: Rc<str>, on_data: DataHandler, cycle: u64) {
		let (current, interval) = self.fetcher.with_state(&path, |state| (state.cycle, state.current_interval));
		let interval = match interval {
			Some(interval) if current == cycle => interval,
			_ => return trace!(path = &*path, cycle, "Ignoring tick of a superseded cycle."),
		};

		if interval >= self.config.max_interval {
			let period = self.config.max_interval;
			trace!(path = &*path, ?period, "Switching to fixed-rate fetching.");

			let handle = {
				let this = Rc::clone(self);
				let path = Rc::clone(&path);
				let on_data = Rc::clone(&on_data);
				self.timers.set_interval(period, Box::new(move || this.fetch_once(&path, &on_data, cycle)))
			};
			self.fetcher.with_state(&path, |state| state.pending_timer = Some(handle));
		} else {
			let next = self.config.next_interval(interval);
			trace!(path = &*path, ?interval, ?next, "Scheduling next tick.");

			let handle = {
				let this = Rc::clone(self);
				let path = Rc::clone(&path);
				let on_data = Rc::clone(&on_data);
				self.timers.set_timeout(interval, Box::new(move || this.tick(path, on_data, cycle)))
			};
			self.fetcher.with_state(&path, |state| {
				state.pending_timer = Some(handle);
				state.current_interval = Some(next);
			});
		}

		self.fetch_once(&path, &on_data, cycle);
	}

	fn fetch_once(self: &Rc<Self>, path: &str, on_data: &DataHandler, cycle: u64) {
		let on_data = Rc::clone(on_data);
		let fetcher = Rc::clone(&self.fetcher);
		let discard_superseded = self.config.discard_superseded;
		let owned_path = path.to_owned();
		self.fetcher.fetch(path, move |outcome| {
			if let FetchOutcome::Success { document, .. } = outcome {
				if discard_superseded && fetcher.state(&owned_path).map(|state| state.cycle) != Some(cycle) {
					return debug!(path = owned_path.as_str(), cycle, "Discarding document from a superseded cycle.");
				}
				on_data(Rc::clone(document));
			}
		});
	}
}

impl core::fmt::Debug for BackoffScheduler {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("BackoffScheduler")
			.field("config", &self.config)
			.field("fetcher", &self.fetcher)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn doubling_saturates_at_ceiling() {
		let config = BackoffConfig::new(Duration::from_millis(500), Duration::from_millis(4000)).unwrap();
		let mut interval = config.min_interval();
		let mut seen = vec![interval];
		for _ in 0..5 {
			interval = config.next_interval(interval);
			seen.push(interval);
		}
		assert_eq!(
			seen.iter().map(Duration::as_millis).collect::<Vec<_>>(),
			[500, 1000, 2000, 4000, 4000, 4000]
		);
	}

	#[test]
	fn ceiling_need_not_be_a_power_of_two_multiple() {
		let config = BackoffConfig::new(Duration::from_millis(300), Duration::from_millis(1000)).unwrap();
		assert_eq!(config.next_interval(Duration::from_millis(600)), Duration::from_millis(1000));
	}

	#[test]
	fn invalid_bounds_are_rejected() {
		assert_eq!(BackoffConfig::new(Duration::ZERO, Duration::from_secs(1)), Err(ConfigError::ZeroInterval));
		assert!(matches!(
			BackoffConfig::new(Duration::from_secs(2), Duration::from_secs(1)),
			Err(ConfigError::InvertedBounds { min_ms: 2000, max_ms: 1000 })
		));
	}

	#[test]
	fn defaults() {
		let config = BackoffConfig::default();
		assert_eq!(config.min_interval(), Duration::from_millis(500));
		assert_eq!(config.max_interval(), Duration::from_millis(600_000));
		assert!(!config.discards_superseded());
	}
}
