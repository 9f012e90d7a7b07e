//! Host implementations driven explicitly by the embedder instead of by a browser event loop.
//!
//! Nothing here runs by itself: timers fire during [`VirtualTimers::advance`],
//! requests complete when [`ScriptedTransport::respond`] is called,
//! and [`MemoryHistory::back`]/[`forward`](`MemoryHistory::forward`) only return the state to restore.

use crate::{
	error::TransportError,
	host::{Clock, Completion, History, RawResponse, TimerHandle, Timers, Timestamp, Transport},
	navigation::NavigationRequest,
};
use core::{cell::RefCell, convert::TryFrom, time::Duration};
use std::{collections::VecDeque, rc::Rc};
use tracing::trace;

enum Callback {
	Once(Box<dyn FnOnce()>),
	Repeating(Rc<RefCell<Box<dyn FnMut()>>>),
}

struct Pending {
	handle: TimerHandle,
	due: Duration,
	period: Option<Duration>,
	callback: Callback,
}

#[derive(Default)]
struct TimerQueue {
	now: Duration,
	next_handle: i32,
	pending: Vec<Pending>,
}

/// A virtual clock with a timer queue.
///
/// Timers due at the same instant fire in the order they were scheduled.
#[derive(Default)]
pub struct VirtualTimers {
	epoch: Timestamp,
	queue: RefCell<TimerQueue>,
}

impl VirtualTimers {
	#[must_use]
	pub fn new() -> Rc<Self> {
		Rc::default()
	}

	/// [`Clock::now`] reports `epoch` plus the virtual time elapsed.
	#[must_use]
	pub fn with_epoch(epoch: Timestamp) -> Rc<Self> {
		Rc::new(Self {
			epoch,
			queue: RefCell::default(),
		})
	}

	/// Virtual time elapsed since construction.
	#[must_use]
	pub fn elapsed(&self) -> Duration {
		self.queue.borrow().now
	}

	/// The number of timers that may still fire.
	#[must_use]
	pub fn live_timers(&self) -> usize {
		self.queue.borrow().pending.len()
	}

	/// The instant at which the next timer fires.
	#[must_use]
	pub fn next_due(&self) -> Option<Duration> {
		self.queue.borrow().pending.iter().map(|pending| pending.due).min()
	}

	/// Moves time forward by `delta`, firing every timer that becomes due on the way.
	///
	/// Callbacks run with the clock set to their due time and may schedule or clear timers.
	/// Timers scheduled this way fire within the same call if they become due before its end.
	pub fn advance(&self, delta: Duration) {
		let target = self.elapsed() + delta;
		while let Some(callback) = self.pop_due(target) {
			match callback {
				Callback::Once(callback) => callback(),
				Callback::Repeating(callback) => (&mut *callback.borrow_mut())(),
			}
		}
		self.queue.borrow_mut().now = target;
	}

	/// Advances to the next due timer and fires it (and anything due at the same instant).
	///
	/// Returns the new elapsed time, or [`None`] if no timer is pending.
	pub fn advance_to_next(&self) -> Option<Duration> {
		let next = self.next_due()?;
		self.advance(next - self.elapsed());
		Some(next)
	}

	fn pop_due(&self, target: Duration) -> Option<Callback> {
		let mut queue = self.queue.borrow_mut();
		let index = queue
			.pending
			.iter()
			.enumerate()
			.filter(|(_, pending)| pending.due <= target)
			.min_by_key(|(_, pending)| (pending.due, pending.handle))
			.map(|(index, _)| index)?;

		let pending = queue.pending.swap_remove(index);
		queue.now = pending.due;
		trace!(handle = pending.handle.0, due = ?pending.due, "Firing virtual timer.");

		Some(match (pending.callback, pending.period) {
			(Callback::Repeating(callback), Some(period)) => {
				queue.pending.push(Pending {
					handle: pending.handle,
					due: pending.due + period,
					period: Some(period),
					callback: Callback::Repeating(Rc::clone(&callback)),
				});
				Callback::Repeating(callback)
			}
			(callback, _) => callback,
		})
	}

	fn schedule(&self, delay: Duration, period: Option<Duration>, callback: Callback) -> TimerHandle {
		let mut queue = self.queue.borrow_mut();
		queue.next_handle += 1;
		let handle = TimerHandle(queue.next_handle);
		let due = queue.now + delay;
		queue.pending.push(Pending {
			handle,
			due,
			period,
			callback,
		});
		handle
	}
}

impl Timers for VirtualTimers {
	fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
		self.schedule(delay, None, Callback::Once(callback))
	}

	fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerHandle {
		self.schedule(period, Some(period), Callback::Repeating(Rc::new(RefCell::new(callback))))
	}

	fn clear(&self, handle: TimerHandle) {
		self.queue.borrow_mut().pending.retain(|pending| pending.handle != handle);
	}
}

impl Clock for VirtualTimers {
	fn now(&self) -> Timestamp {
		let elapsed = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
		Timestamp(self.epoch.0.saturating_add(elapsed))
	}
}

impl core::fmt::Debug for VirtualTimers {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("VirtualTimers")
			.field("epoch", &self.epoch)
			.field("elapsed", &self.elapsed())
			.field("live_timers", &self.live_timers())
			.finish()
	}
}

/// A request as the server would have seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
	pub path: String,
	pub validator: Option<String>,
	/// Read from the optional clock given to [`ScriptedTransport::with_clock`].
	pub sent_at: Option<Timestamp>,
}

/// Records requests and leaves them in flight until answered.
#[derive(Default)]
pub struct ScriptedTransport {
	clock: Option<Rc<dyn Clock>>,
	sent: RefCell<Vec<RecordedRequest>>,
	in_flight: RefCell<VecDeque<(RecordedRequest, Completion)>>,
}

impl ScriptedTransport {
	#[must_use]
	pub fn new() -> Rc<Self> {
		Rc::default()
	}

	/// Stamps each request with `clock`'s time.
	#[must_use]
	pub fn with_clock(clock: Rc<dyn Clock>) -> Rc<Self> {
		Rc::new(Self {
			clock: Some(clock),
			..Self::default()
		})
	}

	/// Every request sent so far, in order.
	#[must_use]
	pub fn sent(&self) -> Vec<RecordedRequest> {
		self.sent.borrow().clone()
	}

	#[must_use]
	pub fn in_flight(&self) -> usize {
		self.in_flight.borrow().len()
	}

	/// Completes the oldest in-flight request.
	///
	/// Returns the request that was answered, or [`None`] if nothing was in flight.
	pub fn respond(&self, response: Result<RawResponse, TransportError>) -> Option<RecordedRequest> {
		self.respond_at(0, response)
	}

	/// Completes the newest in-flight request, overtaking older ones.
	pub fn respond_latest(&self, response: Result<RawResponse, TransportError>) -> Option<RecordedRequest> {
		let index = self.in_flight().checked_sub(1)?;
		self.respond_at(index, response)
	}

	/// Completes every in-flight request with a copy of `response`, oldest first.
	pub fn respond_all(&self, response: &Result<RawResponse, TransportError>) -> usize {
		let mut count = 0;
		while self.respond(response.clone()).is_some() {
			count += 1;
		}
		count
	}

	fn respond_at(&self, index: usize, response: Result<RawResponse, TransportError>) -> Option<RecordedRequest> {
		let (request, on_complete) = self.in_flight.borrow_mut().remove(index)?;
		on_complete(response);
		Some(request)
	}
}

impl Transport for ScriptedTransport {
	fn get(&self, path: &str, validator: Option<&str>, on_complete: Completion) {
		let request = RecordedRequest {
			path: path.to_owned(),
			validator: validator.map(ToOwned::to_owned),
			sent_at: self.clock.as_ref().map(|clock| clock.now()),
		};
		self.sent.borrow_mut().push(request.clone());
		self.in_flight.borrow_mut().push_back((request, on_complete));
	}
}

impl core::fmt::Debug for ScriptedTransport {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ScriptedTransport")
			.field("sent", &self.sent)
			.field("in_flight", &self.in_flight())
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
	/// As serialized by [`NavigationRequest::to_history_state`].
	pub state: String,
	pub url: String,
}

#[derive(Debug, Default)]
struct HistoryStack {
	entries: Vec<HistoryEntry>,
	index: usize,
}

/// Session history kept in memory.
///
/// Like a browser's, it starts with a single entry that has no state.
#[derive(Debug)]
pub struct MemoryHistory {
	stack: RefCell<HistoryStack>,
}

impl MemoryHistory {
	#[must_use]
	pub fn new(initial_url: &str) -> Rc<Self> {
		Rc::new(Self {
			stack: RefCell::new(HistoryStack {
				entries: vec![HistoryEntry {
					state: "null".to_owned(),
					url: initial_url.to_owned(),
				}],
				index: 0,
			}),
		})
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.stack.borrow().entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[must_use]
	pub fn current(&self) -> HistoryEntry {
		let stack = self.stack.borrow();
		stack.entries[stack.index].clone()
	}

	#[must_use]
	pub fn entries(&self) -> Vec<HistoryEntry> {
		self.stack.borrow().entries.clone()
	}

	/// Moves one entry back and returns its decoded state, as a `popstate` would deliver it.
	///
	/// [`None`] at the start of history. `Some(None)` if the entry carries no (valid) navigation request.
	pub fn back(&self) -> Option<Option<NavigationRequest>> {
		let mut stack = self.stack.borrow_mut();
		stack.index = stack.index.checked_sub(1)?;
		Some(NavigationRequest::from_history_state(&stack.entries[stack.index].state).ok())
	}

	pub fn forward(&self) -> Option<Option<NavigationRequest>> {
		let mut stack = self.stack.borrow_mut();
		if stack.index + 1 >= stack.entries.len() {
			return None;
		}
		stack.index += 1;
		Some(NavigationRequest::from_history_state(&stack.entries[stack.index].state).ok())
	}
}

impl History for MemoryHistory {
	fn push(&self, state: &NavigationRequest, url: &str) {
		let mut stack = self.stack.borrow_mut();
		let index = stack.index + 1;
		stack.entries.truncate(index);
		stack.entries.push(HistoryEntry {
			state: state.to_history_state(),
			url: url.to_owned(),
		});
		stack.index = index;
	}

	fn replace(&self, state: &NavigationRequest, url: &str) {
		let mut stack = self.stack.borrow_mut();
		let index = stack.index;
		stack.entries[index] = HistoryEntry {
			state: state.to_history_state(),
			url: url.to_owned(),
		};
	}
}
