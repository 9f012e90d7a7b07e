//! The current navigation request, kept consistent with session history and the polled snapshot.

use crate::{
	backoff::BackoffScheduler,
	error::HistoryStateError,
	host::History,
	query::{emit_query_string, parse_query_string, Query},
	signal::{Signal, SubscriptionId},
};
use core::cell::RefCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::{Rc, Weak};
use tracing::{debug, info, instrument};

/// What the user is looking at.
///
/// This is the exact state attached to history entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
	pub path: String,
	#[serde(default)]
	pub query: Query,
}

impl NavigationRequest {
	#[must_use]
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			query: Query::new(),
		}
	}

	/// Builds a request from the `pathname` and `search` parts of a same-origin URL.
	#[must_use]
	pub fn from_location(pathname: &str, search: &str) -> Self {
		Self {
			path: if pathname.is_empty() { "/".to_owned() } else { pathname.to_owned() },
			query: parse_query_string(search),
		}
	}

	/// The path-and-query URL this request is displayed under.
	#[must_use]
	pub fn url(&self) -> String {
		if self.query.is_empty() {
			self.path.clone()
		} else {
			format!("{}?{}", self.path, emit_query_string(&self.query))
		}
	}

	/// Serializes this request for attachment to a history entry.
	#[must_use]
	pub fn to_history_state(&self) -> String {
		serde_json::to_string(self).unwrap_or_else(|_| unreachable!("`NavigationRequest` always serializes"))
	}

	/// # Errors
	///
	/// Iff `state` wasn't produced by [`NavigationRequest::to_history_state`].
	pub fn from_history_state(state: &str) -> Result<Self, HistoryStateError> {
		Ok(serde_json::from_str(state)?)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
	/// The initial request was derived from the page location.
	Loaded,
	/// In-app navigation to a new request.
	Navigated,
	/// Back/forward restored an earlier request.
	Restored,
	/// A new snapshot was fetched.
	DataArrived,
}

/// Published synchronously whenever the request or the snapshot changes.
#[derive(Debug, Clone)]
pub struct StateChanged {
	pub cause: ChangeCause,
	pub request: NavigationRequest,
	/// [`None`] until the first successful fetch.
	pub snapshot: Option<Rc<Value>>,
}

/// Owns the current [`NavigationRequest`] and the latest snapshot,
/// and keeps polling of the data path in step with navigation.
pub struct NavigationController {
	data_path: String,
	history: Rc<dyn History>,
	scheduler: Rc<BackoffScheduler>,
	request: RefCell<NavigationRequest>,
	snapshot: RefCell<Option<Rc<Value>>>,
	state_changed: Signal<StateChanged>,
	this: Weak<Self>,
}

impl NavigationController {
	#[must_use]
	pub fn new(data_path: impl Into<String>, history: Rc<dyn History>, scheduler: Rc<BackoffScheduler>) -> Rc<Self> {
		let data_path = data_path.into();
		Rc::new_cyclic(|this| Self {
			data_path,
			history,
			scheduler,
			request: RefCell::default(),
			snapshot: RefCell::default(),
			state_changed: Signal::new(),
			this: this.clone(),
		})
	}

	#[must_use]
	pub fn data_path(&self) -> &str {
		&self.data_path
	}

	#[must_use]
	pub fn scheduler(&self) -> &Rc<BackoffScheduler> {
		&self.scheduler
	}

	#[must_use]
	pub fn current_request(&self) -> NavigationRequest {
		self.request.borrow().clone()
	}

	#[must_use]
	pub fn snapshot(&self) -> Option<Rc<Value>> {
		self.snapshot.borrow().clone()
	}

	pub fn subscribe(&self, subscriber: impl Fn(&StateChanged) + 'static) -> SubscriptionId {
		self.state_changed.subscribe(subscriber)
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.state_changed.unsubscribe(id)
	}

	/// Adopts the page's own location as the current request and starts polling.
	///
	/// The current history entry is replaced rather than pushed, so that going back to it later restores this request.
	/// Its URL keeps the query text and `hash` (the fragment, with or without `#`) as given.
	#[instrument(skip(self, search, hash))]
	pub fn load(&self, pathname: &str, search: &str, hash: &str) {
		let request = NavigationRequest::from_location(pathname, search);
		self.history.replace(&request, &location_url(&request.path, search, hash));
		*self.request.borrow_mut() = request;
		info!("Loaded.");

		self.restart_polling();
		self.publish(ChangeCause::Loaded);
	}

	/// In-app navigation: pushes a history entry and restarts polling at the minimum interval.
	///
	/// `hash` only ends up in the entry's URL. It isn't part of the request.
	#[instrument(skip(self, search, hash))]
	pub fn navigate(&self, pathname: &str, search: &str, hash: &str) {
		let request = NavigationRequest::from_location(pathname, search);
		self.history.push(&request, &location_url(&request.path, search, hash));
		if cfg!(feature = "dangerous-logging") {
			info!(url = request.url().as_str(), "Navigating.");
		} else {
			info!(path = request.path.as_str(), "Navigating.");
		}
		*self.request.borrow_mut() = request;

		self.restart_polling();
		self.publish(ChangeCause::Navigated);
	}

	/// Back/forward: adopts the request stored in the history entry.
	///
	/// Neither pushes history nor touches polling.
	#[instrument(skip(self, request))]
	pub fn restore(&self, request: NavigationRequest) {
		debug!(path = request.path.as_str(), "Restoring.");
		*self.request.borrow_mut() = request;
		self.publish(ChangeCause::Restored);
	}

	/// Replaces the snapshot wholesale.
	pub fn receive(&self, document: Rc<Value>) {
		*self.snapshot.borrow_mut() = Some(document);
		self.publish(ChangeCause::DataArrived);
	}

	/// Stops polling. Already sent requests still complete.
	pub fn stop(&self) {
		self.scheduler.stop(&self.data_path);
	}

	fn restart_polling(&self) {
		let this = self.this.clone();
		self.scheduler.start_periodic(&self.data_path, move |document| {
			if let Some(this) = this.upgrade() {
				this.receive(document);
			}
		});
	}

	fn publish(&self, cause: ChangeCause) {
		let event = StateChanged {
			cause,
			request: self.current_request(),
			snapshot: self.snapshot(),
		};
		self.state_changed.publish(&event);
	}
}

/// Keeps the query text and fragment as given, so that the address bar shows what was linked.
fn location_url(path: &str, search: &str, hash: &str) -> String {
	let mut url = path.to_owned();
	match search.strip_prefix('?').unwrap_or(search) {
		"" => (),
		search => {
			url.push('?');
			url.push_str(search);
		}
	}
	match hash.strip_prefix('#').unwrap_or(hash) {
		"" => (),
		hash => {
			url.push('#');
			url.push_str(hash);
		}
	}
	url
}

impl core::fmt::Debug for NavigationController {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("NavigationController")
			.field("data_path", &self.data_path)
			.field("request", &self.request)
			.field("has_snapshot", &self.snapshot.borrow().is_some())
			.field("state_changed", &self.state_changed)
			.finish_non_exhaustive()
	}
}
