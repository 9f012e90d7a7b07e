//! Browser bindings: `window` timers, `XMLHttpRequest`, session history, DOM mounting and the exported entry point.

use crate::{
	backoff::BackoffScheduler,
	closure_map::ClosureMap,
	config::ConsoleConfig,
	error::TransportError,
	fetch::ConditionalFetcher,
	host::{Clock, Completion, History, RawResponse, TimerHandle, Timers, Timestamp, Transport},
	navigation::{NavigationRequest, NavigationController},
	router::{Site, ViewRouter},
	view::{View, NAVIGATE_ATTRIBUTE},
};
use core::{cell::RefCell, convert::TryFrom, time::Duration};
use std::rc::Rc;
use tracing::{error, info, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast, UnwrapThrowExt};
use web_sys::{Document, Element, HtmlAnchorElement, Location, MouseEvent, Node, PopStateEvent, Window, XmlHttpRequest};

fn timeout_millis(duration: Duration) -> i32 {
	i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

/// `setTimeout`/`setInterval` on a [`Window`].
#[derive(Debug)]
pub struct WindowTimers {
	window: Window,
	closures: ClosureMap,
}

impl WindowTimers {
	#[must_use]
	pub fn new(window: Window) -> Self {
		Self {
			window,
			closures: ClosureMap::default(),
		}
	}
}

impl Timers for WindowTimers {
	fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
		let (closure, flags) = ClosureMap::wrap_once(callback);
		let handle = self
			.window
			.set_timeout_with_callback_and_timeout_and_arguments_0(closure.as_ref().unchecked_ref(), timeout_millis(delay))
			.expect_throw("stagger-web: `setTimeout` failed.");
		self.closures.publish(handle, closure, flags);
		TimerHandle(handle)
	}

	fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerHandle {
		let (closure, flags) = ClosureMap::wrap_repeating(callback);
		let handle = self
			.window
			.set_interval_with_callback_and_timeout_and_arguments_0(closure.as_ref().unchecked_ref(), timeout_millis(period))
			.expect_throw("stagger-web: `setInterval` failed.");
		self.closures.publish(handle, closure, flags);
		TimerHandle(handle)
	}

	fn clear(&self, handle: TimerHandle) {
		// Timeouts and intervals share one id pool, so either function clears both kinds.
		self.window.clear_timeout_with_handle(handle.0);
		self.closures.unpublish(handle.0);
	}
}

/// `Date.now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn now(&self) -> Timestamp {
		Timestamp(js_sys::Date::now() as u64)
	}
}

/// Conditional GETs through `XMLHttpRequest`.
#[derive(Debug)]
pub struct XhrTransport {
	window: Window,
}

impl XhrTransport {
	#[must_use]
	pub fn new(window: Window) -> Self {
		Self { window }
	}

	fn send(path: &str, validator: Option<&str>, on_complete: &Rc<RefCell<Option<Completion>>>) -> Result<(), JsValue> {
		let request = XmlHttpRequest::new()?;
		request.open("GET", path)?;
		if let Some(validator) = validator {
			request.set_request_header("If-None-Match", validator)?;
		}

		// `loadend` fires exactly once per sent request, whatever its outcome.
		let listener = {
			let request = request.clone();
			let on_complete = Rc::clone(on_complete);
			Closure::once_into_js(move |_: web_sys::Event| {
				if let Some(on_complete) = on_complete.borrow_mut().take() {
					on_complete(read_response(&request));
				}
			})
		};
		request.add_event_listener_with_callback("loadend", listener.unchecked_ref())?;
		request.send()
	}
}

fn read_response(request: &XmlHttpRequest) -> Result<RawResponse, TransportError> {
	match request.status() {
		Ok(0) | Err(_) => Err(TransportError::Network {
			message: "no response received".to_owned(),
		}),
		Ok(status) => Ok(RawResponse {
			status,
			validator: request.get_response_header("ETag").ok().flatten(),
			body: request.response_text().ok().flatten().unwrap_or_default(),
		}),
	}
}

impl Transport for XhrTransport {
	fn get(&self, path: &str, validator: Option<&str>, on_complete: Completion) {
		let on_complete = Rc::new(RefCell::new(Some(on_complete)));
		if let Err(error) = Self::send(path, validator, &on_complete) {
			let message = format!("{:?}", error);
			warn!(error = message.as_str(), "Could not send request.");

			// Completions never run synchronously, so defer the failure to a task of its own.
			let deferred = Closure::once_into_js(move || {
				if let Some(on_complete) = on_complete.borrow_mut().take() {
					on_complete(Err(TransportError::Network { message }));
				}
			});
			self.window
				.set_timeout_with_callback_and_timeout_and_arguments_0(deferred.unchecked_ref(), 0)
				.expect_throw("stagger-web: `setTimeout` failed.");
		}
	}
}

/// `pushState`/`replaceState` with the request serialized as JSON string state.
#[derive(Debug)]
pub struct BrowserHistory {
	history: web_sys::History,
}

impl BrowserHistory {
	#[must_use]
	pub fn new(history: web_sys::History) -> Self {
		Self { history }
	}

	/// Decodes the state delivered with a `popstate` event.
	#[must_use]
	pub fn decode_state(state: &JsValue) -> Option<NavigationRequest> {
		let state = state.as_string()?;
		NavigationRequest::from_history_state(&state)
			.map_err(|error| warn!(%error, "Ignoring foreign history state."))
			.ok()
	}
}

impl History for BrowserHistory {
	fn push(&self, state: &NavigationRequest, url: &str) {
		let state = JsValue::from_str(&state.to_history_state());
		if let Err(error) = self.history.push_state_with_url(&state, "", Some(url)) {
			error!(?error, "`pushState` failed.");
		}
	}

	fn replace(&self, state: &NavigationRequest, url: &str) {
		let state = JsValue::from_str(&state.to_history_state());
		if let Err(error) = self.history.replace_state_with_url(&state, "", Some(url)) {
			error!(?error, "`replaceState` failed.");
		}
	}
}

/// Builds detached DOM nodes for `view`.
///
/// # Errors
///
/// Iff the document refuses to create an element or attribute, e.g. because of an invalid name.
pub fn materialize(document: &Document, view: &View) -> Result<Node, JsValue> {
	match view {
		View::Text(text) => Ok(document.create_text_node(text).into()),
		View::Element(element) => {
			let node = document.create_element(element.name)?;
			for (name, value) in &element.attributes {
				node.set_attribute(name, value)?;
			}
			for child in &element.children {
				node.append_child(&materialize(document, child)?)?;
			}
			Ok(node.into())
		}
	}
}

/// Replaces the element with id `content_id` with `view`.
///
/// # Errors
///
/// Iff `view` can't be materialized or there's no element to replace.
#[instrument(skip(document, view))]
pub fn mount(document: &Document, content_id: &str, view: &View) -> Result<(), JsValue> {
	let old = document
		.get_element_by_id(content_id)
		.ok_or_else(|| JsValue::from_str(&format!("stagger-web: No element with id {:?} to replace.", content_id)))?;
	let new = materialize(document, view)?;
	old.replace_with_with_node_1(&new)?;
	trace!("Mounted.");
	Ok(())
}

/// The same-origin navigation link a primary click landed on, if any.
fn navigation_anchor(event: &MouseEvent, location: &Location) -> Option<HtmlAnchorElement> {
	if event.default_prevented() || event.button() != 0 || event.ctrl_key() || event.meta_key() || event.shift_key() || event.alt_key() {
		return None;
	}

	let target = event.target()?.dyn_into::<Element>().ok()?;
	let anchor = target
		.closest(&format!("a[{}]", NAVIGATE_ATTRIBUTE))
		.ok()??
		.dyn_into::<HtmlAnchorElement>()
		.ok()?;

	if anchor.origin() == location.origin().ok()? {
		Some(anchor)
	} else {
		None
	}
}

fn js_error(error: impl ToString) -> JsValue {
	JsValue::from_str(&error.to_string())
}

/// A running console: polls the data path and renders into `#content` until dropped.
#[wasm_bindgen]
pub struct WebConsole {
	window: Window,
	document: Document,
	controller: Rc<NavigationController>,
	on_click: Closure<dyn FnMut(MouseEvent)>,
	on_popstate: Closure<dyn FnMut(PopStateEvent)>,
}

#[wasm_bindgen]
impl WebConsole {
	/// Reads configuration from the content element's `data-*` attributes, installs listeners and performs the initial load.
	///
	/// # Errors
	///
	/// Iff the configuration is invalid or the page's location or history are inaccessible.
	pub fn start() -> Result<WebConsole, JsValue> {
		if tracing_wasm::try_set_as_global_default().is_err() {
			trace!("A global tracing subscriber was already set.");
		}

		let window = web_sys::window().expect_throw("stagger-web: No `window`.");
		let document = window.document().expect_throw("stagger-web: No `document`.");
		let location = window.location();

		let defaults = ConsoleConfig::default();
		let config = match document.get_element_by_id(&defaults.content_id) {
			Some(content) => defaults
				.with_overrides(|key| content.get_attribute(&format!("data-{}", key)))
				.map_err(js_error)?,
			None => {
				error!(content_id = defaults.content_id.as_str(), "No content element; rendering will fail.");
				defaults
			}
		};

		let fetcher = ConditionalFetcher::new(Rc::new(XhrTransport::new(window.clone())), Rc::new(BrowserClock));
		let scheduler = BackoffScheduler::new(config.backoff, fetcher, Rc::new(WindowTimers::new(window.clone())));
		let history = Rc::new(BrowserHistory::new(window.history()?));
		let controller = NavigationController::new(config.data_path.clone(), history, scheduler);

		let router = ViewRouter::new(Site {
			origin: location.origin()?,
			hostname: location.hostname()?,
		});
		{
			let document = document.clone();
			let content_id = config.content_id.clone();
			controller.subscribe(move |event| {
				let view = router.render(&event.request, event.snapshot.as_deref());
				if let Err(error) = mount(&document, &content_id, &view) {
					error!(?error, "Failed to mount the rendered view.");
				}
			});
		}

		let on_click = {
			let controller = Rc::clone(&controller);
			let location = location.clone();
			Closure::wrap(Box::new(move |event: MouseEvent| {
				if let Some(anchor) = navigation_anchor(&event, &location) {
					event.prevent_default();
					controller.navigate(&anchor.pathname(), &anchor.search(), &anchor.hash());
				}
			}) as Box<dyn FnMut(MouseEvent)>)
		};
		document.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;

		let on_popstate = {
			let controller = Rc::clone(&controller);
			let location = location.clone();
			Closure::wrap(Box::new(move |event: PopStateEvent| {
				let request = BrowserHistory::decode_state(&event.state()).unwrap_or_else(|| {
					NavigationRequest::from_location(&location.pathname().unwrap_or_default(), &location.search().unwrap_or_default())
				});
				controller.restore(request);
			}) as Box<dyn FnMut(PopStateEvent)>)
		};
		window.add_event_listener_with_callback("popstate", on_popstate.as_ref().unchecked_ref())?;

		controller.load(&location.pathname()?, &location.search()?, &location.hash()?);
		info!(data_path = config.data_path.as_str(), "Console started.");

		Ok(Self {
			window,
			document,
			controller,
			on_click,
			on_popstate,
		})
	}

	/// The path of the current navigation request.
	#[wasm_bindgen(getter)]
	pub fn path(&self) -> String {
		self.controller.current_request().path
	}
}

impl WebConsole {
	#[must_use]
	pub fn controller(&self) -> &Rc<NavigationController> {
		&self.controller
	}
}

impl Drop for WebConsole {
	fn drop(&mut self) {
		if let Err(error) = self.document.remove_event_listener_with_callback("click", self.on_click.as_ref().unchecked_ref()) {
			error!(?error, "Failed to remove the click listener.");
		}
		if let Err(error) = self.window.remove_event_listener_with_callback("popstate", self.on_popstate.as_ref().unchecked_ref()) {
			error!(?error, "Failed to remove the popstate listener.");
		}
		self.controller.stop();
		info!("Console stopped.");
	}
}
