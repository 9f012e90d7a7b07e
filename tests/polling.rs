use core::{cell::RefCell, time::Duration};
use serde_json::{json, Value};
use stagger_web::{
	backoff::{BackoffConfig, BackoffScheduler},
	deterministic::{ScriptedTransport, VirtualTimers},
	error::TransportError,
	fetch::ConditionalFetcher,
	host::RawResponse,
};
use std::rc::Rc;

const DATA: &str = "/api/data";

struct Harness {
	timers: Rc<VirtualTimers>,
	transport: Rc<ScriptedTransport>,
	scheduler: Rc<BackoffScheduler>,
	received: Rc<RefCell<Vec<Rc<Value>>>>,
}

impl Harness {
	fn new(min_ms: u64, max_ms: u64) -> Self {
		let timers = VirtualTimers::new();
		let transport = ScriptedTransport::with_clock(timers.clone());
		let fetcher = ConditionalFetcher::new(transport.clone(), timers.clone());
		let config = BackoffConfig::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms)).unwrap();
		let scheduler = BackoffScheduler::new(config, fetcher, timers.clone());
		Self {
			timers,
			transport,
			scheduler,
			received: Rc::default(),
		}
	}

	fn start(&self) {
		let received = Rc::clone(&self.received);
		self.scheduler.start_periodic(DATA, move |document| received.borrow_mut().push(document));
	}

	fn advance_ms(&self, ms: u64) {
		self.timers.advance(Duration::from_millis(ms));
	}

	fn sent_at_ms(&self) -> Vec<u64> {
		self.transport.sent().iter().map(|request| request.sent_at.unwrap().0).collect()
	}
}

#[test]
fn fetch_times_double_then_hold() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.advance_ms(12_000);

	assert_eq!(harness.sent_at_ms(), [0, 500, 1500, 3500, 7500, 11500]);
	assert_eq!(harness.timers.live_timers(), 1);
}

#[test]
fn restarting_leaves_a_single_timer() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.start();

	assert_eq!(harness.timers.live_timers(), 1);
	assert_eq!(harness.scheduler.state(DATA).unwrap().cycle(), 2);
	assert_eq!(harness.transport.sent().len(), 2);

	harness.advance_ms(500);
	assert_eq!(harness.transport.sent().len(), 3);
}

#[test]
fn restart_during_fixed_rate_returns_to_the_floor() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.advance_ms(8000);
	assert_eq!(harness.sent_at_ms(), [0, 500, 1500, 3500, 7500]);

	harness.start();
	assert_eq!(harness.timers.live_timers(), 1);
	assert_eq!(harness.timers.next_due(), Some(Duration::from_millis(8500)));

	harness.advance_ms(1000);
	assert_eq!(harness.sent_at_ms(), [0, 500, 1500, 3500, 7500, 8000, 8500]);
}

#[test]
fn not_modified_keeps_snapshot_and_validator() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.transport.respond(Ok(RawResponse::ok(r#"{"repos":{}}"#, Some("\"v1\""))));

	assert_eq!(*harness.received.borrow(), [Rc::new(json!({ "repos": {} }))]);
	assert_eq!(harness.scheduler.state(DATA).unwrap().cache_validator(), Some("\"v1\""));

	harness.advance_ms(500);
	let request = harness.transport.respond(Ok(RawResponse::not_modified())).unwrap();
	assert_eq!(request.validator.as_deref(), Some("\"v1\""));

	let state = harness.scheduler.state(DATA).unwrap();
	assert_eq!(harness.received.borrow().len(), 1);
	assert_eq!(state.cache_validator(), Some("\"v1\""));
	assert_eq!(state.consecutive_failures(), 0);
	assert_eq!(state.last_attempt_at().unwrap().0, 500);
}

#[test]
fn failures_count_up_without_touching_validator_or_delay() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.transport.respond(Ok(RawResponse::ok("{}", Some("v1"))));

	harness.advance_ms(500);
	harness.transport.respond(Err(TransportError::Network {
		message: "offline".to_owned(),
	}));
	let state = harness.scheduler.state(DATA).unwrap();
	assert_eq!(state.consecutive_failures(), 1);
	assert_eq!(state.cache_validator(), Some("v1"));
	assert_eq!(state.last_attempt_at().unwrap().0, 0);
	assert_eq!(state.current_interval(), Some(Duration::from_millis(2000)));

	harness.advance_ms(1000);
	let request = harness.transport.respond(Err(TransportError::Status { status: 503 })).unwrap();
	assert_eq!(request.validator.as_deref(), Some("v1"));
	assert_eq!(harness.scheduler.state(DATA).unwrap().consecutive_failures(), 2);

	harness.advance_ms(2000);
	harness.transport.respond(Ok(RawResponse::not_modified()));
	assert_eq!(harness.scheduler.state(DATA).unwrap().consecutive_failures(), 0);
	assert_eq!(harness.received.borrow().len(), 1);
}

#[test]
fn stop_clears_the_timer_but_not_in_flight_requests() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.scheduler.stop(DATA);

	assert_eq!(harness.timers.live_timers(), 0);
	assert_eq!(harness.scheduler.state(DATA).unwrap().current_interval(), None);

	harness.advance_ms(10_000);
	assert_eq!(harness.transport.sent().len(), 1);

	harness.transport.respond(Ok(RawResponse::ok("[1]", None)));
	assert_eq!(*harness.received.borrow(), [Rc::new(json!([1]))]);
}

#[test]
fn stop_during_fixed_rate() {
	let harness = Harness::new(500, 1000);
	harness.start();
	harness.advance_ms(3000);
	assert_eq!(harness.sent_at_ms(), [0, 500, 1500, 2500]);

	harness.scheduler.stop(DATA);
	assert_eq!(harness.timers.live_timers(), 0);
	harness.advance_ms(3000);
	assert_eq!(harness.transport.sent().len(), 4);
}

#[test]
fn equal_bounds_poll_at_a_fixed_rate_from_the_start() {
	let harness = Harness::new(1000, 1000);
	harness.start();
	harness.advance_ms(3000);
	assert_eq!(harness.sent_at_ms(), [0, 1000, 2000, 3000]);
}

#[test]
fn late_response_of_an_older_cycle_wins_by_default() {
	let harness = Harness::new(500, 4000);
	harness.start();
	harness.start();

	harness.transport.respond_latest(Ok(RawResponse::ok(r#""new""#, None)));
	harness.transport.respond(Ok(RawResponse::ok(r#""old""#, None)));

	assert_eq!(*harness.received.borrow(), [Rc::new(json!("new")), Rc::new(json!("old"))]);
}

#[test]
fn superseded_responses_can_be_discarded() {
	let timers = VirtualTimers::new();
	let transport = ScriptedTransport::with_clock(timers.clone());
	let fetcher = ConditionalFetcher::new(transport.clone(), timers.clone());
	let scheduler = BackoffScheduler::new(BackoffConfig::default().discard_superseded(true), fetcher, timers.clone());

	let received = Rc::new(RefCell::new(Vec::new()));
	for _ in 0..2 {
		let received = Rc::clone(&received);
		scheduler.start_periodic(DATA, move |document| received.borrow_mut().push(document));
	}

	transport.respond_latest(Ok(RawResponse::ok(r#""new""#, Some("v2"))));
	transport.respond(Ok(RawResponse::ok(r#""old""#, Some("v1"))));

	assert_eq!(*received.borrow(), [Rc::new(json!("new"))]);
	// Bookkeeping still follows arrival order.
	assert_eq!(scheduler.state(DATA).unwrap().cache_validator(), Some("v1"));
}
