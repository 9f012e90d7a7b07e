use core::cell::{Cell, RefCell};
use std::{collections::VecDeque, rc::Rc};

/// Returned by [`Signal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A synchronous, single-threaded observer list.
///
/// [`publish`](`Signal::publish`) calls every subscriber before returning, in subscription order.
/// Subscribers may (un)subscribe or publish re-entrantly; changes to the list take effect with the next publication.
///
/// An event published from inside a subscriber is queued and delivered once the current event reached every subscriber,
/// so the last event each subscriber sees is the last one published.
pub struct Signal<T> {
	next_id: Cell<u64>,
	#[allow(clippy::type_complexity)]
	subscribers: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(&T)>)>>,
	delivering: Cell<bool>,
	queued: RefCell<VecDeque<T>>,
}

impl<T> Default for Signal<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Signal<T> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			next_id: Cell::new(0),
			subscribers: RefCell::default(),
			delivering: Cell::new(false),
			queued: RefCell::default(),
		}
	}

	pub fn subscribe(&self, subscriber: impl Fn(&T) + 'static) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.subscribers.borrow_mut().push((id, Rc::new(subscriber)));
		id
	}

	/// Returns whether `id` was still subscribed.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut subscribers = self.subscribers.borrow_mut();
		let len = subscribers.len();
		subscribers.retain(|(subscribed, _)| *subscribed != id);
		subscribers.len() != len
	}

	pub fn publish(&self, event: &T)
	where
		T: Clone,
	{
		if self.delivering.replace(true) {
			self.queued.borrow_mut().push_back(event.clone());
			return;
		}

		self.deliver(event);
		loop {
			let next = self.queued.borrow_mut().pop_front();
			match next {
				Some(event) => self.deliver(&event),
				None => break,
			}
		}
		self.delivering.set(false);
	}

	fn deliver(&self, event: &T) {
		let subscribers: Vec<_> = self.subscribers.borrow().iter().map(|(_, subscriber)| Rc::clone(subscriber)).collect();
		for subscriber in subscribers {
			subscriber(event);
		}
	}

	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		self.subscribers.borrow().len()
	}
}

impl<T> core::fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Signal").field("subscribers", &self.subscriber_count()).finish()
	}
}
