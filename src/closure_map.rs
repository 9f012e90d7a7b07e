use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::trace;
use wasm_bindgen::closure::Closure;

#[derive(Debug, Default)]
pub(crate) struct Flags {
	/// JavaScript is currently inside the closure.
	running: Cell<bool>,
	/// JavaScript won't call the closure again.
	spent: Cell<bool>,
}

struct Published {
	_closure: Closure<dyn FnMut()>,
	flags: Rc<Flags>,
}

/// Keeps timer closures alive for as long as JavaScript may call them, keyed by timer handle.
///
/// Spent closures are freed lazily on the next (un)publication, and never while they are running.
#[derive(Default)]
pub(crate) struct ClosureMap {
	published: RefCell<HashMap<i32, Published>>,
}

impl ClosureMap {
	/// Wraps a callback that JavaScript calls once.
	pub(crate) fn wrap_once(callback: Box<dyn FnOnce()>) -> (Closure<dyn FnMut()>, Rc<Flags>) {
		let mut callback = Some(callback);
		Self::wrap(move || {
			if let Some(callback) = callback.take() {
				callback();
			}
		}, true)
	}

	/// Wraps a callback that JavaScript calls until it's cleared.
	pub(crate) fn wrap_repeating(callback: Box<dyn FnMut()>) -> (Closure<dyn FnMut()>, Rc<Flags>) {
		Self::wrap(callback, false)
	}

	fn wrap(mut callback: impl FnMut() + 'static, once: bool) -> (Closure<dyn FnMut()>, Rc<Flags>) {
		let flags = Rc::new(Flags::default());
		let closure = {
			let flags = Rc::clone(&flags);
			Closure::wrap(Box::new(move || {
				flags.running.set(true);
				callback();
				flags.running.set(false);
				if once {
					flags.spent.set(true);
				}
			}) as Box<dyn FnMut()>)
		};
		(closure, flags)
	}

	pub(crate) fn publish(&self, handle: i32, closure: Closure<dyn FnMut()>, flags: Rc<Flags>) {
		self.sweep();
		self.published.borrow_mut().insert(handle, Published { _closure: closure, flags });
		trace!(handle, "Published timer closure.");
	}

	/// Marks the closure for `handle` as spent, freeing it unless it's running.
	pub(crate) fn unpublish(&self, handle: i32) {
		if let Some(published) = self.published.borrow().get(&handle) {
			published.flags.spent.set(true);
		}
		self.sweep();
	}

	fn sweep(&self) {
		let mut published = self.published.borrow_mut();
		let before = published.len();
		published.retain(|_, published| published.flags.running.get() || !published.flags.spent.get());
		let freed = before - published.len();
		if freed > 0 {
			trace!(freed, "Freed spent timer closure(s).");
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.published.borrow().len()
	}
}

impl core::fmt::Debug for ClosureMap {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ClosureMap").field("len", &self.len()).finish()
	}
}
