//! Single-value broadcast channel scoped to one editor instance.
//!
//! A [`Channel`] holds at most one current value. Publishing overwrites it and
//! notifies every live subscriber synchronously; nothing is queued. Handlers
//! are snapshotted before dispatch, so a handler may publish again or drop its
//! own [`Subscription`] without re-borrowing the channel. A nested publish
//! supersedes the outer one: the outer dispatch stops, so no handler sees the
//! older value after the newer one.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    current: T,
    generation: u64,
    next_token: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

pub struct Channel<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> Channel<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                current: initial,
                generation: 0,
                next_token: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Overwrite the current value and notify subscribers.
    pub fn publish(&self, value: T) {
        let (generation, handlers): (u64, Vec<Handler<T>>) = {
            let mut inner = self.inner.borrow_mut();
            inner.current = value.clone();
            inner.generation += 1;
            let handlers = inner.handlers.iter().map(|(_, h)| Rc::clone(h)).collect();
            (inner.generation, handlers)
        };
        for handler in handlers {
            if self.inner.borrow().generation != generation {
                break;
            }
            handler(&value);
        }
    }

    pub fn current(&self) -> T {
        self.inner.borrow().current.clone()
    }

    /// Register a handler. It is not called with the current value; read
    /// [`Channel::current`] on mount instead.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        let token = {
            let mut inner = self.inner.borrow_mut();
            let token = inner.next_token;
            inner.next_token += 1;
            inner.handlers.push((token, Rc::new(handler)));
            token
        };
        let weak: Weak<RefCell<Inner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().handlers.retain(|(t, _)| *t != token);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }
}

/// Unsubscribe token. Dropping it removes the handler from its channel.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
