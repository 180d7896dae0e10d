//! Synchronous single-producer, multi-subscriber notification channel
//!
//! Used to report image load progress and terminal outcomes. Values go to
//! `subscribe` handlers, failures go to `catch` handlers; the two streams are
//! never mixed.
//!
//! Channels latch: a handler attached late immediately receives the most
//! recent value (or the failure), so a producer may resolve a channel before
//! anybody listens. Once failed, a channel ignores further traffic.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::LoadError;

type Handler<T> = Rc<dyn Fn(&T)>;

struct ChannelState<T, E> {
    subscribers: Vec<Handler<T>>,
    error_handlers: Vec<Handler<E>>,
    latest: Option<Rc<T>>,
    error: Option<Rc<E>>,
}

/// Cloneable handle to a notification channel. Clones share subscribers.
pub struct Channel<T, E> {
    state: Rc<RefCell<ChannelState<T, E>>>,
}

impl<T, E> Clone for Channel<T, E> {
    fn clone(&self) -> Self {
        Self { state: Rc::clone(&self.state) }
    }
}

impl<T, E> Default for Channel<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Channel<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Channel")
            .field("subscribers", &state.subscribers.len())
            .field("error_handlers", &state.error_handlers.len())
            .field("has_value", &state.latest.is_some())
            .field("failed", &state.error.is_some())
            .finish()
    }
}

impl<T, E> Channel<T, E> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ChannelState {
                subscribers: Vec::new(),
                error_handlers: Vec::new(),
                latest: None,
                error: None,
            })),
        }
    }

    /// Attach a value handler. Returns the channel so `catch` can be chained.
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> &Self {
        let handler: Handler<T> = Rc::new(handler);
        let replay = {
            let mut state = self.state.borrow_mut();
            state.subscribers.push(Rc::clone(&handler));
            state.latest.clone()
        };
        if let Some(value) = replay {
            handler(&value);
        }
        self
    }

    /// Attach a failure handler.
    pub fn catch(&self, handler: impl Fn(&E) + 'static) -> &Self {
        let handler: Handler<E> = Rc::new(handler);
        let replay = {
            let mut state = self.state.borrow_mut();
            state.error_handlers.push(Rc::clone(&handler));
            state.error.clone()
        };
        if let Some(error) = replay {
            handler(&error);
        }
        self
    }

    /// Deliver a value to every subscriber.
    ///
    /// Handlers run after the channel's own borrow is released, so they may
    /// subscribe or publish again.
    pub fn publish(&self, value: T) {
        let (value, subscribers) = {
            let mut state = self.state.borrow_mut();
            if state.error.is_some() {
                return;
            }
            let value = Rc::new(value);
            state.latest = Some(Rc::clone(&value));
            (value, state.subscribers.clone())
        };
        for subscriber in subscribers {
            subscriber(&value);
        }
    }

    /// Terminate the channel with a failure. Only the first failure is kept.
    pub fn fail(&self, error: E) {
        let (error, handlers) = {
            let mut state = self.state.borrow_mut();
            if state.error.is_some() {
                return;
            }
            let error = Rc::new(error);
            state.error = Some(Rc::clone(&error));
            (error, state.error_handlers.clone())
        };
        for handler in handlers {
            handler(&error);
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state.borrow().error.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }
}

/// One load progress tick. The terminal success tick has `loaded == total`
/// and carries the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress<P> {
    pub loaded: u64,
    pub total: u64,
    pub data: Option<P>,
}

impl<P> Progress<P> {
    pub fn tick(loaded: u64, total: u64) -> Self {
        Self { loaded, total, data: None }
    }

    pub fn complete(size: u64, data: P) -> Self {
        Self { loaded: size, total: size, data: Some(data) }
    }

    pub fn is_complete(&self) -> bool {
        self.data.is_some() && self.loaded == self.total
    }

    /// Fraction of the payload received, in `0.0..=1.0`
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            if self.is_complete() { 1.0 } else { 0.0 }
        } else {
            (self.loaded as f64 / self.total as f64).clamp(0.0, 1.0) as f32
        }
    }
}

/// Channel carrying progress ticks for one image source
pub type ProgressChannel<P> = Channel<Progress<P>, LoadError>;

/// Channel resolved once when an item finishes loading (or fails)
pub type Completion = Channel<(), LoadError>;
