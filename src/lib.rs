//! A reentrancy-safe, breadth-first synchronous event dispatcher.
//!
//! A [`Dispatcher`] owns a set of named [`Event`]s; each event carries an
//! ordered list of bindings (callback + user argument). Any call site may
//! [`Event::trigger`] an event to deliver a payload to every current
//! binding, accumulate a boolean "handled" outcome, and report it to an
//! optional result callback.
//!
//! # Key properties
//!
//! - **Breadth-first delivery**: a callback that triggers further events
//!   does not recurse into them immediately. The trigger is queued and
//!   runs only after the current triggering's binding list is exhausted.
//! - **Reentrancy safety**: callbacks may bind, unbind (including
//!   themselves), or even destroy the dispatcher they're running under,
//!   and the in-flight traversal stays well-defined. See the [`binding`]
//!   module for the pending-flag scheme this relies on.
//! - **Allocation discipline**: [`Dispatcher::prepare_trigger`] lets a
//!   caller pre-allocate a triggering's scratch pool so that the delivery
//!   itself ([`Event::trigger_prepared`]) cannot fail with `NoMemory`.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use revent::Dispatcher;
//!
//! fn on_greet(data: &mut revent::EventData<'_, RefCell<Vec<String>>>, _arg: Option<std::rc::Rc<dyn std::any::Any>>) {
//!     data.source().borrow_mut().push(format!("hello from {}", data.name()));
//!     data.set_handled(true);
//! }
//!
//! let dispatcher = Dispatcher::create(RefCell::new(Vec::new()));
//! let event = dispatcher.create_event("greet").unwrap();
//! event.bind(on_greet, None);
//! event.trigger(None, None, None).unwrap();
//!
//! let log = dispatcher.source();
//! let log = log.borrow();
//! assert_eq!(log.len(), 1);
//! assert_eq!(log[0], "hello from greet");
//! ```
//!
//! This crate is single-threaded by design: [`Dispatcher`] is `!Send` and
//! `!Sync` (its interior mutability is a [`RefCell`](std::cell::RefCell),
//! not a `Mutex`), so cross-thread misuse is a compile error rather than a
//! data race.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod binding;
mod error;
mod event;
mod moment;
pub mod pool;

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;

pub use crate::binding::NotifyFn;
pub use crate::error::DispatchError;
use crate::event::EventState;
pub use crate::event::{Event, EventData, ResultFn};
use crate::moment::Moment;
pub use crate::moment::TriggerData;
pub use crate::pool::{AllocHook, Pool, SystemAllocHook};
#[cfg(feature = "mock")]
pub use crate::pool::MockAllocHook;

/// The shared, interior-mutable state backing a [`Dispatcher`] handle.
struct Inner<S> {
    source: Rc<S>,
    events: FxHashMap<String, EventState<S>>,
    queue: VecDeque<Moment<S>>,
    running: bool,
    alloc_hook: Rc<dyn AllocHook>,
}

/// A cheap, cloneable handle to an event dispatcher.
///
/// Every clone refers to the same underlying source, event map, and
/// trigger queue: the idiomatic-Rust analogue of the reference-counted
/// pointer a C API would hand back. `Dispatcher<S>` is `!Send`/`!Sync`;
/// all operations on a dispatcher and the events it owns must happen on
/// the thread that created it.
pub struct Dispatcher<S> {
    inner: Rc<RefCell<Inner<S>>>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> Dispatcher<S> {
    /// Creates a dispatcher around `source`, using the system allocator
    /// for its per-moment pools.
    pub fn create(source: S) -> Self {
        Self::create_with_allocator(source, Rc::new(SystemAllocHook))
    }

    /// Creates a dispatcher whose per-moment pools are allocated through
    /// `alloc_hook`. Used by tests that need to simulate allocation
    /// failure or count allocations (see [`Dispatcher::prepare_trigger`]).
    pub fn create_with_allocator(source: S, alloc_hook: Rc<dyn AllocHook>) -> Self {
        tracing::trace!("dispatcher created");
        Self {
            inner: Rc::new(RefCell::new(Inner {
                source: Rc::new(source),
                events: FxHashMap::default(),
                queue: VecDeque::new(),
                running: false,
                alloc_hook,
            })),
        }
    }

    /// Drops this handle. If a drain is in progress (this handle was
    /// obtained from inside one of its own callbacks), the dispatcher's
    /// shared state stays alive until that drain's own held reference is
    /// released; see [`Dispatcher::drain`] and `DESIGN.md`.
    pub fn destroy(self) {
        tracing::debug!("dispatcher handle dropped");
    }

    /// The dispatcher's source value.
    pub fn source(&self) -> Rc<S> {
        self.inner.borrow().source.clone()
    }

    /// Creates a new event named `name`. Fails with
    /// [`DispatchError::InvalidArg`] if `name` is empty, or
    /// [`DispatchError::InvalidState`] if an event with the same
    /// case-folded name already exists.
    pub fn create_event(&self, name: &str) -> Result<Event<S>, DispatchError> {
        if name.is_empty() {
            return Err(DispatchError::InvalidArg);
        }
        let key = name.to_ascii_lowercase();
        let mut inner = self.inner.borrow_mut();
        if inner.events.contains_key(&key) {
            return Err(DispatchError::InvalidState);
        }
        inner.events.insert(key.clone(), EventState::new(Rc::from(name)));
        drop(inner);
        tracing::trace!(event = name, "event created");
        Ok(Event::new(self.clone(), Rc::from(key)))
    }

    /// Looks up an existing event by name (ASCII case-insensitive).
    pub fn get_event(&self, name: &str) -> Option<Event<S>> {
        let key = name.to_ascii_lowercase();
        let found = self.inner.borrow().events.contains_key(&key);
        found.then(|| Event::new(self.clone(), Rc::from(key)))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    pub(crate) fn with_event_state<T>(
        &self,
        key: &str,
        f: impl FnOnce(&EventState<S>) -> T,
    ) -> Option<T> {
        let inner = self.inner.borrow();
        inner.events.get(key).map(f)
    }

    pub(crate) fn with_event_state_mut<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut EventState<S>) -> T,
    ) -> Option<T> {
        let mut inner = self.inner.borrow_mut();
        inner.events.get_mut(key).map(f)
    }

    /// Pre-allocates a pool large enough to back one moment, so that a
    /// later [`Event::trigger_prepared`] call cannot fail with
    /// `NoMemory` and performs no allocation of its own.
    pub fn prepare_trigger(&self) -> Result<TriggerData, DispatchError> {
        let hook = self.inner.borrow().alloc_hook.clone();
        let pool = Pool::try_new(hook, pool::DEFAULT_POOL_CAPACITY)?;
        Ok(TriggerData { pool })
    }

    /// Releases a [`TriggerData`] obtained from [`Dispatcher::prepare_trigger`]
    /// that was never consumed by [`Event::trigger_prepared`]. Equivalent to
    /// simply dropping it.
    pub fn unprepare_trigger(&self, trigger_data: TriggerData) {
        drop(trigger_data);
    }

    pub(crate) fn enqueue_and_drain(
        &self,
        event_key: Rc<str>,
        payload: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn<S>>,
        result_arg: Option<Rc<dyn Any>>,
    ) -> Result<(), DispatchError> {
        let hook = self.inner.borrow().alloc_hook.clone();
        let pool = Pool::try_new(hook, pool::DEFAULT_POOL_CAPACITY)?;
        let moment = Moment {
            event_key,
            payload,
            result_cb,
            result_arg,
            handled: false,
            pool,
        };
        self.enqueue(moment);
        Ok(())
    }

    pub(crate) fn enqueue_prepared_and_drain(
        &self,
        event_key: Rc<str>,
        payload: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn<S>>,
        result_arg: Option<Rc<dyn Any>>,
        trigger_data: TriggerData,
    ) {
        let moment = Moment {
            event_key,
            payload,
            result_cb,
            result_arg,
            handled: false,
            pool: trigger_data.pool,
        };
        self.enqueue(moment);
    }

    /// Pushes `moment` onto the queue and, if no drain is already in
    /// progress on this dispatcher, drains it synchronously.
    fn enqueue(&self, moment: Moment<S>) {
        let should_drain = {
            let mut inner = self.inner.borrow_mut();
            inner.queue.push_back(moment);
            !inner.running
        };
        if should_drain {
            self.drain();
        }
    }

    /// The outermost drain loop: processes moments in FIFO order
    /// until the queue is empty, holding its own clone of the shared
    /// state for the duration so a `destroy()` called from a callback
    /// cannot free it mid-drain.
    fn drain(&self) {
        let _keep_alive = self.inner.clone();
        self.inner.borrow_mut().running = true;
        tracing::trace!("drain started");

        loop {
            let moment = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.pop_front() {
                    Some(moment) => moment,
                    None => break,
                }
            };
            self.run_moment(moment);
        }

        self.inner.borrow_mut().running = false;
        tracing::trace!("drain finished");
    }

    /// Walks one moment's binding list breadth-first-safely: every
    /// callback lookup re-borrows `Inner` freshly and only for the
    /// duration of fetching `(cb, arg)`, so a callback that mutates the
    /// same event (bind/unbind/trigger/destroy) is never fighting an
    /// outstanding `RefCell` borrow.
    fn run_moment(&self, mut moment: Moment<S>) {
        let source = self.inner.borrow().source.clone();
        let name = self
            .with_event_state(&moment.event_key, |state| state.name.clone())
            .expect("a moment's event is never removed from its dispatcher");
        let event = Event::new(self.clone(), moment.event_key.clone());

        let mut idx = 0;
        loop {
            let step = self
                .with_event_state(&moment.event_key, |state| {
                    if idx >= state.bindings.len() {
                        None
                    } else {
                        Some(state.bindings.fireable(idx))
                    }
                })
                .expect("a moment's event is never removed from its dispatcher");
            let Some(fireable) = step else { break };

            if let Some((cb, arg)) = fireable {
                let new_handled = {
                    let mut data = EventData::new(
                        source.clone(),
                        name.clone(),
                        event.clone(),
                        moment.payload.clone(),
                        moment.handled,
                        &mut moment.pool,
                    );
                    cb(&mut data, arg);
                    data.handled()
                };
                moment.handled = new_handled;
            }
            idx += 1;
        }

        self.with_event_state_mut(&moment.event_key, |state| state.bindings.reconcile());

        if let Some(result_cb) = moment.result_cb.take() {
            let data = EventData::new(
                source,
                name,
                event,
                moment.payload.clone(),
                moment.handled,
                &mut moment.pool,
            );
            result_cb(&data, moment.handled, moment.result_arg.clone());
        }
        // `moment` (and its pool) is dropped here, after the result
        // callback has observed it: the pool must outlive the result
        // callback's view of this delivery.
    }
}
