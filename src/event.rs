//! [`Event`] is the per-name notifier bindings are registered against and
//! triggerings are issued through.
//!
//! An `Event` is a lightweight handle (a dispatcher handle plus a name)
//! rather than an owning heap node with a back-pointer to its dispatcher.
//! The actual binding list lives inside the dispatcher's shared state
//! (see [`EventState`]), keyed by the event's case-folded name. This avoids
//! the dispatcher-event reference cycle the reference implementation
//! resolves with raw, manually-managed pointers; see `DESIGN.md`.

use std::any::Any;
use std::rc::Rc;

use crate::binding::{BindingList, NotifyFn};
use crate::error::DispatchError;
use crate::pool::Pool;
use crate::Dispatcher;

/// Per-name state owned by the dispatcher: the original-case name and the
/// binding list. Never exposed directly; reached through [`Event`] handles.
pub(crate) struct EventState<S> {
    pub(crate) name: Rc<str>,
    pub(crate) bindings: BindingList<S>,
}

impl<S> EventState<S> {
    pub(crate) fn new(name: Rc<str>) -> Self {
        Self {
            name,
            bindings: BindingList::default(),
        }
    }
}

/// A callback invoked once a moment's binding list has been fully walked,
/// with the final OR'd `handled` value.
pub type ResultFn<S> = fn(&EventData<'_, S>, bool, Option<Rc<dyn Any>>);

/// A handle to a named notifier owned by a [`Dispatcher`].
///
/// Cloning an `Event` is cheap (a dispatcher handle clone plus an `Rc<str>`
/// clone); every clone refers to the same underlying binding list.
pub struct Event<S> {
    pub(crate) dispatcher: Dispatcher<S>,
    pub(crate) key: Rc<str>,
}

impl<S> Clone for Event<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            key: self.key.clone(),
        }
    }
}

impl<S> Event<S> {
    pub(crate) fn new(dispatcher: Dispatcher<S>, key: Rc<str>) -> Self {
        Self { dispatcher, key }
    }

    /// The dispatcher this event belongs to.
    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    /// The dispatcher's source value.
    pub fn get_source(&self) -> Rc<S> {
        self.dispatcher.source()
    }

    /// The event's original-case name.
    pub fn get_name(&self) -> Rc<str> {
        self.dispatcher
            .with_event_state(&self.key, |state| state.name.clone())
            .expect("event exists for the lifetime of its dispatcher")
    }

    /// Binds `cb` with `arg` to this event. A second bind of the same `cb`
    /// is a no-op (see [`crate::binding::BindingList::bind`]).
    pub fn bind(&self, cb: NotifyFn<S>, arg: Option<Rc<dyn Any>>) {
        let running = self.dispatcher.is_running();
        self.dispatcher
            .with_event_state_mut(&self.key, |state| state.bindings.bind(cb, arg, running))
            .expect("event exists for the lifetime of its dispatcher");
    }

    /// Unbinds `cb` from this event. A callback that was never bound is a
    /// silent no-op.
    pub fn unbind(&self, cb: NotifyFn<S>) {
        let running = self.dispatcher.is_running();
        self.dispatcher
            .with_event_state_mut(&self.key, |state| state.bindings.unbind(cb, running))
            .expect("event exists for the lifetime of its dispatcher");
    }

    /// Queues a triggering of this event and, if the dispatcher is not
    /// already draining, drains it synchronously before returning.
    pub fn trigger(
        &self,
        payload: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn<S>>,
        result_arg: Option<Rc<dyn Any>>,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .enqueue_and_drain(self.key.clone(), payload, result_cb, result_arg)
    }

    /// Consumes a pre-allocated [`crate::TriggerData`] to queue a triggering
    /// that cannot fail. See [`Dispatcher::prepare_trigger`].
    pub fn trigger_prepared(
        &self,
        payload: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn<S>>,
        result_arg: Option<Rc<dyn Any>>,
        trigger_data: crate::TriggerData,
    ) {
        self.dispatcher.enqueue_prepared_and_drain(
            self.key.clone(),
            payload,
            result_cb,
            result_arg,
            trigger_data,
        );
    }
}

/// The record delivered to every callback invoked for one moment.
///
/// `handled` starts each callback invocation at the value accumulated so
/// far this moment and is monotonic: once any callback sets it, it stays
/// set for the rest of the moment.
pub struct EventData<'a, S> {
    source: Rc<S>,
    name: Rc<str>,
    event: Event<S>,
    payload: Option<Rc<dyn Any>>,
    handled: bool,
    pool: &'a mut Pool,
}

impl<'a, S> EventData<'a, S> {
    pub(crate) fn new(
        source: Rc<S>,
        name: Rc<str>,
        event: Event<S>,
        payload: Option<Rc<dyn Any>>,
        handled: bool,
        pool: &'a mut Pool,
    ) -> Self {
        Self {
            source,
            name,
            event,
            payload,
            handled,
            pool,
        }
    }

    /// The dispatcher's source value.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The event's original-case name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event this moment is being delivered for.
    pub fn event(&self) -> &Event<S> {
        &self.event
    }

    /// The payload this triggering was called with, if any.
    pub fn payload(&self) -> Option<&Rc<dyn Any>> {
        self.payload.as_ref()
    }

    /// Whether the moment has been marked handled so far.
    pub fn handled(&self) -> bool {
        self.handled
    }

    /// Marks the moment handled. Monotonic: calling this with `false` after
    /// it has been set does nothing.
    pub fn set_handled(&mut self, handled: bool) {
        self.handled |= handled;
    }

    /// The moment's scratch pool.
    pub fn pool(&mut self) -> &mut Pool {
        self.pool
    }
}
