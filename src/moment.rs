//! A queued triggering, and the pre-allocated form a caller can stash ahead
//! of time to make `trigger_prepared` infallible.

use std::any::Any;
use std::rc::Rc;

use crate::event::ResultFn;
use crate::pool::Pool;

/// One pending delivery: a target event, its payload, and the optional
/// result callback, queued on a dispatcher until the drain loop reaches it.
pub(crate) struct Moment<S> {
    pub(crate) event_key: Rc<str>,
    pub(crate) payload: Option<Rc<dyn Any>>,
    pub(crate) result_cb: Option<ResultFn<S>>,
    pub(crate) result_arg: Option<Rc<dyn Any>>,
    pub(crate) handled: bool,
    pub(crate) pool: Pool,
}

/// A pool allocated ahead of time so that a later call to
/// [`crate::Event::trigger_prepared`] cannot fail with `NoMemory` and
/// performs no allocation of its own.
///
/// Obtained from [`crate::Dispatcher::prepare_trigger`]. If never consumed
/// by `trigger_prepared`, drop it (or call
/// [`crate::Dispatcher::unprepare_trigger`], equivalent to dropping it) to
/// release the reservation.
pub struct TriggerData {
    pub(crate) pool: Pool,
}
