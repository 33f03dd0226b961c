//! Error type returned by fallible dispatcher operations.

use thiserror::Error;

/// The three failure kinds a dispatcher operation can report.
///
/// This replaces the `(bool, *mut err)` convention of a C-style eventing API
/// with a plain `Result`; callers who don't care about the reason can
/// discard it with `.ok()`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The per-moment pool could not be allocated. Only ever produced by
    /// [`crate::Event::trigger`] and [`crate::Dispatcher::prepare_trigger`],
    /// and only when an injected [`crate::pool::AllocHook`] reports failure.
    #[error("no memory available to allocate the triggering")]
    NoMemory,
    /// An event name was empty.
    #[error("event name must not be empty")]
    InvalidArg,
    /// An event with that (case-folded) name already exists on the dispatcher.
    #[error("an event with this name already exists")]
    InvalidState,
}
