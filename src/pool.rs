//! A scoped arena used to back the scratch data of one triggering.
//!
//! [`Pool`] is this crate's sole heap-allocation choke point: everything
//! else (the event map, binding lists, the moment queue) uses ordinary
//! `Vec`/`HashMap` growth and is treated as infallible, matching idiomatic
//! Rust practice. The pool is a single place where out-of-memory pressure
//! can be simulated deterministically in tests, via the [`AllocHook`]
//! trait, and where a caller who cannot tolerate an allocation failure on
//! the delivery path can pre-allocate (see
//! [`crate::Dispatcher::prepare_trigger`]).

use std::fmt;
use std::rc::Rc;

use bumpalo::Bump;

use crate::error::DispatchError;

/// Default scratch capacity reserved for one moment's pool.
///
/// Chosen generously enough that ordinary payload/event-data bookkeeping
/// never needs the arena to grow past its first chunk.
pub(crate) const DEFAULT_POOL_CAPACITY: usize = 256;

/// An injectable allocator interface, analogous to a C API's
/// `(malloc, realloc, free)` triple.
///
/// Production code never needs to implement this; [`SystemAllocHook`] is
/// the default. Tests install a failing or counting implementation to
/// exercise the `NoMemory` path and to verify that
/// [`prepare_trigger`](crate::Dispatcher::prepare_trigger) and
/// [`unprepare_trigger`](crate::Dispatcher::unprepare_trigger) balance their
/// allocations exactly.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait AllocHook: fmt::Debug {
    /// Called once when a [`Pool`] is created. Return `false` to simulate
    /// an allocation failure; the pool is then never constructed.
    fn on_alloc(&self, size: usize) -> bool;

    /// Called once when a [`Pool`] created by this hook is dropped.
    fn on_dealloc(&self, size: usize);
}

/// The default hook: always succeeds and does no bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocHook;

impl AllocHook for SystemAllocHook {
    fn on_alloc(&self, _size: usize) -> bool {
        true
    }

    fn on_dealloc(&self, _size: usize) {}
}

/// A scoped bump arena backing the scratch data of one triggering.
///
/// `alloc`/`alloc_str` hand out scratch storage for the lifetime of one
/// moment's delivery (e.g. building an audit-log message inside a
/// callback); everything allocated into a pool is freed en masse when the
/// pool drops, which is what the prepare/unprepare balance test and the
/// deferred-destroy test both rely on.
pub struct Pool {
    arena: Bump,
    hook: Rc<dyn AllocHook>,
    size: usize,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("size", &self.size).finish()
    }
}

impl Pool {
    /// Creates a pool backed by `hook`, asking it to account for `size`
    /// bytes. Returns [`DispatchError::NoMemory`] if the hook refuses.
    pub fn try_new(hook: Rc<dyn AllocHook>, size: usize) -> Result<Self, DispatchError> {
        if !hook.on_alloc(size) {
            return Err(DispatchError::NoMemory);
        }
        Ok(Self {
            arena: Bump::with_capacity(size),
            hook,
            size,
        })
    }

    /// Copies `value` into the pool's arena, returning a reference valid for
    /// the lifetime of this moment's delivery.
    pub fn alloc<T>(&self, value: T) -> &T {
        self.arena.alloc(value)
    }

    /// Copies `s` into the pool's arena. Handy for building short-lived
    /// audit/log strings from inside a callback without a separate
    /// allocator.
    pub fn alloc_str(&self, s: &str) -> &str {
        self.arena.alloc_str(s)
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.hook.on_dealloc(self.size);
    }
}
