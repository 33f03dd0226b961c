//! The ordered, deferred-mutation-safe list of callbacks bound to one event.
//!
//! Rather than snapshotting the list before each triggering, every node
//! carries `pending_add`/`pending_remove` flags so the *same* list can be
//! walked safely while a callback mutates it: the systems trick the whole
//! reentrancy story rests on. See [`crate::Dispatcher`]'s module docs for
//! the drain algorithm that uses it.

use std::any::Any;
use std::rc::Rc;

use crate::event::EventData;

/// A callback bound to an event.
///
/// Bindings are unique by function pointer: `fn` items and function
/// pointers compare equal by code address, which is exactly the identity
/// `bind`/`unbind` need and a boxed closure could not give us for free.
pub type NotifyFn<S> = fn(&mut EventData<'_, S>, Option<Rc<dyn Any>>);

pub(crate) struct Binding<S> {
    pub(crate) cb: NotifyFn<S>,
    pub(crate) arg: Option<Rc<dyn Any>>,
    pub(crate) pending_add: bool,
    pub(crate) pending_remove: bool,
}

impl<S> Binding<S> {
    fn skip(&self) -> bool {
        self.pending_add || self.pending_remove
    }
}

pub(crate) struct BindingList<S> {
    pub(crate) nodes: Vec<Binding<S>>,
}

impl<S> Default for BindingList<S> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<S> BindingList<S> {
    /// Binds `cb` with `arg`, or no-ops if `cb` is already bound. `running`
    /// governs whether a freshly appended node must wait out the in-flight
    /// round.
    pub(crate) fn bind(&mut self, cb: NotifyFn<S>, arg: Option<Rc<dyn Any>>, running: bool) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.cb == cb) {
            if node.pending_remove {
                node.pending_remove = false;
                node.arg = arg;
            }
            // Already bound and not pending-remove: no-op, position and
            // argument both preserved.
            return;
        }
        self.nodes.push(Binding {
            cb,
            arg,
            pending_add: running,
            pending_remove: false,
        });
    }

    /// Unbinds `cb`. An absent callback is a no-op.
    pub(crate) fn unbind(&mut self, cb: NotifyFn<S>, running: bool) {
        let Some(pos) = self.nodes.iter().position(|n| n.cb == cb) else {
            return;
        };
        if running {
            self.nodes[pos].pending_remove = true;
        } else {
            self.nodes.remove(pos);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `(callback, arg)` for the node at `idx` if it should fire
    /// this round, or `None` if it is out of range or pending.
    pub(crate) fn fireable(&self, idx: usize) -> Option<(NotifyFn<S>, Option<Rc<dyn Any>>)> {
        let node = self.nodes.get(idx)?;
        if node.skip() {
            None
        } else {
            Some((node.cb, node.arg.clone()))
        }
    }

    /// End-of-moment reconciliation: drop pending-remove nodes, clear
    /// pending-add flags on the rest.
    pub(crate) fn reconcile(&mut self) {
        self.nodes.retain(|n| !n.pending_remove);
        for node in &mut self.nodes {
            node.pending_add = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<S>(_: &mut EventData<'_, S>, _: Option<Rc<dyn Any>>) {}
    fn noop2<S>(_: &mut EventData<'_, S>, _: Option<Rc<dyn Any>>) {}

    #[test]
    fn bind_is_idempotent_and_preserves_position() {
        let mut list: BindingList<()> = BindingList::default();
        list.bind(noop, None, false);
        list.bind(noop2, None, false);
        list.bind(noop, Some(Rc::new(7_i32)), false);
        assert_eq!(list.len(), 2);
        // Re-bind did not move `noop` and did not overwrite its argument.
        assert!(list.nodes[0].cb == noop);
        assert!(list.nodes[0].arg.is_none());
    }

    #[test]
    fn unbind_missing_callback_is_a_noop() {
        let mut list: BindingList<()> = BindingList::default();
        list.bind(noop, None, false);
        list.unbind(noop2, false);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn unbind_while_running_defers_removal() {
        let mut list: BindingList<()> = BindingList::default();
        list.bind(noop, None, false);
        list.unbind(noop, true);
        assert_eq!(list.len(), 1);
        assert!(list.nodes[0].pending_remove);
        assert!(list.fireable(0).is_none());
        list.reconcile();
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn bind_while_running_marks_pending_add() {
        let mut list: BindingList<()> = BindingList::default();
        list.bind(noop, None, true);
        assert!(list.nodes[0].pending_add);
        assert!(list.fireable(0).is_none());
        list.reconcile();
        assert!(!list.nodes[0].pending_add);
        assert!(list.fireable(0).is_some());
    }

    #[test]
    fn rebind_cancels_pending_remove_and_updates_arg() {
        let mut list: BindingList<()> = BindingList::default();
        list.bind(noop, None, false);
        list.unbind(noop, true);
        assert!(list.nodes[0].pending_remove);
        list.bind(noop, Some(Rc::new(42_i32)), true);
        assert!(!list.nodes[0].pending_remove);
        assert_eq!(
            *list.nodes[0].arg.as_ref().unwrap().downcast_ref::<i32>().unwrap(),
            42
        );
    }

    fn noop3<S>(_: &mut EventData<'_, S>, _: Option<Rc<dyn Any>>) {}
    fn noop4<S>(_: &mut EventData<'_, S>, _: Option<Rc<dyn Any>>) {}

    /// Five distinct callback identities, indexable by a `0..5` proptest value.
    fn callback_by_index(idx: usize) -> NotifyFn<()> {
        let all: [NotifyFn<()>; 5] = [noop, noop2, noop3, noop4, |_, _| {}];
        all[idx]
    }

    proptest::proptest! {
        /// Outside a running round, a list never holds two nodes for the same
        /// callback, and every `fireable` node corresponds to a `bind` that
        /// was never followed by an `unbind` for that callback, fuzzed over
        /// arbitrary interleavings of 5 distinct callbacks.
        #[test]
        fn bind_unbind_sequence_never_duplicates_a_callback(
            ops in proptest::collection::vec((0usize..5, proptest::bool::ANY), 0..64)
        ) {
            let mut list: BindingList<()> = BindingList::default();
            for (idx, is_bind) in ops {
                let cb = callback_by_index(idx);
                if is_bind {
                    list.bind(cb, None, false);
                } else {
                    list.unbind(cb, false);
                }
            }
            let mut seen = std::collections::HashSet::new();
            for node in &list.nodes {
                proptest::prop_assert!(seen.insert(node.cb as usize), "duplicate callback in list");
            }
        }
    }
}
