//! Property-based check that `prepare_trigger`/`unprepare_trigger` always
//! balance allocations under a counting allocator hook, fuzzed over
//! arbitrary interleavings of prepare/consume/unprepare.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;

use revent::{AllocHook, Dispatcher, EventData};

#[derive(Debug, Default)]
struct CountingHook {
    allocs: Cell<u32>,
    frees: Cell<u32>,
}

impl AllocHook for CountingHook {
    fn on_alloc(&self, _size: usize) -> bool {
        self.allocs.set(self.allocs.get() + 1);
        true
    }

    fn on_dealloc(&self, _size: usize) {
        self.frees.set(self.frees.get() + 1);
    }
}

fn noop(_: &mut EventData<'_, ()>, _arg: Option<Rc<dyn std::any::Any>>) {}

proptest! {
    /// Every prepared-but-unused trigger releases its allocation on
    /// `unprepare_trigger`, and every prepared trigger that *is* consumed by
    /// `trigger_prepared` releases it once the moment is delivered: either
    /// way, allocs and frees end up equal.
    #[test]
    fn prepare_unprepare_and_consume_always_balance(consume in prop::collection::vec(any::<bool>(), 0..32)) {
        tracing_subscriber::fmt::try_init().ok();

        let hook = Rc::new(CountingHook::default());
        let dispatcher = Dispatcher::create_with_allocator((), hook.clone());
        let event = dispatcher.create_event("e").unwrap();
        event.bind(noop, None);

        for should_consume in consume {
            let trigger_data = dispatcher.prepare_trigger().unwrap();
            if should_consume {
                event.trigger_prepared(None, None, None, trigger_data);
            } else {
                dispatcher.unprepare_trigger(trigger_data);
            }
        }

        prop_assert_eq!(hook.allocs.get(), hook.frees.get());
    }
}
