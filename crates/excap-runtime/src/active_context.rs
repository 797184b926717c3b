//! The thread-local "currently active forked context" slot described in
//! SPEC_FULL.md §5.1. Tool handlers read this to attribute nested spans
//! under the worker's forked context rather than the main thread's.

use std::cell::RefCell;

use crate::forked_context::ForkedTraceContext;

thread_local! {
    static ACTIVE_CONTEXT: RefCell<Option<ForkedTraceContext>> = const { RefCell::new(None) };
}

pub fn set_thread_local_context(ctx: ForkedTraceContext) {
    ACTIVE_CONTEXT.with(|cell| *cell.borrow_mut() = Some(ctx));
}

pub fn clear_thread_local_context() -> Option<ForkedTraceContext> {
    ACTIVE_CONTEXT.with(|cell| cell.borrow_mut().take())
}

/// Run `f` against the active forked context, if this thread has one
/// installed.
pub fn with_active_context<R>(f: impl FnOnce(&ForkedTraceContext) -> R) -> Option<R> {
    ACTIVE_CONTEXT.with(|cell| cell.borrow().as_ref().map(f))
}

/// RAII guard that clears the thread-local slot on drop, even if the tool
/// handler panics — the "guaranteed-release epilogue" SPEC_FULL.md §4.6
/// calls for.
pub struct ActiveContextGuard(());

impl ActiveContextGuard {
    pub fn install(ctx: ForkedTraceContext) -> Self {
        set_thread_local_context(ctx);
        Self(())
    }
}

impl Drop for ActiveContextGuard {
    fn drop(&mut self) {
        clear_thread_local_context();
    }
}
