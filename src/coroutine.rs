// Copyright 2013 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Stackful, asymmetric coroutines.
//!
//! A [`Coroutine`] is a unit of cooperatively scheduled execution with its
//! own stack. It is resumed and yielded explicitly; it never resumes a peer
//! directly, only a distinguished "partner" selected by its `pinned` flag
//! (see [`Coroutine::resume`]/[`Coroutine::yield_now`]).

use std::cell::{Cell, UnsafeCell};
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use context::Transfer;

use crate::context::{allocate_stack, MachineContext, Stack, DEFAULT_STACK_SIZE};
use crate::error::{fatal, FatalError};
use crate::registry;

/// A coroutine's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Runnable, not currently holding the CPU.
    Ready,
    /// Currently holding this thread's CPU.
    Running,
    /// The entry callable has returned; terminal until `reset`.
    Term,
}

type Entry = Box<dyn FnOnce() + Send + 'static>;

/// A stackful coroutine.
///
/// Always accessed through a [`Handle`] (a clonable shared reference); a
/// bare `Coroutine` is never moved or addressed by value once constructed,
/// since its address is baked into its machine context.
pub struct Coroutine {
    id: u64,
    state: Cell<State>,
    stack: Option<Stack>,
    context: MachineContext,
    entry: UnsafeCell<Option<Entry>>,
    pinned: bool,
    name: Option<Box<str>>,
    /// Whether this context has ever been resumed. Controls whether the
    /// next resume must hand the trampoline a fresh self-pointer.
    entered: Cell<bool>,
    /// For a `pinned == false` coroutine: whichever coroutine (or
    /// thread-main) most recently resumed this one. This is the actual
    /// swap partner on yield — *not* always the thread-main coroutine —
    /// since an unpinned coroutine may itself be resumed from inside
    /// another running unpinned coroutine (see [`swap_partner`]).
    /// Unused (left null) for `pinned == true`, whose partner is always
    /// the calling worker's scheduling coroutine.
    resumer: Cell<*const Coroutine>,
}

// `Coroutine`'s interior `Cell`/`UnsafeCell` fields are never touched by two
// threads at once: the state machine's own invariants (at most one RUNNING
// holder, and only the thread that resumed it touches it before the next
// yield) enforce that, the same way the upstream `Handle` type asserted
// `Send` over a raw, unsynchronized pointer.
unsafe impl Send for Coroutine {}
unsafe impl Sync for Coroutine {}

static NEXT_COROUTINE_ID: AtomicU64 = AtomicU64::new(1);
static TOTAL_COROUTINES: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_COROUTINE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A shared handle to a [`Coroutine`].
///
/// Cloning is cheap (an `Arc` clone); the underlying coroutine is dropped
/// when the last `Handle` is.
pub struct Handle(Arc<Coroutine>);

impl Handle {
    fn new(inner: Coroutine) -> Handle {
        Handle(Arc::new(inner))
    }

    pub(crate) fn as_ptr(&self) -> *const Coroutine {
        Arc::as_ptr(&self.0)
    }

    fn into_raw(self) -> *const Coroutine {
        Arc::into_raw(self.0)
    }

    unsafe fn from_raw(ptr: *const Coroutine) -> Handle {
        Handle(Arc::from_raw(ptr))
    }
}

impl Clone for Handle {
    fn clone(&self) -> Handle {
        Handle(self.0.clone())
    }
}

impl Deref for Handle {
    type Target = Coroutine;
    fn deref(&self) -> &Coroutine {
        &self.0
    }
}

impl Coroutine {
    /// Allocate a stack, arm a context over it, and return a fresh,
    /// `READY` coroutine wrapping `entry`.
    pub fn construct<F>(entry: F, stack_size: usize, pinned: bool) -> Handle
    where
        F: FnOnce() + Send + 'static,
    {
        Self::construct_named(entry, stack_size, pinned, None)
    }

    /// As [`construct`](Self::construct), additionally tagging the
    /// coroutine with `name` for log messages.
    pub fn construct_named<F>(
        entry: F,
        stack_size: usize,
        pinned: bool,
        name: Option<String>,
    ) -> Handle
    where
        F: FnOnce() + Send + 'static,
    {
        let size = if stack_size == 0 {
            DEFAULT_STACK_SIZE
        } else {
            stack_size
        };
        let stack = allocate_stack(size);
        let context = MachineContext::make(&stack, trampoline);
        let id = next_id();
        TOTAL_COROUTINES.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Coroutine({}{}) constructed, stack = {} bytes",
            id,
            name.as_deref().map_or(String::new(), |n| format!(" {:?}", n)),
            size
        );
        Handle::new(Coroutine {
            id,
            state: Cell::new(State::Ready),
            stack: Some(stack),
            context,
            entry: UnsafeCell::new(Some(Box::new(entry))),
            pinned,
            name: name.map(String::into_boxed_str),
            entered: Cell::new(false),
            resumer: Cell::new(ptr::null()),
        })
    }

    /// The stackless coroutine representing this thread's original
    /// execution. Never transitions to `TERM`.
    pub(crate) fn construct_main() -> Handle {
        let id = next_id();
        TOTAL_COROUTINES.fetch_add(1, Ordering::Relaxed);
        log::debug!("Coroutine({}) constructed as thread-main", id);
        Handle::new(Coroutine {
            id,
            state: Cell::new(State::Running),
            stack: None,
            context: MachineContext::empty(),
            entry: UnsafeCell::new(None),
            pinned: false,
            name: Some("<thread-main>".into()),
            entered: Cell::new(true),
            resumer: Cell::new(ptr::null()),
        })
    }

    /// Re-arm a `TERM` coroutine with a new entry, over the same stack.
    /// Fails fatally (`INVALID_STATE`) unless `state == TERM` and a stack
    /// is present.
    pub fn reset<F>(&self, entry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let stack = match (&self.stack, self.state.get()) {
            (Some(stack), State::Term) => stack,
            _ => fatal(FatalError::InvalidState, "reset", self.id),
        };
        self.context.rearm(stack, trampoline);
        unsafe {
            *self.entry.get() = Some(Box::new(entry));
        }
        self.entered.set(false);
        self.resumer.set(ptr::null());
        self.state.set(State::Ready);
        log::debug!("Coroutine({}) reset", self.id);
    }

    /// Resume this coroutine. Precondition: `state == READY`.
    pub fn resume(handle: &Handle) {
        if handle.state.get() != State::Ready {
            fatal(FatalError::InvalidState, "resume", handle.id);
        }
        handle.state.set(State::Running);

        // For an unpinned coroutine, the partner it must yield back to is
        // whichever coroutine (or thread-main) is actually resuming it
        // *this time* — not a single thread-wide slot. A coroutine that is
        // itself running may resume a second, nested unpinned coroutine
        // without ever yielding back to thread-main first, so the partner
        // has to be read off "who is current right now", recorded per
        // resume, and restored on the matching yield.
        if !handle.pinned {
            let current = registry::current_coroutine();
            let resumer = if current.is_null() {
                registry::thread_main_coroutine().as_ptr()
            } else {
                current
            };
            handle.resumer.set(resumer);
        }

        registry::set_current_coroutine(handle.as_ptr());

        let data = if handle.entered.replace(true) {
            0
        } else {
            handle.clone().into_raw() as usize
        };

        let partner = swap_partner(handle);
        unsafe {
            (*partner).context.swap(&handle.context, data);
        }
    }

    /// Yield back to the partner context. Precondition: `state ==
    /// RUNNING`, or `TERM` only from the trampoline's own tail.
    pub fn yield_now() {
        let ptr = registry::current_coroutine();
        if ptr.is_null() {
            fatal(
                FatalError::InvalidState,
                "yield with no current coroutine",
                0,
            );
        }
        unsafe { (*ptr).yield_raw() }
    }

    fn yield_raw(&self) {
        match self.state.get() {
            State::Running => self.state.set(State::Ready),
            State::Term => {}
            State::Ready => fatal(FatalError::InvalidState, "yield", self.id),
        }

        let partner = swap_partner(self);
        registry::set_current_coroutine(partner);

        unsafe {
            self.context.swap(&(*partner).context, 0);
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    /// The name this coroutine was constructed with, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn take_entry(&self) -> Option<Entry> {
        unsafe { (*self.entry.get()).take() }
    }

    /// The coroutine currently associated with the calling thread, lazily
    /// creating the thread-main coroutine on first call.
    pub fn current() -> Handle {
        let ptr = registry::current_coroutine();
        if ptr.is_null() {
            registry::thread_main_coroutine()
        } else {
            unsafe {
                Arc::increment_strong_count(ptr);
                Handle(Arc::from_raw(ptr))
            }
        }
    }

    /// Snapshot of live coroutines process-wide.
    pub fn total_count() -> u64 {
        TOTAL_COROUTINES.load(Ordering::Relaxed)
    }

    /// The id of the currently running coroutine, or 0 if none.
    pub fn current_id() -> u64 {
        let ptr = registry::current_coroutine();
        if ptr.is_null() {
            0
        } else {
            unsafe { (*ptr).id() }
        }
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        if self.stack.is_some() {
            debug_assert_eq!(
                self.state.get(),
                State::Term,
                "coroutine {} dropped before reaching TERM",
                self.id
            );
        } else {
            debug_assert_eq!(
                self.state.get(),
                State::Running,
                "thread-main coroutine {} dropped outside RUNNING",
                self.id
            );
        }
        log::debug!("Coroutine({}) destroyed", self.id);
        TOTAL_COROUTINES.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Two-level partner selection: a pinned coroutine's partner is always the
/// calling worker's scheduling coroutine. An unpinned coroutine's partner
/// is whichever coroutine (or thread-main) most recently resumed it — its
/// recorded [`Coroutine::resumer`], not a single fixed thread-main slot,
/// so that an unpinned coroutine resumed from inside another running
/// unpinned coroutine yields back to *that* coroutine rather than
/// clobbering thread-main's continuation out from under it.
fn swap_partner(coro: &Coroutine) -> *const Coroutine {
    if coro.pinned {
        let p = registry::scheduler_coroutine();
        if p.is_null() {
            fatal(
                FatalError::InvalidState,
                "pinned resume/yield with no scheduling coroutine",
                0,
            );
        }
        p
    } else {
        let p = coro.resumer.get();
        if p.is_null() {
            fatal(
                FatalError::InvalidState,
                "unpinned resume/yield with no recorded resumer",
                coro.id,
            );
        }
        p
    }
}

/// The static entry trampoline every freshly made context starts in.
///
/// Retrieves its own coroutine from the `data` the first resume carried
/// (an owning, leaked `Handle`), invokes the entry callable, marks
/// `TERM`, then explicitly drops its own grip on the handle *before* the
/// final yield: the resumer, by construction, still holds its own
/// reference for the duration of the call, so this never drops the last
/// reference from here, but the local would otherwise never run its
/// destructor at all, since this function never returns.
extern "C" fn trampoline(t: Transfer) -> ! {
    let Transfer { context, data } = t;

    let handle = unsafe { Handle::from_raw(data as *const Coroutine) };
    let partner = swap_partner(&handle);
    unsafe { (*partner).context.adopt(context) };
    registry::set_current_coroutine(handle.as_ptr());

    if let Some(entry) = handle.take_entry() {
        entry();
    }
    handle.state.set(State::Term);
    log::debug!("Coroutine({}) entry returned", handle.id);

    let raw = handle.as_ptr();
    drop(handle);

    loop {
        unsafe { (*raw).yield_raw() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn single_coroutine_two_yields() {
        let trace: Arc<std::sync::Mutex<Vec<&'static str>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let trace2 = trace.clone();
        let coro = Coroutine::construct(
            move || {
                trace2.lock().unwrap().push("A");
                Coroutine::yield_now();
                trace2.lock().unwrap().push("B");
            },
            0,
            false,
        );
        Coroutine::resume(&coro);
        assert_eq!(*trace.lock().unwrap(), vec!["A"]);
        assert_eq!(coro.state(), State::Ready);
        Coroutine::resume(&coro);
        assert_eq!(*trace.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(coro.state(), State::Term);
    }

    #[test]
    fn reset_reuses_the_stack() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        let coro = Coroutine::construct(
            move || {
                ran2.fetch_add(1, Ordering::SeqCst);
                Coroutine::yield_now();
            },
            0,
            false,
        );
        Coroutine::resume(&coro);
        Coroutine::resume(&coro);
        assert_eq!(coro.state(), State::Term);
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let ran3 = ran.clone();
        coro.reset(move || {
            ran3.fetch_add(10, Ordering::SeqCst);
        });
        Coroutine::resume(&coro);
        assert_eq!(coro.state(), State::Term);
        assert_eq!(ran.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn total_count_tracks_construction_and_drop() {
        let before = Coroutine::total_count();
        let coro = Coroutine::construct(|| {}, 0, false);
        assert_eq!(Coroutine::total_count(), before + 1);
        Coroutine::resume(&coro);
        drop(coro);
        assert_eq!(Coroutine::total_count(), before);
    }

    /// A running unpinned coroutine resumes a second, nested unpinned
    /// coroutine directly (without first yielding back to thread-main),
    /// then itself yields to completion. Both must unwind back to the
    /// correct partner at every step: the nested coroutine back to its
    /// resumer (the outer coroutine, not thread-main), and the outer
    /// coroutine back to thread-main once it finally terminates.
    #[test]
    fn nested_unpinned_resume_does_not_corrupt_thread_main() {
        let trace = Arc::new(std::sync::Mutex::new(Vec::new()));

        let trace_outer = trace.clone();
        let outer = Coroutine::construct(
            move || {
                trace_outer.lock().unwrap().push("outer-1");
                Coroutine::yield_now();
                trace_outer.lock().unwrap().push("outer-2");

                let trace_inner = trace_outer.clone();
                let inner = Coroutine::construct(
                    move || {
                        trace_inner.lock().unwrap().push("inner");
                    },
                    0,
                    false,
                );
                Coroutine::resume(&inner);
                assert_eq!(inner.state(), State::Term);

                trace_outer.lock().unwrap().push("outer-3");
            },
            0,
            false,
        );

        Coroutine::resume(&outer);
        assert_eq!(outer.state(), State::Ready);
        Coroutine::resume(&outer);
        assert_eq!(outer.state(), State::Term);

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["outer-1", "outer-2", "inner", "outer-3"]
        );

        // thread-main must still be resumable afterwards: a fresh unpinned
        // coroutine resumed straight from here proves its continuation
        // wasn't left clobbered or empty.
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        let after = Coroutine::construct(
            move || {
                ran2.fetch_add(1, Ordering::SeqCst);
            },
            0,
            false,
        );
        Coroutine::resume(&after);
        assert_eq!(after.state(), State::Term);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
