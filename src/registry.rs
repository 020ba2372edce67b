// The MIT License (MIT)

// Copyright (c) 2015 Rustcc developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Per-thread registry: four slots tying a running coroutine to its
//! scheduler, plus a small dense thread-id allocator used for pin matching.
//!
//! Everything here is `thread_local!`; nothing is shared across threads
//! except through the raw pointers the caller already promises are only
//! dereferenced from their owning thread (the same discipline the rest of
//! this crate uses for its thread-confined state).

use std::cell::{Cell, RefCell};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coroutine::{Coroutine, Handle};
use crate::scheduler::Scheduler;

thread_local! {
    static CURRENT_COROUTINE: Cell<*const Coroutine> = Cell::new(ptr::null());
    static THREAD_MAIN_COROUTINE: RefCell<Option<Handle>> = RefCell::new(None);
    static CURRENT_SCHEDULER: Cell<*const Scheduler> = Cell::new(ptr::null());
    static SCHEDULER_COROUTINE: Cell<*const Coroutine> = Cell::new(ptr::null());
    static THREAD_ID: Cell<Option<u64>> = Cell::new(None);
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(0);

/// The coroutine currently holding the CPU on this thread, or null before
/// the thread-main coroutine has been established.
pub fn current_coroutine() -> *const Coroutine {
    CURRENT_COROUTINE.with(Cell::get)
}

pub fn set_current_coroutine(ptr: *const Coroutine) {
    CURRENT_COROUTINE.with(|c| c.set(ptr));
}

/// This thread's main coroutine, creating it on first call.
pub fn thread_main_coroutine() -> Handle {
    THREAD_MAIN_COROUTINE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            let handle = Coroutine::construct_main();
            set_current_coroutine(handle.as_ptr());
            *slot = Some(handle);
        }
        slot.as_ref().unwrap().clone()
    })
}

/// Whether this thread's main coroutine has already been created, without
/// creating it as a side effect.
pub fn has_thread_main_coroutine() -> bool {
    THREAD_MAIN_COROUTINE.with(|slot| slot.borrow().is_some())
}

/// The scheduler whose `run()` loop is active on this thread, or null.
pub fn current_scheduler() -> *const Scheduler {
    CURRENT_SCHEDULER.with(Cell::get)
}

pub fn set_current_scheduler(ptr: *const Scheduler) {
    CURRENT_SCHEDULER.with(|c| c.set(ptr));
}

/// This worker's scheduling coroutine: the partner used by pinned tasks.
pub fn scheduler_coroutine() -> *const Coroutine {
    SCHEDULER_COROUTINE.with(Cell::get)
}

pub fn set_scheduler_coroutine(ptr: *const Coroutine) {
    SCHEDULER_COROUTINE.with(|c| c.set(ptr));
}

/// A small, dense, process-local integer naming the calling OS thread.
///
/// `std::thread::ThreadId` is deliberately opaque; pin matching needs a
/// plain integer, so each thread hands itself one out of a global counter
/// the first time it asks, and remembers it for the rest of its life.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|c| {
        if let Some(id) = c.get() {
            return id;
        }
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        c.set(Some(id));
        id
    })
}
