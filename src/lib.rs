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

//! Stackful, asymmetric coroutines and an N:M task scheduler built on top
//! of them.
//!
//! A [`Coroutine`] is resumed and yields explicitly; it never resumes a
//! peer coroutine directly. Every coroutine has exactly one "partner" to
//! yield back to: for one built with `pinned = true` and handed to a
//! [`Scheduler`], that partner is always the scheduler's scheduling
//! coroutine; for a freestanding (`pinned = false`) coroutine, its partner
//! is whichever coroutine (or thread-main) actually resumed it — so a
//! freestanding coroutine may itself resume a second, nested freestanding
//! coroutine without first yielding back to thread-main, and each yields
//! back to its own resumer in turn. [`Builder`] configures ad hoc
//! coroutines; [`Scheduler`] runs a fixed pool of worker threads that each
//! dispatch [`Task`]s pulled off one shared FIFO queue.
//!
//! Every error this crate can produce ([`FatalError`]) is a programmer
//! error or unrecoverable resource failure: none of it is surfaced as a
//! `Result`. It is logged through the [`log`] facade and the process is
//! aborted. A user callable that panics is not caught; it also takes the
//! process down. See [`error`] for the full policy.
//!
//! ```no_run
//! use corostra::{Coroutine, Scheduler};
//!
//! let scheduler = Scheduler::new(4, false, "example");
//! scheduler.start();
//! scheduler.schedule(|| println!("hello from a scheduled task"), -1);
//! scheduler.stop();
//! # let _ = Coroutine::total_count();
//! ```

mod builder;
mod context;
mod coroutine;
mod error;
mod options;
mod registry;
mod scheduler;
mod sync;
mod task;
mod worker;

pub use builder::Builder;
pub use context::DEFAULT_STACK_SIZE;
pub use coroutine::{Coroutine, Handle, State};
pub use error::FatalError;
pub use options::Options;
pub use scheduler::{DefaultHooks, Scheduler, SchedulerHooks};
pub use task::{Callable, Dispatch, Task, ANY_THREAD};

/// Construct a coroutine with default [`Options`] (128 KiB stack, unnamed,
/// `pinned = true`). Returned `READY`; the caller resumes it explicitly.
///
/// Equivalent to `Builder::new().spawn(f)`.
pub fn spawn<F>(f: F) -> Handle
where
    F: FnOnce() + Send + 'static,
{
    Builder::new().spawn(f)
}

/// The coroutine currently holding this thread's CPU.
///
/// Equivalent to `Coroutine::current`.
pub fn current() -> Handle {
    Coroutine::current()
}

/// Yield the currently running coroutine back to its partner.
///
/// Equivalent to `Coroutine::yield_now`.
pub fn yield_now() {
    Coroutine::yield_now()
}

/// A small, dense integer naming the calling OS thread, stable for its
/// lifetime. This is the value [`Task`] pinning and [`Scheduler::schedule`]
/// compare `thread_pin` against.
pub fn current_worker_id() -> u64 {
    registry::current_thread_id()
}
