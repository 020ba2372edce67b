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

//! A thin wrapper over [`std::thread`] that performs the startup handshake
//! described for the scheduler's worker pool: the spawning thread blocks
//! until the new thread has registered its dense thread id, so that
//! `Scheduler::start` doesn't return until `thread_ids` is fully populated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::error::{fatal, FatalError};
use crate::registry;
use crate::sync::Semaphore;

/// A spawned worker OS thread plus its dense id.
pub struct WorkerThread {
    join: Option<thread::JoinHandle<()>>,
    id: u64,
}

impl WorkerThread {
    /// Spawn `entry` on a new, named OS thread and block until it has
    /// recorded its thread id.
    pub fn spawn<F>(name: String, entry: F) -> WorkerThread
    where
        F: FnOnce() + Send + 'static,
    {
        let handshake = Arc::new(Semaphore::new(0));
        let id_slot = Arc::new(AtomicU64::new(0));

        let handshake2 = handshake.clone();
        let id_slot2 = id_slot.clone();

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let id = registry::current_thread_id();
                id_slot2.store(id, Ordering::SeqCst);
                handshake2.notify();
                entry();
            })
            .unwrap_or_else(|_| fatal(FatalError::ResourceExhausted, "spawn worker thread", 0));

        handshake.wait();
        let id = id_slot.load(Ordering::SeqCst);
        log::debug!("worker thread '{}' started, id = {}", name, id);

        WorkerThread {
            join: Some(join),
            id,
        }
    }

    /// This worker's dense thread id, as seen by [`registry::current_thread_id`].
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the worker thread's entry function returns.
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                fatal(FatalError::OsError, "join worker thread", 0);
            }
        }
    }
}

impl Drop for WorkerThread {
    /// If the handle was never joined, let it drop: `JoinHandle`'s own
    /// `Drop` detaches the underlying OS thread rather than blocking,
    /// matching the "detach on drop if unjoined" external contract.
    fn drop(&mut self) {
        self.join.take();
    }
}
