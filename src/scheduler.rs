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

//! The N:M task scheduler: a fixed pool of worker threads, each running a
//! single scheduling coroutine that dispatches [`Task`]s pulled off one
//! shared FIFO queue.
//!
//! A task pinned to a specific thread id only ever runs on that thread; a
//! task pinned to [`task::ANY_THREAD`] runs wherever a worker gets to it
//! first. Nothing here steals work across threads: a worker that finds
//! nothing it is eligible to run parks in its idle coroutine instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::coroutine::{Coroutine, Handle, State};
use crate::error::{fatal, FatalError};
use crate::registry;
use crate::task::{Dispatch, Task};
use crate::worker::WorkerThread;

/// Extension point for a scheduler's wakeup behavior.
///
/// The default `tickle` is a no-op log line; the default `idle` just loops
/// yielding while [`Scheduler::stopping`] is false. An IO-aware scheduler
/// can block on a real wakeup primitive in `idle` and signal it from
/// `tickle`, composing over this trait rather than subclassing `Scheduler`
/// (which, being a concrete struct, has no inheritance to offer).
pub trait SchedulerHooks: Send + Sync {
    fn tickle(&self, scheduler: &Scheduler) {
        let _ = scheduler;
        log::trace!("tickle (default no-op)");
    }

    fn idle(&self, scheduler: &Scheduler) {
        while !scheduler.stopping() {
            Coroutine::yield_now();
        }
    }
}

/// The hook set every [`Scheduler::new`] uses.
pub struct DefaultHooks;

impl SchedulerHooks for DefaultHooks {}

/// A raw pointer that outlives the coroutine entry closure it is handed
/// to, used to let a coroutine call back into the `Scheduler` that built
/// it without threading an `Arc` clone through (which would leave that
/// scheduler unable to ever reach a zero strong count). `*const T` is not
/// `Send` by default purely because the compiler cannot see the lifetime
/// argument here proves out; the invariant is documented at each call site.
struct SchedulerPtr(*const Scheduler);

unsafe impl Send for SchedulerPtr {}

/// An N:M scheduler: `threads` OS worker threads, each round-robining a
/// single shared task queue through its own scheduling coroutine.
pub struct Scheduler {
    name: String,
    worker_threads: usize,
    use_caller: bool,
    /// The constructing thread's id, if `use_caller`; `-1` otherwise.
    root_thread: i64,
    tasks: Mutex<VecDeque<Task>>,
    stopping_flag: AtomicBool,
    active_thread_count: AtomicUsize,
    idle_thread_count: AtomicUsize,
    started: AtomicBool,
    workers: Mutex<Vec<WorkerThread>>,
    /// The caller's scheduling coroutine, built eagerly at construction
    /// when `use_caller`; `stop()` resumes it to drain the caller's share.
    caller_coroutine: Mutex<Option<Handle>>,
    hooks: Box<dyn SchedulerHooks>,
}

impl Scheduler {
    /// Construct a scheduler with the default hook set. See
    /// [`with_hooks`](Self::with_hooks) for the full contract.
    pub fn new(threads: usize, use_caller: bool, name: impl Into<String>) -> Arc<Scheduler> {
        Self::with_hooks(threads, use_caller, name, Box::new(DefaultHooks))
    }

    /// Construct a scheduler with `threads` total scheduling threads
    /// (`threads >= 1`). If `use_caller`, one of those threads is the
    /// constructing thread itself: no worker OS thread is spawned for it,
    /// and `stop()` must run the caller's share by resuming its scheduling
    /// coroutine.
    pub fn with_hooks(
        threads: usize,
        use_caller: bool,
        name: impl Into<String>,
        hooks: Box<dyn SchedulerHooks>,
    ) -> Arc<Scheduler> {
        assert!(threads >= 1, "scheduler needs at least one thread");
        let name = name.into();

        let worker_threads = if use_caller { threads - 1 } else { threads };
        let root_thread = if use_caller {
            registry::thread_main_coroutine();
            registry::current_thread_id() as i64
        } else {
            -1
        };

        let scheduler = Arc::new(Scheduler {
            name,
            worker_threads,
            use_caller,
            root_thread,
            tasks: Mutex::new(VecDeque::new()),
            stopping_flag: AtomicBool::new(false),
            active_thread_count: AtomicUsize::new(0),
            idle_thread_count: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            caller_coroutine: Mutex::new(None),
            hooks,
        });

        if use_caller {
            registry::set_current_scheduler(Arc::as_ptr(&scheduler));

            let raw = SchedulerPtr(Arc::as_ptr(&scheduler));
            let coro_name = format!("{}-caller", scheduler.name);
            // Safety: this coroutine's handle lives in `caller_coroutine`,
            // a field of the very `Scheduler` `raw` points to, so it is
            // dropped no later than the scheduler itself; `stop()` is the
            // only place that ever resumes it, and only while the
            // scheduler it was built from is still alive to be resumed on.
            let sched_coro = Coroutine::construct_named(
                move || unsafe { (*raw.0).run() },
                0,
                false,
                Some(coro_name),
            );
            registry::set_scheduler_coroutine(sched_coro.as_ptr());
            *scheduler.caller_coroutine.lock().unwrap() = Some(sched_coro);
        }

        log::debug!(
            "scheduler '{}' constructed: {} worker thread(s), use_caller = {}",
            scheduler.name,
            scheduler.worker_threads,
            use_caller
        );
        scheduler
    }

    /// The scheduler's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `task` to the queue. Fatal if called after [`stop`](Self::stop).
    pub fn schedule_task(&self, task: Task) {
        if self.stopping_flag.load(Ordering::SeqCst) {
            fatal(FatalError::InvalidState, "schedule after stop", 0);
        }
        let was_empty = {
            let mut queue = self.tasks.lock().unwrap();
            let was_empty = queue.is_empty();
            queue.push_back(task);
            was_empty
        };
        if was_empty {
            self.tickle();
        }
    }

    /// Wrap `f` in a task pinned to `thread_pin` (`task::ANY_THREAD` for
    /// "any worker") and enqueue it. The scheduler builds (or reuses) a
    /// pinned coroutine around it when a worker dispatches it.
    pub fn schedule<F>(&self, f: F, thread_pin: i64)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_task(Task::callable(f, thread_pin));
    }

    /// Enqueue an already-constructed coroutine, pinned to `thread_pin`.
    /// The caller is responsible for having built it with `pinned = true`.
    pub fn schedule_coroutine(&self, handle: Handle, thread_pin: i64) {
        self.schedule_task(Task::coroutine(handle, thread_pin));
    }

    /// Spawn the worker pool. Must not be called twice on the same
    /// scheduler.
    pub fn start(self: &Arc<Self>) {
        assert!(
            !self.stopping_flag.load(Ordering::SeqCst),
            "start() called on a stopping scheduler"
        );
        if self.started.swap(true, Ordering::SeqCst) {
            fatal(FatalError::InvalidState, "start() called twice", 0);
        }

        let mut workers = self.workers.lock().unwrap();
        for i in 0..self.worker_threads {
            let scheduler = self.clone();
            let thread_name = format!("{}-{}", self.name, i);
            workers.push(WorkerThread::spawn(thread_name, move || scheduler.run()));
        }
        log::debug!(
            "scheduler '{}' started {} worker thread(s)",
            self.name,
            self.worker_threads
        );
    }

    /// Signal shutdown, wake every worker (plus the caller's scheduling
    /// coroutine, if any) and block until all of them have drained.
    ///
    /// In `use_caller` mode, must be called from the thread that
    /// constructed the scheduler; otherwise, must not be called from one
    /// of this scheduler's own worker threads.
    pub fn stop(self: &Arc<Self>) {
        if self.use_caller {
            if registry::current_thread_id() as i64 != self.root_thread {
                fatal(
                    FatalError::InvalidState,
                    "stop() called from a thread other than the one that constructed this scheduler",
                    0,
                );
            }
        } else {
            let tid = registry::current_thread_id();
            let from_worker = self.workers.lock().unwrap().iter().any(|w| w.id() == tid);
            if from_worker {
                fatal(
                    FatalError::InvalidState,
                    "stop() called from this scheduler's own worker thread",
                    0,
                );
            }
        }

        self.stopping_flag.store(true, Ordering::SeqCst);

        let has_caller_coroutine = self.caller_coroutine.lock().unwrap().is_some();
        let tickles = self.worker_threads + if has_caller_coroutine { 1 } else { 0 };
        for _ in 0..tickles {
            self.tickle();
        }

        if self.use_caller {
            let coro = self.caller_coroutine.lock().unwrap().clone();
            if let Some(coro) = coro {
                Coroutine::resume(&coro);
            }
        }

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            worker.join();
        }

        log::debug!("scheduler '{}' stopped", self.name);
    }

    /// The scheduler whose `run()` is active on this thread, or null.
    pub fn current() -> *const Scheduler {
        registry::current_scheduler()
    }

    /// This thread's scheduling coroutine: the partner used by pinned
    /// tasks and pinned coroutines resumed on this thread.
    pub fn main_coroutine() -> *const Coroutine {
        registry::scheduler_coroutine()
    }

    /// Call the `tickle` hook.
    pub fn tickle(&self) {
        self.hooks.tickle(self);
    }

    fn run_idle_hook(&self) {
        self.hooks.idle(self);
    }

    /// `task_queue.empty() && active_thread_count == 0 && stopping_flag`,
    /// taken under the queue lock.
    pub fn stopping(&self) -> bool {
        let queue = self.tasks.lock().unwrap();
        queue.is_empty()
            && self.active_thread_count.load(Ordering::SeqCst) == 0
            && self.stopping_flag.load(Ordering::SeqCst)
    }

    pub fn active_thread_count(&self) -> usize {
        self.active_thread_count.load(Ordering::SeqCst)
    }

    pub fn idle_thread_count(&self) -> usize {
        self.idle_thread_count.load(Ordering::SeqCst)
    }

    /// The worker loop every scheduling thread (spawned worker, or the
    /// caller's own scheduling coroutine in `use_caller` mode) runs.
    fn run(&self) {
        registry::set_current_scheduler(self as *const Scheduler);

        let is_root = self.use_caller && registry::current_thread_id() as i64 == self.root_thread;
        if !is_root {
            let main = registry::thread_main_coroutine();
            registry::set_scheduler_coroutine(main.as_ptr());
        }

        let tid = registry::current_thread_id();

        // Safety: `self` outlives this coroutine, which never escapes this
        // call: it is dropped when `run()` returns, below.
        let self_ptr = SchedulerPtr(self as *const Scheduler);
        let idle_coro = Coroutine::construct_named(
            move || unsafe { (*self_ptr.0).run_idle_hook() },
            0,
            true,
            Some(format!("{}-idle", self.name)),
        );

        let mut callable_runner: Option<Handle> = None;

        loop {
            let mut tickle_others = false;
            let found = {
                let mut queue = self.tasks.lock().unwrap();
                let mut eligible_index = None;
                for (i, t) in queue.iter().enumerate() {
                    if t.eligible_on(tid) {
                        eligible_index = Some(i);
                        break;
                    }
                    tickle_others = true;
                }
                eligible_index.map(|i| {
                    let task = queue.remove(i).expect("index came from this queue");
                    if !queue.is_empty() {
                        tickle_others = true;
                    }
                    self.active_thread_count.fetch_add(1, Ordering::SeqCst);
                    task
                })
            };

            if tickle_others {
                self.tickle();
            }

            match found {
                Some(t) => {
                    match t.dispatch() {
                        Some(Dispatch::Coroutine(handle)) => {
                            Coroutine::resume(&handle);
                        }
                        Some(Dispatch::Callable(f)) => {
                            let handle = match callable_runner.take() {
                                Some(h) => {
                                    h.reset(f);
                                    h
                                }
                                None => Coroutine::construct_named(
                                    f,
                                    0,
                                    true,
                                    Some(format!("{}-runner", self.name)),
                                ),
                            };
                            Coroutine::resume(&handle);
                            callable_runner = Some(handle);
                        }
                        None => {}
                    }
                    self.active_thread_count.fetch_sub(1, Ordering::SeqCst);
                }
                None => {
                    if idle_coro.state() == State::Term {
                        break;
                    }
                    self.idle_thread_count.fetch_add(1, Ordering::SeqCst);
                    Coroutine::resume(&idle_coro);
                    self.idle_thread_count.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }

        log::debug!("worker for scheduler '{}' exiting run()", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ANY_THREAD;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn multi_worker_scheduler_drains_callables() {
        let scheduler = Scheduler::new(4, false, "test-scheduler");
        scheduler.start();

        let (tx, rx) = channel();
        for i in 0..8 {
            let tx = tx.clone();
            scheduler.schedule(move || tx.send(i).unwrap(), ANY_THREAD);
        }
        drop(tx);

        let mut seen: Vec<i32> = Vec::new();
        for _ in 0..8 {
            seen.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());

        scheduler.stop();
    }

    #[test]
    fn pinned_task_runs_on_its_designated_thread() {
        let scheduler = Scheduler::new(2, false, "pin-test");
        scheduler.start();

        let worker_id = {
            let (tx, rx) = channel();
            scheduler.schedule(move || tx.send(registry::current_thread_id()).unwrap(), -1);
            rx.recv_timeout(Duration::from_secs(5)).unwrap()
        };

        let (tx, rx) = channel();
        scheduler.schedule(
            move || tx.send(registry::current_thread_id()).unwrap(),
            worker_id as i64,
        );
        let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, worker_id);

        scheduler.stop();
    }

    #[test]
    fn use_caller_drains_the_constructing_thread_share() {
        let scheduler = Scheduler::new(1, true, "caller-test");
        scheduler.start();

        let (tx, rx) = channel();
        scheduler.schedule(move || tx.send(()).unwrap(), ANY_THREAD);

        // With a single, use_caller scheduler there are zero spawned
        // worker threads: the task only drains once `stop()` resumes the
        // caller's own scheduling coroutine.
        assert!(rx.try_recv().is_err());
        scheduler.stop();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
