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

//! A unit of work submitted to a [`Scheduler`](crate::Scheduler).

use crate::coroutine::Handle;

/// A callable a scheduler can wrap in a fresh, pinned coroutine.
pub type Callable = Box<dyn FnOnce() + Send + 'static>;

/// Any worker is eligible to run this task.
pub const ANY_THREAD: i64 = -1;

enum Body {
    Coroutine(Handle),
    Callable(Callable),
    Empty,
}

/// `{maybe_coroutine, maybe_callable, thread_pin}`: exactly one of the
/// first two is populated, or neither (the empty task, which the scheduler
/// skips).
pub struct Task {
    body: Body,
    thread_pin: i64,
}

impl Task {
    /// Wrap an already-constructed coroutine. The caller is responsible
    /// for having built it `pinned = true` if it is meant to run under a
    /// scheduler: the scheduler resumes it as-is, and does not touch its
    /// partner selection.
    pub fn coroutine(handle: Handle, thread_pin: i64) -> Task {
        Task {
            body: Body::Coroutine(handle),
            thread_pin,
        }
    }

    /// Wrap a plain callable; the scheduler will build a pinned coroutine
    /// around it (or reuse one) when it is dispatched.
    pub fn callable<F>(f: F, thread_pin: i64) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            body: Body::Callable(Box::new(f)),
            thread_pin,
        }
    }

    /// The empty task: carries neither a coroutine nor a callable.
    pub fn empty() -> Task {
        Task {
            body: Body::Empty,
            thread_pin: ANY_THREAD,
        }
    }

    /// Clear this task back to empty, returning whatever it held.
    pub fn reset(&mut self) -> Task {
        std::mem::replace(self, Task::empty())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.body, Body::Empty)
    }

    pub fn thread_pin(&self) -> i64 {
        self.thread_pin
    }

    /// Whether this task is eligible to run on `thread_id`.
    pub fn eligible_on(&self, thread_id: u64) -> bool {
        self.thread_pin == ANY_THREAD || self.thread_pin as u64 == thread_id
    }

    /// Take this task's coroutine, if it carries one.
    pub fn into_coroutine(self) -> Option<Handle> {
        match self.body {
            Body::Coroutine(h) => Some(h),
            _ => None,
        }
    }

    /// Take this task's callable, if it carries one.
    pub fn into_callable(self) -> Option<Callable> {
        match self.body {
            Body::Callable(f) => Some(f),
            _ => None,
        }
    }

    /// Consume this task, returning whichever of the two bodies it carries.
    /// `None` only for the empty task.
    pub fn dispatch(self) -> Option<Dispatch> {
        match self.body {
            Body::Coroutine(h) => Some(Dispatch::Coroutine(h)),
            Body::Callable(f) => Some(Dispatch::Callable(f)),
            Body::Empty => None,
        }
    }
}

/// The two shapes a non-empty [`Task`] can dispatch as.
pub enum Dispatch {
    Coroutine(Handle),
    Callable(Callable),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_task_is_empty() {
        assert!(Task::empty().is_empty());
    }

    #[test]
    fn callable_task_is_eligible_on_matching_pin_only() {
        let t = Task::callable(|| {}, 3);
        assert!(!t.eligible_on(1));
        assert!(t.eligible_on(3));
    }

    #[test]
    fn any_thread_pin_is_always_eligible() {
        let t = Task::callable(|| {}, ANY_THREAD);
        assert!(t.eligible_on(0));
        assert!(t.eligible_on(42));
    }
}
