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

//! Coroutine spawn options.

use crate::context::DEFAULT_STACK_SIZE;

/// Coroutine spawn options.
#[derive(Debug, Clone)]
pub struct Options {
    /// The size of the stack, in bytes. Zero means [`DEFAULT_STACK_SIZE`].
    pub stack_size: usize,

    /// The name of the coroutine, used only in log messages.
    pub name: Option<String>,

    /// Whether this coroutine's resume/yield partner is a scheduling
    /// coroutine (`true`) or the calling thread's thread-main coroutine
    /// (`false`). Coroutines submitted to a [`Scheduler`](crate::Scheduler)
    /// must be pinned; freestanding coroutines usually are not.
    pub pinned: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            stack_size: DEFAULT_STACK_SIZE,
            name: None,
            pinned: true,
        }
    }
}
