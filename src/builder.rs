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

//! A chainable configuration surface over [`Coroutine::construct_named`].

use crate::coroutine::{Coroutine, Handle};
use crate::options::Options;

/// Coroutine configuration. Provides detailed control over the stack size,
/// name, and partner selection of a new coroutine.
///
/// ```ignore
/// let coro = Builder::new()
///     .name("worker #1".to_string())
///     .stack_size(64 * 1024)
///     .pinned(false)
///     .spawn(|| println!("hello from a coroutine"));
/// ```
pub struct Builder {
    opts: Options,
}

impl Builder {
    /// Start from the default [`Options`] (128 KiB stack, unnamed, pinned).
    pub fn new() -> Builder {
        Builder {
            opts: Default::default(),
        }
    }

    /// Name the coroutine-to-be. Used only for identification in log lines.
    pub fn name(mut self, name: String) -> Builder {
        self.opts.name = Some(name);
        self
    }

    /// Set the stack size, in bytes.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.opts.stack_size = size;
        self
    }

    /// Choose the swap partner: `true` for a scheduler's scheduling
    /// coroutine, `false` for the calling thread's thread-main coroutine.
    pub fn pinned(mut self, pinned: bool) -> Builder {
        self.opts.pinned = pinned;
        self
    }

    /// Construct the coroutine and return a handle to it.
    pub fn spawn<F>(self, f: F) -> Handle
    where
        F: FnOnce() + Send + 'static,
    {
        Coroutine::construct_named(f, self.opts.stack_size, self.opts.pinned, self.opts.name)
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coroutine::Coroutine;
    use std::sync::mpsc::channel;

    #[test]
    fn builder_spawns_with_chosen_options() {
        let (tx, rx) = channel();
        let coro = Builder::new()
            .name("test builder".to_string())
            .stack_size(64 * 1024)
            .pinned(false)
            .spawn(move || {
                tx.send(1).unwrap();
            });
        assert_eq!(coro.name(), Some("test builder"));
        Coroutine::resume(&coro);
        assert_eq!(rx.recv().unwrap(), 1);
    }
}
