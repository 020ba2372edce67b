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

//! Fatal error kinds.
//!
//! Every error here is a programmer error or a resource failure that this
//! crate cannot recover from. None of them are returned as `Result`; they
//! are logged and then the process is aborted, matching the "deterministic
//! abort with a log line" policy described for this runtime.

use std::fmt;

/// A fatal condition that terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// resume on non-READY, yield on non-RUNNING/TERM, reset on non-TERM,
    /// stop from the wrong caller, or schedule after stop.
    InvalidState,
    /// stack or worker-thread allocation failed.
    ResourceExhausted,
    /// a context swap or thread join failed at the OS level.
    OsError,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            FatalError::InvalidState => "invalid state",
            FatalError::ResourceExhausted => "resource exhausted",
            FatalError::OsError => "OS error",
        };
        f.write_str(s)
    }
}

/// Log `kind` against `op` and `coroutine_id`, then abort the process.
///
/// This never returns. Callers invoke it from a context where `!` (or an
/// unreachable tail) is expected, e.g. the end of an `assert`-style guard.
#[cold]
pub fn fatal(kind: FatalError, op: &str, coroutine_id: u64) -> ! {
    log::error!(
        "fatal error: {} during {} (coroutine #{})",
        kind,
        op,
        coroutine_id
    );
    std::process::abort()
}
