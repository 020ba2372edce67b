// Copyright 2013 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Raw machine-context save/restore and stack ownership.
//!
//! This is a thin adapter over the `context` crate (the same dependency the
//! upstream coroutine library already declared this concern against) rather
//! than hand-rolled per-architecture assembly: the register-layout tables
//! this module used to carry required nightly-only `#![feature(asm)]` and
//! have no stable equivalent left in the language. See DESIGN.md for the
//! full rationale.
//!
//! The crate's `Context::resume` is a consuming, "Transfer"-returning
//! primitive: resuming a context hands it a `usize` and gets back a
//! `Transfer` bundling the continuation of whoever swapped back plus a
//! return `usize`. `swap` below folds `capture`+`resume` into one call,
//! which is all callers in this crate ever need: a coroutine's `context`
//! field always holds exactly one saved continuation, and `swap` atomically
//! replaces it with the continuation of whichever party yields back.

use context::stack::ProtectedFixedSizeStack;
use context::{Context as RawContext, Transfer};
use std::cell::Cell;

use crate::error::{fatal, FatalError};

/// Default coroutine stack size: 128 KiB, per spec.
pub const DEFAULT_STACK_SIZE: usize = 128 * 1024;

/// An owned, guard-paged stack region.
pub type Stack = ProtectedFixedSizeStack;

/// Allocate a stack of `size` bytes (or [`DEFAULT_STACK_SIZE`] if `size == 0`).
///
/// Allocation failure is fatal (`RESOURCE_EXHAUSTED`), per spec.
pub fn allocate_stack(size: usize) -> Stack {
    let size = if size == 0 { DEFAULT_STACK_SIZE } else { size };
    match ProtectedFixedSizeStack::new(size) {
        Ok(stack) => stack,
        Err(_) => fatal(FatalError::ResourceExhausted, "stack allocation", 0),
    }
}

/// The entry-point signature the platform context facility invokes on the
/// first resume of a freshly made context. Never returns.
pub type EntryFn = extern "C" fn(Transfer) -> !;

/// A saved machine context: either "nothing saved yet" (the coroutine is
/// currently running, or was never resumed) or a continuation captured by
/// a previous [`swap`].
pub struct MachineContext {
    inner: Cell<Option<RawContext>>,
}

impl std::fmt::Debug for MachineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineContext").finish_non_exhaustive()
    }
}

// `Context` is just a stack pointer; it is only ever touched by the one
// worker thread that owns the coroutine it belongs to at any given time,
// under the same discipline as the rest of this crate's thread-local
// plumbing.
unsafe impl Send for MachineContext {}

impl MachineContext {
    /// An empty context: used for the thread-main coroutine and as a
    /// placeholder before `make` is called.
    pub fn empty() -> MachineContext {
        MachineContext {
            inner: Cell::new(None),
        }
    }

    /// Bind a freshly captured context to `stack`, arming it to invoke
    /// `entry` on first resume.
    pub fn make(stack: &Stack, entry: EntryFn) -> MachineContext {
        let ctx = unsafe { RawContext::new(stack, entry) };
        MachineContext {
            inner: Cell::new(Some(ctx)),
        }
    }

    /// Transfer execution to `to`, passing `data` along, and block until
    /// something swaps back into this exact call. `self` is the context of
    /// the coroutine giving up the CPU; it is not read here (see note
    /// below) — only `to` is.
    ///
    /// Returns the `data` handed back on that eventual swap-back.
    ///
    /// Every switch the underlying `context` crate performs hands the
    /// *target* a fresh [`RawContext`] representing the switcher's
    /// continuation (delivered to the target as the trampoline's argument,
    /// or as the return value of the target's own previous `resume()` call)
    /// — never to the switcher itself. Symmetrically, the `Transfer` this
    /// call eventually gets back bundles the *target's* new continuation,
    /// not the switcher's. So a round trip through `swap` always rearms
    /// `to` (the side that was resumed) with its freshest resumable point;
    /// it is the target's own code (the entry trampoline, via
    /// [`MachineContext::adopt`]) that is responsible for stashing the
    /// switcher's continuation wherever that target needs it to swap back.
    ///
    /// # Safety
    /// `to` must currently be a valid, resumable context: either freshly
    /// made via [`make`](Self::make) or previously rearmed by a swap that
    /// transferred into it.
    pub unsafe fn swap(&self, to: &MachineContext, data: usize) -> usize {
        let to_ctx = to
            .inner
            .take()
            .unwrap_or_else(|| fatal(FatalError::OsError, "swap into empty context", 0));
        let transfer = to_ctx.resume(data);
        to.inner.set(Some(transfer.context));
        transfer.data
    }

    /// Re-arm this context over `stack` to invoke `entry` on next resume,
    /// discarding whatever continuation was previously stored. Used by
    /// `Coroutine::reset` to rewire a `TERM` coroutine's own context.
    pub fn rearm(&self, stack: &Stack, entry: EntryFn) {
        let ctx = unsafe { RawContext::new(stack, entry) };
        self.inner.set(Some(ctx));
    }

    /// Stash a continuation captured from an incoming `Transfer` (i.e. the
    /// switcher's continuation, handed to the target as the trampoline's
    /// argument) into this slot, so this context's owner can swap back to
    /// it later. Called on the *partner's* `MachineContext`, never on the
    /// coroutine's own.
    pub fn adopt(&self, ctx: RawContext) {
        self.inner.set(Some(ctx));
    }
}
