//! The coroutine API here has no per-resume data channel (unlike the
//! original's symmetric `yield_with`/`resume(value)` pair): a coroutine and
//! its resumer exchange values through ordinary shared state instead. This
//! demo reports an "initial" value visible right after the first resume
//! and a "final" value visible once the coroutine has run to completion.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use corostra::Coroutine;

fn main() {
    env_logger::init();

    let slot = Arc::new(AtomicI32::new(0));
    let slot2 = slot.clone();

    let coro = Coroutine::construct(
        move || {
            slot2.store(1, Ordering::SeqCst);
            println!("Initial value: {}", slot2.load(Ordering::SeqCst));
            Coroutine::yield_now();
            slot2.store(2, Ordering::SeqCst);
        },
        0,
        false,
    );

    Coroutine::resume(&coro);
    println!("Midpoint value: {}", slot.load(Ordering::SeqCst));
    Coroutine::resume(&coro);
    println!("Final value: {}", slot.load(Ordering::SeqCst));
}
