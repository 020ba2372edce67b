//! `Handle` is a clonable, reference-counted handle onto a shared
//! `Coroutine`; this demo shows two coroutines mutating a value shared
//! behind an `Arc<Mutex<_>>` while suspended mid-body, and checks
//! `Coroutine::total_count()` bookkeeping as handles come and go.

use std::sync::{Arc, Mutex};

use corostra::Coroutine;

fn main() {
    env_logger::init();

    let shared = Arc::new(Mutex::new(0));
    let before = Coroutine::total_count();

    let shared1 = shared.clone();
    let coro1 = Coroutine::construct(
        move || {
            *shared1.lock().unwrap() = 1;
            let val = *shared1.lock().unwrap();
            println!("coroutine 1 set shared = {}", val);
            Coroutine::yield_now();
        },
        0,
        false,
    );

    let shared2 = shared.clone();
    let coro2 = Coroutine::construct(
        move || {
            *shared2.lock().unwrap() = 2;
            let val = *shared2.lock().unwrap();
            println!("coroutine 2 set shared = {}", val);
            Coroutine::yield_now();
        },
        0,
        false,
    );

    assert_eq!(Coroutine::total_count(), before + 2);

    Coroutine::resume(&coro1);
    println!("after coroutine 1: shared = {}", *shared.lock().unwrap());
    Coroutine::resume(&coro2);
    println!("after coroutine 2: shared = {}", *shared.lock().unwrap());

    // Drive both to TERM, then drop them: total_count falls back down.
    Coroutine::resume(&coro1);
    Coroutine::resume(&coro2);
    drop(coro1);
    drop(coro2);
    assert_eq!(Coroutine::total_count(), before);
    println!("total_count back to {}", before);
}
