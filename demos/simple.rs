//! Spawn a coroutine, resume it, let it yield back, then resume it again
//! to drive it to completion. Mirrors the original `simple` example but
//! against the asymmetric, no-data-channel resume/yield primitives.

use corostra::Coroutine;

fn main() {
    env_logger::init();

    let coro = Coroutine::construct(
        move || {
            println!("1. Hello from the coroutine!");
            Coroutine::yield_now();
            println!("3. We are back!");

            let nested = Coroutine::construct(
                || {
                    println!("4. Begin counting...");
                    for i in 0..5 {
                        println!("   counting {}", i);
                    }
                    println!("5. Counting finished");
                },
                0,
                false,
            );
            Coroutine::resume(&nested);

            println!("6. Goodbye");
        },
        0,
        false,
    );

    Coroutine::resume(&coro);
    println!("2. We are here!");
    Coroutine::resume(&coro);
    println!("7. Back in main.");
}
