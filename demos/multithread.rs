//! Spread counting work across every available core by running a
//! scheduler with one worker thread per CPU and scheduling one callable
//! task per thread's worth of work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corostra::Scheduler;

fn main() {
    env_logger::init();

    let threads = num_cpus::get().max(1);
    let scheduler = Scheduler::new(threads, false, "multithread-demo");
    scheduler.start();

    let remaining = Arc::new(AtomicUsize::new(threads));
    let (tx, rx) = std::sync::mpsc::channel();

    for worker in 0..threads {
        let tx = tx.clone();
        let remaining = remaining.clone();
        scheduler.schedule(
            move || {
                for count in 0..10 {
                    println!("worker slot {}: counting {}", worker, count);
                }
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    tx.send(()).unwrap();
                }
            },
            -1,
        );
    }
    drop(tx);

    rx.recv().unwrap();
    scheduler.stop();
}
