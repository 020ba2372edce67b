//! Pin a task to a specific worker thread by id. A task pinned to a
//! thread id other than the one it happens to be inspected from is passed
//! over by every other worker until the right one picks it up.

use std::sync::mpsc::channel;
use std::time::Duration;

use corostra::{Scheduler, ANY_THREAD};

fn main() {
    env_logger::init();

    let scheduler = Scheduler::new(3, false, "pinning-demo");
    scheduler.start();

    // Discover one worker's thread id by running an unpinned probe task.
    let (tx, rx) = channel();
    scheduler.schedule(
        move || tx.send(corostra::current_worker_id()).unwrap(),
        ANY_THREAD,
    );
    let target = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    println!("pinning the next task to worker {}", target);

    let (tx, rx) = channel();
    scheduler.schedule(
        move || tx.send(corostra::current_worker_id()).unwrap(),
        target as i64,
    );
    let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(ran_on, target);
    println!("confirmed: task ran on worker {}", ran_on);

    scheduler.stop();
}
