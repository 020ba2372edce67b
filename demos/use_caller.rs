//! A `use_caller` scheduler borrows the constructing thread as one of its
//! scheduling threads: no worker OS thread is spawned for it, and its
//! share of the work only drains once `stop()` resumes the caller's
//! scheduling coroutine. With `threads = 1` and `use_caller = true`, this
//! scheduler runs entirely on `main`'s own thread.

use corostra::Scheduler;

fn main() {
    env_logger::init();

    let scheduler = Scheduler::new(1, true, "use-caller-demo");

    for i in 0..5 {
        scheduler.schedule(move || println!("task {} running on the caller's thread", i), -1);
    }

    // No worker threads exist yet to run these: `start()` spawns zero of
    // them here, since `threads - 1 == 0`.
    scheduler.start();

    println!("about to call stop(); tasks run from inside it");
    scheduler.stop();
    println!("stop() returned: every task above has run");
}
