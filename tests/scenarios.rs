//! End-to-end scenarios covering coroutine and scheduler lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corostra::{current_worker_id, Coroutine, Scheduler, State, ANY_THREAD};

/// S1 — single coroutine, two yields.
#[test]
fn s1_single_coroutine_two_yields() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let trace2 = trace.clone();

    let coro = Coroutine::construct(
        move || {
            trace2.lock().unwrap().push("A");
            Coroutine::yield_now();
            trace2.lock().unwrap().push("B");
        },
        0,
        false,
    );

    Coroutine::resume(&coro);
    assert_eq!(*trace.lock().unwrap(), vec!["A"]);
    assert_eq!(coro.state(), State::Ready);

    Coroutine::resume(&coro);
    assert_eq!(*trace.lock().unwrap(), vec!["A", "B"]);
    assert_eq!(coro.state(), State::Term);
}

/// S2 — refcount release: dropping the last external handle to a
/// completed coroutine tears it down and `total_count()` reflects it.
#[test]
fn s2_refcount_release() {
    let before = Coroutine::total_count();

    let ran = Arc::new(AtomicUsize::new(0));
    let ran2 = ran.clone();
    let coro = Coroutine::construct(
        move || {
            println!("X");
            ran2.fetch_add(1, Ordering::SeqCst);
        },
        0,
        false,
    );

    assert_eq!(Coroutine::total_count(), before + 1);
    Coroutine::resume(&coro);
    assert_eq!(coro.state(), State::Term);
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    drop(coro);
    assert_eq!(Coroutine::total_count(), before);
}

/// S3 — reset reuse: a TERM coroutine reset with a new entry runs that
/// entry exactly once, over the same stack allocation.
#[test]
fn s3_reset_reuse() {
    let ran = Arc::new(Mutex::new(Vec::new()));

    let ran1 = ran.clone();
    let coro = Coroutine::construct(
        move || {
            Coroutine::yield_now();
            ran1.lock().unwrap().push("E1");
        },
        0,
        false,
    );

    Coroutine::resume(&coro);
    Coroutine::resume(&coro);
    assert_eq!(coro.state(), State::Term);
    assert_eq!(*ran.lock().unwrap(), vec!["E1"]);

    let ran2 = ran.clone();
    coro.reset(move || {
        ran2.lock().unwrap().push("E2");
    });
    Coroutine::resume(&coro);
    assert_eq!(coro.state(), State::Term);
    assert_eq!(*ran.lock().unwrap(), vec!["E1", "E2"]);
}

/// S4 — use-caller scheduling: with `threads = 1, use_caller = true`,
/// `start()` spawns no worker threads; both callables only run once
/// `stop()` resumes the caller's scheduling coroutine, in submission order.
#[test]
fn s4_use_caller_scheduling() {
    let scheduler = Scheduler::new(1, true, "s4");

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..2 {
        let order = order.clone();
        scheduler.schedule(move || order.lock().unwrap().push(i), ANY_THREAD);
    }

    scheduler.start();
    assert!(order.lock().unwrap().is_empty(), "nothing runs before stop()");

    scheduler.stop();
    assert_eq!(*order.lock().unwrap(), vec![0, 1]);
}

/// S5 — N-worker dispatch with pinning: an unpinned task lands on *some*
/// worker; a task subsequently pinned to that worker's id only ever runs
/// there, and unpinned work is collectively covered exactly once each.
#[test]
fn s5_n_worker_dispatch_with_pinning() {
    let scheduler = Scheduler::new(3, false, "s5");
    scheduler.start();

    let (probe_tx, probe_rx) = channel();
    scheduler.schedule(move || probe_tx.send(current_worker_id()).unwrap(), ANY_THREAD);
    let worker_1_id = probe_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let (tx, rx) = channel();
    let mut unpinned_ids = Vec::new();
    for i in 0..5 {
        let tx = tx.clone();
        scheduler.schedule(
            move || tx.send((i, current_worker_id())).unwrap(),
            ANY_THREAD,
        );
    }
    drop(tx);
    for _ in 0..5 {
        unpinned_ids.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }
    unpinned_ids.sort_by_key(|&(i, _)| i);
    assert_eq!(
        unpinned_ids.iter().map(|&(i, _)| i).collect::<Vec<_>>(),
        (0..5).collect::<Vec<_>>()
    );

    let (pin_tx, pin_rx) = channel();
    scheduler.schedule(
        move || pin_tx.send(current_worker_id()).unwrap(),
        worker_1_id as i64,
    );
    let ran_on = pin_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(ran_on, worker_1_id);

    scheduler.stop();
    assert_eq!(scheduler.active_thread_count(), 0);
}

/// S6 — self-rescheduling coroutine: a callable that reschedules itself
/// pinned to its own worker's id, five times, all land on the same
/// worker thread.
#[test]
fn s6_self_rescheduling_coroutine() {
    let scheduler = Scheduler::new(3, false, "s6");
    scheduler.start();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = channel();

    countdown(scheduler.clone(), 5, seen.clone(), done_tx, ANY_THREAD);

    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    scheduler.stop();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|&id| id == seen[0]));
}

fn countdown(
    scheduler: Arc<Scheduler>,
    remaining: usize,
    seen: Arc<Mutex<Vec<u64>>>,
    done: std::sync::mpsc::Sender<()>,
    pin: i64,
) {
    let this_id = current_worker_id();
    seen.lock().unwrap().push(this_id);

    if remaining > 1 {
        let pin = if pin == ANY_THREAD { this_id as i64 } else { pin };
        let scheduler2 = scheduler.clone();
        scheduler.schedule(
            move || countdown(scheduler2, remaining - 1, seen, done, pin),
            pin,
        );
    } else {
        done.send(()).unwrap();
    }
}

/// Scheduling zero tasks, then stopping, must terminate.
#[test]
fn stopping_with_no_tasks_terminates() {
    let scheduler = Scheduler::new(2, false, "empty");
    scheduler.start();
    scheduler.stop();
    assert_eq!(scheduler.active_thread_count(), 0);
}
