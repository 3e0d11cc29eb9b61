use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tollfree::{Condition, ConditionLock, Lock, Locking, RecursiveLock, TimedLockStrategy};

fn strategies() -> [TimedLockStrategy; 2] {
    [TimedLockStrategy::Native, TimedLockStrategy::Emulated]
}

#[test]
fn mutual_exclusion_under_contention() {
    for strategy in strategies() {
        let lock = Arc::new(Lock::with_strategy(strategy).with_name("counter"));
        let inside = Arc::new(AtomicBool::new(false));
        let total = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let (lock, inside, total) = (lock.clone(), inside.clone(), total.clone());
                thread::spawn(move || {
                    for n in 0..200 {
                        // Mix blocking and timed acquisition.
                        if (i + n) % 3 == 0 {
                            while !lock.lock_before(Instant::now() + Duration::from_millis(50)) {}
                        } else {
                            lock.lock();
                        }
                        assert!(!inside.swap(true, Ordering::SeqCst), "two holders");
                        total.fetch_add(1, Ordering::Relaxed);
                        inside.store(false, Ordering::SeqCst);
                        lock.unlock();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(total.load(Ordering::Relaxed), 800);
    }
}

#[test]
fn try_lock_is_immediate_while_held() {
    let lock = Arc::new(Lock::new());
    lock.lock();
    let other = lock.clone();
    let elapsed = thread::spawn(move || {
        let start = Instant::now();
        assert!(!other.try_lock());
        start.elapsed()
    })
    .join()
    .unwrap();
    assert!(elapsed < Duration::from_millis(100));
    lock.unlock();
}

#[test]
fn deadline_monotonicity() {
    for strategy in strategies() {
        let lock = Lock::with_strategy(strategy);
        let start = Instant::now();
        assert!(!lock.lock_before(start - Duration::from_secs(1)));
        assert!(start.elapsed() < Duration::from_millis(50));

        let start = Instant::now();
        assert!(lock.lock_before(start + Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_millis(50));
        lock.unlock();

        let r = RecursiveLock::with_strategy(strategy);
        assert!(!r.lock_before(Instant::now() - Duration::from_millis(1)));
        assert_eq!(r.depth(), 0);
    }
}

#[test]
fn condition_broadcast_wakes_before_deadline() {
    let cond = Arc::new(Condition::new().with_name("ready"));
    let flag = Arc::new(AtomicBool::new(false));
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let (cond, flag) = (cond.clone(), flag.clone());
            thread::spawn(move || {
                cond.lock();
                let deadline = Instant::now() + Duration::from_secs(10);
                let mut woke = true;
                while !flag.load(Ordering::SeqCst) && woke {
                    woke = cond.wait_until(deadline);
                }
                cond.unlock();
                woke
            })
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    cond.lock();
    flag.store(true, Ordering::SeqCst);
    cond.broadcast();
    cond.unlock();
    for w in waiters {
        assert!(w.join().unwrap());
    }
}

#[test]
fn condition_wait_times_out() {
    let cond = Condition::new();
    cond.lock();
    assert!(!cond.wait_until(Instant::now() + Duration::from_millis(10)));
    cond.unlock();
}

#[test]
fn condition_lock_hands_off_in_sequence() {
    let cl = Arc::new(ConditionLock::new(0));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let workers: Vec<_> = (0..4isize)
        .rev()
        .map(|step| {
            let (cl, order) = (cl.clone(), order.clone());
            thread::spawn(move || {
                cl.lock_when(step);
                order.lock().push(step);
                cl.unlock_with(step + 1);
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    assert_eq!(cl.condition(), 4);
}

#[test]
fn with_lock_releases_after_panic() {
    let lock = Arc::new(Lock::new());
    let l2 = lock.clone();
    let res = thread::spawn(move || l2.with_lock(|| panic!("inside"))).join();
    assert!(res.is_err());
    assert!(!lock.is_locked());
}
