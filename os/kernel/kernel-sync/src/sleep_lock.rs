use crate::Scheduler;
use core::{
    fmt,
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Marks an unheld lock in [`SleepLock::holder`].
const NO_HOLDER: usize = 0;

/// Blocking lock that yields while waiting and serves waiters in arrival order.
///
/// Unlike [`SpinLock`](crate::SpinLock) it does not guard a value and has no
/// RAII guard: ownership spans API calls (acquire in one call, release in a
/// later one), so callers pair [`acquire`](Self::acquire) and
/// [`release`](Self::release) themselves and use [`holding`](Self::holding) to
/// check the pairing.
///
/// Waiters take a ticket and yield through `S` until their ticket is served,
/// which makes the hand-off FIFO.
pub struct SleepLock<S> {
    name: &'static str,
    next_ticket: AtomicUsize,
    now_serving: AtomicUsize,
    /// [`Scheduler::current`] of the holder, or [`NO_HOLDER`].
    holder: AtomicUsize,
    _scheduler: PhantomData<fn() -> S>,
}

impl<S> SleepLock<S> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            next_ticket: AtomicUsize::new(0),
            now_serving: AtomicUsize::new(0),
            holder: AtomicUsize::new(NO_HOLDER),
            _scheduler: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether any context holds the lock. Racy; diagnostics only.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.now_serving.load(Ordering::Relaxed) != self.next_ticket.load(Ordering::Relaxed)
    }
}

impl<S: Scheduler> SleepLock<S> {
    /// Block until the lock is granted to the calling context.
    pub fn acquire(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        // Acquire when we observe our turn
        while self.now_serving.load(Ordering::Acquire) != ticket {
            S::yield_now();
        }
        self.holder.store(S::current(), Ordering::Relaxed);
    }

    /// Take the lock only if nobody holds it or waits for it.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let serving = self.now_serving.load(Ordering::Relaxed);
        let acquired = self
            .next_ticket
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok();
        if acquired {
            self.holder.store(S::current(), Ordering::Relaxed);
        }
        acquired
    }

    /// Hand the lock to the next waiter.
    ///
    /// # Panics
    /// If the calling context does not hold the lock.
    pub fn release(&self) {
        assert!(
            self.holding(),
            "{}: released by a context that does not hold it",
            self.name
        );
        self.holder.store(NO_HOLDER, Ordering::Relaxed);
        // Release when we advance the serving ticket
        self.now_serving.fetch_add(1, Ordering::Release);
    }

    /// Whether the calling context holds the lock.
    #[inline]
    #[must_use]
    pub fn holding(&self) -> bool {
        self.holder.load(Ordering::Relaxed) == S::current()
    }
}

impl<S> fmt::Debug for SleepLock<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepLock")
            .field("name", &self.name)
            .field("holder", &self.holder.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostScheduler;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    type Lock = SleepLock<HostScheduler>;

    #[test]
    fn acquire_marks_caller_as_holder() {
        let lock = Lock::new("test");
        assert!(!lock.holding());
        assert!(!lock.is_locked());

        lock.acquire();
        assert!(lock.holding());
        assert!(lock.is_locked());

        lock.release();
        assert!(!lock.holding());
        assert!(!lock.is_locked());
    }

    #[test]
    fn other_threads_do_not_hold() {
        let lock = Lock::new("test");
        lock.acquire();
        thread::scope(|s| {
            s.spawn(|| assert!(!lock.holding()));
        });
        lock.release();
    }

    #[test]
    fn try_acquire_fails_while_held() {
        let lock = Lock::new("test");
        assert!(lock.try_acquire());
        thread::scope(|s| {
            s.spawn(|| assert!(!lock.try_acquire()));
        });
        lock.release();
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    #[should_panic(expected = "released by a context that does not hold it")]
    fn release_without_holding_panics() {
        let lock = Lock::new("test");
        lock.release();
    }

    #[test]
    fn release_from_another_thread_panics() {
        let lock = Lock::new("test");
        lock.acquire();
        let res = thread::scope(|s| s.spawn(|| lock.release()).join());
        assert!(res.is_err(), "non-holder release must panic");
        assert!(lock.holding());
        lock.release();
    }

    #[test]
    fn waiter_blocks_until_release() {
        let lock = Lock::new("test");
        let entered = AtomicBool::new(false);
        lock.acquire();
        thread::scope(|s| {
            s.spawn(|| {
                lock.acquire();
                entered.store(true, Ordering::SeqCst);
                lock.release();
            });
            thread::sleep(Duration::from_millis(50));
            assert!(!entered.load(Ordering::SeqCst), "waiter entered early");
            lock.release();
        });
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn waiters_are_served_in_ticket_order() {
        let lock = Arc::new(Lock::new("test"));
        let order = Arc::new(Mutex::new(Vec::new()));
        lock.acquire();

        let mut handles = Vec::new();
        for i in 0..4 {
            let waiter = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                waiter.acquire();
                order.lock().unwrap().push(i);
                waiter.release();
            }));
            // Wait for the thread to take its ticket before spawning the next.
            while lock.next_ticket.load(Ordering::SeqCst) != i + 2 {
                thread::yield_now();
            }
        }

        lock.release();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn contended_increments_are_exclusive() {
        let threads = 4;
        let iters = 500;
        let lock = Lock::new("test");
        let in_cs = AtomicUsize::new(0);
        let total = AtomicUsize::new(0);
        let start = Barrier::new(threads);

        thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    start.wait();
                    for _ in 0..iters {
                        lock.acquire();
                        let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(prev, 0, "mutual exclusion violated");
                        total.fetch_add(1, Ordering::Relaxed);
                        in_cs.fetch_sub(1, Ordering::SeqCst);
                        lock.release();
                    }
                });
            }
        });

        assert_eq!(total.load(Ordering::Relaxed), threads * iters);
    }
}
