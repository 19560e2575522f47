/// Hooks a [`SleepLock`](crate::SleepLock) needs from whatever runs the
/// execution contexts (kernel scheduler, host threads).
pub trait Scheduler {
    /// Identifier of the running execution context.
    ///
    /// Must be non-zero and unique among contexts that are alive at the same
    /// time; zero marks an unheld lock.
    fn current() -> usize;

    /// Give up the CPU while waiting for a contended lock.
    fn yield_now();
}

#[cfg(any(test, feature = "std"))]
pub use host::HostScheduler;

#[cfg(any(test, feature = "std"))]
mod host {
    use super::Scheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

    std::thread_local! {
        static CONTEXT_ID: usize = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    }

    /// [`Scheduler`] backed by host OS threads.
    ///
    /// Every thread gets a distinct id on first use; waiting yields to the OS.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct HostScheduler;

    impl Scheduler for HostScheduler {
        fn current() -> usize {
            CONTEXT_ID.with(|id| *id)
        }

        fn yield_now() {
            std::thread::yield_now();
        }
    }
}
