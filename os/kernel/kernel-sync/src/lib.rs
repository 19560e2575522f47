//! # Kernel synchronization primitives
//!
//! Two kinds of mutual exclusion, matching how long the critical section is:
//!
//! * [`SpinLock`] busy-waits. Use it for short pointer and counter updates and
//!   never hold it across device I/O.
//! * [`SleepLock`] hands out tickets and yields the CPU through a
//!   [`Scheduler`] while waiting. Use it for long sections, including I/O.
//!   It remembers which execution context holds it, so callers can assert
//!   ownership with [`SleepLock::holding`].

#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![allow(unsafe_code)]

mod scheduler;
mod sleep_lock;
mod spin_lock;

#[cfg(any(test, feature = "std"))]
pub use scheduler::HostScheduler;
pub use scheduler::Scheduler;
pub use sleep_lock::SleepLock;
pub use spin_lock::{SpinLock, SpinLockGuard};
