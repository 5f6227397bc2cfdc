//! Ambient services injected into an actor: a wall clock and an id generator.
//!
//! These are the only sources of non-determinism inside the core (§6, §9).
//! Production code gets [`SystemClock`] and [`UuidGenerator`] by default;
//! tests reach for [`testing::VirtualClock`] and [`testing::SequentialIdGenerator`]
//! to make timer- and invocation-id-dependent scenarios reproducible.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A source of ids for auto-generated actor and invocation names.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// A source of time, abstracting over the timer manager's suspension point.
pub trait Clock: Send + Sync {
    /// Returns a future that resolves after `duration` has elapsed according
    /// to this clock.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Default [`IdGenerator`] backed by random UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Default [`Clock`] backed by the Tokio time driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Deterministic test doubles for [`Clock`] and [`IdGenerator`].
///
/// `VirtualClock` is intentionally minimal: it does not attempt to implement
/// a fully virtual timer wheel. Instead `sleep` is implemented in terms of
/// Tokio's `test-util` paused-time driver, so advancing the clock in a test
/// is done with `tokio::time::advance` as usual; `VirtualClock` exists so
/// call sites depend on the `Clock` trait rather than on `tokio::time`
/// directly, keeping the actor runtime swappable.
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Default)]
    pub struct VirtualClock;

    impl Clock for VirtualClock {
        fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
            Box::pin(tokio::time::sleep(duration))
        }
    }

    /// An [`IdGenerator`] that hands out `prefix-0`, `prefix-1`, ... in order.
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(0),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("id")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }
}
