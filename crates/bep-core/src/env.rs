//! Abstracts wall-clock time and randomness behind a trait so the session
//! state machine and its timers stay deterministic and testable.

use std::future::Future;
use std::time::Duration;

/// Everything the connection driver needs from the outside world besides
/// the transport itself: monotonic time for timers, wall-clock time for
/// version-vector updates, and randomness for request ids and padding.
pub trait Environment: Clone + Send + Sync + 'static {
    /// A monotonic instant type used for timer bookkeeping.
    type Instant: Copy + Ord + Send + Sync + 'static;

    /// The current monotonic instant.
    fn now(&self) -> Self::Instant;

    /// Resolve after `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with cryptographically-random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Current wall-clock time, Unix seconds, used by `Vector::update`'s
    /// clock-mixing formula.
    fn unix_timestamp_secs(&self) -> u64;

    /// Current wall-clock time, Unix nanoseconds, used to derive the
    /// always-newest visible version an encrypted-storage peer sees.
    fn unix_timestamp_nanos(&self) -> u64;

    /// A random `u32`, built from [`Environment::random_bytes`].
    fn random_u32(&self) -> u32 {
        let mut buf = [0u8; 4];
        self.random_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    /// A random `u64`, built from [`Environment::random_bytes`].
    fn random_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        self.random_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }
}

/// Production [`Environment`] backed by `tokio::time` and the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioEnvironment;

impl Environment for TokioEnvironment {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - connection cannot operate securely");
    }

    #[allow(clippy::expect_used)]
    fn unix_timestamp_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }

    #[allow(clippy::expect_used)]
    fn unix_timestamp_nanos(&self) -> u64 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)");
        u64::from(elapsed.subsec_nanos()) + elapsed.as_secs() * 1_000_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokio_environment_produces_varying_randomness() {
        let env = TokioEnvironment;
        let a = env.random_u64();
        let b = env.random_u64();
        assert_ne!(a, b);
    }

    #[test]
    fn unix_timestamp_is_plausible() {
        let env = TokioEnvironment;
        // Any time after this crate was written.
        assert!(env.unix_timestamp_secs() > 1_700_000_000);
    }

    #[test]
    fn unix_timestamp_nanos_is_monotonic_enough() {
        let env = TokioEnvironment;
        let a = env.unix_timestamp_nanos();
        let b = env.unix_timestamp_nanos();
        assert!(b >= a);
    }
}
