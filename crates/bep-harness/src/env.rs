//! A deterministic [`Environment`] for reproducible tests: a seeded RNG
//! stands in for OS entropy, and wall-clock reads come from an internal
//! counter instead of the real clock, so "always newest" assertions don't
//! race real time. Monotonic timing (`now`/`sleep`) still goes through
//! real `tokio::time`, which a `#[tokio::test(start_paused = true)]` test
//! can pause and advance for its own determinism.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bep_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Base wall-clock instant every [`DeterministicEnvironment`] starts at:
/// 2023-11-14T22:13:20Z, comfortably after this crate was written.
const BASE_UNIX_SECS: u64 = 1_700_000_000;
const BASE_UNIX_NANOS: u64 = BASE_UNIX_SECS * 1_000_000_000;

/// Deterministic [`Environment`]: seeded ChaCha8 RNG, and a wall clock
/// that advances by one nanosecond per read so repeated calls are always
/// strictly increasing without depending on real time.
#[derive(Clone)]
pub struct DeterministicEnvironment {
    rng: Arc<Mutex<ChaCha8Rng>>,
    nanos_elapsed: Arc<AtomicU64>,
}

impl DeterministicEnvironment {
    /// Build an environment seeded from `seed`; same seed, same sequence
    /// of "random" bytes on every run.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            nanos_elapsed: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Environment for DeterministicEnvironment {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }

    fn unix_timestamp_secs(&self) -> u64 {
        BASE_UNIX_SECS + self.nanos_elapsed.load(Ordering::Relaxed) / 1_000_000_000
    }

    fn unix_timestamp_nanos(&self) -> u64 {
        BASE_UNIX_NANOS + self.nanos_elapsed.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_is_reproducible_given_the_same_seed() {
        let a = DeterministicEnvironment::new(42);
        let b = DeterministicEnvironment::new(42);
        let mut buf_a = [0u8; 16];
        let mut buf_b = [0u8; 16];
        a.random_bytes(&mut buf_a);
        b.random_bytes(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn unix_timestamp_nanos_is_strictly_increasing() {
        let env = DeterministicEnvironment::new(1);
        let a = env.unix_timestamp_nanos();
        let b = env.unix_timestamp_nanos();
        assert!(b > a);
    }
}
