//! Test-only support crate: in-memory duplex transports, a deterministic
//! [`bep_core::Environment`], and a recording [`bep_core::Model`], used by
//! `bep-core` and `bep-crypto`'s integration tests to run end-to-end
//! scenarios without a real socket or filesystem.

pub mod env;
pub mod model;
pub mod transport;

pub use env::DeterministicEnvironment;
pub use model::RecordingModel;
pub use transport::{duplex_pair, Endpoint};
