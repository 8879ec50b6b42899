//! Session state machine and async connection driver for the Block
//! Exchange Protocol: the dispatcher layer sitting on top of `bep-proto`'s
//! wire codec and `bep-model`'s data types.

pub mod connection;
pub mod env;
pub mod error;
pub mod model;
pub mod session;

pub use connection::{Connection, ConnectionConfig, Statistics};
pub use env::{Environment, TokioEnvironment};
pub use error::ConnectionError;
pub use model::{Model, RequestFailure, RequestResult};
pub use session::{Session, SessionAction, SessionState};
