//! In-memory transports: a connected pair of duplex byte streams standing
//! in for a TLS-over-TCP socket, so scenario tests never touch a real
//! network interface.

use tokio::io::{split, DuplexStream, ReadHalf, WriteHalf};

/// One endpoint of a [`duplex_pair`]: independent read/write halves, as
/// [`bep_core::Connection::start`] expects.
pub type Endpoint = (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>);

/// Build a pair of connected in-memory endpoints: bytes written to one
/// side's writer are readable from the other side's reader. `buffer_size`
/// bounds how much either side can have in flight before a write blocks.
#[must_use]
pub fn duplex_pair(buffer_size: usize) -> (Endpoint, Endpoint) {
    let (a, b) = tokio::io::duplex(buffer_size);
    (split(a), split(b))
}
