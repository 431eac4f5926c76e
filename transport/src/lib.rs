//! The transport seam: a narrow `Transport` trait standing in for
//! whatever gossip overlay actually moves bytes between peers, plus the
//! fixed topic-name namespace shared with that overlay.

pub mod memory;
pub mod topics;
mod transport;

pub use memory::MemoryTransport;
pub use transport::Transport;
pub use tokio_util::sync::CancellationToken;
