//! Local persistence: SQLite-backed message log, peer directory, and
//! per-room auth state, plus the single-writer queue that serializes
//! writes onto one connection.

pub mod models;
pub mod queue;
pub mod schema;
pub mod store;

pub use models::{NewMessage, PeerRow, RoomAuthRow, StoredMessage};
pub use queue::{OverflowPolicy, WriteQueue, DEFAULT_QUEUE_CAPACITY};
pub use store::Store;
