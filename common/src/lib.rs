//! Shared value types, configuration, and logging bootstrap used by every
//! crate in the workspace.

pub mod clock;
pub mod config;
pub mod logging;
pub mod types;

pub use clock::now_micros;
pub use config::Config;
pub use types::{base64_bytes, PeerId, RoomId, ServerId, User};
