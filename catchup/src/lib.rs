//! Join-time catch-up protocol (spec §4.F) and the room session state
//! machine that drives it (spec §4.G): request/response framing over
//! `transport`, backlog persistence into `storage`.

pub mod framing;
pub mod requester;
pub mod responder;
pub mod session;

#[cfg(test)]
mod integration_test;

pub use requester::RequesterOptions;
pub use session::{RoomSession, SessionState};
