//! Room session state machine (spec §4.G):
//!
//! ```text
//! Initial ──join success──▶ Fetching auth ──has row──▶ Ready
//!                                  └──no row──▶ Catching up ──ok──▶ Ready
//!                                                              └─err─▶ Failed
//! Ready ──leave──▶ Closed
//! Ready ──fatal crypto──▶ Closed
//! ```
//!
//! One [`RoomSession`] owns the room's [`RoomKeyState`] exclusively (spec
//! §5: "each room session has one logical owner that serializes all
//! mutations of its two ratchets"). While `Catching up`, chat sends are
//! refused with `NotReady`.

use common::{PeerId, RoomId, ServerId, User};
use protocol::room::RoomKeyState;
use protocol::CoreError;
use storage::Store;
use transport::{topics, CancellationToken, Transport};

use crate::requester::{self, RequesterOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initial,
    FetchingAuth,
    CatchingUp,
    Ready,
    Failed,
    Closed,
}

/// Drives one room's lifecycle from join through to leave/shutdown.
pub struct RoomSession {
    state: SessionState,
    server: ServerId,
    room: RoomId,
    key_state: Option<RoomKeyState>,
}

impl RoomSession {
    pub fn new(server: ServerId, room: RoomId) -> Self {
        RoomSession {
            state: SessionState::Initial,
            server,
            room,
            key_state: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Join the room's topics and either resume from a local auth row or
    /// run catch-up, leaving the session `Ready` on success.
    pub async fn join<T: Transport>(
        &mut self,
        transport: &T,
        store: &mut Store,
        local_user: &User,
        local_secret_key: &[u8],
        now_micros: i64,
        cancel: &CancellationToken,
        options: &RequesterOptions,
    ) -> Result<(), CoreError> {
        transport.join(&topics::room_chat(&self.server, &self.room)).await?;
        transport.join(&topics::room_rekey(&self.server, &self.room)).await?;
        transport.join(&topics::room_members(&self.server, &self.room)).await?;
        transport.join(&topics::catchup_request(&self.server, &self.room)).await?;
        self.state = SessionState::FetchingAuth;

        match store.get_auth(&self.room) {
            Ok(auth) if !auth.tombstone => {
                let mut chain_key = [0u8; protocol::constants::CHAIN_KEY_LENGTH];
                if auth.master_ratchet_key.len() != chain_key.len() {
                    self.state = SessionState::Failed;
                    return Err(CoreError::crypto("stored master key has the wrong length"));
                }
                chain_key.copy_from_slice(&auth.master_ratchet_key);
                self.key_state = Some(RoomKeyState::with_params(
                    chain_key,
                    auth.chain_index,
                    options.backup_window,
                    options.max_chain_jump,
                ));
                self.state = SessionState::Ready;
                Ok(())
            }
            _ => {
                self.state = SessionState::CatchingUp;
                match requester::run(
                    transport,
                    store,
                    &self.server,
                    &self.room,
                    local_user,
                    local_secret_key,
                    now_micros,
                    cancel,
                    options,
                )
                .await
                {
                    Ok(key_state) => {
                        // requester::run already persisted the auth row.
                        self.key_state = Some(key_state);
                        self.state = SessionState::Ready;
                        Ok(())
                    }
                    Err(e) => {
                        self.state = SessionState::Failed;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Create a brand-new room: generate a fresh master key (random base,
    /// hashed to the live chain key — spec §3, "created by room creator
    /// (random 32 bytes)"), persist the auth row at chain index 0, join
    /// the room's topics, and leave the session `Ready`. Returns the
    /// random base alongside the derived master key so a caller can
    /// announce the room (e.g. via a `room.meta` publish) without this
    /// crate knowing anything about that wire shape.
    pub async fn create<T: Transport>(
        &mut self,
        transport: &T,
        store: &mut Store,
        now_micros: i64,
        options: &RequesterOptions,
    ) -> Result<[u8; protocol::constants::CHAIN_KEY_LENGTH], CoreError> {
        transport.join(&topics::room_chat(&self.server, &self.room)).await?;
        transport.join(&topics::room_rekey(&self.server, &self.room)).await?;
        transport.join(&topics::room_members(&self.server, &self.room)).await?;
        transport.join(&topics::catchup_request(&self.server, &self.room)).await?;

        let (master_key, base) = protocol::ratchet::generate_master_key();
        store.save_auth(&self.room, 0, &master_key, now_micros)?;
        self.key_state = Some(RoomKeyState::with_params(
            master_key,
            0,
            options.backup_window,
            options.max_chain_jump,
        ));
        self.state = SessionState::Ready;
        Ok(base)
    }

    /// Refuses with [`CoreError::State`] while the session isn't `Ready`
    /// (spec §5: catch-up in progress refuses chat sends with `NotReady`).
    pub fn key_state_mut(&mut self) -> Result<&mut RoomKeyState, CoreError> {
        if self.state != SessionState::Ready {
            return Err(CoreError::state("NotReady"));
        }
        self.key_state
            .as_mut()
            .ok_or_else(|| CoreError::state("NotReady"))
    }

    /// Leave the room's topics, mark its auth row tombstoned (spec §4.E:
    /// "room left, state retained for a possible rejoin without a fresh
    /// catch-up"), and release the ratchet state.
    pub async fn leave<T: Transport>(&mut self, transport: &T, store: &mut Store) -> Result<(), CoreError> {
        transport.leave(&topics::room_chat(&self.server, &self.room)).await?;
        transport.leave(&topics::room_rekey(&self.server, &self.room)).await?;
        transport.leave(&topics::room_members(&self.server, &self.room)).await?;
        transport.leave(&topics::catchup_request(&self.server, &self.room)).await?;
        store.soft_delete_auth(&self.room)?;
        self.key_state = None;
        self.state = SessionState::Closed;
        Ok(())
    }

    /// A fatal crypto error (e.g. an AEAD open that should have succeeded
    /// given validated chain state) closes the session rather than leaving
    /// it in an inconsistent `Ready` state.
    pub fn close_on_fatal_crypto_error(&mut self) {
        self.key_state = None;
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::MemoryTransport;

    #[tokio::test]
    async fn create_persists_auth_and_becomes_ready() {
        let transport = MemoryTransport::standalone(PeerId::from("alice"));
        let mut store = Store::open_in_memory().unwrap();
        let mut session = RoomSession::new(ServerId::from("server-1"), RoomId::from("room-1"));

        let base = session
            .create(&transport, &mut store, 1, &RequesterOptions::default())
            .await
            .unwrap();
        assert_eq!(base.len(), protocol::constants::CHAIN_KEY_LENGTH);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.key_state_mut().is_ok());

        let auth = store.get_auth(&RoomId::from("room-1")).unwrap();
        assert_eq!(auth.chain_index, 0);
        assert!(!auth.tombstone);
    }

    #[tokio::test]
    async fn join_resumes_ready_from_an_existing_auth_row() {
        let transport = MemoryTransport::standalone(PeerId::from("alice"));
        let mut store = Store::open_in_memory().unwrap();
        let room = RoomId::from("room-1");
        store.save_auth(&room, 7, &[3u8; 32], 1).unwrap();

        let mut session = RoomSession::new(ServerId::from("server-1"), room);
        let (pk, sk) = protocol::signing::generate_keypair();
        let local_user = User {
            peer_id: PeerId::from("alice"),
            username: "alice".to_string(),
            preferred_color: "teal".to_string(),
            dilithium_pub: pk,
            kyber_pub: Vec::new(),
            libp2p_pub: Vec::new(),
        };
        let cancel = CancellationToken::new();

        session
            .join(&transport, &mut store, &local_user, &sk, 2, &cancel, &RequesterOptions::default())
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.key_state_mut().unwrap().current_index(), 7);
    }

    #[tokio::test]
    async fn key_state_is_refused_before_ready() {
        let mut session = RoomSession::new(ServerId::from("server-1"), RoomId::from("room-1"));
        let err = session.key_state_mut().unwrap_err();
        assert!(matches!(err, CoreError::State(ref s) if s == "NotReady"));
    }

    #[tokio::test]
    async fn leave_closes_the_session_and_drops_key_state() {
        let transport = MemoryTransport::standalone(PeerId::from("alice"));
        let mut store = Store::open_in_memory().unwrap();
        let mut session = RoomSession::new(ServerId::from("server-1"), RoomId::from("room-1"));
        session
            .create(&transport, &mut store, 1, &RequesterOptions::default())
            .await
            .unwrap();

        session.leave(&transport, &mut store).await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.key_state_mut().is_err());
        assert!(store.get_auth(&RoomId::from("room-1")).unwrap().tombstone);
    }
}
