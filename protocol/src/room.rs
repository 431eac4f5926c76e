//! Room key state: the current/backup ratchet pair and the ordering policy
//! that lets a room session decrypt messages that arrive out of order.
//!
//! This is the "interesting algorithm" component. `current` always tracks
//! the sender whose messages arrive in order (including our own sends);
//! `backup` is a lagging clone kept as a bounded window onto the past so
//! that late or reordered messages can still be opened without advancing
//! `current` — and so without revealing any of `current`'s future keys.

use crate::cipher::{self, ChatMessage};
use crate::constants::{CHAIN_KEY_LENGTH, DEFAULT_BACKUP_WINDOW, DEFAULT_MAX_CHAIN_JUMP};
use crate::errors::CoreError;
use crate::ratchet::Ratchet;

/// Owns exactly two ratchets for one joined room. `window` is the fixed lag
/// `W`; `max_chain_jump` bounds how far a single declared index may jump
/// ahead of `current` before being rejected as griefing.
pub struct RoomKeyState {
    current: Ratchet,
    backup: Ratchet,
    window: u64,
    max_chain_jump: u64,
}

impl RoomKeyState {
    /// Initialize both ratchets as identical clones at `starting_index` —
    /// 0 for a freshly created room, or the chain index installed by
    /// catch-up for a joining peer. Uses the spec's default window (10)
    /// and chain-jump cap (10 000).
    pub fn new(chain_key: [u8; CHAIN_KEY_LENGTH], starting_index: u64) -> Self {
        Self::with_params(
            chain_key,
            starting_index,
            DEFAULT_BACKUP_WINDOW,
            DEFAULT_MAX_CHAIN_JUMP,
        )
    }

    /// Same as [`RoomKeyState::new`] but with explicit window/cap, for
    /// configuration loaded from [`common::Config`].
    pub fn with_params(
        chain_key: [u8; CHAIN_KEY_LENGTH],
        starting_index: u64,
        window: u64,
        max_chain_jump: u64,
    ) -> Self {
        let current = Ratchet::new(chain_key, starting_index);
        let backup = current.clone();
        RoomKeyState {
            current,
            backup,
            window,
            max_chain_jump,
        }
    }

    pub fn current_index(&self) -> u64 {
        self.current.index()
    }

    pub fn backup_index(&self) -> u64 {
        self.backup.index()
    }

    /// Advance `current`, seal `plaintext`, and let `backup` catch up
    /// toward the window boundary if it has fallen more than `window`
    /// steps behind.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<ChatMessage, CoreError> {
        let message = cipher::seal(&mut self.current, plaintext)?;
        self.advance_backup_if_lagging()?;
        Ok(message)
    }

    /// Decrypt a received [`ChatMessage`] per the ordering policy:
    ///
    /// - declared index `>= current.index()`: advance `current` up to it
    ///   (letting `backup` trail along at the fixed window), then decrypt
    ///   with the final derived key.
    /// - declared index `< current.index()`: advance only `backup` up to
    ///   it and decrypt from there, leaving `current` untouched. Too old
    ///   (`backup` has already passed that index) is rejected.
    pub fn decrypt(&mut self, message: &ChatMessage) -> Result<Vec<u8>, CoreError> {
        let declared = message.chain_index;

        if declared >= self.current.index() {
            let jump = declared - self.current.index();
            if jump > self.max_chain_jump {
                return Err(CoreError::state("ChainJumpTooLarge"));
            }

            let mut derived = None;
            while self.current.index() <= declared {
                derived = Some(self.current.next_key()?);
                if self.backup.index() + self.window <= self.current.index() {
                    self.backup.next_key()?;
                }
            }
            let derived = derived.expect("loop runs at least once since declared >= index");
            cipher::open(&derived, message)
        } else {
            if self.backup.index() > declared {
                return Err(CoreError::state("MessageTooOld"));
            }

            let mut derived = None;
            while self.backup.index() <= declared {
                derived = Some(self.backup.next_key()?);
            }
            let derived = derived.expect("loop runs at least once since backup.index <= declared");
            cipher::open(&derived, message)
        }
    }

    fn advance_backup_if_lagging(&mut self) -> Result<(), CoreError> {
        if self.backup.index() + self.window <= self.current.index() {
            self.backup.next_key()?;
        }
        Ok(())
    }
}
