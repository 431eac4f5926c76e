//! The local persistence contract: append-only message log, the per-room
//! auth row, and the peer directory.
//!
//! `Store` wraps a single `rusqlite::Connection`. It is not `Sync`; the
//! single-writer discipline for writes is enforced one level up by
//! [`crate::queue::WriteQueue`], which owns a `Store` exclusively inside
//! its worker task. Reads (`get_*`) are also exposed directly here for
//! callers that hold their own `Store` (e.g. a responder building a
//! catch-up payload) — the schema has no reader/writer lock of its own
//! beyond what SQLite's WAL mode provides.

use std::path::Path;

use log::info;
use rusqlite::{params, Connection, OptionalExtension};

use common::{PeerId, RoomId, ServerId, User};
use protocol::CoreError;

use crate::models::{NewMessage, PeerRow, RoomAuthRow, StoredMessage};
use crate::schema;

pub struct Store {
    conn: Connection,
}

fn sql_err(context: &str, err: rusqlite::Error) -> CoreError {
    CoreError::storage(format!("{}: {}", context, err))
}

/// A `0` `timestamp_micros` means the transport never stamped one; rewrite
/// it to "now" before it is persisted (spec §4.G: "zero timestamp is
/// rewritten to 'now' before storage but still fails verification if the
/// transport already stamped a future value" — that verification runs
/// against the originally-declared value, upstream of this rewrite).
fn effective_timestamp(timestamp_micros: i64) -> i64 {
    if timestamp_micros == 0 {
        common::now_micros()
    } else {
        timestamp_micros
    }
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store, CoreError> {
        let conn = Connection::open(path).map_err(|e| sql_err("open database", e))?;
        schema::migrate(&conn).map_err(|e| sql_err("migrate schema", e))?;
        info!("opened database at {}", path.as_ref().display());
        Ok(Store { conn })
    }

    /// An in-memory database, for tests and fixtures.
    pub fn open_in_memory() -> Result<Store, CoreError> {
        let conn = Connection::open_in_memory().map_err(|e| sql_err("open in-memory database", e))?;
        schema::migrate(&conn).map_err(|e| sql_err("migrate schema", e))?;
        Ok(Store { conn })
    }

    /// Idempotent on `(room_id, chain_index)` when `chain_index` is
    /// present: a duplicate insert is silently ignored.
    pub fn save_envelope(&self, message: &NewMessage) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO messages
                 (room_id, server_id, chain_index, envelope_type, sender_id, timestamp_micros, signature, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.room_id.as_str(),
                    message.server_id.as_str(),
                    message.chain_index.map(|i| i as i64),
                    message.envelope_type,
                    message.sender_id.as_str(),
                    effective_timestamp(message.timestamp_micros),
                    message.signature,
                    message.payload,
                ],
            )
            .map_err(|e| sql_err("save envelope", e))?;
        Ok(())
    }

    /// Insert a batch of envelopes inside one transaction — the shape the
    /// write queue's worker uses for its periodic flush.
    pub fn save_envelopes_batch(&mut self, messages: &[NewMessage]) -> Result<(), CoreError> {
        let tx = self.conn.transaction().map_err(|e| sql_err("begin batch transaction", e))?;
        for message in messages {
            tx.execute(
                "INSERT OR IGNORE INTO messages
                 (room_id, server_id, chain_index, envelope_type, sender_id, timestamp_micros, signature, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.room_id.as_str(),
                    message.server_id.as_str(),
                    message.chain_index.map(|i| i as i64),
                    message.envelope_type,
                    message.sender_id.as_str(),
                    effective_timestamp(message.timestamp_micros),
                    message.signature,
                    message.payload,
                ],
            )
            .map_err(|e| sql_err("save envelope in batch", e))?;
        }
        tx.commit().map_err(|e| sql_err("commit batch transaction", e))?;
        Ok(())
    }

    /// Stored envelopes with `chain_index >= since`, ascending, envelopes
    /// without a chain index excluded.
    pub fn get_messages_since_chain_index(
        &self,
        room_id: &RoomId,
        since: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, CoreError> {
        let limit = limit.unwrap_or(i64::MAX as usize) as i64;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, room_id, server_id, chain_index, envelope_type, sender_id, timestamp_micros, signature, payload
                 FROM messages
                 WHERE room_id = ?1 AND chain_index IS NOT NULL AND chain_index >= ?2
                 ORDER BY chain_index ASC
                 LIMIT ?3",
            )
            .map_err(|e| sql_err("prepare messages-since query", e))?;
        let rows = stmt
            .query_map(params![room_id.as_str(), since as i64, limit], map_stored_message)
            .map_err(|e| sql_err("run messages-since query", e))?;
        collect(rows)
    }

    /// Present-chain-index rows first (ascending by chain index), then
    /// chain-index-absent rows, each group ordered ascending by timestamp —
    /// the ordering the spec's persistence contract names verbatim.
    pub fn get_latest_messages(&self, room_id: &RoomId, limit: usize) -> Result<Vec<StoredMessage>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, room_id, server_id, chain_index, envelope_type, sender_id, timestamp_micros, signature, payload
                 FROM messages
                 WHERE room_id = ?1
                 ORDER BY (chain_index IS NULL) ASC, chain_index ASC, timestamp_micros ASC
                 LIMIT ?2",
            )
            .map_err(|e| sql_err("prepare latest-messages query", e))?;
        let rows = stmt
            .query_map(params![room_id.as_str(), limit as i64], map_stored_message)
            .map_err(|e| sql_err("run latest-messages query", e))?;
        collect(rows)
    }

    pub fn get_latest_chain_index(&self, room_id: &RoomId) -> Result<u64, CoreError> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(chain_index) FROM messages WHERE room_id = ?1 AND chain_index IS NOT NULL",
                params![room_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| sql_err("query latest chain index", e))?
            .flatten();
        value
            .map(|v| v as u64)
            .ok_or_else(|| CoreError::not_found(format!("no chain index for room {}", room_id)))
    }

    /// Upsert the auth row: clears `tombstone`, marks `synced`.
    pub fn save_auth(
        &self,
        room_id: &RoomId,
        chain_index: u64,
        master_key: &[u8],
        last_used_micros: i64,
    ) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO room_auth (room_id, chain_index, master_ratchet_key, last_used_micros, tombstone, synced)
                 VALUES (?1, ?2, ?3, ?4, 0, 1)
                 ON CONFLICT(room_id) DO UPDATE SET
                    chain_index = excluded.chain_index,
                    master_ratchet_key = excluded.master_ratchet_key,
                    last_used_micros = excluded.last_used_micros,
                    tombstone = 0,
                    synced = 1",
                params![room_id.as_str(), chain_index as i64, master_key, last_used_micros],
            )
            .map_err(|e| sql_err("save auth row", e))?;
        Ok(())
    }

    pub fn get_auth(&self, room_id: &RoomId) -> Result<RoomAuthRow, CoreError> {
        self.conn
            .query_row(
                "SELECT room_id, chain_index, master_ratchet_key, last_used_micros, tombstone, synced
                 FROM room_auth WHERE room_id = ?1",
                params![room_id.as_str()],
                map_room_auth_row,
            )
            .optional()
            .map_err(|e| sql_err("query auth row", e))?
            .ok_or_else(|| CoreError::not_found(format!("no auth row for room {}", room_id)))
    }

    /// Mark the room's auth row as left without deleting it — a future
    /// rejoin can reuse it instead of running catch-up again.
    pub fn soft_delete_auth(&self, room_id: &RoomId) -> Result<(), CoreError> {
        self.conn
            .execute(
                "UPDATE room_auth SET tombstone = 1 WHERE room_id = ?1",
                params![room_id.as_str()],
            )
            .map_err(|e| sql_err("soft-delete auth row", e))?;
        Ok(())
    }

    pub fn save_user(&self, peer: &PeerRow) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO peers (peer_id, dilithium_pub, kyber_pub, libp2p_pub, username, preferred_color, last_seen_micros)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(peer_id) DO UPDATE SET
                    dilithium_pub = excluded.dilithium_pub,
                    kyber_pub = excluded.kyber_pub,
                    libp2p_pub = excluded.libp2p_pub,
                    username = excluded.username,
                    preferred_color = excluded.preferred_color,
                    last_seen_micros = excluded.last_seen_micros",
                params![
                    peer.peer_id.as_str(),
                    peer.dilithium_pub,
                    peer.kyber_pub,
                    peer.libp2p_pub,
                    peer.username,
                    peer.preferred_color,
                    peer.last_seen_micros,
                ],
            )
            .map_err(|e| sql_err("save user", e))?;
        Ok(())
    }

    /// Never `NotFound`: an absent peer comes back as [`User::unknown`],
    /// which verification refuses to accept.
    pub fn get_user_by_id(&self, peer_id: &PeerId) -> Result<User, CoreError> {
        let row: Option<PeerRow> = self
            .conn
            .query_row(
                "SELECT peer_id, dilithium_pub, kyber_pub, libp2p_pub, username, preferred_color, last_seen_micros
                 FROM peers WHERE peer_id = ?1",
                params![peer_id.as_str()],
                map_peer_row,
            )
            .optional()
            .map_err(|e| sql_err("query user", e))?;
        Ok(row.map(User::from).unwrap_or_else(|| User::unknown(peer_id.clone())))
    }

    /// Read-mostly "recently seen" listing; no bearing on crypto state.
    pub fn get_last_seen_peers(&self, limit: usize) -> Result<Vec<User>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT peer_id, dilithium_pub, kyber_pub, libp2p_pub, username, preferred_color, last_seen_micros
                 FROM peers ORDER BY last_seen_micros DESC LIMIT ?1",
            )
            .map_err(|e| sql_err("prepare last-seen-peers query", e))?;
        let rows = stmt
            .query_map(params![limit as i64], map_peer_row)
            .map_err(|e| sql_err("run last-seen-peers query", e))?;
        let rows: Vec<PeerRow> = collect(rows)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

fn collect<T>(rows: rusqlite::MappedRows<impl FnMut(&rusqlite::Row) -> rusqlite::Result<T>>) -> Result<Vec<T>, CoreError> {
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .map_err(|e| sql_err("read result rows", e))
}

fn map_stored_message(row: &rusqlite::Row) -> rusqlite::Result<StoredMessage> {
    let chain_index: Option<i64> = row.get(3)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        room_id: RoomId::from(row.get::<_, String>(1)?),
        server_id: ServerId::from(row.get::<_, String>(2)?),
        chain_index: chain_index.map(|v| v as u64),
        envelope_type: row.get(4)?,
        sender_id: PeerId::from(row.get::<_, String>(5)?),
        timestamp_micros: row.get(6)?,
        signature: row.get(7)?,
        payload: row.get(8)?,
    })
}

fn map_room_auth_row(row: &rusqlite::Row) -> rusqlite::Result<RoomAuthRow> {
    Ok(RoomAuthRow {
        room_id: RoomId::from(row.get::<_, String>(0)?),
        chain_index: row.get::<_, i64>(1)? as u64,
        master_ratchet_key: row.get(2)?,
        last_used_micros: row.get(3)?,
        tombstone: row.get::<_, i64>(4)? != 0,
        synced: row.get::<_, i64>(5)? != 0,
    })
}

fn map_peer_row(row: &rusqlite::Row) -> rusqlite::Result<PeerRow> {
    Ok(PeerRow {
        peer_id: PeerId::from(row.get::<_, String>(0)?),
        dilithium_pub: row.get(1)?,
        kyber_pub: row.get(2)?,
        libp2p_pub: row.get(3)?,
        username: row.get(4)?,
        preferred_color: row.get(5)?,
        last_seen_micros: row.get(6)?,
    })
}
