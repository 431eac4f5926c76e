//! Idempotent DDL and PRAGMA setup, run once per connection on open.

use rusqlite::Connection;

/// Apply the fixed PRAGMAs (spec §6) and create `messages`, `peers`,
/// `room_auth` if they don't already exist. Safe to call on every open —
/// `CREATE TABLE IF NOT EXISTS` makes this a no-op on a database that
/// already has the schema.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        PRAGMA busy_timeout=5000;

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id         TEXT NOT NULL,
            server_id       TEXT NOT NULL,
            chain_index     INTEGER,
            envelope_type   TEXT NOT NULL,
            sender_id       TEXT NOT NULL,
            timestamp_micros INTEGER NOT NULL,
            signature       BLOB NOT NULL,
            payload         BLOB NOT NULL,
            UNIQUE(room_id, chain_index)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room_chain
            ON messages(room_id, chain_index);

        CREATE TABLE IF NOT EXISTS peers (
            peer_id          TEXT PRIMARY KEY,
            dilithium_pub    BLOB NOT NULL,
            kyber_pub        BLOB NOT NULL,
            libp2p_pub       BLOB NOT NULL,
            username         TEXT NOT NULL,
            preferred_color  TEXT NOT NULL,
            last_seen_micros INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS room_auth (
            room_id             TEXT PRIMARY KEY,
            chain_index         INTEGER NOT NULL,
            master_ratchet_key  BLOB NOT NULL,
            last_used_micros    INTEGER NOT NULL,
            tombstone           INTEGER NOT NULL DEFAULT 0,
            synced              INTEGER NOT NULL DEFAULT 0
        );
        ",
    )
}
