//! SQLite schema of the ledger index.
//!
//! - Timestamps are Unix seconds, block numbers and timestamps stored as
//!   `INTEGER`
//! - Decoded events are stored as tagged JSON in `payload`
//! - Schema version stored in `PRAGMA user_version`

/// Initial schema.
pub const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS blocks (
    number      INTEGER PRIMARY KEY,
    timestamp   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    contract      TEXT NOT NULL,
    name          TEXT NOT NULL,
    block_number  INTEGER NOT NULL REFERENCES blocks(number),
    timestamp     INTEGER NOT NULL,
    payload       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_lookup
    ON events (contract, name, timestamp);

CREATE TABLE IF NOT EXISTS transactions (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    hash           BLOB NOT NULL UNIQUE,
    contract       TEXT NOT NULL,
    function_name  TEXT NOT NULL,
    input          BLOB NOT NULL,
    from_address   BLOB NOT NULL,
    to_address     BLOB NOT NULL,
    block_number   INTEGER NOT NULL REFERENCES blocks(number),
    status         INTEGER NOT NULL,
    timestamp      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_lookup
    ON transactions (contract, function_name, timestamp);
";
