//! SQLite-backed ledger index.
//!
//! The connection sits behind an async mutex; every query holds it only for
//! the duration of one statement batch.

use std::path::Path;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use ftso_types::ledger::{ContractName, EventRecord, LedgerEvent, TxRecord};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::reader::{IndexReader, IndexedRange};
use crate::{migrations, IndexError, Result};

/// Ledger index stored in a SQLite database.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex").finish_non_exhaustive()
    }
}

impl SqliteIndex {
    /// Open or create the index database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record a block (ignored if already present).
    pub async fn insert_block(&self, number: u64, timestamp: u64) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_block(&conn, number, timestamp)
    }

    /// Append a decoded event.
    pub async fn insert_event(&self, record: &EventRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.event)?;
        let block_number = to_sql(record.block_number, "block number")?;
        let timestamp = to_sql(record.timestamp, "timestamp")?;
        let conn = self.conn.lock().await;
        insert_block(&conn, record.block_number, record.timestamp)?;
        conn.execute(
            "INSERT INTO events (contract, name, block_number, timestamp, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.event.contract().as_str(),
                record.event.name(),
                block_number,
                timestamp,
                payload,
            ],
        )?;
        Ok(())
    }

    /// Append a transaction (ignored if its hash is already present).
    pub async fn insert_transaction(&self, record: &TxRecord) -> Result<()> {
        let block_number = to_sql(record.block_number, "block number")?;
        let timestamp = to_sql(record.timestamp, "timestamp")?;
        let conn = self.conn.lock().await;
        insert_block(&conn, record.block_number, record.timestamp)?;
        conn.execute(
            "INSERT OR IGNORE INTO transactions
                (hash, contract, function_name, input, from_address, to_address,
                 block_number, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.hash.as_slice(),
                record.contract.as_str(),
                record.function_name,
                record.input,
                record.from.as_slice(),
                record.to.as_slice(),
                block_number,
                record.status,
                timestamp,
            ],
        )?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

fn insert_block(conn: &Connection, number: u64, timestamp: u64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO blocks (number, timestamp) VALUES (?1, ?2)",
        params![to_sql(number, "block number")?, to_sql(timestamp, "timestamp")?],
    )?;
    Ok(())
}

fn to_sql(value: u64, field: &'static str) -> Result<i64> {
    i64::try_from(value).map_err(|_| IndexError::OutOfRange { field, value })
}

fn from_sql(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| IndexError::Serialization(format!("negative {field} {value} in index")))
}

/// Inclusive upper bound; anything past `i64::MAX` is unbounded.
fn end_bound(end: Option<u64>) -> i64 {
    end.map_or(i64::MAX, |e| i64::try_from(e).unwrap_or(i64::MAX))
}

fn parse_contract(name: &str) -> Result<ContractName> {
    name.parse()
        .map_err(|e: ftso_types::TypesError| IndexError::Serialization(e.to_string()))
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        IndexError::Serialization(format!("{what}: expected {N} bytes, got {}", bytes.len()))
    })
}

type TxRow = (Vec<u8>, String, String, Vec<u8>, Vec<u8>, Vec<u8>, i64, bool, i64);

fn tx_from_row(row: TxRow) -> Result<TxRecord> {
    let (hash, contract, function_name, input, from, to, block_number, status, timestamp) = row;
    Ok(TxRecord {
        hash: B256::from(fixed::<32>(&hash, "hash")?),
        contract: parse_contract(&contract)?,
        function_name,
        input,
        from: Address::from(fixed::<20>(&from, "from")?),
        to: Address::from(fixed::<20>(&to, "to")?),
        block_number: from_sql(block_number, "block number")?,
        status,
        timestamp: from_sql(timestamp, "timestamp")?,
    })
}

#[async_trait]
impl IndexReader for SqliteIndex {
    async fn query_events(
        &self,
        contract: ContractName,
        event_name: &str,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<EventRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT block_number, timestamp, payload FROM events
             WHERE contract = ?1 AND name = ?2 AND timestamp >= ?3 AND timestamp <= ?4
             ORDER BY block_number, id",
        )?;
        let rows = stmt
            .query_map(
                params![contract.as_str(), event_name, to_sql(start, "start")?, end_bound(end)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(block_number, timestamp, payload)| {
                let event: LedgerEvent = serde_json::from_str(&payload)?;
                Ok(EventRecord {
                    block_number: from_sql(block_number, "block number")?,
                    timestamp: from_sql(timestamp, "timestamp")?,
                    event,
                })
            })
            .collect()
    }

    async fn query_transactions(
        &self,
        contract: ContractName,
        function_name: &str,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<TxRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT hash, contract, function_name, input, from_address, to_address,
                    block_number, status, timestamp
             FROM transactions
             WHERE contract = ?1 AND function_name = ?2 AND timestamp >= ?3 AND timestamp <= ?4
             ORDER BY block_number, id",
        )?;
        let rows = stmt
            .query_map(
                params![contract.as_str(), function_name, to_sql(start, "start")?, end_bound(end)],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<TxRow>, _>>()?;

        rows.into_iter().map(tx_from_row).collect()
    }

    async fn indexed_range(&self) -> Result<Option<IndexedRange>> {
        let conn = self.conn.lock().await;
        let first: Option<i64> = conn
            .query_row(
                "SELECT timestamp FROM blocks ORDER BY number ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let last: Option<(i64, i64)> = conn
            .query_row(
                "SELECT number, timestamp FROM blocks ORDER BY number DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match (first, last) {
            (Some(first), Some((number, last))) => Some(IndexedRange {
                first_timestamp: from_sql(first, "timestamp")?,
                last_timestamp: from_sql(last, "timestamp")?,
                last_block: from_sql(number, "block number")?,
            }),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use ftso_types::voting::CommunityOffer;
    use ftso_types::{Feed, FeedId};

    use super::*;

    fn tx(block: u64, ts: u64, function: &str) -> TxRecord {
        TxRecord {
            hash: B256::repeat_byte(block as u8),
            contract: ContractName::Submission,
            function_name: function.to_string(),
            input: vec![0xde, 0xad],
            from: Address::repeat_byte(3),
            to: Address::repeat_byte(4),
            block_number: block,
            status: true,
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn test_transactions_roundtrip_through_sqlite() {
        let index = SqliteIndex::open_memory().expect("open");
        index.insert_transaction(&tx(1, 100, "commit")).await.expect("insert");
        index.insert_transaction(&tx(2, 110, "reveal")).await.expect("insert");
        index.insert_transaction(&tx(3, 120, "commit")).await.expect("insert");
        // duplicate hash ignored
        index.insert_transaction(&tx(3, 120, "commit")).await.expect("insert");

        let commits = index
            .query_transactions(ContractName::Submission, "commit", 0, None)
            .await
            .expect("query");
        assert_eq!(commits, vec![tx(1, 100, "commit"), tx(3, 120, "commit")]);

        let bounded = index
            .query_transactions(ContractName::Submission, "commit", 101, Some(120))
            .await
            .expect("query");
        assert_eq!(bounded.len(), 1);
    }

    #[tokio::test]
    async fn test_events_roundtrip_through_sqlite() {
        let index = SqliteIndex::open_memory().expect("open");
        let record = EventRecord {
            block_number: 7,
            timestamp: 70,
            event: LedgerEvent::RewardsOffered(CommunityOffer {
                reward_epoch_id: 2,
                feed: Feed::new(FeedId::from_name(1, "SOL/USD"), 3),
                amount: 500,
                offerer: Address::repeat_byte(8),
            }),
        };
        index.insert_event(&record).await.expect("insert");

        let found = index
            .query_events(ContractName::RewardOffers, "RewardsOffered", 70, Some(70))
            .await
            .expect("query");
        assert_eq!(found, vec![record]);
    }

    #[tokio::test]
    async fn test_indexed_range() {
        let index = SqliteIndex::open_memory().expect("open");
        assert!(index.indexed_range().await.expect("range").is_none());
        index.insert_block(10, 1_000).await.expect("block");
        index.insert_block(12, 1_024).await.expect("block");
        let range = index.indexed_range().await.expect("range").expect("some");
        assert_eq!(
            range,
            IndexedRange {
                first_timestamp: 1_000,
                last_timestamp: 1_024,
                last_block: 12,
            }
        );
    }

    #[tokio::test]
    async fn test_values_beyond_sqlite_range_rejected() {
        let index = SqliteIndex::open_memory().expect("open");
        assert!(matches!(
            index.insert_block(u64::MAX, 1_000).await,
            Err(IndexError::OutOfRange { field: "block number", value: u64::MAX })
        ));
        assert!(matches!(
            index.insert_transaction(&tx(1, u64::MAX, "commit")).await,
            Err(IndexError::OutOfRange { field: "timestamp", .. })
        ));
        assert!(index.indexed_range().await.expect("range").is_none());

        index.insert_transaction(&tx(2, 200, "commit")).await.expect("insert");
        assert!(matches!(
            index
                .query_transactions(ContractName::Submission, "commit", u64::MAX, None)
                .await,
            Err(IndexError::OutOfRange { field: "start", .. })
        ));
        // an end past i64::MAX is unbounded
        let open_ended = index
            .query_transactions(ContractName::Submission, "commit", 0, Some(u64::MAX))
            .await
            .expect("query");
        assert_eq!(open_ended.len(), 1);
    }
}
