//! Snapshot repository for mint snapshots and scan checkpoints.

use super::to_db_int;
use crate::DataError;
use clmm_yield_domain::entities::{MintSnapshot, PositionId};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Database record for a position's mint snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshotRecord {
    /// Position token id.
    pub token_id: i64,
    /// Block that minted the position.
    pub mint_block: i64,
    /// Unix timestamp of the mint block.
    pub mint_timestamp: i64,
    /// Token0 deposited at mint, as a decimal string.
    pub amount0: String,
    /// Token1 deposited at mint, as a decimal string.
    pub amount1: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub opening_tick: i32,
    /// Token1 per token0 at mint, as a decimal string.
    pub opening_price: String,
    pub decimals0: i64,
    pub decimals1: i64,
    /// USD value at mint when a price was known.
    pub opening_value_usd: Option<String>,
    /// Last block whose events are stored.
    pub last_scanned_block: i64,
    /// Record creation time, unix seconds.
    pub created_at: i64,
    /// Record update time, unix seconds.
    pub updated_at: i64,
}

impl PositionSnapshotRecord {
    /// Creates a PositionSnapshotRecord from a database row.
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            token_id: row.try_get("token_id")?,
            mint_block: row.try_get("mint_block")?,
            mint_timestamp: row.try_get("mint_timestamp")?,
            amount0: row.try_get("amount0")?,
            amount1: row.try_get("amount1")?,
            tick_lower: row.try_get("tick_lower")?,
            tick_upper: row.try_get("tick_upper")?,
            opening_tick: row.try_get("opening_tick")?,
            opening_price: row.try_get("opening_price")?,
            decimals0: row.try_get("decimals0")?,
            decimals1: row.try_get("decimals1")?,
            opening_value_usd: row.try_get("opening_value_usd")?,
            last_scanned_block: row.try_get("last_scanned_block")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Checkpoint as a block number.
    #[must_use]
    pub fn last_scanned_block(&self) -> u64 {
        u64::try_from(self.last_scanned_block).unwrap_or(0)
    }

    /// Rebuilds the domain snapshot.
    ///
    /// # Errors
    /// Returns an error when a stored decimal or integer is malformed.
    pub fn to_snapshot(&self) -> Result<MintSnapshot, DataError> {
        Ok(MintSnapshot {
            token_id: PositionId(
                u64::try_from(self.token_id).map_err(|_| DataError::OutOfRange("token_id"))?,
            ),
            mint_block: u64::try_from(self.mint_block)
                .map_err(|_| DataError::OutOfRange("mint_block"))?,
            mint_timestamp: u64::try_from(self.mint_timestamp)
                .map_err(|_| DataError::OutOfRange("mint_timestamp"))?,
            amount0: parse_decimal("amount0", &self.amount0)?,
            amount1: parse_decimal("amount1", &self.amount1)?,
            tick_lower: self.tick_lower,
            tick_upper: self.tick_upper,
            opening_tick: self.opening_tick,
            opening_price: parse_decimal("opening_price", &self.opening_price)?,
            decimals0: u8::try_from(self.decimals0)
                .map_err(|_| DataError::OutOfRange("decimals0"))?,
            decimals1: u8::try_from(self.decimals1)
                .map_err(|_| DataError::OutOfRange("decimals1"))?,
            opening_value_usd: self
                .opening_value_usd
                .as_deref()
                .map(|v| parse_decimal("opening_value_usd", v))
                .transpose()?,
        })
    }
}

fn parse_decimal(column: &'static str, value: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(value).map_err(|_| DataError::InvalidDecimal {
        column,
        value: value.to_string(),
    })
}

/// Repository for mint snapshots and scan checkpoints.
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: Arc<SqlitePool>,
}

impl SnapshotRepository {
    /// Creates a new SnapshotRepository.
    #[must_use]
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Finds the snapshot of a position.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find(
        &self,
        token_id: PositionId,
    ) -> Result<Option<PositionSnapshotRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM position_snapshots WHERE token_id = ?")
            .bind(to_db_int(token_id.0))
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(PositionSnapshotRecord::from_row).transpose()
    }

    /// Stores a snapshot unless one already exists for the position.
    ///
    /// Returns `true` when a row was written.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn insert(
        &self,
        snapshot: &MintSnapshot,
        last_scanned_block: u64,
    ) -> Result<bool, sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO position_snapshots (
                token_id, mint_block, mint_timestamp, amount0, amount1,
                tick_lower, tick_upper, opening_tick, opening_price,
                decimals0, decimals1, opening_value_usd, last_scanned_block,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_db_int(snapshot.token_id.0))
        .bind(to_db_int(snapshot.mint_block))
        .bind(to_db_int(snapshot.mint_timestamp))
        .bind(snapshot.amount0.to_string())
        .bind(snapshot.amount1.to_string())
        .bind(snapshot.tick_lower)
        .bind(snapshot.tick_upper)
        .bind(snapshot.opening_tick)
        .bind(snapshot.opening_price.to_string())
        .bind(i64::from(snapshot.decimals0))
        .bind(i64::from(snapshot.decimals1))
        .bind(snapshot.opening_value_usd.map(|v| v.to_string()))
        .bind(to_db_int(last_scanned_block))
        .bind(now)
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;
        let inserted = result.rows_affected() > 0;
        debug!(token_id = %snapshot.token_id, inserted, "Stored mint snapshot");
        Ok(inserted)
    }

    /// Moves the checkpoint forward. A block at or below the stored one is ignored.
    ///
    /// Returns `true` when the checkpoint moved.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn advance_checkpoint(
        &self,
        token_id: PositionId,
        block: u64,
    ) -> Result<bool, sqlx::Error> {
        let block = to_db_int(block);
        let result = sqlx::query(
            r#"
            UPDATE position_snapshots
            SET last_scanned_block = ?, updated_at = ?
            WHERE token_id = ? AND last_scanned_block < ?
            "#,
        )
        .bind(block)
        .bind(chrono::Utc::now().timestamp())
        .bind(to_db_int(token_id.0))
        .bind(block)
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sets the opening USD value of a snapshot stored without one. A value that is
    /// already set is never replaced.
    ///
    /// Returns `true` when the row changed.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn fill_opening_value(
        &self,
        token_id: PositionId,
        opening_value_usd: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE position_snapshots
            SET opening_value_usd = ?, updated_at = ?
            WHERE token_id = ? AND opening_value_usd IS NULL
            "#,
        )
        .bind(opening_value_usd.to_string())
        .bind(chrono::Utc::now().timestamp())
        .bind(to_db_int(token_id.0))
        .execute(self.pool.as_ref())
        .await?;
        let filled = result.rows_affected() > 0;
        debug!(token_id = %token_id, filled, "Filled opening value");
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use rust_decimal_macros::dec;

    fn snapshot(id: u64) -> MintSnapshot {
        MintSnapshot {
            token_id: PositionId(id),
            mint_block: 20_000_000,
            mint_timestamp: 1_720_000_000,
            amount0: dec!(1.5),
            amount1: dec!(3012.345678),
            tick_lower: -198_000,
            tick_upper: -194_000,
            opening_tick: -196_256,
            opening_price: dec!(2998.123456789012),
            decimals0: 18,
            decimals1: 6,
            opening_value_usd: Some(dec!(7509.53086)),
        }
    }

    async fn database() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = database().await;
        let repo = db.snapshots();
        assert!(repo.insert(&snapshot(42), 20_000_000).await.unwrap());

        let record = repo.find(PositionId(42)).await.unwrap().unwrap();
        let restored = record.to_snapshot().unwrap();
        assert_eq!(restored, snapshot(42));
        assert_eq!(record.last_scanned_block(), 20_000_000);
    }

    #[tokio::test]
    async fn test_insert_is_first_write_wins() {
        let db = database().await;
        let repo = db.snapshots();
        assert!(repo.insert(&snapshot(1), 10).await.unwrap());

        let mut other = snapshot(1);
        other.opening_value_usd = None;
        assert!(!repo.insert(&other, 99).await.unwrap());

        let record = repo.find(PositionId(1)).await.unwrap().unwrap();
        assert_eq!(record.last_scanned_block(), 10);
        assert!(record.opening_value_usd.is_some());
    }

    #[tokio::test]
    async fn test_opening_value_filled_only_when_missing() {
        let db = database().await;
        let repo = db.snapshots();
        let mut unpriced = snapshot(8);
        unpriced.opening_value_usd = None;
        repo.insert(&unpriced, 100).await.unwrap();

        assert!(repo.fill_opening_value(PositionId(8), dec!(1234.5)).await.unwrap());
        assert!(!repo.fill_opening_value(PositionId(8), dec!(99)).await.unwrap());

        let restored = repo.find(PositionId(8)).await.unwrap().unwrap().to_snapshot().unwrap();
        assert_eq!(restored.opening_value_usd, Some(dec!(1234.5)));
        assert_eq!(restored.amount0, unpriced.amount0);
    }

    #[tokio::test]
    async fn test_checkpoint_only_advances() {
        let db = database().await;
        let repo = db.snapshots();
        repo.insert(&snapshot(7), 100).await.unwrap();

        assert!(repo.advance_checkpoint(PositionId(7), 150).await.unwrap());
        assert!(!repo.advance_checkpoint(PositionId(7), 120).await.unwrap());
        assert!(!repo.advance_checkpoint(PositionId(7), 150).await.unwrap());

        let record = repo.find(PositionId(7)).await.unwrap().unwrap();
        assert_eq!(record.last_scanned_block(), 150);
    }

    #[tokio::test]
    async fn test_missing_snapshot() {
        let db = database().await;
        assert!(db.snapshots().find(PositionId(5)).await.unwrap().is_none());
        assert!(!db.snapshots().fill_opening_value(PositionId(5), dec!(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("positions.db").display());
        {
            let db = Database::connect(&url).await.unwrap();
            db.migrate().await.unwrap();
            db.snapshots().insert(&snapshot(3), 5).await.unwrap();
            db.pool().close().await;
        }
        let db = Database::connect(&url).await.unwrap();
        db.migrate().await.unwrap();
        let record = db.snapshots().find(PositionId(3)).await.unwrap().unwrap();
        assert_eq!(record.to_snapshot().unwrap().opening_value_usd, Some(dec!(7509.53086)));
    }

    #[test]
    fn test_malformed_decimal() {
        let record = PositionSnapshotRecord {
            token_id: 1,
            mint_block: 1,
            mint_timestamp: 1,
            amount0: "abc".to_string(),
            amount1: "1".to_string(),
            tick_lower: -10,
            tick_upper: 10,
            opening_tick: 0,
            opening_price: "1".to_string(),
            decimals0: 18,
            decimals1: 18,
            opening_value_usd: None,
            last_scanned_block: 1,
            created_at: 0,
            updated_at: 0,
        };
        assert!(matches!(
            record.to_snapshot(),
            Err(DataError::InvalidDecimal { column: "amount0", .. })
        ));
    }
}
