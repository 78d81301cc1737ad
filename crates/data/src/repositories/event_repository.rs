//! Event repository for scanned position history.

use super::to_db_int;
use crate::DataError;
use clmm_yield_domain::entities::{PositionEvent, PositionEventKind, PositionId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

/// Database record for a position event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Auto-increment identifier.
    pub id: i64,
    pub token_id: i64,
    /// Storage code of the event kind.
    pub kind: String,
    pub timestamp: i64,
    pub block_number: i64,
    pub log_index: i64,
    /// Human-readable amounts.
    pub details: String,
    /// Typed payload as JSON.
    pub payload: String,
}

impl EventRecord {
    /// Creates an EventRecord from a database row.
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            token_id: row.try_get("token_id")?,
            kind: row.try_get("kind")?,
            timestamp: row.try_get("timestamp")?,
            block_number: row.try_get("block_number")?,
            log_index: row.try_get("log_index")?,
            details: row.try_get("details")?,
            payload: row.try_get("payload")?,
        })
    }

    /// Rebuilds the domain event.
    ///
    /// # Errors
    /// Returns an error for an unknown kind, a malformed payload or a negative integer.
    pub fn to_event(&self) -> Result<PositionEvent, DataError> {
        let kind: PositionEventKind = self.kind.parse().map_err(DataError::InvalidKind)?;
        Ok(PositionEvent {
            token_id: PositionId(
                u64::try_from(self.token_id).map_err(|_| DataError::OutOfRange("token_id"))?,
            ),
            kind,
            timestamp: u64::try_from(self.timestamp)
                .map_err(|_| DataError::OutOfRange("timestamp"))?,
            block_number: u64::try_from(self.block_number)
                .map_err(|_| DataError::OutOfRange("block_number"))?,
            log_index: u64::try_from(self.log_index)
                .map_err(|_| DataError::OutOfRange("log_index"))?,
            details: self.details.clone(),
            payload: serde_json::from_str(&self.payload)?,
        })
    }
}

/// Repository for scanned position events.
#[derive(Clone)]
pub struct EventRepository {
    pool: Arc<SqlitePool>,
}

impl EventRepository {
    /// Creates a new EventRepository.
    #[must_use]
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Stores events, ignoring logs that are already recorded.
    ///
    /// Returns the number of new rows.
    ///
    /// # Errors
    /// Returns an error if a query fails or a payload cannot be encoded.
    pub async fn insert_many(&self, events: &[PositionEvent]) -> Result<u64, DataError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for event in events {
            let payload = serde_json::to_string(&event.payload)?;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO position_events
                    (token_id, kind, timestamp, block_number, log_index, details, payload)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(to_db_int(event.token_id.0))
            .bind(event.kind.as_str())
            .bind(to_db_int(event.timestamp))
            .bind(to_db_int(event.block_number))
            .bind(to_db_int(event.log_index))
            .bind(&event.details)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        debug!(received = events.len(), inserted, "Stored position events");
        Ok(inserted)
    }

    /// Finds the events of a position in display order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_token(&self, token_id: PositionId) -> Result<Vec<EventRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM position_events
            WHERE token_id = ?
            ORDER BY timestamp ASC, block_number ASC, log_index ASC
            "#,
        )
        .bind(to_db_int(token_id.0))
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(EventRecord::from_row).collect()
    }

    /// Loads and decodes the events of a position.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn load(&self, token_id: PositionId) -> Result<Vec<PositionEvent>, DataError> {
        self.find_by_token(token_id)
            .await?
            .iter()
            .map(EventRecord::to_event)
            .collect()
    }

    /// Counts the stored events of a position.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count(&self, token_id: PositionId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM position_events WHERE token_id = ?")
            .bind(to_db_int(token_id.0))
            .fetch_one(self.pool.as_ref())
            .await?;
        row.try_get("n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use clmm_yield_domain::entities::EventPayload;
    use rust_decimal_macros::dec;

    fn event(kind: PositionEventKind, timestamp: u64, block: u64, log_index: u64) -> PositionEvent {
        PositionEvent {
            token_id: PositionId(9),
            kind,
            timestamp,
            block_number: block,
            log_index,
            details: "1.5 WETH / 3000 USDC".to_string(),
            payload: EventPayload::TokenAmounts {
                amount0: dec!(1.5),
                amount1: dec!(3000),
            },
        }
    }

    async fn database() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_inserts_are_idempotent() {
        let db = database().await;
        let repo = db.events();
        let events = vec![
            event(PositionEventKind::Deposit, 100, 10, 0),
            event(PositionEventKind::FeeClaimTokens, 200, 20, 3),
        ];
        assert_eq!(repo.insert_many(&events).await.unwrap(), 2);
        assert_eq!(repo.insert_many(&events).await.unwrap(), 0);
        assert_eq!(repo.count(PositionId(9)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_orders_by_timestamp() {
        let db = database().await;
        let repo = db.events();
        let mut reward = event(PositionEventKind::FeeClaimReward, 150, 15, 1);
        reward.payload = EventPayload::RewardAmount { amount: dec!(2.25) };
        reward.details = "2.25 CAKE".to_string();
        repo.insert_many(&[
            event(PositionEventKind::Withdrawal, 300, 30, 0),
            event(PositionEventKind::Deposit, 100, 10, 0),
            reward.clone(),
        ])
        .await
        .unwrap();

        let loaded = repo.load(PositionId(9)).await.unwrap();
        let timestamps: Vec<u64> = loaded.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![100, 150, 300]);
        assert_eq!(loaded[1], reward);
    }

    #[tokio::test]
    async fn test_other_positions_are_separate() {
        let db = database().await;
        let repo = db.events();
        let mut other = event(PositionEventKind::Deposit, 100, 10, 0);
        other.token_id = PositionId(10);
        repo.insert_many(&[event(PositionEventKind::Deposit, 100, 10, 0), other])
            .await
            .unwrap();
        assert_eq!(repo.count(PositionId(9)).await.unwrap(), 1);
        assert_eq!(repo.count(PositionId(10)).await.unwrap(), 1);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let record = EventRecord {
            id: 1,
            token_id: 9,
            kind: "swap".to_string(),
            timestamp: 1,
            block_number: 1,
            log_index: 0,
            details: String::new(),
            payload: "{}".to_string(),
        };
        assert!(matches!(record.to_event(), Err(DataError::InvalidKind(_))));
    }
}
