//! Persistence for mint snapshots, scan checkpoints and scanned position events.
//!
//! Backed by SQLite through `sqlx`. The [`Database`] wrapper owns the pool and
//! hands out repositories.

mod error;
/// Repository implementations.
pub mod repositories;

pub use error::DataError;
pub use repositories::{
    Database, EventRecord, EventRepository, PositionSnapshotRecord, SnapshotRepository,
};
