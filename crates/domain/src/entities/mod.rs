pub mod event;
pub mod pool;
pub mod position;
pub mod snapshot;
pub mod token;

// Re-export for easier access
pub use event::{ClaimedTotals, EventPayload, PositionEvent, PositionEventKind};
pub use pool::{PoolState, TickFeeGrowth};
pub use position::{Position, PositionId};
pub use snapshot::MintSnapshot;
pub use token::Token;
