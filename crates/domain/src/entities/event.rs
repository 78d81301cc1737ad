//! Historical position events recovered from chain logs.

use crate::entities::position::PositionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of position event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionEventKind {
    /// Liquidity added through the position manager.
    #[serde(rename = "Deposit")]
    Deposit,
    /// Liquidity removed through the position manager.
    #[serde(rename = "Withdrawal")]
    Withdrawal,
    /// Tokens collected from the position.
    #[serde(rename = "Fee Claim (Tokens)")]
    FeeClaimTokens,
    /// Farm reward transferred to the owner.
    #[serde(rename = "Fee Claim (Reward)")]
    FeeClaimReward,
    /// Position staked in the farm.
    #[serde(rename = "Deposit (Staked)")]
    StakedDeposit,
    /// Position unstaked from the farm.
    #[serde(rename = "Withdrawal (Unstaked)")]
    StakedWithdrawal,
}

impl PositionEventKind {
    /// Display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            PositionEventKind::Deposit => "Deposit",
            PositionEventKind::Withdrawal => "Withdrawal",
            PositionEventKind::FeeClaimTokens => "Fee Claim (Tokens)",
            PositionEventKind::FeeClaimReward => "Fee Claim (Reward)",
            PositionEventKind::StakedDeposit => "Deposit (Staked)",
            PositionEventKind::StakedWithdrawal => "Withdrawal (Unstaked)",
        }
    }

    /// Stable storage code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionEventKind::Deposit => "deposit",
            PositionEventKind::Withdrawal => "withdrawal",
            PositionEventKind::FeeClaimTokens => "fee_claim_tokens",
            PositionEventKind::FeeClaimReward => "fee_claim_reward",
            PositionEventKind::StakedDeposit => "staked_deposit",
            PositionEventKind::StakedWithdrawal => "staked_withdrawal",
        }
    }
}

impl fmt::Display for PositionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PositionEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(PositionEventKind::Deposit),
            "withdrawal" => Ok(PositionEventKind::Withdrawal),
            "fee_claim_tokens" => Ok(PositionEventKind::FeeClaimTokens),
            "fee_claim_reward" => Ok(PositionEventKind::FeeClaimReward),
            "staked_deposit" => Ok(PositionEventKind::StakedDeposit),
            "staked_withdrawal" => Ok(PositionEventKind::StakedWithdrawal),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Typed amounts carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Token amounts in token units.
    TokenAmounts {
        amount0: Decimal,
        amount1: Decimal,
    },
    /// Reward-token amount in token units.
    RewardAmount { amount: Decimal },
    /// Raw liquidity moved in or out of the farm.
    Liquidity { liquidity: u128 },
}

/// A single immutable event in a position's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    /// Position the event belongs to.
    pub token_id: PositionId,
    /// Event kind.
    pub kind: PositionEventKind,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// Block number.
    pub block_number: u64,
    /// Log index within the block.
    pub log_index: u64,
    /// Human-readable amount description.
    pub details: String,
    /// Typed amounts.
    pub payload: EventPayload,
}

/// Yield already claimed by the owner, summed from event history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimedTotals {
    /// Swap fees collected in token0 units.
    pub fees0: Decimal,
    /// Swap fees collected in token1 units.
    pub fees1: Decimal,
    /// Farm rewards received in reward-token units.
    pub reward: Decimal,
}

impl ClaimedTotals {
    /// Sums claimed yield from a position's events.
    ///
    /// Collected amounts include principal released by earlier withdrawals, so
    /// withdrawn amounts are subtracted from collected amounts per token and the
    /// result floored at zero.
    #[must_use]
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a PositionEvent>) -> Self {
        let mut collected = (Decimal::ZERO, Decimal::ZERO);
        let mut withdrawn = (Decimal::ZERO, Decimal::ZERO);
        let mut reward = Decimal::ZERO;

        for event in events {
            match (&event.kind, &event.payload) {
                (PositionEventKind::FeeClaimTokens, EventPayload::TokenAmounts { amount0, amount1 }) => {
                    collected.0 += *amount0;
                    collected.1 += *amount1;
                }
                (PositionEventKind::Withdrawal, EventPayload::TokenAmounts { amount0, amount1 }) => {
                    withdrawn.0 += *amount0;
                    withdrawn.1 += *amount1;
                }
                (PositionEventKind::FeeClaimReward, EventPayload::RewardAmount { amount }) => {
                    reward += *amount;
                }
                _ => {}
            }
        }

        Self {
            fees0: (collected.0 - withdrawn.0).max(Decimal::ZERO),
            fees1: (collected.1 - withdrawn.1).max(Decimal::ZERO),
            reward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(kind: PositionEventKind, payload: EventPayload) -> PositionEvent {
        PositionEvent {
            token_id: PositionId(1),
            kind,
            timestamp: 0,
            block_number: 0,
            log_index: 0,
            details: String::new(),
            payload,
        }
    }

    #[test]
    fn test_kind_storage_code_round_trips() {
        for kind in [
            PositionEventKind::Deposit,
            PositionEventKind::Withdrawal,
            PositionEventKind::FeeClaimTokens,
            PositionEventKind::FeeClaimReward,
            PositionEventKind::StakedDeposit,
            PositionEventKind::StakedWithdrawal,
        ] {
            assert_eq!(kind.as_str().parse::<PositionEventKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<PositionEventKind>().is_err());
    }

    #[test]
    fn test_claimed_totals_subtract_withdrawn_principal() {
        let events = vec![
            event(
                PositionEventKind::Withdrawal,
                EventPayload::TokenAmounts { amount0: dec!(1.0), amount1: dec!(2000) },
            ),
            event(
                PositionEventKind::FeeClaimTokens,
                EventPayload::TokenAmounts { amount0: dec!(1.01), amount1: dec!(2015) },
            ),
            event(
                PositionEventKind::FeeClaimReward,
                EventPayload::RewardAmount { amount: dec!(3.5) },
            ),
            event(
                PositionEventKind::StakedDeposit,
                EventPayload::Liquidity { liquidity: 42 },
            ),
        ];

        let totals = ClaimedTotals::from_events(&events);
        assert_eq!(totals.fees0, dec!(0.01));
        assert_eq!(totals.fees1, dec!(15));
        assert_eq!(totals.reward, dec!(3.5));
    }

    #[test]
    fn test_claimed_totals_floor_at_zero() {
        let events = vec![event(
            PositionEventKind::Withdrawal,
            EventPayload::TokenAmounts { amount0: dec!(1), amount1: dec!(1) },
        )];
        assert_eq!(ClaimedTotals::from_events(&events), ClaimedTotals::default());
    }
}
