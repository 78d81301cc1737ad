use serde::{Deserialize, Serialize};

/// Range status of a position relative to the pool's current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    #[serde(rename = "IN RANGE")]
    InRange,
    #[serde(rename = "OUT OF RANGE")]
    OutOfRange,
    #[serde(rename = "CLOSED")]
    Closed,
}

impl PositionStatus {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            PositionStatus::InRange => "IN RANGE",
            PositionStatus::OutOfRange => "OUT OF RANGE",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

/// Which side of the pair is used as the unit of value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSide {
    Token0,
    Token1,
}

impl QuoteSide {
    /// Picks token0 when it is one of the given stablecoins, token1 otherwise.
    #[must_use]
    pub fn select(token0: &str, stablecoins: &[String]) -> Self {
        if stablecoins
            .iter()
            .any(|s| s.eq_ignore_ascii_case(token0))
        {
            QuoteSide::Token0
        } else {
            QuoteSide::Token1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_side_prefers_stable_token0() {
        let stables = vec!["0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string()];
        assert_eq!(
            QuoteSide::select("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", &stables),
            QuoteSide::Token0
        );
        assert_eq!(
            QuoteSide::select("0x4200000000000000000000000000000000000006", &stables),
            QuoteSide::Token1
        );
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&PositionStatus::OutOfRange).unwrap();
        assert_eq!(json, "\"OUT OF RANGE\"");
        assert_eq!(PositionStatus::InRange.label(), "IN RANGE");
    }
}
