use serde::{Deserialize, Serialize};

use crate::errors::AuctionError;

/// Whether a bid must refund the outbid party inside the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundPolicy {
    /// The predicate ignores refunds; the transaction builder still adds one.
    #[default]
    OffChain,
    /// Output 1 of every bid must pay the previous locked amount to the previous bidder.
    OnChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Smallest accepted raise over the previous bid. 1 means strictly greater.
    pub min_increment: u64,
    pub refund_policy: RefundPolicy,
    /// Input index of the covenant in a close transaction; the asset takes the other of 0 and 1.
    pub covenant_input_index: usize,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self { min_increment: 1, refund_policy: RefundPolicy::OffChain, covenant_input_index: 1 }
    }
}

impl AuctionConfig {
    pub fn validate(&self) -> Result<(), AuctionError> {
        if self.min_increment == 0 {
            return Err(AuctionError::InvalidConfig("min_increment must be at least 1"));
        }
        if self.covenant_input_index > 1 {
            return Err(AuctionError::InvalidConfig("covenant_input_index must be 0 or 1"));
        }
        Ok(())
    }

    pub fn asset_input_index(&self) -> usize {
        1 - self.covenant_input_index.min(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_strictly_greater_with_asset_first() {
        let config = AuctionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_increment, 1);
        assert_eq!(config.asset_input_index(), 0);
        assert_eq!(config.covenant_input_index, 1);
    }

    #[test]
    fn rejects_zero_increment_and_out_of_range_index() {
        let config = AuctionConfig { min_increment: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(AuctionError::InvalidConfig(_))));

        let config = AuctionConfig { covenant_input_index: 2, ..Default::default() };
        assert!(matches!(config.validate(), Err(AuctionError::InvalidConfig(_))));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: AuctionConfig = serde_json::from_str(r#"{"refund_policy":"on_chain"}"#).expect("parse config");
        assert_eq!(config.refund_policy, RefundPolicy::OnChain);
        assert_eq!(config.min_increment, 1);

        let config: AuctionConfig = serde_json::from_str(r#"{"min_increment":50,"covenant_input_index":0}"#).expect("parse config");
        assert_eq!(config.min_increment, 50);
        assert_eq!(config.asset_input_index(), 1);
    }
}
