use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Coin,
    Proxy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementStatus {
    Pending,
    Enabled,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Network {
    Ethereum,
    Bitcoin,
    Solana,
}

/// Governance rules attached to an element.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_mint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_burn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_pause: Option<bool>,
    /// Transfer tax in percent, applied on top of the network tax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_tax: Option<Amount>,
    /// Minimum holding period in hours before received assets move again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// A ledgered asset or proxy. Insert-only; the id chains to the previous
/// element through the shared `elements` sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<String>,
    pub owner: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub decimals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_supply: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfo: Option<String>,
    pub hash: String,
    pub public_key: String,
    pub signature: String,
    pub timestamp: i64,
    pub privacy: bool,
    pub status: ElementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<ElementPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitored_networks: Option<BTreeMap<String, Network>>,
    pub version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_serializes_with_wire_names() {
        let element = Element {
            id: "e1".into(),
            previous_id: None,
            owner: "o1".into(),
            symbol: "NSH".into(),
            element_type: ElementType::Coin,
            decimals: 18,
            initial_supply: Some(45_000_000),
            tfo: None,
            hash: "h".into(),
            public_key: "pk".into(),
            signature: "sig".into(),
            timestamp: 1,
            privacy: false,
            status: ElementStatus::Enabled,
            policy: None,
            metadata: None,
            monitored_networks: None,
            version: 1,
        };
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "COIN");
        assert_eq!(json["status"], "ENABLED");
        assert_eq!(json["initialSupply"], 45_000_000);
        assert!(json.get("previousId").is_none());
    }

    #[test]
    fn policy_tax_round_trips_as_decimal_string() {
        let policy = ElementPolicy {
            transaction_tax: Some(Amount::parse("2.5").unwrap()),
            ..ElementPolicy::default()
        };
        let json = serde_json::to_string(&policy).unwrap();
        let back: ElementPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transaction_tax.unwrap().to_string(), "2.5");
    }
}
