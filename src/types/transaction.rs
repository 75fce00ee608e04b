use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
    Capture,
    Reward,
    Internal,
}

/// A confirmed or in-flight transfer inside a weekly ledger bucket.
///
/// `id = keccak(previous_id ‖ hash)` where `previous_id` comes from the
/// element's dynamic sequence, chaining commits per element.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub from: String,
    pub to: String,
    pub element: String,
    pub volume: Amount,
    pub nonce: u64,
    pub hash: String,
    pub public_key: String,
    pub signature: String,
    pub timestamp: i64,
    pub shard: i64,
    pub ledger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<i64>,
    #[serde(default)]
    pub confirmed: bool,
    pub privacy: bool,
    pub version: u32,
    pub element_tax: Amount,
    pub network_tax: Amount,
    pub total_tax: Amount,
    pub total: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Balance of one owner in one element, keyed `owner_element`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub id: String,
    pub owner: String,
    pub element: String,
    pub amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_round_trips_through_json() {
        let tx = Transaction {
            id: "t1".into(),
            previous_id: Some("t0".into()),
            transaction_type: TransactionType::Transfer,
            from: "a".into(),
            to: "b".into(),
            element: "e".into(),
            volume: Amount::parse("100").unwrap(),
            nonce: 7,
            hash: "h".into(),
            public_key: "pk".into(),
            signature: "sig".into(),
            timestamp: 1_700_000_000_000,
            shard: 2810,
            ledger: "ledger_2810".into(),
            block: Some(4_722_222),
            confirmed: true,
            privacy: false,
            version: 1,
            element_tax: Amount::zero(),
            network_tax: Amount::parse("0.3").unwrap(),
            total_tax: Amount::parse("0.3").unwrap(),
            total: Amount::parse("100.3").unwrap(),
            link: None,
            metadata: None,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "TRANSFER");
        assert_eq!(json["volume"], "100");
        assert_eq!(json["total"], "100.3");
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.total, tx.total);
        assert!(back.confirmed);
    }
}
