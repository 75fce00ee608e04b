use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Reference to a transaction carried inside a block document.
///
/// `volume` is recorded only for privacy-flagged transfers, where the ledger
/// entry itself hides the moved amount.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTransactionRef {
    pub id: String,
    pub ledger: String,
    pub element: String,
    pub tax: Amount,
    pub privacy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Amount>,
}

/// One six-minute window of the block timeline.
///
/// Exactly one block exists per `number`; `height` is the monotonic ordinal
/// assigned from the `blockchain-block-id` sequence. Closing the predecessor
/// is a side effect of opening a new block.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<String>,
    pub number: i64,
    pub height: u64,
    pub closed: bool,
    pub mined: bool,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_release_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_end_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_fee: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonces: Option<Vec<u64>>,
    pub transactions: Vec<BlockTransactionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<String>,
}

impl Block {
    pub fn open(id: String, previous_id: Option<String>, number: i64, height: u64, timestamp: i64) -> Self {
        Self {
            id,
            previous_id,
            number,
            height,
            closed: false,
            mined: false,
            timestamp,
            close_timestamp: None,
            mining_release_timestamp: None,
            mining_end_timestamp: None,
            previous_block_hash: None,
            block_hash: None,
            merkle_root: None,
            difficulty: None,
            total_fee: None,
            nonces: None,
            transactions: Vec::new(),
            miner: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_block_starts_unclosed_and_empty() {
        let block = Block::open("b1".into(), None, 4_722_222, 0, 1_700_000_000_000);
        assert!(!block.closed);
        assert!(!block.mined);
        assert!(block.transactions.is_empty());
        assert!(block.merkle_root.is_none());
        let json = serde_json::to_value(&block).unwrap();
        assert!(json.get("closeTimestamp").is_none());
        assert_eq!(json["number"], 4_722_222);
    }
}
