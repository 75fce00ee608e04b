use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::crypto;
use crate::types::ElementType;

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

fn verify_signed_hash(public_key: &str, signature: &str, hash: &str) -> Result<(), String> {
    crypto::verify_hash(public_key, signature, hash).map_err(|err| err.to_string())
}

/// Transfer request from the bus. Self-validating: the signature must cover
/// the submitted hash and the volume must be positive.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCreateRequest {
    pub to: String,
    pub element: String,
    pub volume: String,
    pub nonce: u64,
    pub hash: String,
    pub public_key: String,
    pub signature: String,
}

impl TransactionCreateRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("to", &self.to)?;
        require("element", &self.element)?;
        require("hash", &self.hash)?;
        require("publicKey", &self.public_key)?;
        require("signature", &self.signature)?;
        let volume = Amount::parse_abs(&self.volume)?;
        if volume.is_zero() {
            return Err("volume must be positive".to_string());
        }
        verify_signed_hash(&self.public_key, &self.signature, &self.hash)
    }

    pub fn volume_abs(&self) -> Result<Amount, String> {
        Amount::parse_abs(&self.volume)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionGetRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCreateRequest {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub symbol: String,
    pub decimals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_supply: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfo: Option<String>,
    pub hash: String,
    pub public_key: String,
    pub signature: String,
}

impl ElementCreateRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("symbol", &self.symbol)?;
        require("hash", &self.hash)?;
        require("publicKey", &self.public_key)?;
        require("signature", &self.signature)?;
        if self.decimals > 36 {
            return Err("decimals out of range".to_string());
        }
        verify_signed_hash(&self.public_key, &self.signature, &self.hash)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementGetRequest {
    pub id: String,
}

/// Metadata patch. `None` leaves a field alone, an empty string unsets it,
/// anything else overwrites.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMetadataRequest {
    pub id: String,
    pub hash: String,
    pub public_key: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// Fee transfer required once the element already carries metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionCreateRequest>,
}

impl ElementMetadataRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("id", &self.id)?;
        require("hash", &self.hash)?;
        require("publicKey", &self.public_key)?;
        require("signature", &self.signature)?;
        verify_signed_hash(&self.public_key, &self.signature, &self.hash)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMineVerifyRequest {
    pub block_id: String,
    pub nonces: Vec<u64>,
    pub block_hash: String,
    pub miner: String,
}

impl BlockMineVerifyRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("blockId", &self.block_id)?;
        require("blockHash", &self.block_hash)?;
        require("miner", &self.miner)?;
        if self.nonces.is_empty() {
            return Err("nonces are required".to_string());
        }
        Ok(())
    }
}
