use std::fs;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use sha3::Keccak256;

use crate::errors::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeypair {
    pub public_key: String,
    pub secret_key: String,
}

pub fn keccak_bytes_hex(data: &[u8]) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest used for record ids and the Merkle root.
pub fn keccak_hex(data: &str) -> String {
    keccak_bytes_hex(data.as_bytes())
}

/// Digest used by the proof-of-work search.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accepts key material in hex or standard base64, as submitted by clients.
pub fn decode_key_material(data: &str) -> LedgerResult<Vec<u8>> {
    if let Ok(bytes) = hex::decode(data) {
        return Ok(bytes);
    }
    BASE64
        .decode(data)
        .map_err(|err| LedgerError::Crypto(format!("key material is neither hex nor base64: {err}")))
}

/// Ledger address of a key holder: keccak-256 over the raw public key bytes.
pub fn owner_from_public_key(material: &str) -> LedgerResult<String> {
    Ok(keccak_bytes_hex(&decode_key_material(material)?))
}

pub fn generate_keypair() -> Keypair {
    Keypair::generate(&mut OsRng)
}

pub fn load_or_generate_keypair(path: &Path) -> LedgerResult<Keypair> {
    if path.exists() {
        load_keypair(path)
    } else {
        let keypair = generate_keypair();
        save_keypair(path, &keypair)?;
        Ok(keypair)
    }
}

pub fn save_keypair(path: &Path, keypair: &Keypair) -> LedgerResult<()> {
    let stored = StoredKeypair {
        public_key: hex::encode(keypair.public.to_bytes()),
        secret_key: hex::encode(keypair.secret.to_bytes()),
    };
    let encoded = toml::to_string_pretty(&stored)
        .map_err(|err| LedgerError::Config(format!("failed to encode keypair: {err}")))?;
    fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
    fs::write(path, encoded)?;
    Ok(())
}

pub fn load_keypair(path: &Path) -> LedgerResult<Keypair> {
    let raw = fs::read_to_string(path)?;
    let stored: StoredKeypair = toml::from_str(&raw)
        .map_err(|err| LedgerError::Config(format!("failed to decode keypair: {err}")))?;
    keypair_from_hex(&stored.secret_key, &stored.public_key)
}

pub fn keypair_from_hex(secret_hex: &str, public_hex: &str) -> LedgerResult<Keypair> {
    let secret_bytes = hex::decode(secret_hex)
        .map_err(|err| LedgerError::Config(format!("invalid secret key encoding: {err}")))?;
    let public_bytes = hex::decode(public_hex)
        .map_err(|err| LedgerError::Config(format!("invalid public key encoding: {err}")))?;
    let secret = SecretKey::from_bytes(&secret_bytes)
        .map_err(|err| LedgerError::Config(format!("invalid secret key bytes: {err}")))?;
    let public = PublicKey::from_bytes(&public_bytes)
        .map_err(|err| LedgerError::Config(format!("invalid public key bytes: {err}")))?;
    Ok(Keypair { secret, public })
}

/// Signs a hex digest; the signature covers the decoded digest bytes.
pub fn sign_hash(keypair: &Keypair, hash_hex: &str) -> LedgerResult<String> {
    let digest = hex::decode(hash_hex)
        .map_err(|err| LedgerError::Crypto(format!("invalid hash encoding: {err}")))?;
    Ok(hex::encode(keypair.sign(&digest).to_bytes()))
}

/// Verifies a signature over a hex digest against base64-or-hex key material.
pub fn verify_hash(public_material: &str, signature_hex: &str, hash_hex: &str) -> LedgerResult<()> {
    let public_bytes = decode_key_material(public_material)?;
    let public = PublicKey::from_bytes(&public_bytes)
        .map_err(|err| LedgerError::Crypto(format!("invalid public key bytes: {err}")))?;
    let signature_bytes = hex::decode(signature_hex)
        .map_err(|err| LedgerError::Crypto(format!("invalid signature encoding: {err}")))?;
    let signature = Signature::from_bytes(&signature_bytes)
        .map_err(|err| LedgerError::Crypto(format!("invalid signature bytes: {err}")))?;
    let digest = hex::decode(hash_hex)
        .map_err(|err| LedgerError::Crypto(format!("invalid hash encoding: {err}")))?;
    public
        .verify(&digest, &signature)
        .map_err(|err| LedgerError::Crypto(format!("signature verification failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn deterministic_keypair() -> Keypair {
        let secret = SecretKey::from_bytes(&[7u8; 32]).expect("secret");
        let public = PublicKey::from(&secret);
        Keypair { secret, public }
    }

    #[test]
    fn keccak_digest_is_stable() {
        let digest = keccak_hex("norsh");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, keccak_hex("norsh"));
        assert_ne!(digest, keccak_hex("norsh "));
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn decodes_hex_and_base64_key_material() {
        let keypair = deterministic_keypair();
        let raw = keypair.public.to_bytes().to_vec();
        assert_eq!(decode_key_material(&hex::encode(&raw)).unwrap(), raw);
        assert_eq!(decode_key_material(&BASE64.encode(&raw)).unwrap(), raw);
        assert!(decode_key_material("not-a-key!").is_err());
    }

    #[test]
    fn owner_is_keccak_of_public_key_bytes() {
        let keypair = deterministic_keypair();
        let hex_material = hex::encode(keypair.public.to_bytes());
        let base64_material = BASE64.encode(keypair.public.to_bytes());
        assert_eq!(
            owner_from_public_key(&hex_material).unwrap(),
            owner_from_public_key(&base64_material).unwrap()
        );
    }

    #[test]
    fn sign_and_verify_hash_round_trip() {
        let keypair = deterministic_keypair();
        let hash = keccak_hex("payload");
        let signature = sign_hash(&keypair, &hash).unwrap();
        let public_material = hex::encode(keypair.public.to_bytes());
        verify_hash(&public_material, &signature, &hash).unwrap();
        assert!(verify_hash(&public_material, &signature, &keccak_hex("other")).is_err());
    }

    #[test]
    fn keypair_survives_disk_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys/node.toml");
        let generated = load_or_generate_keypair(&path).unwrap();
        let reloaded = load_or_generate_keypair(&path).unwrap();
        assert_eq!(generated.public.to_bytes(), reloaded.public.to_bytes());
    }
}
