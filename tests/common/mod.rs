use std::sync::Arc;

use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use tempfile::TempDir;

use norsh_chain::amount::Amount;
use norsh_chain::clock::Clock;
use norsh_chain::config::WorkerConfig;
use norsh_chain::crypto;
use norsh_chain::services::Services;
use norsh_chain::types::{
    Element, ElementCreateRequest, ElementType, Outcome, TransactionCreateRequest,
};

pub const START_MS: i64 = 1_700_000_000_000;

pub struct Harness {
    pub services: Arc<Services>,
    pub clock: Clock,
    pub config: WorkerConfig,
    _dir: TempDir,
}

pub fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let mut config = WorkerConfig::default();
    config.data_dir = dir.path().join("data");
    config.key_path = dir.path().join("keys/worker.toml");
    let clock = Clock::manual(START_MS);
    let services = Services::build(config.clone(), clock.clone()).expect("services");
    Harness {
        services,
        clock,
        config,
        _dir: dir,
    }
}

pub fn keypair(seed: u8) -> Keypair {
    let secret = SecretKey::from_bytes(&[seed; 32]).expect("secret");
    let public = PublicKey::from(&secret);
    Keypair { secret, public }
}

pub fn public_material(keypair: &Keypair) -> String {
    hex::encode(keypair.public.to_bytes())
}

pub fn owner_of(keypair: &Keypair) -> String {
    crypto::owner_from_public_key(&public_material(keypair)).expect("owner")
}

pub fn outcome_data<T: serde::de::DeserializeOwned>(outcome: &Outcome) -> T {
    serde_json::from_value(outcome.data.clone().expect("outcome data")).expect("decodable data")
}

pub fn create_element(harness: &Harness, keypair: &Keypair, symbol: &str) -> Element {
    let hash = crypto::keccak_hex(&format!("element:{symbol}"));
    let signature = crypto::sign_hash(keypair, &hash).expect("signature");
    let request = ElementCreateRequest {
        element_type: ElementType::Coin,
        symbol: symbol.to_string(),
        decimals: 18,
        initial_supply: Some(45_000_000),
        tfo: None,
        hash,
        public_key: public_material(keypair),
        signature,
    };
    let outcome = harness.services.elements.create(&request).expect("create element");
    assert!(outcome.is_ok(), "element creation failed: {outcome:?}");
    outcome_data(&outcome)
}

pub fn transfer_request(
    keypair: &Keypair,
    element: &str,
    to: &str,
    volume: &str,
    marker: &str,
) -> TransactionCreateRequest {
    let hash = crypto::keccak_hex(&format!("transfer:{marker}"));
    let signature = crypto::sign_hash(keypair, &hash).expect("signature");
    TransactionCreateRequest {
        to: to.to_string(),
        element: element.to_string(),
        volume: volume.to_string(),
        nonce: 1,
        hash,
        public_key: public_material(keypair),
        signature,
    }
}

pub fn seed_balance(harness: &Harness, owner: &str, element: &str, amount: &str) {
    let balances = &harness.services.balances;
    let mut balance = balances.get(owner, element).expect("balance");
    balances
        .set(&mut balance, Amount::parse(amount).expect("amount"))
        .expect("seed balance");
}

pub fn balance_of(harness: &Harness, owner: &str, element: &str) -> Amount {
    harness
        .services
        .balances
        .get(owner, element)
        .expect("balance")
        .amount
}
