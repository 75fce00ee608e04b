//! One-time genesis of the element chain.
//!
//! Runs only while the `elements` sequence has never been initialized. Seeds
//! the NSH coin and the USDN-P proxy, signed with the configured genesis
//! keys and chained through the same sequence every later element uses.

use std::collections::BTreeMap;
use std::sync::Arc;

use ed25519_dalek::Keypair;
use tracing::info;

use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::crypto;
use crate::elements::{ElementService, SEMAPHORE_ELEMENTS};
use crate::errors::{LedgerError, LedgerResult};
use crate::semaphore::Semaphore;
use crate::sequence::SequenceStore;
use crate::types::{Element, ElementStatus, ElementType, Network};

pub const NSH_SYMBOL: &str = "NSH";
pub const NSH_DECIMALS: u32 = 18;
pub const NSH_INITIAL_SUPPLY: u64 = 45_000_000;

const USDN_PROXY_SYMBOL: &str = "USDN-P";
const USDN_PROXY_DECIMALS: u32 = 6;
const USDN_PROXY_NETWORK_ADDRESS: &str = "0x9E00eecbD1B387C01E7C8A449dF1FDbA0caa5B4e";

pub struct Bootstrap {
    config: WorkerConfig,
    sequences: Arc<SequenceStore>,
    semaphore: Arc<Semaphore>,
    elements: Arc<ElementService>,
    clock: Clock,
}

impl Bootstrap {
    pub fn new(
        config: WorkerConfig,
        sequences: Arc<SequenceStore>,
        semaphore: Arc<Semaphore>,
        elements: Arc<ElementService>,
        clock: Clock,
    ) -> Self {
        Self {
            config,
            sequences,
            semaphore,
            elements,
            clock,
        }
    }

    /// Seeds the genesis elements on first run; later runs are no-ops.
    pub fn run(&self) -> LedgerResult<()> {
        if !self.sequences.is_absent(SEMAPHORE_ELEMENTS)? {
            return Ok(());
        }

        let keypair = self.genesis_keypair()?;
        let public_key = hex::encode(keypair.public.to_bytes());
        let owner = crypto::owner_from_public_key(&public_key)?;

        let coin = self.build_signed_element(
            &keypair,
            &owner,
            &public_key,
            ElementType::Coin,
            NSH_SYMBOL,
            NSH_DECIMALS,
            Some(NSH_INITIAL_SUPPLY),
            self.config.genesis.nsh_tfo.clone(),
            BTreeMap::from([
                ("name".to_string(), "Norsh".to_string()),
                ("site".to_string(), "https://norsh.org".to_string()),
            ]),
            None,
        )?;

        let proxy = self.build_signed_element(
            &keypair,
            &owner,
            &public_key,
            ElementType::Proxy,
            USDN_PROXY_SYMBOL,
            USDN_PROXY_DECIMALS,
            None,
            None,
            BTreeMap::from([
                ("name".to_string(), "USD Norsh Proxy".to_string()),
                ("site".to_string(), "https://norsh.org".to_string()),
            ]),
            Some(BTreeMap::from([(
                USDN_PROXY_NETWORK_ADDRESS.to_string(),
                Network::Ethereum,
            )])),
        )?;

        for mut element in [coin, proxy] {
            self.semaphore
                .execute(SEMAPHORE_ELEMENTS, || self.elements.chain_and_save(&mut element))??;
            info!(element = %element.id, symbol = %element.symbol, "genesis element created");
        }
        Ok(())
    }

    fn genesis_keypair(&self) -> LedgerResult<Keypair> {
        match (&self.config.genesis.private_key, &self.config.genesis.public_key) {
            (Some(secret), Some(public)) => crypto::keypair_from_hex(secret, public),
            _ => crypto::load_or_generate_keypair(&self.config.key_path),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_signed_element(
        &self,
        keypair: &Keypair,
        owner: &str,
        public_key: &str,
        element_type: ElementType,
        symbol: &str,
        decimals: u32,
        initial_supply: Option<u64>,
        tfo: Option<String>,
        metadata: BTreeMap<String, String>,
        monitored_networks: Option<BTreeMap<String, Network>>,
    ) -> LedgerResult<Element> {
        let hash = crypto::sha256_hex(&format!(
            "{symbol}{decimals}{}{}{public_key}",
            initial_supply.map(|supply| supply.to_string()).unwrap_or_default(),
            tfo.clone().unwrap_or_default(),
        ));
        let signature = crypto::sign_hash(keypair, &hash)?;
        crypto::verify_hash(public_key, &signature, &hash).map_err(|_| {
            LedgerError::Crypto(
                "invalid signature: the provided signature does not match the computed hash".into(),
            )
        })?;

        Ok(Element {
            id: String::new(),
            previous_id: None,
            owner: owner.to_string(),
            symbol: symbol.to_string(),
            element_type,
            decimals,
            initial_supply,
            tfo,
            hash,
            public_key: public_key.to_string(),
            signature,
            timestamp: self.clock.now_ms(),
            privacy: false,
            status: ElementStatus::Enabled,
            policy: None,
            metadata: Some(metadata),
            monitored_networks,
            version: 1,
        })
    }
}
