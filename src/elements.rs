use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::crypto::{keccak_hex, owner_from_public_key};
use crate::errors::{LedgerError, LedgerResult};
use crate::semaphore::Semaphore;
use crate::sequence::SequenceStore;
use crate::storage::{COLLECTION_ELEMENTS, Store};
use crate::transfers::TransferService;
use crate::types::{
    Element, ElementCreateRequest, ElementGetRequest, ElementMetadataRequest, ElementStatus,
    OperationStatus, Outcome,
};

pub const SEMAPHORE_ELEMENTS: &str = "elements";

pub struct ElementService {
    store: Arc<Store>,
    semaphore: Arc<Semaphore>,
    sequences: Arc<SequenceStore>,
    transfers: Arc<TransferService>,
    clock: Clock,
}

impl ElementService {
    pub fn new(
        store: Arc<Store>,
        semaphore: Arc<Semaphore>,
        sequences: Arc<SequenceStore>,
        transfers: Arc<TransferService>,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            semaphore,
            sequences,
            transfers,
            clock,
        }
    }

    pub fn get(&self, request: &ElementGetRequest) -> LedgerResult<Outcome> {
        Ok(
            match self
                .store
                .get_doc::<Element>(COLLECTION_ELEMENTS, &request.id)?
            {
                Some(element) => Outcome::ok(element),
                None => Outcome::status(OperationStatus::NotFound),
            },
        )
    }

    /// Creates a new element chained under the shared `elements` sequence.
    pub fn create(&self, request: &ElementCreateRequest) -> LedgerResult<Outcome> {
        if let Err(message) = request.validate() {
            return Ok(Outcome::message(OperationStatus::Error, message));
        }
        if self.store.hash_exists(COLLECTION_ELEMENTS, &request.hash)? {
            return Ok(Outcome::message(OperationStatus::Exists, "Element exists"));
        }
        let owner = match owner_from_public_key(&request.public_key) {
            Ok(owner) => owner,
            Err(err) => return Ok(Outcome::message(OperationStatus::Error, err.to_string())),
        };

        let mut element = Element {
            id: String::new(),
            previous_id: None,
            owner,
            symbol: request.symbol.clone(),
            element_type: request.element_type,
            decimals: request.decimals,
            initial_supply: request.initial_supply,
            tfo: request.tfo.clone(),
            hash: request.hash.clone(),
            public_key: request.public_key.clone(),
            signature: request.signature.clone(),
            timestamp: self.clock.now_ms(),
            privacy: false,
            status: ElementStatus::Pending,
            policy: None,
            metadata: None,
            monitored_networks: None,
            version: 1,
        };

        self.semaphore.execute(SEMAPHORE_ELEMENTS, || -> LedgerResult<()> {
            self.chain_and_save(&mut element)
        })??;
        info!(element = %element.id, symbol = %element.symbol, "element created");

        let stored = self
            .store
            .get_doc::<Element>(COLLECTION_ELEMENTS, &element.id)?
            .ok_or_else(|| LedgerError::Internal(format!("created element missing: {}", element.id)))?;
        Ok(Outcome::ok(stored))
    }

    /// Assigns the chained id and persists. Callers must hold the
    /// `elements` semaphore.
    pub fn chain_and_save(&self, element: &mut Element) -> LedgerResult<()> {
        let sequence = self.sequences.get(SEMAPHORE_ELEMENTS)?;
        element.previous_id = sequence.data;
        element.id = keccak_hex(&format!(
            "{}{}{}",
            element.previous_id.clone().unwrap_or_default(),
            element.hash,
            element.timestamp
        ));
        self.store
            .put_doc_with_hash(COLLECTION_ELEMENTS, &element.id, &element.hash, element)?;
        self.sequences.inc(SEMAPHORE_ELEMENTS, Some(&element.id))
    }

    /// Patches element metadata. `None` fields stay, empty strings unset,
    /// other values overwrite. Once metadata exists, the update is gated on
    /// a fee transfer supplied with the request.
    pub fn set_metadata(&self, request: &ElementMetadataRequest) -> LedgerResult<Outcome> {
        let element = self
            .store
            .get_doc::<Element>(COLLECTION_ELEMENTS, &request.id)?;

        if let Err(message) = request.validate() {
            return Ok(Outcome::message(OperationStatus::Error, message));
        }
        let owner = match owner_from_public_key(&request.public_key) {
            Ok(owner) => owner,
            Err(err) => return Ok(Outcome::message(OperationStatus::Error, err.to_string())),
        };
        let Some(element) = element else {
            return Ok(Outcome::status(OperationStatus::NotFound));
        };
        if element.owner != owner {
            return Ok(Outcome::status(OperationStatus::Forbidden));
        }

        if element.metadata.is_some() {
            let Some(fee) = &request.transaction else {
                return Ok(Outcome::message(
                    OperationStatus::Error,
                    "metadata update requires a fee transaction",
                ));
            };
            let element_id = element.id.clone();
            let fee_outcome = self.transfers.create(
                fee,
                Some(&|tx| {
                    tx.metadata = Some(BTreeMap::from([
                        ("element".to_string(), element_id.clone()),
                        ("action".to_string(), "UPDATE".to_string()),
                        ("child".to_string(), "metadata".to_string()),
                    ]));
                }),
            )?;
            if !fee_outcome.is_ok() {
                return Ok(fee_outcome);
            }
        }

        let patches = [
            ("name", request.name.as_deref()),
            ("about", request.about.as_deref()),
            ("logo", request.logo.as_deref()),
            ("site", request.site.as_deref()),
            ("policy", request.policy.as_deref()),
        ];
        self.store
            .modify_doc::<Element, _>(COLLECTION_ELEMENTS, &request.id, |element| {
                let metadata = element.metadata.get_or_insert_with(BTreeMap::new);
                for (field, value) in patches {
                    match value {
                        None => {}
                        Some("") => {
                            metadata.remove(field);
                        }
                        Some(value) => {
                            metadata.insert(field.to_string(), value.to_string());
                        }
                    }
                }
                if metadata.is_empty() {
                    element.metadata = None;
                }
            })?;

        let updated = self
            .store
            .get_doc::<Element>(COLLECTION_ELEMENTS, &request.id)?
            .ok_or_else(|| LedgerError::Internal(format!("patched element missing: {}", request.id)))?;
        Ok(Outcome::ok(updated))
    }
}
