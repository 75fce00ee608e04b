use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::LedgerResult;
use crate::storage::{COLLECTION_SEQUENCES, Store};

/// Named monotonic counter with an auxiliary `data` slot.
///
/// The `data` field holds the id of the last record appended to the stream,
/// which becomes the `previous_id` of the next one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub id: String,
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

pub struct SequenceStore {
    store: Arc<Store>,
}

impl SequenceStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Returns the sequence, creating `{sequence: 0}` when absent.
    pub fn get(&self, id: &str) -> LedgerResult<Sequence> {
        self.store
            .get_or_insert_doc(COLLECTION_SEQUENCES, id, || Sequence {
                id: id.to_string(),
                sequence: 0,
                data: None,
            })
    }

    /// True when the sequence has never been initialized; bootstrap keys on
    /// this without creating the document.
    pub fn is_absent(&self, id: &str) -> LedgerResult<bool> {
        Ok(self
            .store
            .get_doc::<Sequence>(COLLECTION_SEQUENCES, id)?
            .is_none())
    }

    /// Sets the provided fields. A `Some("")` data value unsets the slot;
    /// `None` leaves it untouched.
    pub fn set(&self, id: &str, sequence: Option<u64>, data: Option<&str>) -> LedgerResult<()> {
        self.update(id, sequence, data, false)
    }

    /// Atomically increments the counter, optionally updating `data`.
    pub fn inc(&self, id: &str, data: Option<&str>) -> LedgerResult<()> {
        self.update(id, None, data, true)
    }

    fn update(
        &self,
        id: &str,
        sequence: Option<u64>,
        data: Option<&str>,
        increment: bool,
    ) -> LedgerResult<()> {
        let updated = self
            .store
            .modify_doc::<Sequence, _>(COLLECTION_SEQUENCES, id, |doc| {
                if increment {
                    doc.sequence += 1;
                } else if let Some(sequence) = sequence {
                    doc.sequence = sequence;
                }
                match data {
                    Some("") => doc.data = None,
                    Some(value) => doc.data = Some(value.to_string()),
                    None => {}
                }
            })?;
        if !updated {
            warn!(id, "failed to update dynamic sequence");
        }
        Ok(())
    }
}
