//! Transfer creation against the ledger buckets.
//!
//! A transfer validates itself, is chained to the element's transaction
//! sequence under nested semaphores (sender balance, then element sequence),
//! moves both balances, and finally lands in the current block. Lock order
//! is fixed: the receiver balance is only taken after the sender lock is
//! released, and the blockchain lock only after the per-transaction work.

use std::sync::Arc;

use tracing::info;

use crate::amount::Amount;
use crate::balance::BalanceStore;
use crate::blocks::BlockService;
use crate::clock::Clock;
use crate::crypto::{keccak_hex, owner_from_public_key};
use crate::errors::{LedgerError, LedgerResult};
use crate::semaphore::Semaphore;
use crate::sequence::SequenceStore;
use crate::storage::{COLLECTION_ELEMENTS, LEDGER_PREFIX, Store};
use crate::types::{
    Element, OperationStatus, Outcome, Transaction, TransactionCreateRequest, TransactionGetRequest,
    TransactionType,
};

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1_000;

/// Week index since the Unix epoch; transactions shard into one ledger
/// bucket per week.
pub fn week_shard(timestamp_ms: i64) -> i64 {
    timestamp_ms / WEEK_MS
}

pub fn ledger_name(shard: i64) -> String {
    format!("{LEDGER_PREFIX}{shard}")
}

/// Caller-supplied hook to attach side data to the draft before it commits.
pub type TransactionMutator<'a> = &'a dyn Fn(&mut Transaction);

pub struct TransferService {
    store: Arc<Store>,
    semaphore: Arc<Semaphore>,
    sequences: Arc<SequenceStore>,
    balances: Arc<BalanceStore>,
    blocks: Arc<BlockService>,
    clock: Clock,
    network_tax: Amount,
    deduct_total_from_sender: bool,
}

impl TransferService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        semaphore: Arc<Semaphore>,
        sequences: Arc<SequenceStore>,
        balances: Arc<BalanceStore>,
        blocks: Arc<BlockService>,
        clock: Clock,
        network_tax: Amount,
        deduct_total_from_sender: bool,
    ) -> Self {
        Self {
            store,
            semaphore,
            sequences,
            balances,
            blocks,
            clock,
            network_tax,
            deduct_total_from_sender,
        }
    }

    pub fn get(&self, request: &TransactionGetRequest) -> LedgerResult<Outcome> {
        let found = match &request.ledger {
            Some(ledger) => self.store.get_transaction(ledger, &request.id)?,
            None => self.store.find_transaction(&request.id)?,
        };
        Ok(match found {
            Some(tx) => Outcome::ok(tx),
            None => Outcome::status(OperationStatus::NotFound),
        })
    }

    pub fn create(
        &self,
        request: &TransactionCreateRequest,
        mutator: Option<TransactionMutator<'_>>,
    ) -> LedgerResult<Outcome> {
        if let Err(message) = request.validate() {
            return Ok(Outcome::message(OperationStatus::Error, message));
        }

        let Some(element) = self
            .store
            .get_doc::<Element>(COLLECTION_ELEMENTS, &request.element)?
        else {
            return Ok(Outcome::message(OperationStatus::Error, "Element not found"));
        };

        let owner = match owner_from_public_key(&request.public_key) {
            Ok(owner) => owner,
            Err(err) => return Ok(Outcome::message(OperationStatus::Error, err.to_string())),
        };
        let volume = match request.volume_abs() {
            Ok(volume) => volume,
            Err(message) => return Ok(Outcome::message(OperationStatus::Error, message)),
        };

        let timestamp = self.clock.now_ms();
        let shard = week_shard(timestamp);
        let mut tx = Transaction {
            id: String::new(),
            previous_id: None,
            transaction_type: TransactionType::Transfer,
            from: owner,
            to: request.to.clone(),
            element: request.element.clone(),
            volume,
            nonce: request.nonce,
            hash: request.hash.clone(),
            public_key: request.public_key.clone(),
            signature: request.signature.clone(),
            timestamp,
            shard,
            ledger: ledger_name(shard),
            block: None,
            confirmed: false,
            privacy: element.privacy,
            version: 1,
            element_tax: Amount::zero(),
            network_tax: Amount::zero(),
            total_tax: Amount::zero(),
            total: Amount::zero(),
            link: None,
            metadata: None,
        };

        // Idempotent replay: the same signed payload commits once.
        if self.store.transaction_hash_exists(&tx.ledger, &tx.hash)? {
            return Ok(Outcome::status(OperationStatus::Exists));
        }

        self.compute_tax(&mut tx, &element);
        if let Some(mutate) = mutator {
            mutate(&mut tx);
        }

        let sender_lock = BalanceStore::build_id(&tx.from, &tx.element);
        let receiver_lock = BalanceStore::build_id(&tx.to, &tx.element);

        let sender_outcome = self.semaphore.execute(&sender_lock, || {
            self.debit_sender_and_chain(&mut tx)
        })??;
        if !sender_outcome.is_ok() {
            return Ok(sender_outcome);
        }

        self.semaphore.execute(&receiver_lock, || -> LedgerResult<()> {
            let mut balance = self.balances.get(&tx.to, &tx.element)?;
            let credited = &balance.amount + &tx.volume;
            self.balances.set(&mut balance, credited)
        })??;

        let block_number = self.blocks.add_transaction_to_block(&tx)?;
        self.store.modify_transaction(&tx.ledger, &tx.id, |doc| {
            doc.confirmed = true;
            doc.block = Some(block_number);
        })?;
        info!(tx = %tx.id, block = block_number, "transfer committed");

        let committed = self
            .store
            .get_transaction(&tx.ledger, &tx.id)?
            .ok_or_else(|| LedgerError::Internal(format!("committed transaction missing: {}", tx.id)))?;
        Ok(Outcome::ok(committed))
    }

    /// Sender-lock section: balance check, chained append into the ledger
    /// bucket under the element-sequence lock, then the debit.
    fn debit_sender_and_chain(&self, tx: &mut Transaction) -> LedgerResult<Outcome> {
        let mut balance = self.balances.get(&tx.from, &tx.element)?;
        if balance.amount < tx.total {
            return Ok(Outcome::message(
                OperationStatus::InsufficientBalance,
                format!("Your need {}", tx.total),
            ));
        }

        let element_id = tx.element.clone();
        self.semaphore.execute(&element_id, || -> LedgerResult<()> {
            let sequence = self.sequences.get(&tx.element)?;
            tx.previous_id = sequence.data;
            tx.id = keccak_hex(&format!(
                "{}{}",
                tx.previous_id.clone().unwrap_or_default(),
                tx.hash
            ));
            self.store.put_transaction(tx)?;
            self.sequences.set(&tx.element, None, Some(&tx.id))
        })??;

        if tx.id.is_empty() {
            return Ok(Outcome::message(OperationStatus::Error, "Transaction not confirmed."));
        }

        let debit = if self.deduct_total_from_sender {
            tx.total.clone()
        } else {
            tx.volume.clone()
        };
        let remaining = balance
            .amount
            .checked_sub(&debit)
            .ok_or_else(|| LedgerError::Internal("balance underflow on debit".to_string()))?;
        self.balances.set(&mut balance, remaining)?;
        Ok(Outcome::ok(&*tx))
    }

    /// CAPTURE, REWARD and zero-volume transfers carry no tax; everything
    /// else pays the element rate plus the network rate, both expressed in
    /// percent and rounded half-up at the element's decimals.
    fn compute_tax(&self, tx: &mut Transaction, element: &Element) {
        if matches!(
            tx.transaction_type,
            TransactionType::Capture | TransactionType::Reward
        ) || tx.volume.is_zero()
        {
            tx.element_tax = Amount::zero();
            tx.network_tax = Amount::zero();
            tx.total_tax = Amount::zero();
            tx.total = tx.volume.clone();
            return;
        }

        let divisor = Amount::from_u64(100);
        let element_rate = element
            .policy
            .as_ref()
            .and_then(|policy| policy.transaction_tax.as_ref())
            .map(|tax| tax.div_half_up(&divisor, element.decimals))
            .unwrap_or_else(Amount::zero);
        let network_rate = self.network_tax.div_half_up(&divisor, element.decimals);

        tx.element_tax = &tx.volume * &element_rate;
        tx.network_tax = &tx.volume * &network_rate;
        tx.total_tax = &tx.element_tax + &tx.network_tax;
        tx.total = &tx.volume + &tx.total_tax;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_split_on_week_boundaries() {
        assert_eq!(week_shard(0), 0);
        assert_eq!(week_shard(WEEK_MS - 1), 0);
        assert_eq!(week_shard(WEEK_MS), 1);
        assert_eq!(ledger_name(week_shard(WEEK_MS * 2810)), "ledger_2810");
    }
}
