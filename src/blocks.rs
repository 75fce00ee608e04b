//! Block timeline management.
//!
//! Blocks are six-minute wall-clock windows. Appending a transaction targets
//! the open block for the current window; when none exists the service mints
//! one (chained through the `blockchain-block-id` sequence) and closes the
//! predecessor as a side effect. Everything here runs inside the
//! `blockchain` semaphore.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::amount::Amount;
use crate::clock::Clock;
use crate::crypto::keccak_hex;
use crate::errors::{LedgerError, LedgerResult};
use crate::semaphore::Semaphore;
use crate::sequence::SequenceStore;
use crate::storage::Store;
use crate::types::{Block, BlockTransactionRef, Transaction};

pub const SEMAPHORE_BLOCKCHAIN: &str = "blockchain";
pub const SEQUENCE_BLOCK_ID: &str = "blockchain-block-id";
pub const BLOCK_WINDOW_MS: i64 = 6 * 60 * 1_000;

pub struct BlockService {
    store: Arc<Store>,
    sequences: Arc<SequenceStore>,
    semaphore: Arc<Semaphore>,
    clock: Clock,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    retry_budget_ms: u64,
}

impl BlockService {
    pub fn new(
        store: Arc<Store>,
        sequences: Arc<SequenceStore>,
        semaphore: Arc<Semaphore>,
        clock: Clock,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        retry_budget_ms: u64,
    ) -> Self {
        Self {
            store,
            sequences,
            semaphore,
            clock,
            initial_backoff_ms,
            max_backoff_ms,
            retry_budget_ms,
        }
    }

    /// Index of the six-minute window containing `now`.
    pub fn block_number(&self) -> i64 {
        self.clock.now_ms() / BLOCK_WINDOW_MS
    }

    /// Adds a persisted transaction to the current block and returns the
    /// block number. Retries with backoff until the append lands; the total
    /// wait is capped by the semaphore timeout.
    pub fn add_transaction_to_block(&self, tx: &Transaction) -> LedgerResult<i64> {
        let started = Instant::now();
        let mut attempt: u64 = 0;
        loop {
            let appended = self
                .semaphore
                .execute(SEMAPHORE_BLOCKCHAIN, || self.try_append(tx))??;
            if let Some(number) = appended {
                return Ok(number);
            }

            attempt += 1;
            if attempt > 1 {
                if started.elapsed() >= Duration::from_millis(self.retry_budget_ms) {
                    return Err(LedgerError::Internal(format!(
                        "block append retries exhausted for transaction {}",
                        tx.id
                    )));
                }
                let backoff = (self.initial_backoff_ms * (attempt - 1)).min(self.max_backoff_ms);
                thread::sleep(Duration::from_millis(backoff));
            }
        }
    }

    fn try_append(&self, tx: &Transaction) -> LedgerResult<Option<i64>> {
        let number = self.block_number();
        let entry = BlockTransactionRef {
            id: tx.id.clone(),
            ledger: tx.ledger.clone(),
            element: tx.element.clone(),
            tax: tx.total_tax.clone(),
            privacy: tx.privacy,
            volume: tx.privacy.then(|| tx.total.clone()),
        };

        if self.store.append_to_open_block(number, &entry)? {
            return Ok(Some(number));
        }

        // No open block for this window: mint one, closing the predecessor.
        // A block that exists but is already closed means the window rolled
        // over mid-append; the retry loop picks the new number up.
        if !self.store.block_number_exists(number)? {
            let sequence = self.sequences.get(SEQUENCE_BLOCK_ID)?;
            let previous_id = sequence.data.clone();
            let id = keccak_hex(&format!(
                "{}{}",
                previous_id.clone().unwrap_or_default(),
                number
            ));
            self.sequences.inc(SEQUENCE_BLOCK_ID, Some(&id))?;

            let block = Block::open(id, previous_id, number, sequence.sequence, self.clock.now_ms());
            if let Some(previous) = &block.previous_id {
                self.close_block(previous)?;
            }
            self.store.create_block(&block)?;
            debug!(block = %block.id, number, height = block.height, "opened block");
        }

        Ok(None)
    }

    /// Finalizes a block: links it to the last mined predecessor, fixes the
    /// Merkle root, difficulty and total fee, and marks it closed.
    pub fn close_block(&self, id: &str) -> LedgerResult<()> {
        let Some(block) = self.store.get_block(id)? else {
            warn!(block = id, "block not found for close");
            return Ok(());
        };
        if block.closed {
            return Ok(());
        }

        let now = self.clock.now_ms();
        let mut previous_block_hash = None;
        let mut mining_release_timestamp = None;
        if block.height == 0 {
            mining_release_timestamp = Some(now);
        } else if let Some(last_mined) = self.last_mined_block(block.height)? {
            if let Some(hash) = last_mined.block_hash {
                previous_block_hash = Some(hash);
                mining_release_timestamp = Some(now);
            }
        }

        let merkle_root = merkle_root(
            &block
                .transactions
                .iter()
                .map(|entry| entry.id.clone())
                .collect::<Vec<_>>(),
        );
        let total_fee = block
            .transactions
            .iter()
            .fold(Amount::zero(), |sum, entry| &sum + &entry.tax);
        let difficulty = total_fee.integer_digits() * 2;

        self.store.modify_block(id, |block| {
            if previous_block_hash.is_some() {
                block.previous_block_hash = previous_block_hash;
            }
            if mining_release_timestamp.is_some() {
                block.mining_release_timestamp = mining_release_timestamp;
            }
            block.merkle_root = merkle_root;
            block.difficulty = Some(difficulty);
            block.total_fee = Some(total_fee);
            block.close_timestamp = Some(now);
            block.closed = true;
        })?;
        debug!(block = id, "block closed");
        Ok(())
    }

    /// The mined block directly below `height`, when it exists.
    pub fn last_mined_block(&self, height: u64) -> LedgerResult<Option<Block>> {
        if height == 0 {
            return Ok(None);
        }
        Ok(self
            .store
            .find_block_by_height(height - 1)?
            .filter(|block| block.mined))
    }

    /// Promotes the closed block above `height` to mineable by linking it to
    /// the freshly mined predecessor hash.
    pub fn release_next_block_for_mining(&self, height: u64, previous_block_hash: &str) -> LedgerResult<()> {
        let Some(block) = self
            .store
            .find_block_by_height(height + 1)?
            .filter(|block| block.closed && !block.mined && block.previous_block_hash.is_none())
        else {
            return Ok(());
        };
        let now = self.clock.now_ms();
        let hash = previous_block_hash.to_string();
        self.store.modify_block(&block.id, |block| {
            block.mining_release_timestamp = Some(now);
            block.previous_block_hash = Some(hash);
        })?;
        Ok(())
    }

    pub fn find_block_by_transaction(&self, tx_id: &str) -> LedgerResult<Option<Block>> {
        self.store.find_block_by_transaction(tx_id)
    }
}

/// Bottom-up pairwise keccak over transaction ids; the odd tail pairs with
/// itself. Empty input has no root.
pub fn merkle_root(ids: &[String]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let mut level: Vec<String> = ids.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = if pair.len() == 2 { &pair[1] } else { left };
            next.push(keccak_hex(&format!("{left}{right}")));
        }
        level = next;
    }
    level.into_iter().next()
}
