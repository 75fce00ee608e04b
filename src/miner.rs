//! Proof-of-work over closed blocks.
//!
//! The search hashes `base ‖ nonce-vector` with SHA-256 and looks for a
//! difficulty-sized run of leading zeroes. The nonce vector grows a new
//! dimension on carry-out, so the search space never exhausts. Workers share
//! a stop flag checked between candidates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::info;

use crate::blocks::{BlockService, SEMAPHORE_BLOCKCHAIN};
use crate::clock::Clock;
use crate::crypto::sha256_hex;
use crate::errors::LedgerResult;
use crate::semaphore::Semaphore;
use crate::storage::Store;
use crate::types::{Block, BlockMineVerifyRequest};

const NONCE_BATCH_SIZE: usize = 10_000;

pub struct MinerService {
    store: Arc<Store>,
    semaphore: Arc<Semaphore>,
    blocks: Arc<BlockService>,
    clock: Clock,
}

fn nonces_repr(nonces: &[u64]) -> String {
    let rendered = nonces
        .iter()
        .map(|nonce| nonce.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{rendered}]")
}

fn hash_base(block: &Block) -> String {
    format!(
        "{}{}{}{}{}",
        block.id,
        block.timestamp,
        block.merkle_root.clone().unwrap_or_default(),
        block.previous_block_hash.clone().unwrap_or_default(),
        block
            .mining_release_timestamp
            .map(|ts| ts.to_string())
            .unwrap_or_default(),
    )
}

/// Little-end increment across dimensions; carry-out of the most significant
/// position prepends a fresh dimension.
fn increment_nonces(nonces: &mut Vec<u64>) {
    for index in (0..nonces.len()).rev() {
        if nonces[index] < u64::MAX - 1 {
            nonces[index] += 1;
            return;
        }
        nonces[index] = 0;
    }
    nonces.insert(0, 0);
}

impl MinerService {
    pub fn new(
        store: Arc<Store>,
        semaphore: Arc<Semaphore>,
        blocks: Arc<BlockService>,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            semaphore,
            blocks,
            clock,
        }
    }

    /// Searches for a winning nonce vector. Returns the block with `mined`,
    /// `nonces` and `block_hash` set on success; unchanged when the depth
    /// limit cuts the search short.
    pub fn mine(&self, block: &Block, threads: usize, max_nonce_depth: usize) -> Block {
        let mut block = block.clone();
        let difficulty_prefix = "0".repeat(block.difficulty.unwrap_or(0) as usize);
        let base = hash_base(&block);

        let mined = AtomicBool::new(false);
        let winner: Mutex<Option<(Vec<u64>, String)>> = Mutex::new(None);
        let mut nonces: Vec<u64> = vec![0];

        while !mined.load(Ordering::SeqCst) && nonces.len() <= max_nonce_depth {
            let mut batch = Vec::with_capacity(NONCE_BATCH_SIZE);
            for _ in 0..NONCE_BATCH_SIZE {
                batch.push(nonces.clone());
                increment_nonces(&mut nonces);
            }

            let chunk_size = batch.len().div_ceil(threads.max(1));
            let mined_ref = &mined;
            let base_ref = &base;
            let difficulty_prefix_ref = &difficulty_prefix;
            let winner_ref = &winner;
            std::thread::scope(|scope| {
                for chunk in batch.chunks(chunk_size) {
                    scope.spawn(move || {
                        for candidate in chunk {
                            if mined_ref.load(Ordering::SeqCst) {
                                return;
                            }
                            let hash = sha256_hex(&format!("{base_ref}{}", nonces_repr(candidate)));
                            if hash.starts_with(difficulty_prefix_ref) {
                                let mut winner = winner_ref.lock();
                                if winner.is_none() {
                                    *winner = Some((candidate.clone(), hash));
                                    mined_ref.store(true, Ordering::SeqCst);
                                }
                                return;
                            }
                        }
                    });
                }
            });
        }

        if let Some((nonces, hash)) = winner.into_inner() {
            block.mined = true;
            block.nonces = Some(nonces);
            block.block_hash = Some(hash);
        }
        block
    }

    /// Recomputes a submitted solution under the blockchain lock, stamps the
    /// block as mined and triggers the reward hook. Repeat submissions and
    /// bad hashes return `false`.
    pub fn verify_and_reward(&self, request: &BlockMineVerifyRequest) -> LedgerResult<bool> {
        self.semaphore.execute(SEMAPHORE_BLOCKCHAIN, || -> LedgerResult<bool> {
            let Some(block) = self.store.get_block(&request.block_id)? else {
                return Ok(false);
            };
            if block.mined {
                return Ok(false);
            }

            let computed = sha256_hex(&format!("{}{}", hash_base(&block), nonces_repr(&request.nonces)));
            let difficulty_prefix = "0".repeat(block.difficulty.unwrap_or(0) as usize);
            if computed != request.block_hash || !computed.starts_with(&difficulty_prefix) {
                return Ok(false);
            }

            let now = self.clock.now_ms();
            self.store.modify_block(&request.block_id, |block| {
                block.miner = Some(request.miner.clone());
                block.mined = true;
                block.mining_end_timestamp = Some(now);
                block.nonces = Some(request.nonces.clone());
                block.block_hash = Some(request.block_hash.clone());
            })?;
            self.distribute_mining_reward(&request.miner, &block);
            self.blocks
                .release_next_block_for_mining(block.height, &request.block_hash)?;
            Ok(true)
        })?
    }

    fn distribute_mining_reward(&self, miner: &str, block: &Block) {
        // TODO: credit the miner once the reward element policy is settled.
        info!(miner, block = %block.id, "miner rewarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_vector_renders_like_a_list() {
        assert_eq!(nonces_repr(&[0]), "[0]");
        assert_eq!(nonces_repr(&[0, 17]), "[0, 17]");
    }

    #[test]
    fn increment_carries_into_new_dimension() {
        let mut nonces = vec![5];
        increment_nonces(&mut nonces);
        assert_eq!(nonces, vec![6]);

        let mut saturated = vec![u64::MAX - 1];
        increment_nonces(&mut saturated);
        assert_eq!(saturated, vec![0, 0]);

        let mut mixed = vec![3, u64::MAX - 1];
        increment_nonces(&mut mixed);
        assert_eq!(mixed, vec![4, 0]);
    }
}
