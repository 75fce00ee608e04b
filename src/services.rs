use std::sync::Arc;

use crate::balance::BalanceStore;
use crate::blocks::BlockService;
use crate::cache::Cache;
use crate::clock::Clock;
use crate::config::WorkerConfig;
use crate::elements::ElementService;
use crate::errors::LedgerResult;
use crate::miner::MinerService;
use crate::semaphore::Semaphore;
use crate::sequence::SequenceStore;
use crate::storage::Store;
use crate::transfers::TransferService;

/// Composition root. Every handler receives this explicitly; there is no
/// process-global registry.
pub struct Services {
    pub config: WorkerConfig,
    pub clock: Clock,
    pub store: Arc<Store>,
    pub cache: Arc<Cache>,
    pub semaphore: Arc<Semaphore>,
    pub sequences: Arc<SequenceStore>,
    pub balances: Arc<BalanceStore>,
    pub blocks: Arc<BlockService>,
    pub transfers: Arc<TransferService>,
    pub elements: Arc<ElementService>,
    pub miner: Arc<MinerService>,
}

impl Services {
    pub fn build(config: WorkerConfig, clock: Clock) -> LedgerResult<Arc<Self>> {
        config.ensure_directories()?;
        let store = Arc::new(Store::open(&config.data_dir.join("db"))?);
        let cache = Arc::new(Cache::new(clock.clone()));
        let semaphore = Arc::new(Semaphore::new(
            cache.clone(),
            config.defaults.semaphore_lock_timeout_ms,
            config.defaults.thread_initial_backoff_ms,
            config.defaults.thread_max_backoff_ms,
        ));
        let sequences = Arc::new(SequenceStore::new(store.clone()));
        let balances = Arc::new(BalanceStore::new(
            store.clone(),
            config.defaults.balance_seed.clone(),
        ));
        let blocks = Arc::new(BlockService::new(
            store.clone(),
            sequences.clone(),
            semaphore.clone(),
            clock.clone(),
            config.defaults.thread_initial_backoff_ms,
            config.defaults.thread_max_backoff_ms,
            config.defaults.semaphore_lock_timeout_ms,
        ));
        let transfers = Arc::new(TransferService::new(
            store.clone(),
            semaphore.clone(),
            sequences.clone(),
            balances.clone(),
            blocks.clone(),
            clock.clone(),
            config.network_policy.network_tax.clone(),
            config.defaults.deduct_total_from_sender,
        ));
        let elements = Arc::new(ElementService::new(
            store.clone(),
            semaphore.clone(),
            sequences.clone(),
            transfers.clone(),
            clock.clone(),
        ));
        let miner = Arc::new(MinerService::new(
            store.clone(),
            semaphore.clone(),
            blocks.clone(),
            clock.clone(),
        ));
        Ok(Arc::new(Self {
            config,
            clock,
            store,
            cache,
            semaphore,
            sequences,
            balances,
            blocks,
            transfers,
            elements,
            miner,
        }))
    }
}
