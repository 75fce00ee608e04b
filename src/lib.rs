//! Write-side worker of the Norsh ledger.
//!
//! The worker ingests signed operation requests from a message bus,
//! validates them, mutates the document store holding elements, balances,
//! transactions and blocks, and publishes response envelopes through a
//! TTL-bounded cache. Concurrent writers are serialized per logical
//! resource by a cache-backed distributed semaphore; per-stream chaining
//! runs through dynamic sequences, and confirmed transfers land in
//! six-minute block windows linked by hash.
//!
//! Applications typically load a [`config::WorkerConfig`], build a
//! [`services::Services`] composition, run [`bootstrap::Bootstrap`] once,
//! and then feed envelopes to the [`dispatch::Dispatcher`] — either through
//! the [`queue`] consumer or the [`api`] surface.

pub mod amount;
pub mod api;
pub mod balance;
pub mod blocks;
pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod elements;
pub mod errors;
pub mod miner;
pub mod queue;
pub mod semaphore;
pub mod sequence;
pub mod services;
pub mod storage;
pub mod transfers;
pub mod types;
