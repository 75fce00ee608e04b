use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::errors::{LedgerError, LedgerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub data_dir: PathBuf,
    pub key_path: PathBuf,
    pub rpc_listen: SocketAddr,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub network_policy: NetworkPolicyConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_semaphore_lock_timeout_ms")]
    pub semaphore_lock_timeout_ms: u64,
    #[serde(default = "default_thread_initial_backoff_ms")]
    pub thread_initial_backoff_ms: u64,
    #[serde(default = "default_thread_max_backoff_ms")]
    pub thread_max_backoff_ms: u64,
    #[serde(default = "default_messaging_ttl_ms")]
    pub messaging_ttl_ms: u64,
    #[serde(default = "default_queue_consumer_thread_pool")]
    pub queue_consumer_thread_pool: usize,
    /// Amount synthesized for balances that do not exist yet.
    #[serde(default = "default_balance_seed")]
    pub balance_seed: Amount,
    /// When true the sender is debited `total` (volume + taxes) instead of
    /// the bare volume.
    #[serde(default)]
    pub deduct_total_from_sender: bool,
}

fn default_semaphore_lock_timeout_ms() -> u64 {
    30_000
}

fn default_thread_initial_backoff_ms() -> u64 {
    20
}

fn default_thread_max_backoff_ms() -> u64 {
    2_000
}

fn default_messaging_ttl_ms() -> u64 {
    600_000
}

fn default_queue_consumer_thread_pool() -> usize {
    20
}

fn default_balance_seed() -> Amount {
    Amount::zero()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            semaphore_lock_timeout_ms: default_semaphore_lock_timeout_ms(),
            thread_initial_backoff_ms: default_thread_initial_backoff_ms(),
            thread_max_backoff_ms: default_thread_max_backoff_ms(),
            messaging_ttl_ms: default_messaging_ttl_ms(),
            queue_consumer_thread_pool: default_queue_consumer_thread_pool(),
            balance_seed: default_balance_seed(),
            deduct_total_from_sender: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkPolicyConfig {
    /// Universal fee rate in percent applied to every taxed transfer.
    #[serde(default = "default_network_tax")]
    pub network_tax: Amount,
}

fn default_network_tax() -> Amount {
    Amount::parse("0.3").expect("valid default network tax")
}

impl Default for NetworkPolicyConfig {
    fn default() -> Self {
        Self {
            network_tax: default_network_tax(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub nsh_tfo: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

impl WorkerConfig {
    pub fn load(path: &Path) -> LedgerResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| LedgerError::Config(format!("unable to parse config: {err}")))
    }

    pub fn save(&self, path: &Path) -> LedgerResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| LedgerError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> LedgerResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            key_path: PathBuf::from("./keys/worker.toml"),
            rpc_listen: "127.0.0.1:7080".parse().expect("valid socket addr"),
            defaults: DefaultsConfig::default(),
            network_policy: NetworkPolicyConfig::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        let config = WorkerConfig::default();
        config.save(&path).unwrap();
        let loaded = WorkerConfig::load(&path).unwrap();
        assert_eq!(loaded.defaults.semaphore_lock_timeout_ms, 30_000);
        assert_eq!(loaded.defaults.queue_consumer_thread_pool, 20);
        assert_eq!(loaded.network_policy.network_tax.to_string(), "0.3");
        assert!(!loaded.defaults.deduct_total_from_sender);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        fs::write(
            &path,
            "data_dir = \"./d\"\nkey_path = \"./k/worker.toml\"\nrpc_listen = \"127.0.0.1:1234\"\n\n[defaults]\nmessaging_ttl_ms = 1000\n",
        )
        .unwrap();
        let loaded = WorkerConfig::load(&path).unwrap();
        assert_eq!(loaded.defaults.messaging_ttl_ms, 1_000);
        assert_eq!(loaded.defaults.thread_initial_backoff_ms, 20);
        assert_eq!(loaded.defaults.balance_seed, Amount::zero());
    }
}
