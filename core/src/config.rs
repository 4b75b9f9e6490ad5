//! Consensus and runtime configuration for **Obscura** core.
//!
//! The [`Config`] struct centralises tunable parameters such as difficulty
//! targets and coinbase reward schedule. It is constructed via the
//! [`ConfigBuilder`] using the fluent builder pattern, enabling callers to
//! customise only the fields they care about while keeping sensible defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! // default main-net configuration
//! let cfg = Config::default();
//! assert_eq!(cfg.difficulty, 8);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// PoW leading-zero difficulty in bits.
    pub difficulty: u32,

    /// Block subsidy in „Obsc“ paid to the miner.
    pub block_reward: u64,

    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,

    /// Root directory under which every ledger's `<symbol>_<network>`
    /// subdirectory (database + header store) is created.
    pub data_path: PathBuf,

    /// Per-byte fee override; falls back to the ledger variant's
    /// `default_fee_per_byte` when unset.
    pub fee_per_byte: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: 8,
            block_reward: 50,
            network: "main".into(),
            data_path: PathBuf::from("."),
            fee_per_byte: None,
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn difficulty(mut self, diff: u32) -> Self {
        self.inner.difficulty = diff;
        self
    }

    pub fn block_reward(mut self, reward: u64) -> Self {
        self.inner.block_reward = reward;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    pub fn data_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.inner.data_path = path.into();
        self
    }

    pub fn fee_per_byte(mut self, fee: u64) -> Self {
        self.inner.fee_per_byte = Some(fee);
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}
