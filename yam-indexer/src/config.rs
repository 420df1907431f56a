//! Runtime configuration loaded from `config.toml`.
//!
//! Every field has a default matching the RealT YAM deployment on Gnosis
//! Chain, so the binary works without any config file.
//!
//! ```toml
//! contract = "0xC759AA7f9dd9720A1502c104DaE4F9852bb17C14"
//! start_block = 25530394
//! confirmations = 5
//! poll_interval_secs = 15
//! rpcs = ["https://rpc.gnosischain.com", "https://gnosis-rpc.publicnode.com"]
//! ```

use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, address};
use anyhow::{Context, Result};
use serde::Deserialize;

/// YAM proxy contract on Gnosis Chain.
pub const DEFAULT_CONTRACT: Address = address!("0xC759AA7f9dd9720A1502c104DaE4F9852bb17C14");

/// Block the YAM proxy was deployed at.
pub const DEFAULT_START_BLOCK: u64 = 25_530_394;

/// Suggested public Gnosis RPC endpoint.
pub const DEFAULT_RPC: &str = "https://rpc.gnosischain.com";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// EIP-155 chain ID, used in log fields only.
    pub chain_id: u64,
    /// Address of the YAM contract whose logs are indexed.
    pub contract: Address,
    /// First block of a fresh sync.
    pub start_block: u64,
    /// Blocks kept between the chain tip and the last indexed block.
    pub confirmations: u64,
    /// Delay between sync rounds in follow mode.
    pub poll_interval_secs: u64,
    /// Ordered list of RPC URLs (best first).
    pub rpcs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: 100,
            contract: DEFAULT_CONTRACT,
            start_block: DEFAULT_START_BLOCK,
            confirmations: 5,
            poll_interval_secs: 15,
            rpcs: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns [`Config::default`] if the file does not exist,
    /// allowing the binary to work without any config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// RPC URLs to try in order: the CLI override if any, else the
    /// configured list, else [`DEFAULT_RPC`].
    #[must_use]
    pub fn rpcs(&self, rpc_override: Option<&str>) -> Vec<String> {
        match rpc_override {
            Some(url) => vec![url.to_owned()],
            None if !self.rpcs.is_empty() => self.rpcs.clone(),
            None => vec![DEFAULT_RPC.to_owned()],
        }
    }

    /// Follow-mode polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.contract, DEFAULT_CONTRACT, "default contract");
        assert_eq!(cfg.start_block, DEFAULT_START_BLOCK, "default start");
        assert_eq!(cfg.rpcs(None), vec![DEFAULT_RPC.to_owned()], "default rpc");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "confirmations = 12\nrpcs = [\"https://a.example\", \"https://b.example\"]\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.confirmations, 12, "overridden");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(15), "default kept");
        assert_eq!(cfg.rpcs(None).len(), 2, "configured list");
        assert_eq!(
            cfg.rpcs(Some("https://c.example")),
            vec!["https://c.example".to_owned()],
            "cli override wins"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "confirmation = 3\n").unwrap();
        assert!(Config::load(&path).is_err(), "typo must not be ignored");
    }
}
