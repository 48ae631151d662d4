//! Configuration management for the relay service

use alloy_primitives::Address;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::window::{COMPUTE_LOOKBACK, VOLATILITY_LOOKBACK};

/// Sepolia
pub const DEFAULT_CHAIN_ID: u64 = 11155111;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint of the chain the logs are read from
    pub rpc_endpoint: String,

    /// Operator private key, used to sign attestation submissions
    pub server_private_key: String,

    /// Contract whose event logs are scanned
    pub contract_address: String,

    /// Optional topic filter passed to `eth_getLogs`
    pub event_topics: Vec<String>,

    /// Local prover service
    pub prover_endpoint: String,

    /// Attestation network gateway
    pub attestation_endpoint: String,

    /// API key for the attestation network
    pub attestation_api_key: Option<String>,

    /// Contract called back once the proof is verified
    pub callback_address: String,

    pub src_chain_id: u64,
    pub dst_chain_id: u64,

    /// Submission option forwarded to the attestation network
    pub submission_option: u8,

    /// Port of the trigger server
    pub port: u16,

    pub volatility_lookback: i64,
    pub compute_lookback: i64,

    pub prove_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub wait_timeout_secs: u64,

    /// Delay between two completion polls
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,

    /// Timeout of individual HTTP requests
    pub request_timeout_secs: u64,

    /// Fail fast on logs missing a selected topic or data word
    pub strict_field_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://localhost:8545".to_string(),
            server_private_key: String::new(),
            contract_address: String::new(),
            event_topics: vec![],
            prover_endpoint: "http://localhost:33247".to_string(),
            attestation_endpoint: "https://appsdkv3.brevis.network".to_string(),
            attestation_api_key: None,
            callback_address: String::new(),
            src_chain_id: DEFAULT_CHAIN_ID,
            dst_chain_id: DEFAULT_CHAIN_ID,
            submission_option: 0,
            port: 3010,
            volatility_lookback: VOLATILITY_LOOKBACK,
            compute_lookback: COMPUTE_LOOKBACK,
            prove_timeout_secs: 600,
            submit_timeout_secs: 60,
            wait_timeout_secs: 1800,
            poll_interval_secs: 10,
            max_poll_attempts: 150,
            request_timeout_secs: 30,
            strict_field_check: false,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = env::var("SERVER_RPC") {
            self.rpc_endpoint = endpoint;
        }

        if let Ok(key) = env::var("SERVER_KEY") {
            self.server_private_key = key;
        }

        if let Ok(address) = env::var("CONTRACT_ADDRESS") {
            self.contract_address = address;
        }

        if let Ok(topics) = env::var("EVENT_TOPICS") {
            self.event_topics = topics
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(endpoint) = env::var("PROVER_ENDPOINT") {
            self.prover_endpoint = endpoint;
        }

        if let Ok(endpoint) = env::var("ATTESTATION_ENDPOINT") {
            self.attestation_endpoint = endpoint;
        }

        if let Ok(key) = env::var("BREVIS_KEY") {
            self.attestation_api_key = Some(key).filter(|k| !k.is_empty());
        }

        if let Ok(address) = env::var("BREVIS_CALLBACK_ADDRESS") {
            self.callback_address = address;
        }

        override_parsed("SRC_CHAIN_ID", &mut self.src_chain_id);
        override_parsed("DST_CHAIN_ID", &mut self.dst_chain_id);
        override_parsed("SUBMISSION_OPTION", &mut self.submission_option);
        override_parsed("PORT", &mut self.port);
        override_parsed("VOLATILITY_LOOKBACK", &mut self.volatility_lookback);
        override_parsed("COMPUTE_LOOKBACK", &mut self.compute_lookback);
        override_parsed("PROVE_TIMEOUT_SECS", &mut self.prove_timeout_secs);
        override_parsed("SUBMIT_TIMEOUT_SECS", &mut self.submit_timeout_secs);
        override_parsed("WAIT_TIMEOUT_SECS", &mut self.wait_timeout_secs);
        override_parsed("POLL_INTERVAL_SECS", &mut self.poll_interval_secs);
        override_parsed("MAX_POLL_ATTEMPTS", &mut self.max_poll_attempts);
        override_parsed("STRICT_FIELD_CHECK", &mut self.strict_field_check);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server_private_key.is_empty() {
            return Err(anyhow::anyhow!("Server private key is required"));
        }

        Address::from_str(&self.contract_address)
            .map_err(|e| anyhow::anyhow!("Invalid contract address '{}': {}", self.contract_address, e))?;

        Address::from_str(&self.callback_address)
            .map_err(|e| anyhow::anyhow!("Invalid callback address '{}': {}", self.callback_address, e))?;

        if self.volatility_lookback < 0 || self.compute_lookback < 0 {
            return Err(anyhow::anyhow!("Lookback presets must be non-negative"));
        }

        if self.max_poll_attempts == 0 {
            return Err(anyhow::anyhow!("At least one completion poll is required"));
        }

        // The poll budget must run out before the stage timeout fires
        let poll_budget = self.poll_interval_secs.saturating_mul(u64::from(self.max_poll_attempts));
        if self.wait_timeout_secs <= poll_budget {
            return Err(anyhow::anyhow!(
                "wait_timeout_secs ({}) must exceed poll_interval_secs * max_poll_attempts ({})",
                self.wait_timeout_secs,
                poll_budget
            ));
        }

        Ok(())
    }

    pub fn prove_timeout(&self) -> Duration {
        Duration::from_secs(self.prove_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn override_parsed<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(value) = env::var(var) {
        if let Ok(parsed) = value.trim().parse() {
            *target = parsed;
        }
    }
}
