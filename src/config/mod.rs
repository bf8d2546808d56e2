//! Configuration Management Module
//!
//! Loads the provider node configuration: the provider chain and its genesis
//! validator set, module parameters, API server settings and the consumer
//! chains proposed when the node starts.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ClientState, ConsensusPubKey, ConsumerAdditionProposal, Height, ProviderParams};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
///
/// Holds:
/// - Provider chain settings and genesis validators
/// - CCV module parameters
/// - API server configuration
/// - Consumer chains to propose at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub params: ParamsConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub consumer_additions: Vec<ConsumerAdditionConfig>,
}

/// Provider chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider chain ID, e.g. `provider-1`
    pub chain_id: String,
    /// Interval between produced blocks in milliseconds
    pub block_interval_ms: u64,
    /// Staking unbonding period in seconds
    pub unbonding_period_secs: u64,
    /// How long downtime jails a validator, in seconds
    #[serde(default = "default_downtime_jail_secs")]
    pub downtime_jail_duration_secs: u64,
    /// Governance account allowed to submit proposal messages
    #[serde(default = "default_authority")]
    pub authority: String,
    /// Module account receiving consumer rewards
    #[serde(default = "default_fee_collector")]
    pub fee_collector_name: String,
    #[serde(default)]
    pub validators: Vec<GenesisValidatorConfig>,
}

fn default_downtime_jail_secs() -> u64 {
    600
}

fn default_authority() -> String {
    "gov".to_string()
}

fn default_fee_collector() -> String {
    "fee_collector".to_string()
}

/// Validator bonded at genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisValidatorConfig {
    pub operator_address: String,
    /// Base64 ed25519 consensus public key
    pub consensus_pubkey: String,
    pub power: i64,
}

/// CCV module parameters. Omitted fields take the module defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    pub max_clock_drift_secs: u64,
    pub ccv_timeout_period_secs: u64,
    pub slash_meter_replenish_period_secs: u64,
    /// Decimal in [0, 1]
    pub slash_meter_replenish_fraction: String,
    /// Chain IDs no consumer chain may use
    pub reserved_chain_ids: Vec<String>,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        let params = ProviderParams::default();
        Self {
            max_clock_drift_secs: params.template_client.max_clock_drift.as_secs(),
            ccv_timeout_period_secs: params.ccv_timeout_period.as_secs(),
            slash_meter_replenish_period_secs: params.slash_meter_replenish_period.as_secs(),
            slash_meter_replenish_fraction: params.slash_meter_replenish_fraction,
            reserved_chain_ids: params.reserved_chain_ids,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

/// Consumer chain proposed when the node starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerAdditionConfig {
    pub chain_id: String,
    /// Seconds after startup at which the chain spawns; 0 spawns in the first block
    #[serde(default)]
    pub spawn_delay_secs: u64,
    #[serde(default = "default_initial_height")]
    pub initial_height: u64,
    #[serde(default)]
    pub lock_unbonding_on_timeout: bool,
    /// Existing connection to reuse instead of creating a new client
    #[serde(default)]
    pub connection_id: Option<String>,
}

fn default_initial_height() -> u64 {
    1
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl ParamsConfig {
    pub fn to_params(&self) -> ProviderParams {
        let defaults = ProviderParams::default();
        ProviderParams {
            template_client: ClientState {
                max_clock_drift: Duration::from_secs(self.max_clock_drift_secs),
                ..defaults.template_client
            },
            ccv_timeout_period: Duration::from_secs(self.ccv_timeout_period_secs),
            slash_meter_replenish_period: Duration::from_secs(self.slash_meter_replenish_period_secs),
            slash_meter_replenish_fraction: self.slash_meter_replenish_fraction.clone(),
            reserved_chain_ids: self.reserved_chain_ids.clone(),
        }
    }
}

impl ConsumerAdditionConfig {
    /// Builds the addition proposal, spawning `spawn_delay_secs` after `now`.
    ///
    /// # Arguments
    ///
    /// * `now` - Node start time
    /// * `unbonding_period` - Provider unbonding period; the consumer gets the same
    /// * `ccv_timeout_period` - CCV timeout copied into the consumer params
    pub fn to_proposal(
        &self,
        now: DateTime<Utc>,
        unbonding_period: Duration,
        ccv_timeout_period: Duration,
    ) -> anyhow::Result<ConsumerAdditionProposal> {
        let delay = chrono::Duration::from_std(Duration::from_secs(self.spawn_delay_secs))
            .context("spawn delay out of range")?;
        let spawn_time = now
            .checked_add_signed(delay)
            .context("spawn time out of range")?;
        Ok(ConsumerAdditionProposal {
            title: format!("Add {}", self.chain_id),
            description: format!("Launch consumer chain {}", self.chain_id),
            chain_id: self.chain_id.clone(),
            initial_height: Height::new(
                crate::keeper::proposal::parse_chain_id_revision(&self.chain_id),
                self.initial_height,
            ),
            genesis_hash: Sha256::digest(format!("{}/genesis", self.chain_id)).to_vec(),
            binary_hash: Sha256::digest(format!("{}/binary", self.chain_id)).to_vec(),
            spawn_time,
            lock_unbonding_on_timeout: self.lock_unbonding_on_timeout,
            unbonding_period,
            ccv_timeout_period,
            transfer_timeout_period: Duration::from_secs(3600),
            consumer_redistribution_fraction: "0.75".to_string(),
            blocks_per_distribution_transmission: 1000,
            historical_entries: 10000,
            connection_id: self.connection_id.clone(),
        })
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// Checks that:
    /// - The provider chain ID is set and timings are positive
    /// - Params are valid
    /// - Genesis validators are unique with valid keys and positive power
    /// - Consumer chain IDs are unique and differ from the provider's
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is valid
    /// - `Err(anyhow::Error)` - The first problem found
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.provider.chain_id.trim().is_empty() {
            anyhow::bail!("Configuration error: provider.chain_id must not be empty");
        }
        if self.provider.block_interval_ms == 0 {
            anyhow::bail!("Configuration error: provider.block_interval_ms must be positive");
        }
        if self.provider.unbonding_period_secs == 0 {
            anyhow::bail!("Configuration error: provider.unbonding_period_secs must be positive");
        }
        self.params
            .to_params()
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration error: invalid params: {}", e))?;

        let mut operators = BTreeSet::new();
        for validator in &self.provider.validators {
            if !operators.insert(validator.operator_address.as_str()) {
                anyhow::bail!(
                    "Configuration error: duplicate validator {}",
                    validator.operator_address
                );
            }
            if validator.power <= 0 {
                anyhow::bail!(
                    "Configuration error: validator {} must have positive power",
                    validator.operator_address
                );
            }
            ConsensusPubKey::from_base64(&validator.consensus_pubkey).map_err(|e| {
                anyhow::anyhow!(
                    "Configuration error: validator {} has invalid consensus key: {}",
                    validator.operator_address,
                    e
                )
            })?;
        }

        let mut chains = BTreeSet::new();
        for addition in &self.consumer_additions {
            if addition.chain_id == self.provider.chain_id {
                anyhow::bail!(
                    "Configuration error: consumer chain {} has the provider chain ID",
                    addition.chain_id
                );
            }
            if !chains.insert(addition.chain_id.as_str()) {
                anyhow::bail!(
                    "Configuration error: consumer chain {} is listed twice",
                    addition.chain_id
                );
            }
        }
        Ok(())
    }

    /// Loads configuration from the TOML file.
    ///
    /// The path comes from `CCV_PROVIDER_CONFIG_PATH`, defaulting to
    /// `config/provider.toml`. A missing file is an error asking the operator
    /// to copy the template.
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Loaded and validated configuration
    /// - `Err(anyhow::Error)` - Missing file, parse failure or validation failure
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var("CCV_PROVIDER_CONFIG_PATH").unwrap_or_else(|_| "config/provider.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file '{}'", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file '{}'", config_path))?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/provider.template.toml config/provider.toml\n\
                Then edit config/provider.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Configuration for local development and tests: no validators, no consumers.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            provider: ProviderConfig {
                chain_id: "provider-1".to_string(),
                block_interval_ms: 1000,
                unbonding_period_secs: 21 * 24 * 3600,
                downtime_jail_duration_secs: default_downtime_jail_secs(),
                authority: default_authority(),
                fee_collector_name: default_fee_collector(),
                validators: Vec::new(),
            },
            params: ParamsConfig::default(),
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3340,
                cors_origins: vec!["http://localhost:3340".to_string()],
            },
            consumer_additions: Vec::new(),
        }
    }
}
