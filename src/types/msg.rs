//! Provider messages and their stateless validation
//!
//! Every message is checked with `validate_basic()` before it reaches the
//! keeper, so malformed input never touches the store.

use serde::{Deserialize, Serialize};

use super::{ConsensusPubKey, ConsumerAdditionProposal, ConsumerRemovalProposal, DecimalFraction, MAX_CHAIN_ID_LENGTH};
use crate::error::{ProviderError, Result};

/// Type URL of ed25519 consensus keys in consumer key JSON.
pub const ED25519_PUBKEY_TYPE: &str = "/cosmos.crypto.ed25519.PubKey";

// ============================================================================
// SHARED VALIDATION
// ============================================================================

/// Validates a consumer chain ID.
///
/// Rejects blank IDs, IDs with leading or trailing whitespace, IDs longer
/// than 128 bytes and any ID on the `reserved` denylist.
pub fn validate_chain_id(field: &str, chain_id: &str, reserved: &[String]) -> Result<()> {
    let trimmed = chain_id.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::InvalidConsumerChainId(format!("{} cannot be blank", field)));
    }
    if trimmed.len() != chain_id.len() {
        return Err(ProviderError::InvalidConsumerChainId(format!(
            "{} cannot have leading or trailing whitespace",
            field
        )));
    }
    if trimmed.len() > MAX_CHAIN_ID_LENGTH {
        return Err(ProviderError::InvalidConsumerChainId(format!(
            "{} exceeds max length {}",
            field, MAX_CHAIN_ID_LENGTH
        )));
    }
    if reserved.iter().any(|r| r == trimmed) {
        return Err(ProviderError::InvalidConsumerChainId(format!(
            "cannot use a reserved chain id: {}",
            trimmed
        )));
    }
    Ok(())
}

/// Coin denom rule: a letter followed by 2 to 127 of `[a-zA-Z0-9/:._-]`.
pub fn is_valid_denom(denom: &str) -> bool {
    let mut chars = denom.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    let rest = denom.len() - 1;
    (2..=127).contains(&rest)
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
}

#[derive(Debug, Deserialize)]
struct ConsumerKeyJson {
    #[serde(rename = "@type")]
    type_url: String,
    key: String,
}

/// Parses `{"@type": ..., "key": <base64>}` into `(type_url, key)`.
pub fn parse_consumer_key_from_json(json: &str) -> Result<(String, String)> {
    let parsed: ConsumerKeyJson = serde_json::from_str(json)
        .map_err(|e| ProviderError::InvalidConsumerConsensusPubKey(e.to_string()))?;
    Ok((parsed.type_url, parsed.key))
}

/// Parses consumer key JSON into an ed25519 consensus key.
pub fn parse_consumer_key(json: &str) -> Result<ConsensusPubKey> {
    let (type_url, key) = parse_consumer_key_from_json(json)?;
    if type_url != ED25519_PUBKEY_TYPE {
        return Err(ProviderError::InvalidConsumerConsensusPubKey(format!(
            "unsupported key type {}",
            type_url
        )));
    }
    ConsensusPubKey::from_base64(&key).map_err(ProviderError::InvalidConsumerConsensusPubKey)
}

/// Renders a consensus key as consumer key JSON.
pub fn consumer_key_json(key: &ConsensusPubKey) -> String {
    serde_json::json!({ "@type": ED25519_PUBKEY_TYPE, "key": key.to_base64() }).to_string()
}

// ============================================================================
// GOVERNANCE MESSAGES
// ============================================================================

/// Governance message proposing a new consumer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConsumerAddition {
    pub authority: String,
    pub content: ConsumerAdditionProposal,
}

impl MsgConsumerAddition {
    pub fn validate_basic(&self, reserved: &[String]) -> Result<()> {
        let p = &self.content;
        validate_chain_id("chain_id", &p.chain_id, reserved)?;
        let invalid = |msg: &str| Err(ProviderError::InvalidConsumerAdditionProposal(msg.to_string()));

        if p.initial_height.is_zero() {
            return invalid("initial height cannot be zero");
        }
        if p.genesis_hash.is_empty() {
            return invalid("genesis hash cannot be empty");
        }
        if p.binary_hash.is_empty() {
            return invalid("binary hash cannot be empty");
        }
        if p.spawn_time.timestamp() == 0 && p.spawn_time.timestamp_subsec_nanos() == 0 {
            return invalid("spawn time cannot be zero");
        }
        if let Err(e) = DecimalFraction::parse(&p.consumer_redistribution_fraction) {
            return Err(ProviderError::InvalidConsumerAdditionProposal(format!(
                "consumer redistribution fraction is invalid: {}",
                e
            )));
        }
        if p.blocks_per_distribution_transmission < 1 {
            return invalid("blocks per distribution transmission cannot be < 1");
        }
        if p.historical_entries < 1 {
            return invalid("historical entries cannot be < 1");
        }
        if p.ccv_timeout_period.is_zero() {
            return invalid("ccv timeout period cannot be zero");
        }
        if p.transfer_timeout_period.is_zero() {
            return invalid("transfer timeout period cannot be zero");
        }
        if p.unbonding_period.is_zero() {
            return invalid("unbonding period cannot be zero");
        }
        if matches!(&p.connection_id, Some(c) if c.trim().is_empty()) {
            return invalid("connection id cannot be blank when set");
        }
        Ok(())
    }
}

/// Governance message scheduling the removal of a consumer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConsumerRemoval {
    pub authority: String,
    pub content: ConsumerRemovalProposal,
}

impl MsgConsumerRemoval {
    pub fn validate_basic(&self, reserved: &[String]) -> Result<()> {
        validate_chain_id("chain_id", &self.content.chain_id, reserved)?;
        let stop = self.content.stop_time;
        if stop.timestamp() == 0 && stop.timestamp_subsec_nanos() == 0 {
            return Err(ProviderError::InvalidConsumerRemovalProposal(
                "stop time cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Governance message changing the unbonding-lock policy of a pending or registered chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConsumerModification {
    pub authority: String,
    pub title: String,
    pub description: String,
    pub chain_id: String,
    pub lock_unbonding_on_timeout: bool,
}

impl MsgConsumerModification {
    pub fn validate_basic(&self, reserved: &[String]) -> Result<()> {
        validate_chain_id("chain_id", &self.chain_id, reserved)
    }
}

/// Governance message adding and removing registered consumer reward denoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgChangeRewardDenoms {
    pub authority: String,
    pub denoms_to_add: Vec<String>,
    pub denoms_to_remove: Vec<String>,
}

impl MsgChangeRewardDenoms {
    pub fn validate_basic(&self) -> Result<()> {
        if self.denoms_to_add.is_empty() && self.denoms_to_remove.is_empty() {
            return Err(ProviderError::InvalidRewardDenoms(
                "both denoms to add and denoms to remove are empty".to_string(),
            ));
        }
        if let Some(dup) = self.denoms_to_add.iter().find(|d| self.denoms_to_remove.contains(d)) {
            return Err(ProviderError::InvalidRewardDenoms(format!(
                "{} cannot be both added and removed",
                dup
            )));
        }
        if let Some(bad) = self
            .denoms_to_add
            .iter()
            .chain(self.denoms_to_remove.iter())
            .find(|d| !is_valid_denom(d))
        {
            return Err(ProviderError::InvalidRewardDenoms(format!("{} is not a valid denom", bad)));
        }
        Ok(())
    }
}

// ============================================================================
// VALIDATOR MESSAGES
// ============================================================================

/// Validator message assigning a consensus key for one consumer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAssignConsumerKey {
    pub chain_id: String,
    /// Operator address of the provider validator
    pub provider_addr: String,
    /// Consumer key JSON, `{"@type": ..., "key": ...}`
    pub consumer_key: String,
    pub signer: String,
}

impl MsgAssignConsumerKey {
    pub fn validate_basic(&self, reserved: &[String]) -> Result<()> {
        validate_chain_id("chain_id", &self.chain_id, reserved)?;
        if self.provider_addr.trim().is_empty() || self.provider_addr.chars().any(char::is_whitespace) {
            return Err(ProviderError::InvalidProviderAddress(self.provider_addr.clone()));
        }
        if self.provider_addr != self.signer {
            return Err(ProviderError::InvalidProviderAddress(
                "provider validator address must be the same as the signer address".to_string(),
            ));
        }
        if self.consumer_key.is_empty() {
            return Err(ProviderError::InvalidConsumerConsensusPubKey("empty consumer key".to_string()));
        }
        parse_consumer_key(&self.consumer_key)?;
        Ok(())
    }
}
