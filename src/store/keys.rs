//! Store key layout
//!
//! Every key starts with a one-byte namespace prefix. Keys that are iterated
//! in time order embed the timestamp as fixed-width big-endian nanoseconds, so
//! byte order equals chronological order. Keys that carry a chain ID followed
//! by another component length-prefix the chain ID so that `chain-1` and
//! `chain-10` never share a scan range.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{ProviderError, Result};

// ============================================================================
// NAMESPACE PREFIXES
// ============================================================================

pub const PORT_PREFIX: u8 = 0;
pub const CHAIN_TO_CHANNEL_PREFIX: u8 = 1;
pub const CHANNEL_TO_CHAIN_PREFIX: u8 = 2;
pub const CHAIN_TO_CLIENT_PREFIX: u8 = 3;
pub const PENDING_CREATE_PREFIX: u8 = 4;
pub const PENDING_STOP_PREFIX: u8 = 5;
pub const UNBONDING_OP_PREFIX: u8 = 6;
pub const UNBONDING_OP_INDEX_PREFIX: u8 = 7;
pub const VALSET_UPDATE_ID_PREFIX: u8 = 8;
pub const SLASH_METER_PREFIX: u8 = 9;
pub const SLASH_METER_REPLENISH_PREFIX: u8 = 10;
pub const CONSUMER_GENESIS_PREFIX: u8 = 11;
pub const INIT_CHAIN_HEIGHT_PREFIX: u8 = 12;
pub const PENDING_VSC_PREFIX: u8 = 13;
pub const LOCK_UNBONDING_ON_TIMEOUT_PREFIX: u8 = 14;
pub const VSC_BLOCK_HEIGHT_PREFIX: u8 = 15;
pub const SLASH_ACKS_PREFIX: u8 = 16;
pub const SLASH_LOG_PREFIX: u8 = 17;
pub const PROPOSED_CHAIN_PREFIX: u8 = 18;
pub const REWARD_DENOM_PREFIX: u8 = 19;
pub const CONSUMER_VALIDATOR_PREFIX: u8 = 20;
pub const CONSUMER_KEY_PREFIX: u8 = 21;
pub const CONSUMER_ADDR_TO_PROVIDER_PREFIX: u8 = 22;
pub const PARAMS_PREFIX: u8 = 23;

// ============================================================================
// SINGLE-VALUE KEYS
// ============================================================================

pub fn port_key() -> Vec<u8> {
    vec![PORT_PREFIX]
}

pub fn valset_update_id_key() -> Vec<u8> {
    vec![VALSET_UPDATE_ID_PREFIX]
}

pub fn slash_meter_key() -> Vec<u8> {
    vec![SLASH_METER_PREFIX]
}

pub fn slash_meter_replenish_key() -> Vec<u8> {
    vec![SLASH_METER_REPLENISH_PREFIX]
}

pub fn params_key() -> Vec<u8> {
    vec![PARAMS_PREFIX]
}

// ============================================================================
// CHAIN-KEYED ENTRIES
// ============================================================================

/// `prefix | chainID`. Iterating the prefix yields chain IDs in lexicographic order.
pub fn chain_key(prefix: u8, chain_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + chain_id.len());
    key.push(prefix);
    key.extend_from_slice(chain_id.as_bytes());
    key
}

/// Recovers the chain ID from a `chain_key`.
pub fn parse_chain_key(prefix: u8, key: &[u8]) -> Result<String> {
    match key.split_first() {
        Some((p, rest)) if *p == prefix => String::from_utf8(rest.to_vec())
            .map_err(|e| ProviderError::corrupted(hex::encode(key), e)),
        _ => Err(ProviderError::corrupted(hex::encode(key), "unexpected key prefix")),
    }
}

pub fn channel_to_chain_key(channel_id: &str) -> Vec<u8> {
    chain_key(CHANNEL_TO_CHAIN_PREFIX, channel_id)
}

pub fn slash_log_key(provider_cons_addr: &[u8]) -> Vec<u8> {
    let mut key = vec![SLASH_LOG_PREFIX];
    key.extend_from_slice(provider_cons_addr);
    key
}

pub fn reward_denom_key(denom: &str) -> Vec<u8> {
    chain_key(REWARD_DENOM_PREFIX, denom)
}

pub fn vsc_block_height_key(valset_update_id: u64) -> Vec<u8> {
    let mut key = vec![VSC_BLOCK_HEIGHT_PREFIX];
    key.extend_from_slice(&valset_update_id.to_be_bytes());
    key
}

pub fn parse_vsc_block_height_key(key: &[u8]) -> Result<u64> {
    parse_u64_after_prefix(VSC_BLOCK_HEIGHT_PREFIX, key)
}

/// `prefix | u64 BE proposalID`, value is the proposed chain ID.
pub fn proposed_chain_key(proposal_id: u64) -> Vec<u8> {
    let mut key = vec![PROPOSED_CHAIN_PREFIX];
    key.extend_from_slice(&proposal_id.to_be_bytes());
    key
}

pub fn parse_proposed_chain_key(key: &[u8]) -> Result<u64> {
    parse_u64_after_prefix(PROPOSED_CHAIN_PREFIX, key)
}

pub fn unbonding_op_key(id: u64) -> Vec<u8> {
    let mut key = vec![UNBONDING_OP_PREFIX];
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn parse_u64_after_prefix(prefix: u8, key: &[u8]) -> Result<u64> {
    if key.len() != 9 || key[0] != prefix {
        return Err(ProviderError::corrupted(hex::encode(key), "expected prefix and 8-byte id"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[1..9]);
    Ok(u64::from_be_bytes(buf))
}

// ============================================================================
// TIME-ORDERED KEYS
// ============================================================================

fn time_to_nanos(time: DateTime<Utc>) -> Result<u64> {
    time.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| ProviderError::InvalidTime(format!("{} is not representable as a store key", time)))
}

/// `prefix | u64 BE nanos | chainID`.
pub fn time_chain_key(prefix: u8, time: DateTime<Utc>, chain_id: &str) -> Result<Vec<u8>> {
    let nanos = time_to_nanos(time)?;
    let mut key = Vec::with_capacity(9 + chain_id.len());
    key.push(prefix);
    key.extend_from_slice(&nanos.to_be_bytes());
    key.extend_from_slice(chain_id.as_bytes());
    Ok(key)
}

/// Recovers `(time, chainID)` from a `time_chain_key`.
pub fn parse_time_chain_key(prefix: u8, key: &[u8]) -> Result<(DateTime<Utc>, String)> {
    if key.len() < 9 || key[0] != prefix {
        return Err(ProviderError::corrupted(hex::encode(key), "malformed time key"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[1..9]);
    let nanos = i64::try_from(u64::from_be_bytes(buf))
        .map_err(|e| ProviderError::corrupted(hex::encode(key), e))?;
    let chain_id = String::from_utf8(key[9..].to_vec())
        .map_err(|e| ProviderError::corrupted(hex::encode(key), e))?;
    Ok((Utc.timestamp_nanos(nanos), chain_id))
}

pub fn pending_create_key(spawn_time: DateTime<Utc>, chain_id: &str) -> Result<Vec<u8>> {
    time_chain_key(PENDING_CREATE_PREFIX, spawn_time, chain_id)
}

pub fn pending_stop_key(stop_time: DateTime<Utc>, chain_id: &str) -> Result<Vec<u8>> {
    time_chain_key(PENDING_STOP_PREFIX, stop_time, chain_id)
}

// ============================================================================
// CHAIN-SCOPED COMPOSITE KEYS
// ============================================================================

/// `prefix | u64 BE len(chainID) | chainID`, the scan range for one chain.
pub fn chain_scope_prefix(prefix: u8, chain_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(9 + chain_id.len());
    key.push(prefix);
    key.extend_from_slice(&(chain_id.len() as u64).to_be_bytes());
    key.extend_from_slice(chain_id.as_bytes());
    key
}

/// `chain_scope_prefix | suffix`.
pub fn chain_scoped_key(prefix: u8, chain_id: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = chain_scope_prefix(prefix, chain_id);
    key.extend_from_slice(suffix);
    key
}

/// Splits a `chain_scoped_key` into `(chainID, suffix)`.
pub fn parse_chain_scoped_key(prefix: u8, key: &[u8]) -> Result<(String, Vec<u8>)> {
    if key.len() < 9 || key[0] != prefix {
        return Err(ProviderError::corrupted(hex::encode(key), "malformed chain-scoped key"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[1..9]);
    let len = usize::try_from(u64::from_be_bytes(buf))
        .map_err(|e| ProviderError::corrupted(hex::encode(key), e))?;
    let end = 9usize
        .checked_add(len)
        .filter(|end| *end <= key.len())
        .ok_or_else(|| ProviderError::corrupted(hex::encode(key), "chain id length out of range"))?;
    let chain_id = String::from_utf8(key[9..end].to_vec())
        .map_err(|e| ProviderError::corrupted(hex::encode(key), e))?;
    Ok((chain_id, key[end..].to_vec()))
}

pub fn unbonding_op_index_key(chain_id: &str, valset_update_id: u64) -> Vec<u8> {
    chain_scoped_key(UNBONDING_OP_INDEX_PREFIX, chain_id, &valset_update_id.to_be_bytes())
}

/// Recovers `(chainID, valsetUpdateID)` from an unbonding-index key.
pub fn parse_unbonding_op_index_key(key: &[u8]) -> Result<(String, u64)> {
    let (chain_id, suffix) = parse_chain_scoped_key(UNBONDING_OP_INDEX_PREFIX, key)?;
    let bytes: [u8; 8] = suffix
        .as_slice()
        .try_into()
        .map_err(|_| ProviderError::corrupted(hex::encode(key), "expected 8-byte valset update id"))?;
    Ok((chain_id, u64::from_be_bytes(bytes)))
}

pub fn consumer_validator_key(chain_id: &str, consumer_cons_addr: &[u8]) -> Vec<u8> {
    chain_scoped_key(CONSUMER_VALIDATOR_PREFIX, chain_id, consumer_cons_addr)
}

pub fn consumer_key_key(chain_id: &str, provider_cons_addr: &[u8]) -> Vec<u8> {
    chain_scoped_key(CONSUMER_KEY_PREFIX, chain_id, provider_cons_addr)
}

pub fn consumer_addr_to_provider_key(chain_id: &str, consumer_cons_addr: &[u8]) -> Vec<u8> {
    chain_scoped_key(CONSUMER_ADDR_TO_PROVIDER_PREFIX, chain_id, consumer_cons_addr)
}
