//! Provider Keeper
//!
//! The keeper owns the provider store and the handles to its collaborators.
//! All state transitions run synchronously inside one block, driven by
//! `begin_block`, `end_block`, governance messages and IBC callbacks.
//!
//! Functionality is split across submodules that each add an `impl` block:
//! - `accessors`: typed store getters and setters
//! - `proposal`: consumer addition and removal, client creation and teardown
//! - `handshake`: channel handshake verification and callbacks
//! - `relay`: VSC packet pipeline and packet callbacks
//! - `unbonding`: unbonding operation tracking and release
//! - `throttle`: slash meter and slash packet handling
//! - `key_assignment`: per-consumer consensus keys and consumer validator sets
//! - `query`: read-only query surface
//! - `genesis`: module parameters and initial state

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::error::{ProviderError, Result};
use crate::store::KvStore;
use crate::types::ProviderEvent;

pub mod accessors;
pub mod expected_keepers;
pub mod genesis;
pub mod handshake;
pub mod key_assignment;
pub mod proposal;
pub mod query;
pub mod relay;
pub mod throttle;
pub mod unbonding;

use expected_keepers::{ChannelKeeper, ClientKeeper, ConnectionKeeper, SlashingKeeper, StakingKeeper};

// ============================================================================
// BLOCK CONTEXT
// ============================================================================

/// Header data of the block currently being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub chain_id: String,
    pub height: u64,
    pub time: DateTime<Utc>,
    pub next_validators_hash: Vec<u8>,
}

impl BlockContext {
    pub fn new(chain_id: impl Into<String>, height: u64, time: DateTime<Utc>) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
            next_validators_hash: Vec::new(),
        }
    }
}

// ============================================================================
// KEEPER CONSTRUCTION
// ============================================================================

/// Collaborators handed to `ProviderKeeper::new`. Every field is required.
#[derive(Default)]
pub struct KeeperDeps {
    pub authority: Option<String>,
    pub fee_collector_name: Option<String>,
    pub store: Option<Box<dyn KvStore>>,
    pub client_keeper: Option<Arc<dyn ClientKeeper>>,
    pub connection_keeper: Option<Arc<dyn ConnectionKeeper>>,
    pub channel_keeper: Option<Arc<dyn ChannelKeeper>>,
    pub staking_keeper: Option<Arc<dyn StakingKeeper>>,
    pub slashing_keeper: Option<Arc<dyn SlashingKeeper>>,
}

pub struct ProviderKeeper {
    authority: String,
    fee_collector_name: String,
    store: Box<dyn KvStore>,
    client_keeper: Arc<dyn ClientKeeper>,
    connection_keeper: Arc<dyn ConnectionKeeper>,
    channel_keeper: Arc<dyn ChannelKeeper>,
    staking_keeper: Arc<dyn StakingKeeper>,
    slashing_keeper: Arc<dyn SlashingKeeper>,
    events: Vec<ProviderEvent>,
}

impl ProviderKeeper {
    /// Builds a keeper, failing if any collaborator was left unset.
    ///
    /// # Arguments
    ///
    /// * `deps` - Store, authority and collaborator handles
    ///
    /// # Returns
    ///
    /// * `Ok(ProviderKeeper)` - Fully wired keeper
    /// * `Err(ProviderError::MissingDependency)` - A required field was `None` or empty
    pub fn new(deps: KeeperDeps) -> Result<Self> {
        let authority = deps
            .authority
            .filter(|a| !a.is_empty())
            .ok_or(ProviderError::MissingDependency("authority"))?;
        let fee_collector_name = deps
            .fee_collector_name
            .filter(|f| !f.is_empty())
            .ok_or(ProviderError::MissingDependency("fee_collector_name"))?;
        Ok(Self {
            authority,
            fee_collector_name,
            store: deps.store.ok_or(ProviderError::MissingDependency("store"))?,
            client_keeper: deps.client_keeper.ok_or(ProviderError::MissingDependency("client_keeper"))?,
            connection_keeper: deps
                .connection_keeper
                .ok_or(ProviderError::MissingDependency("connection_keeper"))?,
            channel_keeper: deps.channel_keeper.ok_or(ProviderError::MissingDependency("channel_keeper"))?,
            staking_keeper: deps.staking_keeper.ok_or(ProviderError::MissingDependency("staking_keeper"))?,
            slashing_keeper: deps
                .slashing_keeper
                .ok_or(ProviderError::MissingDependency("slashing_keeper"))?,
            events: Vec::new(),
        })
    }

    /// Governance account allowed to submit proposal messages.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn fee_collector_name(&self) -> &str {
        &self.fee_collector_name
    }

    /// Drains the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: ProviderEvent) {
        self.events.push(event);
    }

    pub(crate) fn check_authority(&self, got: &str) -> Result<()> {
        if got != self.authority {
            return Err(ProviderError::InvalidAuthority {
                expected: self.authority.clone(),
                got: got.to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------ encoding helpers ------------------------------

    pub(crate) fn get_decoded<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.store.get(key) {
            None => Ok(None),
            Some(bz) => decode_value(key, &bz).map(Some),
        }
    }

    pub(crate) fn set_encoded<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<()> {
        let bz = bcs::to_bytes(value).map_err(|e| ProviderError::StoreEncoding {
            key: hex::encode(&key),
            reason: e.to_string(),
        })?;
        self.store.set(key, bz);
        Ok(())
    }

    pub(crate) fn get_string(&self, key: &[u8]) -> Result<Option<String>> {
        match self.store.get(key) {
            None => Ok(None),
            Some(bz) => String::from_utf8(bz).map(Some).map_err(|e| {
                error!("Corrupted string value under key {}: {}", hex::encode(key), e);
                ProviderError::corrupted(hex::encode(key), e)
            }),
        }
    }

    pub(crate) fn get_u64(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.store.get(key) {
            None => Ok(None),
            Some(bz) => {
                let arr: [u8; 8] = bz.as_slice().try_into().map_err(|_| {
                    error!("Corrupted u64 value under key {}", hex::encode(key));
                    ProviderError::corrupted(hex::encode(key), "expected 8 bytes")
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
        }
    }

    pub(crate) fn set_u64(&mut self, key: Vec<u8>, value: u64) {
        self.store.set(key, value.to_be_bytes().to_vec());
    }
}

/// `time + duration`, failing when the result leaves chrono's range.
pub(crate) fn add_duration(time: DateTime<Utc>, duration: std::time::Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| time.checked_add_signed(d))
        .ok_or_else(|| ProviderError::InvalidTime(format!("{} + {:?} is out of range", time, duration)))
}

/// Decodes a bcs store value. A failure means the store is corrupted.
pub(crate) fn decode_value<T: DeserializeOwned>(key: &[u8], bz: &[u8]) -> Result<T> {
    bcs::from_bytes(bz).map_err(|e| {
        error!("Corrupted store value under key {}: {}", hex::encode(key), e);
        ProviderError::corrupted(hex::encode(key), e)
    })
}
