//! Consumer key assignment
//!
//! A provider validator may validate a consumer chain with a different
//! consensus key. The keeper keeps the provider-to-consumer key mapping, the
//! reverse consumer-address lookup used when slash packets arrive, and the
//! validator set each consumer chain currently knows about. Outgoing validator
//! updates are the difference between that stored set and the next one.

use std::collections::BTreeMap;

use tracing::info;

use super::ProviderKeeper;
use crate::error::{ProviderError, Result};
use crate::store::keys::{
    chain_scope_prefix, consumer_addr_to_provider_key, consumer_key_key, consumer_validator_key,
    parse_chain_scoped_key, CONSUMER_ADDR_TO_PROVIDER_PREFIX, CONSUMER_KEY_PREFIX, CONSUMER_VALIDATOR_PREFIX,
};
use crate::types::msg::{parse_consumer_key, MsgAssignConsumerKey};
use crate::types::{
    AddressPair, ConsensusPubKey, ConsumerConsAddress, ConsumerValidator, ProviderConsAddress, Validator,
    ValidatorUpdate,
};

impl ProviderKeeper {
    // ============================================================================
    // KEY MAPPINGS
    // ============================================================================

    pub fn set_validator_consumer_pub_key(
        &mut self,
        chain_id: &str,
        provider_addr: &ProviderConsAddress,
        key: &ConsensusPubKey,
    ) -> Result<()> {
        self.set_encoded(consumer_key_key(chain_id, provider_addr.as_bytes()), key)
    }

    pub fn get_validator_consumer_pub_key(
        &self,
        chain_id: &str,
        provider_addr: &ProviderConsAddress,
    ) -> Result<Option<ConsensusPubKey>> {
        self.get_decoded(&consumer_key_key(chain_id, provider_addr.as_bytes()))
    }

    /// Assigned keys on `chain_id` as `(provider address, consumer key)`.
    pub fn get_all_validator_consumer_pub_keys(
        &self,
        chain_id: &str,
    ) -> Result<Vec<(ProviderConsAddress, ConsensusPubKey)>> {
        let prefix = chain_scope_prefix(CONSUMER_KEY_PREFIX, chain_id);
        self.store
            .prefix_iter(&prefix)
            .map(|(k, v)| {
                let (_, addr) = parse_chain_scoped_key(CONSUMER_KEY_PREFIX, &k)?;
                let provider_addr = ProviderConsAddress::from_slice(&addr)
                    .map_err(|e| ProviderError::corrupted(hex::encode(&k), e))?;
                Ok((provider_addr, super::decode_value(&k, &v)?))
            })
            .collect()
    }

    pub fn set_validator_by_consumer_addr(
        &mut self,
        chain_id: &str,
        consumer_addr: &ConsumerConsAddress,
        provider_addr: &ProviderConsAddress,
    ) {
        self.store.set(
            consumer_addr_to_provider_key(chain_id, consumer_addr.as_bytes()),
            provider_addr.as_bytes().to_vec(),
        );
    }

    pub fn get_validator_by_consumer_addr(
        &self,
        chain_id: &str,
        consumer_addr: &ConsumerConsAddress,
    ) -> Result<Option<ProviderConsAddress>> {
        let key = consumer_addr_to_provider_key(chain_id, consumer_addr.as_bytes());
        match self.store.get(&key) {
            None => Ok(None),
            Some(bz) => ProviderConsAddress::from_slice(&bz)
                .map(Some)
                .map_err(|e| ProviderError::corrupted(hex::encode(&key), e)),
        }
    }

    /// Provider address behind a consumer address, falling back to the same bytes
    /// when the validator never assigned a key.
    pub fn get_provider_addr_from_consumer_addr(
        &self,
        chain_id: &str,
        consumer_addr: &ConsumerConsAddress,
    ) -> Result<ProviderConsAddress> {
        Ok(self
            .get_validator_by_consumer_addr(chain_id, consumer_addr)?
            .unwrap_or(ProviderConsAddress(consumer_addr.0)))
    }

    /// Key the validator uses on `chain_id`: the assigned one or its provider key.
    pub fn get_consumer_key_or_default(&self, chain_id: &str, validator: &Validator) -> Result<ConsensusPubKey> {
        Ok(self
            .get_validator_consumer_pub_key(chain_id, &validator.cons_address())?
            .unwrap_or(validator.consensus_pubkey))
    }

    /// Provider/consumer address pairs for every assigned key on `chain_id`.
    pub fn get_address_pairs(&self, chain_id: &str) -> Result<Vec<AddressPair>> {
        Ok(self
            .get_all_validator_consumer_pub_keys(chain_id)?
            .into_iter()
            .map(|(provider_address, consumer_key)| AddressPair {
                provider_address,
                consumer_address: ConsumerConsAddress::from_key(&consumer_key),
                consumer_key,
            })
            .collect())
    }

    // ============================================================================
    // ASSIGNMENT
    // ============================================================================

    pub fn handle_msg_assign_consumer_key(&mut self, msg: &MsgAssignConsumerKey) -> Result<()> {
        msg.validate_basic(&self.get_params()?.reserved_chain_ids)?;
        let validator = self
            .staking_keeper
            .get_validator(&msg.provider_addr)
            .ok_or_else(|| ProviderError::ValidatorNotFound(msg.provider_addr.clone()))?;
        let consumer_key = parse_consumer_key(&msg.consumer_key)?;
        self.assign_consumer_key(&msg.chain_id, &validator, consumer_key)
    }

    /// Assigns `consumer_key` to `validator` on `chain_id`.
    ///
    /// The chain must be registered, pending or proposed. A key already used
    /// on that chain by another validator, or used as another validator's
    /// provider key, is rejected. Re-assigning the current key is a no-op.
    pub fn assign_consumer_key(
        &mut self,
        chain_id: &str,
        validator: &Validator,
        consumer_key: ConsensusPubKey,
    ) -> Result<()> {
        if !self
            .get_all_registered_and_proposed_chain_ids()?
            .iter()
            .any(|c| c == chain_id)
        {
            return Err(ProviderError::UnknownConsumerChainId(chain_id.to_string()));
        }

        let provider_addr = validator.cons_address();
        let consumer_addr = ConsumerConsAddress::from_key(&consumer_key);

        if let Some(owner) = self
            .staking_keeper
            .get_validator_by_cons_addr(&ProviderConsAddress(consumer_addr.0))
        {
            if owner.operator_address != validator.operator_address {
                return Err(ProviderError::ConsumerKeyInUse(format!(
                    "{} is the provider key of {}",
                    consumer_addr, owner.operator_address
                )));
            }
        }

        if self.get_validator_consumer_pub_key(chain_id, &provider_addr)? == Some(consumer_key) {
            return Ok(());
        }
        if let Some(owner) = self.get_validator_by_consumer_addr(chain_id, &consumer_addr)? {
            if owner != provider_addr {
                return Err(ProviderError::ConsumerKeyInUse(format!(
                    "{} is assigned to {} on {}",
                    consumer_addr, owner, chain_id
                )));
            }
        }

        self.set_validator_consumer_pub_key(chain_id, &provider_addr, &consumer_key)?;
        self.set_validator_by_consumer_addr(chain_id, &consumer_addr, &provider_addr);

        info!(
            "Validator {} assigned consumer key {} on {}",
            validator.operator_address, consumer_addr, chain_id
        );
        Ok(())
    }

    /// Removes key assignments, reverse lookups and the validator set of `chain_id`.
    pub fn delete_key_assignments(&mut self, chain_id: &str) -> Result<()> {
        for prefix in [CONSUMER_KEY_PREFIX, CONSUMER_ADDR_TO_PROVIDER_PREFIX, CONSUMER_VALIDATOR_PREFIX] {
            let scope = chain_scope_prefix(prefix, chain_id);
            let keys: Vec<Vec<u8>> = self.store.prefix_iter(&scope).map(|(k, _)| k).collect();
            for key in keys {
                self.store.delete(&key);
            }
        }
        Ok(())
    }

    // ============================================================================
    // CONSUMER VALIDATOR SETS
    // ============================================================================

    /// Validator set last sent to `chain_id`, ascending by consumer address.
    pub fn get_consumer_valset(&self, chain_id: &str) -> Result<Vec<ConsumerValidator>> {
        let prefix = chain_scope_prefix(CONSUMER_VALIDATOR_PREFIX, chain_id);
        self.store
            .prefix_iter(&prefix)
            .map(|(k, v)| super::decode_value(&k, &v))
            .collect()
    }

    /// Replaces the stored validator set of `chain_id`.
    pub fn set_consumer_valset(&mut self, chain_id: &str, valset: &[ConsumerValidator]) -> Result<()> {
        let scope = chain_scope_prefix(CONSUMER_VALIDATOR_PREFIX, chain_id);
        let stale: Vec<Vec<u8>> = self.store.prefix_iter(&scope).map(|(k, _)| k).collect();
        for key in stale {
            self.store.delete(&key);
        }
        for validator in valset {
            let addr = ConsumerConsAddress::from_key(&validator.consumer_public_key);
            self.set_encoded(consumer_validator_key(chain_id, addr.as_bytes()), validator)?;
        }
        Ok(())
    }

    /// Validator set `chain_id` should have given the current staking powers
    /// and key assignments.
    pub fn compute_next_consumer_valset(&self, chain_id: &str) -> Result<Vec<ConsumerValidator>> {
        let mut valset = Vec::new();
        for (operator, power) in self.staking_keeper.last_validator_powers() {
            if power <= 0 {
                continue;
            }
            let validator = self
                .staking_keeper
                .get_validator(&operator)
                .ok_or_else(|| ProviderError::ValidatorNotFound(operator.clone()))?;
            valset.push(ConsumerValidator {
                provider_cons_addr: validator.cons_address(),
                consumer_public_key: self.get_consumer_key_or_default(chain_id, &validator)?,
                power,
            });
        }
        Ok(valset)
    }
}

/// Updates turning `current` into `next`: power 0 for keys that left, the new
/// power for keys that joined or changed. Sorted by key.
pub fn diff_consumer_valsets(current: &[ConsumerValidator], next: &[ConsumerValidator]) -> Vec<ValidatorUpdate> {
    let current: BTreeMap<ConsensusPubKey, i64> =
        current.iter().map(|v| (v.consumer_public_key, v.power)).collect();
    let next: BTreeMap<ConsensusPubKey, i64> = next.iter().map(|v| (v.consumer_public_key, v.power)).collect();

    let mut updates: BTreeMap<ConsensusPubKey, i64> = BTreeMap::new();
    for key in current.keys() {
        if !next.contains_key(key) {
            updates.insert(*key, 0);
        }
    }
    for (key, power) in &next {
        if current.get(key) != Some(power) {
            updates.insert(*key, *power);
        }
    }
    updates
        .into_iter()
        .map(|(pub_key, power)| ValidatorUpdate { pub_key, power })
        .collect()
}
