//! Typed store accessors
//!
//! Thin getters and setters over the key layout in `store::keys`. Values
//! written here are read back by the lifecycle, relay and query code; a value
//! that fails to decode is reported as `ProviderError::CorruptedStore`.

use chrono::{DateTime, Utc};

use super::{decode_value, ProviderKeeper};
use crate::error::{ProviderError, Result};
use crate::store::keys::*;
use crate::store::KvStore;
use crate::types::{
    ChainStatus, ChannelToChain, ConsumerAdditionProposal, ConsumerGenesisState, ConsumerRemovalProposal,
    ProposedChain, ProviderConsAddress, ValidatorSetChangePacketData, ValsetUpdateIdToHeight,
};

impl ProviderKeeper {
    /// Raw store access.
    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        self.store.as_mut()
    }

    // ============================================================================
    // PORT
    // ============================================================================

    pub fn set_port(&mut self, port_id: &str) {
        self.store.set(port_key(), port_id.as_bytes().to_vec());
    }

    pub fn get_port(&self) -> Result<Option<String>> {
        self.get_string(&port_key())
    }

    pub fn is_bound(&self, port_id: &str) -> Result<bool> {
        Ok(self.get_port()?.as_deref() == Some(port_id))
    }

    // ============================================================================
    // CHAIN <-> CHANNEL
    // ============================================================================

    pub fn set_chain_to_channel(&mut self, chain_id: &str, channel_id: &str) {
        self.store
            .set(chain_key(CHAIN_TO_CHANNEL_PREFIX, chain_id), channel_id.as_bytes().to_vec());
    }

    pub fn get_chain_to_channel(&self, chain_id: &str) -> Result<Option<String>> {
        self.get_string(&chain_key(CHAIN_TO_CHANNEL_PREFIX, chain_id))
    }

    pub fn delete_chain_to_channel(&mut self, chain_id: &str) {
        self.store.delete(&chain_key(CHAIN_TO_CHANNEL_PREFIX, chain_id));
    }

    pub fn set_channel_to_chain(&mut self, channel_id: &str, chain_id: &str) {
        self.store.set(channel_to_chain_key(channel_id), chain_id.as_bytes().to_vec());
    }

    pub fn get_channel_to_chain(&self, channel_id: &str) -> Result<Option<String>> {
        self.get_string(&channel_to_chain_key(channel_id))
    }

    pub fn delete_channel_to_chain(&mut self, channel_id: &str) {
        self.store.delete(&channel_to_chain_key(channel_id));
    }

    /// All CCV channels, in ascending channel ID order.
    pub fn get_all_channel_to_chains(&self) -> Result<Vec<ChannelToChain>> {
        self.store
            .prefix_iter(&[CHANNEL_TO_CHAIN_PREFIX])
            .map(|(k, v)| {
                let channel_id = parse_chain_key(CHANNEL_TO_CHAIN_PREFIX, &k)?;
                let chain_id = String::from_utf8(v)
                    .map_err(|e| ProviderError::corrupted(hex::encode(&k), e))?;
                Ok(ChannelToChain { channel_id, chain_id })
            })
            .collect()
    }

    // ============================================================================
    // CONSUMER CLIENTS
    // ============================================================================

    pub fn set_consumer_client_id(&mut self, chain_id: &str, client_id: &str) {
        self.store
            .set(chain_key(CHAIN_TO_CLIENT_PREFIX, chain_id), client_id.as_bytes().to_vec());
    }

    pub fn get_consumer_client_id(&self, chain_id: &str) -> Result<Option<String>> {
        self.get_string(&chain_key(CHAIN_TO_CLIENT_PREFIX, chain_id))
    }

    pub fn delete_consumer_client_id(&mut self, chain_id: &str) {
        self.store.delete(&chain_key(CHAIN_TO_CLIENT_PREFIX, chain_id));
    }

    /// Chain IDs with a consumer client, in ascending lexicographic order.
    pub fn get_all_registered_consumer_chain_ids(&self) -> Result<Vec<String>> {
        self.store
            .prefix_iter(&[CHAIN_TO_CLIENT_PREFIX])
            .map(|(k, _)| parse_chain_key(CHAIN_TO_CLIENT_PREFIX, &k))
            .collect()
    }

    // ============================================================================
    // PROPOSED CHAINS
    // ============================================================================

    /// Records a chain whose addition proposal is in its voting period.
    pub fn set_proposed_consumer_chain(&mut self, chain_id: &str, proposal_id: u64) {
        self.store
            .set(proposed_chain_key(proposal_id), chain_id.as_bytes().to_vec());
    }

    pub fn get_proposed_consumer_chain(&self, proposal_id: u64) -> Result<Option<String>> {
        self.get_string(&proposed_chain_key(proposal_id))
    }

    pub fn delete_proposed_consumer_chain(&mut self, proposal_id: u64) {
        self.store.delete(&proposed_chain_key(proposal_id));
    }

    /// Proposed chains in ascending proposal ID order.
    pub fn get_all_proposed_consumer_chain_ids(&self) -> Result<Vec<ProposedChain>> {
        self.store
            .prefix_iter(&[PROPOSED_CHAIN_PREFIX])
            .map(|(k, v)| {
                let proposal_id = parse_proposed_chain_key(&k)?;
                let chain_id = String::from_utf8(v)
                    .map_err(|e| ProviderError::corrupted(hex::encode(&k), e))?;
                Ok(ProposedChain { chain_id, proposal_id })
            })
            .collect()
    }

    // ============================================================================
    // PENDING ADDITIONS AND REMOVALS
    // ============================================================================

    pub fn set_pending_consumer_addition_prop(&mut self, prop: &ConsumerAdditionProposal) -> Result<()> {
        let key = pending_create_key(prop.spawn_time, &prop.chain_id)?;
        self.set_encoded(key, prop)
    }

    pub fn get_pending_consumer_addition_prop(
        &self,
        spawn_time: DateTime<Utc>,
        chain_id: &str,
    ) -> Result<Option<ConsumerAdditionProposal>> {
        self.get_decoded(&pending_create_key(spawn_time, chain_id)?)
    }

    pub fn delete_pending_consumer_addition_prop(&mut self, spawn_time: DateTime<Utc>, chain_id: &str) -> Result<()> {
        let key = pending_create_key(spawn_time, chain_id)?;
        self.store.delete(&key);
        Ok(())
    }

    /// Pending additions in ascending `(spawn time, chain ID)` order.
    pub fn get_all_pending_consumer_addition_props(&self) -> Result<Vec<ConsumerAdditionProposal>> {
        self.store
            .prefix_iter(&[PENDING_CREATE_PREFIX])
            .map(|(k, v)| decode_value(&k, &v))
            .collect()
    }

    pub fn get_all_pending_consumer_chain_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .get_all_pending_consumer_addition_props()?
            .into_iter()
            .map(|p| p.chain_id)
            .collect())
    }

    pub fn set_pending_consumer_removal_prop(&mut self, prop: &ConsumerRemovalProposal) -> Result<()> {
        let key = pending_stop_key(prop.stop_time, &prop.chain_id)?;
        self.set_encoded(key, prop)
    }

    pub fn get_pending_consumer_removal_prop(
        &self,
        stop_time: DateTime<Utc>,
        chain_id: &str,
    ) -> Result<Option<ConsumerRemovalProposal>> {
        self.get_decoded(&pending_stop_key(stop_time, chain_id)?)
    }

    pub fn delete_pending_consumer_removal_prop(&mut self, stop_time: DateTime<Utc>, chain_id: &str) -> Result<()> {
        let key = pending_stop_key(stop_time, chain_id)?;
        self.store.delete(&key);
        Ok(())
    }

    /// Pending removals in ascending `(stop time, chain ID)` order.
    pub fn get_all_pending_consumer_removal_props(&self) -> Result<Vec<ConsumerRemovalProposal>> {
        self.store
            .prefix_iter(&[PENDING_STOP_PREFIX])
            .map(|(k, v)| decode_value(&k, &v))
            .collect()
    }

    // ============================================================================
    // CONSUMER GENESIS
    // ============================================================================

    pub fn set_consumer_genesis(&mut self, chain_id: &str, gen: &ConsumerGenesisState) -> Result<()> {
        self.set_encoded(chain_key(CONSUMER_GENESIS_PREFIX, chain_id), gen)
    }

    pub fn get_consumer_genesis(&self, chain_id: &str) -> Result<Option<ConsumerGenesisState>> {
        self.get_decoded(&chain_key(CONSUMER_GENESIS_PREFIX, chain_id))
    }

    pub fn delete_consumer_genesis(&mut self, chain_id: &str) {
        self.store.delete(&chain_key(CONSUMER_GENESIS_PREFIX, chain_id));
    }

    // ============================================================================
    // LOCK UNBONDING ON TIMEOUT
    // ============================================================================

    pub fn set_lock_unbonding_on_timeout(&mut self, chain_id: &str) {
        self.store
            .set(chain_key(LOCK_UNBONDING_ON_TIMEOUT_PREFIX, chain_id), vec![1]);
    }

    pub fn get_lock_unbonding_on_timeout(&self, chain_id: &str) -> bool {
        self.store
            .has(&chain_key(LOCK_UNBONDING_ON_TIMEOUT_PREFIX, chain_id))
    }

    pub fn delete_lock_unbonding_on_timeout(&mut self, chain_id: &str) {
        self.store
            .delete(&chain_key(LOCK_UNBONDING_ON_TIMEOUT_PREFIX, chain_id));
    }

    // ============================================================================
    // VALSET UPDATE ID
    // ============================================================================

    pub fn set_validator_set_update_id(&mut self, id: u64) {
        self.set_u64(valset_update_id_key(), id);
    }

    /// Current valset update ID; zero before genesis.
    pub fn get_validator_set_update_id(&self) -> Result<u64> {
        Ok(self.get_u64(&valset_update_id_key())?.unwrap_or(0))
    }

    pub fn increment_validator_set_update_id(&mut self) -> Result<u64> {
        let next = self.get_validator_set_update_id()? + 1;
        self.set_validator_set_update_id(next);
        Ok(next)
    }

    pub fn set_valset_update_block_height(&mut self, valset_update_id: u64, height: u64) {
        self.set_u64(vsc_block_height_key(valset_update_id), height);
    }

    pub fn get_valset_update_block_height(&self, valset_update_id: u64) -> Result<Option<u64>> {
        self.get_u64(&vsc_block_height_key(valset_update_id))
    }

    pub fn delete_valset_update_block_height(&mut self, valset_update_id: u64) {
        self.store.delete(&vsc_block_height_key(valset_update_id));
    }

    /// All recorded `(valset update ID, height)` pairs, ascending by ID.
    pub fn get_all_valset_update_block_heights(&self) -> Result<Vec<ValsetUpdateIdToHeight>> {
        self.store
            .prefix_iter(&[VSC_BLOCK_HEIGHT_PREFIX])
            .map(|(k, v)| {
                let valset_update_id = parse_vsc_block_height_key(&k)?;
                let arr: [u8; 8] = v
                    .as_slice()
                    .try_into()
                    .map_err(|_| ProviderError::corrupted(hex::encode(&k), "expected 8 bytes"))?;
                Ok(ValsetUpdateIdToHeight {
                    valset_update_id,
                    height: u64::from_be_bytes(arr),
                })
            })
            .collect()
    }

    // ============================================================================
    // SLASH ACKS AND SLASH LOG
    // ============================================================================

    pub fn set_slash_acks(&mut self, chain_id: &str, acks: &[String]) -> Result<()> {
        self.set_encoded(chain_key(SLASH_ACKS_PREFIX, chain_id), &acks.to_vec())
    }

    pub fn get_slash_acks(&self, chain_id: &str) -> Result<Vec<String>> {
        Ok(self
            .get_decoded(&chain_key(SLASH_ACKS_PREFIX, chain_id))?
            .unwrap_or_default())
    }

    /// Returns and removes the slash acks for `chain_id`.
    pub fn consume_slash_acks(&mut self, chain_id: &str) -> Result<Vec<String>> {
        let acks = self.get_slash_acks(chain_id)?;
        if !acks.is_empty() {
            self.delete_slash_acks(chain_id);
        }
        Ok(acks)
    }

    pub fn delete_slash_acks(&mut self, chain_id: &str) {
        self.store.delete(&chain_key(SLASH_ACKS_PREFIX, chain_id));
    }

    pub fn append_slash_ack(&mut self, chain_id: &str, ack: String) -> Result<()> {
        let mut acks = self.get_slash_acks(chain_id)?;
        acks.push(ack);
        self.set_slash_acks(chain_id, &acks)
    }

    /// Marks a validator as having double signed on some consumer chain. Never cleared.
    pub fn set_slash_log(&mut self, provider_addr: &ProviderConsAddress) {
        self.store.set(slash_log_key(provider_addr.as_bytes()), vec![1]);
    }

    pub fn get_slash_log(&self, provider_addr: &ProviderConsAddress) -> bool {
        self.store.has(&slash_log_key(provider_addr.as_bytes()))
    }

    // ============================================================================
    // INIT CHAIN HEIGHT
    // ============================================================================

    pub fn set_init_chain_height(&mut self, chain_id: &str, height: u64) {
        self.set_u64(chain_key(INIT_CHAIN_HEIGHT_PREFIX, chain_id), height);
    }

    pub fn get_init_chain_height(&self, chain_id: &str) -> Result<Option<u64>> {
        self.get_u64(&chain_key(INIT_CHAIN_HEIGHT_PREFIX, chain_id))
    }

    pub fn delete_init_chain_height(&mut self, chain_id: &str) {
        self.store.delete(&chain_key(INIT_CHAIN_HEIGHT_PREFIX, chain_id));
    }

    // ============================================================================
    // PENDING VSC PACKETS
    // ============================================================================

    /// Queued packets for `chain_id`, oldest first.
    pub fn get_pending_vsc_packets(&self, chain_id: &str) -> Result<Vec<ValidatorSetChangePacketData>> {
        Ok(self
            .get_decoded(&chain_key(PENDING_VSC_PREFIX, chain_id))?
            .unwrap_or_default())
    }

    pub fn append_pending_vsc_packets(
        &mut self,
        chain_id: &str,
        packets: impl IntoIterator<Item = ValidatorSetChangePacketData>,
    ) -> Result<()> {
        let mut queue = self.get_pending_vsc_packets(chain_id)?;
        queue.extend(packets);
        self.set_pending_vsc_packets(chain_id, &queue)
    }

    pub(crate) fn set_pending_vsc_packets(
        &mut self,
        chain_id: &str,
        packets: &[ValidatorSetChangePacketData],
    ) -> Result<()> {
        if packets.is_empty() {
            self.delete_pending_vsc_packets(chain_id);
            return Ok(());
        }
        self.set_encoded(chain_key(PENDING_VSC_PREFIX, chain_id), &packets.to_vec())
    }

    pub fn delete_pending_vsc_packets(&mut self, chain_id: &str) {
        self.store.delete(&chain_key(PENDING_VSC_PREFIX, chain_id));
    }

    // ============================================================================
    // REWARD DENOMS
    // ============================================================================

    pub fn set_consumer_reward_denom(&mut self, denom: &str) {
        self.store.set(reward_denom_key(denom), vec![1]);
    }

    pub fn consumer_reward_denom_exists(&self, denom: &str) -> bool {
        self.store.has(&reward_denom_key(denom))
    }

    pub fn delete_consumer_reward_denom(&mut self, denom: &str) {
        self.store.delete(&reward_denom_key(denom));
    }

    /// Registered reward denoms in ascending order.
    pub fn get_all_consumer_reward_denoms(&self) -> Result<Vec<String>> {
        self.store
            .prefix_iter(&[REWARD_DENOM_PREFIX])
            .map(|(k, _)| parse_chain_key(REWARD_DENOM_PREFIX, &k))
            .collect()
    }

    // ============================================================================
    // CHAIN VIEWS
    // ============================================================================

    /// Registered chains, then proposed chains, then pending chains.
    pub fn get_all_registered_and_proposed_chain_ids(&self) -> Result<Vec<String>> {
        let mut chains = self.get_all_registered_consumer_chain_ids()?;
        chains.extend(
            self.get_all_proposed_consumer_chain_ids()?
                .into_iter()
                .map(|p| p.chain_id),
        );
        chains.extend(self.get_all_pending_consumer_chain_ids()?);
        Ok(chains)
    }

    /// Lifecycle position of `chain_id`, or `None` if the provider holds no state for it.
    pub fn get_consumer_chain_status(&self, chain_id: &str) -> Result<Option<ChainStatus>> {
        if self.get_chain_to_channel(chain_id)?.is_some() {
            return Ok(Some(ChainStatus::Active));
        }
        if self.get_consumer_client_id(chain_id)?.is_some() {
            return Ok(Some(ChainStatus::Registered));
        }
        if self
            .get_all_pending_consumer_addition_props()?
            .iter()
            .any(|p| p.chain_id == chain_id)
        {
            return Ok(Some(ChainStatus::Pending));
        }
        if self
            .get_all_proposed_consumer_chain_ids()?
            .iter()
            .any(|p| p.chain_id == chain_id)
        {
            return Ok(Some(ChainStatus::Proposed));
        }
        Ok(None)
    }
}
