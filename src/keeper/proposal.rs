//! Consumer chain lifecycle
//!
//! Addition proposals create a consumer light client and genesis at spawn
//! time; removal proposals tear the chain down at stop time. Proposals whose
//! time has not come yet are kept under time-ordered keys and picked up by
//! `end_block`.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::expected_keepers::{AnyClientState, ChannelState};
use super::{BlockContext, ProviderKeeper};
use crate::error::{ProviderError, Result};
use crate::store::keys::{parse_time_chain_key, PENDING_CREATE_PREFIX, PENDING_STOP_PREFIX};
use crate::types::msg::{
    validate_chain_id, MsgChangeRewardDenoms, MsgConsumerAddition, MsgConsumerModification, MsgConsumerRemoval,
};
use crate::types::{
    ClientState, ConsensusState, ConsumerAdditionProposal, ConsumerGenesisState, ConsumerParams,
    ConsumerRemovalProposal, ConsumerValidator, Height, ProviderEvent, ValidatorUpdate, PROVIDER_PORT_ID,
};

/// Commitment root placed in the initial consumer consensus state.
pub const SENTINEL_ROOT: &[u8] = b"sentinel_root";

/// Revision number encoded in a `{name}-{N}` chain ID, zero otherwise.
pub fn parse_chain_id_revision(chain_id: &str) -> u64 {
    chain_id
        .rsplit_once('-')
        .and_then(|(name, rev)| if name.is_empty() { None } else { rev.parse().ok() })
        .unwrap_or(0)
}

impl ProviderKeeper {
    // ============================================================================
    // GOVERNANCE MESSAGES
    // ============================================================================

    pub fn handle_msg_consumer_addition(&mut self, ctx: &BlockContext, msg: &MsgConsumerAddition) -> Result<()> {
        self.check_authority(&msg.authority)?;
        msg.validate_basic(&self.get_params()?.reserved_chain_ids)?;
        self.handle_consumer_addition_proposal(ctx, &msg.content)
    }

    pub fn handle_msg_consumer_removal(&mut self, ctx: &BlockContext, msg: &MsgConsumerRemoval) -> Result<()> {
        self.check_authority(&msg.authority)?;
        msg.validate_basic(&self.get_params()?.reserved_chain_ids)?;
        self.handle_consumer_removal_proposal(ctx, &msg.content)
    }

    /// Updates the unbonding-lock flag of a pending or registered chain.
    pub fn handle_msg_consumer_modification(&mut self, msg: &MsgConsumerModification) -> Result<()> {
        self.check_authority(&msg.authority)?;
        msg.validate_basic(&self.get_params()?.reserved_chain_ids)?;

        if self.get_consumer_client_id(&msg.chain_id)?.is_some() {
            if msg.lock_unbonding_on_timeout {
                self.set_lock_unbonding_on_timeout(&msg.chain_id);
            } else {
                self.delete_lock_unbonding_on_timeout(&msg.chain_id);
            }
            info!(
                "Consumer {} lock_unbonding_on_timeout set to {}",
                msg.chain_id, msg.lock_unbonding_on_timeout
            );
            return Ok(());
        }

        let pending = self
            .get_all_pending_consumer_addition_props()?
            .into_iter()
            .find(|p| p.chain_id == msg.chain_id);
        match pending {
            Some(mut prop) => {
                prop.lock_unbonding_on_timeout = msg.lock_unbonding_on_timeout;
                self.set_pending_consumer_addition_prop(&prop)
            }
            None => Err(ProviderError::UnknownConsumerChainId(msg.chain_id.clone())),
        }
    }

    pub fn handle_msg_change_reward_denoms(&mut self, msg: &MsgChangeRewardDenoms) -> Result<()> {
        self.check_authority(&msg.authority)?;
        msg.validate_basic()?;

        if let Some(missing) = msg
            .denoms_to_remove
            .iter()
            .find(|d| !self.consumer_reward_denom_exists(d))
        {
            return Err(ProviderError::InvalidRewardDenoms(format!("{} is not registered", missing)));
        }
        for denom in &msg.denoms_to_add {
            self.set_consumer_reward_denom(denom);
        }
        for denom in &msg.denoms_to_remove {
            self.delete_consumer_reward_denom(denom);
        }
        info!(
            "Consumer reward denoms changed: added {:?}, removed {:?}",
            msg.denoms_to_add, msg.denoms_to_remove
        );
        Ok(())
    }

    // ============================================================================
    // GOVERNANCE HOOKS
    // ============================================================================

    /// Tracks the chain of an addition proposal that entered its voting period.
    pub fn after_proposal_submission(&mut self, proposal_id: u64, msg: &MsgConsumerAddition) {
        self.set_proposed_consumer_chain(&msg.content.chain_id, proposal_id);
    }

    /// Stops tracking a proposal whose voting period ended, whatever the outcome.
    pub fn after_proposal_voting_period_ended(&mut self, proposal_id: u64) {
        self.delete_proposed_consumer_chain(proposal_id);
    }

    // ============================================================================
    // ADDITION
    // ============================================================================

    /// Accepts a passed consumer addition proposal.
    ///
    /// Creates the consumer client right away when the spawn time is not in
    /// the future, otherwise stores the proposal until `end_block` reaches it.
    pub fn handle_consumer_addition_proposal(
        &mut self,
        ctx: &BlockContext,
        prop: &ConsumerAdditionProposal,
    ) -> Result<()> {
        validate_chain_id("chain_id", &prop.chain_id, &self.get_params()?.reserved_chain_ids)?;
        if self.get_consumer_client_id(&prop.chain_id)?.is_some() {
            return Err(ProviderError::InvalidConsumerAdditionProposal(format!(
                "consumer chain {} is already registered",
                prop.chain_id
            )));
        }
        if self.has_pending_consumer_addition(&prop.chain_id)? {
            return Err(ProviderError::InvalidConsumerAdditionProposal(format!(
                "consumer chain {} already has a pending addition",
                prop.chain_id
            )));
        }

        if prop.spawn_time <= ctx.time {
            return self.create_consumer_client(ctx, prop);
        }

        self.set_pending_consumer_addition_prop(prop)?;
        debug!("Consumer addition for {} pending until {}", prop.chain_id, prop.spawn_time);
        Ok(())
    }

    fn has_pending_consumer_addition(&self, chain_id: &str) -> Result<bool> {
        Ok(self
            .get_all_pending_consumer_addition_props()?
            .iter()
            .any(|p| p.chain_id == chain_id))
    }

    /// Creates the light client for a consumer chain and stores its genesis.
    ///
    /// With `connection_id` set, the client under that existing connection is
    /// reused and the genesis is marked as a changeover.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Client bound and genesis stored
    /// * `Err(ProviderError::DuplicateConsumerChain)` - The chain already has a client
    /// * `Err(ProviderError::DuplicateChannel)` - The chain already has a CCV channel
    /// * `Err(ProviderError::ClientCreation)` - The client keeper rejected the client
    pub fn create_consumer_client(&mut self, ctx: &BlockContext, prop: &ConsumerAdditionProposal) -> Result<()> {
        let chain_id = prop.chain_id.as_str();
        if let Some(existing) = self.get_consumer_client_id(chain_id)? {
            return Err(ProviderError::DuplicateConsumerChain(format!(
                "{} already bound to client {}",
                chain_id, existing
            )));
        }
        if let Some(channel) = self.get_chain_to_channel(chain_id)? {
            return Err(ProviderError::DuplicateChannel(format!(
                "CCV channel {} already exists for consumer chain {}",
                channel, chain_id
            )));
        }

        let (client_id, genesis, valset) = match &prop.connection_id {
            None => {
                let unbonding = self.staking_keeper.unbonding_time().map_err(ProviderError::Staking)?;
                let mut client_state = self.get_params()?.template_client;
                client_state.chain_id = chain_id.to_string();
                client_state.latest_height = prop.initial_height;
                client_state.trusting_period = unbonding / 2;
                client_state.unbonding_period = unbonding;

                let consensus_state = ConsensusState {
                    timestamp: ctx.time,
                    root: SENTINEL_ROOT.to_vec(),
                    next_validators_hash: ctx.next_validators_hash.clone(),
                };
                let client_id = self
                    .client_keeper
                    .create_client(client_state, consensus_state)
                    .map_err(ProviderError::ClientCreation)?;
                let (genesis, valset) = self.make_consumer_genesis(ctx, prop)?;
                (client_id, genesis, valset)
            }
            Some(connection_id) => {
                let client_id = self.client_for_reused_connection(chain_id, connection_id)?;
                let (genesis, valset) = self.make_consumer_genesis(ctx, prop)?;
                (client_id, genesis, valset)
            }
        };

        self.set_consumer_client_id(chain_id, &client_id);
        self.set_consumer_genesis(chain_id, &genesis)?;
        self.set_consumer_valset(chain_id, &valset)?;
        if prop.lock_unbonding_on_timeout {
            self.set_lock_unbonding_on_timeout(chain_id);
        }

        info!(
            "Consumer client {} created for {} (initial height {}, pre_ccv {})",
            client_id, chain_id, prop.initial_height, genesis.pre_ccv
        );
        self.emit(ProviderEvent::ConsumerClientCreated {
            chain_id: chain_id.to_string(),
            client_id,
            initial_height: prop.initial_height.to_string(),
        });
        Ok(())
    }

    /// Resolves the client under an existing connection and checks that it tracks `chain_id`.
    fn client_for_reused_connection(&self, chain_id: &str, connection_id: &str) -> Result<String> {
        let connection = self
            .connection_keeper
            .get_connection(connection_id)
            .ok_or_else(|| ProviderError::ConnectionNotFound(connection_id.to_string()))?;
        match self.client_keeper.get_client_state(&connection.client_id) {
            Some(AnyClientState::Tendermint(cs)) if cs.chain_id == chain_id => Ok(connection.client_id),
            Some(AnyClientState::Tendermint(cs)) => Err(ProviderError::InvalidConsumerClient(format!(
                "client {} under connection {} tracks {}, expected {}",
                connection.client_id, connection_id, cs.chain_id, chain_id
            ))),
            Some(other) => Err(ProviderError::InvalidClientType(other.client_type().to_string())),
            None => Err(ProviderError::ClientNotFound(connection.client_id)),
        }
    }

    /// Builds the genesis document a consumer imports at launch.
    ///
    /// Returns the genesis together with the consumer validator set it embeds.
    pub fn make_consumer_genesis(
        &self,
        ctx: &BlockContext,
        prop: &ConsumerAdditionProposal,
    ) -> Result<(ConsumerGenesisState, Vec<ConsumerValidator>)> {
        let valset = self.compute_next_consumer_valset(&prop.chain_id)?;
        let initial_val_set: Vec<ValidatorUpdate> = valset
            .iter()
            .map(|v| ValidatorUpdate {
                pub_key: v.consumer_public_key,
                power: v.power,
            })
            .collect();

        let params = ConsumerParams {
            enabled: true,
            blocks_per_distribution_transmission: prop.blocks_per_distribution_transmission,
            distribution_transmission_channel: String::new(),
            provider_fee_pool_addr: self.fee_collector_name.clone(),
            ccv_timeout_period: prop.ccv_timeout_period,
            transfer_timeout_period: prop.transfer_timeout_period,
            consumer_redistribution_fraction: prop.consumer_redistribution_fraction.clone(),
            historical_entries: prop.historical_entries,
            unbonding_period: prop.unbonding_period,
            reward_denoms: Vec::new(),
            provider_reward_denoms: Vec::new(),
        };

        let genesis = match &prop.connection_id {
            Some(connection_id) => {
                let connection = self
                    .connection_keeper
                    .get_connection(connection_id)
                    .ok_or_else(|| ProviderError::ConnectionNotFound(connection_id.clone()))?;
                ConsumerGenesisState {
                    params,
                    provider_client_state: None,
                    provider_consensus_state: None,
                    initial_val_set,
                    new_chain: true,
                    pre_ccv: true,
                    connection_id: connection.counterparty_connection_id,
                }
            }
            None => {
                let (client_state, consensus_state) = self.provider_client_and_consensus(ctx)?;
                ConsumerGenesisState {
                    params,
                    provider_client_state: Some(client_state),
                    provider_consensus_state: Some(consensus_state),
                    initial_val_set,
                    new_chain: true,
                    pre_ccv: false,
                    connection_id: String::new(),
                }
            }
        };
        Ok((genesis, valset))
    }

    fn provider_client_and_consensus(&self, ctx: &BlockContext) -> Result<(ClientState, ConsensusState)> {
        let unbonding = self.staking_keeper.unbonding_time().map_err(ProviderError::Staking)?;
        let height = Height::new(parse_chain_id_revision(&ctx.chain_id), ctx.height);

        let mut client_state = self.get_params()?.template_client;
        client_state.chain_id = ctx.chain_id.clone();
        client_state.latest_height = height;
        client_state.trusting_period = unbonding / 2;
        client_state.unbonding_period = unbonding;

        let consensus_state = self
            .client_keeper
            .get_self_consensus_state(height)
            .map_err(ProviderError::ConsensusState)?;
        Ok((client_state, consensus_state))
    }

    // ============================================================================
    // REMOVAL
    // ============================================================================

    /// Accepts a passed consumer removal proposal.
    ///
    /// Stops the chain right away when the stop time is not in the future,
    /// otherwise stores the proposal until `end_block` reaches it.
    pub fn handle_consumer_removal_proposal(&mut self, ctx: &BlockContext, prop: &ConsumerRemovalProposal) -> Result<()> {
        validate_chain_id("chain_id", &prop.chain_id, &self.get_params()?.reserved_chain_ids)?;
        if self.get_consumer_client_id(&prop.chain_id)?.is_none() {
            return Err(ProviderError::UnknownConsumerChainId(prop.chain_id.clone()));
        }

        if prop.stop_time <= ctx.time {
            return self.stop_consumer_chain(&prop.chain_id, false, true);
        }

        self.set_pending_consumer_removal_prop(prop)?;
        debug!("Consumer removal for {} pending until {}", prop.chain_id, prop.stop_time);
        Ok(())
    }

    /// Removes all provider state for `chain_id`.
    ///
    /// The channel, if any, is optionally closed and then has close initiated.
    /// Unless `lock_ubd` is set, every unbonding operation waiting on the chain
    /// is released. Calling it again for a stopped chain only repeats the
    /// release, which finds nothing left to do.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - State removed and unbonding operations released
    /// * `Err(ProviderError::Staking)` - Releasing an operation failed; the call can be retried
    pub fn stop_consumer_chain(&mut self, chain_id: &str, lock_ubd: bool, close_chan: bool) -> Result<()> {
        self.delete_consumer_client_id(chain_id);
        self.delete_lock_unbonding_on_timeout(chain_id);
        self.delete_consumer_genesis(chain_id);

        if let Some(channel_id) = self.get_chain_to_channel(chain_id)? {
            if close_chan {
                self.close_channel(&channel_id);
            }
            if let Err(e) = self.channel_keeper.chan_close_init(PROVIDER_PORT_ID, &channel_id) {
                debug!("Channel {} close init for {}: {:#}", channel_id, chain_id, e);
            }
            self.delete_chain_to_channel(chain_id);
            self.delete_channel_to_chain(&channel_id);
        }

        self.delete_init_chain_height(chain_id);
        self.delete_slash_acks(chain_id);
        self.delete_pending_vsc_packets(chain_id);
        self.delete_key_assignments(chain_id)?;

        if !lock_ubd {
            let completed = self.release_unbonding_ops(chain_id, None)?;
            debug!("Released {} unbonding ops held by {}", completed, chain_id);
        }

        info!("Consumer chain {} stopped (lock_ubd {}, close_chan {})", chain_id, lock_ubd, close_chan);
        self.emit(ProviderEvent::ConsumerChainStopped {
            chain_id: chain_id.to_string(),
        });
        Ok(())
    }

    /// Starts closing `channel_id` unless it is missing or already closed.
    pub fn close_channel(&self, channel_id: &str) {
        match self.channel_keeper.get_channel(PROVIDER_PORT_ID, channel_id) {
            Some(channel) if channel.state != ChannelState::Closed => {
                if let Err(e) = self.channel_keeper.chan_close_init(PROVIDER_PORT_ID, channel_id) {
                    warn!("Failed to close channel {}: {:#}", channel_id, e);
                }
            }
            _ => {}
        }
    }

    // ============================================================================
    // PENDING PROPOSAL TICKS
    // ============================================================================

    /// Collects the `(key, value)` pairs under `prefix` whose time is not after `now`.
    ///
    /// Stops at the first entry in the future.
    fn due_entries(&self, prefix: u8, now: DateTime<Utc>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut due = Vec::new();
        for (k, v) in self.store.prefix_iter(&[prefix]) {
            let (time, _) = parse_time_chain_key(prefix, &k)?;
            if time > now {
                break;
            }
            due.push((k, v));
        }
        Ok(due)
    }

    /// Creates clients for every pending addition whose spawn time has passed.
    ///
    /// A proposal for a chain that already has a client, or that fails with a
    /// non-fatal error, is logged and dropped.
    pub fn begin_pending_consumer_additions(&mut self, ctx: &BlockContext) -> Result<()> {
        for (key, value) in self.due_entries(PENDING_CREATE_PREFIX, ctx.time)? {
            let prop: ConsumerAdditionProposal = super::decode_value(&key, &value)?;
            self.store.delete(&key);
            if let Some(client_id) = self.get_consumer_client_id(&prop.chain_id)? {
                warn!(
                    "Dropping consumer addition for {}: already bound to client {}",
                    prop.chain_id, client_id
                );
                continue;
            }
            match self.create_consumer_client(ctx, &prop) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Dropping consumer addition for {}: {}", prop.chain_id, e),
            }
        }
        Ok(())
    }

    /// Stops every chain whose pending removal has reached its stop time.
    ///
    /// The pending entry is removed only after the chain stopped. A stop that
    /// fails with a non-fatal error keeps its entry and is retried in the next
    /// block; the remaining entries are still processed.
    pub fn begin_pending_consumer_removals(&mut self, ctx: &BlockContext) -> Result<()> {
        for (key, value) in self.due_entries(PENDING_STOP_PREFIX, ctx.time)? {
            let prop: ConsumerRemovalProposal = super::decode_value(&key, &value)?;
            match self.stop_consumer_chain(&prop.chain_id, false, true) {
                Ok(()) => self.store.delete(&key),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Consumer removal for {} failed, retrying next block: {}", prop.chain_id, e),
            }
        }
        Ok(())
    }
}
