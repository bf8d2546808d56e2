//! VSC packet pipeline
//!
//! At the end of each block the keeper compares every registered consumer's
//! stored validator set with the one implied by current staking powers and
//! key assignments, and queues a VSC packet per chain when something changed.
//! All packets queued in one block share the same valsetUpdateID. Queues are
//! then flushed, oldest first, over each chain's CCV channel. Chains without
//! a channel keep their queue until the handshake completes.

use tracing::{debug, info, warn};

use super::key_assignment::diff_consumer_valsets;
use super::{add_duration, BlockContext, ProviderKeeper};
use crate::error::{ProviderError, Result};
use crate::types::{
    Acknowledgement, ConsumerPacketData, Packet, ProviderEvent, ValidatorSetChangePacketData, PROVIDER_PORT_ID,
};

impl ProviderKeeper {
    // ============================================================================
    // BLOCK HOOKS
    // ============================================================================

    /// Start-of-block processing: slash meter replenishment.
    pub fn begin_block(&mut self, ctx: &BlockContext) -> Result<()> {
        self.check_for_slash_meter_replenishment(ctx)
    }

    /// End-of-block processing.
    ///
    /// Runs due consumer additions and removals, queues this block's VSC
    /// packets and flushes the queues of chains with an open channel.
    pub fn end_block(&mut self, ctx: &BlockContext) -> Result<()> {
        self.begin_pending_consumer_additions(ctx)?;
        self.begin_pending_consumer_removals(ctx)?;
        self.queue_vsc_packets(ctx)?;
        self.send_vsc_packets(ctx)
    }

    // ============================================================================
    // QUEUEING
    // ============================================================================

    /// Queues one VSC packet for every registered chain that has validator
    /// updates, slash acks or unbonding operations waiting on the current
    /// valsetUpdateID. If any packet was queued, the ID is mapped to the block
    /// height and the counter advances.
    pub fn queue_vsc_packets(&mut self, ctx: &BlockContext) -> Result<()> {
        let valset_update_id = self.get_validator_set_update_id()?;
        let mut queued = false;

        for chain_id in self.get_all_registered_consumer_chain_ids()? {
            let current = self.get_consumer_valset(&chain_id)?;
            let next = self.compute_next_consumer_valset(&chain_id)?;
            let updates = diff_consumer_valsets(&current, &next);
            let has_unbonding_ops = !self.get_unbonding_op_index(&chain_id, valset_update_id)?.is_empty();
            let slash_acks = self.get_slash_acks(&chain_id)?;

            if updates.is_empty() && slash_acks.is_empty() && !has_unbonding_ops {
                continue;
            }

            let slash_acks = self.consume_slash_acks(&chain_id)?;
            if !updates.is_empty() {
                self.set_consumer_valset(&chain_id, &next)?;
            }
            let n_updates = updates.len();
            self.append_pending_vsc_packets(
                &chain_id,
                [ValidatorSetChangePacketData::new(updates, valset_update_id, slash_acks)],
            )?;
            queued = true;

            debug!(
                "Queued VSC packet {} for {} with {} updates",
                valset_update_id, chain_id, n_updates
            );
            self.emit(ProviderEvent::VscPacketQueued {
                chain_id,
                valset_update_id,
                updates: n_updates,
            });
        }

        if queued {
            self.set_valset_update_block_height(valset_update_id, ctx.height);
            self.increment_validator_set_update_id()?;
        }
        Ok(())
    }

    // ============================================================================
    // SENDING
    // ============================================================================

    /// Sends the queued packets of every chain with a CCV channel.
    ///
    /// Packets go out in queue order. A send failure keeps that packet and all
    /// later ones queued for the next block.
    pub fn send_vsc_packets(&mut self, ctx: &BlockContext) -> Result<()> {
        let timeout = add_duration(ctx.time, self.get_params()?.ccv_timeout_period)?;

        for binding in self.get_all_channel_to_chains()? {
            let pending = self.get_pending_vsc_packets(&binding.chain_id)?;
            if pending.is_empty() {
                continue;
            }

            let mut sent = 0;
            for packet in &pending {
                match self
                    .channel_keeper
                    .send_packet(PROVIDER_PORT_ID, &binding.channel_id, packet.to_bytes(), timeout)
                {
                    Ok(sequence) => {
                        sent += 1;
                        self.emit(ProviderEvent::VscPacketSent {
                            chain_id: binding.chain_id.clone(),
                            channel_id: binding.channel_id.clone(),
                            valset_update_id: packet.valset_update_id,
                            sequence,
                        });
                    }
                    Err(e) => {
                        warn!(
                            "Failed to send VSC packet {} to {} on {}: {:#}",
                            packet.valset_update_id, binding.chain_id, binding.channel_id, e
                        );
                        break;
                    }
                }
            }

            self.set_pending_vsc_packets(&binding.chain_id, &pending[sent..])?;
            if sent > 0 {
                info!("Sent {} VSC packets to {}", sent, binding.chain_id);
            }
        }
        Ok(())
    }

    // ============================================================================
    // PACKET CALLBACKS
    // ============================================================================

    /// Handles a packet sent by a consumer chain.
    ///
    /// Packets that cannot be attributed to a consumer or decoded get an error
    /// acknowledgement. Errors returned here abort the block.
    pub fn on_recv_packet(&mut self, ctx: &BlockContext, packet: &Packet) -> Result<Acknowledgement> {
        let chain_id = match self.get_channel_to_chain(&packet.destination_channel)? {
            Some(chain_id) => chain_id,
            None => {
                return Ok(Acknowledgement::error(format!(
                    "no consumer chain bound to channel {}",
                    packet.destination_channel
                )))
            }
        };

        let data: ConsumerPacketData = match serde_json::from_slice(&packet.data) {
            Ok(data) => data,
            Err(e) => {
                return Ok(Acknowledgement::error(format!(
                    "cannot decode consumer packet data: {}",
                    e
                )))
            }
        };

        match data {
            ConsumerPacketData::VscMaturedPacket(matured) => {
                self.handle_vsc_matured_packet(&chain_id, &matured)?;
                Ok(Acknowledgement::ok())
            }
            ConsumerPacketData::SlashPacket(slash) => self.handle_slash_packet(ctx, &chain_id, &slash),
        }
    }

    /// Stops the consumer chain when its VSC packet was rejected.
    pub fn on_acknowledgement_packet(&mut self, packet: &Packet, ack: &Acknowledgement) -> Result<()> {
        if let Acknowledgement::Error(reason) = ack {
            let chain_id = self.chain_for_outgoing_packet(packet)?;
            warn!(
                "Consumer {} returned error acknowledgement for packet {}: {}",
                chain_id, packet.sequence, reason
            );
            let lock = self.get_lock_unbonding_on_timeout(&chain_id);
            self.stop_consumer_chain(&chain_id, lock, false)?;
        }
        Ok(())
    }

    /// Stops the consumer chain when a VSC packet timed out.
    pub fn on_timeout_packet(&mut self, packet: &Packet) -> Result<()> {
        let chain_id = self.chain_for_outgoing_packet(packet)?;
        warn!("VSC packet {} to {} timed out", packet.sequence, chain_id);
        let lock = self.get_lock_unbonding_on_timeout(&chain_id);
        self.stop_consumer_chain(&chain_id, lock, false)
    }

    fn chain_for_outgoing_packet(&self, packet: &Packet) -> Result<String> {
        self.get_channel_to_chain(&packet.source_channel)?
            .ok_or_else(|| ProviderError::ChannelNotFound(packet.source_channel.clone()))
    }
}
