//! Slash packet throttling
//!
//! A single slash meter, shared by all consumer chains, bounds how much voting
//! power can be jailed per replenish period. Downtime slash packets spend the
//! jailed validator's power; while the meter is negative further slash
//! packets are bounced back to the consumer, which retries them later.
//!
//! Double-sign packets only mark the validator in the slash log.

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use super::{add_duration, BlockContext, ProviderKeeper};
use crate::error::{ProviderError, Result};
use crate::store::keys::{slash_meter_key, slash_meter_replenish_key};
use crate::types::{
    Acknowledgement, DecimalFraction, Infraction, ProviderConsAddress, ProviderEvent, SlashPacketData,
    ThrottleState,
};

impl ProviderKeeper {
    // ============================================================================
    // SLASH METER
    // ============================================================================

    /// Current meter value. Zero before the meter was initialized.
    pub fn get_slash_meter(&self) -> Result<i64> {
        Ok(self.get_decoded(&slash_meter_key())?.unwrap_or(0))
    }

    pub fn set_slash_meter(&mut self, value: i64) -> Result<()> {
        self.set_encoded(slash_meter_key(), &value)
    }

    pub fn get_slash_meter_replenish_time_candidate(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_decoded(&slash_meter_replenish_key())
    }

    pub fn set_slash_meter_replenish_time_candidate(&mut self, time: DateTime<Utc>) -> Result<()> {
        self.set_encoded(slash_meter_replenish_key(), &time)
    }

    /// Power replenished per period: `fraction * total power`, at least 1.
    pub fn get_slash_meter_allowance(&self) -> Result<i64> {
        let fraction = DecimalFraction::parse(&self.get_params()?.slash_meter_replenish_fraction)
            .map_err(ProviderError::InvalidParams)?;
        let allowance = fraction.mul_floor(self.staking_keeper.last_total_power());
        Ok(allowance.max(1))
    }

    /// Fills the meter to its allowance and schedules the next replenishment.
    pub fn initialize_slash_meter(&mut self, ctx: &BlockContext) -> Result<()> {
        let allowance = self.get_slash_meter_allowance()?;
        self.set_slash_meter(allowance)?;
        let period = self.get_params()?.slash_meter_replenish_period;
        self.set_slash_meter_replenish_time_candidate(add_duration(ctx.time, period)?)
    }

    /// Replenishes the meter once the candidate time has passed.
    ///
    /// The meter never exceeds the allowance; a meter above a shrunken
    /// allowance is clamped every block.
    pub fn check_for_slash_meter_replenishment(&mut self, ctx: &BlockContext) -> Result<()> {
        let candidate = match self.get_slash_meter_replenish_time_candidate()? {
            Some(candidate) => candidate,
            None => return self.initialize_slash_meter(ctx),
        };

        let allowance = self.get_slash_meter_allowance()?;
        let meter = self.get_slash_meter()?;

        if ctx.time >= candidate {
            let replenished = meter.saturating_add(allowance).min(allowance);
            self.set_slash_meter(replenished)?;
            let next = add_duration(ctx.time, self.get_params()?.slash_meter_replenish_period)?;
            self.set_slash_meter_replenish_time_candidate(next)?;

            debug!("Slash meter replenished from {} to {}, next at {}", meter, replenished, next);
            self.emit(ProviderEvent::SlashMeterReplenished {
                slash_meter: replenished,
                allowance,
                next_replenish_candidate: next,
            });
        } else if meter > allowance {
            self.set_slash_meter(allowance)?;
        }
        Ok(())
    }

    pub fn get_throttle_state(&self) -> Result<ThrottleState> {
        Ok(ThrottleState {
            slash_meter: self.get_slash_meter()?,
            slash_meter_allowance: self.get_slash_meter_allowance()?,
            next_replenish_candidate: self
                .get_slash_meter_replenish_time_candidate()?
                .unwrap_or_else(|| Utc.timestamp_nanos(0)),
        })
    }

    // ============================================================================
    // SLASH PACKETS
    // ============================================================================

    /// Handles a slash packet received from `chain_id`.
    ///
    /// # Returns
    ///
    /// * `Ok(Acknowledgement::Error)` - The valsetUpdateID maps to no known height
    /// * `Ok(Acknowledgement::Result([2]))` - Bounced, the slash meter is negative
    /// * `Ok(Acknowledgement::Result([1]))` - Handled
    /// * `Err(_)` - Store corruption or slashing collaborator failure
    pub fn handle_slash_packet(
        &mut self,
        ctx: &BlockContext,
        chain_id: &str,
        data: &SlashPacketData,
    ) -> Result<Acknowledgement> {
        if self.infraction_height(chain_id, data.valset_update_id)?.is_none() {
            warn!(
                "Slash packet from {} references unknown vsc id {}",
                chain_id, data.valset_update_id
            );
            return Ok(Acknowledgement::error(format!(
                "no infraction height for valset update id {} on {}",
                data.valset_update_id, chain_id
            )));
        }

        let provider_addr = self.get_provider_addr_from_consumer_addr(chain_id, &data.validator.address)?;

        if data.infraction == Infraction::DoubleSign {
            self.set_slash_log(&provider_addr);
            info!("Double-sign by {} reported by {}, slash log set", provider_addr, chain_id);
            self.emit_slash_handled(chain_id, provider_addr, data);
            return Ok(Acknowledgement::ok());
        }

        if self.get_slash_meter()? < 0 {
            debug!(
                "Slash meter negative, bouncing slash packet from {} for {}",
                chain_id, provider_addr
            );
            self.emit(ProviderEvent::SlashPacketBounced {
                chain_id: chain_id.to_string(),
                valset_update_id: data.valset_update_id,
            });
            return Ok(Acknowledgement::bounced());
        }

        let validator = match self.staking_keeper.get_validator_by_cons_addr(&provider_addr) {
            Some(validator) => validator,
            None => {
                info!("Slash packet from {} for unknown validator {}, ignored", chain_id, provider_addr);
                return Ok(Acknowledgement::ok());
            }
        };
        if self.slashing_keeper.is_tombstoned(&provider_addr) {
            info!("Validator {} is tombstoned, slash packet ignored", provider_addr);
            return Ok(Acknowledgement::ok());
        }

        self.append_slash_ack(chain_id, data.validator.address.to_string())?;

        let power = self
            .staking_keeper
            .last_validator_powers()
            .into_iter()
            .find(|(operator, _)| *operator == validator.operator_address)
            .map(|(_, power)| power)
            .unwrap_or(0);

        if !validator.jailed {
            let until = add_duration(ctx.time, self.slashing_keeper.downtime_jail_duration())?;
            self.slashing_keeper
                .jail_until(&provider_addr, until)
                .map_err(ProviderError::Staking)?;
            info!("Jailed {} until {} for downtime on {}", validator.operator_address, until, chain_id);
        }

        let meter = self.get_slash_meter()?;
        self.set_slash_meter(meter.saturating_sub(power))?;

        self.emit_slash_handled(chain_id, provider_addr, data);
        Ok(Acknowledgement::ok())
    }

    /// Provider height an infraction reported under `valset_update_id` maps to.
    /// ID 0 refers to the chain's initialization height.
    fn infraction_height(&self, chain_id: &str, valset_update_id: u64) -> Result<Option<u64>> {
        if valset_update_id == 0 {
            self.get_init_chain_height(chain_id)
        } else {
            self.get_valset_update_block_height(valset_update_id)
        }
    }

    fn emit_slash_handled(
        &mut self,
        chain_id: &str,
        provider_cons_addr: ProviderConsAddress,
        data: &SlashPacketData,
    ) {
        self.emit(ProviderEvent::SlashPacketHandled {
            chain_id: chain_id.to_string(),
            provider_cons_addr,
            infraction: data.infraction,
            valset_update_id: data.valset_update_id,
        });
    }
}
