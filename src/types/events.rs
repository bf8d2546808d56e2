//! Provider lifecycle events
//!
//! The keeper records one event per observable state transition. Callers drain
//! them with `ProviderKeeper::take_events` after each block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Infraction, ProviderConsAddress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    ConsumerClientCreated {
        chain_id: String,
        client_id: String,
        initial_height: String,
    },
    ChannelEstablished {
        chain_id: String,
        channel_id: String,
        client_id: String,
        connection_id: String,
    },
    ConsumerChainStopped {
        chain_id: String,
    },
    VscPacketQueued {
        chain_id: String,
        valset_update_id: u64,
        updates: usize,
    },
    VscPacketSent {
        chain_id: String,
        channel_id: String,
        valset_update_id: u64,
        sequence: u64,
    },
    VscMatured {
        chain_id: String,
        valset_update_id: u64,
    },
    SlashPacketHandled {
        chain_id: String,
        provider_cons_addr: ProviderConsAddress,
        infraction: Infraction,
        valset_update_id: u64,
    },
    SlashPacketBounced {
        chain_id: String,
        valset_update_id: u64,
    },
    SlashMeterReplenished {
        slash_meter: i64,
        allowance: i64,
        next_replenish_candidate: DateTime<Utc>,
    },
}
