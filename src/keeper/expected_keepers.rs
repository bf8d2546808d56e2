//! Collaborator interfaces
//!
//! The provider keeper drives the IBC client, connection and channel stacks
//! and the staking and slashing modules only through these traits.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{ClientState, ConsensusState, Height, ProviderConsAddress, Validator};

// ============================================================================
// IBC
// ============================================================================

/// Client state as stored by the IBC client keeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyClientState {
    Tendermint(ClientState),
    /// Any other light-client type, carried by its type name
    Other(String),
}

impl AnyClientState {
    pub fn client_type(&self) -> &str {
        match self {
            AnyClientState::Tendermint(_) => crate::types::TENDERMINT_CLIENT_TYPE,
            AnyClientState::Other(t) => t,
        }
    }
}

pub trait ClientKeeper: Send + Sync {
    /// Creates a light client and returns its identifier.
    fn create_client(&self, client_state: ClientState, consensus_state: ConsensusState) -> anyhow::Result<String>;

    fn get_client_state(&self, client_id: &str) -> Option<AnyClientState>;

    /// Consensus state of the host chain at `height`.
    fn get_self_consensus_state(&self, height: Height) -> anyhow::Result<ConsensusState>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEnd {
    pub client_id: String,
    pub counterparty_client_id: String,
    pub counterparty_connection_id: String,
}

pub trait ConnectionKeeper: Send + Sync {
    fn get_connection(&self, connection_id: &str) -> Option<ConnectionEnd>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Init,
    TryOpen,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEnd {
    pub state: ChannelState,
    pub ordering: ChannelOrder,
    pub counterparty_port_id: String,
    pub counterparty_channel_id: String,
    pub connection_hops: Vec<String>,
    pub version: String,
}

pub trait ChannelKeeper: Send + Sync {
    fn get_channel(&self, port_id: &str, channel_id: &str) -> Option<ChannelEnd>;

    /// Starts closing the channel on the provider side.
    fn chan_close_init(&self, port_id: &str, channel_id: &str) -> anyhow::Result<()>;

    /// Sends a packet and returns its sequence number.
    fn send_packet(
        &self,
        port_id: &str,
        channel_id: &str,
        data: Vec<u8>,
        timeout_timestamp: DateTime<Utc>,
    ) -> anyhow::Result<u64>;
}

// ============================================================================
// STAKING AND SLASHING
// ============================================================================

pub trait StakingKeeper: Send + Sync {
    fn unbonding_time(&self) -> anyhow::Result<Duration>;

    /// Last committed validator powers, as `(operator address, power)`.
    fn last_validator_powers(&self) -> Vec<(String, i64)>;

    fn last_total_power(&self) -> i64;

    fn get_validator(&self, operator_address: &str) -> Option<Validator>;

    fn get_validator_by_cons_addr(&self, cons_addr: &ProviderConsAddress) -> Option<Validator>;

    /// Prevents the unbonding operation from completing until released.
    fn put_unbonding_on_hold(&self, id: u64) -> anyhow::Result<()>;

    /// Releases an unbonding operation. Fails if the operation is unknown.
    fn unbonding_can_complete(&self, id: u64) -> anyhow::Result<()>;
}

pub trait SlashingKeeper: Send + Sync {
    /// Jails the validator and keeps it jailed until `until`.
    fn jail_until(&self, cons_addr: &ProviderConsAddress, until: DateTime<Utc>) -> anyhow::Result<()>;

    fn downtime_jail_duration(&self) -> Duration;

    fn is_tombstoned(&self, cons_addr: &ProviderConsAddress) -> bool;
}
