//! In-process IBC host
//!
//! Holds light clients, connections and channels in memory and records every
//! packet the provider sends. Client IDs are allocated as `07-tendermint-N`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use chrono::{DateTime, TimeZone, Utc};

use super::lock;
use crate::keeper::expected_keepers::{
    AnyClientState, ChannelEnd, ChannelKeeper, ChannelOrder, ChannelState, ClientKeeper, ConnectionEnd,
    ConnectionKeeper,
};
use crate::types::{ClientState, ConsensusState, Height, CCV_VERSION, CONSUMER_PORT_ID, PROVIDER_PORT_ID};

/// Packet handed to `send_packet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub port_id: String,
    pub channel_id: String,
    pub sequence: u64,
    pub data: Vec<u8>,
    pub timeout_timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct IbcState {
    next_client_seq: u64,
    clients: BTreeMap<String, AnyClientState>,
    consensus_states: BTreeMap<String, ConsensusState>,
    connections: BTreeMap<String, ConnectionEnd>,
    channels: BTreeMap<(String, String), ChannelEnd>,
    next_sequence: BTreeMap<String, u64>,
    sent: Vec<SentPacket>,
    close_inits: Vec<String>,
    self_consensus_state: ConsensusState,
    fail_create_client: bool,
    fail_send: bool,
}

#[derive(Debug)]
pub struct LocalIbcHost {
    state: Mutex<IbcState>,
}

impl Default for LocalIbcHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIbcHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IbcState {
                next_client_seq: 0,
                clients: BTreeMap::new(),
                consensus_states: BTreeMap::new(),
                connections: BTreeMap::new(),
                channels: BTreeMap::new(),
                next_sequence: BTreeMap::new(),
                sent: Vec::new(),
                close_inits: Vec::new(),
                self_consensus_state: ConsensusState {
                    timestamp: Utc.timestamp_nanos(0),
                    root: b"provider_app_hash".to_vec(),
                    next_validators_hash: Vec::new(),
                },
                fail_create_client: false,
                fail_send: false,
            }),
        }
    }

    // ============================================================================
    // SETUP
    // ============================================================================

    pub fn add_client(&self, client_id: &str, client_state: AnyClientState) {
        lock(&self.state).clients.insert(client_id.to_string(), client_state);
    }

    pub fn add_connection(&self, connection_id: &str, connection: ConnectionEnd) {
        lock(&self.state)
            .connections
            .insert(connection_id.to_string(), connection);
    }

    pub fn add_channel(&self, port_id: &str, channel_id: &str, channel: ChannelEnd) {
        lock(&self.state)
            .channels
            .insert((port_id.to_string(), channel_id.to_string()), channel);
    }

    /// Adds a connection over `client_id` and an open, ordered CCV channel on it,
    /// as the consumer side would after completing the handshake.
    pub fn connect_consumer(&self, client_id: &str, connection_id: &str, channel_id: &str) {
        self.add_connection(
            connection_id,
            ConnectionEnd {
                client_id: client_id.to_string(),
                counterparty_client_id: "07-tendermint-0".to_string(),
                counterparty_connection_id: connection_id.to_string(),
            },
        );
        self.add_channel(
            PROVIDER_PORT_ID,
            channel_id,
            ChannelEnd {
                state: ChannelState::Open,
                ordering: ChannelOrder::Ordered,
                counterparty_port_id: CONSUMER_PORT_ID.to_string(),
                counterparty_channel_id: channel_id.to_string(),
                connection_hops: vec![connection_id.to_string()],
                version: CCV_VERSION.to_string(),
            },
        );
    }

    pub fn set_self_consensus_state(&self, consensus_state: ConsensusState) {
        lock(&self.state).self_consensus_state = consensus_state;
    }

    pub fn fail_create_client(&self, fail: bool) {
        lock(&self.state).fail_create_client = fail;
    }

    pub fn fail_send(&self, fail: bool) {
        lock(&self.state).fail_send = fail;
    }

    // ============================================================================
    // INSPECTION
    // ============================================================================

    pub fn client_state(&self, client_id: &str) -> Option<AnyClientState> {
        lock(&self.state).clients.get(client_id).cloned()
    }

    pub fn consensus_state(&self, client_id: &str) -> Option<ConsensusState> {
        lock(&self.state).consensus_states.get(client_id).cloned()
    }

    pub fn channel_state(&self, channel_id: &str) -> Option<ChannelState> {
        lock(&self.state)
            .channels
            .get(&(PROVIDER_PORT_ID.to_string(), channel_id.to_string()))
            .map(|c| c.state)
    }

    pub fn sent_packets(&self) -> Vec<SentPacket> {
        lock(&self.state).sent.clone()
    }

    pub fn take_sent_packets(&self) -> Vec<SentPacket> {
        std::mem::take(&mut lock(&self.state).sent)
    }

    /// Channels `chan_close_init` was called for, in call order.
    pub fn close_inits(&self) -> Vec<String> {
        lock(&self.state).close_inits.clone()
    }
}

impl ClientKeeper for LocalIbcHost {
    fn create_client(&self, client_state: ClientState, consensus_state: ConsensusState) -> anyhow::Result<String> {
        let mut state = lock(&self.state);
        if state.fail_create_client {
            bail!("client creation disabled");
        }
        if client_state.latest_height.is_zero() {
            bail!("client latest height cannot be zero");
        }
        let client_id = format!("07-tendermint-{}", state.next_client_seq);
        state.next_client_seq += 1;
        state
            .clients
            .insert(client_id.clone(), AnyClientState::Tendermint(client_state));
        state.consensus_states.insert(client_id.clone(), consensus_state);
        Ok(client_id)
    }

    fn get_client_state(&self, client_id: &str) -> Option<AnyClientState> {
        self.client_state(client_id)
    }

    fn get_self_consensus_state(&self, height: Height) -> anyhow::Result<ConsensusState> {
        if height.revision_height == 0 {
            bail!("no self consensus state at height {}", height);
        }
        Ok(lock(&self.state).self_consensus_state.clone())
    }
}

impl ConnectionKeeper for LocalIbcHost {
    fn get_connection(&self, connection_id: &str) -> Option<ConnectionEnd> {
        lock(&self.state).connections.get(connection_id).cloned()
    }
}

impl ChannelKeeper for LocalIbcHost {
    fn get_channel(&self, port_id: &str, channel_id: &str) -> Option<ChannelEnd> {
        lock(&self.state)
            .channels
            .get(&(port_id.to_string(), channel_id.to_string()))
            .cloned()
    }

    fn chan_close_init(&self, port_id: &str, channel_id: &str) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        state.close_inits.push(channel_id.to_string());
        let channel = state
            .channels
            .get_mut(&(port_id.to_string(), channel_id.to_string()))
            .ok_or_else(|| anyhow!("channel {}/{} not found", port_id, channel_id))?;
        if channel.state == ChannelState::Closed {
            bail!("channel {}/{} is already closed", port_id, channel_id);
        }
        channel.state = ChannelState::Closed;
        Ok(())
    }

    fn send_packet(
        &self,
        port_id: &str,
        channel_id: &str,
        data: Vec<u8>,
        timeout_timestamp: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let mut state = lock(&self.state);
        if state.fail_send {
            bail!("packet sending disabled");
        }
        match state.channels.get(&(port_id.to_string(), channel_id.to_string())) {
            Some(channel) if channel.state == ChannelState::Open => {}
            Some(channel) => bail!("channel {} is {:?}", channel_id, channel.state),
            None => bail!("channel {}/{} not found", port_id, channel_id),
        }

        let next = state.next_sequence.entry(channel_id.to_string()).or_insert(1);
        let sequence = *next;
        *next += 1;
        state.sent.push(SentPacket {
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
            sequence,
            data,
            timeout_timestamp,
        });
        Ok(sequence)
    }
}
