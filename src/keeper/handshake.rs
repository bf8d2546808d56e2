//! CCV channel handshake
//!
//! Consumer chains open the CCV channel; the provider only answers. The
//! channel is accepted when it runs over a single connection whose client is
//! the one the provider created (or reused) for that consumer chain, and when
//! the chain has no CCV channel yet.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::expected_keepers::{AnyClientState, ChannelOrder};
use super::{BlockContext, ProviderKeeper};
use crate::error::{ProviderError, Result};
use crate::types::{ClientState, ProviderEvent, CCV_VERSION, CONSUMER_PORT_ID, PROVIDER_PORT_ID};

/// Version metadata returned to the consumer in `ChanOpenTry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMetadata {
    pub provider_fee_pool_addr: String,
    pub version: String,
}

impl ProviderKeeper {
    // ============================================================================
    // VERIFICATION
    // ============================================================================

    /// Checks that a channel opening over `connection_hops` may become the CCV
    /// channel of the consumer chain behind it.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The channel may proceed
    /// * `Err(ProviderError::TooManyConnectionHops)` - Not exactly one hop
    /// * `Err(ProviderError::ClientNotFound)` - No client registered for the chain
    /// * `Err(ProviderError::InvalidConsumerClient)` - The connection runs over another client
    /// * `Err(ProviderError::DuplicateChannel)` - The chain already has a CCV channel
    pub fn verify_consumer_chain(&self, channel_id: &str, connection_hops: &[String]) -> Result<()> {
        let connection_id = single_hop(channel_id, connection_hops)?;
        let (client_id, client_state) = self.get_underlying_client(connection_id)?;
        let chain_id = &client_state.chain_id;

        let registered = self
            .get_consumer_client_id(chain_id)?
            .ok_or_else(|| ProviderError::ClientNotFound(format!("no client registered for consumer chain {}", chain_id)))?;
        if registered != client_id {
            return Err(ProviderError::InvalidConsumerClient(format!(
                "channel {} runs over client {}, consumer chain {} uses {}",
                channel_id, client_id, chain_id, registered
            )));
        }

        if let Some(existing) = self.get_chain_to_channel(chain_id)? {
            return Err(ProviderError::DuplicateChannel(format!(
                "consumer chain {} already has channel {}",
                chain_id, existing
            )));
        }
        Ok(())
    }

    /// Binds `channel_id` to the consumer chain behind it and records the
    /// block height the chain was initialized at.
    pub fn set_consumer_chain(&mut self, ctx: &BlockContext, channel_id: &str) -> Result<()> {
        let channel = self
            .channel_keeper
            .get_channel(PROVIDER_PORT_ID, channel_id)
            .ok_or_else(|| ProviderError::ChannelNotFound(channel_id.to_string()))?;
        let connection_id = single_hop(channel_id, &channel.connection_hops)?.to_string();
        let (client_id, client_state) = self.get_underlying_client(&connection_id)?;
        let chain_id = client_state.chain_id;

        if let Some(existing) = self.get_chain_to_channel(&chain_id)? {
            return Err(ProviderError::DuplicateChannel(format!(
                "consumer chain {} already has channel {}",
                chain_id, existing
            )));
        }

        self.set_chain_to_channel(&chain_id, channel_id);
        self.set_channel_to_chain(channel_id, &chain_id);
        self.set_init_chain_height(&chain_id, ctx.height);

        info!("CCV channel {} established with {}", channel_id, chain_id);
        self.emit(ProviderEvent::ChannelEstablished {
            chain_id,
            channel_id: channel_id.to_string(),
            client_id,
            connection_id,
        });
        Ok(())
    }

    /// Client ID and Tendermint client state underlying `connection_id`.
    fn get_underlying_client(&self, connection_id: &str) -> Result<(String, ClientState)> {
        let connection = self
            .connection_keeper
            .get_connection(connection_id)
            .ok_or_else(|| ProviderError::ConnectionNotFound(connection_id.to_string()))?;
        match self.client_keeper.get_client_state(&connection.client_id) {
            None => Err(ProviderError::ClientNotFound(connection.client_id)),
            Some(AnyClientState::Tendermint(state)) => Ok((connection.client_id, state)),
            Some(other) => Err(ProviderError::InvalidClientType(format!(
                "client {} has type {}",
                connection.client_id,
                other.client_type()
            ))),
        }
    }

    // ============================================================================
    // CHANNEL CALLBACKS
    // ============================================================================

    /// The provider never initiates the CCV channel.
    pub fn on_chan_open_init(&self, _channel_id: &str) -> Result<()> {
        Err(ProviderError::InvalidHandshake(
            "channel handshake must be initiated by the consumer chain".to_string(),
        ))
    }

    /// Answers a consumer's channel opening attempt.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - JSON `HandshakeMetadata` carried as the channel version
    /// * `Err(ProviderError::InvalidHandshake)` - Wrong ordering, port or version
    /// * `Err(_)` - Errors from `verify_consumer_chain`
    pub fn on_chan_open_try(
        &self,
        order: ChannelOrder,
        connection_hops: &[String],
        port_id: &str,
        channel_id: &str,
        counterparty_port_id: &str,
        counterparty_version: &str,
    ) -> Result<String> {
        if order != ChannelOrder::Ordered {
            return Err(ProviderError::InvalidHandshake(format!(
                "expected ordered channel, got {:?}",
                order
            )));
        }
        if port_id != PROVIDER_PORT_ID {
            return Err(ProviderError::InvalidHandshake(format!(
                "invalid port {}, expected {}",
                port_id, PROVIDER_PORT_ID
            )));
        }
        if counterparty_port_id != CONSUMER_PORT_ID {
            return Err(ProviderError::InvalidHandshake(format!(
                "invalid counterparty port {}, expected {}",
                counterparty_port_id, CONSUMER_PORT_ID
            )));
        }
        if counterparty_version != CCV_VERSION {
            return Err(ProviderError::InvalidHandshake(format!(
                "invalid counterparty version {}, expected {}",
                counterparty_version, CCV_VERSION
            )));
        }

        self.verify_consumer_chain(channel_id, connection_hops)?;

        let metadata = HandshakeMetadata {
            provider_fee_pool_addr: self.fee_collector_name.clone(),
            version: CCV_VERSION.to_string(),
        };
        debug!("Accepted channel open try on {}", channel_id);
        serde_json::to_string(&metadata).map_err(|e| ProviderError::InvalidHandshake(e.to_string()))
    }

    /// `ChanOpenAck` only runs on the initiating side.
    pub fn on_chan_open_ack(&self, _channel_id: &str) -> Result<()> {
        Err(ProviderError::InvalidHandshake(
            "channel open ack is not expected on the provider".to_string(),
        ))
    }

    pub fn on_chan_open_confirm(&mut self, ctx: &BlockContext, channel_id: &str) -> Result<()> {
        self.set_consumer_chain(ctx, channel_id)
    }

    /// Users may not close the CCV channel.
    pub fn on_chan_close_init(&self, _channel_id: &str) -> Result<()> {
        Err(ProviderError::InvalidHandshake(
            "user cannot close the CCV channel".to_string(),
        ))
    }

    pub fn on_chan_close_confirm(&self, channel_id: &str) -> Result<()> {
        if let Some(channel) = self.channel_keeper.get_channel(PROVIDER_PORT_ID, channel_id) {
            debug!("Channel {} close confirmed in state {:?}", channel_id, channel.state);
        }
        Ok(())
    }
}

fn single_hop<'a>(channel_id: &str, connection_hops: &'a [String]) -> Result<&'a str> {
    match connection_hops {
        [connection_id] => Ok(connection_id),
        _ => Err(ProviderError::TooManyConnectionHops(format!(
            "channel {} has {} connection hops, expected 1",
            channel_id,
            connection_hops.len()
        ))),
    }
}
