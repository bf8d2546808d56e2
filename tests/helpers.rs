//! Shared test helpers for integration tests
//!
//! The module is organized into several categories:
//! - **Constants**: chain IDs, consensus keys, operator and IBC identifiers
//! - **Keeper Builders**: a keeper wired to the in-process IBC and staking collaborators
//! - **Proposal Builders**: addition and removal proposals with sane defaults
//! - **Packet Builders**: consumer packets as they arrive over the CCV channel
//! - **Configuration Builders**: node configuration for config and API tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ccv_provider::config::{Config, GenesisValidatorConfig};
use ccv_provider::keeper::{BlockContext, KeeperDeps, ProviderKeeper};
use ccv_provider::sim::{LocalIbcHost, LocalStaking};
use ccv_provider::store::MemoryStore;
use ccv_provider::types::{
    ConsensusPubKey, ConsumerAdditionProposal, ConsumerConsAddress, ConsumerPacketData, ConsumerRemovalProposal,
    Height, Infraction, Packet, PacketValidator, ProviderParams, SlashPacketData, ValidatorSetChangePacketData,
    VscMaturedPacketData, CONSUMER_PORT_ID, PROVIDER_PORT_ID,
};
use chrono::{DateTime, TimeZone, Utc};

// ============================================================================
// CONSTANTS
// ============================================================================

// --------------------------------- IDs ----------------------------------

/// Provider chain ID used by every test keeper
pub const DUMMY_PROVIDER_CHAIN_ID: &str = "provider-1";

/// Consumer chain ID
pub const DUMMY_CONSUMER_CHAIN_ID: &str = "consu";

/// Second consumer chain ID, sorts after the first
pub const DUMMY_CONSUMER_CHAIN_ID_2: &str = "consv";

/// Governance account allowed to submit proposal messages
pub const DUMMY_AUTHORITY: &str = "gov";

/// Module account receiving consumer rewards
pub const DUMMY_FEE_COLLECTOR: &str = "fee_collector";

// ------------------------------ IBC HANDLES ------------------------------

/// First client ID allocated by `LocalIbcHost`
pub const DUMMY_CLIENT_ID: &str = "07-tendermint-0";

/// Connection the consumer opens towards the provider
pub const DUMMY_CONNECTION_ID: &str = "connection-0";

/// CCV channel of the first consumer
pub const DUMMY_CHANNEL_ID: &str = "channel-0";

/// CCV channel of the second consumer
pub const DUMMY_CHANNEL_ID_2: &str = "channel-1";

// ------------------------------ VALIDATORS -------------------------------

/// Operator address of the validator with power 100
pub const DUMMY_OPERATOR_ALICE: &str = "cosmosvaloper1alice";

/// Operator address of the validator with power 50
pub const DUMMY_OPERATOR_BOB: &str = "cosmosvaloper1bob";

/// Operator address of a validator added by individual tests
pub const DUMMY_OPERATOR_CAROL: &str = "cosmosvaloper1carol";

/// Alice's provider consensus key (ed25519, base64)
pub const DUMMY_PUBKEY_ALICE: &str = "iojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w=";

/// Bob's provider consensus key (ed25519, base64)
pub const DUMMY_PUBKEY_BOB: &str = "gTl3Dqh9F19Wo1Rmw0x+zMuNipG07jeiXfYPW4/Js5Q=";

/// Carol's provider consensus key (ed25519, base64)
pub const DUMMY_PUBKEY_CAROL: &str = "7UkoxijRwsbq6QM4kFmVYSlZJzpcY/k2NsFGFKyHN9E=";

/// Unused key available for consumer key assignment (ed25519, base64)
pub const DUMMY_CONSUMER_PUBKEY_1: &str = "ypOsFwUYcHHWe4PH/w7+gQjo7EUwV113JoeTM9vavnw=";

/// Second unused key available for consumer key assignment (ed25519, base64)
pub const DUMMY_CONSUMER_PUBKEY_2: &str = "bnoc3Smwt4/ROvTFWY/v9O8qlxZuPKby5Pv8zYBQW/E=";

/// Third unused key available for consumer key assignment (ed25519, base64)
pub const DUMMY_CONSUMER_PUBKEY_3: &str = "iodf/x6zhFFXes1a/uQFRWVo3XyJ4JCGOgVXvHr0nxc=";

// --------------------------------- TIME ----------------------------------

/// Unix timestamp of the genesis block
pub const DUMMY_GENESIS_UNIX: i64 = 1_700_000_000;

/// Staking unbonding period (21 days)
pub const DUMMY_UNBONDING_SECS: u64 = 21 * 24 * 3600;

/// Downtime jail duration (10 minutes)
pub const DUMMY_JAIL_SECS: u64 = 600;

// ============================================================================
// TIME AND CONTEXT BUILDERS
// ============================================================================

/// Genesis time plus `secs` seconds.
pub fn dummy_time(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(DUMMY_GENESIS_UNIX + secs, 0).unwrap()
}

/// Block context on the provider chain at `height`, `secs` after genesis.
pub fn dummy_ctx(height: u64, secs: i64) -> BlockContext {
    BlockContext::new(DUMMY_PROVIDER_CHAIN_ID, height, dummy_time(secs))
}

pub fn dummy_key(encoded: &str) -> ConsensusPubKey {
    ConsensusPubKey::from_base64(encoded).unwrap()
}

/// Consumer address a validator signs with when it has no assigned key.
pub fn default_consumer_addr(encoded: &str) -> ConsumerConsAddress {
    ConsumerConsAddress::from_key(&dummy_key(encoded))
}

// ============================================================================
// KEEPER BUILDERS
// ============================================================================

/// Keeper with its collaborators, as returned by the builders below.
pub struct TestEnv {
    pub keeper: ProviderKeeper,
    pub ibc: Arc<LocalIbcHost>,
    pub staking: Arc<LocalStaking>,
}

/// Keeper wired to fresh collaborators, without running genesis.
///
/// Staking holds alice (power 100) and bob (power 50).
pub fn build_uninitialized_keeper() -> TestEnv {
    let ibc = Arc::new(LocalIbcHost::new());
    let staking = Arc::new(LocalStaking::new(
        Duration::from_secs(DUMMY_UNBONDING_SECS),
        Duration::from_secs(DUMMY_JAIL_SECS),
    ));
    staking.add_validator(DUMMY_OPERATOR_ALICE, dummy_key(DUMMY_PUBKEY_ALICE), 100);
    staking.add_validator(DUMMY_OPERATOR_BOB, dummy_key(DUMMY_PUBKEY_BOB), 50);

    let keeper = ProviderKeeper::new(KeeperDeps {
        authority: Some(DUMMY_AUTHORITY.to_string()),
        fee_collector_name: Some(DUMMY_FEE_COLLECTOR.to_string()),
        store: Some(Box::new(MemoryStore::new())),
        client_keeper: Some(ibc.clone()),
        connection_keeper: Some(ibc.clone()),
        channel_keeper: Some(ibc.clone()),
        staking_keeper: Some(staking.clone()),
        slashing_keeper: Some(staking.clone()),
    })
    .unwrap();

    TestEnv { keeper, ibc, staking }
}

/// Keeper after genesis at height 1 with default params.
///
/// The slash meter starts at 7 (5% of 150) and the genesis events are drained.
pub fn build_test_keeper() -> TestEnv {
    build_test_keeper_with_params(ProviderParams::default())
}

pub fn build_test_keeper_with_params(params: ProviderParams) -> TestEnv {
    let mut env = build_uninitialized_keeper();
    env.keeper.init_genesis(&dummy_ctx(1, 0), &params).unwrap();
    env.keeper.take_events();
    env
}

/// Creates the consumer client for `chain_id` at `ctx` and returns its client ID.
pub fn launch_consumer(env: &mut TestEnv, ctx: &BlockContext, chain_id: &str) -> String {
    let prop = build_addition_proposal(chain_id, ctx.time);
    env.keeper.handle_consumer_addition_proposal(ctx, &prop).unwrap();
    env.keeper.get_consumer_client_id(chain_id).unwrap().unwrap()
}

/// Completes the handshake for `chain_id` over `channel_id`.
///
/// The chain must already have a client. A connection named after the
/// channel is created on top of it.
pub fn establish_channel(env: &mut TestEnv, ctx: &BlockContext, chain_id: &str, channel_id: &str) {
    let client_id = env.keeper.get_consumer_client_id(chain_id).unwrap().unwrap();
    let connection_id = format!("connection-{}", channel_id.trim_start_matches("channel-"));
    env.ibc.connect_consumer(&client_id, &connection_id, channel_id);
    env.keeper.set_consumer_chain(ctx, channel_id).unwrap();
}

/// Launches `chain_id` and opens its CCV channel in the same block.
pub fn launch_and_connect(env: &mut TestEnv, ctx: &BlockContext, chain_id: &str, channel_id: &str) {
    launch_consumer(env, ctx, chain_id);
    establish_channel(env, ctx, chain_id, channel_id);
    env.keeper.take_events();
}

// ============================================================================
// PROPOSAL BUILDERS
// ============================================================================

/// Addition proposal for `chain_id` with consumer defaults.
pub fn build_addition_proposal(chain_id: &str, spawn_time: DateTime<Utc>) -> ConsumerAdditionProposal {
    ConsumerAdditionProposal {
        title: format!("Add {}", chain_id),
        description: format!("Launch consumer chain {}", chain_id),
        chain_id: chain_id.to_string(),
        initial_height: Height::new(0, 1),
        genesis_hash: b"gen_hash".to_vec(),
        binary_hash: b"bin_hash".to_vec(),
        spawn_time,
        lock_unbonding_on_timeout: false,
        unbonding_period: Duration::from_secs(DUMMY_UNBONDING_SECS),
        ccv_timeout_period: Duration::from_secs(4 * 7 * 24 * 3600),
        transfer_timeout_period: Duration::from_secs(3600),
        consumer_redistribution_fraction: "0.75".to_string(),
        blocks_per_distribution_transmission: 1000,
        historical_entries: 10000,
        connection_id: None,
    }
}

pub fn build_removal_proposal(chain_id: &str, stop_time: DateTime<Utc>) -> ConsumerRemovalProposal {
    ConsumerRemovalProposal {
        title: format!("Remove {}", chain_id),
        description: format!("Stop consumer chain {}", chain_id),
        chain_id: chain_id.to_string(),
        stop_time,
    }
}

// ============================================================================
// PACKET BUILDERS
// ============================================================================

/// Packet arriving from the consumer on `channel_id`.
pub fn consumer_packet(channel_id: &str, sequence: u64, data: &ConsumerPacketData) -> Packet {
    Packet {
        sequence,
        source_port: CONSUMER_PORT_ID.to_string(),
        source_channel: channel_id.to_string(),
        destination_port: PROVIDER_PORT_ID.to_string(),
        destination_channel: channel_id.to_string(),
        data: data.to_bytes(),
        timeout_timestamp: dummy_time(100_000),
    }
}

pub fn vsc_matured_packet(channel_id: &str, valset_update_id: u64) -> Packet {
    consumer_packet(
        channel_id,
        1,
        &ConsumerPacketData::VscMaturedPacket(VscMaturedPacketData { valset_update_id }),
    )
}

pub fn slash_packet_data(
    consumer_addr: ConsumerConsAddress,
    valset_update_id: u64,
    infraction: Infraction,
) -> SlashPacketData {
    SlashPacketData {
        validator: PacketValidator {
            address: consumer_addr,
            power: 0,
        },
        valset_update_id,
        infraction,
    }
}

pub fn slash_packet(
    channel_id: &str,
    consumer_addr: ConsumerConsAddress,
    valset_update_id: u64,
    infraction: Infraction,
) -> Packet {
    consumer_packet(
        channel_id,
        1,
        &ConsumerPacketData::SlashPacket(slash_packet_data(consumer_addr, valset_update_id, infraction)),
    )
}

/// Packet the provider sent on `channel_id`, as the consumer sees it.
pub fn outgoing_packet(channel_id: &str, sequence: u64) -> Packet {
    Packet {
        sequence,
        source_port: PROVIDER_PORT_ID.to_string(),
        source_channel: channel_id.to_string(),
        destination_port: CONSUMER_PORT_ID.to_string(),
        destination_channel: channel_id.to_string(),
        data: Vec::new(),
        timeout_timestamp: dummy_time(100_000),
    }
}

pub fn decode_vsc_packet(data: &[u8]) -> ValidatorSetChangePacketData {
    serde_json::from_slice(data).unwrap()
}

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Default node configuration with alice and bob as genesis validators.
pub fn build_test_config() -> Config {
    let mut config = Config::default();
    config.provider.validators = vec![
        GenesisValidatorConfig {
            operator_address: DUMMY_OPERATOR_ALICE.to_string(),
            consensus_pubkey: DUMMY_PUBKEY_ALICE.to_string(),
            power: 100,
        },
        GenesisValidatorConfig {
            operator_address: DUMMY_OPERATOR_BOB.to_string(),
            consensus_pubkey: DUMMY_PUBKEY_BOB.to_string(),
            power: 50,
        },
    ];
    config
}
