//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    build_addition_proposal, build_removal_proposal, build_test_config, build_test_keeper,
    build_test_keeper_with_params, build_uninitialized_keeper, consumer_packet, decode_vsc_packet,
    default_consumer_addr, dummy_ctx, dummy_key, dummy_time, establish_channel, launch_and_connect,
    launch_consumer, outgoing_packet, slash_packet, slash_packet_data, vsc_matured_packet, TestEnv,
    DUMMY_AUTHORITY, DUMMY_CHANNEL_ID, DUMMY_CHANNEL_ID_2, DUMMY_CLIENT_ID, DUMMY_CONNECTION_ID,
    DUMMY_CONSUMER_CHAIN_ID, DUMMY_CONSUMER_CHAIN_ID_2, DUMMY_CONSUMER_PUBKEY_1, DUMMY_CONSUMER_PUBKEY_2,
    DUMMY_CONSUMER_PUBKEY_3, DUMMY_FEE_COLLECTOR, DUMMY_GENESIS_UNIX, DUMMY_JAIL_SECS, DUMMY_OPERATOR_ALICE,
    DUMMY_OPERATOR_BOB, DUMMY_OPERATOR_CAROL, DUMMY_PROVIDER_CHAIN_ID, DUMMY_PUBKEY_ALICE, DUMMY_PUBKEY_BOB,
    DUMMY_PUBKEY_CAROL, DUMMY_UNBONDING_SECS,
};
