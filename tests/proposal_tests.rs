//! Unit tests for consumer chain addition and removal
//!
//! Covers governance message handling, client creation, the consumer genesis,
//! pending proposal ticks in end_block and chain teardown.

use ccv_provider::keeper::expected_keepers::{AnyClientState, ChannelState, ConnectionEnd};
use ccv_provider::types::msg::{
    MsgChangeRewardDenoms, MsgConsumerAddition, MsgConsumerModification, MsgConsumerRemoval,
};
use ccv_provider::types::{ClientState, Height, ProviderEvent};
use ccv_provider::{ErrorClass, ProviderError};
use std::time::Duration;

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    build_addition_proposal, build_removal_proposal, build_test_keeper, dummy_ctx, dummy_time,
    launch_and_connect, launch_consumer, DUMMY_AUTHORITY, DUMMY_CHANNEL_ID, DUMMY_CHANNEL_ID_2, DUMMY_CLIENT_ID,
    DUMMY_CONSUMER_CHAIN_ID, DUMMY_CONSUMER_CHAIN_ID_2, DUMMY_FEE_COLLECTOR, DUMMY_OPERATOR_BOB,
    DUMMY_PROVIDER_CHAIN_ID,
    DUMMY_PUBKEY_ALICE, DUMMY_PUBKEY_BOB, DUMMY_UNBONDING_SECS,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn addition_msg(chain_id: &str, spawn_secs: i64) -> MsgConsumerAddition {
    MsgConsumerAddition {
        authority: DUMMY_AUTHORITY.to_string(),
        content: build_addition_proposal(chain_id, dummy_time(spawn_secs)),
    }
}

fn removal_msg(chain_id: &str, stop_secs: i64) -> MsgConsumerRemoval {
    MsgConsumerRemoval {
        authority: DUMMY_AUTHORITY.to_string(),
        content: build_removal_proposal(chain_id, dummy_time(stop_secs)),
    }
}

// ============================================================================
// ADDITION
// ============================================================================

/// Test that a proposal whose spawn time has passed creates the client immediately
/// What is tested: handle_msg_consumer_addition() with spawn time equal to block time
/// Why: Spawn time is inclusive, a chain due now must not wait a block
#[test]
fn test_addition_with_past_spawn_time_creates_client() {
    let mut env = build_test_keeper();
    let ctx = dummy_ctx(2, 10);

    env.keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10))
        .unwrap();

    assert_eq!(
        env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap().as_deref(),
        Some(DUMMY_CLIENT_ID)
    );
    assert!(env.keeper.get_all_pending_consumer_addition_props().unwrap().is_empty());

    match env.ibc.client_state(DUMMY_CLIENT_ID) {
        Some(AnyClientState::Tendermint(cs)) => {
            assert_eq!(cs.chain_id, DUMMY_CONSUMER_CHAIN_ID);
            assert_eq!(cs.latest_height, Height::new(0, 1));
            assert_eq!(cs.unbonding_period, Duration::from_secs(DUMMY_UNBONDING_SECS));
            assert_eq!(cs.trusting_period, Duration::from_secs(DUMMY_UNBONDING_SECS / 2));
        }
        other => panic!("unexpected client state {:?}", other),
    }

    let events = env.keeper.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        ProviderEvent::ConsumerClientCreated { chain_id, client_id, .. }
            if chain_id == DUMMY_CONSUMER_CHAIN_ID && client_id == DUMMY_CLIENT_ID
    )));
}

/// Test that the consumer genesis carries the provider client and validator set
/// What is tested: Genesis stored by create_consumer_client() for a fresh client
/// Why: The consumer chain boots from this document
#[test]
fn test_consumer_genesis_contents() {
    let mut env = build_test_keeper();
    launch_consumer(&mut env, &dummy_ctx(5, 10), DUMMY_CONSUMER_CHAIN_ID);

    let genesis = env.keeper.get_consumer_genesis(DUMMY_CONSUMER_CHAIN_ID).unwrap().unwrap();
    assert!(genesis.new_chain);
    assert!(!genesis.pre_ccv);
    assert!(genesis.connection_id.is_empty());
    assert_eq!(genesis.params.provider_fee_pool_addr, DUMMY_FEE_COLLECTOR);
    assert_eq!(genesis.params.consumer_redistribution_fraction, "0.75");

    let client: ClientState = genesis.provider_client_state.unwrap();
    assert_eq!(client.chain_id, DUMMY_PROVIDER_CHAIN_ID);
    // "provider-1" has revision 1
    assert_eq!(client.latest_height, Height::new(1, 5));
    assert!(genesis.provider_consensus_state.is_some());

    let mut initial: Vec<(String, i64)> = genesis
        .initial_val_set
        .iter()
        .map(|u| (u.pub_key.to_base64(), u.power))
        .collect();
    initial.sort();
    let mut expected = vec![
        (DUMMY_PUBKEY_ALICE.to_string(), 100),
        (DUMMY_PUBKEY_BOB.to_string(), 50),
    ];
    expected.sort();
    assert_eq!(initial, expected);

    let valset = env.keeper.get_consumer_valset(DUMMY_CONSUMER_CHAIN_ID).unwrap();
    assert_eq!(valset.len(), 2);
}

/// Test that a future spawn time stores the proposal until end_block reaches it
/// What is tested: Pending addition, an early end_block, then the end_block at spawn time
/// Why: Chains must launch exactly when governance scheduled them
#[test]
fn test_pending_addition_launches_at_spawn_time() {
    let mut env = build_test_keeper();
    env.keeper
        .handle_msg_consumer_addition(&dummy_ctx(2, 10), &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 100))
        .unwrap();
    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert_eq!(env.keeper.get_all_pending_consumer_chain_ids().unwrap().len(), 1);

    env.keeper.end_block(&dummy_ctx(3, 99)).unwrap();
    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);

    env.keeper.end_block(&dummy_ctx(4, 100)).unwrap();
    assert!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap().is_some());
    assert!(env.keeper.get_all_pending_consumer_addition_props().unwrap().is_empty());
}

/// Test that only due additions are launched
/// What is tested: Two pending additions, one due and one in the future
/// Why: The pending walk must stop at the first future entry
#[test]
fn test_pending_additions_partial_launch() {
    let mut env = build_test_keeper();
    let ctx = dummy_ctx(2, 10);
    env.keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg(DUMMY_CONSUMER_CHAIN_ID_2, 50))
        .unwrap();
    env.keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 500))
        .unwrap();

    env.keeper.end_block(&dummy_ctx(3, 60)).unwrap();

    assert_eq!(
        env.keeper.get_all_registered_consumer_chain_ids().unwrap(),
        vec![DUMMY_CONSUMER_CHAIN_ID_2.to_string()]
    );
    assert_eq!(
        env.keeper.get_all_pending_consumer_chain_ids().unwrap(),
        vec![DUMMY_CONSUMER_CHAIN_ID.to_string()]
    );
}

/// Test that a failing client creation drops the pending addition
/// What is tested: end_block when the client keeper rejects the client
/// Why: A broken proposal must not block the proposals behind it forever
#[test]
fn test_pending_addition_dropped_on_client_failure() {
    let mut env = build_test_keeper();
    env.keeper
        .handle_msg_consumer_addition(&dummy_ctx(2, 10), &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 50))
        .unwrap();
    env.ibc.fail_create_client(true);

    env.keeper.end_block(&dummy_ctx(3, 60)).unwrap();

    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert!(env.keeper.get_all_pending_consumer_addition_props().unwrap().is_empty());
}

/// Test that a second addition for a chain that is already pending is rejected
/// What is tested: two passed addition proposals for the same chain with future spawn times
/// Why: Launching the second one would try to create a second client for the chain
#[test]
fn test_duplicate_pending_addition_rejected() {
    let mut env = build_test_keeper();
    env.keeper
        .handle_msg_consumer_addition(&dummy_ctx(2, 10), &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 100))
        .unwrap();

    let err = env
        .keeper
        .handle_msg_consumer_addition(&dummy_ctx(2, 10), &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 200))
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConsumerAdditionProposal(_)));
    assert_eq!(err.class(), ErrorClass::InvalidInput);
    assert_eq!(env.keeper.get_all_pending_consumer_addition_props().unwrap().len(), 1);

    env.keeper.end_block(&dummy_ctx(3, 150)).unwrap();
    env.keeper.end_block(&dummy_ctx(4, 250)).unwrap();
    assert_eq!(
        env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(),
        Some(DUMMY_CLIENT_ID.to_string())
    );
}

/// Test that a pending addition for an already registered chain is dropped
/// What is tested: end_block reaching a pending addition whose chain already has a client
/// Why: Governance input must never halt block production
#[test]
fn test_pending_addition_for_registered_chain_dropped() {
    let mut env = build_test_keeper();
    launch_consumer(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID);
    env.keeper
        .set_pending_consumer_addition_prop(&build_addition_proposal(DUMMY_CONSUMER_CHAIN_ID, dummy_time(100)))
        .unwrap();

    env.keeper.end_block(&dummy_ctx(3, 100)).unwrap();

    assert!(env.keeper.get_all_pending_consumer_addition_props().unwrap().is_empty());
    assert_eq!(
        env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(),
        Some(DUMMY_CLIENT_ID.to_string())
    );
}

/// Test that an immediate addition surfaces client creation failures
/// What is tested: handle_consumer_addition_proposal() with a failing client keeper
/// Why: The caller decides whether to retry collaborator failures
#[test]
fn test_immediate_addition_client_failure() {
    let mut env = build_test_keeper();
    env.ibc.fail_create_client(true);

    let err = env
        .keeper
        .handle_msg_consumer_addition(&dummy_ctx(2, 10), &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10))
        .unwrap_err();

    assert!(matches!(err, ProviderError::ClientCreation(_)));
    assert_eq!(err.class(), ErrorClass::Collaborator);
    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
}

/// Test that an addition reusing a connection binds the existing client
/// What is tested: Addition proposal with connection_id set
/// Why: Chains changing over to CCV keep their existing light client
#[test]
fn test_addition_reuses_existing_connection() {
    let mut env = build_test_keeper();
    let template = env.keeper.get_params().unwrap().template_client;
    env.ibc.add_client(
        "07-tendermint-9",
        AnyClientState::Tendermint(ClientState {
            chain_id: DUMMY_CONSUMER_CHAIN_ID.to_string(),
            latest_height: Height::new(0, 40),
            ..template
        }),
    );
    env.ibc.add_connection(
        "connection-9",
        ConnectionEnd {
            client_id: "07-tendermint-9".to_string(),
            counterparty_client_id: "07-tendermint-3".to_string(),
            counterparty_connection_id: "connection-3".to_string(),
        },
    );

    let mut msg = addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10);
    msg.content.connection_id = Some("connection-9".to_string());
    env.keeper.handle_msg_consumer_addition(&dummy_ctx(2, 10), &msg).unwrap();

    assert_eq!(
        env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap().as_deref(),
        Some("07-tendermint-9")
    );
    let genesis = env.keeper.get_consumer_genesis(DUMMY_CONSUMER_CHAIN_ID).unwrap().unwrap();
    assert!(genesis.pre_ccv);
    assert_eq!(genesis.connection_id, "connection-3");
    assert!(genesis.provider_client_state.is_none());
    assert!(env.ibc.client_state(DUMMY_CLIENT_ID).is_none());
}

/// Test that reusing a connection to another chain's client is rejected
/// What is tested: Addition proposal whose connection tracks a different chain ID
/// Why: Binding the wrong client would let another chain impersonate the consumer
#[test]
fn test_addition_rejects_connection_to_other_chain() {
    let mut env = build_test_keeper();
    let template = env.keeper.get_params().unwrap().template_client;
    env.ibc.add_client(
        "07-tendermint-9",
        AnyClientState::Tendermint(ClientState {
            chain_id: "someone-else".to_string(),
            latest_height: Height::new(0, 40),
            ..template
        }),
    );
    env.ibc.add_connection(
        "connection-9",
        ConnectionEnd {
            client_id: "07-tendermint-9".to_string(),
            counterparty_client_id: "07-tendermint-3".to_string(),
            counterparty_connection_id: "connection-3".to_string(),
        },
    );

    let mut msg = addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10);
    msg.content.connection_id = Some("connection-9".to_string());
    let err = env.keeper.handle_msg_consumer_addition(&dummy_ctx(2, 10), &msg).unwrap_err();

    assert!(matches!(err, ProviderError::InvalidConsumerClient(_)));
    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
}

/// Test that message validation rejects bad additions before touching the store
/// What is tested: Wrong authority, reserved chain ID, zero initial height, duplicate chain
/// Why: Governance input is untrusted
#[test]
fn test_addition_rejections() {
    let mut env = build_test_keeper();
    let ctx = dummy_ctx(2, 10);

    let mut msg = addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10);
    msg.authority = "mallory".to_string();
    let err = env.keeper.handle_msg_consumer_addition(&ctx, &msg).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidAuthority { .. }));

    let err = env
        .keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg("neutron-1", 10))
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConsumerChainId(_)));

    let err = env
        .keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg("   ", 10))
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConsumerChainId(_)));

    let mut msg = addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10);
    msg.content.initial_height = Height::new(0, 0);
    let err = env.keeper.handle_msg_consumer_addition(&ctx, &msg).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConsumerAdditionProposal(_)));

    assert!(env.keeper.get_all_registered_consumer_chain_ids().unwrap().is_empty());

    env.keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10))
        .unwrap();
    let err = env
        .keeper
        .handle_msg_consumer_addition(&ctx, &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 10))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvalidInput);
}

/// Test that creating a client twice for the same chain is fatal
/// What is tested: create_consumer_client() on a registered chain
/// Why: Two clients for one chain would split its validator set updates
#[test]
fn test_create_consumer_client_twice_is_fatal() {
    let mut env = build_test_keeper();
    let ctx = dummy_ctx(2, 10);
    let prop = build_addition_proposal(DUMMY_CONSUMER_CHAIN_ID, dummy_time(10));
    env.keeper.create_consumer_client(&ctx, &prop).unwrap();

    let err = env.keeper.create_consumer_client(&ctx, &prop).unwrap_err();

    assert!(matches!(err, ProviderError::DuplicateConsumerChain(_)));
    assert!(err.is_fatal());
}

// ============================================================================
// REMOVAL
// ============================================================================

/// Test that an immediate removal wipes the chain's state and closes its channel
/// What is tested: handle_msg_consumer_removal() with a past stop time on an active chain
/// Why: A stopped chain must leave nothing behind that later blocks act on
#[test]
fn test_removal_stops_chain_and_closes_channel() {
    let mut env = build_test_keeper();
    launch_and_connect(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID, DUMMY_CHANNEL_ID);
    env.keeper
        .append_slash_ack(DUMMY_CONSUMER_CHAIN_ID, "aa".to_string())
        .unwrap();

    env.keeper
        .handle_msg_consumer_removal(&dummy_ctx(3, 20), &removal_msg(DUMMY_CONSUMER_CHAIN_ID, 20))
        .unwrap();

    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert_eq!(env.keeper.get_consumer_genesis(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert_eq!(env.keeper.get_chain_to_channel(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert_eq!(env.keeper.get_channel_to_chain(DUMMY_CHANNEL_ID).unwrap(), None);
    assert_eq!(env.keeper.get_init_chain_height(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert!(env.keeper.get_slash_acks(DUMMY_CONSUMER_CHAIN_ID).unwrap().is_empty());
    assert!(env.keeper.get_consumer_valset(DUMMY_CONSUMER_CHAIN_ID).unwrap().is_empty());
    assert_eq!(env.keeper.get_consumer_chain_status(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert_eq!(env.ibc.channel_state(DUMMY_CHANNEL_ID), Some(ChannelState::Closed));

    let events = env.keeper.take_events();
    assert!(events.contains(&ProviderEvent::ConsumerChainStopped {
        chain_id: DUMMY_CONSUMER_CHAIN_ID.to_string()
    }));
}

/// Test that a future stop time is honoured by end_block
/// What is tested: Pending removal, an early end_block, then the end_block at stop time
/// Why: Governance schedules removals ahead of time
#[test]
fn test_pending_removal_stops_at_stop_time() {
    let mut env = build_test_keeper();
    launch_consumer(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID);
    env.keeper
        .handle_msg_consumer_removal(&dummy_ctx(3, 20), &removal_msg(DUMMY_CONSUMER_CHAIN_ID, 200))
        .unwrap();
    assert_eq!(env.keeper.get_all_pending_consumer_removal_props().unwrap().len(), 1);

    env.keeper.end_block(&dummy_ctx(4, 199)).unwrap();
    assert!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap().is_some());

    env.keeper.end_block(&dummy_ctx(5, 200)).unwrap();
    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert!(env.keeper.get_all_pending_consumer_removal_props().unwrap().is_empty());
}

/// Test that a failing removal does not hold back other consumers
/// What is tested: end_block with a due removal whose unbonding release fails in staking
/// Why: The other chains must keep receiving validator set updates while the removal is retried
#[test]
fn test_failing_pending_removal_is_retried() {
    let mut env = build_test_keeper();
    launch_and_connect(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID, DUMMY_CHANNEL_ID);
    env.keeper.after_unbonding_initiated(7).unwrap();
    launch_and_connect(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID_2, DUMMY_CHANNEL_ID_2);
    env.keeper
        .handle_msg_consumer_removal(&dummy_ctx(2, 10), &removal_msg(DUMMY_CONSUMER_CHAIN_ID, 100))
        .unwrap();
    env.staking.fail_completion(true);
    env.staking.set_power(DUMMY_OPERATOR_BOB, 80);

    env.keeper.end_block(&dummy_ctx(3, 100)).unwrap();

    assert_eq!(env.keeper.get_all_pending_consumer_removal_props().unwrap().len(), 1);
    assert!(env.keeper.get_unbonding_op(7).unwrap().is_some());
    let sent = env.ibc.sent_packets();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel_id, DUMMY_CHANNEL_ID_2);

    env.staking.fail_completion(false);
    env.keeper.end_block(&dummy_ctx(4, 110)).unwrap();

    assert!(env.keeper.get_all_pending_consumer_removal_props().unwrap().is_empty());
    assert_eq!(env.staking.completed_unbondings(), vec![7]);
}

/// Test that removing an unknown chain fails
/// What is tested: handle_msg_consumer_removal() for a chain with no client
/// Why: A removal for a chain that never launched has nothing to act on
#[test]
fn test_removal_of_unknown_chain() {
    let mut env = build_test_keeper();

    let err = env
        .keeper
        .handle_msg_consumer_removal(&dummy_ctx(2, 10), &removal_msg(DUMMY_CONSUMER_CHAIN_ID, 10))
        .unwrap_err();

    assert!(matches!(err, ProviderError::UnknownConsumerChainId(_)));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

/// Test that stopping a chain without a channel only removes local state
/// What is tested: stop_consumer_chain() on a registered chain without a CCV channel
/// Why: Chains can be removed before their handshake completes
#[test]
fn test_stop_chain_without_channel() {
    let mut env = build_test_keeper();
    launch_consumer(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID);

    env.keeper.stop_consumer_chain(DUMMY_CONSUMER_CHAIN_ID, false, true).unwrap();

    assert_eq!(env.keeper.get_consumer_client_id(DUMMY_CONSUMER_CHAIN_ID).unwrap(), None);
    assert!(env.ibc.close_inits().is_empty());
}

// ============================================================================
// MODIFICATION AND REWARD DENOMS
// ============================================================================

/// Test that a modification toggles the unbonding lock of a registered chain
/// What is tested: handle_msg_consumer_modification() setting and clearing the flag
/// Why: The flag decides whether a timed-out chain keeps unbondings locked
#[test]
fn test_modification_toggles_lock_flag() {
    let mut env = build_test_keeper();
    launch_consumer(&mut env, &dummy_ctx(2, 10), DUMMY_CONSUMER_CHAIN_ID);
    assert!(!env.keeper.get_lock_unbonding_on_timeout(DUMMY_CONSUMER_CHAIN_ID));

    let mut msg = MsgConsumerModification {
        authority: DUMMY_AUTHORITY.to_string(),
        title: "Lock".to_string(),
        description: "Lock unbondings on timeout".to_string(),
        chain_id: DUMMY_CONSUMER_CHAIN_ID.to_string(),
        lock_unbonding_on_timeout: true,
    };
    env.keeper.handle_msg_consumer_modification(&msg).unwrap();
    assert!(env.keeper.get_lock_unbonding_on_timeout(DUMMY_CONSUMER_CHAIN_ID));

    msg.lock_unbonding_on_timeout = false;
    env.keeper.handle_msg_consumer_modification(&msg).unwrap();
    assert!(!env.keeper.get_lock_unbonding_on_timeout(DUMMY_CONSUMER_CHAIN_ID));
}

/// Test that a modification updates a pending proposal
/// What is tested: handle_msg_consumer_modification() before spawn time, then launch
/// Why: Governance may change the policy before the chain launches
#[test]
fn test_modification_of_pending_chain() {
    let mut env = build_test_keeper();
    env.keeper
        .handle_msg_consumer_addition(&dummy_ctx(2, 10), &addition_msg(DUMMY_CONSUMER_CHAIN_ID, 100))
        .unwrap();

    env.keeper
        .handle_msg_consumer_modification(&MsgConsumerModification {
            authority: DUMMY_AUTHORITY.to_string(),
            title: "Lock".to_string(),
            description: "Lock unbondings on timeout".to_string(),
            chain_id: DUMMY_CONSUMER_CHAIN_ID.to_string(),
            lock_unbonding_on_timeout: true,
        })
        .unwrap();
    env.keeper.end_block(&dummy_ctx(3, 100)).unwrap();

    assert!(env.keeper.get_lock_unbonding_on_timeout(DUMMY_CONSUMER_CHAIN_ID));

    let err = env
        .keeper
        .handle_msg_consumer_modification(&MsgConsumerModification {
            authority: DUMMY_AUTHORITY.to_string(),
            title: "Lock".to_string(),
            description: "Unknown chain".to_string(),
            chain_id: "nobody".to_string(),
            lock_unbonding_on_timeout: true,
        })
        .unwrap_err();
    assert!(matches!(err, ProviderError::UnknownConsumerChainId(_)));
}

/// Test that reward denoms can be registered and removed
/// What is tested: handle_msg_change_reward_denoms() add, remove and remove-unknown
/// Why: Consumers only send rewards in registered denoms
#[test]
fn test_change_reward_denoms() {
    let mut env = build_test_keeper();

    env.keeper
        .handle_msg_change_reward_denoms(&MsgChangeRewardDenoms {
            authority: DUMMY_AUTHORITY.to_string(),
            denoms_to_add: vec!["uatom".to_string(), "ibc/ABCD".to_string()],
            denoms_to_remove: Vec::new(),
        })
        .unwrap();
    assert_eq!(
        env.keeper.get_all_consumer_reward_denoms().unwrap(),
        vec!["ibc/ABCD".to_string(), "uatom".to_string()]
    );

    env.keeper
        .handle_msg_change_reward_denoms(&MsgChangeRewardDenoms {
            authority: DUMMY_AUTHORITY.to_string(),
            denoms_to_add: Vec::new(),
            denoms_to_remove: vec!["uatom".to_string()],
        })
        .unwrap();
    assert_eq!(
        env.keeper.get_all_consumer_reward_denoms().unwrap(),
        vec!["ibc/ABCD".to_string()]
    );

    let err = env
        .keeper
        .handle_msg_change_reward_denoms(&MsgChangeRewardDenoms {
            authority: DUMMY_AUTHORITY.to_string(),
            denoms_to_add: Vec::new(),
            denoms_to_remove: vec!["uosmo".to_string()],
        })
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRewardDenoms(_)));
    assert_eq!(env.keeper.get_all_consumer_reward_denoms().unwrap().len(), 1);
}

// ============================================================================
// GOVERNANCE HOOKS
// ============================================================================

/// Test that proposed chains are tracked only during the voting period
/// What is tested: after_proposal_submission() and after_proposal_voting_period_ended()
/// Why: Validators may assign keys to proposed chains before they launch
#[test]
fn test_proposal_hooks_track_proposed_chains() {
    let mut env = build_test_keeper();
    let msg = addition_msg(DUMMY_CONSUMER_CHAIN_ID, 100);

    env.keeper.after_proposal_submission(3, &msg);
    assert_eq!(
        env.keeper.get_proposed_consumer_chain(3).unwrap().as_deref(),
        Some(DUMMY_CONSUMER_CHAIN_ID)
    );
    let proposed = env.keeper.get_all_proposed_consumer_chain_ids().unwrap();
    assert_eq!(proposed.len(), 1);
    assert_eq!(proposed[0].proposal_id, 3);

    env.keeper.after_proposal_voting_period_ended(3);
    assert_eq!(env.keeper.get_proposed_consumer_chain(3).unwrap(), None);
}
