//! In-process staking and slashing

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};

use super::lock;
use crate::keeper::expected_keepers::{SlashingKeeper, StakingKeeper};
use crate::types::{ConsensusPubKey, ProviderConsAddress, Validator};

#[derive(Debug, Default)]
struct StakingState {
    validators: BTreeMap<String, Validator>,
    powers: BTreeMap<String, i64>,
    on_hold: BTreeSet<u64>,
    completed: Vec<u64>,
    jailed: Vec<(ProviderConsAddress, DateTime<Utc>)>,
    tombstoned: BTreeSet<ProviderConsAddress>,
    fail_completion: bool,
}

/// Validator set with bonded powers, unbonding holds and jail records.
#[derive(Debug)]
pub struct LocalStaking {
    unbonding_time: Duration,
    downtime_jail_duration: Duration,
    state: Mutex<StakingState>,
}

impl LocalStaking {
    pub fn new(unbonding_time: Duration, downtime_jail_duration: Duration) -> Self {
        Self {
            unbonding_time,
            downtime_jail_duration,
            state: Mutex::new(StakingState::default()),
        }
    }

    pub fn add_validator(&self, operator_address: &str, consensus_pubkey: ConsensusPubKey, power: i64) {
        let mut state = lock(&self.state);
        state.validators.insert(
            operator_address.to_string(),
            Validator {
                operator_address: operator_address.to_string(),
                consensus_pubkey,
                jailed: false,
            },
        );
        state.powers.insert(operator_address.to_string(), power);
    }

    /// Sets the bonded power of a known validator. Power 0 removes it from the active set.
    pub fn set_power(&self, operator_address: &str, power: i64) {
        lock(&self.state).powers.insert(operator_address.to_string(), power);
    }

    pub fn tombstone(&self, cons_addr: ProviderConsAddress) {
        lock(&self.state).tombstoned.insert(cons_addr);
    }

    pub fn fail_completion(&self, fail: bool) {
        lock(&self.state).fail_completion = fail;
    }

    /// Unbonding IDs released by the provider, in release order.
    pub fn completed_unbondings(&self) -> Vec<u64> {
        lock(&self.state).completed.clone()
    }

    pub fn unbondings_on_hold(&self) -> Vec<u64> {
        lock(&self.state).on_hold.iter().copied().collect()
    }

    pub fn jailed(&self) -> Vec<(ProviderConsAddress, DateTime<Utc>)> {
        lock(&self.state).jailed.clone()
    }
}

impl StakingKeeper for LocalStaking {
    fn unbonding_time(&self) -> anyhow::Result<Duration> {
        Ok(self.unbonding_time)
    }

    fn last_validator_powers(&self) -> Vec<(String, i64)> {
        let state = lock(&self.state);
        state
            .powers
            .iter()
            .filter(|(operator, power)| **power > 0 && state.validators.get(*operator).is_some_and(|v| !v.jailed))
            .map(|(operator, power)| (operator.clone(), *power))
            .collect()
    }

    fn last_total_power(&self) -> i64 {
        self.last_validator_powers().iter().map(|(_, power)| power).sum()
    }

    fn get_validator(&self, operator_address: &str) -> Option<Validator> {
        lock(&self.state).validators.get(operator_address).cloned()
    }

    fn get_validator_by_cons_addr(&self, cons_addr: &ProviderConsAddress) -> Option<Validator> {
        lock(&self.state)
            .validators
            .values()
            .find(|v| v.cons_address() == *cons_addr)
            .cloned()
    }

    fn put_unbonding_on_hold(&self, id: u64) -> anyhow::Result<()> {
        lock(&self.state).on_hold.insert(id);
        Ok(())
    }

    fn unbonding_can_complete(&self, id: u64) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_completion {
            bail!("unbonding completion disabled");
        }
        if !state.on_hold.remove(&id) {
            bail!("unbonding operation {} is not on hold", id);
        }
        state.completed.push(id);
        Ok(())
    }
}

impl SlashingKeeper for LocalStaking {
    fn jail_until(&self, cons_addr: &ProviderConsAddress, until: DateTime<Utc>) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        let validator = state
            .validators
            .values_mut()
            .find(|v| v.cons_address() == *cons_addr)
            .ok_or_else(|| anyhow!("no validator with consensus address {}", cons_addr))?;
        validator.jailed = true;
        state.jailed.push((*cons_addr, until));
        Ok(())
    }

    fn downtime_jail_duration(&self) -> Duration {
        self.downtime_jail_duration
    }

    fn is_tombstoned(&self, cons_addr: &ProviderConsAddress) -> bool {
        lock(&self.state).tombstoned.contains(cons_addr)
    }
}
