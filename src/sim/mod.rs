//! In-process collaborators
//!
//! Deterministic stand-ins for the IBC host and the staking and slashing
//! modules. They back the provider node binary and the integration tests,
//! and record the calls the keeper makes so tests can assert on them.

pub mod ibc;
pub mod staking;

pub use ibc::{LocalIbcHost, SentPacket};
pub use staking::LocalStaking;

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
