//! Unbonding coordination
//!
//! An unbonding operation started while consumer chains are registered is put
//! on hold in staking and indexed under `(chainID, valsetUpdateID)` for every
//! registered chain. Each chain releases its hold when it reports the VSC as
//! matured or when it is removed. The operation completes once no chain is
//! left in its wait set.

use tracing::{debug, info};

use super::ProviderKeeper;
use crate::error::{ProviderError, Result};
use crate::store::keys::{
    chain_scope_prefix, parse_unbonding_op_index_key, unbonding_op_index_key, unbonding_op_key,
    UNBONDING_OP_INDEX_PREFIX, UNBONDING_OP_PREFIX,
};
use crate::types::{ProviderEvent, UnbondingOp, VscMaturedPacketData};

impl ProviderKeeper {
    // ============================================================================
    // UNBONDING OPERATIONS
    // ============================================================================

    pub fn set_unbonding_op(&mut self, op: &UnbondingOp) -> Result<()> {
        self.set_encoded(unbonding_op_key(op.id), op)
    }

    pub fn get_unbonding_op(&self, id: u64) -> Result<Option<UnbondingOp>> {
        self.get_decoded(&unbonding_op_key(id))
    }

    pub fn delete_unbonding_op(&mut self, id: u64) {
        self.store.delete(&unbonding_op_key(id));
    }

    /// All stored unbonding operations, ascending by ID.
    pub fn get_all_unbonding_ops(&self) -> Result<Vec<UnbondingOp>> {
        self.store
            .prefix_iter(&[UNBONDING_OP_PREFIX])
            .map(|(k, v)| super::decode_value(&k, &v))
            .collect()
    }

    // ============================================================================
    // UNBONDING OPERATION INDEX
    // ============================================================================

    pub fn set_unbonding_op_index(&mut self, chain_id: &str, valset_update_id: u64, ids: &[u64]) -> Result<()> {
        self.set_encoded(unbonding_op_index_key(chain_id, valset_update_id), &ids.to_vec())
    }

    pub fn get_unbonding_op_index(&self, chain_id: &str, valset_update_id: u64) -> Result<Vec<u64>> {
        Ok(self
            .get_decoded(&unbonding_op_index_key(chain_id, valset_update_id))?
            .unwrap_or_default())
    }

    pub fn delete_unbonding_op_index(&mut self, chain_id: &str, valset_update_id: u64) {
        self.store.delete(&unbonding_op_index_key(chain_id, valset_update_id));
    }

    pub fn append_unbonding_op_index(&mut self, chain_id: &str, valset_update_id: u64, id: u64) -> Result<()> {
        let mut ids = self.get_unbonding_op_index(chain_id, valset_update_id)?;
        ids.push(id);
        self.set_unbonding_op_index(chain_id, valset_update_id, &ids)
    }

    /// Index entries for `chain_id` as `(valsetUpdateID, op IDs)`, ascending by ID.
    pub fn get_all_unbonding_op_index_entries(&self, chain_id: &str) -> Result<Vec<(u64, Vec<u64>)>> {
        self.unbonding_op_index_entries(chain_id, u64::MAX)
    }

    /// Index entries for `chain_id` with valsetUpdateID at most `max_id`.
    ///
    /// The walk stops at the first entry above `max_id`.
    fn unbonding_op_index_entries(&self, chain_id: &str, max_id: u64) -> Result<Vec<(u64, Vec<u64>)>> {
        let prefix = chain_scope_prefix(UNBONDING_OP_INDEX_PREFIX, chain_id);
        let mut entries = Vec::new();
        for (k, v) in self.store.prefix_iter(&prefix) {
            let (_, vsc_id) = parse_unbonding_op_index_key(&k)?;
            if vsc_id > max_id {
                break;
            }
            let ids: Vec<u64> = super::decode_value(&k, &v)?;
            entries.push((vsc_id, ids));
        }
        Ok(entries)
    }

    // ============================================================================
    // RELEASE
    // ============================================================================

    /// Removes `chain_id` from every unbonding operation it holds up to `max_id`
    /// (all of them when `None`), completing operations whose wait set empties.
    ///
    /// Progress is written to the index after each operation. A staking error
    /// stops the walk; operations released before it stay released and a retry
    /// resumes with the failing one.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of operations that completed in staking
    /// * `Err(ProviderError::UnbondingOpNotFound)` - The index references a missing operation
    /// * `Err(ProviderError::Staking)` - Staking refused to complete an operation
    pub fn release_unbonding_ops(&mut self, chain_id: &str, max_id: Option<u64>) -> Result<usize> {
        let entries = self.unbonding_op_index_entries(chain_id, max_id.unwrap_or(u64::MAX))?;
        let mut completed = 0;

        for (vsc_id, ids) in entries {
            let mut remaining = ids.clone();
            for id in ids {
                let mut op = self
                    .get_unbonding_op(id)?
                    .ok_or(ProviderError::UnbondingOpNotFound(id))?;

                if op.remove_chain(chain_id) {
                    self.staking_keeper
                        .unbonding_can_complete(op.id)
                        .map_err(ProviderError::Staking)?;
                    self.delete_unbonding_op(op.id);
                    completed += 1;
                    debug!("Unbonding op {} completed after release by {}", op.id, chain_id);
                } else {
                    self.set_unbonding_op(&op)?;
                }

                remaining.retain(|r| *r != id);
                if remaining.is_empty() {
                    self.delete_unbonding_op_index(chain_id, vsc_id);
                } else {
                    self.set_unbonding_op_index(chain_id, vsc_id, &remaining)?;
                }
            }
            self.delete_unbonding_op_index(chain_id, vsc_id);
        }

        Ok(completed)
    }

    // ============================================================================
    // HOOKS AND PACKETS
    // ============================================================================

    /// Staking hook for a newly started unbonding operation.
    ///
    /// With no registered consumer chains the operation completes normally.
    /// Otherwise it waits on every registered chain for the current
    /// valsetUpdateID, and staking is asked to hold it.
    pub fn after_unbonding_initiated(&mut self, id: u64) -> Result<()> {
        let chains = self.get_all_registered_consumer_chain_ids()?;
        if chains.is_empty() {
            return Ok(());
        }

        let vsc_id = self.get_validator_set_update_id()?;
        self.set_unbonding_op(&UnbondingOp {
            id,
            unbonding_consumer_chains: chains.clone(),
        })?;
        for chain_id in &chains {
            self.append_unbonding_op_index(chain_id, vsc_id, id)?;
        }

        self.staking_keeper
            .put_unbonding_on_hold(id)
            .map_err(ProviderError::Staking)?;

        debug!(
            "Unbonding op {} on hold for {} consumer chains at vsc id {}",
            id,
            chains.len(),
            vsc_id
        );
        Ok(())
    }

    /// Handles a VSCMatured packet from `chain_id`.
    pub fn handle_vsc_matured_packet(&mut self, chain_id: &str, data: &VscMaturedPacketData) -> Result<()> {
        let completed = self.release_unbonding_ops(chain_id, Some(data.valset_update_id))?;
        info!(
            "VSC {} matured on {}, {} unbonding ops completed",
            data.valset_update_id, chain_id, completed
        );
        self.emit(ProviderEvent::VscMatured {
            chain_id: chain_id.to_string(),
            valset_update_id: data.valset_update_id,
        });
        Ok(())
    }
}
