//! Read-only query surface
//!
//! Queries never mutate the store. Arguments are validated here and store
//! failures surface as `QueryError::Internal`.

use super::ProviderKeeper;
use crate::error::QueryError;
use crate::types::{
    AddressPair, Chain, ChainStatus, ConsumerAdditionProposal, ConsumerConsAddress, ConsumerGenesisState,
    ConsumerRemovalProposal, ConsumerValidator, ProposedChain, ProviderConsAddress, ProviderParams,
    ThrottleState,
};

type QueryResult<T> = std::result::Result<T, QueryError>;

fn require_chain_id(chain_id: &str) -> QueryResult<()> {
    if chain_id.trim().is_empty() {
        return Err(QueryError::InvalidArgument("empty chain id".to_string()));
    }
    Ok(())
}

impl ProviderKeeper {
    /// Genesis state prepared for `chain_id` when its client was created.
    pub fn query_consumer_genesis(&self, chain_id: &str) -> QueryResult<ConsumerGenesisState> {
        require_chain_id(chain_id)?;
        self.get_consumer_genesis(chain_id)?
            .ok_or_else(|| QueryError::NotFound(format!("no consumer genesis for chain {}", chain_id)))
    }

    /// Registered consumer chains with their client IDs.
    pub fn query_consumer_chains(&self) -> QueryResult<Vec<Chain>> {
        let mut chains = Vec::new();
        for chain_id in self.get_all_registered_consumer_chain_ids()? {
            chains.push(self.get_consumer_chain(&chain_id)?);
        }
        Ok(chains)
    }

    pub fn get_consumer_chain(&self, chain_id: &str) -> QueryResult<Chain> {
        let client_id = self
            .get_consumer_client_id(chain_id)?
            .ok_or_else(|| QueryError::NotFound(format!("no client for consumer chain {}", chain_id)))?;
        Ok(Chain {
            chain_id: chain_id.to_string(),
            client_id,
        })
    }

    /// Passed addition proposals waiting for their spawn time.
    pub fn query_consumer_chain_starts(&self) -> QueryResult<Vec<ConsumerAdditionProposal>> {
        Ok(self.get_all_pending_consumer_addition_props()?)
    }

    /// Passed removal proposals waiting for their stop time.
    pub fn query_consumer_chain_stops(&self) -> QueryResult<Vec<ConsumerRemovalProposal>> {
        Ok(self.get_all_pending_consumer_removal_props()?)
    }

    /// Consumer address assigned by `provider_address` on `chain_id`, if any.
    pub fn query_validator_consumer_addr(
        &self,
        chain_id: &str,
        provider_address: &str,
    ) -> QueryResult<Option<ConsumerConsAddress>> {
        require_chain_id(chain_id)?;
        let provider_addr: ProviderConsAddress = provider_address
            .parse()
            .map_err(|e| QueryError::InvalidArgument(format!("invalid provider address: {}", e)))?;
        Ok(self
            .get_validator_consumer_pub_key(chain_id, &provider_addr)?
            .map(|key| ConsumerConsAddress::from_key(&key)))
    }

    /// Provider address behind `consumer_address` on `chain_id`, if a key was assigned.
    pub fn query_validator_provider_addr(
        &self,
        chain_id: &str,
        consumer_address: &str,
    ) -> QueryResult<Option<ProviderConsAddress>> {
        require_chain_id(chain_id)?;
        let consumer_addr: ConsumerConsAddress = consumer_address
            .parse()
            .map_err(|e| QueryError::InvalidArgument(format!("invalid consumer address: {}", e)))?;
        Ok(self.get_validator_by_consumer_addr(chain_id, &consumer_addr)?)
    }

    pub fn query_throttle_state(&self) -> QueryResult<ThrottleState> {
        Ok(self.get_throttle_state()?)
    }

    pub fn query_registered_consumer_reward_denoms(&self) -> QueryResult<Vec<String>> {
        Ok(self.get_all_consumer_reward_denoms()?)
    }

    /// Chains whose addition proposal is in its voting period.
    pub fn query_proposed_consumer_chain_ids(&self) -> QueryResult<Vec<ProposedChain>> {
        Ok(self.get_all_proposed_consumer_chain_ids()?)
    }

    pub fn query_all_pairs_val_con_addr(&self, chain_id: &str) -> QueryResult<Vec<AddressPair>> {
        require_chain_id(chain_id)?;
        Ok(self.get_address_pairs(chain_id)?)
    }

    pub fn query_params(&self) -> QueryResult<ProviderParams> {
        Ok(self.get_params()?)
    }

    /// Validator set last sent to `chain_id`. Fails for chains that never started.
    pub fn query_consumer_validators(&self, chain_id: &str) -> QueryResult<Vec<ConsumerValidator>> {
        require_chain_id(chain_id)?;
        if self.get_consumer_client_id(chain_id)?.is_none() {
            return Err(QueryError::InvalidArgument(format!(
                "no started consumer chain: {}",
                chain_id
            )));
        }
        Ok(self.get_consumer_valset(chain_id)?)
    }

    pub fn query_consumer_chain_status(&self, chain_id: &str) -> QueryResult<ChainStatus> {
        require_chain_id(chain_id)?;
        self.get_consumer_chain_status(chain_id)?
            .ok_or_else(|| QueryError::NotFound(format!("unknown consumer chain {}", chain_id)))
    }
}
