//! Provider Node
//!
//! Drives the keeper one block at a time against the in-process IBC and
//! staking collaborators. Each block runs `begin_block` and `end_block`
//! under the keeper's write lock; the API server reads between blocks.
//!
//! A fatal keeper error halts the node. Other block errors are logged and
//! the next block retries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::keeper::expected_keepers::StakingKeeper;
use crate::keeper::{BlockContext, KeeperDeps, ProviderKeeper};
use crate::sim::{LocalIbcHost, LocalStaking};
use crate::store::MemoryStore;
use crate::types::msg::MsgConsumerAddition;
use crate::types::ConsensusPubKey;

pub struct ProviderNode {
    config: Config,
    keeper: Arc<RwLock<ProviderKeeper>>,
    ibc: Arc<LocalIbcHost>,
    staking: Arc<LocalStaking>,
    height: u64,
}

impl ProviderNode {
    /// Builds the node, its collaborators and genesis validator set from `config`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let ibc = Arc::new(LocalIbcHost::new());
        let staking = Arc::new(LocalStaking::new(
            Duration::from_secs(config.provider.unbonding_period_secs),
            Duration::from_secs(config.provider.downtime_jail_duration_secs),
        ));
        for validator in &config.provider.validators {
            let key = ConsensusPubKey::from_base64(&validator.consensus_pubkey)
                .map_err(|e| anyhow::anyhow!("validator {}: {}", validator.operator_address, e))?;
            staking.add_validator(&validator.operator_address, key, validator.power);
        }

        let keeper = ProviderKeeper::new(KeeperDeps {
            authority: Some(config.provider.authority.clone()),
            fee_collector_name: Some(config.provider.fee_collector_name.clone()),
            store: Some(Box::new(MemoryStore::new())),
            client_keeper: Some(ibc.clone()),
            connection_keeper: Some(ibc.clone()),
            channel_keeper: Some(ibc.clone()),
            staking_keeper: Some(staking.clone()),
            slashing_keeper: Some(staking.clone()),
        })
        .context("Failed to build provider keeper")?;

        Ok(Self {
            config,
            keeper: Arc::new(RwLock::new(keeper)),
            ibc,
            staking,
            height: 0,
        })
    }

    pub fn keeper(&self) -> Arc<RwLock<ProviderKeeper>> {
        self.keeper.clone()
    }

    pub fn ibc(&self) -> Arc<LocalIbcHost> {
        self.ibc.clone()
    }

    pub fn staking(&self) -> Arc<LocalStaking> {
        self.staking.clone()
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Runs genesis at height 1 and submits the configured consumer additions.
    pub async fn init(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.height = 1;
        let ctx = self.block_context(now);
        let params = self.config.params.to_params();
        let mut keeper = self.keeper.write().await;
        keeper.init_genesis(&ctx, &params).context("Genesis failed")?;

        let unbonding = Duration::from_secs(self.config.provider.unbonding_period_secs);
        for addition in &self.config.consumer_additions {
            let msg = MsgConsumerAddition {
                authority: keeper.authority().to_string(),
                content: addition.to_proposal(now, unbonding, params.ccv_timeout_period)?,
            };
            keeper
                .handle_msg_consumer_addition(&ctx, &msg)
                .with_context(|| format!("Consumer addition for {} failed", addition.chain_id))?;
            info!("Proposed consumer chain {}", addition.chain_id);
        }
        for event in keeper.take_events() {
            debug!("Event: {:?}", event);
        }
        Ok(())
    }

    /// Produces the next block at `time`.
    pub async fn produce_block(&mut self, time: DateTime<Utc>) -> Result<()> {
        self.height += 1;
        let ctx = self.block_context(time);
        let mut keeper = self.keeper.write().await;

        let result = keeper.begin_block(&ctx).and_then(|_| keeper.end_block(&ctx));
        for event in keeper.take_events() {
            debug!("Event at height {}: {:?}", ctx.height, event);
        }
        result
    }

    /// Produces blocks every `block_interval_ms` until a fatal error.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            "Starting provider node {}: block_interval={}ms",
            self.config.provider.chain_id, self.config.provider.block_interval_ms
        );
        self.init(Utc::now()).await?;

        let interval = Duration::from_millis(self.config.provider.block_interval_ms);
        loop {
            if let Err(e) = self.produce_block(Utc::now()).await {
                if e.is_fatal() {
                    error!("Fatal error at height {}: {}", self.height, e);
                    return Err(e).context("Provider node halted");
                }
                warn!("Block {} failed: {}", self.height, e);
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn block_context(&self, time: DateTime<Utc>) -> BlockContext {
        let mut hasher = Sha256::new();
        for (operator, power) in self.staking.last_validator_powers() {
            hasher.update(operator.as_bytes());
            hasher.update(power.to_be_bytes());
        }
        BlockContext {
            chain_id: self.config.provider.chain_id.clone(),
            height: self.height,
            time,
            next_validators_hash: hasher.finalize().to_vec(),
        }
    }
}
