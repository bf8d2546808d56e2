//! CCV Provider Library
//!
//! Provider side of Cross-Chain Validation: consumer chain lifecycle, the
//! validator-set-change packet pipeline, unbonding coordination with consumer
//! chains and slash packet throttling. The keeper is driven block by block by
//! `node::ProviderNode` and queried over HTTP through `api::ApiServer`.

pub mod api;
pub mod config;
pub mod error;
pub mod keeper;
pub mod node;
pub mod sim;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, ConsumerAdditionConfig, ParamsConfig, ProviderConfig};
pub use error::{ErrorClass, ProviderError, QueryError};
pub use keeper::{BlockContext, KeeperDeps, ProviderKeeper};
pub use node::ProviderNode;
pub use store::{KvStore, MemoryStore};
