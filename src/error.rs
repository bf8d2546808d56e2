//! Error Types
//!
//! All keeper operations return `ProviderError`. Every variant belongs to one
//! `ErrorClass`, which tells the caller whether the failure rejects a single
//! message or must abort the whole block transition.

use thiserror::Error;

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

/// Coarse classification of a `ProviderError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected at the message boundary, before any store mutation
    InvalidInput,
    /// A referenced chain, client, connection, channel or record does not exist
    NotFound,
    /// Continuing would corrupt cross-chain guarantees; the block must abort
    Fatal,
    /// A collaborator (IBC or staking) failed; partial cleanup is kept and the caller retries
    Collaborator,
}

// ============================================================================
// PROVIDER ERROR
// ============================================================================

#[derive(Error, Debug)]
pub enum ProviderError {
    // ------------------------------ invalid input ------------------------------
    #[error("invalid consumer chain id: {0}")]
    InvalidConsumerChainId(String),

    #[error("invalid consumer addition proposal: {0}")]
    InvalidConsumerAdditionProposal(String),

    #[error("invalid consumer removal proposal: {0}")]
    InvalidConsumerRemovalProposal(String),

    #[error("invalid provider address: {0}")]
    InvalidProviderAddress(String),

    #[error("invalid consumer consensus public key: {0}")]
    InvalidConsumerConsensusPubKey(String),

    #[error("consumer key is already in use by another validator: {0}")]
    ConsumerKeyInUse(String),

    #[error("invalid reward denoms change: {0}")]
    InvalidRewardDenoms(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("invalid channel handshake: {0}")]
    InvalidHandshake(String),

    #[error("invalid authority: expected {expected}, got {got}")]
    InvalidAuthority { expected: String, got: String },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    // -------------------------------- not found --------------------------------
    #[error("unknown consumer chain id: {0}")]
    UnknownConsumerChainId(String),

    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("unbonding operation not found: {0}")]
    UnbondingOpNotFound(u64),

    #[error("validator not found: {0}")]
    ValidatorNotFound(String),

    // ---------------------------------- fatal ----------------------------------
    #[error("duplicate channel: {0}")]
    DuplicateChannel(String),

    #[error("duplicate consumer chain: {0}")]
    DuplicateConsumerChain(String),

    #[error("invalid consumer client: {0}")]
    InvalidConsumerClient(String),

    #[error("too many connection hops: {0}")]
    TooManyConnectionHops(String),

    #[error("invalid client type: {0}")]
    InvalidClientType(String),

    #[error("corrupted store entry {key}: {reason}")]
    CorruptedStore { key: String, reason: String },

    #[error("failed to encode store value for {key}: {reason}")]
    StoreEncoding { key: String, reason: String },

    #[error("keeper is missing required collaborator: {0}")]
    MissingDependency(&'static str),

    // ------------------------------- collaborator ------------------------------
    #[error("client creation failed: {0:#}")]
    ClientCreation(anyhow::Error),

    #[error("staking keeper failed: {0:#}")]
    Staking(anyhow::Error),

    #[error("channel keeper failed: {0:#}")]
    Channel(anyhow::Error),

    #[error("consensus state unavailable: {0:#}")]
    ConsensusState(anyhow::Error),
}

impl ProviderError {
    /// Returns the class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        use ProviderError::*;
        match self {
            InvalidConsumerChainId(_)
            | InvalidConsumerAdditionProposal(_)
            | InvalidConsumerRemovalProposal(_)
            | InvalidProviderAddress(_)
            | InvalidConsumerConsensusPubKey(_)
            | ConsumerKeyInUse(_)
            | InvalidRewardDenoms(_)
            | InvalidTime(_)
            | InvalidHandshake(_)
            | InvalidAuthority { .. }
            | InvalidParams(_) => ErrorClass::InvalidInput,
            UnknownConsumerChainId(_)
            | ClientNotFound(_)
            | ConnectionNotFound(_)
            | ChannelNotFound(_)
            | UnbondingOpNotFound(_)
            | ValidatorNotFound(_) => ErrorClass::NotFound,
            DuplicateChannel(_)
            | DuplicateConsumerChain(_)
            | InvalidConsumerClient(_)
            | TooManyConnectionHops(_)
            | InvalidClientType(_)
            | CorruptedStore { .. }
            | StoreEncoding { .. }
            | MissingDependency(_) => ErrorClass::Fatal,
            ClientCreation(_) | Staking(_) | Channel(_) | ConsensusState(_) => {
                ErrorClass::Collaborator
            }
        }
    }

    /// True when the error must abort the whole block transition.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    pub(crate) fn corrupted(key: impl Into<String>, reason: impl ToString) -> Self {
        ProviderError::CorruptedStore {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;

// ============================================================================
// QUERY ERROR
// ============================================================================

/// Errors returned by the read-only query surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<ProviderError> for QueryError {
    fn from(err: ProviderError) -> Self {
        match err.class() {
            ErrorClass::InvalidInput => QueryError::InvalidArgument(err.to_string()),
            ErrorClass::NotFound => QueryError::NotFound(err.to_string()),
            ErrorClass::Fatal | ErrorClass::Collaborator => QueryError::Internal(err.to_string()),
        }
    }
}
