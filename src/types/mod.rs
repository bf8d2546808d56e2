//! Provider Domain Types
//!
//! Light-client descriptors, validator keys and addresses, proposals, the
//! consumer genesis document, packet payloads and module parameters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub mod events;
pub mod msg;

pub use events::ProviderEvent;

/// Port the provider binds its CCV channels to.
pub const PROVIDER_PORT_ID: &str = "provider";
/// Port consumer chains bind to.
pub const CONSUMER_PORT_ID: &str = "consumer";
/// CCV channel version.
pub const CCV_VERSION: &str = "1";
/// Light-client type the provider creates for consumers.
pub const TENDERMINT_CLIENT_TYPE: &str = "07-tendermint";
/// Upper bound on consumer chain ID length, in bytes.
pub const MAX_CHAIN_ID_LENGTH: usize = 128;

// ============================================================================
// BYTE NEWTYPE SERDE
// ============================================================================

fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&hex::encode(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

fn deserialize_array<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error> {
    let bytes = if deserializer.is_human_readable() {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?
    } else {
        Vec::<u8>::deserialize(deserializer)?
    };
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| serde::de::Error::custom(format!("expected {} bytes, got {}", N, bytes.len())))
}

fn parse_hex_array<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| e.to_string())?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("expected {} bytes, got {}", N, bytes.len()))
}

// ============================================================================
// CONSENSUS KEYS AND ADDRESSES
// ============================================================================

/// Ed25519 consensus public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsensusPubKey(pub [u8; 32]);

impl ConsensusPubKey {
    /// Builds a key, rejecting byte strings that are not a valid ed25519 point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| format!("ed25519 key must be 32 bytes, got {}", bytes.len()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|e| e.to_string())?;
        Ok(Self(arr))
    }

    /// Parses the base64 encoding used in consensus key JSON.
    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("invalid base64: {}", e))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Consensus address: first 20 bytes of the SHA-256 of the key.
    pub fn address(&self) -> [u8; 20] {
        let digest = Sha256::digest(self.0);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest[..20]);
        addr
    }
}

impl fmt::Debug for ConsensusPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsensusPubKey({})", hex::encode(self.0))
    }
}

impl Serialize for ConsensusPubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_bytes(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for ConsensusPubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_array::<D, 32>(deserializer).map(Self)
    }
}

macro_rules! cons_address {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 20]);

        impl $name {
            pub fn from_key(key: &ConsensusPubKey) -> Self {
                Self(key.address())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
                bytes
                    .try_into()
                    .map(Self)
                    .map_err(|_| format!("consensus address must be 20 bytes, got {}", bytes.len()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex_array::<20>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serialize_bytes(&self.0, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserialize_array::<D, 20>(deserializer).map(Self)
            }
        }
    };
}

cons_address!(
    /// Consensus address of a validator on the provider chain.
    ProviderConsAddress
);
cons_address!(
    /// Consensus address a validator uses on a specific consumer chain.
    ConsumerConsAddress
);

// ============================================================================
// LIGHT CLIENT DESCRIPTORS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Height {
    pub revision_number: u64,
    pub revision_height: u64,
}

impl Height {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self { revision_number, revision_height }
    }

    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

/// Tendermint light-client state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub chain_id: String,
    pub latest_height: Height,
    pub trusting_period: Duration,
    pub unbonding_period: Duration,
    pub max_clock_drift: Duration,
    pub frozen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusState {
    pub timestamp: DateTime<Utc>,
    pub root: Vec<u8>,
    pub next_validators_hash: Vec<u8>,
}

// ============================================================================
// VALIDATORS AND PACKETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: ConsensusPubKey,
    pub power: i64,
}

/// Validator record exposed by the staking collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator_address: String,
    pub consensus_pubkey: ConsensusPubKey,
    pub jailed: bool,
}

impl Validator {
    pub fn cons_address(&self) -> ProviderConsAddress {
        ProviderConsAddress::from_key(&self.consensus_pubkey)
    }
}

/// VSC packet payload sent to a consumer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetChangePacketData {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub valset_update_id: u64,
    /// Provider consensus addresses slashed for downtime on this chain
    pub slash_acks: Vec<String>,
}

impl ValidatorSetChangePacketData {
    pub fn new(validator_updates: Vec<ValidatorUpdate>, valset_update_id: u64, slash_acks: Vec<String>) -> Self {
        Self { validator_updates, valset_update_id, slash_acks }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing a plain struct of owned data to JSON cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Infraction {
    DoubleSign,
    Downtime,
}

/// Validator reference carried by a slash packet, in consumer address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketValidator {
    pub address: ConsumerConsAddress,
    pub power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashPacketData {
    pub validator: PacketValidator,
    pub valset_update_id: u64,
    pub infraction: Infraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VscMaturedPacketData {
    pub valset_update_id: u64,
}

/// Packets a consumer chain sends to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ConsumerPacketData {
    SlashPacket(SlashPacketData),
    VscMaturedPacket(VscMaturedPacketData),
}

impl ConsumerPacketData {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Result bytes of a successful VSCMatured or handled slash packet.
pub const RESULT_ACK_OK: &[u8] = &[1];
/// Result bytes telling the consumer to retry a slash packet later.
pub const SLASH_PACKET_BOUNCED_RESULT: &[u8] = &[2];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgement {
    Result(Vec<u8>),
    Error(String),
}

impl Acknowledgement {
    pub fn ok() -> Self {
        Acknowledgement::Result(RESULT_ACK_OK.to_vec())
    }

    pub fn bounced() -> Self {
        Acknowledgement::Result(SLASH_PACKET_BOUNCED_RESULT.to_vec())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Acknowledgement::Error(msg.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Acknowledgement::Result(_))
    }
}

/// IBC packet as seen by the provider callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: u64,
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    pub data: Vec<u8>,
    pub timeout_timestamp: DateTime<Utc>,
}

// ============================================================================
// UNBONDING
// ============================================================================

/// Unbonding operation waiting on maturity from a set of consumer chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingOp {
    pub id: u64,
    pub unbonding_consumer_chains: Vec<String>,
}

impl UnbondingOp {
    /// Drops `chain_id` from the wait set. Returns true when the set became empty.
    pub fn remove_chain(&mut self, chain_id: &str) -> bool {
        self.unbonding_consumer_chains.retain(|c| c != chain_id);
        self.unbonding_consumer_chains.is_empty()
    }
}

// ============================================================================
// PROPOSALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerAdditionProposal {
    pub title: String,
    pub description: String,
    pub chain_id: String,
    pub initial_height: Height,
    pub genesis_hash: Vec<u8>,
    pub binary_hash: Vec<u8>,
    pub spawn_time: DateTime<Utc>,
    /// Whether unbonding operations stay locked when the chain times out
    pub lock_unbonding_on_timeout: bool,
    pub unbonding_period: Duration,
    pub ccv_timeout_period: Duration,
    pub transfer_timeout_period: Duration,
    pub consumer_redistribution_fraction: String,
    pub blocks_per_distribution_transmission: i64,
    pub historical_entries: i64,
    /// Existing connection to reuse instead of creating a new client
    #[serde(default)]
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRemovalProposal {
    pub title: String,
    pub description: String,
    pub chain_id: String,
    pub stop_time: DateTime<Utc>,
}

// ============================================================================
// CONSUMER GENESIS
// ============================================================================

/// Parameters handed to the consumer chain in its genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerParams {
    pub enabled: bool,
    pub blocks_per_distribution_transmission: i64,
    pub distribution_transmission_channel: String,
    pub provider_fee_pool_addr: String,
    pub ccv_timeout_period: Duration,
    pub transfer_timeout_period: Duration,
    pub consumer_redistribution_fraction: String,
    pub historical_entries: i64,
    pub unbonding_period: Duration,
    pub reward_denoms: Vec<String>,
    pub provider_reward_denoms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGenesisState {
    pub params: ConsumerParams,
    pub provider_client_state: Option<ClientState>,
    pub provider_consensus_state: Option<ConsensusState>,
    pub initial_val_set: Vec<ValidatorUpdate>,
    pub new_chain: bool,
    /// Set when the consumer already runs and is changing over to CCV
    pub pre_ccv: bool,
    /// Counterparty connection the consumer should reuse, empty for a fresh client
    pub connection_id: String,
}

// ============================================================================
// QUERY VIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelToChain {
    pub channel_id: String,
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChain {
    pub chain_id: String,
    pub proposal_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValsetUpdateIdToHeight {
    pub valset_update_id: u64,
    pub height: u64,
}

/// Validator as seen by one consumer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerValidator {
    pub provider_cons_addr: ProviderConsAddress,
    pub consumer_public_key: ConsensusPubKey,
    pub power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPair {
    pub provider_address: ProviderConsAddress,
    pub consumer_address: ConsumerConsAddress,
    pub consumer_key: ConsensusPubKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleState {
    pub slash_meter: i64,
    pub slash_meter_allowance: i64,
    pub next_replenish_candidate: DateTime<Utc>,
}

/// Lifecycle position of a consumer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Proposal is in its voting period
    Proposed,
    /// Proposal passed, waiting for spawn time
    Pending,
    /// Client created, channel handshake not complete
    Registered,
    /// CCV channel established
    Active,
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Module parameters persisted in the provider store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderParams {
    /// Template for consumer light clients; chain id, heights and periods are filled per chain
    pub template_client: ClientState,
    pub ccv_timeout_period: Duration,
    pub slash_meter_replenish_period: Duration,
    /// Decimal in [0, 1], share of total power replenished each period
    pub slash_meter_replenish_fraction: String,
    pub reserved_chain_ids: Vec<String>,
}

impl Default for ProviderParams {
    fn default() -> Self {
        Self {
            template_client: ClientState {
                chain_id: String::new(),
                latest_height: Height::default(),
                trusting_period: Duration::ZERO,
                unbonding_period: Duration::ZERO,
                max_clock_drift: Duration::from_secs(10),
                frozen: false,
            },
            ccv_timeout_period: Duration::from_secs(4 * 7 * 24 * 3600),
            slash_meter_replenish_period: Duration::from_secs(3600),
            slash_meter_replenish_fraction: "0.05".to_string(),
            reserved_chain_ids: vec!["neutron-1".to_string(), "stride-1".to_string()],
        }
    }
}

impl ProviderParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.ccv_timeout_period.is_zero() {
            return Err("ccv timeout period must be positive".to_string());
        }
        if self.slash_meter_replenish_period.is_zero() {
            return Err("slash meter replenish period must be positive".to_string());
        }
        DecimalFraction::parse(&self.slash_meter_replenish_fraction)?;
        Ok(())
    }
}

/// Decimal fraction in [0, 1] held as an exact ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalFraction {
    numerator: u128,
    denominator: u128,
}

impl DecimalFraction {
    /// Parses strings such as `"0.05"`, `"1"` or `"1.0"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty()
            || frac_part.len() > 18
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(format!("invalid decimal: {:?}", s));
        }
        let denominator = 10u128.pow(frac_part.len() as u32);
        let int_value: u128 = int_part.parse().map_err(|_| format!("invalid decimal: {:?}", s))?;
        let frac_value: u128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| format!("invalid decimal: {:?}", s))?
        };
        let numerator = int_value
            .checked_mul(denominator)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| format!("invalid decimal: {:?}", s))?;
        if numerator > denominator {
            return Err(format!("fraction must be within [0, 1], got {}", s));
        }
        Ok(Self { numerator, denominator })
    }

    /// `floor(value * self)`, for non-negative values.
    pub fn mul_floor(&self, value: i64) -> i64 {
        let value = value.max(0) as u128;
        (value * self.numerator / self.denominator) as i64
    }
}
