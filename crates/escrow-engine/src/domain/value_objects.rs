//! # Domain Value Objects
//!
//! Immutable value types and the two state machines (per-escrow and
//! per-swap) of the coordination engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported ledger families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    /// ICP-style reverse-gas ledger.
    Icp,
    /// EVM-style chain, identified by its network id.
    Evm(u64),
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Icp => f.write_str("icp"),
            ChainId::Evm(id) => write!(f, "evm:{}", id),
        }
    }
}

/// Opaque principal / address on either chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub String);

impl PartyId {
    /// Create a party id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Swap identifier, SHA-256 over the intent's canonical fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwapId(pub [u8; 32]);

impl SwapId {
    /// Hex encoding, used for logs and file names.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-char hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines.
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwapId({})", self)
    }
}

/// Opaque escrow handle returned by a chain adapter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainHandle(pub String);

impl fmt::Display for ChainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which half of a swap an escrow belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowSide {
    /// Maker's asset, locked on the source chain.
    Source,
    /// Resolver's asset, locked on the destination chain.
    Destination,
}

impl EscrowSide {
    /// The opposite side.
    pub fn other(&self) -> Self {
        match self {
            Self::Source => Self::Destination,
            Self::Destination => Self::Source,
        }
    }

    /// Both sides, source first.
    pub const BOTH: [EscrowSide; 2] = [EscrowSide::Source, EscrowSide::Destination];
}

impl fmt::Display for EscrowSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// Lifecycle of one escrow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowState {
    /// Not yet created on chain.
    #[default]
    Requested,
    /// Created, awaiting funds.
    Created,
    /// Holds at least amount + safety deposit.
    Funded,
    /// Beneficiary received the funds.
    Withdrawn,
    /// Owner got the funds back.
    Cancelled,
    /// Creation abandoned, nothing was locked.
    Failed,
}

impl EscrowState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: EscrowState) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Created)
                | (Self::Requested, Self::Failed)
                | (Self::Created, Self::Funded)
                | (Self::Created, Self::Cancelled)
                | (Self::Funded, Self::Withdrawn)
                | (Self::Funded, Self::Cancelled)
        )
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Withdrawn | Self::Cancelled | Self::Failed)
    }
}

/// Swap-level coordination state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinationState {
    /// Accepted, nothing requested yet.
    #[default]
    Pending,
    /// Source escrow creation requested.
    SourceEscrowRequested,
    /// Source escrow holds the maker's funds.
    SourceEscrowFunded,
    /// Destination escrow creation requested.
    DestinationEscrowRequested,
    /// Destination escrow holds the resolver's funds.
    DestinationEscrowFunded,
    /// Both escrows verified funded; ready for reveal.
    BothFunded,
    /// Secret public, withdrawals in progress.
    SecretRevealed,
    /// Both withdrawals confirmed.
    Completed,
    /// Cancelling funded escrows.
    Recovering,
    /// Every funded escrow returned to its owner.
    Refunded,
    /// Abandoned before any asset was locked.
    Failed,
}

impl CoordinationState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: CoordinationState) -> bool {
        use CoordinationState::*;
        match (self, next) {
            (Pending, SourceEscrowRequested) => true,
            (SourceEscrowRequested, SourceEscrowFunded) => true,
            (SourceEscrowFunded, DestinationEscrowRequested) => true,
            (DestinationEscrowRequested, DestinationEscrowFunded) => true,
            (DestinationEscrowFunded, BothFunded) => true,
            (BothFunded, SecretRevealed) => true,
            (SecretRevealed, Completed) => true,
            (Recovering, Refunded) => true,
            // Nothing locked yet.
            (Pending, Failed) | (SourceEscrowRequested, Failed) => true,
            (from, Recovering) => !from.is_terminal() && *from != Recovering,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded | Self::Failed)
    }

    /// Whether the secret has been released.
    pub fn is_secret_revealed(&self) -> bool {
        matches!(self, Self::SecretRevealed | Self::Completed)
    }
}

/// Timelock phase, computed from `now - deployed_at`. Never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimelockPhase {
    /// Finality lock; only the beneficiary may withdraw.
    Active,
    /// Beneficiary-only withdrawal.
    Withdrawal,
    /// Anyone holding the secret may withdraw on the beneficiary's behalf.
    PublicWithdrawal,
    /// Only the owner may cancel.
    Cancellation,
    /// Anyone may cancel and collect the safety deposit.
    PublicCancellation,
}

impl TimelockPhase {
    /// Whether withdrawals are closed.
    pub fn is_cancellable(&self) -> bool {
        *self >= Self::Cancellation
    }
}

/// Phase boundaries in seconds after `deployed_at`.
///
/// Valid schedules satisfy
/// `0 < withdrawal < public_withdrawal < cancellation < public_cancellation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelockSchedule {
    /// End of the finality lock.
    pub withdrawal: u64,
    /// Start of public withdrawal.
    pub public_withdrawal: u64,
    /// Start of owner-only cancellation; withdrawals close here.
    pub cancellation: u64,
    /// Start of public cancellation.
    pub public_cancellation: u64,
}

impl TimelockSchedule {
    /// Create a schedule. Use `TimelockPolicy::validate` before relying on it.
    pub const fn new(
        withdrawal: u64,
        public_withdrawal: u64,
        cancellation: u64,
        public_cancellation: u64,
    ) -> Self {
        Self {
            withdrawal,
            public_withdrawal,
            cancellation,
            public_cancellation,
        }
    }

    /// Offset (from `deployed_at`) at which `phase` begins.
    pub fn boundary(&self, phase: TimelockPhase) -> u64 {
        match phase {
            TimelockPhase::Active => 0,
            TimelockPhase::Withdrawal => self.withdrawal,
            TimelockPhase::PublicWithdrawal => self.public_withdrawal,
            TimelockPhase::Cancellation => self.cancellation,
            TimelockPhase::PublicCancellation => self.public_cancellation,
        }
    }

    /// Boundaries in phase order, excluding `Active`.
    pub fn as_array(&self) -> [u64; 4] {
        [
            self.withdrawal,
            self.public_withdrawal,
            self.cancellation,
            self.public_cancellation,
        ]
    }
}

/// Who is calling into an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallerRole {
    /// Intended recipient.
    Beneficiary,
    /// Depositor.
    Owner,
    /// Any third party.
    Public,
}

/// Escrow status as reported by a chain adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEscrowStatus {
    /// Exists, no (or not enough) funds yet.
    Unfunded,
    /// Holds the given amount, including the safety deposit.
    Funded(u64),
    /// Paid out to the beneficiary.
    Withdrawn,
    /// Returned to the owner.
    Cancelled,
}
