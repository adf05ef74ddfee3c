//! # Domain Entities
//!
//! `SwapIntent` (agreed terms), `EscrowRecord` (one chain side) and the
//! `SwapRecord` aggregate owned by the registry.

use super::errors::{EscrowError, EscrowResult, Hash};
use super::secure_secret::SecureSecret;
use super::value_objects::{
    ChainHandle, ChainId, CoordinationState, EscrowSide, EscrowState, PartyId, SwapId,
    TimelockPhase, TimelockSchedule,
};
use crate::algorithms::timelock::TimelockPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One leg of a swap: what gets locked on which chain, and for how long.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLeg {
    /// Chain holding this leg.
    pub chain: ChainId,
    /// Asset identifier on that chain (ledger canister, token address).
    pub asset: String,
    /// Amount to deliver to the beneficiary.
    pub amount: u64,
    /// Resolver stake forfeited to whoever finishes a public action.
    pub safety_deposit: u64,
    /// Timelock schedule for this leg's escrow.
    pub schedule: TimelockSchedule,
}

/// Agreed terms of one swap. Immutable once accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapIntent {
    /// Maker's side.
    pub source: AssetLeg,
    /// Resolver's side.
    pub destination: AssetLeg,
    /// Order owner.
    pub maker: PartyId,
    /// Auction winner.
    pub resolver: PartyId,
    /// SHA-256 commitment to the secret.
    pub hashlock: Hash,
    /// When the auction settled (unix seconds).
    pub created_at: u64,
}

impl SwapIntent {
    /// Deterministic id over the canonical fields.
    pub fn swap_id(&self) -> SwapId {
        let mut hasher = Sha256::new();
        for leg in [&self.source, &self.destination] {
            hasher.update(leg.chain.to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(leg.asset.as_bytes());
            hasher.update([0u8]);
            hasher.update(leg.amount.to_le_bytes());
            hasher.update(leg.safety_deposit.to_le_bytes());
            for boundary in leg.schedule.as_array() {
                hasher.update(boundary.to_le_bytes());
            }
        }
        hasher.update(self.maker.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.resolver.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.hashlock);
        hasher.update(self.created_at.to_le_bytes());
        SwapId(hasher.finalize().into())
    }

    /// The leg for one side.
    pub fn leg(&self, side: EscrowSide) -> &AssetLeg {
        match side {
            EscrowSide::Source => &self.source,
            EscrowSide::Destination => &self.destination,
        }
    }
}

/// Builder for `SwapIntent`, mostly used by tests and the demo node.
#[derive(Clone, Debug)]
pub struct SwapIntentBuilder {
    source: AssetLeg,
    destination: AssetLeg,
    maker: PartyId,
    resolver: PartyId,
    hashlock: Hash,
    created_at: u64,
}

impl SwapIntentBuilder {
    /// Start from a hashlock and timestamp; legs default to ICP -> EVM mainnet.
    pub fn new(hashlock: Hash, created_at: u64) -> Self {
        let schedule = TimelockSchedule::new(60, 120, 180, 240);
        Self {
            source: AssetLeg {
                chain: ChainId::Icp,
                asset: "ICP".to_string(),
                amount: 0,
                safety_deposit: 0,
                schedule,
            },
            destination: AssetLeg {
                chain: ChainId::Evm(1),
                asset: "ETH".to_string(),
                amount: 0,
                safety_deposit: 0,
                schedule,
            },
            maker: PartyId::new("maker"),
            resolver: PartyId::new("resolver"),
            hashlock,
            created_at,
        }
    }

    /// Set source chain and asset.
    pub fn source_asset(mut self, chain: ChainId, asset: impl Into<String>) -> Self {
        self.source.chain = chain;
        self.source.asset = asset.into();
        self
    }

    /// Set destination chain and asset.
    pub fn destination_asset(mut self, chain: ChainId, asset: impl Into<String>) -> Self {
        self.destination.chain = chain;
        self.destination.asset = asset.into();
        self
    }

    /// Set source amount.
    pub fn source_amount(mut self, amount: u64) -> Self {
        self.source.amount = amount;
        self
    }

    /// Set destination amount.
    pub fn destination_amount(mut self, amount: u64) -> Self {
        self.destination.amount = amount;
        self
    }

    /// Set the safety deposit on both legs.
    pub fn safety_deposit(mut self, deposit: u64) -> Self {
        self.source.safety_deposit = deposit;
        self.destination.safety_deposit = deposit;
        self
    }

    /// Set source schedule.
    pub fn source_schedule(mut self, schedule: TimelockSchedule) -> Self {
        self.source.schedule = schedule;
        self
    }

    /// Set destination schedule.
    pub fn destination_schedule(mut self, schedule: TimelockSchedule) -> Self {
        self.destination.schedule = schedule;
        self
    }

    /// Set maker.
    pub fn maker(mut self, maker: impl Into<String>) -> Self {
        self.maker = PartyId::new(maker);
        self
    }

    /// Set resolver.
    pub fn resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver = PartyId::new(resolver);
        self
    }

    /// Build the intent.
    pub fn build(self) -> SwapIntent {
        SwapIntent {
            source: self.source,
            destination: self.destination,
            maker: self.maker,
            resolver: self.resolver,
            hashlock: self.hashlock,
            created_at: self.created_at,
        }
    }
}

/// Adapter call currently outstanding for an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InFlightOp {
    /// `create_escrow`
    Create,
    /// `query_state`
    Query,
    /// `submit_withdrawal`
    Withdraw,
    /// `submit_cancellation`
    Cancel,
}

/// One side of a swap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Correlates the two sides.
    pub swap_id: SwapId,
    /// Source or destination.
    pub side: EscrowSide,
    /// Chain the escrow lives on.
    pub chain: ChainId,
    /// Depositor.
    pub owner: PartyId,
    /// Intended recipient.
    pub beneficiary: PartyId,
    /// Asset identifier.
    pub asset: String,
    /// Amount owed to the beneficiary.
    pub amount: u64,
    /// Resolver stake on top of `amount`.
    pub safety_deposit: u64,
    /// Same on both sides of a swap.
    pub hashlock: Hash,
    /// Phase boundaries relative to `deployed_at`.
    pub timelock_schedule: TimelockSchedule,
    /// Timelock anchor, shared by both sides once the source escrow exists.
    pub deployed_at: Option<u64>,
    /// Escrow lifecycle.
    pub state: EscrowState,
    /// Adapter handle, set on creation.
    pub chain_escrow_address: Option<ChainHandle>,
    /// `create_escrow` attempts so far.
    pub create_attempts: u32,
    /// Withdrawal / cancellation attempts so far.
    pub action_attempts: u32,
    /// Earliest time for the next adapter retry.
    pub next_attempt_at: u64,
    /// When the record was created.
    pub created_at: u64,
    /// Last state change.
    pub last_transition_at: u64,
    /// Outstanding adapter call. Never persisted.
    #[serde(skip)]
    pub in_flight: Option<InFlightOp>,
}

impl EscrowRecord {
    /// Build the record for one side of an intent.
    pub fn for_side(swap_id: SwapId, intent: &SwapIntent, side: EscrowSide, now: u64) -> Self {
        let leg = intent.leg(side);
        let (owner, beneficiary) = match side {
            EscrowSide::Source => (intent.maker.clone(), intent.resolver.clone()),
            EscrowSide::Destination => (intent.resolver.clone(), intent.maker.clone()),
        };
        Self {
            swap_id,
            side,
            chain: leg.chain,
            owner,
            beneficiary,
            asset: leg.asset.clone(),
            amount: leg.amount,
            safety_deposit: leg.safety_deposit,
            hashlock: intent.hashlock,
            timelock_schedule: leg.schedule,
            deployed_at: None,
            state: EscrowState::Requested,
            chain_escrow_address: None,
            create_attempts: 0,
            action_attempts: 0,
            next_attempt_at: 0,
            created_at: now,
            last_transition_at: now,
            in_flight: None,
        }
    }

    /// Amount the escrow must hold to count as funded.
    pub fn required_funding(&self) -> u64 {
        self.amount.saturating_add(self.safety_deposit)
    }

    /// Current timelock phase; `Active` until anchored.
    pub fn phase(&self, now: u64) -> TimelockPhase {
        match self.deployed_at {
            Some(deployed_at) => TimelockPolicy::phase_of(&self.timelock_schedule, deployed_at, now),
            None => TimelockPhase::Active,
        }
    }

    /// Absolute time at which `phase` starts, once anchored.
    pub fn phase_starts_at(&self, phase: TimelockPhase) -> Option<u64> {
        self.deployed_at
            .map(|anchor| anchor.saturating_add(self.timelock_schedule.boundary(phase)))
    }

    /// Whether a retry is due.
    pub fn retry_due(&self, now: u64) -> bool {
        self.in_flight.is_none() && now >= self.next_attempt_at
    }

    /// Compare-and-set on `state`. Returns false when the move is not allowed.
    pub fn try_transition(&mut self, next: EscrowState, now: u64) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.last_transition_at = now;
        self.next_attempt_at = 0;
        self.action_attempts = 0;
        true
    }
}

/// Audit trail entry kinds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwapEventKind {
    /// Intent accepted.
    Initiated,
    /// Coordination state changed.
    StateChanged {
        /// Previous state
        from: CoordinationState,
        /// New state
        to: CoordinationState,
    },
    /// `create_escrow` issued.
    EscrowRequested {
        /// Side
        side: EscrowSide,
        /// Attempt number (1-based)
        attempt: u32,
    },
    /// `create_escrow` failed.
    CreationFailed {
        /// Side
        side: EscrowSide,
        /// Attempt number (1-based)
        attempt: u32,
        /// Adapter error text
        error: String,
    },
    /// Escrow exists on chain.
    EscrowCreated {
        /// Side
        side: EscrowSide,
        /// Adapter handle
        handle: ChainHandle,
    },
    /// Escrow verified funded.
    EscrowFunded {
        /// Side
        side: EscrowSide,
        /// Reported balance
        amount: u64,
    },
    /// Secret accepted.
    SecretRevealed,
    /// Reveal attempt refused.
    RevealRejected {
        /// Error label
        reason: String,
    },
    /// Withdrawal sent to the adapter.
    WithdrawalSubmitted {
        /// Side
        side: EscrowSide,
    },
    /// Adapter confirmed the withdrawal.
    WithdrawalConfirmed {
        /// Side
        side: EscrowSide,
    },
    /// Cancellation sent to the adapter.
    CancellationSubmitted {
        /// Side
        side: EscrowSide,
    },
    /// Adapter confirmed the cancellation.
    CancellationConfirmed {
        /// Side
        side: EscrowSide,
    },
}

/// Timestamped audit entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    /// Unix seconds.
    pub at: u64,
    /// What happened.
    #[serde(flatten)]
    pub kind: SwapEventKind,
}

/// Aggregate for one swap. Owned by the registry, mutated only by the
/// coordinator (and, through it, the recovery scheduler).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Swap identifier.
    pub swap_id: SwapId,
    /// Agreed terms.
    pub intent: SwapIntent,
    /// Source-chain escrow.
    pub source: EscrowRecord,
    /// Destination-chain escrow.
    pub destination: EscrowRecord,
    /// Swap state machine.
    pub coordination_state: CoordinationState,
    /// Preimage, present only after reveal.
    pub secret: Option<SecureSecret>,
    /// Initiation time.
    pub created_at: u64,
    /// Last coordination state change.
    pub last_transition_at: u64,
    /// Append-only audit trail.
    pub events: Vec<SwapEvent>,
}

impl SwapRecord {
    /// New record in `Pending` with both escrows `Requested`.
    pub fn new(intent: SwapIntent, now: u64) -> Self {
        let swap_id = intent.swap_id();
        let source = EscrowRecord::for_side(swap_id, &intent, EscrowSide::Source, now);
        let destination = EscrowRecord::for_side(swap_id, &intent, EscrowSide::Destination, now);
        Self {
            swap_id,
            intent,
            source,
            destination,
            coordination_state: CoordinationState::Pending,
            secret: None,
            created_at: now,
            last_transition_at: now,
            events: vec![SwapEvent {
                at: now,
                kind: SwapEventKind::Initiated,
            }],
        }
    }

    /// Escrow for one side.
    pub fn escrow(&self, side: EscrowSide) -> &EscrowRecord {
        match side {
            EscrowSide::Source => &self.source,
            EscrowSide::Destination => &self.destination,
        }
    }

    /// Mutable escrow for one side.
    pub fn escrow_mut(&mut self, side: EscrowSide) -> &mut EscrowRecord {
        match side {
            EscrowSide::Source => &mut self.source,
            EscrowSide::Destination => &mut self.destination,
        }
    }

    /// Append an audit entry.
    pub fn record(&mut self, now: u64, kind: SwapEventKind) {
        self.events.push(SwapEvent { at: now, kind });
    }

    /// Move the coordination state, recording the change.
    pub fn transition_to(&mut self, next: CoordinationState, now: u64) -> EscrowResult<()> {
        let from = self.coordination_state;
        if !from.can_transition_to(next) {
            return Err(EscrowError::InvalidTransition { from, to: next });
        }
        self.coordination_state = next;
        self.last_transition_at = now;
        self.record(now, SwapEventKind::StateChanged { from, to: next });
        Ok(())
    }

    /// Whether the swap reached Completed, Refunded or Failed.
    pub fn is_terminal(&self) -> bool {
        self.coordination_state.is_terminal()
    }

    /// Anchor both timelock schedules. The first anchor wins.
    pub fn anchor_timelocks(&mut self, deployed_at: u64) {
        if self.source.deployed_at.is_none() {
            self.source.deployed_at = Some(deployed_at);
        }
        if self.destination.deployed_at.is_none() {
            self.destination.deployed_at = self.source.deployed_at;
        }
    }

    /// Sides whose escrow currently holds funds.
    pub fn funded_sides(&self) -> Vec<EscrowSide> {
        EscrowSide::BOTH
            .into_iter()
            .filter(|side| self.escrow(*side).state == EscrowState::Funded)
            .collect()
    }

    /// Earliest side to enter `Cancellation` by `now`, if any.
    pub fn expired_side(&self, now: u64) -> Option<EscrowSide> {
        EscrowSide::BOTH
            .into_iter()
            .find(|side| self.escrow(*side).phase(now).is_cancellable())
    }

    /// Number of audit entries of a given shape.
    pub fn count_events(&self, predicate: impl Fn(&SwapEventKind) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(&e.kind)).count()
    }
}
