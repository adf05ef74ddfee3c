//! # Domain Invariants
//!
//! Business rules checked when an intent is accepted and before funds move.

use super::entities::{SwapIntent, SwapRecord};
use super::errors::{EscrowError, Hash};
use super::value_objects::TimelockSchedule;

/// Invariant: both escrows of a swap commit to the same hashlock.
pub fn invariant_hashlock_match(record: &SwapRecord) -> bool {
    record.source.hashlock == record.destination.hashlock
        && record.source.hashlock == record.intent.hashlock
}

/// Invariant: hashlock is not the all-zero placeholder.
pub fn invariant_hashlock_well_formed(hashlock: &Hash) -> bool {
    hashlock.iter().any(|b| *b != 0)
}

/// Invariant: destination withdrawals close no later than source
/// cancellation opens, with `buffer_secs` to spare.
pub fn invariant_destination_shorter(
    source: &TimelockSchedule,
    destination: &TimelockSchedule,
    buffer_secs: u64,
) -> Result<(), EscrowError> {
    let dest_close = destination.cancellation.saturating_add(buffer_secs);
    if dest_close > source.cancellation {
        return Err(EscrowError::invalid_intent(format!(
            "destination cancellation {}s + buffer {}s exceeds source cancellation {}s",
            destination.cancellation, buffer_secs, source.cancellation
        )));
    }
    Ok(())
}

/// Invariant: both legs move a non-zero amount.
pub fn invariant_non_zero_amounts(intent: &SwapIntent) -> Result<(), EscrowError> {
    if intent.source.amount == 0 {
        return Err(EscrowError::invalid_intent("source amount is zero"));
    }
    if intent.destination.amount == 0 {
        return Err(EscrowError::invalid_intent("destination amount is zero"));
    }
    Ok(())
}

/// Invariant: maker and resolver are different parties on different chains.
pub fn invariant_distinct_parties(intent: &SwapIntent) -> Result<(), EscrowError> {
    if intent.maker == intent.resolver {
        return Err(EscrowError::invalid_intent("maker and resolver are the same party"));
    }
    if intent.source.chain == intent.destination.chain {
        return Err(EscrowError::invalid_intent(format!(
            "both legs on {}",
            intent.source.chain
        )));
    }
    Ok(())
}
