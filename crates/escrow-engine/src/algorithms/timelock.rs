//! # Timelock Policy
//!
//! Phase computation and the permission table for each phase.
//!
//! | Phase              | Withdraw          | Cancel    |
//! |--------------------|-------------------|-----------|
//! | Active, Withdrawal | beneficiary       | nobody    |
//! | PublicWithdrawal   | anyone w/ secret  | nobody    |
//! | Cancellation       | nobody            | owner     |
//! | PublicCancellation | nobody            | anyone    |

use crate::domain::{
    invariant_destination_shorter, CallerRole, EscrowError, TimelockPhase, TimelockSchedule,
};

/// Stateless timelock rules.
pub struct TimelockPolicy;

impl TimelockPolicy {
    /// Reject zero-length or non-increasing schedules.
    pub fn validate(schedule: &TimelockSchedule) -> Result<(), EscrowError> {
        if schedule.withdrawal == 0 {
            return Err(EscrowError::invalid_schedule("withdrawal offset is zero"));
        }
        let bounds = schedule.as_array();
        for pair in bounds.windows(2) {
            if pair[0] >= pair[1] {
                return Err(EscrowError::invalid_schedule(format!(
                    "boundaries not strictly increasing: {:?}",
                    bounds
                )));
            }
        }
        Ok(())
    }

    /// Validate both schedules and the destination-shorter rule.
    pub fn validate_pair(
        source: &TimelockSchedule,
        destination: &TimelockSchedule,
        finality_buffer_secs: u64,
    ) -> Result<(), EscrowError> {
        Self::validate(source)?;
        Self::validate(destination)?;
        invariant_destination_shorter(source, destination, finality_buffer_secs)
    }

    /// Phase at `now` for a schedule anchored at `deployed_at`.
    pub fn phase_of(schedule: &TimelockSchedule, deployed_at: u64, now: u64) -> TimelockPhase {
        let elapsed = now.saturating_sub(deployed_at);
        if elapsed >= schedule.public_cancellation {
            TimelockPhase::PublicCancellation
        } else if elapsed >= schedule.cancellation {
            TimelockPhase::Cancellation
        } else if elapsed >= schedule.public_withdrawal {
            TimelockPhase::PublicWithdrawal
        } else if elapsed >= schedule.withdrawal {
            TimelockPhase::Withdrawal
        } else {
            TimelockPhase::Active
        }
    }

    /// Next phase and the absolute time it starts, or `None` in the last phase.
    pub fn next_transition(
        schedule: &TimelockSchedule,
        deployed_at: u64,
        now: u64,
    ) -> Option<(TimelockPhase, u64)> {
        let next = match Self::phase_of(schedule, deployed_at, now) {
            TimelockPhase::Active => TimelockPhase::Withdrawal,
            TimelockPhase::Withdrawal => TimelockPhase::PublicWithdrawal,
            TimelockPhase::PublicWithdrawal => TimelockPhase::Cancellation,
            TimelockPhase::Cancellation => TimelockPhase::PublicCancellation,
            TimelockPhase::PublicCancellation => return None,
        };
        Some((next, deployed_at.saturating_add(schedule.boundary(next))))
    }

    /// Whether `role` may withdraw (with the secret) during `phase`.
    pub fn may_withdraw(phase: TimelockPhase, role: CallerRole) -> bool {
        match phase {
            TimelockPhase::Active | TimelockPhase::Withdrawal => role == CallerRole::Beneficiary,
            TimelockPhase::PublicWithdrawal => true,
            TimelockPhase::Cancellation | TimelockPhase::PublicCancellation => false,
        }
    }

    /// Whether `role` may cancel during `phase`.
    pub fn may_cancel(phase: TimelockPhase, role: CallerRole) -> bool {
        match phase {
            TimelockPhase::Cancellation => role == CallerRole::Owner,
            TimelockPhase::PublicCancellation => true,
            _ => false,
        }
    }
}
