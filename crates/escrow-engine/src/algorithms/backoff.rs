//! Exponential retry backoff.

/// Delay before retry number `attempt + 1`, after `attempt` failures:
/// `base * 2^(attempt - 1)`, capped at `max`.
pub fn backoff_delay(attempt: u32, base_secs: u64, max_secs: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }
    let shift = (attempt - 1).min(32);
    base_secs.saturating_mul(1u64 << shift).min(max_secs)
}
