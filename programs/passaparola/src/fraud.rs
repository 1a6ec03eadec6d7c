use anchor_lang::prelude::*;

use crate::state::IpActivity;

/// Self-referral check: the code owner must not be the new user, by id or by
/// (hashed) email. A user re-registering under a second address with the same
/// email is the case the email comparison catches.
pub fn is_self_referral(
    new_user: &Pubkey,
    new_user_email_hash: &[u8; 32],
    code_owner: &Pubkey,
    code_owner_email_hash: &[u8; 32],
) -> bool {
    code_owner == new_user || code_owner_email_hash == new_user_email_hash
}

/// Credited conversions recorded for this IP within the trailing window.
/// Empty ring slots hold 0 and never count (unix time 0 is far outside any
/// realistic window).
pub fn window_count(timestamps: &[i64; IpActivity::RING_CAPACITY], now: i64, window_secs: i64) -> u8 {
    timestamps
        .iter()
        .filter(|&&ts| ts != 0 && now.saturating_sub(ts) < window_secs)
        .count() as u8
}

/// The velocity decision. Must be evaluated in the same transaction that
/// writes the conversion, so two racing conversions can never both read the
/// count below the cap and both credit.
pub fn ip_velocity_allows(
    timestamps: &[i64; IpActivity::RING_CAPACITY],
    now: i64,
    window_secs: i64,
    limit: u8,
) -> bool {
    window_count(timestamps, now, window_secs) < limit
}

/// Record a credited conversion for this IP, overwriting the oldest slot.
pub fn record_conversion(timestamps: &mut [i64; IpActivity::RING_CAPACITY], now: i64) {
    let oldest = timestamps
        .iter()
        .enumerate()
        .min_by_key(|(_, &ts)| ts)
        .map(|(i, _)| i)
        .unwrap_or(0);
    timestamps[oldest] = now;
}

/// Read-only review alert; fires an admin notification, never blocks a reward.
pub fn review_threshold_reached(conversions: u32, threshold: u32) -> bool {
    threshold != 0 && conversions >= threshold
}
