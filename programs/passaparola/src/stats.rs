use anchor_lang::prelude::*;

use crate::state::{ProgramConfig, ReferralCode};

/// Per-referrer rollup. Derived from counters that are maintained in the same
/// transaction as the relationship/ledger writes they count, so these values
/// always equal the live sums over the underlying accounts.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferralStats {
    pub total_invites: u32,
    pub conversions: u32,
    pub revoked: u32,
    pub pending_reward_cents: u64,
    pub total_earned_cents: i64,
}

pub fn referral_stats(code: &ReferralCode) -> ReferralStats {
    ReferralStats {
        total_invites: code.total_invites,
        conversions: code.converted,
        revoked: code.revoked,
        pending_reward_cents: code.pending_reward_cents,
        total_earned_cents: code.total_earned_cents,
    }
}

/// Answer for the cart banner: pure function of config + subtotal, no state.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BonusEligibility {
    pub is_eligible: bool,
    /// How much more the cart needs to qualify (0 when eligible).
    pub amount_needed_cents: u64,
    pub bonus_cents: u64,
    pub minimum_order_cents: u64,
}

pub fn referral_bonus_eligibility(config: &ProgramConfig, subtotal_cents: u64) -> BonusEligibility {
    BonusEligibility {
        is_eligible: subtotal_cents >= config.min_order_cents,
        amount_needed_cents: config.min_order_cents.saturating_sub(subtotal_cents),
        bonus_cents: config.referral_reward_cents,
        minimum_order_cents: config.min_order_cents,
    }
}

/// Discount owed at checkout: subtotal x pct / 100, floor. Shipping is never
/// part of the base. Saturates on absurd subtotals rather than wrapping.
pub fn first_order_discount_cents(subtotal_cents: u64, percent: u8) -> u64 {
    subtotal_cents.saturating_mul(percent as u64) / 100
}
