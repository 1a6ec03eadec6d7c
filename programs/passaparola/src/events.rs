use anchor_lang::prelude::*;

use crate::state::ConfigParam;

/// Why a presented referral code was silently ignored at signup.
/// Deliberate product contract: registration always succeeds with the
/// standard code; the reason is only logged, never surfaced to the user.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    CodeNotFound,
    CodeInactive,
    SelfReferral,
    ReferrerSuspended,
}

/// Why a qualifying conversion did not credit the referrer.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithholdReason {
    IpVelocityCap,
    ReferrerSuspended,
}

#[event]
pub struct SignupCompleted {
    pub user: Pubkey,
    /// Full first-order code, e.g. "BENVENUTO-X7K3M9".
    pub code: String,
    pub discount_percent: u8,
    pub is_referral: bool,
    pub timestamp: i64,
}

#[event]
pub struct SignupFallback {
    pub user: Pubkey,
    pub reason: FallbackReason,
    pub timestamp: i64,
}

#[event]
pub struct ReferralCodeCreated {
    pub owner: Pubkey,
    pub code: String,
    pub timestamp: i64,
}

#[event]
pub struct ReferralLinked {
    pub referrer: Pubkey,
    pub referee: Pubkey,
    pub reward_cents: u64,
    pub timestamp: i64,
}

#[event]
pub struct FirstOrderCodeApplied {
    pub user: Pubkey,
    pub subtotal_cents: u64,
    pub discount_cents: u64,
    pub timestamp: i64,
}

#[event]
pub struct RewardCredited {
    pub referrer: Pubkey,
    pub referee: Pubkey,
    pub order_id: [u8; 32],
    pub amount_cents: u64,
    pub new_balance_cents: i64,
    pub timestamp: i64,
}

#[event]
pub struct RewardWithheld {
    pub referrer: Pubkey,
    pub referee: Pubkey,
    pub order_id: [u8; 32],
    pub reason: WithholdReason,
    pub timestamp: i64,
}

#[event]
pub struct RewardRevoked {
    pub referrer: Pubkey,
    pub order_id: [u8; 32],
    pub amount_cents: u64,
    pub new_balance_cents: i64,
    pub timestamp: i64,
}

#[event]
pub struct RefundOutsideWindow {
    pub order_id: [u8; 32],
    pub completed_at: i64,
    pub refunded_at: i64,
}

/// Non-blocking admin alert; never gates the reward itself.
#[event]
pub struct ReviewThresholdReached {
    pub referrer: Pubkey,
    pub conversions: u32,
    pub threshold: u32,
}

#[event]
pub struct UserSuspended {
    pub user: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct ConfigUpdated {
    pub param: ConfigParam,
    pub value: u64,
    pub version: u32,
}
