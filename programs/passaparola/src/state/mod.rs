use anchor_lang::prelude::*;

pub mod ledger;
pub use ledger::*;

/// Global engine configuration. Singleton PDA (seeds = [b"config"]).
///
/// Every value that matters to an issued code or relationship is copied into
/// the created account at issuance time. Updating the config here only affects
/// future issuance, never existing records.
#[account]
pub struct ProgramConfig {
    /// The admin who initialized the engine.
    pub admin: Pubkey,
    /// Pending admin for two-step transfer (Pubkey::default() = no pending transfer).
    pub pending_admin: Pubkey,
    /// The storefront backend authorized to forward signup/payment/refund events.
    pub gateway: Pubkey,
    /// Incremented on every parameter change.
    pub version: u32,
    /// Standard first-order discount in percent.
    pub first_order_discount: u8,
    /// First-order discount in percent when a valid referral code was presented.
    pub referral_first_order_discount: u8,
    /// Store-credit reward for the referrer, in euro cents.
    pub referral_reward_cents: u64,
    /// Minimum order subtotal for referral-bonus eligibility, in euro cents.
    pub min_order_cents: u64,
    /// First-order code validity, in days from issuance.
    pub code_validity_days: u16,
    /// Refunds older than this many days after completion no longer revoke.
    pub revocation_window_days: u16,
    /// Max credited conversions per IP in the trailing window.
    pub ip_conversion_limit: u8,
    /// Trailing window for the IP velocity cap, in hours.
    pub ip_window_hours: u16,
    /// Conversion count at which a referrer is flagged for manual review.
    pub review_threshold: u32,
    /// Bump seed for the config PDA.
    pub bump: u8,
}

impl ProgramConfig {
    pub const SEED: &'static [u8] = b"config";
    // discriminator(8) + 3 pubkeys(96) + version(4) + discounts(2) + reward(8)
    // + min_order(8) + validity(2) + window(2) + ip_limit(1) + ip_hours(2)
    // + review(4) + bump(1)
    pub const SIZE: usize = 8 + 32 * 3 + 4 + 2 + 8 + 8 + 2 + 2 + 1 + 2 + 4 + 1;

    pub const DEFAULT_FIRST_ORDER_DISCOUNT: u8 = 10;
    pub const DEFAULT_REFERRAL_FIRST_ORDER_DISCOUNT: u8 = 15;
    pub const DEFAULT_REFERRAL_REWARD_CENTS: u64 = 500;
    pub const DEFAULT_MIN_ORDER_CENTS: u64 = 2_000;
    pub const DEFAULT_CODE_VALIDITY_DAYS: u16 = 30;
    pub const DEFAULT_REVOCATION_WINDOW_DAYS: u16 = 14;
    pub const DEFAULT_IP_CONVERSION_LIMIT: u8 = 3;
    pub const DEFAULT_IP_WINDOW_HOURS: u16 = 24;
    pub const DEFAULT_REVIEW_THRESHOLD: u32 = 50;
}

/// Typed key for `update_config`. Pubkey-valued settings (admin, gateway)
/// have their own instructions.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigParam {
    FirstOrderDiscount,
    ReferralFirstOrderDiscount,
    ReferralRewardCents,
    MinOrderCents,
    CodeValidityDays,
    RevocationWindowDays,
    IpConversionLimit,
    IpWindowHours,
    ReviewThreshold,
}

/// One record per storefront user, created at signup.
/// PDA seeds = [b"member", user]. Its existence is the signup idempotency guard.
#[account]
pub struct MemberAccount {
    /// The storefront user id this record belongs to.
    pub user: Pubkey,
    /// blake3 of the normalized signup email. Used for self-referral detection.
    pub email_hash: [u8; 32],
    /// Set by admin suspension; blocks future referral credits.
    pub suspended: bool,
    /// Completed (paid) orders. 0 = first-order code still applicable.
    pub completed_orders: u32,
    /// Unix timestamp of signup. 0 only on a zeroed account.
    pub created_at: i64,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl MemberAccount {
    pub const SEED: &'static [u8] = b"member";
    pub const SIZE: usize = 8 + 32 + 32 + 1 + 4 + 8 + 1;
}

/// A user's permanent referral code and their live referrer-side counters.
/// PDA seeds = [b"referral_code", owner]. One per user, immutable once created
/// (deactivated, never deleted, on suspension).
///
/// The counters are updated in the same transaction as the facts they count,
/// so stats reads never drift from ledger truth.
#[account]
pub struct ReferralCode {
    /// The user who owns (and shares) this code.
    pub owner: Pubkey,
    /// 8 characters from the 32-symbol alphabet (see `codes::ALPHABET`).
    pub code: [u8; 8],
    /// Cleared when the owner is suspended.
    pub is_active: bool,
    /// Relationships created with this code (all states).
    pub total_invites: u32,
    /// Relationships currently in Converted state.
    pub converted: u32,
    /// Relationships revoked after refund.
    pub revoked: u32,
    /// Sum of snapshot rewards for relationships still Pending.
    pub pending_reward_cents: u64,
    /// Net ledger sum for this referrer (credits minus revocations).
    pub total_earned_cents: i64,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl ReferralCode {
    pub const SEED: &'static [u8] = b"referral_code";
    pub const SIZE: usize = 8 + 32 + 8 + 1 + 4 + 4 + 4 + 8 + 8 + 8 + 1;
}

/// Global code -> owner mapping. PDA seeds = [b"code", code_bytes].
/// Account creation failing on an existing PDA is the collision guard.
#[account]
pub struct CodeLookup {
    /// Owner of the referral code in the seed.
    pub owner: Pubkey,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl CodeLookup {
    pub const SEED: &'static [u8] = b"code";
    pub const SIZE: usize = 8 + 32 + 1;
}

/// Per-user single-use welcome discount code, issued at signup.
/// PDA seeds = [b"first_order", user].
///
/// All values are copied from the config at signup; later config changes never
/// touch this account. The only mutations after signup are the 10 -> 15 upgrade
/// inside the signup transaction itself and the one-time consumption.
#[account]
pub struct FirstOrderCode {
    /// The user this code was issued to.
    pub owner: Pubkey,
    /// Random suffix; full code is "BENVENUTO-" + suffix.
    pub suffix: [u8; 6],
    /// Percentage discount (10 standard, 15 with referral).
    pub discount_percent: u8,
    /// Validity start (signup time).
    pub starts_at: i64,
    /// starts_at + code_validity_days, exactly.
    pub ends_at: i64,
    /// Always 1.
    pub usage_limit: u8,
    /// 0 or 1.
    pub usage_count: u8,
    /// Marks this promotion as a first-order code.
    pub is_first_order_code: bool,
    /// True when the discount was upgraded by a valid referral.
    pub referral_bonus: bool,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl FirstOrderCode {
    pub const SEED: &'static [u8] = b"first_order";
    pub const SIZE: usize = 8 + 32 + 6 + 1 + 8 + 8 + 1 + 1 + 1 + 1 + 1;

    /// Full human-readable code, e.g. "BENVENUTO-X7K3M9".
    pub fn code(&self) -> String {
        format!(
            "{}-{}",
            crate::codes::FIRST_ORDER_PREFIX,
            core::str::from_utf8(&self.suffix).unwrap_or("??????")
        )
    }
}

/// Referral relationship state machine. Strictly forward-only.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationshipStatus {
    /// Created at signup; waiting for the referee's first completed order.
    Pending,
    /// Reward credited on the referee's first qualifying order.
    Converted,
    /// Triggering order refunded within the window; reward reversed.
    Revoked,
}

/// Links exactly one referee to exactly one referrer.
/// PDA seeds = [b"referral", referee] — a user can be referred only once, ever.
#[account]
pub struct ReferralRelationship {
    /// Owner of the presented code.
    pub referrer: Pubkey,
    /// The new user who presented it.
    pub referee: Pubkey,
    /// Current state.
    pub status: RelationshipStatus,
    /// Reward snapshot taken from the config at signup.
    pub reward_cents: u64,
    /// blake3 of the signup IP.
    pub ip_hash: [u8; 32],
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Set on Pending -> Converted (0 before).
    pub converted_at: i64,
    /// Set on Converted -> Revoked (0 before).
    pub revoked_at: i64,
    /// True once the ledger credit exists.
    pub reward_credited: bool,
    /// Order id that triggered the conversion ([0; 32] before).
    pub converted_order: [u8; 32],
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl ReferralRelationship {
    pub const SEED: &'static [u8] = b"referral";
    pub const SIZE: usize = 8 + 32 + 32 + 1 + 8 + 32 + 8 + 8 + 8 + 1 + 32 + 1;
}

/// Webhook idempotency receipt, one per payment-completed order id.
/// PDA seeds = [b"order", order_id].
#[account]
pub struct ProcessedOrder {
    /// External order id (hashed by the gateway to 32 bytes).
    pub order_id: [u8; 32],
    /// The user who paid the order.
    pub payer: Pubkey,
    /// When the payment-completed event was processed.
    pub completed_at: i64,
    /// The relationship this order converted (Pubkey::default() = none).
    pub relationship: Pubkey,
    /// True when the order credited a referral reward.
    pub credited: bool,
    /// True once a refund event for this order was processed.
    pub refunded: bool,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl ProcessedOrder {
    pub const SEED: &'static [u8] = b"order";
    pub const SIZE: usize = 8 + 32 + 32 + 8 + 32 + 1 + 1 + 1;
}

/// Rolling record of credited conversions per IP.
/// PDA seeds = [b"ip", ip_hash].
#[account]
pub struct IpActivity {
    /// blake3 of the IP address.
    pub ip_hash: [u8; 32],
    /// Ring of the most recent credited-conversion timestamps (0 = empty slot).
    pub timestamps: [i64; IpActivity::RING_CAPACITY],
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl IpActivity {
    pub const SEED: &'static [u8] = b"ip";
    /// Upper bound for `ip_conversion_limit`; the ring only needs to hold
    /// enough timestamps to decide "count >= limit".
    pub const RING_CAPACITY: usize = 8;
    pub const SIZE: usize = 8 + 32 + 8 * Self::RING_CAPACITY + 1;
}
