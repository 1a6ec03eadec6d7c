use anchor_lang::prelude::*;

// ---------------------------------------------------------------------------
// Store-credit ledger — append-only entries plus a cached balance
// ---------------------------------------------------------------------------

/// Cached store-credit balance for O(1) reads.
/// PDA seeds = [b"credits", user]. Always updated in the same transaction as
/// the ledger entry that changes it.
#[account]
pub struct CreditBalance {
    /// The user this balance belongs to.
    pub user: Pubkey,
    /// Current balance in euro cents. May go negative after a revocation if
    /// the credit was already spent; accepted business risk, not an error.
    pub balance_cents: i64,
    /// Number of ledger entries written for this user.
    pub entry_count: u32,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl CreditBalance {
    pub const SEED: &'static [u8] = b"credits";
    pub const SIZE: usize = 8 + 32 + 8 + 4 + 1;
}

/// What a ledger entry references.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerReference {
    /// Credit for a converted referral.
    ReferralReward,
    /// Reversal after the triggering order was refunded.
    ReferralRevocation,
}

/// Immutable, signed store-credit transaction.
/// PDA seeds = [b"ledger", relationship, [direction]] with direction
/// `DIRECTION_CREDIT` or `DIRECTION_DEBIT` — the seed layout IS the
/// idempotency key (reference id + sign), so for any relationship at most one
/// credit and one reversal can ever exist.
#[account]
pub struct LedgerEntry {
    /// The user whose balance this entry moved.
    pub user: Pubkey,
    /// Signed amount in euro cents (+reward or -reward).
    pub amount_cents: i64,
    /// Cached balance before this entry was applied.
    pub balance_before: i64,
    /// Cached balance after this entry was applied.
    pub balance_after: i64,
    /// Why this entry exists.
    pub reference_type: LedgerReference,
    /// The ReferralRelationship this entry references.
    pub relationship: Pubkey,
    /// Unix timestamp of the write.
    pub created_at: i64,
    /// Bump seed for this PDA.
    pub bump: u8,
}

impl LedgerEntry {
    pub const SEED: &'static [u8] = b"ledger";
    pub const SIZE: usize = 8 + 32 + 8 + 8 + 8 + 1 + 32 + 8 + 1;

    pub const DIRECTION_CREDIT: u8 = 0;
    pub const DIRECTION_DEBIT: u8 = 1;
}
