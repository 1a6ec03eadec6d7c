use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::events::{RefundOutsideWindow, RewardRevoked};
use crate::state::{
    CreditBalance, LedgerEntry, LedgerReference, ProcessedOrder, ProgramConfig, ReferralCode,
    ReferralRelationship, RelationshipStatus,
};
use super::{create_pda_account, expect_pda, try_read_account, write_account};

#[derive(Accounts)]
#[instruction(order_id: [u8; 32])]
pub struct RecordRefund<'info> {
    #[account(mut)]
    pub gateway: Signer<'info>,

    #[account(
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
        constraint = config.gateway == gateway.key() @ EngineError::GatewayOnly,
    )]
    pub config: Account<'info, ProgramConfig>,

    /// The receipt written when the payment completed; carries the original
    /// completion date for the revocation-window check.
    #[account(
        mut,
        seeds = [ProcessedOrder::SEED, order_id.as_ref()],
        bump = processed_order.bump,
    )]
    pub processed_order: Account<'info, ProcessedOrder>,

    /// CHECK: Must match processed_order.relationship; validated in handler.
    #[account(mut)]
    pub relationship: UncheckedAccount<'info>,

    /// CHECK: Address and content validated in the handler.
    #[account(mut)]
    pub referrer_code: Option<UncheckedAccount<'info>>,

    /// CHECK: Address verified in the handler.
    #[account(mut)]
    pub credit_balance: Option<UncheckedAccount<'info>>,

    /// Debit-direction ledger entry; PDA uniqueness is the double-revocation
    /// guard.
    /// CHECK: Address verified in the handler.
    #[account(mut)]
    pub ledger_entry: Option<UncheckedAccount<'info>>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<RecordRefund>, order_id: [u8; 32], refunded_at: i64) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let processed_order = &mut ctx.accounts.processed_order;

    // 1. Refund webhooks may also be delivered more than once.
    if processed_order.refunded {
        msg!("refund already processed; no-op");
        return Ok(());
    }
    processed_order.refunded = true;

    if !processed_order.credited {
        msg!("order carried no referral reward; receipt only");
        return Ok(());
    }

    // 2. Too late to revoke: the reward stands, the relationship stays
    //    Converted. The window is measured against the storefront's refund
    //    timestamp, not delivery time, so a late-retried webhook decides the
    //    same way as a prompt one.
    let window_secs = ctx.accounts.config.revocation_window_days as i64 * 86_400;
    if refunded_at.saturating_sub(processed_order.completed_at) > window_secs {
        msg!("refund outside the revocation window; reward stands");
        emit!(RefundOutsideWindow {
            order_id,
            completed_at: processed_order.completed_at,
            refunded_at,
        });
        return Ok(());
    }

    // 3. Load and check the relationship this order converted.
    let rel_info = ctx.accounts.relationship.to_account_info();
    require_keys_eq!(
        rel_info.key(),
        processed_order.relationship,
        EngineError::OrderMismatch
    );
    let mut rel: ReferralRelationship =
        try_read_account(&rel_info).ok_or(error!(EngineError::OrderMismatch))?;
    require!(rel.converted_order == order_id, EngineError::OrderMismatch);
    if rel.status != RelationshipStatus::Converted {
        // Revocation is one-way; nothing left to reverse.
        msg!("relationship is {:?}; no-op", rel.status);
        return Ok(());
    }

    // 4. Reverse the ledger. The debit PDA rejects a second reversal; the
    //    balance may go negative if the credit was already spent.
    let rel_key = rel_info.key();

    let le_info = ctx
        .accounts
        .ledger_entry
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    let le_bump = expect_pda(
        le_info,
        &[
            LedgerEntry::SEED,
            rel_key.as_ref(),
            &[LedgerEntry::DIRECTION_DEBIT],
        ],
    )?;
    require!(le_info.data_is_empty(), EngineError::AlreadyRevoked);

    let bal_info = ctx
        .accounts
        .credit_balance
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    expect_pda(bal_info, &[CreditBalance::SEED, rel.referrer.as_ref()])?;
    let mut balance: CreditBalance =
        try_read_account(bal_info).ok_or(error!(EngineError::NothingToRevoke))?;

    let reward = rel.reward_cents;
    let balance_before = balance.balance_cents;
    let balance_after = balance_before
        .checked_sub(reward as i64)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;

    create_pda_account(
        &ctx.accounts.gateway.to_account_info(),
        le_info,
        &ctx.accounts.system_program.to_account_info(),
        LedgerEntry::SIZE,
        &[
            LedgerEntry::SEED,
            rel_key.as_ref(),
            &[LedgerEntry::DIRECTION_DEBIT],
            &[le_bump],
        ],
    )?;
    write_account(
        le_info,
        &LedgerEntry {
            user: rel.referrer,
            amount_cents: -(reward as i64),
            balance_before,
            balance_after,
            reference_type: LedgerReference::ReferralRevocation,
            relationship: rel_key,
            created_at: now,
            bump: le_bump,
        },
    )?;

    balance.balance_cents = balance_after;
    balance.entry_count = balance
        .entry_count
        .checked_add(1)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;
    write_account(bal_info, &balance)?;

    rel.status = RelationshipStatus::Revoked;
    rel.revoked_at = now;
    write_account(&rel_info, &rel)?;

    // 5. Keep the referrer's rollup counters in step with the ledger.
    let rc_info = ctx
        .accounts
        .referrer_code
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    expect_pda(rc_info, &[ReferralCode::SEED, rel.referrer.as_ref()])?;
    let mut rc: ReferralCode =
        try_read_account(rc_info).ok_or(error!(EngineError::MissingReferrerAccounts))?;
    rc.converted = rc.converted.saturating_sub(1);
    rc.revoked = rc
        .revoked
        .checked_add(1)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;
    rc.total_earned_cents = rc
        .total_earned_cents
        .checked_sub(reward as i64)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;
    write_account(rc_info, &rc)?;

    emit!(RewardRevoked {
        referrer: rel.referrer,
        order_id,
        amount_cents: reward,
        new_balance_cents: balance_after,
        timestamp: now,
    });

    Ok(())
}
