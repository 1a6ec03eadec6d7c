use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::events::{ReviewThresholdReached, RewardCredited, RewardWithheld, WithholdReason};
use crate::fraud;
use crate::state::{
    CreditBalance, IpActivity, LedgerEntry, LedgerReference, MemberAccount, ProcessedOrder,
    ProgramConfig, ReferralCode, ReferralRelationship, RelationshipStatus,
};
use super::{create_pda_account, expect_pda, try_read_account, write_account};

#[derive(Accounts)]
#[instruction(order_id: [u8; 32], ip_hash: [u8; 32])]
pub struct RecordConversion<'info> {
    #[account(mut)]
    pub gateway: Signer<'info>,

    #[account(
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
        constraint = config.gateway == gateway.key() @ EngineError::GatewayOnly,
    )]
    pub config: Account<'info, ProgramConfig>,

    /// The paying user.
    /// CHECK: Used purely as a PDA seed.
    pub user: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [MemberAccount::SEED, user.key().as_ref()],
        bump = member.bump,
    )]
    pub member: Account<'info, MemberAccount>,

    /// Webhook idempotency receipt: a populated account means this order id
    /// was already processed and the whole instruction is a logged no-op.
    #[account(
        init_if_needed,
        payer = gateway,
        space = ProcessedOrder::SIZE,
        seeds = [ProcessedOrder::SEED, order_id.as_ref()],
        bump,
    )]
    pub processed_order: Account<'info, ProcessedOrder>,

    /// The payer's relationship, if they were referred. Empty for
    /// non-referral orders.
    /// CHECK: Address and content validated in the handler.
    #[account(mut)]
    pub relationship: UncheckedAccount<'info>,

    /// CHECK: Address and content validated in the handler.
    #[account(mut)]
    pub referrer_code: Option<UncheckedAccount<'info>>,

    /// CHECK: Address and content validated in the handler.
    pub referrer_member: Option<UncheckedAccount<'info>>,

    /// The referrer's cached balance; created here on their first credit.
    /// CHECK: Address verified in the handler.
    #[account(mut)]
    pub credit_balance: Option<UncheckedAccount<'info>>,

    /// Credit-direction ledger entry for this relationship; PDA uniqueness is
    /// the double-credit guard.
    /// CHECK: Address verified in the handler.
    #[account(mut)]
    pub ledger_entry: Option<UncheckedAccount<'info>>,

    #[account(
        init_if_needed,
        payer = gateway,
        space = IpActivity::SIZE,
        seeds = [IpActivity::SEED, ip_hash.as_ref()],
        bump,
    )]
    pub ip_activity: Account<'info, IpActivity>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<RecordConversion>, order_id: [u8; 32], ip_hash: [u8; 32]) -> Result<()> {
    let user = ctx.accounts.user.key();
    let now = Clock::get()?.unix_timestamp;

    // 1. Idempotency: payment webhooks may be delivered more than once.
    if ctx.accounts.processed_order.completed_at != 0 {
        msg!("order already processed; no-op");
        return Ok(());
    }

    let first_order = ctx.accounts.member.completed_orders == 0;
    ctx.accounts.member.completed_orders = ctx
        .accounts
        .member
        .completed_orders
        .checked_add(1)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;

    let processed_order = &mut ctx.accounts.processed_order;
    processed_order.order_id = order_id;
    processed_order.payer = user;
    processed_order.completed_at = now;
    processed_order.relationship = Pubkey::default();
    processed_order.credited = false;
    processed_order.refunded = false;
    processed_order.bump = ctx.bumps.processed_order;

    if ctx.accounts.ip_activity.ip_hash == [0u8; 32] {
        ctx.accounts.ip_activity.ip_hash = ip_hash;
        ctx.accounts.ip_activity.bump = ctx.bumps.ip_activity;
    }

    // 2. Referral lookup: no relationship means a plain, non-referral order.
    let rel_info = ctx.accounts.relationship.to_account_info();
    expect_pda(&rel_info, &[ReferralRelationship::SEED, user.as_ref()])?;
    let Some(mut rel) = try_read_account::<ReferralRelationship>(&rel_info) else {
        msg!("no referral relationship for payer; receipt only");
        return Ok(());
    };

    // 3. A reward fires once, on the first conversion only. Converted and
    //    Revoked are terminal here; a Pending relationship whose referee
    //    already ordered (earlier reward withheld) never retries.
    if rel.status != RelationshipStatus::Pending {
        msg!("relationship already {:?}; no-op", rel.status);
        return Ok(());
    }
    if !first_order {
        msg!("not the referee's first completed order; no-op");
        return Ok(());
    }

    processed_order.relationship = rel_info.key();

    // Referrer-side accounts are mandatory once we know this is a referral
    // order in Pending state.
    let rc_info = ctx
        .accounts
        .referrer_code
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    expect_pda(rc_info, &[ReferralCode::SEED, rel.referrer.as_ref()])?;
    let mut rc: ReferralCode =
        try_read_account(rc_info).ok_or(error!(EngineError::MissingReferrerAccounts))?;

    let rm_info = ctx
        .accounts
        .referrer_member
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    expect_pda(rm_info, &[MemberAccount::SEED, rel.referrer.as_ref()])?;
    let rm: MemberAccount =
        try_read_account(rm_info).ok_or(error!(EngineError::MissingReferrerAccounts))?;

    // 4. FraudGuard, evaluated in the same transaction that credits.
    if rm.suspended || !rc.is_active {
        msg!("referrer suspended; reward withheld, relationship stays pending");
        emit!(RewardWithheld {
            referrer: rel.referrer,
            referee: user,
            order_id,
            reason: WithholdReason::ReferrerSuspended,
            timestamp: now,
        });
        return Ok(());
    }

    let window_secs = ctx.accounts.config.ip_window_hours as i64 * 3_600;
    if !fraud::ip_velocity_allows(
        &ctx.accounts.ip_activity.timestamps,
        now,
        window_secs,
        ctx.accounts.config.ip_conversion_limit,
    ) {
        msg!("per-IP conversion cap reached; reward withheld");
        emit!(RewardWithheld {
            referrer: rel.referrer,
            referee: user,
            order_id,
            reason: WithholdReason::IpVelocityCap,
            timestamp: now,
        });
        return Ok(());
    }

    // 5. Credit. Ledger append, balance update and state transition are one
    //    atomic unit; the credit-direction PDA rejects any double credit.
    let le_info = ctx
        .accounts
        .ledger_entry
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    let rel_key = rel_info.key();
    let le_bump = expect_pda(
        le_info,
        &[
            LedgerEntry::SEED,
            rel_key.as_ref(),
            &[LedgerEntry::DIRECTION_CREDIT],
        ],
    )?;
    require!(le_info.data_is_empty(), EngineError::DuplicateReference);

    let bal_info = ctx
        .accounts
        .credit_balance
        .as_ref()
        .ok_or(error!(EngineError::MissingReferrerAccounts))?;
    let bal_bump = expect_pda(bal_info, &[CreditBalance::SEED, rel.referrer.as_ref()])?;
    let mut balance = match try_read_account::<CreditBalance>(bal_info) {
        Some(balance) => balance,
        None => {
            create_pda_account(
                &ctx.accounts.gateway.to_account_info(),
                bal_info,
                &ctx.accounts.system_program.to_account_info(),
                CreditBalance::SIZE,
                &[CreditBalance::SEED, rel.referrer.as_ref(), &[bal_bump]],
            )?;
            CreditBalance {
                user: rel.referrer,
                balance_cents: 0,
                entry_count: 0,
                bump: bal_bump,
            }
        }
    };

    let reward = rel.reward_cents;
    let balance_before = balance.balance_cents;
    let balance_after = balance_before
        .checked_add(reward as i64)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;

    create_pda_account(
        &ctx.accounts.gateway.to_account_info(),
        le_info,
        &ctx.accounts.system_program.to_account_info(),
        LedgerEntry::SIZE,
        &[
            LedgerEntry::SEED,
            rel_key.as_ref(),
            &[LedgerEntry::DIRECTION_CREDIT],
            &[le_bump],
        ],
    )?;
    write_account(
        le_info,
        &LedgerEntry {
            user: rel.referrer,
            amount_cents: reward as i64,
            balance_before,
            balance_after,
            reference_type: LedgerReference::ReferralReward,
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

    rel.status = RelationshipStatus::Converted;
    rel.converted_at = now;
    rel.reward_credited = true;
    rel.converted_order = order_id;
    write_account(&rel_info, &rel)?;

    processed_order.credited = true;

    fraud::record_conversion(&mut ctx.accounts.ip_activity.timestamps, now);

    rc.converted = rc
        .converted
        .checked_add(1)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;
    rc.pending_reward_cents = rc.pending_reward_cents.saturating_sub(reward);
    rc.total_earned_cents = rc
        .total_earned_cents
        .checked_add(reward as i64)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;
    write_account(rc_info, &rc)?;

    emit!(RewardCredited {
        referrer: rel.referrer,
        referee: user,
        order_id,
        amount_cents: reward,
        new_balance_cents: balance_after,
        timestamp: now,
    });

    // 6. Non-blocking admin alert.
    if fraud::review_threshold_reached(rc.converted, ctx.accounts.config.review_threshold) {
        emit!(ReviewThresholdReached {
            referrer: rel.referrer,
            conversions: rc.converted,
            threshold: ctx.accounts.config.review_threshold,
        });
    }

    Ok(())
}
