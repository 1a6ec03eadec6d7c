use anchor_lang::prelude::*;

use crate::codes;
use crate::errors::EngineError;
use crate::events::{FallbackReason, ReferralLinked, SignupCompleted, SignupFallback};
use crate::fraud;
use crate::state::{
    CodeLookup, FirstOrderCode, MemberAccount, ProgramConfig, ReferralCode, ReferralRelationship,
    RelationshipStatus,
};
use super::{create_pda_account, expect_pda, try_read_account, write_account};

#[derive(Accounts)]
pub struct RegisterSignup<'info> {
    #[account(mut)]
    pub gateway: Signer<'info>,

    #[account(
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
        constraint = config.gateway == gateway.key() @ EngineError::GatewayOnly,
    )]
    pub config: Account<'info, ProgramConfig>,

    /// The new user. Identity only; the gateway acts on their behalf.
    /// CHECK: Used purely as a PDA seed.
    pub user: UncheckedAccount<'info>,

    /// Signup idempotency guard: a populated member means a duplicate
    /// delivery, handled as a logged no-op.
    #[account(
        init_if_needed,
        payer = gateway,
        space = MemberAccount::SIZE,
        seeds = [MemberAccount::SEED, user.key().as_ref()],
        bump,
    )]
    pub member: Account<'info, MemberAccount>,

    #[account(
        init_if_needed,
        payer = gateway,
        space = FirstOrderCode::SIZE,
        seeds = [FirstOrderCode::SEED, user.key().as_ref()],
        bump,
    )]
    pub first_order_code: Account<'info, FirstOrderCode>,

    /// Lookup PDA for the presented code. None (or an empty account) when no
    /// valid code was presented — that is the silent-fallback path, never an
    /// error.
    /// CHECK: Address and content validated in the handler.
    pub code_lookup: Option<UncheckedAccount<'info>>,

    /// The resolved referrer's code account (invite counters).
    /// CHECK: Address and content validated in the handler.
    #[account(mut)]
    pub referrer_code: Option<UncheckedAccount<'info>>,

    /// The resolved referrer's member account (suspension, email hash).
    /// CHECK: Address and content validated in the handler.
    pub referrer_member: Option<UncheckedAccount<'info>>,

    /// Created in the handler only when the referral passes every check, so
    /// the fallback path leaves no relationship behind.
    /// CHECK: Address verified against [b"referral", user] in the handler.
    #[account(mut)]
    pub relationship: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

/// Everything needed to accept a referral, resolved up front.
struct ResolvedReferral {
    referrer: Pubkey,
    referrer_code: ReferralCode,
}

fn resolve_referral(
    code: &str,
    user: &Pubkey,
    email_hash: &[u8; 32],
    code_lookup: Option<&AccountInfo>,
    referrer_code: Option<&AccountInfo>,
    referrer_member: Option<&AccountInfo>,
) -> core::result::Result<ResolvedReferral, FallbackReason> {
    if !codes::is_well_formed(code) {
        return Err(FallbackReason::CodeNotFound);
    }

    let lookup_info = code_lookup.ok_or(FallbackReason::CodeNotFound)?;
    let (lookup_pda, _) =
        Pubkey::find_program_address(&[CodeLookup::SEED, code.as_bytes()], &crate::ID);
    if lookup_info.key() != lookup_pda {
        return Err(FallbackReason::CodeNotFound);
    }
    let lookup: CodeLookup =
        try_read_account(lookup_info).ok_or(FallbackReason::CodeNotFound)?;

    let rc_info = referrer_code.ok_or(FallbackReason::CodeNotFound)?;
    let (rc_pda, _) =
        Pubkey::find_program_address(&[ReferralCode::SEED, lookup.owner.as_ref()], &crate::ID);
    if rc_info.key() != rc_pda {
        return Err(FallbackReason::CodeNotFound);
    }
    let rc: ReferralCode = try_read_account(rc_info).ok_or(FallbackReason::CodeNotFound)?;
    if !rc.is_active {
        return Err(FallbackReason::CodeInactive);
    }

    let rm_info = referrer_member.ok_or(FallbackReason::CodeNotFound)?;
    let (rm_pda, _) =
        Pubkey::find_program_address(&[MemberAccount::SEED, lookup.owner.as_ref()], &crate::ID);
    if rm_info.key() != rm_pda {
        return Err(FallbackReason::CodeNotFound);
    }
    let rm: MemberAccount = try_read_account(rm_info).ok_or(FallbackReason::CodeNotFound)?;

    if fraud::is_self_referral(user, email_hash, &lookup.owner, &rm.email_hash) {
        return Err(FallbackReason::SelfReferral);
    }
    if rm.suspended {
        return Err(FallbackReason::ReferrerSuspended);
    }

    Ok(ResolvedReferral {
        referrer: lookup.owner,
        referrer_code: rc,
    })
}

pub fn handler(
    ctx: Context<RegisterSignup>,
    email_hash: [u8; 32],
    ip_hash: [u8; 32],
    promo_nonce: u64,
    presented_code: Option<String>,
) -> Result<()> {
    let user = ctx.accounts.user.key();
    let now = Clock::get()?.unix_timestamp;

    if ctx.accounts.member.created_at != 0 {
        msg!("signup for {} already processed; no-op", user);
        return Ok(());
    }

    // 1. Resolve the presented referral code. Every failure is a silent
    //    fallback to the standard code — registration itself must succeed.
    let resolved = match presented_code {
        None => None,
        Some(ref code) => match resolve_referral(
            code,
            &user,
            &email_hash,
            ctx.accounts.code_lookup.as_ref().map(|a| a.as_ref()),
            ctx.accounts.referrer_code.as_ref().map(|a| a.as_ref()),
            ctx.accounts.referrer_member.as_ref().map(|a| a.as_ref()),
        ) {
            Ok(resolved) => Some(resolved),
            Err(reason) => {
                msg!("referral code ignored: {:?}", reason);
                emit!(SignupFallback {
                    user,
                    reason,
                    timestamp: now,
                });
                None
            }
        },
    };

    let config = &ctx.accounts.config;
    let is_referral = resolved.is_some();

    // 2. Member record.
    let member = &mut ctx.accounts.member;
    member.user = user;
    member.email_hash = email_hash;
    member.suspended = false;
    member.completed_orders = 0;
    member.created_at = now;
    member.bump = ctx.bumps.member;

    // 3. First-order code, snapshotting the config values that apply now.
    let discount = if is_referral {
        config.referral_first_order_discount
    } else {
        config.first_order_discount
    };
    let foc = &mut ctx.accounts.first_order_code;
    foc.owner = user;
    foc.suffix = codes::derive_first_order_suffix(&user, promo_nonce);
    foc.discount_percent = discount;
    foc.starts_at = now;
    foc.ends_at = now + config.code_validity_days as i64 * 86_400;
    foc.usage_limit = 1;
    foc.usage_count = 0;
    foc.is_first_order_code = true;
    foc.referral_bonus = is_referral;
    foc.bump = ctx.bumps.first_order_code;

    // 4. Accepted referral: create the Pending relationship and bump the
    //    referrer's counters, all inside this transaction.
    if let Some(resolved) = resolved {
        let reward = config.referral_reward_cents;

        let rel_info = ctx.accounts.relationship.to_account_info();
        let bump = expect_pda(&rel_info, &[ReferralRelationship::SEED, user.as_ref()])?;
        require!(rel_info.data_is_empty(), EngineError::AccountMismatch);
        create_pda_account(
            &ctx.accounts.gateway.to_account_info(),
            &rel_info,
            &ctx.accounts.system_program.to_account_info(),
            ReferralRelationship::SIZE,
            &[ReferralRelationship::SEED, user.as_ref(), &[bump]],
        )?;
        write_account(
            &rel_info,
            &ReferralRelationship {
                referrer: resolved.referrer,
                referee: user,
                status: RelationshipStatus::Pending,
                reward_cents: reward,
                ip_hash,
                created_at: now,
                converted_at: 0,
                revoked_at: 0,
                reward_credited: false,
                converted_order: [0u8; 32],
                bump,
            },
        )?;

        let mut rc = resolved.referrer_code;
        rc.total_invites = rc
            .total_invites
            .checked_add(1)
            .ok_or(error!(EngineError::ArithmeticOverflow))?;
        rc.pending_reward_cents = rc
            .pending_reward_cents
            .checked_add(reward)
            .ok_or(error!(EngineError::ArithmeticOverflow))?;
        let rc_info = ctx
            .accounts
            .referrer_code
            .as_ref()
            .ok_or(error!(EngineError::MissingReferrerAccounts))?;
        write_account(rc_info, &rc)?;

        emit!(ReferralLinked {
            referrer: resolved.referrer,
            referee: user,
            reward_cents: reward,
            timestamp: now,
        });
    }

    emit!(SignupCompleted {
        user,
        code: ctx.accounts.first_order_code.code(),
        discount_percent: discount,
        is_referral,
        timestamp: now,
    });

    Ok(())
}
