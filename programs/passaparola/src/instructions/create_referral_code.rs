use anchor_lang::prelude::*;

use crate::codes;
use crate::errors::EngineError;
use crate::events::ReferralCodeCreated;
use crate::state::{CodeLookup, MemberAccount, ProgramConfig, ReferralCode};
use super::{create_pda_account, expect_pda, write_account};

#[derive(Accounts)]
pub struct CreateReferralCode<'info> {
    #[account(mut)]
    pub gateway: Signer<'info>,

    #[account(
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
        constraint = config.gateway == gateway.key() @ EngineError::GatewayOnly,
    )]
    pub config: Account<'info, ProgramConfig>,

    /// The user the code is issued for. Identity only; the gateway acts on
    /// their behalf.
    /// CHECK: Used purely as a PDA seed.
    pub user: UncheckedAccount<'info>,

    #[account(
        seeds = [MemberAccount::SEED, user.key().as_ref()],
        bump = member.bump,
    )]
    pub member: Account<'info, MemberAccount>,

    /// One permanent code per user; init fails on a second call.
    #[account(
        init,
        payer = gateway,
        space = ReferralCode::SIZE,
        seeds = [ReferralCode::SEED, user.key().as_ref()],
        bump,
    )]
    pub referral_code: Account<'info, ReferralCode>,

    /// The global code -> owner mapping, created in the handler because its
    /// seeds are the derived code bytes. Creation failing on an existing PDA
    /// is the collision guard; the gateway retries with nonce+1, bounded at
    /// `codes::MAX_CODE_ATTEMPTS`.
    /// CHECK: Address verified in the handler against the derived code.
    #[account(mut)]
    pub code_lookup: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<CreateReferralCode>, nonce: u64) -> Result<()> {
    let user = ctx.accounts.user.key();
    let code = codes::derive_referral_code(&user, nonce);

    let lookup_info = ctx.accounts.code_lookup.to_account_info();
    let bump = expect_pda(&lookup_info, &[CodeLookup::SEED, &code])?;
    require!(
        lookup_info.data_is_empty(),
        EngineError::CodeAccountMismatch
    );

    create_pda_account(
        &ctx.accounts.gateway.to_account_info(),
        &lookup_info,
        &ctx.accounts.system_program.to_account_info(),
        CodeLookup::SIZE,
        &[CodeLookup::SEED, &code, &[bump]],
    )?;
    write_account(&lookup_info, &CodeLookup { owner: user, bump })?;

    let now = Clock::get()?.unix_timestamp;
    let referral_code = &mut ctx.accounts.referral_code;
    referral_code.owner = user;
    referral_code.code = code;
    // A code issued to an already-suspended member starts inactive.
    referral_code.is_active = !ctx.accounts.member.suspended;
    referral_code.total_invites = 0;
    referral_code.converted = 0;
    referral_code.revoked = 0;
    referral_code.pending_reward_cents = 0;
    referral_code.total_earned_cents = 0;
    referral_code.created_at = now;
    referral_code.bump = ctx.bumps.referral_code;

    emit!(ReferralCodeCreated {
        owner: user,
        code: codes::code_str(&code),
        timestamp: now,
    });

    Ok(())
}
