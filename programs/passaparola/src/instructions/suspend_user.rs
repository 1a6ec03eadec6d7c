use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::events::UserSuspended;
use crate::state::{MemberAccount, ProgramConfig, ReferralCode};
use super::{expect_pda, try_read_account, write_account};

#[derive(Accounts)]
pub struct SuspendUser<'info> {
    #[account(
        constraint = admin.key() == config.admin @ EngineError::AdminOnly,
    )]
    pub admin: Signer<'info>,

    #[account(
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
    )]
    pub config: Account<'info, ProgramConfig>,

    /// CHECK: Used purely as a PDA seed.
    pub user: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [MemberAccount::SEED, user.key().as_ref()],
        bump = member.bump,
    )]
    pub member: Account<'info, MemberAccount>,

    /// The user's referral code, deactivated alongside. None if the user
    /// never had a code issued.
    /// CHECK: Address and content validated in the handler.
    #[account(mut)]
    pub referral_code: Option<UncheckedAccount<'info>>,
}

/// Admin suspension. New signups presenting this user's code fall back to the
/// standard discount; conversions for existing Pending relationships where
/// they are the referrer are withheld from now on.
pub fn handler(ctx: Context<SuspendUser>) -> Result<()> {
    let user = ctx.accounts.user.key();
    ctx.accounts.member.suspended = true;

    if let Some(rc_info) = ctx.accounts.referral_code.as_ref() {
        expect_pda(rc_info, &[ReferralCode::SEED, user.as_ref()])?;
        let mut rc: ReferralCode =
            try_read_account(rc_info).ok_or(error!(EngineError::AccountMismatch))?;
        rc.is_active = false;
        write_account(rc_info, &rc)?;
    }

    emit!(UserSuspended {
        user,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}
