use anchor_lang::prelude::*;

use crate::state::ProgramConfig;

#[derive(Accounts)]
pub struct InitializeProgram<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    #[account(
        init,
        payer = admin,
        space = ProgramConfig::SIZE,
        seeds = [ProgramConfig::SEED],
        bump,
    )]
    pub config: Account<'info, ProgramConfig>,

    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<InitializeProgram>, gateway: Pubkey) -> Result<()> {
    let config = &mut ctx.accounts.config;
    config.admin = ctx.accounts.admin.key();
    config.pending_admin = Pubkey::default();
    config.gateway = gateway;
    config.version = 0;
    config.first_order_discount = ProgramConfig::DEFAULT_FIRST_ORDER_DISCOUNT;
    config.referral_first_order_discount = ProgramConfig::DEFAULT_REFERRAL_FIRST_ORDER_DISCOUNT;
    config.referral_reward_cents = ProgramConfig::DEFAULT_REFERRAL_REWARD_CENTS;
    config.min_order_cents = ProgramConfig::DEFAULT_MIN_ORDER_CENTS;
    config.code_validity_days = ProgramConfig::DEFAULT_CODE_VALIDITY_DAYS;
    config.revocation_window_days = ProgramConfig::DEFAULT_REVOCATION_WINDOW_DAYS;
    config.ip_conversion_limit = ProgramConfig::DEFAULT_IP_CONVERSION_LIMIT;
    config.ip_window_hours = ProgramConfig::DEFAULT_IP_WINDOW_HOURS;
    config.review_threshold = ProgramConfig::DEFAULT_REVIEW_THRESHOLD;
    config.bump = ctx.bumps.config;
    Ok(())
}
