use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::state::ProgramConfig;

#[derive(Accounts)]
pub struct AcceptAdmin<'info> {
    pub new_admin: Signer<'info>,

    #[account(
        mut,
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
        constraint = config.pending_admin == new_admin.key() @ EngineError::Unauthorized,
        constraint = config.pending_admin != Pubkey::default() @ EngineError::Unauthorized,
    )]
    pub config: Account<'info, ProgramConfig>,
}

pub fn handler(ctx: Context<AcceptAdmin>) -> Result<()> {
    let config = &mut ctx.accounts.config;
    config.admin = config.pending_admin;
    config.pending_admin = Pubkey::default();
    Ok(())
}
