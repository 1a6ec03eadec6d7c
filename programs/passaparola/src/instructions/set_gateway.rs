use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::state::ProgramConfig;

#[derive(Accounts)]
pub struct SetGateway<'info> {
    #[account(
        constraint = admin.key() == config.admin @ EngineError::AdminOnly,
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
    )]
    pub config: Account<'info, ProgramConfig>,
}

/// Rotate the storefront backend identity allowed to forward events.
pub fn handler(ctx: Context<SetGateway>, new_gateway: Pubkey) -> Result<()> {
    require!(new_gateway != Pubkey::default(), EngineError::InvalidConfigValue);
    ctx.accounts.config.gateway = new_gateway;
    Ok(())
}
