use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::events::FirstOrderCodeApplied;
use crate::state::{FirstOrderCode, MemberAccount, ProgramConfig};
use crate::stats;

#[derive(Accounts)]
pub struct ApplyFirstOrderCode<'info> {
    pub gateway: Signer<'info>,

    #[account(
        seeds = [ProgramConfig::SEED],
        bump = config.bump,
        constraint = config.gateway == gateway.key() @ EngineError::GatewayOnly,
    )]
    pub config: Account<'info, ProgramConfig>,

    /// CHECK: Used purely as a PDA seed.
    pub user: UncheckedAccount<'info>,

    #[account(
        seeds = [MemberAccount::SEED, user.key().as_ref()],
        bump = member.bump,
    )]
    pub member: Account<'info, MemberAccount>,

    #[account(
        mut,
        seeds = [FirstOrderCode::SEED, user.key().as_ref()],
        bump = first_order_code.bump,
    )]
    pub first_order_code: Account<'info, FirstOrderCode>,
}

/// Checkout-side validation and one-time consumption of the welcome code.
/// Unlike signup fallbacks, these failures are surfaced with specific
/// reasons so the checkout can tell the customer why.
pub fn handler(ctx: Context<ApplyFirstOrderCode>, code: String, subtotal_cents: u64) -> Result<()> {
    let foc = &mut ctx.accounts.first_order_code;
    let now = Clock::get()?.unix_timestamp;

    require!(foc.code() == code, EngineError::CodeNotFound);
    require!(
        ctx.accounts.member.completed_orders == 0,
        EngineError::NotFirstOrder
    );
    require!(foc.usage_count < foc.usage_limit, EngineError::CodeAlreadyUsed);
    require!(now >= foc.starts_at, EngineError::CodeNotYetActive);
    require!(now <= foc.ends_at, EngineError::CodeExpired);

    let discount_cents = stats::first_order_discount_cents(subtotal_cents, foc.discount_percent);
    foc.usage_count += 1;

    emit!(FirstOrderCodeApplied {
        user: ctx.accounts.user.key(),
        subtotal_cents,
        discount_cents,
        timestamp: now,
    });

    Ok(())
}
