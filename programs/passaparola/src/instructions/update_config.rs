use anchor_lang::prelude::*;

use crate::errors::EngineError;
use crate::events::ConfigUpdated;
use crate::state::{ConfigParam, IpActivity, ProgramConfig};

#[derive(Accounts)]
pub struct UpdateConfig<'info> {
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

/// Admin-only parameter update. Only future code/relationship issuance sees
/// the new values; existing records carry their creation-time snapshot.
pub fn handler(ctx: Context<UpdateConfig>, param: ConfigParam, value: u64) -> Result<()> {
    let config = &mut ctx.accounts.config;

    match param {
        ConfigParam::FirstOrderDiscount => {
            require!((1..=90).contains(&value), EngineError::InvalidConfigValue);
            config.first_order_discount = value as u8;
        }
        ConfigParam::ReferralFirstOrderDiscount => {
            require!((1..=90).contains(&value), EngineError::InvalidConfigValue);
            config.referral_first_order_discount = value as u8;
        }
        ConfigParam::ReferralRewardCents => {
            require!(value > 0, EngineError::InvalidConfigValue);
            config.referral_reward_cents = value;
        }
        ConfigParam::MinOrderCents => {
            config.min_order_cents = value;
        }
        ConfigParam::CodeValidityDays => {
            require!((1..=3650).contains(&value), EngineError::InvalidConfigValue);
            config.code_validity_days = value as u16;
        }
        ConfigParam::RevocationWindowDays => {
            require!((1..=365).contains(&value), EngineError::InvalidConfigValue);
            config.revocation_window_days = value as u16;
        }
        ConfigParam::IpConversionLimit => {
            // The per-IP ring can only prove counts up to its capacity.
            require!(
                (1..=IpActivity::RING_CAPACITY as u64).contains(&value),
                EngineError::InvalidConfigValue
            );
            config.ip_conversion_limit = value as u8;
        }
        ConfigParam::IpWindowHours => {
            require!((1..=168).contains(&value), EngineError::InvalidConfigValue);
            config.ip_window_hours = value as u16;
        }
        ConfigParam::ReviewThreshold => {
            config.review_threshold = value as u32;
        }
    }

    config.version = config
        .version
        .checked_add(1)
        .ok_or(error!(EngineError::ArithmeticOverflow))?;

    emit!(ConfigUpdated {
        param,
        value,
        version: config.version,
    });

    Ok(())
}
