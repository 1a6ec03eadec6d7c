use anchor_lang::prelude::*;

pub mod codes;
pub mod errors;
pub mod events;
pub mod fraud;
pub mod instructions;
pub mod state;
pub mod stats;

use instructions::*;
use state::ConfigParam;

declare_id!("AdPxvyrCNKnPR5pqa6QHnjQspFj9VYJtQfTAEDGu3j9U");

#[program]
pub mod passaparola {
    use super::*;

    /// Initialize the global engine config. Called once by the deployer.
    pub fn initialize_program(ctx: Context<InitializeProgram>, gateway: Pubkey) -> Result<()> {
        instructions::initialize_program::handler(ctx, gateway)
    }

    /// Update one numeric config parameter (admin only). Only future
    /// codes/relationships see the new value.
    pub fn update_config(ctx: Context<UpdateConfig>, param: ConfigParam, value: u64) -> Result<()> {
        instructions::update_config::handler(ctx, param, value)
    }

    /// Rotate the gateway identity allowed to forward storefront events.
    pub fn set_gateway(ctx: Context<SetGateway>, new_gateway: Pubkey) -> Result<()> {
        instructions::set_gateway::handler(ctx, new_gateway)
    }

    /// Begin a two-step admin handover (current admin only).
    pub fn transfer_admin(ctx: Context<TransferAdmin>, new_admin: Pubkey) -> Result<()> {
        instructions::transfer_admin::handler(ctx, new_admin)
    }

    /// Complete the handover (pending admin only).
    pub fn accept_admin(ctx: Context<AcceptAdmin>) -> Result<()> {
        instructions::accept_admin::handler(ctx)
    }

    /// Lazily issue a member's permanent 8-character referral code.
    pub fn create_referral_code(ctx: Context<CreateReferralCode>, nonce: u64) -> Result<()> {
        instructions::create_referral_code::handler(ctx, nonce)
    }

    /// Process a signup event: always issues the first-order code; links a
    /// referral relationship when a valid, non-self, non-suspended code was
    /// presented, silently falling back otherwise.
    pub fn register_signup(
        ctx: Context<RegisterSignup>,
        email_hash: [u8; 32],
        ip_hash: [u8; 32],
        promo_nonce: u64,
        presented_code: Option<String>,
    ) -> Result<()> {
        instructions::register_signup::handler(ctx, email_hash, ip_hash, promo_nonce, presented_code)
    }

    /// Validate and consume the first-order code at checkout.
    pub fn apply_first_order_code(
        ctx: Context<ApplyFirstOrderCode>,
        code: String,
        subtotal_cents: u64,
    ) -> Result<()> {
        instructions::apply_first_order_code::handler(ctx, code, subtotal_cents)
    }

    /// Process a payment-completed event: detects a referee's first
    /// qualifying order and credits the referrer exactly once.
    pub fn record_conversion(
        ctx: Context<RecordConversion>,
        order_id: [u8; 32],
        ip_hash: [u8; 32],
    ) -> Result<()> {
        instructions::record_conversion::handler(ctx, order_id, ip_hash)
    }

    /// Process an order-refunded event: reverses the reward when the refund
    /// timestamp falls inside the revocation window.
    pub fn record_refund(
        ctx: Context<RecordRefund>,
        order_id: [u8; 32],
        refunded_at: i64,
    ) -> Result<()> {
        instructions::record_refund::handler(ctx, order_id, refunded_at)
    }

    /// Suspend a user (admin only): deactivates their referral code and
    /// blocks their future referral credits.
    pub fn suspend_user(ctx: Context<SuspendUser>) -> Result<()> {
        instructions::suspend_user::handler(ctx)
    }
}
