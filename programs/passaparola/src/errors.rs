use anchor_lang::prelude::*;

#[error_code]
pub enum EngineError {
    // Permission errors
    #[msg("Signer is not authorized for this action")]
    Unauthorized,
    #[msg("This action requires the protocol admin")]
    AdminOnly,
    #[msg("This action requires the configured gateway")]
    GatewayOnly,

    // Code errors
    #[msg("Account does not match the PDA derived for this code")]
    CodeAccountMismatch,
    #[msg("First-order code does not match the one issued to this user")]
    CodeNotFound,
    #[msg("First-order code is not yet active")]
    CodeNotYetActive,
    #[msg("First-order code has expired")]
    CodeExpired,
    #[msg("First-order code was already used")]
    CodeAlreadyUsed,
    #[msg("User already has a completed order; first-order code denied")]
    NotFirstOrder,

    // Ledger errors
    #[msg("A credit already exists for this reference")]
    DuplicateReference,
    #[msg("No credit exists for this reference")]
    NothingToRevoke,
    #[msg("A reversal already exists for this reference")]
    AlreadyRevoked,

    // State errors
    #[msg("Passed account does not match the expected PDA")]
    AccountMismatch,
    #[msg("Referrer-side accounts are required for this referral order")]
    MissingReferrerAccounts,
    #[msg("Processed order does not reference this relationship")]
    OrderMismatch,
    #[msg("Configuration value out of range")]
    InvalidConfigValue,
    #[msg("Arithmetic overflow")]
    ArithmeticOverflow,
}
