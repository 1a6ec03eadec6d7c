pub mod accept_admin;
pub mod apply_first_order_code;
pub mod create_referral_code;
pub mod initialize_program;
pub mod record_conversion;
pub mod record_refund;
pub mod register_signup;
pub mod set_gateway;
pub mod suspend_user;
pub mod transfer_admin;
pub mod update_config;

pub use accept_admin::*;
pub use apply_first_order_code::*;
pub use create_referral_code::*;
pub use initialize_program::*;
pub use record_conversion::*;
pub use record_refund::*;
pub use register_signup::*;
pub use set_gateway::*;
pub use suspend_user::*;
pub use transfer_admin::*;
pub use update_config::*;

use anchor_lang::prelude::*;
use anchor_lang::system_program::{self, CreateAccount};

use crate::errors::EngineError;

/// Create a program-owned PDA in handler code. Used where account creation is
/// conditional on runtime checks (silent referral fallback, reward credit) and
/// therefore cannot be an `init` constraint. Fails if the account already
/// exists, which doubles as the uniqueness guard on the natural key in the
/// seeds.
pub fn create_pda_account<'info>(
    payer: &AccountInfo<'info>,
    new_account: &AccountInfo<'info>,
    system_program: &AccountInfo<'info>,
    space: usize,
    signer_seeds: &[&[u8]],
) -> Result<()> {
    let lamports = Rent::get()?.minimum_balance(space);
    system_program::create_account(
        CpiContext::new(
            system_program.clone(),
            CreateAccount {
                from: payer.clone(),
                to: new_account.clone(),
            },
        )
        .with_signer(&[signer_seeds]),
        lamports,
        space as u64,
        &crate::ID,
    )
}

/// Serialize an account value (discriminator included) into an existing
/// program-owned account.
pub fn write_account<T: AccountSerialize>(info: &AccountInfo, value: &T) -> Result<()> {
    let mut data = info.try_borrow_mut_data()?;
    let mut writer: &mut [u8] = &mut data;
    value.try_serialize(&mut writer)?;
    Ok(())
}

/// Deserialize a program-owned account if it exists and carries the right
/// discriminator. `None` for empty/foreign/mismatched accounts — callers
/// decide whether that is a fallback or an error.
pub fn try_read_account<T: AccountDeserialize>(info: &AccountInfo) -> Option<T> {
    if info.owner != &crate::ID || info.data_is_empty() {
        return None;
    }
    let data = info.try_borrow_data().ok()?;
    T::try_deserialize(&mut &data[..]).ok()
}

/// Require that `info` is the PDA for `seeds`, returning the bump.
pub fn expect_pda(info: &AccountInfo, seeds: &[&[u8]]) -> Result<u8> {
    let (expected, bump) = Pubkey::find_program_address(seeds, &crate::ID);
    require_keys_eq!(info.key(), expected, EngineError::AccountMismatch);
    Ok(bump)
}
