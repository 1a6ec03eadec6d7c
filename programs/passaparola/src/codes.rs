use anchor_lang::prelude::*;

/// 32-symbol code alphabet. I, O, 0 and 1 are excluded as visually ambiguous.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const REFERRAL_CODE_LEN: usize = 8;
pub const FIRST_ORDER_PREFIX: &str = "BENVENUTO";
pub const FIRST_ORDER_SUFFIX_LEN: usize = 6;

/// Retry bound for the gateway when a derived code collides with an existing
/// `CodeLookup` PDA. With 32^8 codes this is practically unreachable, but the
/// caller must handle exhaustion rather than assume it away.
pub const MAX_CODE_ATTEMPTS: u8 = 10;

fn derive(domain: &[u8], owner: &Pubkey, nonce: u64, out: &mut [u8]) {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(owner.as_ref());
    hasher.update(&nonce.to_le_bytes());
    let digest = hasher.finalize();
    for (slot, byte) in out.iter_mut().zip(digest.as_bytes()) {
        *slot = ALPHABET[(byte & 31) as usize];
    }
}

/// Derive a user's permanent 8-character referral code.
///
/// Deterministic in (owner, nonce): the gateway derives the same code
/// off-chain to compute the `CodeLookup` PDA, and bumps the nonce on a
/// collision. Uniform over the alphabet since 32 divides 256.
pub fn derive_referral_code(owner: &Pubkey, nonce: u64) -> [u8; REFERRAL_CODE_LEN] {
    let mut code = [0u8; REFERRAL_CODE_LEN];
    derive(b"referral_code", owner, nonce, &mut code);
    code
}

/// Derive the 6-character suffix of a first-order code.
pub fn derive_first_order_suffix(owner: &Pubkey, nonce: u64) -> [u8; FIRST_ORDER_SUFFIX_LEN] {
    let mut suffix = [0u8; FIRST_ORDER_SUFFIX_LEN];
    derive(b"first_order_code", owner, nonce, &mut suffix);
    suffix
}

/// True if `code` is 8 characters, all from the alphabet.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == REFERRAL_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}

/// The share link query fragment for a referral code.
pub fn share_link(code: &[u8; REFERRAL_CODE_LEN]) -> String {
    format!("?ref={}", code_str(code))
}

pub fn code_str(code: &[u8]) -> String {
    core::str::from_utf8(code).unwrap_or_default().to_string()
}

/// Format euro cents as a decimal string, e.g. -500 -> "-5.00".
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
