use litesvm::LiteSVM;
use solana_sdk::{
    clock::Clock,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};

use anchor_lang::AccountDeserialize;
use passaparola::codes;
use passaparola::state::{
    CodeLookup, CreditBalance, FirstOrderCode, IpActivity, LedgerEntry, MemberAccount,
    ProcessedOrder, ProgramConfig, ReferralCode, ReferralRelationship, RelationshipStatus,
};

const DAY: i64 = 86_400;

fn program_id() -> Pubkey {
    passaparola::ID
}

fn sighash(name: &str) -> Vec<u8> {
    let hash = solana_sdk::hash::hash(format!("global:{}", name).as_bytes());
    hash.to_bytes()[..8].to_vec()
}

// ---------------------------------------------------------------------------
// PDA helpers
// ---------------------------------------------------------------------------

fn config_pda() -> Pubkey {
    Pubkey::find_program_address(&[ProgramConfig::SEED], &program_id()).0
}

fn member_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[MemberAccount::SEED, user.as_ref()], &program_id()).0
}

fn first_order_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[FirstOrderCode::SEED, user.as_ref()], &program_id()).0
}

fn referral_code_pda(owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[ReferralCode::SEED, owner.as_ref()], &program_id()).0
}

fn code_lookup_pda(code: &[u8]) -> Pubkey {
    Pubkey::find_program_address(&[CodeLookup::SEED, code], &program_id()).0
}

fn relationship_pda(referee: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[ReferralRelationship::SEED, referee.as_ref()], &program_id()).0
}

fn processed_order_pda(order_id: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(&[ProcessedOrder::SEED, order_id.as_ref()], &program_id()).0
}

fn credit_balance_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[CreditBalance::SEED, user.as_ref()], &program_id()).0
}

fn ledger_entry_pda(relationship: &Pubkey, direction: u8) -> Pubkey {
    Pubkey::find_program_address(
        &[LedgerEntry::SEED, relationship.as_ref(), &[direction]],
        &program_id(),
    )
    .0
}

fn ip_activity_pda(ip_hash: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(&[IpActivity::SEED, ip_hash.as_ref()], &program_id()).0
}

/// Placeholder meta for a `None` optional account.
fn none_meta() -> AccountMeta {
    AccountMeta::new_readonly(program_id(), false)
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn setup() -> (LiteSVM, Keypair, Keypair) {
    let mut svm = LiteSVM::new();

    let program_bytes = std::fs::read("../../target/deploy/passaparola.so")
        .expect("Run `anchor build` first");
    let _ = svm.add_program(program_id(), &program_bytes);

    let admin = Keypair::new();
    let gateway = Keypair::new();
    svm.airdrop(&admin.pubkey(), 10_000_000_000).unwrap();
    svm.airdrop(&gateway.pubkey(), 10_000_000_000).unwrap();

    send_tx(&mut svm, &[ix_initialize(&admin.pubkey(), &gateway.pubkey())], &[&admin]).unwrap();
    (svm, admin, gateway)
}

fn send_tx(svm: &mut LiteSVM, ixs: &[Instruction], signers: &[&Keypair]) -> Result<(), String> {
    let blockhash = svm.latest_blockhash();
    let tx = Transaction::new_signed_with_payer(ixs, Some(&signers[0].pubkey()), signers, blockhash);
    svm.send_transaction(tx).map(|_| ()).map_err(|e| format!("{:?}", e))
}

fn read_account<T: AccountDeserialize>(svm: &LiteSVM, address: &Pubkey) -> T {
    let account = svm.get_account(address).expect("account missing");
    T::try_deserialize(&mut account.data.as_slice()).expect("deserialize")
}

fn now(svm: &LiteSVM) -> i64 {
    svm.get_sysvar::<Clock>().unix_timestamp
}

fn advance_clock(svm: &mut LiteSVM, secs: i64) {
    let mut clock = svm.get_sysvar::<Clock>();
    clock.unix_timestamp += secs;
    svm.set_sysvar::<Clock>(&clock);
}

// ---------------------------------------------------------------------------
// Instruction builders
// ---------------------------------------------------------------------------

fn ix_initialize(admin: &Pubkey, gateway: &Pubkey) -> Instruction {
    let mut data = sighash("initialize_program");
    data.extend_from_slice(gateway.as_ref());
    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(config_pda(), false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ],
    )
}

fn ix_update_config(admin: &Pubkey, param_variant: u8, value: u64) -> Instruction {
    let mut data = sighash("update_config");
    data.push(param_variant);
    data.extend_from_slice(&value.to_le_bytes());
    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(config_pda(), false),
        ],
    )
}

fn ix_create_referral_code(gateway: &Pubkey, user: &Pubkey, nonce: u64) -> Instruction {
    let code = codes::derive_referral_code(user, nonce);
    let mut data = sighash("create_referral_code");
    data.extend_from_slice(&nonce.to_le_bytes());
    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new(*gateway, true),
            AccountMeta::new_readonly(config_pda(), false),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new_readonly(member_pda(user), false),
            AccountMeta::new(referral_code_pda(user), false),
            AccountMeta::new(code_lookup_pda(&code), false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ],
    )
}

fn ix_register_signup(
    gateway: &Pubkey,
    user: &Pubkey,
    email_hash: [u8; 32],
    ip_hash: [u8; 32],
    promo_nonce: u64,
    presented_code: Option<&str>,
    referrer: Option<&Pubkey>,
) -> Instruction {
    let mut data = sighash("register_signup");
    data.extend_from_slice(&email_hash);
    data.extend_from_slice(&ip_hash);
    data.extend_from_slice(&promo_nonce.to_le_bytes());
    match presented_code {
        None => data.push(0),
        Some(code) => {
            data.push(1);
            data.extend_from_slice(&(code.len() as u32).to_le_bytes());
            data.extend_from_slice(code.as_bytes());
        }
    }

    let lookup_meta = match presented_code {
        Some(code) => AccountMeta::new_readonly(code_lookup_pda(code.as_bytes()), false),
        None => none_meta(),
    };
    let (rc_meta, rm_meta) = match referrer {
        Some(referrer) => (
            AccountMeta::new(referral_code_pda(referrer), false),
            AccountMeta::new_readonly(member_pda(referrer), false),
        ),
        None => (none_meta(), none_meta()),
    };

    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new(*gateway, true),
            AccountMeta::new_readonly(config_pda(), false),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new(member_pda(user), false),
            AccountMeta::new(first_order_pda(user), false),
            lookup_meta,
            rc_meta,
            rm_meta,
            AccountMeta::new(relationship_pda(user), false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ],
    )
}

fn ix_apply_first_order_code(
    gateway: &Pubkey,
    user: &Pubkey,
    code: &str,
    subtotal_cents: u64,
) -> Instruction {
    let mut data = sighash("apply_first_order_code");
    data.extend_from_slice(&(code.len() as u32).to_le_bytes());
    data.extend_from_slice(code.as_bytes());
    data.extend_from_slice(&subtotal_cents.to_le_bytes());
    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new_readonly(*gateway, true),
            AccountMeta::new_readonly(config_pda(), false),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new_readonly(member_pda(user), false),
            AccountMeta::new(first_order_pda(user), false),
        ],
    )
}

fn ix_record_conversion(
    gateway: &Pubkey,
    user: &Pubkey,
    order_id: [u8; 32],
    ip_hash: [u8; 32],
    referrer: Option<&Pubkey>,
) -> Instruction {
    let mut data = sighash("record_conversion");
    data.extend_from_slice(&order_id);
    data.extend_from_slice(&ip_hash);

    let rel_pda = relationship_pda(user);
    let (rc, rm, bal, ledger) = match referrer {
        Some(referrer) => (
            AccountMeta::new(referral_code_pda(referrer), false),
            AccountMeta::new_readonly(member_pda(referrer), false),
            AccountMeta::new(credit_balance_pda(referrer), false),
            AccountMeta::new(
                ledger_entry_pda(&rel_pda, LedgerEntry::DIRECTION_CREDIT),
                false,
            ),
        ),
        None => (none_meta(), none_meta(), none_meta(), none_meta()),
    };

    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new(*gateway, true),
            AccountMeta::new_readonly(config_pda(), false),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new(member_pda(user), false),
            AccountMeta::new(processed_order_pda(&order_id), false),
            AccountMeta::new(rel_pda, false),
            rc,
            rm,
            bal,
            ledger,
            AccountMeta::new(ip_activity_pda(&ip_hash), false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ],
    )
}

fn ix_record_refund(
    gateway: &Pubkey,
    order_id: [u8; 32],
    refunded_at: i64,
    referee: &Pubkey,
    referrer: Option<&Pubkey>,
) -> Instruction {
    let mut data = sighash("record_refund");
    data.extend_from_slice(&order_id);
    data.extend_from_slice(&refunded_at.to_le_bytes());

    let rel_pda = relationship_pda(referee);
    let (rc, bal, ledger) = match referrer {
        Some(referrer) => (
            AccountMeta::new(referral_code_pda(referrer), false),
            AccountMeta::new(credit_balance_pda(referrer), false),
            AccountMeta::new(
                ledger_entry_pda(&rel_pda, LedgerEntry::DIRECTION_DEBIT),
                false,
            ),
        ),
        None => (none_meta(), none_meta(), none_meta()),
    };

    Instruction::new_with_bytes(
        program_id(),
        &data,
        vec![
            AccountMeta::new(*gateway, true),
            AccountMeta::new_readonly(config_pda(), false),
            AccountMeta::new(processed_order_pda(&order_id), false),
            AccountMeta::new(rel_pda, false),
            rc,
            bal,
            ledger,
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ],
    )
}

fn ix_suspend_user(admin: &Pubkey, user: &Pubkey, has_code: bool) -> Instruction {
    let code_meta = if has_code {
        AccountMeta::new(referral_code_pda(user), false)
    } else {
        none_meta()
    };
    Instruction::new_with_bytes(
        program_id(),
        &sighash("suspend_user"),
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new_readonly(config_pda(), false),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new(member_pda(user), false),
            code_meta,
        ],
    )
}

// ---------------------------------------------------------------------------
// Scenario helpers
// ---------------------------------------------------------------------------

fn order(n: u8) -> [u8; 32] {
    let mut id = [0u8; 32];
    id[0] = n;
    id[1] = 0xAA;
    id
}

fn mail(n: u8) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash[0] = n;
    hash[1] = 0xEE;
    hash
}

fn ip(n: u8) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash[0] = n;
    hash[1] = 0x1F;
    hash
}

/// Sign up a referrer and issue their permanent referral code. Returns the
/// code as a string.
fn setup_referrer(svm: &mut LiteSVM, gateway: &Keypair, user: &Pubkey, tag: u8) -> String {
    send_tx(
        svm,
        &[ix_register_signup(&gateway.pubkey(), user, mail(tag), ip(tag), tag as u64, None, None)],
        &[gateway],
    )
    .unwrap();
    send_tx(svm, &[ix_create_referral_code(&gateway.pubkey(), user, 0)], &[gateway]).unwrap();
    let rc: ReferralCode = read_account(svm, &referral_code_pda(user));
    codes::code_str(&rc.code)
}

// ---------------------------------------------------------------------------
// Config & admin
// ---------------------------------------------------------------------------

#[test]
fn initialize_sets_defaults() {
    let (svm, admin, gateway) = setup();
    let config: ProgramConfig = read_account(&svm, &config_pda());
    assert_eq!(config.admin, admin.pubkey());
    assert_eq!(config.gateway, gateway.pubkey());
    assert_eq!(config.version, 0);
    assert_eq!(config.first_order_discount, 10);
    assert_eq!(config.referral_first_order_discount, 15);
    assert_eq!(config.referral_reward_cents, 500);
    assert_eq!(config.revocation_window_days, 14);
    assert_eq!(config.ip_conversion_limit, 3);
}

#[test]
fn update_config_bumps_version_and_validates() {
    let (mut svm, admin, _) = setup();
    // ReferralRewardCents is variant 2
    send_tx(&mut svm, &[ix_update_config(&admin.pubkey(), 2, 750)], &[&admin]).unwrap();
    let config: ProgramConfig = read_account(&svm, &config_pda());
    assert_eq!(config.referral_reward_cents, 750);
    assert_eq!(config.version, 1);

    // discount of 0 is out of range
    assert!(send_tx(&mut svm, &[ix_update_config(&admin.pubkey(), 0, 0)], &[&admin]).is_err());

    // non-admin is rejected
    let outsider = Keypair::new();
    svm.airdrop(&outsider.pubkey(), 1_000_000_000).unwrap();
    assert!(send_tx(&mut svm, &[ix_update_config(&outsider.pubkey(), 2, 100)], &[&outsider]).is_err());
}

// ---------------------------------------------------------------------------
// Signup & codes
// ---------------------------------------------------------------------------

#[test]
fn plain_signup_issues_standard_first_order_code() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(&gateway.pubkey(), &user, mail(1), ip(1), 1, None, None)],
        &[&gateway],
    )
    .unwrap();

    let member: MemberAccount = read_account(&svm, &member_pda(&user));
    assert_eq!(member.user, user);
    assert_eq!(member.completed_orders, 0);
    assert!(!member.suspended);

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&user));
    assert_eq!(foc.discount_percent, 10);
    assert!(foc.is_first_order_code);
    assert!(!foc.referral_bonus);
    assert_eq!(foc.usage_limit, 1);
    assert_eq!(foc.usage_count, 0);
    assert_eq!(foc.ends_at, foc.starts_at + 30 * DAY);
    assert!(foc.code().starts_with("BENVENUTO-"));
    assert_eq!(foc.code().len(), "BENVENUTO-".len() + 6);

    // no relationship was created
    assert!(svm.get_account(&relationship_pda(&user)).is_none());
}

#[test]
fn duplicate_signup_is_a_noop() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    let ix = ix_register_signup(&gateway.pubkey(), &user, mail(1), ip(1), 1, None, None);
    send_tx(&mut svm, &[ix.clone()], &[&gateway]).unwrap();
    let before: FirstOrderCode = read_account(&svm, &first_order_pda(&user));

    svm.expire_blockhash();
    send_tx(&mut svm, &[ix], &[&gateway]).unwrap();
    let after: FirstOrderCode = read_account(&svm, &first_order_pda(&user));
    assert_eq!(before.suffix, after.suffix);
    assert_eq!(before.starts_at, after.starts_at);
}

#[test]
fn referral_code_is_unique_wellformed_and_resolvable() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    let code = setup_referrer(&mut svm, &gateway, &user, 1);
    assert!(codes::is_well_formed(&code));

    let lookup: CodeLookup = read_account(&svm, &code_lookup_pda(code.as_bytes()));
    assert_eq!(lookup.owner, user);

    // one permanent code per user
    assert!(send_tx(
        &mut svm,
        &[ix_create_referral_code(&gateway.pubkey(), &user, 1)],
        &[&gateway]
    )
    .is_err());
}

#[test]
fn valid_referral_creates_pending_relationship_at_15_percent() {
    let (mut svm, _, gateway) = setup();
    let referrer = Pubkey::new_unique();
    let code = setup_referrer(&mut svm, &gateway, &referrer, 1);

    let referee = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(
            &gateway.pubkey(),
            &referee,
            mail(2),
            ip(2),
            2,
            Some(&code),
            Some(&referrer),
        )],
        &[&gateway],
    )
    .unwrap();

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&referee));
    assert_eq!(foc.discount_percent, 15);
    assert!(foc.referral_bonus);

    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referee));
    assert_eq!(rel.referrer, referrer);
    assert_eq!(rel.referee, referee);
    assert_eq!(rel.status, RelationshipStatus::Pending);
    assert_eq!(rel.reward_cents, 500);
    assert!(!rel.reward_credited);
    assert_eq!(rel.converted_at, 0);

    let rc: ReferralCode = read_account(&svm, &referral_code_pda(&referrer));
    assert_eq!(rc.total_invites, 1);
    assert_eq!(rc.pending_reward_cents, 500);
}

#[test]
fn unknown_code_falls_back_to_standard_discount() {
    let (mut svm, _, gateway) = setup();
    let referee = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(
            &gateway.pubkey(),
            &referee,
            mail(3),
            ip(3),
            3,
            Some("A7K3M9PQ"),
            None,
        )],
        &[&gateway],
    )
    .unwrap();

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&referee));
    assert_eq!(foc.discount_percent, 10);
    assert!(!foc.referral_bonus);
    assert!(svm.get_account(&relationship_pda(&referee)).is_none());
}

#[test]
fn self_referral_by_email_falls_back_silently() {
    let (mut svm, _, gateway) = setup();
    let referrer = Pubkey::new_unique();
    let code = setup_referrer(&mut svm, &gateway, &referrer, 1);

    // second account, same email hash as the code owner
    let referee = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(
            &gateway.pubkey(),
            &referee,
            mail(1),
            ip(4),
            4,
            Some(&code),
            Some(&referrer),
        )],
        &[&gateway],
    )
    .unwrap();

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&referee));
    assert_eq!(foc.discount_percent, 10);
    assert!(svm.get_account(&relationship_pda(&referee)).is_none());

    let rc: ReferralCode = read_account(&svm, &referral_code_pda(&referrer));
    assert_eq!(rc.total_invites, 0);
}

#[test]
fn suspended_referrer_code_falls_back_at_signup() {
    let (mut svm, admin, gateway) = setup();
    let referrer = Pubkey::new_unique();
    let code = setup_referrer(&mut svm, &gateway, &referrer, 1);

    send_tx(&mut svm, &[ix_suspend_user(&admin.pubkey(), &referrer, true)], &[&admin]).unwrap();
    let rc: ReferralCode = read_account(&svm, &referral_code_pda(&referrer));
    assert!(!rc.is_active);

    let referee = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(
            &gateway.pubkey(),
            &referee,
            mail(5),
            ip(5),
            5,
            Some(&code),
            Some(&referrer),
        )],
        &[&gateway],
    )
    .unwrap();

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&referee));
    assert_eq!(foc.discount_percent, 10);
    assert!(svm.get_account(&relationship_pda(&referee)).is_none());
}

// ---------------------------------------------------------------------------
// First-order code at checkout
// ---------------------------------------------------------------------------

#[test]
fn first_order_code_applies_once_then_rejects() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(&gateway.pubkey(), &user, mail(1), ip(1), 1, None, None)],
        &[&gateway],
    )
    .unwrap();

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&user));
    let code = foc.code();

    // wrong code string -> not found
    assert!(send_tx(
        &mut svm,
        &[ix_apply_first_order_code(&gateway.pubkey(), &user, "BENVENUTO-AAAAAA", 4_000)],
        &[&gateway]
    )
    .is_err());

    send_tx(
        &mut svm,
        &[ix_apply_first_order_code(&gateway.pubkey(), &user, &code, 4_000)],
        &[&gateway],
    )
    .unwrap();
    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&user));
    assert_eq!(foc.usage_count, 1);

    // second application -> already used
    assert!(send_tx(
        &mut svm,
        &[ix_apply_first_order_code(&gateway.pubkey(), &user, &code, 4_000)],
        &[&gateway]
    )
    .is_err());
}

#[test]
fn first_order_code_denied_after_a_completed_order() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(&gateway.pubkey(), &user, mail(1), ip(1), 1, None, None)],
        &[&gateway],
    )
    .unwrap();
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &user, order(1), ip(1), None)],
        &[&gateway],
    )
    .unwrap();

    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&user));
    assert!(send_tx(
        &mut svm,
        &[ix_apply_first_order_code(&gateway.pubkey(), &user, &foc.code(), 4_000)],
        &[&gateway]
    )
    .is_err());
}

#[test]
fn first_order_code_expires() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(&gateway.pubkey(), &user, mail(1), ip(1), 1, None, None)],
        &[&gateway],
    )
    .unwrap();
    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&user));

    advance_clock(&mut svm, 31 * DAY);
    assert!(send_tx(
        &mut svm,
        &[ix_apply_first_order_code(&gateway.pubkey(), &user, &foc.code(), 4_000)],
        &[&gateway]
    )
    .is_err());
}

// ---------------------------------------------------------------------------
// Conversion & reward
// ---------------------------------------------------------------------------

/// Sign up referrer + referee, return (referrer, referee, code).
fn linked_pair(svm: &mut LiteSVM, gateway: &Keypair, tag: u8) -> (Pubkey, Pubkey) {
    let referrer = Pubkey::new_unique();
    let code = setup_referrer(svm, gateway, &referrer, tag);
    let referee = Pubkey::new_unique();
    send_tx(
        svm,
        &[ix_register_signup(
            &gateway.pubkey(),
            &referee,
            mail(tag + 100),
            ip(tag + 100),
            tag as u64 + 100,
            Some(&code),
            Some(&referrer),
        )],
        &[gateway],
    )
    .unwrap();
    (referrer, referee)
}

#[test]
fn first_order_credits_referrer_exactly_once() {
    let (mut svm, _, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);

    let ix = ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer));
    send_tx(&mut svm, &[ix.clone()], &[&gateway]).unwrap();

    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 500);
    assert_eq!(balance.entry_count, 1);

    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referee));
    assert_eq!(rel.status, RelationshipStatus::Converted);
    assert!(rel.reward_credited);
    assert!(rel.converted_at != 0);
    assert_eq!(rel.converted_order, order(1));

    let entry: LedgerEntry = read_account(
        &svm,
        &ledger_entry_pda(&relationship_pda(&referee), LedgerEntry::DIRECTION_CREDIT),
    );
    assert_eq!(entry.user, referrer);
    assert_eq!(entry.amount_cents, 500);
    assert_eq!(entry.balance_before, 0);
    assert_eq!(entry.balance_after, 500);

    let rc: ReferralCode = read_account(&svm, &referral_code_pda(&referrer));
    assert_eq!(rc.converted, 1);
    assert_eq!(rc.pending_reward_cents, 0);
    assert_eq!(rc.total_earned_cents, 500);

    // duplicate webhook delivery: same order id, no double credit
    svm.expire_blockhash();
    send_tx(&mut svm, &[ix], &[&gateway]).unwrap();
    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 500);
    assert_eq!(balance.entry_count, 1);
}

#[test]
fn second_order_of_referee_never_fires() {
    let (mut svm, _, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);

    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(2), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();

    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 500);
    let member: MemberAccount = read_account(&svm, &member_pda(&referee));
    assert_eq!(member.completed_orders, 2);
}

#[test]
fn reward_amount_is_snapshot_at_signup() {
    let (mut svm, admin, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);

    // config change after signup must not affect the existing relationship
    send_tx(&mut svm, &[ix_update_config(&admin.pubkey(), 2, 999)], &[&admin]).unwrap();

    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();
    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 500);
}

#[test]
fn suspension_blocks_pending_relationship_credit() {
    let (mut svm, admin, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);

    send_tx(&mut svm, &[ix_suspend_user(&admin.pubkey(), &referrer, true)], &[&admin]).unwrap();

    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();

    // reward withheld: no balance account, relationship still pending
    assert!(svm.get_account(&credit_balance_pda(&referrer)).is_none());
    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referee));
    assert_eq!(rel.status, RelationshipStatus::Pending);
    assert!(!rel.reward_credited);
}

#[test]
fn ip_velocity_cap_withholds_fourth_credit() {
    let (mut svm, _, gateway) = setup();
    let shared_ip = ip(42);

    let mut referrers = Vec::new();
    let mut referees = Vec::new();
    for tag in 1..=4u8 {
        let (referrer, referee) = linked_pair(&mut svm, &gateway, tag * 10);
        referrers.push(referrer);
        referees.push(referee);
    }

    for i in 0..4 {
        send_tx(
            &mut svm,
            &[ix_record_conversion(
                &gateway.pubkey(),
                &referees[i],
                order(i as u8 + 1),
                shared_ip,
                Some(&referrers[i]),
            )],
            &[&gateway],
        )
        .unwrap();
    }

    for i in 0..3 {
        let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrers[i]));
        assert_eq!(balance.balance_cents, 500);
    }
    // the 4th conversion in the window records no credit
    assert!(svm.get_account(&credit_balance_pda(&referrers[3])).is_none());
    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referees[3]));
    assert_eq!(rel.status, RelationshipStatus::Pending);

    let activity: IpActivity = read_account(&svm, &ip_activity_pda(&shared_ip));
    let credited = activity.timestamps.iter().filter(|&&ts| ts != 0).count();
    assert_eq!(credited, 3);
}

#[test]
fn ip_velocity_cap_releases_after_window() {
    let (mut svm, _, gateway) = setup();
    let shared_ip = ip(42);

    let mut pairs = Vec::new();
    for tag in 1..=4u8 {
        pairs.push(linked_pair(&mut svm, &gateway, tag * 10));
    }
    for (i, (referrer, referee)) in pairs.iter().enumerate().take(3) {
        send_tx(
            &mut svm,
            &[ix_record_conversion(&gateway.pubkey(), referee, order(i as u8 + 1), shared_ip, Some(referrer))],
            &[&gateway],
        )
        .unwrap();
    }

    // a day later the window is clear again
    advance_clock(&mut svm, DAY + 1);
    let (referrer, referee) = &pairs[3];
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), referee, order(4), shared_ip, Some(referrer))],
        &[&gateway],
    )
    .unwrap();
    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(referrer));
    assert_eq!(balance.balance_cents, 500);
}

// ---------------------------------------------------------------------------
// Refund & revocation
// ---------------------------------------------------------------------------

#[test]
fn refund_within_window_revokes_reward() {
    let (mut svm, _, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();

    // three days later the order is refunded
    advance_clock(&mut svm, 3 * DAY);
    let refunded_at = now(&svm);
    let ix = ix_record_refund(&gateway.pubkey(), order(1), refunded_at, &referee, Some(&referrer));
    send_tx(&mut svm, &[ix.clone()], &[&gateway]).unwrap();

    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 0);
    assert_eq!(balance.entry_count, 2);

    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referee));
    assert_eq!(rel.status, RelationshipStatus::Revoked);
    assert!(rel.revoked_at != 0);

    let debit: LedgerEntry = read_account(
        &svm,
        &ledger_entry_pda(&relationship_pda(&referee), LedgerEntry::DIRECTION_DEBIT),
    );
    assert_eq!(debit.amount_cents, -500);
    assert_eq!(debit.balance_before, 500);
    assert_eq!(debit.balance_after, 0);

    let rc: ReferralCode = read_account(&svm, &referral_code_pda(&referrer));
    assert_eq!(rc.converted, 0);
    assert_eq!(rc.revoked, 1);
    assert_eq!(rc.total_earned_cents, 0);

    // duplicate refund delivery is a no-op
    svm.expire_blockhash();
    send_tx(&mut svm, &[ix], &[&gateway]).unwrap();
    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 0);
    assert_eq!(balance.entry_count, 2);
}

#[test]
fn refund_outside_window_leaves_reward() {
    let (mut svm, _, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();

    // refunded 20 days after completion: too late to revoke
    advance_clock(&mut svm, 20 * DAY);
    let refunded_at = now(&svm);
    send_tx(
        &mut svm,
        &[ix_record_refund(&gateway.pubkey(), order(1), refunded_at, &referee, Some(&referrer))],
        &[&gateway],
    )
    .unwrap();

    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 500);
    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referee));
    assert_eq!(rel.status, RelationshipStatus::Converted);
}

#[test]
fn refund_window_judged_by_refund_time_not_delivery_time() {
    let (mut svm, _, gateway) = setup();
    let (referrer, referee) = linked_pair(&mut svm, &gateway, 1);
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &referee, order(1), ip(9), Some(&referrer))],
        &[&gateway],
    )
    .unwrap();
    let completed_at = now(&svm);

    // refund issued on day 13, webhook delivered on day 20: still revokes
    advance_clock(&mut svm, 20 * DAY);
    send_tx(
        &mut svm,
        &[ix_record_refund(
            &gateway.pubkey(),
            order(1),
            completed_at + 13 * DAY,
            &referee,
            Some(&referrer),
        )],
        &[&gateway],
    )
    .unwrap();

    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&referrer));
    assert_eq!(balance.balance_cents, 0);
    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&referee));
    assert_eq!(rel.status, RelationshipStatus::Revoked);
}

#[test]
fn refund_of_plain_order_is_receipt_only() {
    let (mut svm, _, gateway) = setup();
    let user = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(&gateway.pubkey(), &user, mail(1), ip(1), 1, None, None)],
        &[&gateway],
    )
    .unwrap();
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &user, order(1), ip(1), None)],
        &[&gateway],
    )
    .unwrap();
    let refunded_at = now(&svm);
    send_tx(
        &mut svm,
        &[ix_record_refund(&gateway.pubkey(), order(1), refunded_at, &user, None)],
        &[&gateway],
    )
    .unwrap();

    let receipt: ProcessedOrder = read_account(&svm, &processed_order_pda(&order(1)));
    assert!(receipt.refunded);
    assert!(!receipt.credited);
}

// ---------------------------------------------------------------------------
// End-to-end: the worked example
// ---------------------------------------------------------------------------

#[test]
fn share_convert_refund_lifecycle() {
    let (mut svm, _, gateway) = setup();

    // user A shares their code
    let a = Pubkey::new_unique();
    let code = setup_referrer(&mut svm, &gateway, &a, 1);
    assert_eq!(code.len(), 8);

    // user B signs up through ?ref=<code>
    let b = Pubkey::new_unique();
    send_tx(
        &mut svm,
        &[ix_register_signup(&gateway.pubkey(), &b, mail(2), ip(2), 2, Some(&code), Some(&a))],
        &[&gateway],
    )
    .unwrap();
    let foc: FirstOrderCode = read_account(&svm, &first_order_pda(&b));
    assert_eq!(foc.discount_percent, 15);

    // B completes a €40 order -> A's balance +€5
    send_tx(
        &mut svm,
        &[ix_record_conversion(&gateway.pubkey(), &b, order(1), ip(2), Some(&a))],
        &[&gateway],
    )
    .unwrap();
    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&a));
    assert_eq!(balance.balance_cents, 500);

    // the order is refunded 3 days later -> A's balance -€5
    advance_clock(&mut svm, 3 * DAY);
    let refunded_at = now(&svm);
    send_tx(
        &mut svm,
        &[ix_record_refund(&gateway.pubkey(), order(1), refunded_at, &b, Some(&a))],
        &[&gateway],
    )
    .unwrap();
    let balance: CreditBalance = read_account(&svm, &credit_balance_pda(&a));
    assert_eq!(balance.balance_cents, 0);
    let rel: ReferralRelationship = read_account(&svm, &relationship_pda(&b));
    assert_eq!(rel.status, RelationshipStatus::Revoked);
    let timestamp = now(&svm);
    assert!(rel.revoked_at <= timestamp && rel.revoked_at > 0);
}
