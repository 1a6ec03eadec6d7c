use std::io;
use std::time::Instant;

use anchor_lang::{AccountDeserialize, AnchorSerialize};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::prelude::*;
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_config::RpcProgramAccountsConfig;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};

use passaparola::state::{
    ConfigParam, CreditBalance, FirstOrderCode, LedgerEntry, MemberAccount, ProgramConfig,
    ReferralCode, ReferralRelationship,
};
use passaparola::stats::{referral_stats, ReferralStats};

use crate::ui;

const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");

/// Anchor instruction discriminator: first 8 bytes of SHA-256("global:<name>")
fn sighash(name: &str) -> Vec<u8> {
    let hash = solana_sdk::hash::hash(format!("global:{}", name).as_bytes());
    hash.to_bytes()[..8].to_vec()
}

// ---------------------------------------------------------------------------
// PDAs
// ---------------------------------------------------------------------------

pub fn config_pda() -> Pubkey {
    Pubkey::find_program_address(&[ProgramConfig::SEED], &passaparola::ID).0
}

pub fn member_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[MemberAccount::SEED, user.as_ref()], &passaparola::ID).0
}

pub fn referral_code_pda(owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[ReferralCode::SEED, owner.as_ref()], &passaparola::ID).0
}

pub fn first_order_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[FirstOrderCode::SEED, user.as_ref()], &passaparola::ID).0
}

pub fn relationship_pda(referee: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[ReferralRelationship::SEED, referee.as_ref()],
        &passaparola::ID,
    )
    .0
}

pub fn credit_balance_pda(user: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[CreditBalance::SEED, user.as_ref()], &passaparola::ID).0
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Inspect,
}

/// Everything the dashboard shows for one storefront user.
pub struct InspectedUser {
    pub user: Pubkey,
    pub member: Option<MemberAccount>,
    pub referral_code: Option<ReferralCode>,
    pub stats: Option<ReferralStats>,
    pub balance: Option<CreditBalance>,
    pub first_order: Option<FirstOrderCode>,
    pub relationship: Option<ReferralRelationship>,
    pub ledger: Vec<LedgerEntry>,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pub rpc: RpcClient,
    pub keypair: Keypair,
    pub verbose: bool,
    pub should_quit: bool,
    pub screen: Screen,
    pub message_log: Vec<String>,

    pub config: Option<ProgramConfig>,
    pub inspected: Option<InspectedUser>,

    pub input_buf: String,
    pub last_refresh: Option<Instant>,
    pub last_tx_signature: Option<String>,
}

impl App {
    pub fn new(rpc_url: &str, keypair: Keypair, verbose: bool) -> Self {
        let rpc =
            RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());

        let mut app = Self {
            rpc,
            keypair,
            verbose,
            should_quit: false,
            screen: Screen::Dashboard,
            message_log: Vec::new(),
            config: None,
            inspected: None,
            input_buf: String::new(),
            last_refresh: None,
            last_tx_signature: None,
        };
        app.push_log("Welcome to the Passaparola console");
        app.push_log(format!("Wallet: {}", app.keypair.pubkey()));
        app.refresh();
        app
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if self.verbose {
            eprintln!("[INFO] {}", msg);
        }
        self.message_log.push(msg);
        if self.message_log.len() > 100 {
            self.message_log.remove(0);
        }
    }

    pub fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| ui::draw(frame, self))?;

            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    self.should_quit = true;
                    continue;
                }
                match self.screen {
                    Screen::Dashboard => self.handle_dashboard_key(key.code),
                    Screen::Inspect => self.handle_inspect_key(key.code),
                }
            }
        }
        Ok(())
    }

    fn handle_dashboard_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('u') => {
                self.input_buf.clear();
                self.screen = Screen::Inspect;
            }
            _ => {}
        }
    }

    fn handle_inspect_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.screen = Screen::Dashboard,
            KeyCode::Enter => {
                let input = self.input_buf.trim().to_string();
                match input.parse::<Pubkey>() {
                    Ok(user) => {
                        self.load_user(&user);
                        self.screen = Screen::Dashboard;
                    }
                    Err(_) => self.push_log(format!("Not a valid pubkey: {}", input)),
                }
            }
            KeyCode::Backspace => {
                self.input_buf.pop();
            }
            KeyCode::Char(c) => self.input_buf.push(c),
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn read_anchor<T: AccountDeserialize>(&self, address: &Pubkey) -> Option<T> {
        let account = self.rpc.get_account(address).ok()?;
        T::try_deserialize(&mut account.data.as_slice()).ok()
    }

    pub fn refresh(&mut self) {
        self.config = self.read_anchor(&config_pda());
        if self.config.is_none() {
            self.push_log("Config account not found (program not initialized?)");
        }
        if let Some(user) = self.inspected.as_ref().map(|i| i.user) {
            self.load_user(&user);
        }
        self.last_refresh = Some(Instant::now());
    }

    pub fn load_user(&mut self, user: &Pubkey) {
        let member: Option<MemberAccount> = self.read_anchor(&member_pda(user));
        let referral_code: Option<ReferralCode> = self.read_anchor(&referral_code_pda(user));
        let stats = referral_code.as_ref().map(referral_stats);
        let balance = self.read_anchor(&credit_balance_pda(user));
        let first_order = self.read_anchor(&first_order_pda(user));
        let relationship = self.read_anchor(&relationship_pda(user));
        let ledger = self.ledger_history(user, 20);

        if member.is_none() {
            self.push_log(format!("No member account for {}", user));
        } else {
            self.push_log(format!("Loaded user {}", user));
        }
        self.inspected = Some(InspectedUser {
            user: *user,
            member,
            referral_code,
            stats,
            balance,
            first_order,
            relationship,
            ledger,
        });
    }

    /// Ledger entries where this user is the credited/debited party, newest
    /// first, at most `limit`.
    pub fn ledger_history(&self, user: &Pubkey, limit: usize) -> Vec<LedgerEntry> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(LedgerEntry::SIZE as u64),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(8, user.as_ref())),
            ]),
            ..Default::default()
        };
        let mut entries: Vec<LedgerEntry> = self
            .rpc
            .get_program_accounts_with_config(&passaparola::ID, config)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(_, account)| {
                LedgerEntry::try_deserialize(&mut account.data.as_slice()).ok()
            })
            .collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        entries.truncate(limit);
        entries
    }

    /// Whether the user has a referral code account. A transport failure is
    /// surfaced as an error, never folded into "no code" — suspend-user
    /// decides from this whether to deactivate the code account.
    pub fn has_referral_code(&self, user: &Pubkey) -> Result<bool, String> {
        let response = self
            .rpc
            .get_account_with_commitment(&referral_code_pda(user), self.rpc.commitment())
            .map_err(|e| format!("Failed to look up referral code: {e}"))?;
        Ok(response.value.is_some())
    }

    // -----------------------------------------------------------------------
    // Instruction builders (admin surface only; storefront events go through
    // the gateway service, not this console)
    // -----------------------------------------------------------------------

    pub fn ix_initialize(&self, gateway: &Pubkey) -> Instruction {
        let mut data = sighash("initialize_program");
        data.extend_from_slice(gateway.as_ref());
        Instruction::new_with_bytes(
            passaparola::ID,
            &data,
            vec![
                AccountMeta::new(self.keypair.pubkey(), true),
                AccountMeta::new(config_pda(), false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )
    }

    pub fn ix_update_config(&self, param: ConfigParam, value: u64) -> Instruction {
        let mut data = sighash("update_config");
        param.serialize(&mut data).expect("enum serializes");
        data.extend_from_slice(&value.to_le_bytes());
        Instruction::new_with_bytes(
            passaparola::ID,
            &data,
            vec![
                AccountMeta::new_readonly(self.keypair.pubkey(), true),
                AccountMeta::new(config_pda(), false),
            ],
        )
    }

    pub fn ix_set_gateway(&self, new_gateway: &Pubkey) -> Instruction {
        let mut data = sighash("set_gateway");
        data.extend_from_slice(new_gateway.as_ref());
        Instruction::new_with_bytes(
            passaparola::ID,
            &data,
            vec![
                AccountMeta::new_readonly(self.keypair.pubkey(), true),
                AccountMeta::new(config_pda(), false),
            ],
        )
    }

    pub fn ix_transfer_admin(&self, new_admin: &Pubkey) -> Instruction {
        let mut data = sighash("transfer_admin");
        data.extend_from_slice(new_admin.as_ref());
        Instruction::new_with_bytes(
            passaparola::ID,
            &data,
            vec![
                AccountMeta::new_readonly(self.keypair.pubkey(), true),
                AccountMeta::new(config_pda(), false),
            ],
        )
    }

    pub fn ix_accept_admin(&self) -> Instruction {
        Instruction::new_with_bytes(
            passaparola::ID,
            &sighash("accept_admin"),
            vec![
                AccountMeta::new_readonly(self.keypair.pubkey(), true),
                AccountMeta::new(config_pda(), false),
            ],
        )
    }

    pub fn ix_suspend_user(&self, user: &Pubkey, has_code: bool) -> Instruction {
        let code_meta = if has_code {
            AccountMeta::new(referral_code_pda(user), false)
        } else {
            AccountMeta::new_readonly(passaparola::ID, false)
        };
        Instruction::new_with_bytes(
            passaparola::ID,
            &sighash("suspend_user"),
            vec![
                AccountMeta::new_readonly(self.keypair.pubkey(), true),
                AccountMeta::new_readonly(config_pda(), false),
                AccountMeta::new_readonly(*user, false),
                AccountMeta::new(member_pda(user), false),
                code_meta,
            ],
        )
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    pub fn send_ix(&mut self, ix: Instruction, description: &str) -> Result<String, String> {
        self.push_log(format!("Sending: {}", description));
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .map_err(|e| format!("Failed to get blockhash: {e}"))?;
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&self.keypair.pubkey()),
            &[&self.keypair],
            blockhash,
        );
        match self.rpc.send_and_confirm_transaction(&tx) {
            Ok(sig) => {
                let sig = sig.to_string();
                self.push_log(format!("Confirmed: {}", sig));
                self.last_tx_signature = Some(sig.clone());
                self.refresh();
                Ok(sig)
            }
            Err(e) => {
                let msg = format!("Transaction failed: {e}");
                self.push_log(msg.clone());
                Err(msg)
            }
        }
    }
}

/// Parse a kebab-case parameter name as used on the command line.
pub fn parse_config_param(name: &str) -> Result<ConfigParam, String> {
    match name {
        "first-order-discount" => Ok(ConfigParam::FirstOrderDiscount),
        "referral-first-order-discount" => Ok(ConfigParam::ReferralFirstOrderDiscount),
        "referral-reward-cents" => Ok(ConfigParam::ReferralRewardCents),
        "min-order-cents" => Ok(ConfigParam::MinOrderCents),
        "code-validity-days" => Ok(ConfigParam::CodeValidityDays),
        "revocation-window-days" => Ok(ConfigParam::RevocationWindowDays),
        "ip-conversion-limit" => Ok(ConfigParam::IpConversionLimit),
        "ip-window-hours" => Ok(ConfigParam::IpWindowHours),
        "review-threshold" => Ok(ConfigParam::ReviewThreshold),
        other => Err(format!(
            "Unknown parameter \"{}\". Known: first-order-discount, \
             referral-first-order-discount, referral-reward-cents, min-order-cents, \
             code-validity-days, revocation-window-days, ip-conversion-limit, \
             ip-window-hours, review-threshold",
            other
        )),
    }
}
