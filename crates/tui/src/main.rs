mod app;
mod ui;

use std::io::{self, stdout};
use std::str::FromStr;

use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Signer};

use passaparola::codes;
use passaparola::state::RelationshipStatus;

#[derive(Parser)]
#[command(name = "passaparola-tui")]
#[command(about = "Operator console for the Passaparola referral engine")]
struct Cli {
    /// Path to the keypair JSON file
    keypair: String,

    /// Solana cluster (localnet, devnet, mainnet-beta, or a custom RPC URL)
    #[arg(long, default_value = "localnet")]
    cluster: String,

    /// Print progress/debug info to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand)]
enum Action {
    /// Read-only dump of the engine config
    Status,
    /// Referral stats and credit balance for one user
    Stats {
        /// User public key
        #[arg(long)]
        user: String,
    },
    /// Store-credit ledger history for one user, newest first
    History {
        /// User public key
        #[arg(long)]
        user: String,
        /// Maximum number of entries to return
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Initialize the engine config (deployer only, one-time)
    Init {
        /// Gateway public key authorized to forward storefront events
        #[arg(long)]
        gateway: String,
    },
    /// Update one numeric config parameter (admin only)
    UpdateConfig {
        /// Parameter name, e.g. referral-reward-cents
        #[arg(long)]
        param: String,
        /// New value
        #[arg(long)]
        value: u64,
    },
    /// Rotate the gateway identity (admin only)
    SetGateway {
        /// New gateway public key
        #[arg(long)]
        gateway: String,
    },
    /// Begin a two-step admin handover (current admin only)
    TransferAdmin {
        /// New admin public key
        #[arg(long)]
        new_admin: String,
    },
    /// Complete the handover (pending admin only)
    AcceptAdmin,
    /// Suspend a user and deactivate their referral code (admin only)
    SuspendUser {
        /// User public key
        #[arg(long)]
        user: String,
    },
}

// ---------------------------------------------------------------------------
// JSON output types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(tag = "type")]
enum CliOutput {
    #[serde(rename = "success")]
    Success { action: String, signature: String },
    #[serde(rename = "error")]
    Error { action: String, error: String },
    #[serde(rename = "status")]
    Status(EngineStatus),
    #[serde(rename = "stats")]
    Stats(UserStats),
    #[serde(rename = "history")]
    History(UserHistory),
}

#[derive(Serialize)]
struct EngineStatus {
    wallet: String,
    initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ConfigValues>,
}

#[derive(Serialize)]
struct ConfigValues {
    version: u32,
    first_order_discount_percent: u8,
    referral_first_order_discount_percent: u8,
    referral_reward: String,
    min_qualifying_order: String,
    code_validity_days: u16,
    revocation_window_days: u16,
    ip_conversion_limit: u8,
    ip_window_hours: u16,
    review_threshold: u32,
}

#[derive(Serialize)]
struct UserStats {
    user: String,
    registered: bool,
    suspended: bool,
    completed_orders: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    referral_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    share_link: Option<String>,
    total_invites: u32,
    conversions: u32,
    revoked: u32,
    pending_reward: String,
    total_earned: String,
    credit_balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    referred_by: Option<ReferredBy>,
}

#[derive(Serialize)]
struct ReferredBy {
    referrer: String,
    status: String,
    reward: String,
}

#[derive(Serialize)]
struct UserHistory {
    user: String,
    entries: Vec<HistoryEntry>,
    current_balance: String,
}

#[derive(Serialize)]
struct HistoryEntry {
    amount: String,
    balance_before: String,
    balance_after: String,
    reference: String,
    created_at: i64,
}

fn cluster_to_url(cluster: &str) -> &str {
    match cluster {
        "localnet" | "localhost" => "http://127.0.0.1:8899",
        "devnet" => "https://api.devnet.solana.com",
        "mainnet-beta" | "mainnet" => "https://api.mainnet-beta.solana.com",
        url => url,
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let rpc_url = cluster_to_url(&cli.cluster);

    let keypair = read_keypair_file(&cli.keypair).unwrap_or_else(|e| {
        eprintln!("Failed to read keypair from {}: {}", cli.keypair, e);
        std::process::exit(1);
    });

    match cli.action {
        Some(action) => {
            run_oneshot(rpc_url, keypair, cli.verbose, action);
            Ok(())
        }
        None => run_interactive(rpc_url, keypair),
    }
}

fn run_interactive(rpc_url: &str, keypair: solana_sdk::signature::Keypair) -> io::Result<()> {
    // Panic hook: always restore terminal.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = app::App::new(rpc_url, keypair, false);
    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    result
}

fn run_oneshot(
    rpc_url: &str,
    keypair: solana_sdk::signature::Keypair,
    verbose: bool,
    action: Action,
) {
    let mut app = app::App::new(rpc_url, keypair, verbose);
    let output = execute_action(&mut app, &action);
    let failed = matches!(output, CliOutput::Error { .. });
    println!("{}", serde_json::to_string(&output).unwrap());
    if failed {
        std::process::exit(1);
    }
}

fn action_to_name(action: &Action) -> String {
    match action {
        Action::Status => "status".into(),
        Action::Stats { .. } => "stats".into(),
        Action::History { .. } => "history".into(),
        Action::Init { .. } => "init".into(),
        Action::UpdateConfig { .. } => "update-config".into(),
        Action::SetGateway { .. } => "set-gateway".into(),
        Action::TransferAdmin { .. } => "transfer-admin".into(),
        Action::AcceptAdmin => "accept-admin".into(),
        Action::SuspendUser { .. } => "suspend-user".into(),
    }
}

fn parse_pubkey(action: &str, s: &str) -> Result<Pubkey, CliOutput> {
    Pubkey::from_str(s).map_err(|_| CliOutput::Error {
        action: action.into(),
        error: format!("Invalid pubkey: {}", s),
    })
}

fn execute_action(app: &mut app::App, action: &Action) -> CliOutput {
    let name = action_to_name(action);
    match action {
        Action::Status => build_status_output(app),
        Action::Stats { user } => {
            let user = match parse_pubkey(&name, user) {
                Ok(pk) => pk,
                Err(e) => return e,
            };
            app.load_user(&user);
            build_stats_output(app, &user)
        }
        Action::History { user, limit } => {
            let user = match parse_pubkey(&name, user) {
                Ok(pk) => pk,
                Err(e) => return e,
            };
            build_history_output(app, &user, *limit)
        }
        Action::Init { gateway } => {
            if app.config.is_some() {
                return CliOutput::Error {
                    action: name,
                    error: "Engine already initialized".into(),
                };
            }
            let gateway = match parse_pubkey(&name, gateway) {
                Ok(pk) => pk,
                Err(e) => return e,
            };
            let ix = app.ix_initialize(&gateway);
            send(app, name, ix)
        }
        Action::UpdateConfig { param, value } => {
            let param = match app::parse_config_param(param) {
                Ok(p) => p,
                Err(error) => return CliOutput::Error { action: name, error },
            };
            let ix = app.ix_update_config(param, *value);
            send(app, name, ix)
        }
        Action::SetGateway { gateway } => {
            let gateway = match parse_pubkey(&name, gateway) {
                Ok(pk) => pk,
                Err(e) => return e,
            };
            let ix = app.ix_set_gateway(&gateway);
            send(app, name, ix)
        }
        Action::TransferAdmin { new_admin } => {
            let new_admin = match parse_pubkey(&name, new_admin) {
                Ok(pk) => pk,
                Err(e) => return e,
            };
            let ix = app.ix_transfer_admin(&new_admin);
            send(app, name, ix)
        }
        Action::AcceptAdmin => {
            let ix = app.ix_accept_admin();
            send(app, name, ix)
        }
        Action::SuspendUser { user } => {
            let user = match parse_pubkey(&name, user) {
                Ok(pk) => pk,
                Err(e) => return e,
            };
            let has_code = match app.has_referral_code(&user) {
                Ok(has_code) => has_code,
                Err(error) => return CliOutput::Error { action: name, error },
            };
            let ix = app.ix_suspend_user(&user, has_code);
            send(app, name, ix)
        }
    }
}

fn send(app: &mut app::App, action: String, ix: solana_sdk::instruction::Instruction) -> CliOutput {
    match app.send_ix(ix, &action) {
        Ok(signature) => CliOutput::Success { action, signature },
        Err(error) => CliOutput::Error { action, error },
    }
}

fn build_status_output(app: &app::App) -> CliOutput {
    let status = match &app.config {
        Some(config) => EngineStatus {
            wallet: app.keypair.pubkey().to_string(),
            initialized: true,
            admin: Some(config.admin.to_string()),
            gateway: Some(config.gateway.to_string()),
            config: Some(ConfigValues {
                version: config.version,
                first_order_discount_percent: config.first_order_discount,
                referral_first_order_discount_percent: config.referral_first_order_discount,
                referral_reward: codes::format_cents(config.referral_reward_cents as i64),
                min_qualifying_order: codes::format_cents(config.min_order_cents as i64),
                code_validity_days: config.code_validity_days,
                revocation_window_days: config.revocation_window_days,
                ip_conversion_limit: config.ip_conversion_limit,
                ip_window_hours: config.ip_window_hours,
                review_threshold: config.review_threshold,
            }),
        },
        None => EngineStatus {
            wallet: app.keypair.pubkey().to_string(),
            initialized: false,
            admin: None,
            gateway: None,
            config: None,
        },
    };
    CliOutput::Status(status)
}

fn relationship_status_name(status: RelationshipStatus) -> String {
    match status {
        RelationshipStatus::Pending => "pending".into(),
        RelationshipStatus::Converted => "converted".into(),
        RelationshipStatus::Revoked => "revoked".into(),
    }
}

fn build_stats_output(app: &app::App, user: &Pubkey) -> CliOutput {
    let Some(inspected) = &app.inspected else {
        return CliOutput::Error {
            action: "stats".into(),
            error: "Lookup failed".into(),
        };
    };

    let stats = inspected.stats;
    CliOutput::Stats(UserStats {
        user: user.to_string(),
        registered: inspected.member.is_some(),
        suspended: inspected.member.as_ref().map(|m| m.suspended).unwrap_or(false),
        completed_orders: inspected
            .member
            .as_ref()
            .map(|m| m.completed_orders)
            .unwrap_or(0),
        referral_code: inspected
            .referral_code
            .as_ref()
            .map(|c| codes::code_str(&c.code)),
        share_link: inspected
            .referral_code
            .as_ref()
            .map(|c| codes::share_link(&c.code)),
        total_invites: stats.map(|s| s.total_invites).unwrap_or(0),
        conversions: stats.map(|s| s.conversions).unwrap_or(0),
        revoked: stats.map(|s| s.revoked).unwrap_or(0),
        pending_reward: codes::format_cents(
            stats.map(|s| s.pending_reward_cents as i64).unwrap_or(0),
        ),
        total_earned: codes::format_cents(stats.map(|s| s.total_earned_cents).unwrap_or(0)),
        credit_balance: codes::format_cents(
            inspected.balance.as_ref().map(|b| b.balance_cents).unwrap_or(0),
        ),
        referred_by: inspected.relationship.as_ref().map(|rel| ReferredBy {
            referrer: rel.referrer.to_string(),
            status: relationship_status_name(rel.status),
            reward: codes::format_cents(rel.reward_cents as i64),
        }),
    })
}

fn build_history_output(app: &app::App, user: &Pubkey, limit: usize) -> CliOutput {
    let entries = app.ledger_history(user, limit);
    // newest first, so the head carries the current balance
    let current_balance = entries.first().map(|e| e.balance_after).unwrap_or(0);
    let entries = entries
        .iter()
        .map(|e| HistoryEntry {
            amount: codes::format_cents(e.amount_cents),
            balance_before: codes::format_cents(e.balance_before),
            balance_after: codes::format_cents(e.balance_after),
            reference: format!("{:?}", e.reference_type),
            created_at: e.created_at,
        })
        .collect();
    CliOutput::History(UserHistory {
        user: user.to_string(),
        entries,
        current_balance: codes::format_cents(current_balance),
    })
}
