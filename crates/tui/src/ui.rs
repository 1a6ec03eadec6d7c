use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, Wrap};
use solana_sdk::signature::Signer;

use passaparola::codes;
use passaparola::state::RelationshipStatus;

use crate::app::{App, Screen};

fn short_pubkey(pk: &solana_sdk::pubkey::Pubkey) -> String {
    let s = pk.to_string();
    format!("{}..{}", &s[..4], &s[s.len() - 4..])
}

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title bar
            Constraint::Min(10),   // main content
            Constraint::Length(3), // action bar
            Constraint::Length(6), // message log
        ])
        .split(frame.area());

    draw_title_bar(frame, app, chunks[0]);

    match app.screen {
        Screen::Dashboard => draw_dashboard(frame, app, chunks[1]),
        Screen::Inspect => draw_inspect_prompt(frame, app, chunks[1]),
    }

    draw_action_bar(frame, app, chunks[2]);
    draw_message_log(frame, app, chunks[3]);
}

fn draw_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let wallet = short_pubkey(&app.keypair.pubkey());
    let refresh_str = app
        .last_refresh
        .map(|t| format!("{}s ago", t.elapsed().as_secs()))
        .unwrap_or_else(|| "never".into());
    let init_str = if app.config.is_some() {
        "initialized"
    } else {
        "NOT INITIALIZED"
    };
    let title = format!(
        " Passaparola | {} | Engine: {} | Last refresh: {} ",
        wallet, init_str, refresh_str,
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(block, area);
}

fn draw_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    draw_config_panel(frame, app, halves[0]);
    draw_user_panel(frame, app, halves[1]);
}

fn draw_config_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Engine Config ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(config) = &app.config else {
        let text = Paragraph::new(
            "  Config account not found.\n  Run `passaparola-tui <keypair> init --gateway <pk>`.",
        );
        frame.render_widget(text, inner);
        return;
    };

    let rows = vec![
        Row::new(vec!["Admin".into(), short_pubkey(&config.admin)]),
        Row::new(vec!["Gateway".into(), short_pubkey(&config.gateway)]),
        Row::new(vec!["Version".into(), config.version.to_string()]),
        Row::new(vec![
            "First-order discount".into(),
            format!("{}%", config.first_order_discount),
        ]),
        Row::new(vec![
            "Referral discount".into(),
            format!("{}%", config.referral_first_order_discount),
        ]),
        Row::new(vec![
            "Referral reward".into(),
            codes::format_cents(config.referral_reward_cents as i64),
        ]),
        Row::new(vec![
            "Min qualifying order".into(),
            codes::format_cents(config.min_order_cents as i64),
        ]),
        Row::new(vec![
            "Code validity".into(),
            format!("{} days", config.code_validity_days),
        ]),
        Row::new(vec![
            "Revocation window".into(),
            format!("{} days", config.revocation_window_days),
        ]),
        Row::new(vec![
            "IP conversion cap".into(),
            format!(
                "{} per {}h",
                config.ip_conversion_limit, config.ip_window_hours
            ),
        ]),
        Row::new(vec![
            "Review threshold".into(),
            config.review_threshold.to_string(),
        ]),
    ];
    let table = Table::new(
        rows,
        [Constraint::Length(22), Constraint::Min(12)],
    );
    frame.render_widget(table, inner);
}

fn draw_user_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" User Inspector ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(inspected) = &app.inspected else {
        let text = Paragraph::new("  Press [u] and paste a user pubkey to inspect.");
        frame.render_widget(text, inner);
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(format!("User: {}", inspected.user)));

    match &inspected.member {
        Some(member) => {
            let flag = if member.suspended { "  SUSPENDED" } else { "" };
            lines.push(Line::from(format!(
                "Member: {} completed orders{}",
                member.completed_orders, flag
            )));
        }
        None => lines.push(Line::from("Member: not registered")),
    }

    if let Some(code) = &inspected.referral_code {
        let active = if code.is_active { "active" } else { "inactive" };
        lines.push(Line::from(format!(
            "Referral code: {} ({})  {}",
            codes::code_str(&code.code),
            active,
            codes::share_link(&code.code)
        )));
    }
    if let Some(stats) = &inspected.stats {
        lines.push(Line::from(format!(
            "Invites: {}  Converted: {}  Revoked: {}",
            stats.total_invites, stats.conversions, stats.revoked
        )));
        lines.push(Line::from(format!(
            "Pending: {}  Earned: {}",
            codes::format_cents(stats.pending_reward_cents as i64),
            codes::format_cents(stats.total_earned_cents)
        )));
    }
    if let Some(balance) = &inspected.balance {
        lines.push(Line::from(format!(
            "Credit balance: {} ({} ledger entries)",
            codes::format_cents(balance.balance_cents),
            balance.entry_count
        )));
    }
    if let Some(foc) = &inspected.first_order {
        let used = if foc.usage_count >= foc.usage_limit {
            "used"
        } else {
            "unused"
        };
        lines.push(Line::from(format!(
            "First-order code: {} ({}%, {})",
            foc.code(),
            foc.discount_percent,
            used
        )));
    }
    if let Some(rel) = &inspected.relationship {
        let status = match rel.status {
            RelationshipStatus::Pending => "Pending",
            RelationshipStatus::Converted => "Converted",
            RelationshipStatus::Revoked => "Revoked",
        };
        lines.push(Line::from(format!(
            "Referred by: {} ({}, reward {})",
            short_pubkey(&rel.referrer),
            status,
            codes::format_cents(rel.reward_cents as i64)
        )));
    }
    if !inspected.ledger.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Ledger (newest first):",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for entry in &inspected.ledger {
            lines.push(Line::from(format!(
                "  {:>10}  balance {} -> {}",
                codes::format_cents(entry.amount_cents),
                codes::format_cents(entry.balance_before),
                codes::format_cents(entry.balance_after),
            )));
        }
    }

    let text = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(text, inner);
}

fn draw_inspect_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Inspect user ")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text = Paragraph::new(vec![
        Line::from("Enter a user pubkey, then press Enter. Esc to cancel."),
        Line::from(""),
        Line::from(format!("> {}_", app.input_buf)),
    ]);
    frame.render_widget(text, inner);
}

fn draw_action_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.screen {
        Screen::Dashboard => " [u] inspect user  [r] refresh  [q] quit ",
        Screen::Inspect => " [Enter] load  [Esc] cancel ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Keys ")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(hints), inner);
}

fn draw_message_log(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Log ")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let visible = inner.height as usize;
    let start = app.message_log.len().saturating_sub(visible);
    let lines: Vec<Line> = app.message_log[start..]
        .iter()
        .map(|m| Line::from(m.as_str()))
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}
