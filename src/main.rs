//! Entry point. Wires terminal input -> Parser -> Session -> Store.

mod config;
mod content;
mod engine;
mod levels;
mod parser;
mod progression;
mod store;
mod types;
mod utils;

use dotenvy::dotenv;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::content::ContentStore;
use crate::engine::{decay_stage, DecayStage, PayoffPoint};
use crate::parser::{parse_command, Command};
use crate::progression::{LevelUp, ModuleStatus, Session, StepStatus};
use crate::store::{FileStore, KeyValueStore};
use crate::types::ContentVariant;
use crate::utils::format_money;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    // Load config
    let cfg_path = std::env::var("OPTIONSED_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let cfg = config::AppConfig::load_or_default(&cfg_path)?;
    let data_dir = cfg.storage_dir(std::env::var("OPTIONSED_DATA_DIR").ok())?;
    info!("Progress stored in {}", data_dir.display());

    let content = ContentStore::builtin()?;
    let mut session = Session::initialize(content, FileStore::new(data_dir), cfg.navigation_policy());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if session.needs_onboarding() {
        print_splash();
        let variant = loop {
            let Some(line) = lines.next_line().await? else { return Ok(()) };
            let input = line.trim().to_ascii_lowercase();
            if input.is_empty() {
                break ContentVariant::default();
            }
            let picked = input
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| ContentVariant::ALL.get(i).copied())
                .or_else(|| input.parse().ok());
            match picked {
                Some(v) => break v,
                None => println!("Pick 1 or 2 (got {input:?})"),
            }
        };
        session.complete_onboarding(variant);
    }

    let toast_ttl = Duration::from_secs(cfg.toast.dismiss_after_sec);
    let mut toast: Option<(LevelUp, Instant)> = None;
    render(&session, toast.as_ref().map(|(l, _)| l));

    loop {
        let deadline = toast.as_ref().map(|(_, at)| *at);
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break; };
                let Some(cmd) = parse_command(&line) else {
                    println!("Unrecognized command: {:?} (type `help`)", line.trim());
                    continue;
                };
                match cmd {
                    Command::Quit => break,
                    Command::Next if session.is_last_step() => {
                        reveal_answer(&session);
                        // credit the final step before starting over
                        if let Some(up) = session.advance() {
                            print_level_up(&up);
                        }
                        session.reset();
                        toast = None;
                    }
                    Command::Next => {
                        reveal_answer(&session);
                        if let Some(up) = session.advance() {
                            toast = Some((up, Instant::now() + toast_ttl));
                        }
                    }
                    Command::Back => session.retreat(),
                    Command::Goto { module, step } => {
                        if let Err(e) = session.navigate_to(module, step) {
                            println!("Can't go there: {e}");
                            continue;
                        }
                    }
                    Command::Reset => {
                        session.reset();
                        toast = None;
                    }
                    Command::Variant(v) => session.set_content_variant(v),
                    Command::Outline => {
                        print_outline(&session);
                        continue;
                    }
                    Command::Quote => {
                        print_quote(&session);
                        continue;
                    }
                    Command::Payoff(None) => {
                        print_payoff(&session.payoff_curve(cfg.payoff.range_pct, cfg.payoff.step));
                        continue;
                    }
                    Command::Payoff(Some(a)) => {
                        print_payoff(&engine::generate_payoff_data(
                            a.option_type, a.side, a.strike, a.premium, a.volatility,
                            a.days_left, a.range_start, a.range_end, a.step,
                        ));
                        continue;
                    }
                    Command::Scenario(id) => match content::scenario(&id) {
                        Some(sc) => {
                            session.apply_scenario(sc.option_type, sc.side);
                            println!("{}: {}", sc.name, sc.description);
                            print_quote(&session);
                            continue;
                        }
                        None => {
                            let ids: Vec<_> = content::SCENARIOS.iter().map(|s| s.id).collect();
                            println!("Unknown scenario {id:?}; try one of {}", ids.join(", "));
                            continue;
                        }
                    },
                    Command::Dismiss => toast = None,
                    Command::Help => {
                        print_help();
                        continue;
                    }
                }
                render(&session, toast.as_ref().map(|(l, _)| l));
            }
            _ = toast_expiry(deadline) => {
                toast = None;
                render(&session, None);
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
        }
    }

    info!(
        "Leaving at step {}/{} with {}",
        session.current_step_number(),
        session.total_steps(),
        format_money(session.state().total_profit)
    );
    Ok(())
}

async fn toast_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn print_splash() {
    println!("OptionsEd - learn options trading in 15 minutes");
    println!();
    println!("What you'll learn: calls, puts, time decay, selling premium.");
    println!();
    println!("Choose your experience (you can change it any time with `variant`):");
    println!("  1) Default   - everyday brands, relatable metaphors");
    println!("  2) Tech Bros - Tesla-focused, casino metaphors");
    println!();
    println!("No account needed. Your progress saves locally.");
}

fn print_help() {
    println!("Enter / next     continue (starts over on the last step)");
    println!("back             previous step");
    println!("goto M S         jump to module M, step S (1-based)");
    println!("outline          list modules");
    println!("quote            simulator P/L at the current price");
    println!("payoff [call|put buy|sell K PREMIUM VOL DAYS FROM TO STEP]");
    println!("scenario ID      lottery-ticket | insurance-buyer | insurance-seller | casino-house");
    println!("variant default|tech, reset, dismiss, quit");
}

fn reveal_answer<S: KeyValueStore>(session: &Session<S>) {
    let Some(p) = session.current_step().and_then(|s| s.prediction.as_ref()) else {
        return;
    };
    if let Some(answer) = p.options.get(p.answer) {
        println!("  Answer: {}) {}", p.answer + 1, answer);
    }
}

fn print_level_up(up: &LevelUp) {
    println!(
        "*** New Rank Unlocked: {} (Mastery Level {}) - {} ***",
        up.level.title, up.level.id, up.level.description
    );
}

fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn render<S: KeyValueStore>(session: &Session<S>, toast: Option<&LevelUp>) {
    let st = session.state();
    let (Some(module), Some(step)) = (session.current_module(), session.current_step()) else {
        return;
    };
    let progress = session.progress();
    let change = st.price_change();

    println!();
    println!(
        "== [{}] Module {}/{}: {}  |  Step {} of {} ({}% complete)",
        session.variant(),
        st.module_idx + 1,
        session.modules().len(),
        module.title,
        session.current_step_number(),
        session.total_steps(),
        st.overall_percent(session.modules())
    );
    println!(
        "Rank: {} {} {:.0}%{}  |  Vault: {}",
        progress.current_level.title,
        progress_bar(progress.percent, 20),
        progress.percent,
        progress.next_level.map(|l| format!("  next: {}", l.title)).unwrap_or_default(),
        format_money(st.total_profit)
    );
    println!(
        "{} {} ${:.0} -> ${:.0} ({}{:.1}%)",
        st.sim.symbol,
        content::stock(&st.sim.symbol).map_or("", |s| s.name),
        st.last_initial_price,
        st.sim_price,
        if change.diff > 0.0 { "+" } else { "" },
        change.percent
    );
    println!();
    println!("{}", step.text);
    if let Some(profit) = step.profit {
        let banked = if st.is_claimed(st.module_idx, st.step_idx) { " (already banked)" } else { "" };
        println!("  Step payout: {}{}", format_money(profit), banked);
    }
    for line in &step.math {
        let mark = if line.highlight { "=>" } else { "  " };
        println!("  {} {:<18} {}", mark, line.label, line.value);
    }
    for tip in &step.tooltips {
        println!("  * {}: think of it like... {}", tip.term, tip.metaphor);
    }
    if let Some(p) = &step.prediction {
        println!("  ? {}", p.question);
        for (i, opt) in p.options.iter().enumerate() {
            println!("    {}) {}", i + 1, opt);
        }
    }
    println!();
    if let Some(up) = toast {
        print_level_up(up);
    }
    let primary = if session.is_last_step() { "Start over" } else { step.action_label.as_str() };
    let back = if session.is_first_step() { "" } else { "   [b] back" };
    println!("[Enter] {primary}{back}");
}

fn print_outline<S: KeyValueStore>(session: &Session<S>) {
    for entry in session.outline() {
        let mark = match entry.status {
            ModuleStatus::Completed => "[x]",
            ModuleStatus::Current => "[>]",
            ModuleStatus::Locked => "[ ]",
        };
        println!("{} {}. {}", mark, entry.index + 1, entry.title);
        for (i, s) in entry.steps.iter().enumerate() {
            let m = match s {
                StepStatus::Completed => "x",
                StepStatus::Current => ">",
                StepStatus::Upcoming => " ",
            };
            println!("      ({m}) Step {}", i + 1);
        }
    }
}

fn print_quote<S: KeyValueStore>(session: &Session<S>) {
    let sim = &session.state().sim;
    let q = session.quote();
    let gauge = match decay_stage(sim.days_left) {
        DecayStage::Solid => "SOLID",
        DecayStage::MeltingFast => "MELTING FAST",
        DecayStage::Extinguished => "EXTINGUISHED",
    };
    println!(
        "{} {} {} K={} premium {} | {} days left ({}) | price ${:.2}",
        sim.side,
        sim.symbol,
        sim.option_type,
        sim.strike,
        sim.premium,
        sim.days_left,
        gauge,
        session.state().sim_price
    );
    println!(
        "intrinsic {:.2} + hope {:.2} = {:.2} per share -> P/L {}",
        q.intrinsic,
        q.hope_value,
        q.current_option_value,
        format_money(q.pnl)
    );
}

fn print_payoff(points: &[PayoffPoint]) {
    if points.is_empty() {
        println!("Nothing to plot for that range.");
        return;
    }
    let max_abs = points.iter().map(|p| p.pnl.abs()).fold(0.0_f64, f64::max).max(1.0);
    for p in points {
        let len = ((p.pnl.abs() / max_abs) * 30.0).round() as usize;
        let bar = if p.pnl >= 0.0 { "+".repeat(len) } else { "-".repeat(len) };
        println!("{:>9.2} {:>10} {}", p.price, format_money(p.pnl), bar);
    }
}
