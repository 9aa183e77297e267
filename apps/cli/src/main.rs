#![deny(warnings)]

//! Headless CLI playing a scripted game against a toy supply/demand model.

use anyhow::{Context, Result};
use grid_core::{
    EnergyFigures, GameConfig, GameEvent, MoneyFigures, ResourceUpdate, SupportFigures,
};
use grid_econ::MAX_IMPORT_PERCENT;
use grid_policy::{Catalog, Selection};
use grid_runtime::GameSession;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_CATALOG: &str = include_str!("../../../assets/catalog.yaml");

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    catalog: Option<String>,
    turns: Option<u32>,
    events: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--catalog" => args.catalog = it.next(),
            "--turns" => args.turns = it.next().and_then(|s| s.parse().ok()),
            "--events" => args.events = true,
            _ => {}
        }
    }
    args
}

/// Figures the external simulation would push for `turn`.
fn simulated_figures(turn: u32, implemented: usize) -> [ResourceUpdate; 3] {
    let t = u64::from(turn);
    let boost = 60 * implemented as u64;
    [
        ResourceUpdate::WinterEnergy(EnergyFigures {
            demand: 1_000 + 20 * t,
            supply: 600 + 40 * t + boost,
        }),
        ResourceUpdate::Support(SupportFigures {
            support: 50 + 3 * t,
        }),
        ResourceUpdate::Money(MoneyFigures {
            budget: 500,
            production: 300 + 10 * t,
            building_cost: 120,
            money: 1_000,
            import_cost: 0,
        }),
    ]
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let config = match &args.config {
        Some(path) => GameConfig::from_file(path).with_context(|| format!("loading {path}"))?,
        None => GameConfig::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_file(path).with_context(|| format!("loading {path}"))?,
        None => Catalog::from_yaml_str(DEFAULT_CATALOG)?,
    };
    let policies: Vec<String> = catalog.policy_keys().map(str::to_string).collect();
    let campaigns: Vec<String> = catalog.campaign_keys().map(str::to_string).collect();

    let mut session = GameSession::new(config, catalog)?;
    if args.events {
        session.subscribe(|e: &GameEvent| {
            if let Ok(line) = serde_json::to_string(e) {
                println!("EVENT | {line}");
            }
        });
    }

    let probability = |key: &str| if key.starts_with("upgrade") { 0.7 } else { 0.4 };
    let max_turns = args.turns.unwrap_or(u32::MAX);
    let mut turn = 0u32;
    while turn < max_turns && session.turn_state().turns_remaining > 0 {
        let implemented = session.voting().implemented().count();
        for update in simulated_figures(turn, implemented) {
            session.apply_update(update);
        }

        // Import half of the open gap.
        let gap = (session.import_target() * 100.0).round() as u8;
        session.set_import_selection((gap / 2).min(MAX_IMPORT_PERCENT))?;
        let winter = session.snapshot().winter;
        if let Some(winter) = winter {
            session.apply_update(ResourceUpdate::WinterEnergy(winter));
        }

        if turn == 1 {
            let quote = session.quote_loan(200)?;
            info!(principal = quote.principal, repayment = quote.repayment, "loan quoted");
            session.confirm_loan(quote.principal)?;
        }

        let campaign = campaigns.get(turn as usize / 3).filter(|_| turn % 3 == 2);
        let selected = match campaign {
            Some(key) => session.select_campaign(key).map(|_| ()),
            None => match policies
                .iter()
                .find(|k| !session.voting().is_implemented(k.as_str()))
            {
                Some(key) => session.select_policy(key, &probability).map(|_| ()),
                None => {
                    session.clear_selection();
                    Ok(())
                }
            },
        };
        selected?;
        if !matches!(session.voting().selection(), Selection::None) {
            match session.cast_vote(&probability) {
                Ok(outcome) => info!(key = %outcome.key, verdict = ?outcome.verdict, "vote"),
                Err(e) => warn!(error = %e, "vote skipped"),
            }
        }

        let ticket = session.request_advance(Instant::now())?;
        let report = session.presentation_finished(ticket)?;
        println!(
            "KPI | year: {} | remaining: {} | import target: {:.1}% | selection: {}% | debt: {} | implemented: {} | campaigns: {}",
            report.year,
            report.turns_remaining,
            report.import_target.unwrap_or(0.0) * 100.0,
            session.import_selection(),
            session.debt().outstanding(),
            session.voting().implemented().count(),
            session.voting().active_campaigns().len(),
        );
        turn += 1;
    }

    println!("{}", serde_json::to_string_pretty(session.turn_state())?);
    Ok(())
}
