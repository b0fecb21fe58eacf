//! CLI commands for hkrace.
//!
//! Supports server mode, data import, statistics queries, parlay simulation
//! and single-race scoring.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::parlay::{self, ParlayReport};
use crate::scoring::{score_race, HorseFactors, HorseScore, ManualAdjustment, ScoringConfig};
use crate::sources::PickSource;
use crate::stats::{
    compute_stats, custom_composite_stats, daily_stats, system_stats, StatsReport, SystemStats,
};
use crate::storage::RaceRepository;
use crate::types::{parse_race_date, RaceCard};

#[derive(Parser)]
#[command(name = "hkrace")]
#[command(version, about = "HK racing strategy statistics and scoring engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },

    /// Import race cards from a JSON file into the database
    Import {
        /// Path to race card JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Per-bet-type statistics for a pick source
    Stats {
        /// Start date (YYYY/MM/DD or ISO)
        #[arg(long)]
        start: Option<String>,

        /// End date (inclusive)
        #[arg(long)]
        end: Option<String>,

        /// Pick source (pundit, trend-30, strategy-<id>, composite)
        #[arg(short, long, default_value = "pundit")]
        source: String,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Per-race-day statistics breakdown
    Daily {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(short, long, default_value = "pundit")]
        source: String,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Statistics for a custom composite blend of sources
    Composite {
        /// Sources to merge (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Pundit accuracy summary
    System {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Simulate sequential parlay chains
    Parlay {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(short, long, default_value = "pundit")]
        source: String,

        /// Match the winner against the top 1 or top 2 picks
        #[arg(long, default_value_t = 1)]
        top_k: usize,

        /// Legs per chain
        #[arg(long, default_value_t = 2)]
        legs: usize,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Score a single race with the configured factor table
    Score {
        /// Race id
        #[arg(value_name = "RACE_ID")]
        race_id: String,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Record an ordered pick list for a named strategy
    SetPicks {
        /// Strategy id
        #[arg(value_name = "STRATEGY_ID")]
        strategy_id: String,

        #[arg(value_name = "RACE_ID")]
        race_id: String,

        /// Horse numbers in rank order (comma separated)
        #[arg(value_name = "HORSES", value_delimiter = ',')]
        horses: Vec<u32>,
    },

    /// Record a manual scoring adjustment for a horse
    Adjust {
        #[arg(value_name = "RACE_ID")]
        race_id: String,

        #[arg(value_name = "HORSE_NO")]
        horse_no: u32,

        /// Points added to the total after weighting
        #[arg(long, default_value_t = 0.0)]
        points: f64,

        /// Raw score replacing the condition factor
        #[arg(long)]
        condition: Option<f64>,
    },
}

fn open_repo(config: &AppConfig) -> Result<RaceRepository> {
    RaceRepository::new(Path::new(&config.database.path))
}

/// Load the scoring configuration, falling back to the built-in defaults.
pub fn load_scoring(config: &AppConfig) -> ScoringConfig {
    match &config.scoring.config_file {
        Some(path) => match ScoringConfig::from_file(path) {
            Ok(sc) => {
                eprintln!("Scoring config loaded from: {}", path);
                sc
            }
            Err(e) => {
                eprintln!("Failed to load scoring config: {}, using defaults", e);
                ScoringConfig::default()
            }
        },
        None => ScoringConfig::default(),
    }
}

fn parse_date_arg(s: &Option<String>) -> Result<Option<NaiveDate>> {
    s.as_deref().map(parse_race_date).transpose()
}

fn load_cards(
    repo: &RaceRepository,
    start: &Option<String>,
    end: &Option<String>,
) -> Result<Vec<RaceCard>> {
    let start = parse_date_arg(start)?;
    let end = parse_date_arg(end)?;
    repo.get_race_cards(start, end)
}

/// One race card in an import file, optionally carrying scoring inputs.
#[derive(Debug, Deserialize)]
struct ImportCard {
    #[serde(flatten)]
    card: RaceCard,
    #[serde(default)]
    horse_factors: Vec<HorseFactors>,
}

/// Import race cards from a JSON file.
pub fn run_import(input: PathBuf) -> Result<()> {
    let config = AppConfig::load()?;
    let mut repo = open_repo(&config)?;

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let cards: Vec<ImportCard> = serde_json::from_str(&content).context("Failed to parse import file")?;

    eprintln!("Importing {} race cards...", cards.len());
    for entry in &cards {
        repo.insert_card(&entry.card)?;
        for factors in &entry.horse_factors {
            repo.insert_horse_factors(&entry.card.race_id, factors)?;
        }
    }
    eprintln!("Done. {} races in database", repo.get_race_count()?);

    Ok(())
}

/// Per-bet-type statistics for one source.
pub fn run_stats(
    start: Option<String>,
    end: Option<String>,
    source: String,
    format: String,
) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;
    let source: PickSource = source.parse()?;

    let cards = load_cards(&repo, &start, &end)?;
    eprintln!("Loaded {} races", cards.len());
    let report = compute_stats(&cards, &source);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_stats_table(&source.to_string(), &report),
    }
    Ok(())
}

/// Daily breakdown.
pub fn run_daily(
    start: Option<String>,
    end: Option<String>,
    source: String,
    format: String,
) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;
    let source: PickSource = source.parse()?;

    let cards = load_cards(&repo, &start, &end)?;
    let days = daily_stats(&cards, &source);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&days)?),
        _ => {
            println!("=== Daily Stats ({}) ===", source);
            println!(
                "  {:12} {:>6} {:>8} {:>8} {:>10} {:>8}",
                "Date", "Races", "Win", "Win%", "Win net", "Q%"
            );
            println!("  {}", "-".repeat(58));
            for day in &days {
                println!(
                    "  {:12} {:>6} {:>8} {:>7.1}% {:>10.2} {:>7.1}%",
                    day.date.to_string(),
                    day.report.races,
                    day.report.win.hits,
                    day.report.win.rate_pct,
                    day.report.win.net,
                    day.report.quinella.rate_pct,
                );
            }
        }
    }
    Ok(())
}

/// Custom composite blend.
pub fn run_composite(
    sources: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    format: String,
) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;

    let sources = sources
        .iter()
        .map(|s| s.parse::<PickSource>())
        .collect::<Result<Vec<_>>>()?;
    if sources.is_empty() {
        anyhow::bail!("No sources provided");
    }
    let label = PickSource::Composite(sources.clone()).to_string();

    let cards = load_cards(&repo, &start, &end)?;
    let report = custom_composite_stats(&cards, sources);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_stats_table(&label, &report),
    }
    Ok(())
}

/// Pundit accuracy summary.
pub fn run_system(start: Option<String>, end: Option<String>, format: String) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;

    let cards = load_cards(&repo, &start, &end)?;
    let stats = system_stats(&cards);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_system_table(&stats),
    }
    Ok(())
}

/// Parlay simulation.
pub fn run_parlay(
    start: Option<String>,
    end: Option<String>,
    source: String,
    top_k: usize,
    legs: usize,
    format: String,
) -> Result<()> {
    if !(1..=2).contains(&top_k) {
        anyhow::bail!("top_k must be 1 or 2");
    }
    if legs == 0 {
        anyhow::bail!("legs must be at least 1");
    }
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;
    let source: PickSource = source.parse()?;

    let cards = load_cards(&repo, &start, &end)?;
    let report = parlay::simulate(&cards, &source, top_k, legs);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_parlay_table(&source.to_string(), legs, &report),
    }
    Ok(())
}

/// Score one race.
pub fn run_score(race_id: String, format: String) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;
    let scoring = load_scoring(&config);

    let card = repo
        .get_race_card(&race_id)?
        .with_context(|| format!("Unknown race: {}", race_id))?;
    let factors = repo.get_horse_factors(&race_id)?;
    let adjustments = repo.get_manual_adjustments(&race_id)?;

    let scores = score_race(card.race_date, &factors, &scoring, &adjustments);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&scores)?),
        _ => print_score_table(&race_id, &scores),
    }
    Ok(())
}

/// Record a strategy pick list.
pub fn run_set_picks(strategy_id: String, race_id: String, horses: Vec<u32>) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;

    if !repo.race_exists(&race_id)? {
        anyhow::bail!("Unknown race: {}", race_id);
    }
    if horses.is_empty() {
        anyhow::bail!("No horses provided");
    }

    repo.set_strategy_picks(&strategy_id, &race_id, &horses)?;
    eprintln!(
        "Saved {} picks for strategy {} race {}",
        horses.len(),
        strategy_id,
        race_id
    );
    Ok(())
}

/// Record a manual adjustment.
pub fn run_adjust(
    race_id: String,
    horse_no: u32,
    points: f64,
    condition: Option<f64>,
) -> Result<()> {
    let config = AppConfig::load()?;
    let repo = open_repo(&config)?;

    if !repo.race_exists(&race_id)? {
        anyhow::bail!("Unknown race: {}", race_id);
    }

    repo.set_manual_adjustment(
        &race_id,
        horse_no,
        &ManualAdjustment {
            manual_points: points,
            condition_override: condition,
        },
    )?;
    eprintln!("Adjustment saved for race {} horse {}", race_id, horse_no);
    Ok(())
}

/// Print per-bet-type statistics in table format.
fn print_stats_table(source: &str, report: &StatsReport) {
    println!("=== Stats ({}) ===", source);
    println!();
    println!("Races included: {}", report.races);
    println!();
    println!(
        "  {:10} {:>6} {:>8} {:>10} {:>10} {:>10} {:>8}",
        "Bet", "Hits", "Rate", "Revenue", "Cost", "Net", "ROI"
    );
    println!("  {}", "-".repeat(68));
    for (name, row) in [
        ("Win", &report.win),
        ("Quinella", &report.quinella),
        ("Tierce", &report.tierce),
        ("First 4", &report.first4),
    ] {
        println!(
            "  {:10} {:>6} {:>7.1}% {:>10.2} {:>10.2} {:>10.2} {:>7.1}%",
            name, row.hits, row.rate_pct, row.revenue, row.cost, row.net, row.roi_pct
        );
    }
    println!();
    println!("Box-6 hit rates:");
    println!(
        "  Win {:>5.1}%   Quinella {:>5.1}%   Tierce {:>5.1}%   First 4 {:>5.1}%",
        report.box6.win_rate_pct,
        report.box6.quinella_rate_pct,
        report.box6.tierce_rate_pct,
        report.box6.first4_rate_pct,
    );
}

/// Print the pundit accuracy summary in table format.
fn print_system_table(stats: &SystemStats) {
    println!("=== System Stats (pundit) ===");
    println!();
    println!("  Races:             {}", stats.races);
    println!(
        "  Top-1 wins:        {} ({:.1}%)",
        stats.top1_wins, stats.top1_win_rate_pct
    );
    println!(
        "  Top-1 places:      {} ({:.1}%)",
        stats.top1_places, stats.top1_place_rate_pct
    );
    println!(
        "  Top-2 quinellas:   {} ({:.1}%)",
        stats.top2_quinellas, stats.top2_quinella_rate_pct
    );
    println!("  Total staked:      {:.2}", stats.total_staked);
    println!("  Net profit:        {:.2}", stats.net_profit);
    println!("  ROI:               {:.1}%", stats.roi_pct);
}

/// Print parlay simulation results in table format.
fn print_parlay_table(source: &str, legs: usize, report: &ParlayReport) {
    println!("=== Parlay ({}, {} legs) ===", source, legs);
    println!();
    println!("  Chains:      {}", report.total_chains);
    println!(
        "  Hit chains:  {} ({:.1}%)",
        report.hit_chains, report.hit_rate_pct
    );
    println!("  Net profit:  {:.2}", report.net_profit);
    println!("  ROI:         {:.1}%", report.roi_pct);
    println!();
    for chain in &report.chains {
        let outcome = if chain.won { "WIN " } else { "LOSS" };
        println!("  {} {} net {:>8.2}", chain.date, outcome, chain.net);
    }
}

/// Print scored horses in table format.
fn print_score_table(race_id: &str, scores: &[HorseScore]) {
    println!("=== Scores for {} ===", race_id);
    println!();
    println!("  {:>5} {:>8}", "Horse", "Score");
    println!("  {}", "-".repeat(16));
    for score in scores {
        println!("  {:>5} {:>8.2}", score.horse_no, score.total);
    }
}
