//! Parlay simulation: one chain per race day, staking the first race's picks
//! and rolling the winning dividend into each following leg.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::results::parse_results;
use crate::sources::PickSource;
use crate::stats::round1;
use crate::types::RaceCard;

/// Fixed unit stake opening every chain. A lost chain always costs exactly
/// this much, no matter how many legs it survived.
pub const CHAIN_STAKE: f64 = 20.0;

/// One leg of a simulated chain.
#[derive(Debug, Clone, Serialize)]
pub struct LegDetail {
    pub race_id: String,
    pub winner: Option<u32>,
    pub picks: Vec<u32>,
    pub hit: bool,
    /// Stake carried into the next leg (the winning dividend), if the leg hit.
    pub stake_after: f64,
}

/// One simulated chain (one race day).
#[derive(Debug, Clone, Serialize)]
pub struct ChainDetail {
    pub date: NaiveDate,
    pub legs: Vec<LegDetail>,
    pub won: bool,
    pub net: f64,
}

/// Aggregate parlay simulation results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParlayReport {
    pub total_chains: u32,
    pub hit_chains: u32,
    pub hit_rate_pct: f64,
    pub net_profit: f64,
    pub roi_pct: f64,
    pub chains: Vec<ChainDetail>,
}

/// Simulate sequential multi-leg chains over a race set.
///
/// Each calendar date with at least `legs` races forms one chain from that
/// date's first `legs` races ordered by race number; dates with fewer races
/// are excluded from both numerator and denominator. A leg with missing
/// payout data or empty picks fails its whole chain (a miss, not a skip):
/// the chain requires every leg to be evaluable.
pub fn simulate(
    cards: &[RaceCard],
    source: &PickSource,
    pick_top_k: usize,
    legs: usize,
) -> ParlayReport {
    let mut by_date: BTreeMap<NaiveDate, Vec<&RaceCard>> = BTreeMap::new();
    for card in cards {
        by_date.entry(card.race_date).or_default().push(card);
    }

    let mut report = ParlayReport::default();

    for (date, mut day_cards) in by_date {
        if day_cards.len() < legs {
            continue;
        }
        day_cards.sort_by_key(|c| c.race_no);

        let chain = run_chain(date, &day_cards[..legs], source, pick_top_k);
        report.total_chains += 1;
        if chain.won {
            report.hit_chains += 1;
        }
        report.net_profit += chain.net;
        report.chains.push(chain);
    }

    if report.total_chains > 0 {
        report.hit_rate_pct = round1(
            report.hit_chains as f64 / report.total_chains as f64 * 100.0,
        );
        report.roi_pct = round1(
            report.net_profit / (report.total_chains as f64 * CHAIN_STAKE) * 100.0,
        );
    }

    report
}

fn run_chain(
    date: NaiveDate,
    day_cards: &[&RaceCard],
    source: &PickSource,
    pick_top_k: usize,
) -> ChainDetail {
    let mut stake = CHAIN_STAKE;
    let mut legs = Vec::with_capacity(day_cards.len());
    let mut alive = true;

    for card in day_cards {
        let outcome = parse_results(&card.pools);
        let picks = source.resolve(card);

        let hit = match (&outcome, picks.is_empty()) {
            (Some(o), false) => picks.iter().take(pick_top_k).any(|&h| h == o.winner),
            // Unusable leg: the chain fails rather than skipping the day.
            _ => false,
        };

        if hit {
            stake = outcome.as_ref().map(|o| o.win_dividend).unwrap_or(0.0);
        } else {
            alive = false;
        }

        legs.push(LegDetail {
            race_id: card.race_id.clone(),
            winner: outcome.map(|o| o.winner),
            picks,
            hit,
            stake_after: if hit { stake } else { 0.0 },
        });

        if !alive {
            break;
        }
    }

    let net = if alive { stake - CHAIN_STAKE } else { -CHAIN_STAKE };
    ChainDetail {
        date,
        legs,
        won: alive,
        net,
    }
}
