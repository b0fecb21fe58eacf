//! Aggregate statistics: drives settlement and the composite ranker across a
//! race set, accumulating hit rates, revenue, cost and ROI per bet type.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::results::parse_results;
use crate::settlement::{evaluate, parse_combination, BetOutcome};
use crate::sources::PickSource;
use crate::types::{find_pool, PoolKind, RaceCard};

/// Round to one decimal place, the precision every percentage is reported at.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Reported metrics for one bet type over a race set.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BetTypeRow {
    pub hits: u32,
    pub rate_pct: f64,
    pub revenue: f64,
    pub cost: f64,
    pub net: f64,
    pub roi_pct: f64,
}

impl BetTypeRow {
    fn from_totals(hits: u32, races: u32, revenue: f64, cost: f64) -> Self {
        let rate_pct = if races > 0 {
            round1(hits as f64 / races as f64 * 100.0)
        } else {
            0.0
        };
        let net = revenue - cost;
        let roi_pct = if cost > 0.0 {
            round1(net / cost * 100.0)
        } else {
            0.0
        };
        Self {
            hits,
            rate_pct,
            revenue,
            cost,
            net,
            roi_pct,
        }
    }
}

/// Box-of-6 hit counts. No money is tracked at this depth.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Box6Row {
    pub win_hits: u32,
    pub win_rate_pct: f64,
    pub quinella_hits: u32,
    pub quinella_rate_pct: f64,
    pub tierce_hits: u32,
    pub tierce_rate_pct: f64,
    pub first4_hits: u32,
    pub first4_rate_pct: f64,
}

/// Full statistics report for one pick source over a race set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsReport {
    /// Races with usable picks and payout data; excluded races are not
    /// counted as misses.
    pub races: u32,
    pub win: BetTypeRow,
    pub quinella: BetTypeRow,
    pub tierce: BetTypeRow,
    pub first4: BetTypeRow,
    pub box6: Box6Row,
}

#[derive(Debug, Default)]
struct Accumulator {
    races: u32,
    win: Totals,
    quinella: Totals,
    tierce: Totals,
    first4: Totals,
    win6: u32,
    quinella6: u32,
    tierce6: u32,
    first4_6: u32,
}

#[derive(Debug, Default)]
struct Totals {
    hits: u32,
    revenue: f64,
    cost: f64,
}

impl Totals {
    fn add(&mut self, outcome: &BetOutcome) {
        if outcome.hit {
            self.hits += 1;
        }
        self.revenue += outcome.revenue;
        self.cost += outcome.cost;
    }
}

impl Accumulator {
    fn add_race(&mut self, card: &RaceCard, picks: &[u32]) {
        let settlement = evaluate(&card.pools, picks);
        self.races += 1;
        self.win.add(&settlement.win);
        self.quinella.add(&settlement.quinella);
        self.tierce.add(&settlement.tierce);
        self.first4.add(&settlement.first4);
        self.win6 += settlement.win_box6 as u32;
        self.quinella6 += settlement.quinella_box6 as u32;
        self.tierce6 += settlement.tierce_box6 as u32;
        self.first4_6 += settlement.first4_box6 as u32;
    }

    fn report(self) -> StatsReport {
        let races = self.races;
        let rate = |hits: u32| {
            if races > 0 {
                round1(hits as f64 / races as f64 * 100.0)
            } else {
                0.0
            }
        };
        StatsReport {
            races,
            win: BetTypeRow::from_totals(self.win.hits, races, self.win.revenue, self.win.cost),
            quinella: BetTypeRow::from_totals(
                self.quinella.hits,
                races,
                self.quinella.revenue,
                self.quinella.cost,
            ),
            tierce: BetTypeRow::from_totals(
                self.tierce.hits,
                races,
                self.tierce.revenue,
                self.tierce.cost,
            ),
            first4: BetTypeRow::from_totals(
                self.first4.hits,
                races,
                self.first4.revenue,
                self.first4.cost,
            ),
            box6: Box6Row {
                win_hits: self.win6,
                win_rate_pct: rate(self.win6),
                quinella_hits: self.quinella6,
                quinella_rate_pct: rate(self.quinella6),
                tierce_hits: self.tierce6,
                tierce_rate_pct: rate(self.tierce6),
                first4_hits: self.first4_6,
                first4_rate_pct: rate(self.first4_6),
            },
        }
    }
}

/// A race contributes only when the source yields picks and the payout data
/// parses to a winner.
fn usable_picks(card: &RaceCard, source: &PickSource) -> Option<Vec<u32>> {
    let picks = source.resolve(card);
    if picks.is_empty() {
        return None;
    }
    parse_results(&card.pools)?;
    Some(picks)
}

/// Compute per-bet-type statistics for one pick source over a race set.
pub fn compute_stats(cards: &[RaceCard], source: &PickSource) -> StatsReport {
    let mut acc = Accumulator::default();
    for card in cards {
        if let Some(picks) = usable_picks(card, source) {
            acc.add_race(card, &picks);
        }
    }
    acc.report()
}

/// One row of the daily breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct DailyStatsRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub report: StatsReport,
}

/// Group the same computation by calendar date, one row per race day.
pub fn daily_stats(cards: &[RaceCard], source: &PickSource) -> Vec<DailyStatsRow> {
    let mut by_date: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for card in cards {
        if let Some(picks) = usable_picks(card, source) {
            by_date
                .entry(card.race_date)
                .or_default()
                .add_race(card, &picks);
        }
    }
    by_date
        .into_iter()
        .map(|(date, acc)| DailyStatsRow {
            date,
            report: acc.report(),
        })
        .collect()
}

/// Statistics for an arbitrary blend of named sources, merged per race by the
/// composite ranker before settlement.
pub fn custom_composite_stats(cards: &[RaceCard], sources: Vec<PickSource>) -> StatsReport {
    compute_stats(cards, &PickSource::Composite(sources))
}

/// Flat stake placed on the pundit's single top pick per race.
pub const SYSTEM_STAKE: f64 = 10.0;

/// Accuracy summary for the pundit pick source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub races: u32,
    /// Races where the top pick won.
    pub top1_wins: u32,
    pub top1_win_rate_pct: f64,
    /// Races where the top pick placed.
    pub top1_places: u32,
    pub top1_place_rate_pct: f64,
    /// Races where the top two picks formed the winning quinella.
    pub top2_quinellas: u32,
    pub top2_quinella_rate_pct: f64,
    pub total_staked: f64,
    pub net_profit: f64,
    pub roi_pct: f64,
}

/// System-level accuracy of the pundit source: top-1 win/place counts, top-2
/// winning-quinella count, and yield at a flat 10-unit stake on the top pick.
pub fn system_stats(cards: &[RaceCard]) -> SystemStats {
    let mut stats = SystemStats::default();

    for card in cards {
        let Some(outcome) = parse_results(&card.pools) else {
            continue;
        };
        let Some(&top1) = card.pundit.first() else {
            continue;
        };

        stats.races += 1;
        stats.total_staked += SYSTEM_STAKE;

        if outcome.winner == top1 {
            stats.top1_wins += 1;
            stats.net_profit += outcome.win_dividend - SYSTEM_STAKE;
        } else {
            stats.net_profit -= SYSTEM_STAKE;
        }

        if outcome.placings.contains(&top1) {
            stats.top1_places += 1;
        }

        let top2 = &card.pundit[..card.pundit.len().min(2)];
        if top2.len() == 2 && quinella_matches(card, top2) {
            stats.top2_quinellas += 1;
        }
    }

    if stats.races > 0 {
        let races = stats.races as f64;
        stats.top1_win_rate_pct = round1(stats.top1_wins as f64 / races * 100.0);
        stats.top1_place_rate_pct = round1(stats.top1_places as f64 / races * 100.0);
        stats.top2_quinella_rate_pct = round1(stats.top2_quinellas as f64 / races * 100.0);
    }
    if stats.total_staked > 0.0 {
        stats.roi_pct = round1(stats.net_profit / stats.total_staked * 100.0);
    }

    stats
}

/// Do the given two picks form a winning quinella combination?
fn quinella_matches(card: &RaceCard, top2: &[u32]) -> bool {
    let Some(pool) = find_pool(&card.pools, PoolKind::Quinella) else {
        return false;
    };
    pool.entries.iter().any(|e| {
        parse_combination(&e.combination)
            .map(|combo| combo.len() >= 2 && combo[..2].iter().all(|h| top2.contains(h)))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PayoutEntry, PayoutPool};

    fn pool(name: &str, entries: &[(&str, &str)]) -> PayoutPool {
        PayoutPool {
            name: name.to_string(),
            entries: entries
                .iter()
                .map(|(c, d)| PayoutEntry {
                    combination: c.to_string(),
                    dividend: d.to_string(),
                })
                .collect(),
        }
    }

    fn card(date: &str, race_no: u32, winner: u32, dividend: &str, pundit: Vec<u32>) -> RaceCard {
        RaceCard {
            race_id: format!("{}-{}", date, race_no),
            race_date: crate::types::parse_race_date(date).unwrap(),
            venue: "ST".to_string(),
            race_no,
            pools: vec![pool("獨贏", &[(&winner.to_string(), dividend)])],
            pundit,
            ..Default::default()
        }
    }

    #[test]
    fn test_compute_stats_hit_and_miss() {
        let cards = vec![
            card("2024/01/01", 1, 8, "35.00", vec![8, 3, 1, 5, 7, 9]),
            card("2024/01/01", 2, 4, "60.00", vec![1, 2, 3, 4, 5, 6]),
        ];
        let report = compute_stats(&cards, &PickSource::Pundit);
        assert_eq!(report.races, 2);
        assert_eq!(report.win.hits, 1);
        assert_eq!(report.win.rate_pct, 50.0);
        assert_eq!(report.win.revenue, 35.0);
        assert_eq!(report.win.cost, 40.0);
        assert_eq!(report.win.net, -5.0);
        assert_eq!(report.win.roi_pct, -12.5);
        // Horse 4 is within the first six picks of race 2.
        assert_eq!(report.box6.win_hits, 2);
        assert_eq!(report.box6.win_rate_pct, 100.0);
    }

    #[test]
    fn test_races_without_picks_or_payouts_are_excluded() {
        let mut no_picks = card("2024/01/01", 1, 8, "35.00", vec![]);
        no_picks.pundit.clear();
        let mut no_payout = card("2024/01/01", 2, 8, "35.00", vec![8, 3]);
        no_payout.pools.clear();
        let ok = card("2024/01/01", 3, 8, "35.00", vec![8, 3]);

        let report = compute_stats(&[no_picks, no_payout, ok], &PickSource::Pundit);
        assert_eq!(report.races, 1);
        assert_eq!(report.win.hits, 1);
        assert_eq!(report.win.rate_pct, 100.0);
    }

    #[test]
    fn test_roi_zero_when_no_races() {
        let report = compute_stats(&[], &PickSource::Pundit);
        assert_eq!(report.races, 0);
        assert_eq!(report.win.roi_pct, 0.0);
        assert_eq!(report.win.rate_pct, 0.0);
    }

    #[test]
    fn test_daily_stats_groups_by_date() {
        let cards = vec![
            card("2024/01/01", 1, 8, "35.00", vec![8, 3]),
            card("2024/01/01", 2, 4, "60.00", vec![4, 2]),
            card("2024/01/08", 1, 6, "20.00", vec![1, 2]),
        ];
        let rows = daily_stats(&cards, &PickSource::Pundit);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].report.races, 2);
        assert_eq!(rows[0].report.win.hits, 2);
        assert_eq!(rows[1].report.races, 1);
        assert_eq!(rows[1].report.win.hits, 0);
        assert!(rows[0].date < rows[1].date);
    }

    #[test]
    fn test_custom_composite_excludes_empty_merges() {
        // No pundit list and no trends: merged picks are empty, race skipped.
        let mut empty = card("2024/01/01", 1, 8, "35.00", vec![]);
        empty.pundit.clear();
        let report = custom_composite_stats(&[empty], vec![PickSource::Pundit]);
        assert_eq!(report.races, 0);
    }

    #[test]
    fn test_system_stats() {
        let mut winner_card = card("2024/01/01", 1, 8, "35.00", vec![8, 3]);
        winner_card.pools.push(pool(
            "位置",
            &[("8", "14.00"), ("3", "20.00"), ("11", "30.00")],
        ));
        winner_card.pools.push(pool("連贏", &[("3,8", "62.00")]));

        let mut place_card = card("2024/01/01", 2, 4, "60.00", vec![2, 9]);
        place_card
            .pools
            .push(pool("位置", &[("4", "18.00"), ("2", "25.00")]));

        let stats = system_stats(&[winner_card, place_card]);
        assert_eq!(stats.races, 2);
        assert_eq!(stats.top1_wins, 1);
        assert_eq!(stats.top1_win_rate_pct, 50.0);
        assert_eq!(stats.top1_places, 2);
        assert_eq!(stats.top2_quinellas, 1);
        // Race 1: 35 - 10 = +25, race 2: -10. Net +15 over 20 staked.
        assert_eq!(stats.total_staked, 20.0);
        assert_eq!(stats.net_profit, 15.0);
        assert_eq!(stats.roi_pct, 75.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(12.25), 12.3);
    }
}
