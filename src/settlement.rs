//! Bet settlement: hit determination and revenue for a race's payout pools
//! against an ordered list of horse-number picks.
//!
//! Hits are purely combinatorial. Whether the pool actually paid (the
//! did-not-pay sentinel) only affects revenue, never the hit flag.

use crate::types::{find_pool, PayoutPool, PoolKind};

/// Unit-stake costs per bet type. These reflect the number of unit stakes
/// needed to cover the combinations at the corresponding pick depth.
pub const WIN_COST: f64 = 20.0;
pub const QUINELLA_COST: f64 = 30.0;
pub const TIERCE_COST: f64 = 240.0;
pub const FIRST4_COST: f64 = 3600.0;

/// Dividend text recorded when a pool had no valid winning combination.
pub const NO_PAYOUT: &str = "未能勝出";

/// Outcome for one bet type in one race.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BetOutcome {
    pub hit: bool,
    pub revenue: f64,
    pub cost: f64,
}

impl BetOutcome {
    fn with_cost(cost: f64) -> Self {
        Self {
            hit: false,
            revenue: 0.0,
            cost,
        }
    }

    pub fn net(&self) -> f64 {
        self.revenue - self.cost
    }
}

/// Full settlement of one race against one pick list.
///
/// The `*_box6` flags are the box-of-6 variants: same combinatorial test
/// against the first 6 picks, hit-only (no money tracked).
#[derive(Debug, Clone, Default)]
pub struct RaceSettlement {
    pub win: BetOutcome,
    pub quinella: BetOutcome,
    pub tierce: BetOutcome,
    pub first4: BetOutcome,
    pub win_box6: bool,
    pub quinella_box6: bool,
    pub tierce_box6: bool,
    pub first4_box6: bool,
}

/// Parse a winning-combination string ("3,8", "2-4-6-9", "1+2") into horse
/// numbers. Returns None on any non-numeric token; the caller drops the entry.
pub fn parse_combination(s: &str) -> Option<Vec<u32>> {
    let tokens: Vec<&str> = s
        .split(['-', '+', ','])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }
    tokens.iter().map(|t| t.parse::<u32>().ok()).collect()
}

/// Parse a dividend string, stripping thousands separators. The did-not-pay
/// sentinel and anything else unparseable contribute zero revenue.
pub fn parse_dividend(s: &str) -> f64 {
    let cleaned = s.trim().replace([',', '$'], "");
    cleaned.parse::<f64>().unwrap_or(0.0)
}

fn top(picks: &[u32], k: usize) -> &[u32] {
    &picks[..picks.len().min(k)]
}

/// Does every one of the first `take` combination members appear in the
/// candidate set?
fn combo_covered(combo: &[u32], take: usize, candidates: &[u32]) -> bool {
    if combo.len() < take {
        return false;
    }
    combo[..take].iter().all(|h| candidates.contains(h))
}

/// Run one pool's entries against a candidate set, accumulating hit and
/// revenue into `out`. `take` is how many combination members must match.
fn settle_pool(pool: Option<&PayoutPool>, take: usize, candidates: &[u32], out: &mut BetOutcome) {
    let Some(pool) = pool else { return };
    for entry in &pool.entries {
        let Some(combo) = parse_combination(&entry.combination) else {
            continue;
        };
        if combo_covered(&combo, take, candidates) {
            out.hit = true;
            out.revenue += parse_dividend(&entry.dividend);
        }
    }
}

/// Hit-only variant for the box-of-6 depth.
fn pool_hits(pool: Option<&PayoutPool>, take: usize, candidates: &[u32]) -> bool {
    let Some(pool) = pool else { return false };
    pool.entries.iter().any(|entry| {
        parse_combination(&entry.combination)
            .map(|combo| combo_covered(&combo, take, candidates))
            .unwrap_or(false)
    })
}

/// Settle all four bet-type families for one race.
///
/// Candidate depths: Win uses the first 2 picks, Quinella 3, Tierce 4 and
/// First-4 6; every box-6 variant uses the first 6. The First-4 test prefers
/// a First 4 pool over a Quartet pool when both are present, since First 4
/// pays on any order and is the correct box-bet analogue.
pub fn evaluate(pools: &[PayoutPool], picks: &[u32]) -> RaceSettlement {
    let mut s = RaceSettlement {
        win: BetOutcome::with_cost(WIN_COST),
        quinella: BetOutcome::with_cost(QUINELLA_COST),
        tierce: BetOutcome::with_cost(TIERCE_COST),
        first4: BetOutcome::with_cost(FIRST4_COST),
        ..Default::default()
    };

    let win_pool = find_pool(pools, PoolKind::Win);
    let quinella_pool = find_pool(pools, PoolKind::Quinella);
    let tierce_pool = find_pool(pools, PoolKind::Tierce);
    let first4_pool =
        find_pool(pools, PoolKind::FirstFour).or_else(|| find_pool(pools, PoolKind::Quartet));

    settle_pool(win_pool, 1, top(picks, 2), &mut s.win);
    settle_pool(quinella_pool, 2, top(picks, 3), &mut s.quinella);
    settle_pool(tierce_pool, 3, top(picks, 4), &mut s.tierce);
    settle_pool(first4_pool, 4, top(picks, 6), &mut s.first4);

    let box6 = top(picks, 6);
    s.win_box6 = pool_hits(win_pool, 1, box6);
    s.quinella_box6 = pool_hits(quinella_pool, 2, box6);
    s.tierce_box6 = pool_hits(tierce_pool, 3, box6);
    s.first4_box6 = pool_hits(first4_pool, 4, box6);

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PayoutEntry;

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

    #[test]
    fn test_parse_combination_delimiters() {
        assert_eq!(parse_combination("3,8"), Some(vec![3, 8]));
        assert_eq!(parse_combination("2-4-6-9"), Some(vec![2, 4, 6, 9]));
        assert_eq!(parse_combination("1+12"), Some(vec![1, 12]));
        assert_eq!(parse_combination(" 7 "), Some(vec![7]));
        assert_eq!(parse_combination("3,x"), None);
        assert_eq!(parse_combination(""), None);
    }

    #[test]
    fn test_parse_dividend() {
        assert_eq!(parse_dividend("35.00"), 35.0);
        assert_eq!(parse_dividend("1,234.50"), 1234.5);
        assert_eq!(parse_dividend(NO_PAYOUT), 0.0);
    }

    #[test]
    fn test_win_hit_on_top2() {
        // Scenario A: win pool pays 35.00 on horse 8, top-2 picks [8, 3].
        let pools = vec![pool("獨贏", &[("8", "35.00")])];
        let s = evaluate(&pools, &[8, 3, 1, 5, 7, 9]);
        assert!(s.win.hit);
        assert_eq!(s.win.revenue, 35.0);
        assert_eq!(s.win.cost, 20.0);
        assert_eq!(s.win.net(), 15.0);
        assert!(s.win_box6);
    }

    #[test]
    fn test_win_miss_outside_top2() {
        let pools = vec![pool("獨贏", &[("5", "35.00")])];
        let s = evaluate(&pools, &[8, 3, 5, 1, 7, 9]);
        assert!(!s.win.hit);
        assert_eq!(s.win.revenue, 0.0);
        // Horse 5 still sits inside the first six picks.
        assert!(s.win_box6);
    }

    #[test]
    fn test_win_dead_heat_sums_dividends() {
        let pools = vec![pool("獨贏", &[("8", "20.00"), ("3", "15.50")])];
        let s = evaluate(&pools, &[8, 3]);
        assert!(s.win.hit);
        assert_eq!(s.win.revenue, 35.5);
    }

    #[test]
    fn test_quinella_both_horses_required() {
        // Scenario B: combination "3,8" against top-3 picks.
        let pools = vec![pool("連贏", &[("3,8", "62.00")])];
        let hit = evaluate(&pools, &[8, 5, 3]);
        assert!(hit.quinella.hit);
        assert_eq!(hit.quinella.revenue, 62.0);

        let miss = evaluate(&pools, &[8, 5, 2]);
        assert!(!miss.quinella.hit);
    }

    #[test]
    fn test_quinella_order_independent() {
        let a = evaluate(&[pool("連贏", &[("3,8", "62.00")])], &[8, 5, 3]);
        let b = evaluate(&[pool("連贏", &[("8,3", "62.00")])], &[8, 5, 3]);
        assert_eq!(a.quinella.hit, b.quinella.hit);
        assert_eq!(a.quinella.revenue, b.quinella.revenue);
    }

    #[test]
    fn test_tierce_box_against_top4() {
        let pools = vec![pool("三重彩", &[("4-1-9", "880.00")])];
        let s = evaluate(&pools, &[1, 9, 2, 4, 6, 7]);
        assert!(s.tierce.hit);
        assert_eq!(s.tierce.revenue, 880.0);
        assert_eq!(s.tierce.cost, 240.0);

        // Horse 4 pushed out of the top 4.
        let s = evaluate(&pools, &[1, 9, 2, 6, 4, 7]);
        assert!(!s.tierce.hit);
        assert!(s.tierce_box6);
    }

    #[test]
    fn test_first4_hit_and_no_payout_sentinel() {
        // Scenario C: combination inside the top 6, sentinel dividend.
        let pools = vec![pool("四連環", &[("2-4-6-9", NO_PAYOUT)])];
        let s = evaluate(&pools, &[2, 4, 6, 9, 11, 1]);
        assert!(s.first4.hit);
        assert_eq!(s.first4.revenue, 0.0);
        assert_eq!(s.first4.cost, 3600.0);
        assert!(s.first4_box6);
    }

    #[test]
    fn test_first4_preferred_over_quartet() {
        // Quartet would also match here, but First 4 is the box analogue and
        // its dividend is the one that counts.
        let pools = vec![
            pool("四重彩", &[("2-4-6-9", "99999.00")]),
            pool("四連環", &[("2-4-6-9", "1,250.00")]),
        ];
        let s = evaluate(&pools, &[2, 4, 6, 9, 11, 1]);
        assert!(s.first4.hit);
        assert_eq!(s.first4.revenue, 1250.0);
    }

    #[test]
    fn test_quartet_used_when_no_first4_pool() {
        let pools = vec![pool("四重彩", &[("2-4-6-9", "500.00")])];
        let s = evaluate(&pools, &[2, 4, 6, 9, 11, 1]);
        assert!(s.first4.hit);
        assert_eq!(s.first4.revenue, 500.0);
    }

    #[test]
    fn test_malformed_entry_skipped_without_aborting() {
        let pools = vec![pool("連贏", &[("3~8", "10.00"), ("3,8", "62.00")])];
        let s = evaluate(&pools, &[3, 8, 1]);
        assert!(s.quinella.hit);
        assert_eq!(s.quinella.revenue, 62.0);
    }

    #[test]
    fn test_topk_hit_implies_box6_hit() {
        let pools = vec![
            pool("獨贏", &[("8", "35.00")]),
            pool("連贏", &[("3,8", "62.00")]),
            pool("三重彩", &[("8-3-1", "410.00")]),
            pool("四連環", &[("8-3-1-5", "980.00")]),
        ];
        let s = evaluate(&pools, &[8, 3, 1, 5, 7, 9]);
        assert!(s.win.hit && s.win_box6);
        assert!(s.quinella.hit && s.quinella_box6);
        assert!(s.tierce.hit && s.tierce_box6);
        assert!(s.first4.hit && s.first4_box6);
    }

    #[test]
    fn test_short_pick_list() {
        let pools = vec![pool("連贏", &[("3,8", "62.00")])];
        let s = evaluate(&pools, &[3]);
        assert!(!s.quinella.hit);
        let s = evaluate(&pools, &[]);
        assert!(!s.win.hit && !s.quinella.hit && !s.tierce.hit && !s.first4.hit);
    }
}
