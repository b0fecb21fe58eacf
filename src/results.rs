//! Result extraction from recorded payout pools: winner, placings and the
//! winning dividend.

use crate::settlement::{parse_combination, parse_dividend};
use crate::types::{find_pool, PayoutPool, PoolKind};

/// Parsed outcome of a race.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceOutcome {
    pub winner: u32,
    /// Horses listed in the Place pool (top finishers), in listed order.
    pub placings: Vec<u32>,
    pub win_dividend: f64,
}

/// Extract the winner and placings from a race's payout pools.
///
/// Returns None when there is no Win pool or it has no parseable entry.
/// Callers must skip such races entirely rather than score them as losses.
pub fn parse_results(pools: &[PayoutPool]) -> Option<RaceOutcome> {
    let win_pool = find_pool(pools, PoolKind::Win)?;
    let entry = win_pool.entries.first()?;
    let winner = *parse_combination(&entry.combination)?.first()?;
    let win_dividend = parse_dividend(&entry.dividend);

    let placings = find_pool(pools, PoolKind::Place)
        .map(|p| {
            p.entries
                .iter()
                .filter_map(|e| parse_combination(&e.combination))
                .filter_map(|c| c.first().copied())
                .collect()
        })
        .unwrap_or_default();

    Some(RaceOutcome {
        winner,
        placings,
        win_dividend,
    })
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
    fn test_parse_results() {
        let pools = vec![
            pool("獨贏", &[("8", "35.00")]),
            pool("位置", &[("8", "14.50"), ("3", "22.00"), ("11", "41.00")]),
        ];
        let outcome = parse_results(&pools).unwrap();
        assert_eq!(outcome.winner, 8);
        assert_eq!(outcome.win_dividend, 35.0);
        assert_eq!(outcome.placings, vec![8, 3, 11]);
    }

    #[test]
    fn test_missing_win_pool_yields_none() {
        let pools = vec![pool("位置", &[("8", "14.50")])];
        assert!(parse_results(&pools).is_none());
    }

    #[test]
    fn test_empty_win_pool_yields_none() {
        let pools = vec![pool("獨贏", &[])];
        assert!(parse_results(&pools).is_none());
    }

    #[test]
    fn test_no_place_pool_gives_empty_placings() {
        let pools = vec![pool("獨贏", &[("4", "61.50")])];
        let outcome = parse_results(&pools).unwrap();
        assert_eq!(outcome.winner, 4);
        assert!(outcome.placings.is_empty());
    }
}
