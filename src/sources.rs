//! Pick sources and the composite ranker.
//!
//! A pick source is any ranked list of horse numbers used as a prediction.
//! Sources are a tagged enum resolved once into concrete lists against a
//! race card; nothing downstream re-parses source names.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::types::RaceCard;

/// Points awarded by rank position within each contributing source.
/// Ranks 1-2 tie at 6, rank 3 scores 5, rank 4 scores 4, ranks 5-6 tie at 2.
pub const RANK_POINTS: [u32; 6] = [6, 6, 5, 4, 2, 2];

/// Trend snapshot offsets, minutes before race start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendOffset {
    M30,
    M15,
    M10,
    M5,
    AtPost,
}

impl TrendOffset {
    /// Key used for trend snapshots in storage and on the wire.
    pub fn as_key(&self) -> &'static str {
        match self {
            TrendOffset::M30 => "30",
            TrendOffset::M15 => "15",
            TrendOffset::M10 => "10",
            TrendOffset::M5 => "5",
            TrendOffset::AtPost => "0",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "30" => Some(TrendOffset::M30),
            "15" => Some(TrendOffset::M15),
            "10" => Some(TrendOffset::M10),
            "5" => Some(TrendOffset::M5),
            "0" => Some(TrendOffset::AtPost),
            _ => None,
        }
    }

    /// Offsets contributing to the default composite blend. The at-post
    /// snapshot is deliberately excluded: it is evaluated as a source of
    /// its own, not folded into the blend.
    pub fn blend_offsets() -> [TrendOffset; 4] {
        [
            TrendOffset::M30,
            TrendOffset::M15,
            TrendOffset::M10,
            TrendOffset::M5,
        ]
    }
}

/// A named provider of a ranked pick list for a race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PickSource {
    /// Pundit recommendation list.
    Pundit,
    /// Trend snapshot at a fixed offset before start.
    Trend(TrendOffset),
    /// Manually defined strategy pick list.
    Strategy(String),
    /// Rank-point merge of other sources.
    Composite(Vec<PickSource>),
}

impl PickSource {
    /// The default blend: pundit plus the four pre-race trend offsets.
    pub fn default_composite() -> Self {
        let mut sources = vec![PickSource::Pundit];
        sources.extend(TrendOffset::blend_offsets().into_iter().map(PickSource::Trend));
        PickSource::Composite(sources)
    }

    /// Resolve this source into a concrete ranked list for one race.
    /// Missing data yields an empty list; callers exclude such races.
    pub fn resolve(&self, card: &RaceCard) -> Vec<u32> {
        match self {
            PickSource::Pundit => card.pundit.clone(),
            PickSource::Trend(offset) => card
                .trends
                .get(offset.as_key())
                .cloned()
                .unwrap_or_default(),
            PickSource::Strategy(id) => card.strategies.get(id).cloned().unwrap_or_default(),
            PickSource::Composite(sources) => {
                let lists: Vec<Vec<u32>> = sources.iter().map(|s| s.resolve(card)).collect();
                rank_composite(&lists)
            }
        }
    }
}

impl fmt::Display for PickSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickSource::Pundit => write!(f, "pundit"),
            PickSource::Trend(offset) => write!(f, "trend-{}", offset.as_key()),
            PickSource::Strategy(id) => write!(f, "strategy-{}", id),
            PickSource::Composite(sources) => {
                let names: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
                write!(f, "composite({})", names.join("+"))
            }
        }
    }
}

impl FromStr for PickSource {
    type Err = anyhow::Error;

    /// Parse a source name at the boundary: "pundit", "trend-30",
    /// "strategy-<id>" or "composite" (the default blend).
    fn from_str(s: &str) -> Result<Self> {
        if s == "pundit" {
            return Ok(PickSource::Pundit);
        }
        if s == "composite" {
            return Ok(PickSource::default_composite());
        }
        if let Some(key) = s.strip_prefix("trend-") {
            return match TrendOffset::from_key(key) {
                Some(offset) => Ok(PickSource::Trend(offset)),
                None => bail!("Unknown trend offset: {}", key),
            };
        }
        if let Some(id) = s.strip_prefix("strategy-") {
            if id.is_empty() {
                bail!("Empty strategy id");
            }
            return Ok(PickSource::Strategy(id.to_string()));
        }
        bail!("Unknown pick source: {}", s)
    }
}

/// Merge ranked lists into one ranking by summed rank points.
///
/// Each list contributes points for its first six picks per `RANK_POINTS`;
/// a horse ranked highly in several lists accumulates across all of them.
/// Horses absent from every list's top six are absent from the output.
/// Ties break toward the lower horse number.
pub fn rank_composite(lists: &[Vec<u32>]) -> Vec<u32> {
    let mut points: HashMap<u32, u32> = HashMap::new();
    for list in lists {
        for (rank, &horse) in list.iter().take(RANK_POINTS.len()).enumerate() {
            *points.entry(horse).or_insert(0) += RANK_POINTS[rank];
        }
    }

    let mut ranked: Vec<(u32, u32)> = points.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(horse, _)| horse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parsing_round_trip() {
        assert_eq!("pundit".parse::<PickSource>().unwrap(), PickSource::Pundit);
        assert_eq!(
            "trend-30".parse::<PickSource>().unwrap(),
            PickSource::Trend(TrendOffset::M30)
        );
        assert_eq!(
            "trend-0".parse::<PickSource>().unwrap(),
            PickSource::Trend(TrendOffset::AtPost)
        );
        assert_eq!(
            "strategy-early-speed".parse::<PickSource>().unwrap(),
            PickSource::Strategy("early-speed".to_string())
        );
        assert!("trend-45".parse::<PickSource>().is_err());
        assert!("oracle".parse::<PickSource>().is_err());

        let s = PickSource::Strategy("early-speed".to_string());
        assert_eq!(s.to_string().parse::<PickSource>().unwrap(), s);
    }

    #[test]
    fn test_default_composite_excludes_at_post() {
        let PickSource::Composite(sources) = PickSource::default_composite() else {
            panic!("expected composite");
        };
        assert_eq!(sources.len(), 5);
        assert!(sources.contains(&PickSource::Pundit));
        assert!(sources.contains(&PickSource::Trend(TrendOffset::M5)));
        assert!(!sources.contains(&PickSource::Trend(TrendOffset::AtPost)));
    }

    #[test]
    fn test_rank_composite_accumulates_across_sources() {
        // Scenario D: horses 2 and 5 each rank top-2 in both sources,
        // collecting 6+6 points and outranking a lone rank-3 appearance.
        let lists = vec![vec![5, 2, 7, 1, 3, 4], vec![2, 5, 9, 6, 8, 10]];
        let ranked = rank_composite(&lists);
        assert_eq!(&ranked[..2], &[2, 5]);
        let pos7 = ranked.iter().position(|&h| h == 7).unwrap();
        assert!(pos7 >= 2);
    }

    #[test]
    fn test_rank_composite_tie_breaks_on_horse_number() {
        // Both horses score 6 points from a single rank-1/rank-2 slot.
        let ranked = rank_composite(&[vec![9, 4]]);
        assert_eq!(ranked, vec![4, 9]);
    }

    #[test]
    fn test_rank_composite_ignores_beyond_sixth() {
        let ranked = rank_composite(&[vec![1, 2, 3, 4, 5, 6, 7]]);
        assert!(!ranked.contains(&7));
    }

    #[test]
    fn test_rank_composite_monotonic_on_promotion() {
        // Moving horse 7 to a better rank must not lower its position.
        let before = rank_composite(&[vec![5, 2, 7, 1], vec![2, 5, 9, 6]]);
        let after = rank_composite(&[vec![7, 5, 2, 1], vec![2, 5, 9, 6]]);
        let pos = |r: &[u32]| r.iter().position(|&h| h == 7).unwrap();
        assert!(pos(&after) <= pos(&before));
    }

    #[test]
    fn test_resolve_composite() {
        let mut card = RaceCard {
            pundit: vec![5, 2, 7],
            ..Default::default()
        };
        card.trends.insert("30".to_string(), vec![2, 5, 9]);

        let source = PickSource::Composite(vec![
            PickSource::Pundit,
            PickSource::Trend(TrendOffset::M30),
        ]);
        let picks = source.resolve(&card);
        assert_eq!(&picks[..2], &[2, 5]);
    }

    #[test]
    fn test_resolve_missing_source_is_empty() {
        let card = RaceCard::default();
        assert!(PickSource::Pundit.resolve(&card).is_empty());
        assert!(PickSource::Trend(TrendOffset::M10).resolve(&card).is_empty());
        assert!(PickSource::Strategy("x".to_string())
            .resolve(&card)
            .is_empty());
    }
}
