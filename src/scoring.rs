//! Multi-factor scoring engine for race previews.
//!
//! Every enabled factor converts a raw per-horse attribute into points via
//! one of three rule families (rank tables, rate multipliers, value buckets),
//! weights it, and sums into a total. Horses with missing data fall back to
//! the rule's default points and are never dropped from the ranking.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Factor identifiers, stable across config files and API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKey {
    /// Best historical time at the same venue and distance.
    BestTime,
    /// Average early running position over recent starts.
    EarlyPosition,
    /// Most recent valid sectional time.
    SectionalTime,
    JockeyWinRate,
    JockeyPlaceRate,
    TrainerWinRate,
    TrainerPlaceRate,
    /// Jockey+trainer combined rates. Present in configuration but dormant:
    /// they always contribute zero.
    PartnershipWinRate,
    PartnershipPlaceRate,
    RatingChange,
    Age,
    RestDays,
    CarriedWeight,
    Condition,
    Trackwork,
}

/// Rank-table rule: points by field rank 1..=8, `others` for rank 9+ or
/// missing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankRule {
    pub points: [f64; 8],
    pub others: f64,
}

/// Multiplier rule for percentage rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRule {
    pub multiplier: f64,
}

/// Rating movement since the last start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingChangeRule {
    pub raised: f64,
    pub unchanged: f64,
    pub lowered: f64,
    pub unknown: f64,
}

/// Age buckets; four-year-olds are the peak bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeRule {
    pub age3: f64,
    pub age4: f64,
    pub age5: f64,
    pub age6: f64,
    pub age7_plus: f64,
    pub unknown: f64,
}

/// Days since last run: under 14 is fresh, 14-60 ideal, over 60 stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestDaysRule {
    pub fresh: f64,
    pub ideal: f64,
    pub stale: f64,
    pub unknown: f64,
}

/// Carried weight in pounds: under 118 light, 118-128 medium, over 128 heavy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRule {
    pub light: f64,
    pub medium: f64,
    pub heavy: f64,
    pub unknown: f64,
}

/// Points per observed grade (condition, trackwork).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRule {
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
    pub unknown: f64,
}

/// Calculation rule attached to a factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorRule {
    Rank(RankRule),
    Rate(RateRule),
    RatingChange(RatingChangeRule),
    Age(AgeRule),
    RestDays(RestDaysRule),
    Weight(WeightRule),
    Grade(GradeRule),
    /// Configured but never contributes points.
    Dormant,
}

/// One factor's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorConfig {
    pub key: FactorKey,
    pub label: String,
    /// Weight as a percentage, 0-100. Weights across factors need not sum
    /// to 100.
    pub weight: f64,
    pub enabled: bool,
    pub rule: FactorRule,
}

/// Immutable scoring configuration, passed into the engine at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub factors: Vec<FactorConfig>,
}

impl ScoringConfig {
    /// Load a scoring configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        serde_json::from_str(&content).context("Failed to parse scoring config")
    }
}

fn factor(key: FactorKey, label: &str, weight: f64, rule: FactorRule) -> FactorConfig {
    FactorConfig {
        key,
        label: label.to_string(),
        weight,
        enabled: true,
        rule,
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let rank8 = |points| FactorRule::Rank(RankRule { points, others: 0.0 });
        Self {
            factors: vec![
                factor(
                    FactorKey::BestTime,
                    "Best time (venue+distance)",
                    20.0,
                    rank8([10.0, 8.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]),
                ),
                factor(
                    FactorKey::EarlyPosition,
                    "Early running position",
                    10.0,
                    rank8([8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]),
                ),
                factor(
                    FactorKey::SectionalTime,
                    "Last sectional time",
                    15.0,
                    rank8([10.0, 8.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]),
                ),
                factor(
                    FactorKey::JockeyWinRate,
                    "Jockey win rate",
                    10.0,
                    FactorRule::Rate(RateRule { multiplier: 0.5 }),
                ),
                factor(
                    FactorKey::JockeyPlaceRate,
                    "Jockey place rate",
                    5.0,
                    FactorRule::Rate(RateRule { multiplier: 0.3 }),
                ),
                factor(
                    FactorKey::TrainerWinRate,
                    "Trainer win rate",
                    10.0,
                    FactorRule::Rate(RateRule { multiplier: 0.5 }),
                ),
                factor(
                    FactorKey::TrainerPlaceRate,
                    "Trainer place rate",
                    5.0,
                    FactorRule::Rate(RateRule { multiplier: 0.3 }),
                ),
                factor(
                    FactorKey::PartnershipWinRate,
                    "Jockey+trainer win rate",
                    5.0,
                    FactorRule::Dormant,
                ),
                factor(
                    FactorKey::PartnershipPlaceRate,
                    "Jockey+trainer place rate",
                    5.0,
                    FactorRule::Dormant,
                ),
                factor(
                    FactorKey::RatingChange,
                    "Rating change",
                    5.0,
                    FactorRule::RatingChange(RatingChangeRule {
                        raised: 2.0,
                        unchanged: 5.0,
                        lowered: 8.0,
                        unknown: 5.0,
                    }),
                ),
                factor(
                    FactorKey::Age,
                    "Age",
                    5.0,
                    FactorRule::Age(AgeRule {
                        age3: 6.0,
                        age4: 10.0,
                        age5: 7.0,
                        age6: 4.0,
                        age7_plus: 2.0,
                        unknown: 5.0,
                    }),
                ),
                factor(
                    FactorKey::RestDays,
                    "Days since last run",
                    5.0,
                    FactorRule::RestDays(RestDaysRule {
                        fresh: 4.0,
                        ideal: 10.0,
                        stale: 2.0,
                        unknown: 5.0,
                    }),
                ),
                factor(
                    FactorKey::CarriedWeight,
                    "Carried weight",
                    5.0,
                    FactorRule::Weight(WeightRule {
                        light: 8.0,
                        medium: 5.0,
                        heavy: 2.0,
                        unknown: 5.0,
                    }),
                ),
                factor(
                    FactorKey::Condition,
                    "Condition",
                    10.0,
                    FactorRule::Grade(GradeRule {
                        good: 10.0,
                        fair: 5.0,
                        poor: 0.0,
                        unknown: 5.0,
                    }),
                ),
                factor(
                    FactorKey::Trackwork,
                    "Trackwork",
                    5.0,
                    FactorRule::Grade(GradeRule {
                        good: 10.0,
                        fair: 5.0,
                        poor: 2.0,
                        unknown: 5.0,
                    }),
                ),
            ],
        }
    }
}

/// Observed grade for condition and trackwork factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Good,
    Fair,
    Poor,
}

impl Grade {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "good" => Some(Grade::Good),
            "fair" => Some(Grade::Fair),
            "poor" => Some(Grade::Poor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Good => "good",
            Grade::Fair => "fair",
            Grade::Poor => "poor",
        }
    }
}

/// Raw per-horse inputs, recomputed per scoring invocation from historical
/// performance records. Rates are percentages (e.g. 12.0 for 12%).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HorseFactors {
    pub horse_no: u32,
    pub best_time: Option<f64>,
    pub early_position: Option<f64>,
    pub sectional_time: Option<f64>,
    pub jockey_win_rate: Option<f64>,
    pub jockey_place_rate: Option<f64>,
    pub trainer_win_rate: Option<f64>,
    pub trainer_place_rate: Option<f64>,
    pub rating_change: Option<i32>,
    pub age: Option<u32>,
    pub last_run: Option<NaiveDate>,
    pub carried_weight: Option<u32>,
    pub condition: Option<Grade>,
    pub trackwork: Option<Grade>,
}

/// Manual per-horse adjustment recorded against a race.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ManualAdjustment {
    /// Added to the total after weighting.
    pub manual_points: f64,
    /// Replaces the condition factor's raw score before weighting.
    pub condition_override: Option<f64>,
}

/// One factor's contribution to a horse's score.
#[derive(Debug, Clone, Serialize)]
pub struct FactorScore {
    pub key: FactorKey,
    pub raw: f64,
    pub weighted: f64,
}

/// Scored horse, with the per-factor breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct HorseScore {
    pub horse_no: u32,
    pub total: f64,
    pub factors: Vec<FactorScore>,
}

/// Field ranks (1-based) for a metric where lower values are better.
/// Horses with no value get no rank and fall back to the rule's `others`.
fn ranks_ascending(values: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut indexed: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![None; values.len()];
    for (rank, (i, _)) in indexed.into_iter().enumerate() {
        ranks[i] = Some(rank + 1);
    }
    ranks
}

fn rank_points(rule: &RankRule, rank: Option<usize>) -> f64 {
    match rank {
        Some(r) if (1..=rule.points.len()).contains(&r) => rule.points[r - 1],
        _ => rule.others,
    }
}

fn rating_change_points(rule: &RatingChangeRule, change: Option<i32>) -> f64 {
    match change {
        Some(c) if c > 0 => rule.raised,
        Some(0) => rule.unchanged,
        Some(_) => rule.lowered,
        None => rule.unknown,
    }
}

fn age_points(rule: &AgeRule, age: Option<u32>) -> f64 {
    match age {
        Some(a) if a <= 3 => rule.age3,
        Some(4) => rule.age4,
        Some(5) => rule.age5,
        Some(6) => rule.age6,
        Some(_) => rule.age7_plus,
        None => rule.unknown,
    }
}

fn rest_days_points(rule: &RestDaysRule, race_date: NaiveDate, last_run: Option<NaiveDate>) -> f64 {
    match last_run.map(|d| (race_date - d).num_days()) {
        Some(days) if days < 14 => rule.fresh,
        Some(days) if days <= 60 => rule.ideal,
        Some(_) => rule.stale,
        None => rule.unknown,
    }
}

fn weight_points(rule: &WeightRule, weight: Option<u32>) -> f64 {
    match weight {
        Some(w) if w < 118 => rule.light,
        Some(w) if w <= 128 => rule.medium,
        Some(_) => rule.heavy,
        None => rule.unknown,
    }
}

fn grade_points(rule: &GradeRule, grade: Option<Grade>) -> f64 {
    match grade {
        Some(Grade::Good) => rule.good,
        Some(Grade::Fair) => rule.fair,
        Some(Grade::Poor) => rule.poor,
        None => rule.unknown,
    }
}

/// Which metric a rank-based factor ranks on.
fn rank_metric(key: FactorKey, horse: &HorseFactors) -> Option<f64> {
    match key {
        FactorKey::BestTime => horse.best_time,
        FactorKey::EarlyPosition => horse.early_position,
        FactorKey::SectionalTime => horse.sectional_time,
        _ => None,
    }
}

fn rate_metric(key: FactorKey, horse: &HorseFactors) -> Option<f64> {
    match key {
        FactorKey::JockeyWinRate => horse.jockey_win_rate,
        FactorKey::JockeyPlaceRate => horse.jockey_place_rate,
        FactorKey::TrainerWinRate => horse.trainer_win_rate,
        FactorKey::TrainerPlaceRate => horse.trainer_place_rate,
        _ => None,
    }
}

/// Score every horse in a race.
///
/// Results sort descending by total weighted score, ties toward the lower
/// horse number. Manual points apply additively after weighting; a condition
/// override replaces the condition factor's raw score.
pub fn score_race(
    race_date: NaiveDate,
    horses: &[HorseFactors],
    config: &ScoringConfig,
    adjustments: &HashMap<u32, ManualAdjustment>,
) -> Vec<HorseScore> {
    // Field ranks are shared across horses, computed once per rank factor.
    let mut rank_cache: HashMap<FactorKey, Vec<Option<usize>>> = HashMap::new();
    for fc in &config.factors {
        if fc.enabled && matches!(fc.rule, FactorRule::Rank(_)) {
            let values: Vec<Option<f64>> =
                horses.iter().map(|h| rank_metric(fc.key, h)).collect();
            rank_cache.insert(fc.key, ranks_ascending(&values));
        }
    }

    let mut scores: Vec<HorseScore> = horses
        .iter()
        .enumerate()
        .map(|(idx, horse)| {
            let adjustment = adjustments.get(&horse.horse_no).copied().unwrap_or_default();
            let mut factors = Vec::with_capacity(config.factors.len());
            let mut total = 0.0;

            for fc in &config.factors {
                if !fc.enabled {
                    continue;
                }
                let mut raw = match &fc.rule {
                    FactorRule::Rank(rule) => {
                        let rank = rank_cache.get(&fc.key).and_then(|r| r[idx]);
                        rank_points(rule, rank)
                    }
                    FactorRule::Rate(rule) => {
                        rate_metric(fc.key, horse).unwrap_or(0.0) * rule.multiplier
                    }
                    FactorRule::RatingChange(rule) => {
                        rating_change_points(rule, horse.rating_change)
                    }
                    FactorRule::Age(rule) => age_points(rule, horse.age),
                    FactorRule::RestDays(rule) => {
                        rest_days_points(rule, race_date, horse.last_run)
                    }
                    FactorRule::Weight(rule) => weight_points(rule, horse.carried_weight),
                    FactorRule::Grade(rule) => {
                        let grade = match fc.key {
                            FactorKey::Trackwork => horse.trackwork,
                            _ => horse.condition,
                        };
                        grade_points(rule, grade)
                    }
                    FactorRule::Dormant => 0.0,
                };

                if fc.key == FactorKey::Condition {
                    if let Some(override_raw) = adjustment.condition_override {
                        raw = override_raw;
                    }
                }

                let weighted = raw * fc.weight / 100.0;
                total += weighted;
                factors.push(FactorScore {
                    key: fc.key,
                    raw,
                    weighted,
                });
            }

            total += adjustment.manual_points;
            HorseScore {
                horse_no: horse.horse_no,
                total,
                factors,
            }
        })
        .collect();

    scores.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.horse_no.cmp(&b.horse_no))
    });
    scores
}
