//! Domain types shared across the statistics engine.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One winning combination and its dividend, as recorded from the payout page.
///
/// Both fields are kept as raw strings: combinations arrive in several
/// delimiter styles ("3,8", "2-4-6-9", "1+2") and dividends carry thousands
/// separators or the did-not-pay sentinel. Parsing happens at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutEntry {
    pub combination: String,
    pub dividend: String,
}

/// One wagering pool for a race: name plus its winning entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutPool {
    pub name: String,
    pub entries: Vec<PayoutEntry>,
}

/// Pool families we settle against. Pool names on the payout page are
/// Chinese with occasional English variants, so matching accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Win,
    Place,
    Quinella,
    Tierce,
    FirstFour,
    Quartet,
}

impl PoolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let n = name.trim();
        match n {
            "獨贏" => Some(PoolKind::Win),
            "位置" => Some(PoolKind::Place),
            "連贏" => Some(PoolKind::Quinella),
            "三重彩" => Some(PoolKind::Tierce),
            "四連環" => Some(PoolKind::FirstFour),
            "四重彩" => Some(PoolKind::Quartet),
            _ => match n.to_uppercase().as_str() {
                "WIN" => Some(PoolKind::Win),
                "PLACE" => Some(PoolKind::Place),
                "QUINELLA" => Some(PoolKind::Quinella),
                "TIERCE" => Some(PoolKind::Tierce),
                "FIRST 4" | "FIRST4" | "FIRST-4" => Some(PoolKind::FirstFour),
                "QUARTET" => Some(PoolKind::Quartet),
                _ => None,
            },
        }
    }
}

/// Find a pool of the given kind among a race's pools.
pub fn find_pool(pools: &[PayoutPool], kind: PoolKind) -> Option<&PayoutPool> {
    pools
        .iter()
        .find(|p| PoolKind::from_name(&p.name) == Some(kind))
}

/// Everything the engine needs for one race, assembled by the repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaceCard {
    pub race_id: String,
    #[serde(default = "default_date")]
    pub race_date: NaiveDate,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub race_no: u32,
    #[serde(default)]
    pub pools: Vec<PayoutPool>,
    /// Pundit recommendation, ranked best to worst.
    #[serde(default)]
    pub pundit: Vec<u32>,
    /// Trend snapshots keyed by minutes-before-start offset ("30", "15", ...).
    #[serde(default)]
    pub trends: HashMap<String, Vec<u32>>,
    /// Named strategy pick lists, ranked best to worst.
    #[serde(default)]
    pub strategies: HashMap<String, Vec<u32>>,
}

fn default_date() -> NaiveDate {
    NaiveDate::MIN
}

/// Parse a race date in either the scraped `YYYY/MM/DD` form or ISO.
pub fn parse_race_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| anyhow!("Unrecognized race date: {}", s))
}
