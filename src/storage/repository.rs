//! SQLite repository for CRUD operations on race cards and scoring data

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use super::schema::create_tables;
use crate::scoring::{Grade, HorseFactors, ManualAdjustment};
use crate::types::{PayoutEntry, PayoutPool, RaceCard};

/// Repository for race cards, pick lists and scoring inputs
pub struct RaceRepository {
    conn: Connection,
}

impl RaceRepository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        // Create tables if they don't exist
        create_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Insert Operations ====================

    /// Insert or replace a full race card: race identity plus its payout
    /// pools, trend snapshots, pundit picks and strategy picks.
    pub fn insert_card(&mut self, card: &RaceCard) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO races (race_id, race_date, venue, race_no)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                card.race_id,
                card.race_date.to_string(),
                card.venue,
                card.race_no,
            ],
        )?;

        // Replace child rows wholesale so re-imports stay idempotent
        tx.execute(
            "DELETE FROM payout_pools WHERE race_id = ?1",
            [&card.race_id],
        )?;
        tx.execute(
            "DELETE FROM trend_snapshots WHERE race_id = ?1",
            [&card.race_id],
        )?;
        tx.execute(
            "DELETE FROM pundit_picks WHERE race_id = ?1",
            [&card.race_id],
        )?;
        tx.execute(
            "DELETE FROM strategy_picks WHERE race_id = ?1",
            [&card.race_id],
        )?;

        for pool in &card.pools {
            for (position, entry) in pool.entries.iter().enumerate() {
                tx.execute(
                    r#"
                    INSERT INTO payout_pools (race_id, pool_name, position, combination, dividend)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        card.race_id,
                        pool.name,
                        position as i64,
                        entry.combination,
                        entry.dividend,
                    ],
                )?;
            }
        }

        for (offset, horses) in &card.trends {
            for (rank, horse_no) in horses.iter().enumerate() {
                tx.execute(
                    r#"
                    INSERT INTO trend_snapshots (race_id, offset_key, rank, horse_no)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![card.race_id, offset, rank as i64, horse_no],
                )?;
            }
        }

        for (rank, horse_no) in card.pundit.iter().enumerate() {
            tx.execute(
                "INSERT INTO pundit_picks (race_id, rank, horse_no) VALUES (?1, ?2, ?3)",
                params![card.race_id, rank as i64, horse_no],
            )?;
        }

        for (strategy_id, horses) in &card.strategies {
            for (rank, horse_no) in horses.iter().enumerate() {
                tx.execute(
                    r#"
                    INSERT INTO strategy_picks (strategy_id, race_id, rank, horse_no)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![strategy_id, card.race_id, rank as i64, horse_no],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Replace one strategy's pick list for a race
    pub fn set_strategy_picks(
        &self,
        strategy_id: &str,
        race_id: &str,
        horses: &[u32],
    ) -> Result<()> {
        self.conn.execute(
            "DELETE FROM strategy_picks WHERE strategy_id = ?1 AND race_id = ?2",
            params![strategy_id, race_id],
        )?;
        for (rank, horse_no) in horses.iter().enumerate() {
            self.conn.execute(
                r#"
                INSERT INTO strategy_picks (strategy_id, race_id, rank, horse_no)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![strategy_id, race_id, rank as i64, horse_no],
            )?;
        }
        Ok(())
    }

    /// Upsert a manual adjustment, last writer wins
    pub fn set_manual_adjustment(
        &self,
        race_id: &str,
        horse_no: u32,
        adjustment: &ManualAdjustment,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO manual_adjustments
            (race_id, horse_no, manual_points, condition_override)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                race_id,
                horse_no,
                adjustment.manual_points,
                adjustment.condition_override,
            ],
        )?;
        Ok(())
    }

    /// Insert per-horse scoring inputs (upsert)
    pub fn insert_horse_factors(&self, race_id: &str, factors: &HorseFactors) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO horse_factors
            (race_id, horse_no, best_time, early_position, sectional_time,
             jockey_win_rate, jockey_place_rate, trainer_win_rate, trainer_place_rate,
             rating_change, age, last_run, carried_weight, condition, trackwork)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                race_id,
                factors.horse_no,
                factors.best_time,
                factors.early_position,
                factors.sectional_time,
                factors.jockey_win_rate,
                factors.jockey_place_rate,
                factors.trainer_win_rate,
                factors.trainer_place_rate,
                factors.rating_change,
                factors.age,
                factors.last_run.map(|d| d.to_string()),
                factors.carried_weight,
                factors.condition.map(|g| g.as_str()),
                factors.trackwork.map(|g| g.as_str()),
            ],
        )?;
        Ok(())
    }

    // ==================== Query Operations ====================

    /// Check if a race exists
    pub fn race_exists(&self, race_id: &str) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM races WHERE race_id = ?1",
            [race_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get a single race card with all nested data
    pub fn get_race_card(&self, race_id: &str) -> Result<Option<RaceCard>> {
        let header = self
            .conn
            .query_row(
                "SELECT race_id, race_date, venue, race_no FROM races WHERE race_id = ?1",
                [race_id],
                |row| {
                    let date_str: String = row.get(1)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        date_str,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((race_id, date_str, venue, race_no)) = header else {
            return Ok(None);
        };

        let mut card = RaceCard {
            race_id,
            race_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .unwrap_or(NaiveDate::MIN),
            venue,
            race_no,
            ..Default::default()
        };
        self.load_children(&mut card)?;
        Ok(Some(card))
    }

    /// Get race cards in a date range (inclusive), ordered by date then
    /// race number. Open bounds load everything on that side.
    pub fn get_race_cards(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RaceCard>> {
        let start = start.map(|d| d.to_string()).unwrap_or_default();
        let end = end
            .map(|d| d.to_string())
            .unwrap_or_else(|| "9999-12-31".to_string());

        let mut stmt = self.conn.prepare(
            r#"
            SELECT race_id, race_date, venue, race_no
            FROM races
            WHERE race_date >= ?1 AND race_date <= ?2
            ORDER BY race_date, race_no
            "#,
        )?;

        let mut cards = stmt
            .query_map([start, end], |row| {
                let date_str: String = row.get(1)?;
                Ok(RaceCard {
                    race_id: row.get(0)?,
                    race_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                        .unwrap_or(NaiveDate::MIN),
                    venue: row.get(2)?,
                    race_no: row.get(3)?,
                    ..Default::default()
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for card in &mut cards {
            self.load_children(card)?;
        }

        Ok(cards)
    }

    fn load_children(&self, card: &mut RaceCard) -> Result<()> {
        // Payout pools, preserving recorded order within each pool
        let mut stmt = self.conn.prepare(
            r#"
            SELECT pool_name, combination, dividend
            FROM payout_pools
            WHERE race_id = ?1
            ORDER BY pool_name, position
            "#,
        )?;
        let rows = stmt.query_map([&card.race_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (pool_name, combination, dividend) = row?;
            let entry = PayoutEntry {
                combination,
                dividend,
            };
            match card.pools.iter_mut().find(|p| p.name == pool_name) {
                Some(pool) => pool.entries.push(entry),
                None => card.pools.push(PayoutPool {
                    name: pool_name,
                    entries: vec![entry],
                }),
            }
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT offset_key, horse_no
            FROM trend_snapshots
            WHERE race_id = ?1
            ORDER BY offset_key, rank
            "#,
        )?;
        let rows = stmt.query_map([&card.race_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        for row in rows {
            let (offset, horse_no) = row?;
            card.trends.entry(offset).or_default().push(horse_no);
        }

        let mut stmt = self.conn.prepare(
            "SELECT horse_no FROM pundit_picks WHERE race_id = ?1 ORDER BY rank",
        )?;
        card.pundit = stmt
            .query_map([&card.race_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT strategy_id, horse_no
            FROM strategy_picks
            WHERE race_id = ?1
            ORDER BY strategy_id, rank
            "#,
        )?;
        let rows = stmt.query_map([&card.race_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        for row in rows {
            let (strategy_id, horse_no) = row?;
            card.strategies.entry(strategy_id).or_default().push(horse_no);
        }

        Ok(())
    }

    /// Get manual adjustments for a race, keyed by horse number
    pub fn get_manual_adjustments(&self, race_id: &str) -> Result<HashMap<u32, ManualAdjustment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT horse_no, manual_points, condition_override
            FROM manual_adjustments
            WHERE race_id = ?1
            "#,
        )?;
        let adjustments = stmt
            .query_map([race_id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    ManualAdjustment {
                        manual_points: row.get(1)?,
                        condition_override: row.get(2)?,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(adjustments)
    }

    /// Get scoring inputs for every horse in a race
    pub fn get_horse_factors(&self, race_id: &str) -> Result<Vec<HorseFactors>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT horse_no, best_time, early_position, sectional_time,
                   jockey_win_rate, jockey_place_rate, trainer_win_rate, trainer_place_rate,
                   rating_change, age, last_run, carried_weight, condition, trackwork
            FROM horse_factors
            WHERE race_id = ?1
            ORDER BY horse_no
            "#,
        )?;

        let factors = stmt
            .query_map([race_id], |row| {
                let last_run: Option<String> = row.get(10)?;
                let condition: Option<String> = row.get(12)?;
                let trackwork: Option<String> = row.get(13)?;
                Ok(HorseFactors {
                    horse_no: row.get(0)?,
                    best_time: row.get(1)?,
                    early_position: row.get(2)?,
                    sectional_time: row.get(3)?,
                    jockey_win_rate: row.get(4)?,
                    jockey_place_rate: row.get(5)?,
                    trainer_win_rate: row.get(6)?,
                    trainer_place_rate: row.get(7)?,
                    rating_change: row.get(8)?,
                    age: row.get(9)?,
                    last_run: last_run
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    carried_weight: row.get(11)?,
                    condition: condition.as_deref().and_then(Grade::from_str_opt),
                    trackwork: trackwork.as_deref().and_then(Grade::from_str_opt),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(factors)
    }

    /// Get race count
    pub fn get_race_count(&self) -> Result<i32> {
        let count: i32 =
            self.conn
                .query_row("SELECT COUNT(*) FROM races", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_race_date;

    fn create_test_card() -> RaceCard {
        let mut card = RaceCard {
            race_id: "2024-03-17-1".to_string(),
            race_date: parse_race_date("2024/03/17").unwrap(),
            venue: "ST".to_string(),
            race_no: 1,
            pools: vec![
                PayoutPool {
                    name: "獨贏".to_string(),
                    entries: vec![PayoutEntry {
                        combination: "8".to_string(),
                        dividend: "35.00".to_string(),
                    }],
                },
                PayoutPool {
                    name: "連贏".to_string(),
                    entries: vec![PayoutEntry {
                        combination: "3,8".to_string(),
                        dividend: "62.00".to_string(),
                    }],
                },
            ],
            pundit: vec![8, 3, 1, 5],
            ..Default::default()
        };
        card.trends.insert("30".to_string(), vec![3, 8, 5, 1]);
        card.trends.insert("5".to_string(), vec![8, 3, 5, 1]);
        card.strategies
            .insert("early-speed".to_string(), vec![5, 8, 3]);
        card
    }

    #[test]
    fn test_insert_and_get_card() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let card = create_test_card();

        repo.insert_card(&card).unwrap();
        assert!(repo.race_exists(&card.race_id).unwrap());

        let loaded = repo.get_race_card(&card.race_id).unwrap().unwrap();
        assert_eq!(loaded.race_date, card.race_date);
        assert_eq!(loaded.venue, "ST");
        assert_eq!(loaded.pools.len(), 2);
        assert_eq!(loaded.pundit, vec![8, 3, 1, 5]);
        assert_eq!(loaded.trends["30"], vec![3, 8, 5, 1]);
        assert_eq!(loaded.strategies["early-speed"], vec![5, 8, 3]);
    }

    #[test]
    fn test_get_race_cards_by_date_range() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let mut card = create_test_card();
        repo.insert_card(&card).unwrap();

        card.race_id = "2024-04-01-1".to_string();
        card.race_date = parse_race_date("2024/04/01").unwrap();
        repo.insert_card(&card).unwrap();

        let all = repo.get_race_cards(None, None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].race_date < all[1].race_date);

        let march = repo
            .get_race_cards(
                Some(parse_race_date("2024/03/01").unwrap()),
                Some(parse_race_date("2024/03/31").unwrap()),
            )
            .unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].race_id, "2024-03-17-1");
    }

    #[test]
    fn test_reinsert_replaces_children() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let mut card = create_test_card();
        repo.insert_card(&card).unwrap();

        card.pundit = vec![1, 2];
        card.pools.truncate(1);
        repo.insert_card(&card).unwrap();

        assert_eq!(repo.get_race_count().unwrap(), 1);
        let loaded = repo.get_race_card(&card.race_id).unwrap().unwrap();
        assert_eq!(loaded.pundit, vec![1, 2]);
        assert_eq!(loaded.pools.len(), 1);
    }

    #[test]
    fn test_manual_adjustment_last_writer_wins() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let card = create_test_card();
        repo.insert_card(&card).unwrap();

        repo.set_manual_adjustment(
            &card.race_id,
            8,
            &ManualAdjustment {
                manual_points: 2.0,
                condition_override: None,
            },
        )
        .unwrap();
        repo.set_manual_adjustment(
            &card.race_id,
            8,
            &ManualAdjustment {
                manual_points: 5.0,
                condition_override: Some(10.0),
            },
        )
        .unwrap();

        let adjustments = repo.get_manual_adjustments(&card.race_id).unwrap();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[&8].manual_points, 5.0);
        assert_eq!(adjustments[&8].condition_override, Some(10.0));
    }

    #[test]
    fn test_horse_factors_round_trip() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let card = create_test_card();
        repo.insert_card(&card).unwrap();

        let factors = HorseFactors {
            horse_no: 8,
            best_time: Some(69.85),
            early_position: Some(2.4),
            sectional_time: Some(22.3),
            jockey_win_rate: Some(14.0),
            jockey_place_rate: Some(38.0),
            trainer_win_rate: Some(11.0),
            trainer_place_rate: Some(30.0),
            rating_change: Some(-3),
            age: Some(4),
            last_run: Some(parse_race_date("2024/02/25").unwrap()),
            carried_weight: Some(122),
            condition: Some(Grade::Good),
            trackwork: Some(Grade::Fair),
        };
        repo.insert_horse_factors(&card.race_id, &factors).unwrap();

        let loaded = repo.get_horse_factors(&card.race_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].horse_no, 8);
        assert_eq!(loaded[0].best_time, Some(69.85));
        assert_eq!(loaded[0].rating_change, Some(-3));
        assert_eq!(loaded[0].last_run, Some(parse_race_date("2024/02/25").unwrap()));
        assert_eq!(loaded[0].condition, Some(Grade::Good));
        assert_eq!(loaded[0].trackwork, Some(Grade::Fair));
    }

    #[test]
    fn test_set_strategy_picks_replaces() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let card = create_test_card();
        repo.insert_card(&card).unwrap();

        repo.set_strategy_picks("pace-map", &card.race_id, &[1, 2, 3])
            .unwrap();
        repo.set_strategy_picks("pace-map", &card.race_id, &[9, 7])
            .unwrap();

        let loaded = repo.get_race_card(&card.race_id).unwrap().unwrap();
        assert_eq!(loaded.strategies["pace-map"], vec![9, 7]);
        // The imported strategy is untouched.
        assert_eq!(loaded.strategies["early-speed"], vec![5, 8, 3]);
    }

    #[test]
    fn test_missing_race_card_is_none() {
        let repo = RaceRepository::in_memory().unwrap();
        assert!(repo.get_race_card("nope").unwrap().is_none());
    }
}
