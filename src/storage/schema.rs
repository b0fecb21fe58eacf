//! SQLite schema definitions for recorded race data
//!
//! Tables:
//! - races: Core race identity (date, venue, race number)
//! - payout_pools: Winning combinations and dividends per pool
//! - trend_snapshots: Market-implied rankings at pre-race offsets
//! - pundit_picks: Pundit recommendation lists
//! - strategy_picks: Manually defined strategy pick lists
//! - manual_adjustments: Per-horse scoring adjustments
//! - horse_factors: Raw per-horse scoring inputs

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    // Core race identity
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            race_id TEXT PRIMARY KEY,
            race_date TEXT NOT NULL,
            venue TEXT NOT NULL,
            race_no INTEGER NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(race_date, race_no)
        )
        "#,
        [],
    )?;

    // Payout pools: combination and dividend kept as recorded text
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS payout_pools (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            pool_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            combination TEXT NOT NULL,
            dividend TEXT NOT NULL,
            UNIQUE(race_id, pool_name, position)
        )
        "#,
        [],
    )?;

    // Trend snapshots keyed by minutes-before-start offset
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS trend_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            offset_key TEXT NOT NULL,
            rank INTEGER NOT NULL,
            horse_no INTEGER NOT NULL,
            UNIQUE(race_id, offset_key, rank)
        )
        "#,
        [],
    )?;

    // Pundit recommendation lists
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS pundit_picks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            rank INTEGER NOT NULL,
            horse_no INTEGER NOT NULL,
            UNIQUE(race_id, rank)
        )
        "#,
        [],
    )?;

    // Named strategy pick lists
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS strategy_picks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            strategy_id TEXT NOT NULL,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            rank INTEGER NOT NULL,
            horse_no INTEGER NOT NULL,
            UNIQUE(strategy_id, race_id, rank)
        )
        "#,
        [],
    )?;

    // Per-horse manual scoring adjustments, last writer wins
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS manual_adjustments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            horse_no INTEGER NOT NULL,
            manual_points REAL NOT NULL DEFAULT 0,
            condition_override REAL,
            UNIQUE(race_id, horse_no)
        )
        "#,
        [],
    )?;

    // Raw per-horse scoring inputs
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS horse_factors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id TEXT NOT NULL REFERENCES races(race_id),
            horse_no INTEGER NOT NULL,
            best_time REAL,
            early_position REAL,
            sectional_time REAL,
            jockey_win_rate REAL,
            jockey_place_rate REAL,
            trainer_win_rate REAL,
            trainer_place_rate REAL,
            rating_change INTEGER,
            age INTEGER,
            last_run TEXT,
            carried_weight INTEGER,
            condition TEXT,
            trackwork TEXT,
            UNIQUE(race_id, horse_no)
        )
        "#,
        [],
    )?;

    // Create indexes for common queries
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_races_date ON races(race_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pools_race ON payout_pools(race_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trends_race ON trend_snapshots(race_id, offset_key)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_strategy_picks_race ON strategy_picks(race_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_factors_race ON horse_factors(race_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        // Verify tables exist
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('races', 'payout_pools', 'trend_snapshots', 'pundit_picks',
                  'strategy_picks', 'manual_adjustments', 'horse_factors')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // Should not fail on second call
        create_tables(&conn).unwrap();
    }
}
