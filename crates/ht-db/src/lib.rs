//! SQLite usage store for the screen-time tracker.
//!
//! Two tables: `apps` holds all-time totals per window class, `daily_stats`
//! holds per-day rollups keyed by `(app_id, date)`. Both counters for an app
//! are updated inside one transaction, so a duration add and an open-count
//! increment can never lose an update to each other.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. The tracker owns it behind the session-state lock, which also
//! serializes store access.
//!
//! # Timestamp Format
//!
//! `last_seen`/`created_at` are stored as ISO 8601 text (UTC). Day keys are
//! `YYYY-MM-DD` strings in local time, so a day boundary matches the user's
//! calendar rather than UTC.

use std::path::Path;

use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

use ht_core::{AppId, UsageStore};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Per-app usage for a single day, joined with the app's class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyAppStats {
    pub app_id: i64,
    pub class: String,
    pub date: String,
    pub total_time: i64,
    pub open_count: i64,
}

/// All-time usage totals for one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppTotals {
    pub class: String,
    pub total_time: i64,
    pub open_count: i64,
    pub last_seen: Option<String>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open; initialization is idempotent.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened usage database");
        Ok(db)
    }

    /// Opens an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS apps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class TEXT NOT NULL UNIQUE,
                total_time INTEGER DEFAULT 0,
                open_count INTEGER DEFAULT 0,
                last_seen TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS daily_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                total_time INTEGER DEFAULT 0,
                open_count INTEGER DEFAULT 0,
                FOREIGN KEY (app_id) REFERENCES apps(id),
                UNIQUE(app_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_daily_stats_date ON daily_stats(date);
            CREATE INDEX IF NOT EXISTS idx_daily_stats_app_date ON daily_stats(app_id, date);
            ",
        )?;
        Ok(())
    }

    /// Returns the id for a window class, inserting the app if it is new.
    /// Touches the app's last-seen timestamp either way.
    pub fn get_or_create_app(&mut self, class: &str) -> Result<i64, DbError> {
        let now = timestamp();
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM apps WHERE class = ?", params![class], |row| {
                row.get(0)
            })
            .optional()?;

        if let Some(app_id) = existing {
            self.conn.execute(
                "UPDATE apps SET last_seen = ? WHERE id = ?",
                params![now, app_id],
            )?;
            return Ok(app_id);
        }

        self.conn.execute(
            "INSERT INTO apps (class, last_seen) VALUES (?, ?)",
            params![class, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Adds focused seconds to an app's all-time total and today's rollup.
    /// No-op for `seconds <= 0`.
    pub fn add_duration(&mut self, app_id: i64, seconds: i64) -> Result<(), DbError> {
        self.add_duration_on(app_id, seconds, today())
    }

    /// Like [`Database::add_duration`] but with an explicit day key.
    pub fn add_duration_on(
        &mut self,
        app_id: i64,
        seconds: i64,
        date: NaiveDate,
    ) -> Result<(), DbError> {
        if seconds <= 0 {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE apps SET total_time = total_time + ?, last_seen = ? WHERE id = ?",
            params![seconds, timestamp(), app_id],
        )?;
        tx.execute(
            "
            INSERT INTO daily_stats (app_id, date, total_time, open_count)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(app_id, date) DO UPDATE SET
                total_time = total_time + excluded.total_time
            ",
            params![app_id, day_key(date), seconds],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Increments an app's all-time and today's open counters.
    pub fn increment_open_count(&mut self, app_id: i64) -> Result<(), DbError> {
        self.increment_open_count_on(app_id, today())
    }

    /// Like [`Database::increment_open_count`] but with an explicit day key.
    pub fn increment_open_count_on(&mut self, app_id: i64, date: NaiveDate) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE apps SET open_count = open_count + 1 WHERE id = ?",
            params![app_id],
        )?;
        tx.execute(
            "
            INSERT INTO daily_stats (app_id, date, total_time, open_count)
            VALUES (?, ?, 0, 1)
            ON CONFLICT(app_id, date) DO UPDATE SET
                open_count = open_count + 1
            ",
            params![app_id, day_key(date)],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Per-app stats for one day, ordered by focused time descending.
    pub fn daily_stats(&self, date: NaiveDate) -> Result<Vec<DailyAppStats>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT ds.app_id, a.class, ds.date, ds.total_time, ds.open_count
            FROM daily_stats ds
            JOIN apps a ON ds.app_id = a.id
            WHERE ds.date = ?
            ORDER BY ds.total_time DESC, a.class ASC
            ",
        )?;
        let rows = stmt.query_map(params![day_key(date)], |row| {
            Ok(DailyAppStats {
                app_id: row.get(0)?,
                class: row.get(1)?,
                date: row.get(2)?,
                total_time: row.get(3)?,
                open_count: row.get(4)?,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }

    /// Sum of all focused time for one day, in seconds.
    pub fn total_time_for_date(&self, date: NaiveDate) -> Result<i64, DbError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(total_time), 0) FROM daily_stats WHERE date = ?",
            params![day_key(date)],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// All-time totals per app, ordered by focused time descending.
    pub fn app_totals(&self) -> Result<Vec<AppTotals>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT class, total_time, open_count, last_seen
            FROM apps
            ORDER BY total_time DESC, class ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AppTotals {
                class: row.get(0)?,
                total_time: row.get(1)?,
                open_count: row.get(2)?,
                last_seen: row.get(3)?,
            })
        })?;

        let mut totals = Vec::new();
        for row in rows {
            totals.push(row?);
        }
        Ok(totals)
    }

    /// Sum of all focused time ever recorded, in seconds.
    pub fn total_time(&self) -> Result<i64, DbError> {
        let total = self
            .conn
            .query_row("SELECT COALESCE(SUM(total_time), 0) FROM apps", [], |row| {
                row.get(0)
            })?;
        Ok(total)
    }
}

impl UsageStore for Database {
    type Error = DbError;

    fn resolve_app(&mut self, class: &str) -> Result<AppId, Self::Error> {
        self.get_or_create_app(class)
    }

    fn add_duration(&mut self, app_id: AppId, seconds: i64) -> Result<(), Self::Error> {
        self.add_duration_on(app_id, seconds, today())
    }

    fn record_open(&mut self, app_id: AppId) -> Result<(), Self::Error> {
        self.increment_open_count(app_id)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Day keys use the user's local calendar, matching how people read reports.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();

        let first = db.get_or_create_app("firefox").unwrap();
        let second = db.get_or_create_app("firefox").unwrap();
        let other = db.get_or_create_app("kitty").unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn get_or_create_touches_last_seen() {
        let mut db = Database::open_in_memory().unwrap();
        let app_id = db.get_or_create_app("firefox").unwrap();
        let _ = app_id;

        let totals = db.app_totals().unwrap();
        assert_eq!(totals.len(), 1);
        assert!(totals[0].last_seen.is_some());
    }

    #[test]
    fn add_duration_accumulates_both_tables() {
        let mut db = Database::open_in_memory().unwrap();
        let app_id = db.get_or_create_app("firefox").unwrap();
        let date = day(2025, 3, 1);

        db.add_duration_on(app_id, 65, date).unwrap();
        db.add_duration_on(app_id, 10, date).unwrap();

        assert_eq!(db.total_time().unwrap(), 75);
        let stats = db.daily_stats(date).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_time, 75);
        assert_eq!(stats[0].open_count, 0);
    }

    #[test]
    fn add_duration_ignores_non_positive() {
        let mut db = Database::open_in_memory().unwrap();
        let app_id = db.get_or_create_app("firefox").unwrap();
        let date = day(2025, 3, 1);

        db.add_duration_on(app_id, 0, date).unwrap();
        db.add_duration_on(app_id, -5, date).unwrap();

        assert_eq!(db.total_time().unwrap(), 0);
        assert!(db.daily_stats(date).unwrap().is_empty());
    }

    #[test]
    fn open_count_rolls_up_per_day() {
        let mut db = Database::open_in_memory().unwrap();
        let app_id = db.get_or_create_app("kitty").unwrap();
        let monday = day(2025, 3, 3);
        let tuesday = day(2025, 3, 4);

        db.increment_open_count_on(app_id, monday).unwrap();
        db.increment_open_count_on(app_id, monday).unwrap();
        db.increment_open_count_on(app_id, tuesday).unwrap();

        let totals = db.app_totals().unwrap();
        assert_eq!(totals[0].open_count, 3);
        assert_eq!(db.daily_stats(monday).unwrap()[0].open_count, 2);
        assert_eq!(db.daily_stats(tuesday).unwrap()[0].open_count, 1);
    }

    #[test]
    fn duration_and_open_count_share_a_daily_row() {
        let mut db = Database::open_in_memory().unwrap();
        let app_id = db.get_or_create_app("firefox").unwrap();
        let date = day(2025, 3, 1);

        db.increment_open_count_on(app_id, date).unwrap();
        db.add_duration_on(app_id, 30, date).unwrap();

        let stats = db.daily_stats(date).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_time, 30);
        assert_eq!(stats[0].open_count, 1);
    }

    #[test]
    fn daily_stats_order_by_time_descending() {
        let mut db = Database::open_in_memory().unwrap();
        let firefox = db.get_or_create_app("firefox").unwrap();
        let kitty = db.get_or_create_app("kitty").unwrap();
        let date = day(2025, 3, 1);

        db.add_duration_on(firefox, 10, date).unwrap();
        db.add_duration_on(kitty, 300, date).unwrap();

        let stats = db.daily_stats(date).unwrap();
        let classes: Vec<_> = stats.iter().map(|s| s.class.as_str()).collect();
        assert_eq!(classes, vec!["kitty", "firefox"]);
        assert_eq!(db.total_time_for_date(date).unwrap(), 310);
    }

    #[test]
    fn days_are_isolated() {
        let mut db = Database::open_in_memory().unwrap();
        let app_id = db.get_or_create_app("firefox").unwrap();

        db.add_duration_on(app_id, 100, day(2025, 3, 1)).unwrap();
        db.add_duration_on(app_id, 50, day(2025, 3, 2)).unwrap();

        assert_eq!(db.total_time_for_date(day(2025, 3, 1)).unwrap(), 100);
        assert_eq!(db.total_time_for_date(day(2025, 3, 2)).unwrap(), 50);
        assert_eq!(db.total_time().unwrap(), 150);
    }

    #[test]
    fn opens_on_disk_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ht.db");

        {
            let mut db = Database::open(&path).unwrap();
            let app_id = db.get_or_create_app("firefox").unwrap();
            db.add_duration_on(app_id, 42, day(2025, 3, 1)).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.total_time().unwrap(), 42);
    }
}
