use crate::scoring::{Mode, Participant};
use chrono::{DateTime, Local};
use directories::ProjectDirs;
use rusqlite::{params, Connection, Result};
use std::io::Write;
use std::path::PathBuf;

/// The authoritative outcome of one finished session, one row per
/// participant when persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub mode: Mode,
    pub participants: Vec<Participant>,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Local>,
}

impl SessionResult {
    /// Winner of a duel result, `None` on a tie or for solo sessions.
    pub fn winner(&self) -> Option<&Participant> {
        if self.participants.len() < 2 {
            return None;
        }
        let best = self.participants.iter().map(|p| p.score).max()?;
        let mut at_best = self.participants.iter().filter(|p| p.score == best);
        let winner = at_best.next()?;
        if at_best.next().is_some() {
            None // tie
        } else {
            Some(winner)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub player: String,
    pub mode: Mode,
    pub score: u32,
    pub finished_at: DateTime<Local>,
}

/// Where finished sessions go. The TUI uses the sqlite-backed store;
/// headless tests swap in `MemoryStatsStore`.
pub trait StatsStore {
    fn record_session(&mut self, result: &SessionResult) -> Result<()>;
    fn leaderboard(&self, mode: Mode, limit: usize) -> Result<Vec<LeaderboardEntry>>;
    fn history(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}

/// Database manager for session results
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Initialize the database connection and create tables if needed
    pub fn new() -> Result<Self> {
        let db_path = Self::get_db_path().unwrap_or_else(|| PathBuf::from("hoaxbuster_stats.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(&db_path)?;
        Self::init_schema(&conn)?;
        Ok(StatsDb { conn })
    }

    /// In-memory database, used by tests and safe to use as a sink when the
    /// on-disk store cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(StatsDb { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mode TEXT NOT NULL,
                player TEXT NOT NULL,
                score INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                incorrect INTEGER NOT NULL,
                lives_remaining INTEGER,
                elapsed_secs REAL NOT NULL,
                finished_at TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_results_mode ON session_results(mode)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_results_finished_at ON session_results(finished_at)",
            [],
        )?;
        Ok(())
    }

    /// Get the database file path under $HOME/.local/state/hoaxbuster
    fn get_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("hoaxbuster");
            Some(state_dir.join("stats.db"))
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "hoaxbuster") {
            let state_dir = proj_dirs.data_local_dir();
            Some(state_dir.join("stats.db"))
        } else {
            None
        }
    }

    /// Dump the full history as CSV, newest first.
    pub fn export_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT mode, player, score, correct, incorrect, elapsed_secs, finished_at
            FROM session_results
            ORDER BY finished_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record([
                "mode",
                "player",
                "score",
                "correct",
                "incorrect",
                "elapsed_secs",
                "finished_at",
            ])
            .map_err(csv_error)?;
        for row in rows {
            let (mode, player, score, correct, incorrect, elapsed, finished_at) = row?;
            writer
                .write_record([
                    mode,
                    player,
                    score.to_string(),
                    correct.to_string(),
                    incorrect.to_string(),
                    format!("{elapsed:.1}"),
                    finished_at,
                ])
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|e| csv_error(csv::Error::from(e)))?;
        Ok(())
    }

    /// Clear all results (for testing or reset purposes)
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM session_results", [])?;
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<LeaderboardEntry> {
        let mode_str: String = row.get(1)?;
        let mode: Mode = mode_str.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "mode".to_string(), rusqlite::types::Type::Text)
        })?;
        let finished_str: String = row.get(3)?;
        let finished_at = DateTime::parse_from_rfc3339(&finished_str)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    3,
                    "finished_at".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?
            .with_timezone(&Local);
        Ok(LeaderboardEntry {
            player: row.get(0)?,
            mode,
            score: row.get(2)?,
            finished_at,
        })
    }
}

fn csv_error(e: csv::Error) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
        Some(e.to_string()),
    )
}

impl StatsStore for StatsDb {
    fn record_session(&mut self, result: &SessionResult) -> Result<()> {
        let tx = self.conn.transaction()?;
        for p in &result.participants {
            tx.execute(
                r#"
                INSERT INTO session_results
                (mode, player, score, correct, incorrect, lives_remaining, elapsed_secs, finished_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    result.mode.to_string(),
                    p.name,
                    p.score,
                    p.correct_count,
                    p.incorrect_count,
                    p.lives_remaining,
                    result.elapsed_secs,
                    result.finished_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn leaderboard(&self, mode: Mode, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT player, mode, score, finished_at
            FROM session_results
            WHERE mode = ?1
            ORDER BY score DESC, finished_at ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![mode.to_string(), limit as i64], |row| {
            Self::row_to_entry(row)
        })?;
        rows.collect()
    }

    fn history(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT player, mode, score, finished_at
            FROM session_results
            ORDER BY finished_at DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| Self::row_to_entry(row))?;
        rows.collect()
    }
}

/// In-memory store for headless runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    pub results: Vec<SessionResult>,
}

impl StatsStore for MemoryStatsStore {
    fn record_session(&mut self, result: &SessionResult) -> Result<()> {
        self.results.push(result.clone());
        Ok(())
    }

    fn leaderboard(&self, mode: Mode, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = self
            .results
            .iter()
            .filter(|r| r.mode == mode)
            .flat_map(|r| {
                r.participants.iter().map(|p| LeaderboardEntry {
                    player: p.name.clone(),
                    mode: r.mode,
                    score: p.score,
                    finished_at: r.finished_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.finished_at.cmp(&b.finished_at)));
        entries.truncate(limit);
        Ok(entries)
    }

    fn history(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = self
            .results
            .iter()
            .flat_map(|r| {
                r.participants.iter().map(|p| LeaderboardEntry {
                    player: p.name.clone(),
                    mode: r.mode,
                    score: p.score,
                    finished_at: r.finished_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
