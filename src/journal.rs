//! Local run history kept in SQLite
//!
//! Every `init`, `run` and `facts` invocation gets a row in `runs`; each
//! statement the pipeline completes adds a row to `steps`.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command TEXT NOT NULL,
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    finished_at TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    error TEXT
);
CREATE TABLE IF NOT EXISTS steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    entity TEXT NOT NULL,
    step TEXT NOT NULL,
    row_count INTEGER,
    elapsed_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_steps_run_id ON steps(run_id);
";

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub command: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub entity: String,
    pub step: String,
    pub rows: Option<u64>,
    pub elapsed_ms: u64,
}

pub struct Journal {
    conn: Connection,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create journal directory")?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open journal: {:?}", path))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create journal tables")?;
        Ok(Self { conn })
    }

    pub fn start_run(&self, command: &str) -> Result<RunHandle<'_>> {
        self.conn
            .execute("INSERT INTO runs (command) VALUES (?1)", params![command])
            .context("Failed to record run start")?;
        Ok(RunHandle {
            journal: self,
            id: self.conn.last_insert_rowid(),
        })
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, command, started_at, finished_at, status, error
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    command: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    status: row.get(4)?,
                    error: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    pub fn run(&self, id: i64) -> Result<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, command, started_at, finished_at, status, error FROM runs WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        command: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        status: row.get(4)?,
                        error: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    pub fn steps_for(&self, run_id: i64) -> Result<Vec<StepRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity, step, row_count, elapsed_ms FROM steps WHERE run_id = ?1 ORDER BY id",
        )?;
        let steps = stmt
            .query_map(params![run_id], |row| {
                Ok(StepRecord {
                    entity: row.get(0)?,
                    step: row.get(1)?,
                    rows: row.get::<_, Option<i64>>(2)?.map(|r| r as u64),
                    elapsed_ms: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(steps)
    }
}

/// An open run; steps are attached to it until it is finished
pub struct RunHandle<'a> {
    journal: &'a Journal,
    pub id: i64,
}

impl RunHandle<'_> {
    pub fn record_step(&self, entity: &str, step: &str, rows: Option<u64>, elapsed: Duration) -> Result<()> {
        self.journal
            .conn
            .execute(
                "INSERT INTO steps (run_id, entity, step, row_count, elapsed_ms) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.id,
                    entity,
                    step,
                    rows.map(|r| r as i64),
                    elapsed.as_millis() as i64
                ],
            )
            .context("Failed to record step")?;
        Ok(())
    }

    /// Close the run with its outcome
    pub fn finish(self, error: Option<&str>) -> Result<()> {
        let status = if error.is_some() { "failed" } else { "succeeded" };
        self.journal
            .conn
            .execute(
                "UPDATE runs SET finished_at = datetime('now'), status = ?1, error = ?2 WHERE id = ?3",
                params![status, error, self.id],
            )
            .context("Failed to record run result")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let journal = Journal::open_in_memory().unwrap();

        let run = journal.start_run("run").unwrap();
        let id = run.id;
        run.record_step("country", "copy", Some(12), Duration::from_millis(40))
            .unwrap();
        run.record_step("country", "merge", None, Duration::from_millis(7))
            .unwrap();
        run.finish(None).unwrap();

        let record = journal.run(id).unwrap().unwrap();
        assert_eq!(record.status, "succeeded");
        assert!(record.finished_at.is_some());

        let steps = journal.steps_for(id).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].rows, Some(12));
        assert_eq!(steps[1].step, "merge");
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let journal = Journal::open_in_memory().unwrap();
        journal.start_run("init").unwrap().finish(None).unwrap();
        journal
            .start_run("run")
            .unwrap()
            .finish(Some("sales failed"))
            .unwrap();

        let runs = journal.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].command, "run");
        assert_eq!(runs[0].status, "failed");
        assert_eq!(runs[0].error.as_deref(), Some("sales failed"));
        assert!(journal.run(999).unwrap().is_none());
    }
}
