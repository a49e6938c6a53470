use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::table::Table;

/// Somewhere partial results go every N rows.
pub trait CheckpointSink {
    fn write(&mut self, rows_done: usize, snapshot: &Table) -> Result<()>;
}

/// Fires the sinks on a fixed row cadence. Sink errors are logged, never raised.
pub struct Checkpointer {
    interval: usize,
    sinks: Vec<Box<dyn CheckpointSink>>,
}

impl Checkpointer {
    pub fn new(interval: usize) -> Self {
        Self {
            interval,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn CheckpointSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_due(&self, rows_done: usize) -> bool {
        self.interval > 0 && rows_done > 0 && rows_done % self.interval == 0
    }

    /// Snapshot if `rows_done` lands on the cadence. Builds the table lazily.
    pub fn maybe_write<F>(&mut self, rows_done: usize, snapshot: F)
    where
        F: FnOnce() -> Table,
    {
        if !self.is_due(rows_done) || self.sinks.is_empty() {
            return;
        }
        let table = snapshot();
        for sink in &mut self.sinks {
            if let Err(e) = sink.write(rows_done, &table) {
                warn!("Checkpoint at row {} failed: {:#}", rows_done, e);
            }
        }
    }
}

// ── CSV files ──

/// `{dir}/{prefix}_checkpoint_{rows}.csv`
pub struct CsvCheckpoints {
    dir: PathBuf,
    prefix: String,
}

impl CsvCheckpoints {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, rows_done: usize) -> PathBuf {
        self.dir
            .join(format!("{}_checkpoint_{}.csv", self.prefix, rows_done))
    }
}

impl CheckpointSink for CsvCheckpoints {
    fn write(&mut self, rows_done: usize, snapshot: &Table) -> Result<()> {
        let path = self.path_for(rows_done);
        snapshot.write(&path)?;
        info!("Checkpoint saved: {}", path.display());
        Ok(())
    }
}

// ── SQLite ──

/// Each checkpoint row stored as a JSON object keyed by column name.
pub struct SqliteCheckpoints {
    conn: Connection,
}

impl SqliteCheckpoints {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Rows of one checkpoint in row order.
    #[cfg(test)]
    fn rows_at(&self, rows_done: usize) -> Result<Vec<serde_json::Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT data FROM checkpoint_rows WHERE checkpoint = ?1 ORDER BY row_index",
        )?;
        let rows = stmt
            .query_map([rows_done as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|s| serde_json::from_str::<serde_json::Value>(s).map_err(Into::into))
            .collect()
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS checkpoint_rows (
            id          INTEGER PRIMARY KEY,
            checkpoint  INTEGER NOT NULL,
            row_index   INTEGER NOT NULL,
            data        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(checkpoint, row_index)
        );
        CREATE INDEX IF NOT EXISTS idx_checkpoint ON checkpoint_rows(checkpoint);
        ",
    )?;
    Ok(())
}

impl CheckpointSink for SqliteCheckpoints {
    fn write(&mut self, rows_done: usize, snapshot: &Table) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO checkpoint_rows (checkpoint, row_index, data)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (i, row) in snapshot.rows.iter().enumerate() {
                let obj: serde_json::Map<String, serde_json::Value> = snapshot
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(c, h)| {
                        let v = row.get(c).cloned().unwrap_or_default();
                        (h.clone(), serde_json::Value::String(v))
                    })
                    .collect();
                let data = serde_json::Value::Object(obj).to_string();
                stmt.execute(rusqlite::params![rows_done as i64, i as i64, data])?;
            }
        }
        tx.commit()?;
        info!("Checkpoint {} saved to SQLite ({} rows)", rows_done, snapshot.len());
        Ok(())
    }
}
