//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline stages never execute SQL; the runner moves data in and out.

use crate::{config::PipelineConfig, error::AuditResult, event::EventLogEntry};
use rusqlite::{params, Connection, OptionalExtension};

mod priority;
mod raw_transaction;

pub use raw_transaction::RAW_TRANSACTION_COLUMNS;

pub struct AuditStore {
    conn: Connection,
}

/// A row of the `run` table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub seed: u64,
    pub version: String,
    pub started_at: String,
    pub config_json: String,
}

impl AuditStore {
    pub fn open(path: &str) -> AuditResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AuditResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AuditResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    /// Run a SQL script as-is, e.g. a portal dump that creates and fills
    /// its own raw_transaction table.
    pub fn execute_script(&self, sql: &str) -> AuditResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, config: &PipelineConfig, version: &str) -> AuditResult<()> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let config_json = serde_json::to_string(config)?;
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at, config_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, config.seed as i64, version, started_at, config_json],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> AuditResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT run_id, seed, version, started_at, config_json
                 FROM run WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        run_id:      row.get(0)?,
                        seed:        row.get::<_, i64>(1)? as u64,
                        version:     row.get(2)?,
                        started_at:  row.get(3)?,
                        config_json: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_events(&self, entries: &[EventLogEntry]) -> AuditResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO event_log (run_id, seq, stage, event_type, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.run_id,
                    entry.seq as i64,
                    entry.stage,
                    entry.event_type,
                    entry.payload,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> AuditResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, seq, stage, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY seq ASC, id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    seq:        row.get::<_, i64>(2)? as u64,
                    stage:      row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PipelineEvent;

    #[test]
    fn run_row_round_trips() {
        let store = AuditStore::in_memory().unwrap();
        store.migrate().unwrap();
        let config = PipelineConfig::default_test();
        store.insert_run("run-a", &config, "0.1.0").unwrap();

        let run = store.get_run("run-a").unwrap().unwrap();
        assert_eq!(run.seed, config.seed);
        let restored: PipelineConfig = serde_json::from_str(&run.config_json).unwrap();
        assert_eq!(restored.local_density.n_neighbors, config.local_density.n_neighbors);
        assert!(store.get_run("missing").unwrap().is_none());
    }

    #[test]
    fn events_come_back_in_sequence_order() {
        let store = AuditStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.insert_run("run-b", &PipelineConfig::default_test(), "0.1.0").unwrap();

        let events = [
            PipelineEvent::RunInitialized { run_id: "run-b".into(), seed: 7, input_rows: 3 },
            PipelineEvent::ScoresFused { rows: 3, cutoff_p90: Some(0.4) },
        ];
        let entries: Vec<_> = events
            .iter()
            .enumerate()
            .map(|(i, e)| EventLogEntry::from_event("run-b", i as u64, e).unwrap())
            .rev()
            .collect();
        store.append_events(&entries).unwrap();

        let loaded = store.events_for_run("run-b").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].event_type, "run_initialized");
        let decoded: PipelineEvent = serde_json::from_str(&loaded[1].payload).unwrap();
        assert_eq!(decoded, events[1]);
    }
}
