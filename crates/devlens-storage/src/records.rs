//! Relational facet: durable event and solution records with vector search.

use crate::error::StorageError;
use crate::model::{SimilarCase, SolutionRecord};
use crate::similarity::cosine_similarity;
use devlens_protocol::{ChangelogEntry, Event, EventKind};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// Durable, queryable event and solution records.
pub trait RecordStore: Send + Sync {
    /// Insert one event row with its changelog entry.
    fn insert_event(&self, event: &Event, changelog: &ChangelogEntry) -> Result<(), StorageError>;

    /// Most recent session events, newest first.
    fn recent_events(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChangelogEntry>, StorageError>;

    /// Nearest historical errors by cosine similarity.
    ///
    /// Only considers `error` events, excludes the querying event's own id,
    /// and returns at most `limit` cases ordered by descending similarity.
    fn similar_errors(
        &self,
        embedding: &[f32],
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarCase>, StorageError>;

    /// Insert a solution, or bump its usage count when the id exists.
    ///
    /// Returns true when a new solution row was created. Core fields of an
    /// existing solution are left untouched.
    fn upsert_solution(&self, record: &SolutionRecord) -> Result<bool, StorageError>;

    /// Fetch a solution by id.
    fn solution(&self, solution_id: &str) -> Result<Option<SolutionRecord>, StorageError>;

    /// Overwrite the derived success rate of a solution.
    fn set_success_rate(&self, solution_id: &str, rate: f64) -> Result<(), StorageError>;

    /// Full session changelog, oldest first.
    fn session_timeline(&self, session_id: &str) -> Result<Vec<ChangelogEntry>, StorageError>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open or create the record database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        info!(
            "opening record store (path={})",
            path.as_ref().display()
        );
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory record store, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                session_id TEXT NOT NULL,
                content TEXT NOT NULL,
                stack_trace TEXT,
                context TEXT NOT NULL,
                embedding TEXT,
                changelog TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_session_time
                ON events (session_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_kind ON events (kind);
            CREATE TABLE IF NOT EXISTS solutions (
                id TEXT PRIMARY KEY,
                root_cause TEXT NOT NULL,
                solution_code TEXT NOT NULL,
                explanation TEXT NOT NULL,
                confidence REAL NOT NULL,
                success_rate REAL NOT NULL DEFAULT 0,
                usage_count INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordStore for SqliteRecordStore {
    /// Insert the event row; a duplicate id is a hard error.
    fn insert_event(&self, event: &Event, changelog: &ChangelogEntry) -> Result<(), StorageError> {
        let content = serde_json::to_string(&changelog.content)?;
        let context = serde_json::to_string(&changelog.context)?;
        let changelog_json = serde_json::to_string(changelog)?;
        let embedding = event
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO events
             (id, kind, timestamp, session_id, content, stack_trace, context, embedding, changelog)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.kind.as_str(),
                event.timestamp,
                event.session_id,
                content,
                event.stack_trace,
                context,
                embedding,
                changelog_json,
            ],
        )?;
        debug!(
            "inserted event record (event_id={}, session_id={})",
            event.id, event.session_id
        );
        Ok(())
    }

    fn recent_events(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChangelogEntry>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT changelog FROM events
             WHERE session_id = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_id, limit as i64], |row| {
            row.get::<_, String>(0)
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let entry: ChangelogEntry = serde_json::from_str(&row?)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn similar_errors(
        &self,
        embedding: &[f32],
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarCase>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, content, embedding FROM events
             WHERE kind = ?1 AND id != ?2 AND embedding IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![EventKind::Error.as_str(), exclude_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut cases = Vec::new();
        for row in rows {
            let (event_id, content, stored) = row?;
            let stored: Vec<f32> = serde_json::from_str(&stored)?;
            let similarity = cosine_similarity(embedding, &stored);
            let content: serde_json::Value = serde_json::from_str(&content)?;
            let message = content
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            cases.push(SimilarCase {
                event_id,
                message,
                similarity,
            });
        }
        cases.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        cases.truncate(limit);
        Ok(cases)
    }

    fn upsert_solution(&self, record: &SolutionRecord) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let exists = conn
            .query_row(
                "SELECT 1 FROM solutions WHERE id = ?1",
                params![record.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            conn.execute(
                "UPDATE solutions SET usage_count = usage_count + 1 WHERE id = ?1",
                params![record.id],
            )?;
            debug!("bumped solution usage (solution_id={})", record.id);
        } else {
            conn.execute(
                "INSERT INTO solutions
                 (id, root_cause, solution_code, explanation, confidence,
                  success_rate, usage_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.root_cause,
                    record.solution_code,
                    record.explanation,
                    record.confidence,
                    record.success_rate,
                    record.usage_count as i64,
                    record.created_at,
                ],
            )?;
            debug!("inserted solution record (solution_id={})", record.id);
        }
        Ok(!exists)
    }

    fn solution(&self, solution_id: &str) -> Result<Option<SolutionRecord>, StorageError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, root_cause, solution_code, explanation, confidence,
                        success_rate, usage_count, created_at
                 FROM solutions WHERE id = ?1",
                params![solution_id],
                |row| {
                    Ok(SolutionRecord {
                        id: row.get(0)?,
                        root_cause: row.get(1)?,
                        solution_code: row.get(2)?,
                        explanation: row.get(3)?,
                        confidence: row.get(4)?,
                        success_rate: row.get(5)?,
                        usage_count: row.get::<_, i64>(6)? as u64,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn set_success_rate(&self, solution_id: &str, rate: f64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE solutions SET success_rate = ?2 WHERE id = ?1",
            params![solution_id, rate],
        )?;
        if changed == 0 {
            return Err(StorageError::UnknownSolution(solution_id.to_string()));
        }
        Ok(())
    }

    fn session_timeline(&self, session_id: &str) -> Result<Vec<ChangelogEntry>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT changelog FROM events
             WHERE session_id = ?1
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut entries = Vec::new();
        for row in rows {
            let entry: ChangelogEntry = serde_json::from_str(&row?)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
