//! Graph facet: nodes and edges linking events, sessions, solutions,
//! patterns and outcomes.

use crate::error::StorageError;
use crate::model::OutcomeRecord;
use chrono::{DateTime, Utc};
use devlens_protocol::{Event, PatternFinding, SolutionMetrics};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use std::path::Path;

/// Relationship graph across events, sessions, solutions and patterns.
pub trait GraphStore: Send + Sync {
    /// Upsert the event node and tie it to its session node.
    fn upsert_event(&self, event: &Event) -> Result<(), StorageError>;

    /// Record that an event was solved by a solution.
    fn link_solution(
        &self,
        event_id: &str,
        solution_id: &str,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Upsert a pattern node and append an exhibits edge from the session.
    ///
    /// Pattern descriptions are last-write-wins; exhibits edges accumulate,
    /// one per sighting.
    fn record_pattern(
        &self,
        finding: &PatternFinding,
        session_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Append one outcome node for a solution.
    fn append_outcome(&self, outcome: &OutcomeRecord) -> Result<(), StorageError>;

    /// All recorded outcomes of a solution, oldest first.
    fn outcomes(&self, solution_id: &str) -> Result<Vec<OutcomeRecord>, StorageError>;

    /// Aggregate solution metrics over a session's solved events.
    fn session_metrics(&self, session_id: &str) -> Result<SolutionMetrics, StorageError>;

    /// Pattern sighting counts for a session, keyed `kind:pattern`.
    fn session_patterns(&self, session_id: &str) -> Result<BTreeMap<String, u64>, StorageError>;
}

/// SQLite-backed graph store.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    /// Open or create the graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        info!("opening graph store (path={})", path.as_ref().display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory graph store, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS event_nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                session_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_event_nodes_session
                ON event_nodes (session_id);
            CREATE TABLE IF NOT EXISTS session_nodes (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS solution_nodes (
                id TEXT PRIMARY KEY,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS solved_by (
                event_id TEXT NOT NULL,
                solution_id TEXT NOT NULL,
                confidence REAL NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_solved_by_solution
                ON solved_by (solution_id);
            CREATE TABLE IF NOT EXISTS pattern_nodes (
                name TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                last_seen TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS exhibits (
                session_id TEXT NOT NULL,
                pattern TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exhibits_session
                ON exhibits (session_id);
            CREATE TABLE IF NOT EXISTS outcome_nodes (
                id TEXT PRIMARY KEY,
                solution_id TEXT NOT NULL,
                success INTEGER NOT NULL,
                metrics TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_outcome_nodes_solution
                ON outcome_nodes (solution_id);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert_event(&self, event: &Event) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO session_nodes (id, started_at) VALUES (?1, ?2)
             ON CONFLICT (id) DO NOTHING",
            params![event.session_id, event.timestamp],
        )?;
        conn.execute(
            "INSERT INTO event_nodes (id, kind, message, timestamp, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO UPDATE SET
                 kind = excluded.kind,
                 message = excluded.message,
                 timestamp = excluded.timestamp,
                 session_id = excluded.session_id",
            params![
                event.id,
                event.kind.as_str(),
                event.message().unwrap_or_default(),
                event.timestamp,
                event.session_id,
            ],
        )?;
        debug!(
            "graphed event (event_id={}, session_id={})",
            event.id, event.session_id
        );
        Ok(())
    }

    fn link_solution(
        &self,
        event_id: &str,
        solution_id: &str,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO solution_nodes (id, confidence, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO NOTHING",
            params![solution_id, confidence, timestamp],
        )?;
        conn.execute(
            "INSERT INTO solved_by (event_id, solution_id, confidence, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![event_id, solution_id, confidence, timestamp],
        )?;
        debug!(
            "linked solution (event_id={event_id}, solution_id={solution_id})"
        );
        Ok(())
    }

    fn record_pattern(
        &self,
        finding: &PatternFinding,
        session_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pattern_nodes (name, kind, description, last_seen)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (name) DO UPDATE SET
                 kind = excluded.kind,
                 description = excluded.description,
                 last_seen = excluded.last_seen",
            params![
                finding.pattern,
                finding.kind.as_str(),
                finding.description,
                timestamp,
            ],
        )?;
        conn.execute(
            "INSERT INTO exhibits (session_id, pattern, timestamp) VALUES (?1, ?2, ?3)",
            params![session_id, finding.pattern, timestamp],
        )?;
        debug!(
            "recorded pattern (pattern={}, session_id={session_id})",
            finding.pattern
        );
        Ok(())
    }

    fn append_outcome(&self, outcome: &OutcomeRecord) -> Result<(), StorageError> {
        let metrics = serde_json::to_string(&outcome.metrics)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO outcome_nodes (id, solution_id, success, metrics, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                outcome.id,
                outcome.solution_id,
                outcome.success,
                metrics,
                outcome.created_at,
            ],
        )?;
        Ok(())
    }

    fn outcomes(&self, solution_id: &str) -> Result<Vec<OutcomeRecord>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, solution_id, success, metrics, created_at
             FROM outcome_nodes
             WHERE solution_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![solution_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
            ))
        })?;
        let mut outcomes = Vec::new();
        for row in rows {
            let (id, solution_id, success, metrics, created_at) = row?;
            outcomes.push(OutcomeRecord {
                id,
                solution_id,
                success,
                metrics: serde_json::from_str(&metrics)?,
                created_at,
            });
        }
        Ok(outcomes)
    }

    fn session_metrics(&self, session_id: &str) -> Result<SolutionMetrics, StorageError> {
        let conn = self.conn.lock();
        let (solution_count, avg_confidence) = conn.query_row(
            "SELECT COUNT(*), COALESCE(AVG(confidence), 0.0) FROM (
                 SELECT DISTINCT s.id AS id, s.confidence AS confidence
                 FROM solution_nodes s
                 JOIN solved_by sb ON sb.solution_id = s.id
                 JOIN event_nodes e ON e.id = sb.event_id
                 WHERE e.session_id = ?1
             )",
            params![session_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
        )?;
        let successful = conn.query_row(
            "SELECT COUNT(*) FROM outcome_nodes
             WHERE success = 1 AND solution_id IN (
                 SELECT DISTINCT sb.solution_id
                 FROM solved_by sb
                 JOIN event_nodes e ON e.id = sb.event_id
                 WHERE e.session_id = ?1
             )",
            params![session_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(SolutionMetrics {
            solution_count: solution_count as u64,
            avg_confidence,
            successful_solutions: successful as u64,
        })
    }

    fn session_patterns(&self, session_id: &str) -> Result<BTreeMap<String, u64>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT p.kind, p.name, COUNT(*)
             FROM exhibits x
             JOIN pattern_nodes p ON p.name = x.pattern
             WHERE x.session_id = ?1
             GROUP BY p.kind, p.name",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut patterns = BTreeMap::new();
        for row in rows {
            let (kind, name, count) = row?;
            patterns.insert(format!("{kind}:{name}"), count as u64);
        }
        Ok(patterns)
    }
}
