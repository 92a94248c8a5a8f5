//! SQLite implementation of the event store.
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Clip and aggregate on one thread, or open one store per thread.
//!
//! # Schema
//!
//! One row per coded occurrence. `occurrence` is the time in milliseconds
//! from the start of the observation; `type` is `STATE` or `POINT`;
//! `modifiers` is the joined modifier string (empty when none).

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use tb_core::{BehaviorCode, BehaviorType, EventFilter, EventStore, ObservationId, StoredEvent};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored row does not hold a valid value.
    #[error("invalid {column} in events table: {value:?}")]
    InvalidRow { column: &'static str, value: String },
}

/// Event store backed by SQLite.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens a database at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS events (
                observation TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                code TEXT NOT NULL,
                type TEXT NOT NULL,
                modifiers TEXT NOT NULL DEFAULT '',
                occurrence INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_observation ON events(observation);
            CREATE INDEX IF NOT EXISTS idx_events_stream
                ON events(observation, subject, code, modifiers, occurrence);
            ",
        )?;
        Ok(())
    }

    /// Removes every row.
    pub fn clear(&mut self) -> Result<usize, DbError> {
        Ok(self.conn.execute("DELETE FROM events", [])?)
    }
}

fn type_label(kind: BehaviorType) -> &'static str {
    match kind {
        BehaviorType::State => "STATE",
        BehaviorType::Point => "POINT",
    }
}

/// Builds a `WHERE` clause and its parameters from a filter.
fn where_clause(filter: &EventFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(observation) = &filter.observation {
        conditions.push("observation = ?");
        values.push(Value::Text(observation.to_string()));
    }
    if let Some(subject) = &filter.subject {
        conditions.push("subject = ?");
        values.push(Value::Text(subject.clone()));
    }
    if let Some(code) = &filter.code {
        conditions.push("code = ?");
        values.push(Value::Text(code.to_string()));
    }
    if let Some(kind) = filter.kind {
        conditions.push("type = ?");
        values.push(Value::Text(type_label(kind).to_string()));
    }
    if let Some(modifiers) = &filter.modifiers {
        conditions.push("modifiers = ?");
        values.push(Value::Text(modifiers.clone()));
    }
    if let Some(before_ms) = filter.before_ms {
        conditions.push("occurrence < ?");
        values.push(Value::Integer(before_ms));
    }
    if let Some(after_ms) = filter.after_ms {
        conditions.push("occurrence > ?");
        values.push(Value::Integer(after_ms));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }
}

type RawRow = (String, String, String, String, String, i64);

fn parse_row(
    (observation, subject, code, kind, modifiers, occurrence_ms): RawRow,
) -> Result<StoredEvent, DbError> {
    let invalid = |column: &'static str, value: &str| DbError::InvalidRow {
        column,
        value: value.to_string(),
    };
    Ok(StoredEvent {
        observation: ObservationId::new(observation.as_str())
            .map_err(|_| invalid("observation", &observation))?,
        subject,
        code: BehaviorCode::new(code.as_str()).map_err(|_| invalid("code", &code))?,
        kind: kind.parse().map_err(|_| invalid("type", &kind))?,
        modifiers,
        occurrence_ms,
    })
}

impl EventStore for SqliteStore {
    type Error = DbError;

    fn insert(&mut self, rows: &[StoredEvent]) -> Result<usize, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO events (observation, subject, code, type, modifiers, occurrence)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.observation.as_str(),
                    row.subject,
                    row.code.as_str(),
                    type_label(row.kind),
                    row.modifiers,
                    row.occurrence_ms,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn select(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, DbError> {
        let (clause, values) = where_clause(filter);
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT observation, subject, code, type, modifiers, occurrence
            FROM events
            {clause}
            ORDER BY observation, subject, code, modifiers, occurrence, rowid
            "
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(parse_row(row?)?);
        }
        Ok(events)
    }

    fn delete(&mut self, filter: &EventFilter) -> Result<usize, DbError> {
        let (clause, values) = where_clause(filter);
        let deleted = self
            .conn
            .execute(&format!("DELETE FROM events {clause}"), params_from_iter(values.iter()))?;
        tracing::trace!(deleted, "deleted events");
        Ok(deleted)
    }

    fn count(&self, filter: &EventFilter) -> Result<usize, DbError> {
        let (clause, values) = where_clause(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM events {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tb_core::{
        AnalysisWindow, BudgetParameters, Ethogram, EthogramEntry, Event, MemoryStore,
        WindowPolicy, behavior_records, clip_observation, load_observation,
    };

    fn code(s: &str) -> BehaviorCode {
        BehaviorCode::new(s).unwrap()
    }

    fn obs(id: &str) -> ObservationId {
        ObservationId::new(id).unwrap()
    }

    fn ethogram() -> Ethogram {
        Ethogram::from_entries([
            EthogramEntry::new(code("run"), BehaviorType::State),
            EthogramEntry::new(code("sniff"), BehaviorType::Point),
        ])
    }

    fn events() -> Vec<Event> {
        vec![
            Event::new(0, "mouse", code("run")).with_modifiers(["fast"]),
            Event::new(1_000, "mouse", code("sniff")),
            Event::new(4_000, "mouse", code("run")).with_modifiers(["fast"]),
            Event::new(5_000, "", code("run")),
            Event::new(12_000, "", code("run")),
        ]
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    #[test]
    fn open_in_memory_database() {
        assert!(SqliteStore::open_in_memory().is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let store = SqliteStore::open_in_memory().expect("open in-memory db");
        assert_eq!(
            table_columns(&store.conn, "events"),
            vec!["observation", "subject", "code", "type", "modifiers", "occurrence"]
        );

        let expected: HashSet<String> = ["idx_events_observation", "idx_events_stream"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(expected.is_subset(&index_names(&store.conn, "events")));
    }

    #[test]
    fn rows_roundtrip_in_store_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let inserted = load_observation(&mut store, &obs("o1"), &ethogram(), &events()).unwrap();
        assert_eq!(inserted, 5);

        let rows = store.select(&EventFilter::default()).unwrap();
        let order: Vec<_> = rows
            .iter()
            .map(|r| (r.subject.as_str(), r.code.as_str(), r.modifiers.as_str(), r.occurrence_ms))
            .collect();
        assert_eq!(
            order,
            vec![
                ("", "run", "", 5_000),
                ("", "run", "", 12_000),
                ("mouse", "run", "fast", 0),
                ("mouse", "run", "fast", 4_000),
                ("mouse", "sniff", "", 1_000),
            ]
        );
        assert_eq!(rows[4].kind, BehaviorType::Point);
    }

    #[test]
    fn filters_translate_to_sql() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        load_observation(&mut store, &obs("o1"), &ethogram(), &events()).unwrap();
        load_observation(&mut store, &obs("o2"), &ethogram(), &events()).unwrap();

        let filter = EventFilter::observation(&obs("o2"))
            .kind(BehaviorType::State)
            .after(1_000);
        assert_eq!(store.count(&filter).unwrap(), 3);
        assert_eq!(store.count(&EventFilter::default().before(1_000)).unwrap(), 2);

        let deleted = store.delete(&EventFilter::observation(&obs("o1"))).unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(store.count(&EventFilter::default()).unwrap(), 5);
    }

    #[test]
    fn clip_on_sqlite_matches_memory() {
        let window = AnalysisWindow::new(2_000, 8_000, WindowPolicy::ArbitraryInterval).unwrap();

        let mut sqlite = SqliteStore::open_in_memory().unwrap();
        load_observation(&mut sqlite, &obs("o1"), &ethogram(), &events()).unwrap();
        let sqlite_summary = clip_observation(&mut sqlite, &obs("o1"), &window).unwrap();

        let mut memory = MemoryStore::new();
        load_observation(&mut memory, &obs("o1"), &ethogram(), &events()).unwrap();
        let memory_summary = clip_observation(&mut memory, &obs("o1"), &window).unwrap();

        assert_eq!(sqlite_summary, memory_summary);
        assert_eq!(
            sqlite.select(&EventFilter::default()).unwrap(),
            memory.select(&EventFilter::default()).unwrap()
        );

        let windows = [(obs("o1"), window)];
        let params = BudgetParameters::default();
        assert_eq!(
            behavior_records(&sqlite, &windows, &ethogram(), &params).unwrap(),
            behavior_records(&memory, &windows, &ethogram(), &params).unwrap()
        );
    }

    #[test]
    fn file_database_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            load_observation(&mut store, &obs("o1"), &ethogram(), &events()).unwrap();
        }
        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count(&EventFilter::default()).unwrap(), 5);
        assert_eq!(store.clear().unwrap(), 5);
    }
}
