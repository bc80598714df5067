// 🗄️ SQLite Record Store - The external data source behind the pipeline
//
// Orders and their lines live in two tables. Imports are idempotent:
// every order carries a SHA-256 hash of its identifying fields and a second
// import of the same order is skipped as a duplicate.
//
// Rows are validated on the way out, so the analytics core only ever sees
// records with the declared shape.

use crate::record::{LineItem, OrderStatus, RecordQuery, RecordSource, TransactionRecord};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Storage format for timestamps; `%.f` keeps sub-second precision and
/// writes nothing for whole seconds
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (no-op for in-memory databases)
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            order_ref TEXT NOT NULL,
            timestamp TEXT,
            amount REAL NOT NULL,
            status TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            customer_name TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS order_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            product_name TEXT,
            quantity REAL NOT NULL,
            line_revenue REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_orders_timestamp ON orders(timestamp)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lines_order ON order_lines(order_id, position)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// IMPORT
// ============================================================================

/// Hash for duplicate detection on import
pub fn compute_idempotency_hash(record: &TransactionRecord) -> String {
    let timestamp = record
        .timestamp
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        record.order_ref, record.customer_id, timestamp, record.amount
    ));
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Insert records (and their lines) in one SQLite transaction.
///
/// Each record is validated first; a malformed record aborts the whole import.
pub fn insert_records(conn: &mut Connection, records: &[TransactionRecord]) -> Result<ImportSummary> {
    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();

    for record in records {
        record.validate()?;
        let hash = compute_idempotency_hash(record);
        let timestamp = record.timestamp.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string());

        let result = tx.execute(
            "INSERT INTO orders (
                idempotency_hash, order_ref, timestamp, amount, status, customer_id, customer_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                hash,
                record.order_ref,
                timestamp,
                record.amount,
                record.status.as_raw(),
                record.customer_id,
                record.customer_name,
            ],
        );

        match result {
            Ok(_) => {
                let order_id = tx.last_insert_rowid();
                for (position, line) in record.lines.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO order_lines (order_id, position, product_name, quantity, line_revenue)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            order_id,
                            position as i64,
                            line.product_name,
                            line.quantity,
                            line.line_revenue,
                        ],
                    )?;
                }
                summary.inserted += 1;
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                debug!(order_ref = %record.order_ref, "Skipping duplicate order");
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tx.commit()?;
    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "Imported orders"
    );
    Ok(summary)
}

// ============================================================================
// QUERIES
// ============================================================================

/// `WHERE` clause and bound arguments selecting the orders `query` asks for.
/// `None` when no order can match.
fn order_filter(query: &RecordQuery) -> Option<(String, Vec<String>)> {
    let mut clause = String::from("WHERE 1 = 1");
    let mut args: Vec<String> = Vec::new();

    if query.require_timestamp {
        clause.push_str(" AND timestamp IS NOT NULL");
    }
    if let Some(statuses) = &query.statuses {
        if statuses.is_empty() {
            return None;
        }
        let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{}", i)).collect();
        clause.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
        args.extend(statuses.iter().map(|s| s.as_raw().to_string()));
    }
    Some((clause, args))
}

/// Fetch records matching `query`, in insertion order, lines in position order
pub fn fetch_records(conn: &Connection, query: &RecordQuery) -> Result<Vec<TransactionRecord>> {
    let Some((clause, args)) = order_filter(query) else {
        return Ok(Vec::new());
    };

    let sql = format!(
        "SELECT id, order_ref, timestamp, amount, status, customer_id, customer_name
         FROM orders {} ORDER BY id",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut lines_by_order = load_lines(conn, &clause, &args)?;
    let mut records = Vec::with_capacity(rows.len());

    for (id, order_ref, timestamp, amount, status, customer_id, customer_name) in rows {
        let timestamp = match timestamp {
            Some(raw) => Some(
                NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
                    .with_context(|| format!("Order {} has unparseable timestamp {:?}", order_ref, raw))?,
            ),
            None => None,
        };

        let record = TransactionRecord {
            order_ref,
            timestamp,
            amount,
            status: OrderStatus::from_raw(&status),
            customer_id,
            customer_name,
            lines: lines_by_order.remove(&id).unwrap_or_default(),
        };
        record
            .validate()
            .context("Stored order failed validation")?;
        records.push(record);
    }

    // Stored statuses are raw strings; re-check with the typed filter
    records.retain(|r| query.matches(r));

    debug!(records = records.len(), "Fetched orders");
    Ok(records)
}

/// Lines of the orders selected by `clause`, grouped by order id
fn load_lines(
    conn: &Connection,
    clause: &str,
    args: &[String],
) -> Result<HashMap<i64, Vec<LineItem>>> {
    let sql = format!(
        "SELECT order_id, product_name, quantity, line_revenue
         FROM order_lines
         WHERE order_id IN (SELECT id FROM orders {})
         ORDER BY order_id, position",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;

    let mut lines: HashMap<i64, Vec<LineItem>> = HashMap::new();
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            LineItem {
                product_name: row.get(1)?,
                quantity: row.get(2)?,
                line_revenue: row.get(3)?,
            },
        ))
    })?;

    for row in rows {
        let (order_id, line) = row?;
        lines.entry(order_id).or_default().push(line);
    }

    Ok(lines)
}

pub fn count_records(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// Shareable handle to a SQLite database implementing `RecordSource`
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))
    }

    pub fn insert(&self, records: &[TransactionRecord]) -> Result<ImportSummary> {
        let mut conn = self.lock()?;
        insert_records(&mut conn, records)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        count_records(&conn)
    }
}

impl RecordSource for SqliteStore {
    fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<TransactionRecord>> {
        let conn = self.lock()?;
        fetch_records(&conn, query)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::*;

    fn sample_records() -> Vec<TransactionRecord> {
        let mut a = create_test_record("SO001", Some(at(2025, 1, 10)), 150.0, OrderStatus::Confirmed, "ann");
        a.lines = vec![line(Some("Widget"), 2.0, 100.0), line(None, 1.0, 50.0)];
        let b = create_test_record("SO002", None, 80.0, OrderStatus::Draft, "bob");
        let c = create_test_record("SO003", Some(at(2025, 2, 3)), 40.0, OrderStatus::Locked, "cid");
        let d = create_test_record(
            "SO004",
            Some(at(2025, 2, 4)),
            10.0,
            OrderStatus::Other("on_hold".to_string()),
            "dan",
        );
        vec![a, b, c, d]
    }

    #[test]
    fn test_idempotency_import_twice() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let records = sample_records();

        let first = insert_records(&mut conn, &records).unwrap();
        let count1 = count_records(&conn).unwrap();
        let second = insert_records(&mut conn, &records).unwrap();
        let count2 = count_records(&conn).unwrap();

        assert_eq!(first.inserted, 4);
        assert_eq!(count1, 4);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 4);
        assert_eq!(count2, 4);

        println!("✅ Idempotency test PASSED: 0 duplicates inserted on second import");
    }

    #[test]
    fn test_round_trip_preserves_lines_and_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records = sample_records();
        store.insert(&records).unwrap();

        let all = store.fetch_records(&RecordQuery::all()).unwrap();
        assert_eq!(all, records);
    }

    #[test]
    fn test_qualifying_query_filters_status_and_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&sample_records()).unwrap();

        let qualifying = store.fetch_records(&RecordQuery::qualifying()).unwrap();
        let refs: Vec<&str> = qualifying.iter().map(|r| r.order_ref.as_str()).collect();
        assert_eq!(refs, vec!["SO001", "SO003"]);
    }

    #[test]
    fn test_unknown_status_passes_through() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&sample_records()).unwrap();

        let all = store.fetch_records(&RecordQuery::all()).unwrap();
        assert_eq!(all[3].status, OrderStatus::Other("on_hold".to_string()));
    }

    #[test]
    fn test_invalid_record_aborts_import() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut records = sample_records();
        records[2].amount = -5.0;

        assert!(store.insert(&records).is_err());
        // Transaction rolled back
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_compute_idempotency_hash() {
        let record = &sample_records()[0];
        let hash1 = compute_idempotency_hash(record);
        let hash2 = compute_idempotency_hash(record);

        assert_eq!(hash1, hash2, "Same order should produce same hash");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");

        let mut other = record.clone();
        other.amount += 1.0;
        assert_ne!(hash1, compute_idempotency_hash(&other));
    }

    #[test]
    fn test_sub_second_timestamp_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = sample_records().remove(0);
        record.timestamp = chrono::NaiveDate::from_ymd_opt(2025, 3, 4)
            .and_then(|d| d.and_hms_milli_opt(9, 30, 15, 250));
        store.insert(std::slice::from_ref(&record)).unwrap();

        let all = store.fetch_records(&RecordQuery::all()).unwrap();
        assert_eq!(all, vec![record]);
    }

    #[test]
    fn test_lines_loaded_only_for_selected_orders() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut records = sample_records();
        records[1].lines = vec![line(Some("Draft item"), 1.0, 80.0)];
        insert_records(&mut conn, &records).unwrap();

        let (clause, args) = order_filter(&RecordQuery::qualifying()).unwrap();
        let lines = load_lines(&conn, &clause, &args).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[&1].len(), 2);

        let qualifying = fetch_records(&conn, &RecordQuery::qualifying()).unwrap();
        assert_eq!(qualifying[0].lines, records[0].lines);

        let (clause, args) = order_filter(&RecordQuery::all()).unwrap();
        assert_eq!(load_lines(&conn, &clause, &args).unwrap().len(), 2);
    }

    #[test]
    fn test_non_unique_constraint_is_not_a_duplicate() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER block_on_hold BEFORE INSERT ON orders
             WHEN NEW.status = 'on_hold'
             BEGIN SELECT RAISE(ABORT, 'on hold orders are blocked'); END;",
        )
        .unwrap();

        let result = insert_records(&mut conn, &sample_records());

        assert!(result.is_err());
        assert_eq!(count_records(&conn).unwrap(), 0);
    }

    #[test]
    fn test_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&sample_records()).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 4);
    }
}
