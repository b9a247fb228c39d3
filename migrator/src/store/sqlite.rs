//! SQLite-backed document store.
//!
//! Each collection is a table `(_id TEXT PRIMARY KEY, doc TEXT)` holding the
//! JSON document. Filters and indexes address fields through
//! `json_extract(doc, '$.<field>')`, so an index over a filter's fields is
//! used by the lookup.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;

use super::{
    assign_id, check_collection, is_identifier, Document, DocumentStore, IndexSpec, SortOrder,
};
use crate::error::{StoreError, StoreResult};
use crate::models::RecordId;

/// Document store persisted in a single SQLite database file.
pub struct SqliteStore {
    conn: Connection,
    /// Tables known to exist, to skip repeated DDL
    created: HashSet<String>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    ///
    /// `timeout` bounds how long a call waits on a locked database.
    pub fn open(path: &Path, timeout: Duration) -> StoreResult<Self> {
        let address = path.display().to_string();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Connection {
                address: address.clone(),
                message: e.to_string(),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;
        Self::configure(conn, address, timeout)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let address = ":memory:".to_string();
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;
        Self::configure(conn, address, Duration::from_secs(5))
    }

    fn configure(conn: Connection, address: String, timeout: Duration) -> StoreResult<Self> {
        let connection_error = |e: rusqlite::Error| StoreError::Connection {
            address: address.clone(),
            message: e.to_string(),
        };
        conn.busy_timeout(timeout).map_err(connection_error)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(connection_error)?;

        tracing::debug!(%address, "store opened");
        Ok(Self {
            conn,
            created: HashSet::new(),
        })
    }

    /// Names of the indexes defined on a collection.
    pub fn index_names(&self, collection: &str) -> StoreResult<Vec<String>> {
        check_collection(collection)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL
                 ORDER BY name",
            )
            .map_err(|e| StoreError::query(collection, e))?;
        let names = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::query(collection, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::query(collection, e))?;
        Ok(names)
    }

    fn table_exists(&self, collection: &str) -> StoreResult<bool> {
        if self.created.contains(collection) {
            return Ok(true);
        }
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::query(collection, e))?;
        Ok(count > 0)
    }

    fn ensure_collection(&mut self, collection: &str) -> StoreResult<()> {
        check_collection(collection)?;
        if self.created.contains(collection) {
            return Ok(());
        }
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{collection}\" (
                    _id TEXT PRIMARY KEY NOT NULL,
                    doc TEXT NOT NULL
                 );"
            ))
            .map_err(|e| StoreError::write(collection, e))?;
        self.created.insert(collection.to_string());
        Ok(())
    }
}

fn field_expr(collection: &str, field: &str) -> StoreResult<String> {
    if !is_identifier(field) {
        return Err(StoreError::query(
            collection,
            format!("invalid field name '{field}'"),
        ));
    }
    Ok(format!("json_extract(doc, '$.{field}')"))
}

/// Bind a JSON scalar the way `json_extract` returns it.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

impl DocumentStore for SqliteStore {
    fn create_index(&mut self, collection: &str, index: &IndexSpec) -> StoreResult<()> {
        self.ensure_collection(collection)?;
        if !is_identifier(&index.name) || index.fields.is_empty() {
            return Err(StoreError::write(
                collection,
                format!("invalid index '{}'", index.name),
            ));
        }

        let mut columns = Vec::with_capacity(index.fields.len());
        for (field, order) in &index.fields {
            let direction = match order {
                SortOrder::Ascending => "ASC",
                SortOrder::Descending => "DESC",
            };
            columns.push(format!("{} {direction}", field_expr(collection, field)?));
        }

        let sql = format!(
            "CREATE INDEX IF NOT EXISTS \"{collection}_{name}\" ON \"{collection}\" ({columns})",
            name = index.name,
            columns = columns.join(", ")
        );
        self.conn
            .execute_batch(&sql)
            .map_err(|e| StoreError::write(collection, e))?;
        tracing::debug!(collection, index = %index.name, "index ensured");
        Ok(())
    }

    fn find_one(&self, collection: &str, filter: &Document) -> StoreResult<Option<Document>> {
        check_collection(collection)?;
        if !self.table_exists(collection)? {
            return Ok(None);
        }

        let mut clauses = Vec::with_capacity(filter.len());
        let mut values = Vec::with_capacity(filter.len());
        for (i, (field, value)) in filter.iter().enumerate() {
            // IS compares NULLs as equal, matching null and absent fields alike
            clauses.push(format!("{} IS ?{}", field_expr(collection, field)?, i + 1));
            values.push(sql_value(value));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT doc FROM \"{collection}\"{where_clause} LIMIT 1");

        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| StoreError::query(collection, e))?;
        let result = stmt.query_row(params_from_iter(values.iter()), |row| {
            row.get::<_, String>(0)
        });

        match result {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::query(collection, e)),
        }
    }

    fn insert_one(&mut self, collection: &str, mut document: Document) -> StoreResult<RecordId> {
        self.ensure_collection(collection)?;
        let id = assign_id(&mut document);
        let body = serde_json::to_string(&document)?;

        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "INSERT INTO \"{collection}\" (_id, doc) VALUES (?1, ?2)"
            ))
            .map_err(|e| StoreError::write(collection, e))?;
        stmt.execute(params![id.to_string(), body])
            .map_err(|e| StoreError::write(collection, e))?;
        Ok(id)
    }

    fn count_documents(&self, collection: &str) -> StoreResult<u64> {
        check_collection(collection)?;
        if !self.table_exists(collection)? {
            return Ok(0);
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{collection}\""), [], |row| {
                row.get(0)
            })
            .map_err(|e| StoreError::query(collection, e))?;
        Ok(count.max(0) as u64)
    }

    fn drop_collection(&mut self, collection: &str) -> StoreResult<()> {
        check_collection(collection)?;
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS \"{collection}\""))
            .map_err(|e| StoreError::write(collection, e))?;
        self.created.remove(collection);
        Ok(())
    }
}
