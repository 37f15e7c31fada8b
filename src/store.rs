//! Record-oriented access to the backing database.
//!
//! Everything above this module talks to a [`Store`]: rows are JSON objects keyed by column
//! name, addressed by table name plus a filter. Each call is atomic on its own; there are
//! no transactions spanning calls.

use std::sync::OnceLock;

use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::{Map, Number, Value};

use crate::error::{HydroError, Result};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// Conjunction of clauses. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::all().and(column, value)
    }

    pub fn id(id: i64) -> Self {
        Self::eq("id", id)
    }

    /// `column IN (values)`. An empty list matches nothing.
    pub fn any_of<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self { clauses: vec![Clause::In(column.to_string(), values)] }
    }

    pub fn and(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(column.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self { column: column.to_string(), descending: false }
    }

    pub fn desc(column: &str) -> Self {
        Self { column: column.to_string(), descending: true }
    }
}

pub trait Store {
    fn select(&self, table: &str, filter: &Filter, order: &[Order]) -> Result<Vec<Row>>;

    /// Inserts every row and returns them as stored, ids included.
    fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<Row>>;

    /// Returns the number of rows changed.
    fn update(&self, table: &str, patch: &Row, filter: &Filter) -> Result<usize>;

    fn delete(&self, table: &str, filter: &Filter) -> Result<usize>;

    fn find_by_id(&self, table: &str, id: i64) -> Result<Option<Row>> {
        Ok(self.select(table, &Filter::id(id), &[])?.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn identifier(name: &str) -> Result<&str> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
    if re.is_match(name) {
        Ok(name)
    } else {
        Err(HydroError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

/// Renders ` WHERE a = ?N AND ...`, continuing the placeholder numbering of `params`.
fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filter.clauses().len());
    for clause in filter.clauses() {
        match clause {
            Clause::Eq(column, value) => {
                let column = identifier(column)?;
                if value.is_null() {
                    parts.push(format!("{column} IS NULL"));
                } else {
                    params.push(to_sql(value));
                    parts.push(format!("{column} = ?{}", params.len()));
                }
            }
            Clause::In(column, values) => {
                let column = identifier(column)?;
                if values.is_empty() {
                    parts.push("0".to_string());
                    continue;
                }
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    params.push(to_sql(value));
                    placeholders.push(format!("?{}", params.len()));
                }
                parts.push(format!("{column} IN ({})", placeholders.join(", ")));
            }
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

impl SqliteStore {
    fn query_rows(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), from_sql(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }
}

impl Store for SqliteStore {
    fn select(&self, table: &str, filter: &Filter, order: &[Order]) -> Result<Vec<Row>> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", identifier(table)?);
        sql.push_str(&where_clause(filter, &mut params)?);
        if !order.is_empty() {
            let terms = order
                .iter()
                .map(|o| {
                    identifier(&o.column)
                        .map(|c| format!("{c} {}", if o.descending { "DESC" } else { "ASC" }))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }
        self.query_rows(&sql, params)
    }

    fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<Row>> {
        let table = identifier(table)?;
        // Rolled back on drop if any row fails.
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let sql = if row.is_empty() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                let columns = row
                    .keys()
                    .map(|k| identifier(k))
                    .collect::<Result<Vec<_>>>()?;
                let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
                format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    columns.join(", "),
                    placeholders.join(", ")
                )
            };
            let params: Vec<SqlValue> = row.values().map(to_sql).collect();
            tx.execute(&sql, rusqlite::params_from_iter(params))?;
            let id = tx.last_insert_rowid();
            if let Some(stored) = self.find_by_id(table, id)? {
                inserted.push(stored);
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn update(&self, table: &str, patch: &Row, filter: &Filter) -> Result<usize> {
        if patch.is_empty() {
            return Ok(0);
        }
        let table = identifier(table)?;
        let mut params: Vec<SqlValue> = Vec::new();
        let mut sets = Vec::with_capacity(patch.len());
        for (i, (column, value)) in patch.iter().enumerate() {
            sets.push(format!("{} = ?{}", identifier(column)?, i + 1));
            params.push(to_sql(value));
        }
        let clause = where_clause(filter, &mut params)?;
        let sql = format!("UPDATE {table} SET {}{clause}", sets.join(", "));
        Ok(self.conn.execute(&sql, rusqlite::params_from_iter(params))?)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<usize> {
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            identifier(table)?,
            where_clause(filter, &mut params)?
        );
        Ok(self.conn.execute(&sql, rusqlite::params_from_iter(params))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use serde_json::json;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, SqliteStore::new(conn))
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn bid(number: &str, status: &str) -> Row {
        row(json!({"bid_number": number, "project_name": "Deck", "status": status}))
    }

    #[test]
    fn test_insert_returns_stored_rows_with_ids() {
        let (_dir, store) = test_store();
        let inserted = store
            .insert("bids", &[bid("B-1", "draft"), bid("B-2", "won")])
            .unwrap();
        assert_eq!(inserted.len(), 2);
        assert!(inserted[0]["id"].as_i64().is_some());
        assert_eq!(inserted[1]["bid_number"], json!("B-2"));
        assert_eq!(inserted[0]["client_name"], json!(""));
    }

    #[test]
    fn test_select_filters_and_orders() {
        let (_dir, store) = test_store();
        store
            .insert("bids", &[bid("B-1", "draft"), bid("B-2", "won"), bid("B-3", "draft")])
            .unwrap();
        let drafts = store
            .select("bids", &Filter::eq("status", "draft"), &[Order::desc("id")])
            .unwrap();
        let numbers: Vec<&str> = drafts.iter().map(|r| r["bid_number"].as_str().unwrap()).collect();
        assert_eq!(numbers, vec!["B-3", "B-1"]);
    }

    #[test]
    fn test_null_filter_matches_is_null() {
        let (_dir, store) = test_store();
        store.insert("bids", &[bid("B-1", "draft")]).unwrap();
        let rows = store
            .select("bids", &Filter::eq("location", Value::Null).and("status", "draft"), &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_update_patches_matching_rows_only() {
        let (_dir, store) = test_store();
        let inserted = store.insert("bids", &[bid("B-1", "draft"), bid("B-2", "draft")]).unwrap();
        let id = inserted[0]["id"].as_i64().unwrap();
        let changed = store
            .update("bids", &row(json!({"status": "submitted"})), &Filter::id(id))
            .unwrap();
        assert_eq!(changed, 1);
        let stored = store.find_by_id("bids", id).unwrap().unwrap();
        assert_eq!(stored["status"], json!("submitted"));
        let other = store.select("bids", &Filter::eq("bid_number", "B-2"), &[]).unwrap();
        assert_eq!(other[0]["status"], json!("draft"));
    }

    #[test]
    fn test_update_surfaces_constraint_errors() {
        let (_dir, store) = test_store();
        store.insert("bids", &[bid("B-1", "draft")]).unwrap();
        let err = store.update("bids", &row(json!({"status": "archived"})), &Filter::all());
        assert!(matches!(err, Err(HydroError::Db(_))));
    }

    #[test]
    fn test_failed_insert_leaves_no_rows_behind() {
        let (_dir, store) = test_store();
        let err = store.insert("bids", &[bid("B-1", "draft"), bid("B-2", "archived")]);
        assert!(matches!(err, Err(HydroError::Db(_))));
        assert!(store.select("bids", &Filter::all(), &[]).unwrap().is_empty());

        // The connection is usable again afterwards.
        store.insert("bids", &[bid("B-3", "draft")]).unwrap();
        assert_eq!(store.select("bids", &Filter::all(), &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_any_of_filter() {
        let (_dir, store) = test_store();
        let inserted = store
            .insert("bids", &[bid("B-1", "draft"), bid("B-2", "draft"), bid("B-3", "draft")])
            .unwrap();
        let ids: Vec<i64> = inserted.iter().filter_map(|r| r["id"].as_i64()).collect();
        let changed = store
            .update(
                "bids",
                &row(json!({"status": "won"})),
                &Filter::any_of("id", [ids[0], ids[2]]),
            )
            .unwrap();
        assert_eq!(changed, 2);
        let won = store.select("bids", &Filter::eq("status", "won"), &[Order::asc("id")]).unwrap();
        assert_eq!(won[0]["bid_number"], json!("B-1"));
        assert_eq!(won[1]["bid_number"], json!("B-3"));

        let none = store.select("bids", &Filter::any_of("id", Vec::<i64>::new()), &[]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = test_store();
        store.insert("bids", &[bid("B-1", "draft"), bid("B-2", "lost")]).unwrap();
        assert_eq!(store.delete("bids", &Filter::eq("status", "lost")).unwrap(), 1);
        assert_eq!(store.select("bids", &Filter::all(), &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let (_dir, store) = test_store();
        let err = store.select("bids; DROP TABLE bids", &Filter::all(), &[]);
        assert!(matches!(err, Err(HydroError::InvalidIdentifier(_))));
        let err = store.select("bids", &Filter::eq("status = 'x' OR 1", 1), &[]);
        assert!(matches!(err, Err(HydroError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_reals_round_trip() {
        let (_dir, store) = test_store();
        let mut r = bid("B-1", "draft");
        r.insert("estimated_value".into(), json!(1000.5));
        let inserted = store.insert("bids", &[r]).unwrap();
        assert_eq!(inserted[0]["estimated_value"], json!(1000.5));
    }
}
