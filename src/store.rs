//! Structured data collaborator — the relational side of retrieval.
//!
//! The query agent never touches a connection directly; it sees this
//! trait: a table whitelist, a schema description for prompt
//! construction, and a guarded execute. The SQLite implementation
//! enforces the whitelist and a SELECT-only rule deterministically,
//! before any statement reaches the database.

use std::collections::HashSet;
use std::sync::Mutex;

use rusqlite::Connection;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Table not allowed: {table}")]
    DisallowedTable { table: String },

    #[error("Only SELECT statements are allowed")]
    NotSelect,

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Contract consumed by the structured query agent.
pub trait StructuredStore: Send + Sync {
    /// Tables the agent may reference.
    fn allowed_tables(&self) -> &[String];

    /// Schema text for the SQL-generation prompt. Identity columns are
    /// withheld here so generated queries are never invited to select
    /// them (the prompt-level privacy policy is the outer layer).
    fn describe_schema(&self) -> String;

    /// Execute a SELECT and return the rows as a JSON array of arrays
    /// (`[]` when no rows matched).
    fn execute_query(&self, sql: &str) -> Result<String, StoreError>;
}

/// Columns never advertised in the schema description, per table.
const WITHHELD_COLUMNS: &[(&str, &[&str])] = &[("employees", &["name", "email"])];

pub struct SqliteStore {
    conn: Mutex<Connection>,
    allowed: Vec<String>,
}

impl SqliteStore {
    /// Wrap a connection with the default whitelist: every knowledge-base
    /// table, including `employees` (whose identity columns stay hidden).
    pub fn new(conn: Connection) -> Self {
        Self::with_allowed_tables(
            conn,
            [
                "projects",
                "roles",
                "applications",
                "entitlements",
                "employees",
                "app_entitlement_mappings",
                "employee_project_assignments",
                "employee_entitlement_holdings",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }

    pub fn with_allowed_tables(conn: Connection, allowed: Vec<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            allowed,
        }
    }

    fn withheld_for(table: &str) -> &'static [&'static str] {
        WITHHELD_COLUMNS
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, cols)| *cols)
            .unwrap_or(&[])
    }
}

impl StructuredStore for SqliteStore {
    fn allowed_tables(&self) -> &[String] {
        &self.allowed
    }

    fn describe_schema(&self) -> String {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => return String::new(),
        };

        let mut lines = Vec::new();
        for table in &self.allowed {
            let withheld = Self::withheld_for(table);
            let mut columns = Vec::new();

            let stmt = conn.prepare(&format!("PRAGMA table_info({table})"));
            let Ok(mut stmt) = stmt else { continue };
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            });
            let Ok(rows) = rows else { continue };

            for row in rows.flatten() {
                let (name, col_type) = row;
                if withheld.contains(&name.as_str()) {
                    continue;
                }
                columns.push(format!("{name} {col_type}"));
            }

            if !columns.is_empty() {
                lines.push(format!("{table} ({})", columns.join(", ")));
            }
        }
        lines.join("\n")
    }

    fn execute_query(&self, sql: &str) -> Result<String, StoreError> {
        check_select_only(sql)?;
        check_table_whitelist(sql, &self.allowed)?;

        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::Execution(e.to_string()))?;
        let column_count = stmt.column_count();

        let mut rows = stmt
            .query([])
            .map_err(|e| StoreError::Execution(e.to_string()))?;

        let mut out: Vec<Vec<Value>> = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(StoreError::Execution(e.to_string())),
            };
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(value_to_json(row.get_ref(idx)));
            }
            out.push(values);
        }

        serde_json::to_string(&out).map_err(|e| StoreError::Execution(e.to_string()))
    }
}

fn value_to_json(value: Result<rusqlite::types::ValueRef<'_>, rusqlite::Error>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Integer(i)) => Value::from(i),
        Ok(ValueRef::Real(f)) => Value::from(f),
        Ok(ValueRef::Text(t)) => Value::from(String::from_utf8_lossy(t).into_owned()),
        Ok(ValueRef::Blob(_)) => Value::from("<blob>"),
        Err(_) => Value::Null,
    }
}

fn check_select_only(sql: &str) -> Result<(), StoreError> {
    let head = sql.trim_start().to_lowercase();
    if head.starts_with("select") || head.starts_with("with") {
        Ok(())
    } else {
        Err(StoreError::NotSelect)
    }
}

/// Every identifier following FROM or JOIN must be whitelisted.
fn check_table_whitelist(sql: &str, allowed: &[String]) -> Result<(), StoreError> {
    let allowed: HashSet<String> = allowed.iter().map(|t| t.to_lowercase()).collect();
    let lower = sql.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')' || c == ';')
        .filter(|t| !t.is_empty())
        .collect();

    for window in tokens.windows(2) {
        if window[0] == "from" || window[0] == "join" {
            let table = window[1].trim_matches(|c: char| c == '"' || c == '`' || c == '\'');
            if !allowed.contains(table) {
                return Err(StoreError::DisallowedTable {
                    table: table.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Application, Employee, Entitlement};

    fn seeded_store() -> SqliteStore {
        let conn = open_memory_database().unwrap();
        repository::insert_application(
            &conn,
            &Application {
                id: 1,
                name: "Payments Portal".into(),
                description: None,
            },
        )
        .unwrap();
        repository::insert_entitlement(
            &conn,
            &Entitlement {
                id: 1,
                code: "APP001_READ".into(),
                description: "Grants permission to view data within the Payments Portal.".into(),
            },
        )
        .unwrap();
        repository::insert_employee(
            &conn,
            &Employee {
                id: 1,
                name: "Dana Whitfield".into(),
                email: "dana.whitfield@example.com".into(),
                role_id: None,
            },
        )
        .unwrap();
        SqliteStore::new(conn)
    }

    #[test]
    fn executes_select_as_json_rows() {
        let store = seeded_store();
        let result = store
            .execute_query("SELECT code, description FROM entitlements")
            .unwrap();
        assert!(result.contains("APP001_READ"));
        assert!(result.starts_with('['));
    }

    #[test]
    fn empty_result_is_empty_json_array() {
        let store = seeded_store();
        let result = store
            .execute_query("SELECT code FROM entitlements WHERE code = 'NOPE'")
            .unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn rejects_non_select() {
        let store = seeded_store();
        let err = store.execute_query("DELETE FROM entitlements").unwrap_err();
        assert!(matches!(err, StoreError::NotSelect));
    }

    #[test]
    fn rejects_unlisted_table() {
        let store = seeded_store();
        let err = store
            .execute_query("SELECT * FROM sqlite_master")
            .unwrap_err();
        assert!(matches!(err, StoreError::DisallowedTable { .. }));
    }

    #[test]
    fn rejects_unlisted_join_target() {
        let store = seeded_store();
        let err = store
            .execute_query("SELECT e.code FROM entitlements e JOIN entitlement_vectors v ON 1=1")
            .unwrap_err();
        assert!(matches!(err, StoreError::DisallowedTable { .. }));
    }

    #[test]
    fn execution_error_is_typed() {
        let store = seeded_store();
        let err = store
            .execute_query("SELECT no_such_column FROM entitlements")
            .unwrap_err();
        assert!(matches!(err, StoreError::Execution(_)));
    }

    #[test]
    fn schema_description_withholds_identity_columns() {
        let store = seeded_store();
        let schema = store.describe_schema();
        assert!(schema.contains("entitlements (id INTEGER, code TEXT, description TEXT)"));
        assert!(schema.contains("employees"));
        assert!(!schema.contains("email"));
        assert!(
            !schema.contains("employees (id INTEGER, name"),
            "identity columns must not be advertised"
        );
    }
}
