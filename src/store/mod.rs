//! SQLite-backed ledgers.

mod card_actions;
mod expenses;

pub use card_actions::{CardAction, CardActionStore, CardActionUpdate, NewCardAction};
pub use expenses::{CategoryTotal, Expense, ExpenseStore, ExpenseUpdate, NewExpense};

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A single SQLite connection shared behind a mutex.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Storage {
    /// Open or create a database file and apply `schema`.
    pub fn open(path: &Path, schema: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=30000;
            "#,
        )?;
        conn.execute_batch(schema)?;

        tracing::debug!("Opened database {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(schema: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file, if not in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Execute a function with the connection.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }
}

/// Collects `column = ?` assignments for a partial UPDATE.
#[derive(Default)]
pub(crate) struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl Assignments {
    pub(crate) fn set(&mut self, column: &'static str, value: Option<SqlValue>) {
        if let Some(value) = value {
            self.columns.push(column);
            self.values.push(value);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Run `UPDATE <table> SET ... WHERE id = ?`. Returns whether a row matched.
    pub(crate) fn apply(self, conn: &Connection, table: &str, id: i64) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        let set_clause = self
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, set_clause);

        let mut values = self.values;
        values.push(SqlValue::Integer(id));

        let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(changed > 0)
    }
}
