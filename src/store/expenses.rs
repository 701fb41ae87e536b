//! Expense ledger.

use super::{Assignments, Storage};
use crate::error::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS expenses(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    subcategory TEXT DEFAULT '',
    note TEXT DEFAULT ''
);
"#;

/// A stored expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub note: String,
}

/// Fields for a new expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub note: String,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub note: Option<String>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.note.is_none()
    }
}

/// Total spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_amount: f64,
}

/// Expense store.
#[derive(Clone)]
pub struct ExpenseStore {
    storage: Storage,
}

impl ExpenseStore {
    /// Open or create the expense database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(path, SCHEMA)?,
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            storage: Storage::open_in_memory(SCHEMA)?,
        })
    }

    /// Insert an expense and return its id.
    pub fn add(&self, expense: &NewExpense) -> Result<i64> {
        self.storage.with_connection(|conn| {
            conn.execute(
                "INSERT INTO expenses(date, amount, category, subcategory, note) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    expense.date,
                    expense.amount,
                    expense.category,
                    expense.subcategory,
                    expense.note
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Expenses dated within `[start, end]`, oldest id first.
    pub fn list(&self, start: &str, end: &str) -> Result<Vec<Expense>> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, amount, category, subcategory, note
                 FROM expenses
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![start, end], expense_from_row)?;
            let expenses = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(expenses)
        })
    }

    /// Per-category totals within `[start, end]`.
    ///
    /// An empty `category` is treated as no filter.
    pub fn summarize(
        &self,
        start: &str,
        end: &str,
        category: Option<&str>,
    ) -> Result<Vec<CategoryTotal>> {
        let category = category.filter(|c| !c.is_empty());

        self.storage.with_connection(|conn| {
            let mut sql = String::from(
                "SELECT category, SUM(amount) AS total_amount
                 FROM expenses
                 WHERE date BETWEEN ?1 AND ?2",
            );
            let mut values = vec![
                SqlValue::Text(start.to_string()),
                SqlValue::Text(end.to_string()),
            ];
            if let Some(category) = category {
                sql.push_str(" AND category = ?3");
                values.push(SqlValue::Text(category.to_string()));
            }
            sql.push_str(" GROUP BY category ORDER BY category ASC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(values), |row| {
                Ok(CategoryTotal {
                    category: row.get(0)?,
                    total_amount: row.get(1)?,
                })
            })?;
            let totals = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(totals)
        })
    }

    /// Apply a partial update. Returns false if no expense has `id`.
    pub fn update(&self, id: i64, update: &ExpenseUpdate) -> Result<bool> {
        let mut set = Assignments::default();
        set.set("date", update.date.clone().map(SqlValue::Text));
        set.set("amount", update.amount.map(SqlValue::Real));
        set.set("category", update.category.clone().map(SqlValue::Text));
        set.set("subcategory", update.subcategory.clone().map(SqlValue::Text));
        set.set("note", update.note.clone().map(SqlValue::Text));

        self.storage
            .with_connection(|conn| set.apply(conn, "expenses", id))
    }

    /// Delete an expense. Returns false if no expense has `id`.
    pub fn delete(&self, id: i64) -> Result<bool> {
        self.storage.with_connection(|conn| {
            let changed = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }
}

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        date: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        subcategory: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(date: &str, amount: f64, category: &str) -> NewExpense {
        NewExpense {
            date: date.to_string(),
            amount,
            category: category.to_string(),
            subcategory: String::new(),
            note: String::new(),
        }
    }

    fn seeded() -> ExpenseStore {
        let store = ExpenseStore::open_in_memory().unwrap();
        store.add(&expense("2025-09-30", 200.0, "Housing")).unwrap();
        store.add(&expense("2025-09-02", 12.5, "Food")).unwrap();
        store.add(&expense("2025-09-15", 7.5, "Food")).unwrap();
        store.add(&expense("2025-10-01", 99.0, "Food")).unwrap();
        store
    }

    #[test]
    fn test_add_returns_increasing_ids() {
        let store = ExpenseStore::open_in_memory().unwrap();
        let first = store.add(&expense("2025-09-30", 1.0, "A")).unwrap();
        let second = store.add(&expense("2025-09-30", 2.0, "B")).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_list_is_inclusive_and_ordered_by_id() {
        let store = seeded();
        let rows = store.list("2025-09-02", "2025-09-30").unwrap();

        let ids: Vec<i64> = rows.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(rows[0].category, "Housing");
        assert_eq!(rows[0].subcategory, "");
    }

    #[test]
    fn test_summarize_groups_by_category() {
        let store = seeded();
        let totals = store.summarize("2025-09-01", "2025-09-30", None).unwrap();

        assert_eq!(
            totals,
            vec![
                CategoryTotal {
                    category: "Food".to_string(),
                    total_amount: 20.0
                },
                CategoryTotal {
                    category: "Housing".to_string(),
                    total_amount: 200.0
                },
            ]
        );
    }

    #[test]
    fn test_summarize_with_category_filter() {
        let store = seeded();

        let food = store
            .summarize("2025-09-01", "2025-10-31", Some("Food"))
            .unwrap();
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].total_amount, 119.0);

        let unfiltered = store
            .summarize("2025-09-01", "2025-10-31", Some(""))
            .unwrap();
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn test_update_partial_fields() {
        let store = seeded();
        let update = ExpenseUpdate {
            amount: Some(250.0),
            note: Some("rent went up".to_string()),
            ..Default::default()
        };

        assert!(store.update(1, &update).unwrap());

        let rows = store.list("2025-09-30", "2025-09-30").unwrap();
        assert_eq!(rows[0].amount, 250.0);
        assert_eq!(rows[0].note, "rent went up");
        assert_eq!(rows[0].category, "Housing");
    }

    #[test]
    fn test_update_and_delete_missing_row() {
        let store = seeded();
        let update = ExpenseUpdate {
            amount: Some(1.0),
            ..Default::default()
        };

        assert!(!store.update(404, &update).unwrap());
        assert!(!store.delete(404).unwrap());
        assert!(ExpenseUpdate::default().is_empty());
    }

    #[test]
    fn test_delete_removes_row() {
        let store = seeded();
        assert!(store.delete(2).unwrap());

        let ids: Vec<i64> = store
            .list("2025-01-01", "2025-12-31")
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.db");

        {
            let store = ExpenseStore::open(&path).unwrap();
            store.add(&expense("2025-09-30", 200.0, "Housing")).unwrap();
        }

        let store = ExpenseStore::open(&path).unwrap();
        assert_eq!(store.list("2025-09-01", "2025-09-30").unwrap().len(), 1);
    }
}
