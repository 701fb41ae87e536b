//! Food card action ledger.

use super::{Assignments, Storage};
use crate::error::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cardactions(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    cardnumber TEXT NOT NULL,
    cardaction TEXT DEFAULT '',
    note TEXT DEFAULT ''
);
"#;

/// A stored card action (reload, spend, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardAction {
    pub id: i64,
    pub date: String,
    pub cardnumber: String,
    pub cardaction: String,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct NewCardAction {
    pub date: String,
    pub cardnumber: String,
    pub cardaction: String,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct CardActionUpdate {
    pub date: Option<String>,
    pub cardnumber: Option<String>,
    pub cardaction: Option<String>,
    pub note: Option<String>,
}

impl CardActionUpdate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.cardnumber.is_none()
            && self.cardaction.is_none()
            && self.note.is_none()
    }
}

/// Card action store.
#[derive(Clone)]
pub struct CardActionStore {
    storage: Storage,
}

impl CardActionStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            storage: Storage::open(path, SCHEMA)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            storage: Storage::open_in_memory(SCHEMA)?,
        })
    }

    pub fn add(&self, action: &NewCardAction) -> Result<i64> {
        self.storage.with_connection(|conn| {
            conn.execute(
                "INSERT INTO cardactions(date, cardnumber, cardaction, note) VALUES (?1, ?2, ?3, ?4)",
                params![action.date, action.cardnumber, action.cardaction, action.note],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Actions dated within `[start, end]`, oldest id first.
    pub fn list(&self, start: &str, end: &str) -> Result<Vec<CardAction>> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, cardnumber, cardaction, note
                 FROM cardactions
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![start, end], card_action_from_row)?;
            let actions = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(actions)
        })
    }

    pub fn update(&self, id: i64, update: &CardActionUpdate) -> Result<bool> {
        let mut set = Assignments::default();
        set.set("date", update.date.clone().map(SqlValue::Text));
        set.set("cardnumber", update.cardnumber.clone().map(SqlValue::Text));
        set.set("cardaction", update.cardaction.clone().map(SqlValue::Text));
        set.set("note", update.note.clone().map(SqlValue::Text));

        self.storage
            .with_connection(|conn| set.apply(conn, "cardactions", id))
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        self.storage.with_connection(|conn| {
            let changed = conn.execute("DELETE FROM cardactions WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }
}

fn card_action_from_row(row: &Row<'_>) -> rusqlite::Result<CardAction> {
    Ok(CardAction {
        id: row.get(0)?,
        date: row.get(1)?,
        cardnumber: row.get(2)?,
        cardaction: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}
