use crate::domain::models::HistoryEntry;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const HISTORY_KEY: &str = "intervalData";

/// Persisted list of work completions.
///
/// Reads never fail on bad data: anything that is not a JSON array of numeric
/// instants reads as an empty history. Errors are reserved for the backing
/// store itself being unavailable.
pub trait HistoryStore: Send + Sync {
    fn read_all(&self) -> Result<Vec<HistoryEntry>, InfraError>;
    fn write_all(&self, entries: &[HistoryEntry]) -> Result<(), InfraError>;
    /// Read-modify-write of the whole list, atomic with respect to other callers.
    fn append(&self, entry: HistoryEntry) -> Result<(), InfraError>;
}

pub fn encode_history(entries: &[HistoryEntry]) -> Result<String, InfraError> {
    Ok(serde_json::to_string(entries)?)
}

pub fn decode_history(raw: &str) -> Result<Vec<HistoryEntry>, InfraError> {
    let parsed: serde_json::Value = serde_json::from_str(raw)
        .map_err(|error| InfraError::MalformedHistory(format!("invalid JSON: {error}")))?;
    let items = parsed
        .as_array()
        .ok_or_else(|| InfraError::MalformedHistory("expected a JSON array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            parse_instant(item).ok_or_else(|| {
                InfraError::MalformedHistory(format!(
                    "entry {index} is not a numeric instant: {item}"
                ))
            })
        })
        .collect()
}

fn parse_instant(value: &serde_json::Value) -> Option<HistoryEntry> {
    let millis = match value {
        serde_json::Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| value.trunc() as i64)
        }),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    Some(HistoryEntry(millis))
}

fn decode_or_empty(raw: Option<&str>) -> Vec<HistoryEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match decode_history(raw) {
        Ok(entries) => entries,
        Err(error) => {
            log::warn!("treating persisted history as empty: {error}");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    db_path: PathBuf,
}

impl SqliteHistoryStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn read_raw(connection: &Connection) -> Result<Option<String>, InfraError> {
        let raw = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![HISTORY_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw)
    }

    fn write_raw(connection: &Connection, raw: &str) -> Result<(), InfraError> {
        connection.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![HISTORY_KEY, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn write_raw_value(&self, raw: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        Self::write_raw(&connection, raw)
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn read_all(&self) -> Result<Vec<HistoryEntry>, InfraError> {
        let connection = self.connect()?;
        let raw = Self::read_raw(&connection)?;
        Ok(decode_or_empty(raw.as_deref()))
    }

    fn write_all(&self, entries: &[HistoryEntry]) -> Result<(), InfraError> {
        let connection = self.connect()?;
        Self::write_raw(&connection, &encode_history(entries)?)
    }

    fn append(&self, entry: HistoryEntry) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = Self::read_raw(&transaction)?;
        let mut entries = decode_or_empty(raw.as_deref());
        entries.push(entry);
        Self::write_raw(&transaction, &encode_history(&entries)?)?;
        transaction.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    raw: Mutex<Option<String>>,
}

impl InMemoryHistoryStore {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw_value(&self) -> Result<Option<String>, InfraError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<String>>, InfraError> {
        self.raw
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("history store lock poisoned: {error}")))
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn read_all(&self) -> Result<Vec<HistoryEntry>, InfraError> {
        let raw = self.lock()?;
        Ok(decode_or_empty(raw.as_deref()))
    }

    fn write_all(&self, entries: &[HistoryEntry]) -> Result<(), InfraError> {
        let encoded = encode_history(entries)?;
        *self.lock()? = Some(encoded);
        Ok(())
    }

    fn append(&self, entry: HistoryEntry) -> Result<(), InfraError> {
        let mut raw = self.lock()?;
        let mut entries = decode_or_empty(raw.as_deref());
        entries.push(entry);
        *raw = Some(encode_history(&entries)?);
        Ok(())
    }
}
