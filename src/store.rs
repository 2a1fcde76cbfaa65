use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// A row as exchanged with a record store: a flat JSON object.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Jobs,
    Activities,
    Contacts,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Jobs, Table::Activities, Table::Contacts];

    pub fn name(self) -> &'static str {
        match self {
            Table::Jobs => "Jobs",
            Table::Activities => "Activities",
            Table::Contacts => "Contacts",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store requires an access token")]
    Unauthorized,

    #[error("failed to read {table}: {reason}")]
    ReadFailed { table: Table, reason: String },

    #[error("failed to write {table}: {reason}")]
    WriteFailed { table: Table, reason: String },

    #[error("cannot update {table} without a record id")]
    MissingId { table: Table },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unexpected {table} row: {source}")]
    Decode {
        table: Table,
        #[source]
        source: serde_json::Error,
    },
}

/// A tabular collection store addressed by table name.
///
/// Every call carries the bearer token; an empty token must be rejected with
/// [`StoreError::Unauthorized`]. `select` filters on `user_id`.
pub trait RecordStore {
    fn select(&self, token: &str, table: Table, user_id: &str) -> Result<Vec<Row>, StoreError>;

    /// Inserts a row without an id; returns the stored row including its new id.
    fn insert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError>;

    /// Replaces the row with the same id, or creates it.
    fn upsert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError>;
}

pub(crate) fn require_token(token: &str) -> Result<(), StoreError> {
    if token.trim().is_empty() {
        return Err(StoreError::Unauthorized);
    }
    Ok(())
}
