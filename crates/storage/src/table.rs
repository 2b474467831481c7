// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw table backend: partitioned rows with optimistic concurrency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry already exists")]
    AlreadyExists,
    #[error("etag mismatch, entity was advanced by another worker")]
    Conflict,
    #[error("row not found")]
    NotFound,
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("entity is missing key field '{0}'")]
    MissingKeyField(&'static str),
}

/// Receipt for a successful write: the fresh etag and the row timestamp
/// the backend recorded.
#[derive(Debug, Clone)]
pub struct WriteReceipt {
    pub etag: String,
    pub timestamp: DateTime<Utc>,
}

/// A row as stored: body fields plus store-maintained metadata.
/// Key fields remain present in `fields`, so loading is a plain
/// deserialization of the field map.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub partition_key: String,
    pub row_key: String,
    pub etag: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

/// Typed stand-in for the raw timestamp-filter escape hatch: an upper
/// bound on a datetime field. The reserved field name `timestamp`
/// addresses the store-maintained row timestamp.
#[derive(Debug, Clone)]
pub struct TimeFilter {
    pub field: String,
    pub before: DateTime<Utc>,
}

pub const ROW_TIMESTAMP_FIELD: &str = "timestamp";

/// A conjunction of `field ∈ {values}` predicates, optional `field ≠ value`
/// predicates, and an optional datetime upper bound.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub clauses: Vec<(String, Vec<Value>)>,
    pub exclusions: Vec<(String, Value)>,
    pub time: Option<TimeFilter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(self, field: impl Into<String>, value: impl serde::Serialize) -> Self {
        self.any(field, [value])
    }

    /// Require `field` to match one of `values`.
    pub fn any(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl serde::Serialize>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
            .collect();
        self.clauses.push((field.into(), values));
        self
    }

    /// Require `field != value`. Also matches rows missing the field.
    pub fn ne(mut self, field: impl Into<String>, value: impl serde::Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.exclusions.push((field.into(), value));
        self
    }

    /// Require the named datetime field (or the row timestamp) to be
    /// strictly before `when`. Rows missing the field never match.
    pub fn before(mut self, field: impl Into<String>, when: DateTime<Utc>) -> Self {
        self.time = Some(TimeFilter { field: field.into(), before: when });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate this query against a row.
    pub fn matches(&self, row: &RawRow) -> bool {
        for (field, values) in &self.clauses {
            match row.fields.get(field) {
                Some(actual) if values.contains(actual) => {}
                _ => return false,
            }
        }

        for (field, excluded) in &self.exclusions {
            if row.fields.get(field) == Some(excluded) {
                return false;
            }
        }

        if let Some(time) = &self.time {
            let actual = if time.field == ROW_TIMESTAMP_FIELD {
                Some(row.timestamp)
            } else {
                row.fields
                    .get(&time.field)
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            };
            match actual {
                Some(actual) if actual < time.before => {}
                _ => return false,
            }
        }

        true
    }
}

/// Object-safe raw row store. One implementation backs the whole service;
/// the in-memory variant in [`crate::memory`] is used for tests and
/// standalone mode.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn get(&self, table: &str, pk: &str, rk: &str) -> Result<Option<RawRow>, StoreError>;

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<RawRow>, StoreError>;

    /// Insert a new row. [`StoreError::AlreadyExists`] if the key is taken.
    async fn insert(&self, table: &str, row: RawRow) -> Result<WriteReceipt, StoreError>;

    /// Insert or replace without an etag check.
    async fn upsert(&self, table: &str, row: RawRow) -> Result<WriteReceipt, StoreError>;

    /// Replace an existing row iff its etag matches `if_match`.
    async fn replace(&self, table: &str, row: RawRow, if_match: &str)
        -> Result<WriteReceipt, StoreError>;

    /// Delete a row. Deleting a missing row is not an error.
    async fn delete(&self, table: &str, pk: &str, rk: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
