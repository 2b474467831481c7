// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory table backend.

use crate::table::{Query, RawRow, StoreError, TableBackend, WriteReceipt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use of_core::Clock;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

type Table = BTreeMap<(String, String), RawRow>;

/// Map-of-maps store. Rows are kept in `(partition_key, row_key)` order so
/// queries return deterministic results.
pub struct MemoryTables {
    now: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    tables: Mutex<BTreeMap<String, Table>>,
}

impl MemoryTables {
    pub fn new(clock: impl Clock) -> Self {
        Self {
            now: Arc::new(move || clock.now_utc()),
            tables: Mutex::new(BTreeMap::new()),
        }
    }

    fn fresh_etag() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl TableBackend for MemoryTables {
    async fn get(&self, table: &str, pk: &str, rk: &str) -> Result<Option<RawRow>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .get(table)
            .and_then(|t| t.get(&(pk.to_string(), rk.to_string())))
            .cloned())
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<RawRow>, StoreError> {
        let tables = self.tables.lock();
        let mut rows: Vec<RawRow> = tables
            .get(table)
            .map(|t| t.values().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: RawRow) -> Result<WriteReceipt, StoreError> {
        let mut tables = self.tables.lock();
        let table = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());
        if table.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        row.etag = Self::fresh_etag();
        row.timestamp = (self.now)();
        let receipt = WriteReceipt { etag: row.etag.clone(), timestamp: row.timestamp };
        table.insert(key, row);
        Ok(receipt)
    }

    async fn upsert(&self, table: &str, mut row: RawRow) -> Result<WriteReceipt, StoreError> {
        let mut tables = self.tables.lock();
        let table = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());
        row.etag = Self::fresh_etag();
        // Row timestamp is its age, so rewrites keep the original.
        row.timestamp = match table.get(&key) {
            Some(existing) => existing.timestamp,
            None => (self.now)(),
        };
        let receipt = WriteReceipt { etag: row.etag.clone(), timestamp: row.timestamp };
        table.insert(key, row);
        Ok(receipt)
    }

    async fn replace(
        &self,
        table: &str,
        mut row: RawRow,
        if_match: &str,
    ) -> Result<WriteReceipt, StoreError> {
        let mut tables = self.tables.lock();
        let table = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());
        match table.get(&key) {
            None => Err(StoreError::NotFound),
            Some(existing) if existing.etag != if_match => Err(StoreError::Conflict),
            Some(existing) => {
                row.etag = Self::fresh_etag();
                row.timestamp = existing.timestamp;
                let receipt =
                    WriteReceipt { etag: row.etag.clone(), timestamp: row.timestamp };
                table.insert(key, row);
                Ok(receipt)
            }
        }
    }

    async fn delete(&self, table: &str, pk: &str, rk: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if let Some(table) = tables.get_mut(table) {
            table.remove(&(pk.to_string(), rk.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
