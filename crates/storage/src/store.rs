// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed entity store over a raw table backend.
//!
//! A single save path handles every entity kind through its
//! [`StoreSchema`]: serialize, strip the computed fields, resolve the key
//! fields to strings, and restore etag/timestamp metadata on load.

use crate::table::{Query, RawRow, StoreError, TableBackend};
use chrono::{DateTime, Utc};
use of_core::records::{Entity, RowMeta};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Render a key field's JSON value as a table key string.
fn resolve(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn TableBackend>,
}

impl Store {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend }
    }

    fn to_row<E: Entity>(entity: &E) -> Result<RawRow, StoreError> {
        let schema = E::schema();
        let mut fields: Map<String, Value> = match serde_json::to_value(entity)? {
            Value::Object(map) => map,
            other => {
                return Err(serde_json::Error::io(std::io::Error::other(format!(
                    "entity did not serialize to an object: {other}"
                )))
                .into())
            }
        };

        // Computed fields and nulls are never written.
        for excluded in schema.exclude_from_write {
            fields.remove(*excluded);
        }
        fields.retain(|_, value| !value.is_null());

        let partition_key = fields
            .get(schema.partition_field)
            .map(resolve)
            .ok_or(StoreError::MissingKeyField(schema.partition_field))?;
        let row_key = match schema.row_field {
            Some(row_field) => fields
                .get(row_field)
                .map(resolve)
                .ok_or(StoreError::MissingKeyField(row_field))?,
            None => partition_key.clone(),
        };

        Ok(RawRow {
            partition_key,
            row_key,
            etag: String::new(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            fields,
        })
    }

    fn from_row<E: Entity>(row: RawRow) -> Result<E, StoreError> {
        let mut entity: E = serde_json::from_value(Value::Object(row.fields))?;
        *entity.meta_mut() = RowMeta { etag: Some(row.etag), timestamp: Some(row.timestamp) };
        Ok(entity)
    }

    pub async fn get<E: Entity>(
        &self,
        pk: impl ToString,
        rk: Option<&str>,
    ) -> Result<Option<E>, StoreError> {
        let pk = pk.to_string();
        let rk = rk.map(str::to_string).unwrap_or_else(|| pk.clone());
        match self.backend.get(E::TABLE, &pk, &rk).await? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn search<E: Entity>(&self, query: Query) -> Result<Vec<E>, StoreError> {
        let rows = self.backend.query(E::TABLE, &query).await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    fn apply_receipt<E: Entity>(entity: &mut E, receipt: crate::table::WriteReceipt) {
        let meta = entity.meta_mut();
        meta.etag = Some(receipt.etag);
        // Keep the original row age: a rewrite does not make a row young
        // for age-based sweeps, only its first write does.
        meta.timestamp.get_or_insert(receipt.timestamp);
    }

    /// Insert a new row; fails with [`StoreError::AlreadyExists`] if the
    /// keys are taken. The entity's metadata is refreshed on success.
    pub async fn insert<E: Entity>(&self, entity: &mut E) -> Result<(), StoreError> {
        let row = Self::to_row(entity)?;
        let receipt = self.backend.insert(E::TABLE, row).await?;
        Self::apply_receipt(entity, receipt);
        Ok(())
    }

    /// Write the entity back. An entity loaded from the store carries its
    /// etag, so concurrent writers surface as [`StoreError::Conflict`];
    /// a freshly constructed entity upserts.
    pub async fn save<E: Entity>(&self, entity: &mut E) -> Result<(), StoreError> {
        let row = Self::to_row(entity)?;
        let receipt = match entity.meta().etag.clone() {
            Some(if_match) => self.backend.replace(E::TABLE, row, &if_match).await?,
            None => self.backend.upsert(E::TABLE, row).await?,
        };
        Self::apply_receipt(entity, receipt);
        Ok(())
    }

    /// Insert or replace regardless of etag. Used by idempotent upserts
    /// such as agent registration.
    pub async fn upsert<E: Entity>(&self, entity: &mut E) -> Result<(), StoreError> {
        let row = Self::to_row(entity)?;
        let receipt = self.backend.upsert(E::TABLE, row).await?;
        Self::apply_receipt(entity, receipt);
        Ok(())
    }

    /// Delete the entity's row. Deleting a missing row is not an error.
    pub async fn delete<E: Entity>(&self, entity: &E) -> Result<(), StoreError> {
        let row = Self::to_row(entity)?;
        self.backend.delete(E::TABLE, &row.partition_key, &row.row_key).await
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
