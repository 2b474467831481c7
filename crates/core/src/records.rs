// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity descriptors for the table store.
//!
//! Every persisted model implements [`Entity`]: a table name, a
//! [`StoreSchema`] naming the key fields and the computed fields that must
//! never be written, and access to the store-maintained row metadata
//! (etag + timestamp). The typed store in `of-storage` is written entirely
//! against this trait.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Static description of how an entity maps onto a table row.
#[derive(Debug, Clone, Copy)]
pub struct StoreSchema {
    /// Field whose string form is the partition key.
    pub partition_field: &'static str,
    /// Field whose string form is the row key. `None` means the partition
    /// key doubles as the row key (singleton-per-partition entities).
    pub row_field: Option<&'static str>,
    /// Computed-in-memory fields stripped before every write.
    pub exclude_from_write: &'static [&'static str],
}

impl StoreSchema {
    pub const fn keyed(partition_field: &'static str, row_field: &'static str) -> Self {
        Self { partition_field, row_field: Some(row_field), exclude_from_write: &[] }
    }

    pub const fn partition_only(partition_field: &'static str) -> Self {
        Self { partition_field, row_field: None, exclude_from_write: &[] }
    }

    pub const fn exclude(mut self, fields: &'static [&'static str]) -> Self {
        self.exclude_from_write = fields;
        self
    }
}

/// Store-maintained row metadata. Never serialized with the entity body;
/// the store populates it on load and refreshes the etag on every write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMeta {
    pub etag: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A model persisted in the entity store.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    fn schema() -> StoreSchema;

    fn meta(&self) -> &RowMeta;

    fn meta_mut(&mut self) -> &mut RowMeta;
}
