// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! of-storage: entity store, queue service, and shrink queues.

mod memory;
mod memory_queue;
mod queue;
mod shrink;
mod store;
mod table;

pub use memory::MemoryTables;
pub use memory_queue::MemoryQueues;
pub use queue::{QueueBackend, QueueError, QueueMessage, QueueSas, Queues, Received, PEEK_MAX};
pub use shrink::{ShrinkEntry, ShrinkQueue};
pub use store::Store;
pub use table::{Query, RawRow, StoreError, TableBackend, TimeFilter, WriteReceipt,
    ROW_TIMESTAMP_FIELD};
