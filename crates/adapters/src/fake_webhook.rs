// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable webhook sender for tests.

use crate::webhook::WebhookSender;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub url: String,
    pub body: String,
    pub digest: Option<String>,
}

/// Records every delivery; outcomes are scripted per call, defaulting to
/// success once the script runs out.
#[derive(Clone, Default)]
pub struct FakeWebhookSender {
    outcomes: Arc<Mutex<VecDeque<bool>>>,
    deliveries: Arc<Mutex<Vec<RecordedDelivery>>>,
}

impl FakeWebhookSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for upcoming deliveries, e.g. `[false, false, true]`
    /// for two failures then a success.
    pub fn script(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.outcomes.lock().extend(outcomes);
    }

    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().clone()
    }
}

#[async_trait]
impl WebhookSender for FakeWebhookSender {
    async fn deliver(&self, url: &str, body: &str, digest: Option<&str>) -> bool {
        self.deliveries.lock().push(RecordedDelivery {
            url: url.to_string(),
            body: body.to_string(),
            digest: digest.map(str::to_string),
        });
        self.outcomes.lock().pop_front().unwrap_or(true)
    }
}
