// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery transport.

use async_trait::async_trait;

/// Header carrying the HMAC-SHA512 digest of the body when the webhook
/// has a secret token.
pub const DIGEST_HEADER: &str = "X-Onefuzz-Digest";

#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST the body to the URL. Returns true on a 2xx response; transport
    /// errors and non-success statuses are both failures.
    async fn deliver(&self, url: &str, body: &str, digest: Option<&str>) -> bool;
}

pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpWebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn deliver(&self, url: &str, body: &str, digest: Option<&str>) -> bool {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(digest) = digest {
            request = request.header(DIGEST_HEADER, digest);
        }
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::error!(url, %error, "webhook delivery failed");
                false
            }
        }
    }
}
