// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! of-adapters: collaborator interfaces for the cloud and webhook
//! transport, with in-memory fakes behind `test-support`.

mod cloud;
mod webhook;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
mod fake_webhook;

pub use cloud::{
    CloudError, CloudProvider, ContainerSas, IpPair, ProvisioningState, VmInfo, VmParams,
    VmssInfo, VmssParams,
};
pub use webhook::{HttpWebhookSender, WebhookSender, DIGEST_HEADER};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCloud;
#[cfg(any(test, feature = "test-support"))]
pub use fake_webhook::{FakeWebhookSender, RecordedDelivery};
