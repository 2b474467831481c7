// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for typed UUID identifiers

use super::*;

#[test]
fn ids_are_unique() {
    assert_ne!(TaskId::new(), TaskId::new());
}

#[test]
fn serde_is_transparent() {
    let id = ScalesetId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.0));
    let back: ScalesetId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn simple_form_has_no_hyphens() {
    let id = PoolId::new();
    let simple = id.simple();
    assert_eq!(simple.len(), 32);
    assert!(!simple.contains('-'));
}

#[test]
fn parses_from_hyphenated_string() {
    let id = JobId::new();
    let parsed: JobId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
}
