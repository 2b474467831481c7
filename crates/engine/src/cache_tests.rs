// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for the TTL cache

use super::*;

#[test]
fn entries_expire_after_ttl() {
    let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(30), 16);
    let start = Instant::now();
    cache.put("k", 1, start);

    assert_eq!(cache.get(&"k", start), Some(1));
    assert_eq!(cache.get(&"k", start + Duration::from_secs(29)), Some(1));
    assert_eq!(cache.get(&"k", start + Duration::from_secs(30)), None);
}

#[test]
fn put_replaces_and_refreshes() {
    let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(30), 16);
    let start = Instant::now();
    cache.put("k", 1, start);
    cache.put("k", 2, start + Duration::from_secs(20));

    assert_eq!(cache.get(&"k", start + Duration::from_secs(40)), Some(2));
}

#[test]
fn invalidate_removes_entry() {
    let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(30), 16);
    let start = Instant::now();
    cache.put("k", 1, start);
    cache.invalidate(&"k");
    assert_eq!(cache.get(&"k", start), None);
}

#[test]
fn capacity_is_bounded() {
    let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(30), 2);
    let start = Instant::now();
    cache.put(1, 1, start);
    cache.put(2, 2, start);
    cache.put(3, 3, start);

    let mut live = 0;
    for key in [1, 2, 3] {
        if cache.get(&key, start).is_some() {
            live += 1;
        }
    }
    assert!(live <= 2);
    assert_eq!(cache.get(&3, start), Some(3));
}
