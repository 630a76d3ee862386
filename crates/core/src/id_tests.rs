// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn new_ids_carry_prefix_and_fit_inline() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), 23);
}

#[test]
fn new_ids_are_unique() {
    let ids: HashSet<_> = (0..100).map(|_| TestId::new()).collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn serde_is_transparent() {
    let id = TestId::from_string("tst-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"tst-xyz\"");
    let parsed: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, "tst-xyz");
}
