// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::*;

#[test]
fn matches_exact_and_suffixed_names() {
    let svc = ServiceDefinition::new("gh-worker", "img:1");

    assert!(svc.matches_container("gh-worker"));
    assert!(svc.matches_container("gh-worker-0"));
    assert!(svc.matches_container("gh-worker-blue"));
    assert!(!svc.matches_container("gh-workers"));
    assert!(!svc.matches_container("other"));
}

#[test]
fn defaults_carry_managed_label() {
    let svc = ServiceDefinition::new("app", "img:2");
    assert_eq!(svc.labels.get(MANAGED_BY_LABEL).map(String::as_str), Some(MANAGED_BY_VALUE));
}
