// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;

#[test]
fn uuid_tokens_do_not_repeat() {
    let tokens: HashSet<String> = (0..64).map(|_| UuidIdGen.token()).collect();
    assert_eq!(tokens.len(), 64);
    assert!(tokens.iter().all(|t| t.len() == 36));
}

#[test]
fn sequential_tokens_count_from_one_across_clones() {
    let holders = SequentialIdGen::new("holder");
    let other = holders.clone();
    assert_eq!(holders.token(), "holder-1");
    assert_eq!(other.token(), "holder-2");
    assert_eq!(holders.issued(), 2);
}

#[test]
fn tokens_come_through_a_trait_object() {
    let source: Arc<dyn IdGen> = Arc::new(SequentialIdGen::default());
    assert_eq!(source.token(), "token-1");
    assert_eq!(source.token(), "token-2");
}
