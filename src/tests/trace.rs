use super::*;
use crate::narrowing::{narrow, NarrowingOptions};
use crate::search::SearchType;
use crate::test_utils::{parse, vending_module};

#[test]
fn macros_accept_structured_fields() {
    let _span = debug_span!("search", states = 3usize).entered();
    trace!(state = 2usize, "expanded");
    debug!(states = 3usize, folded = 0, "exhausted");
}

#[test]
fn init_subscriber_twice() {
    init_subscriber();
    init_subscriber();
}

#[test]
fn instrumented_search_runs_with_a_subscriber() {
    init_subscriber();
    let m = vending_module();
    let start = parse(&m, "<_>($)");
    let found = narrow(
        &m,
        &[start],
        SearchType::OneStep,
        parse(&m, "S:State"),
        Some(1),
        NarrowingOptions::default(),
    )
    .unwrap()
    .count();
    // buy-c and buy-a both apply to a single dollar.
    assert!(found >= 2);
}
