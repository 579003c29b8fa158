//! Testing utilities for the Tally workspace
//!
//! Shared fixtures: seeded stores and resource constructors.

#![allow(missing_docs)]

use std::sync::Arc;
use tally_model::{Module, ResourceId, TestCase, TestResult, TestStatus};

pub use tally_model::MemoryStore;

pub fn module(id: &str, name: &str, order: u32) -> Module {
    Module::new(name).with_id(id).with_order(order)
}

pub fn test_case(id: &str, module_id: &str, title: &str, order: u32) -> TestCase {
    TestCase::new(module_id, title).with_id(id).with_order(order)
}

pub fn test_result(id: &str, test_case_id: &str, tester: &str, status: TestStatus) -> TestResult {
    TestResult::pending(id, test_case_id, tester).with_status(status)
}

/// Modules `m1` Login, `m2` Checkout, `m3` Search
pub fn sample_modules() -> Vec<Module> {
    vec![
        module("m1", "Login", 0),
        module("m2", "Checkout", 1),
        module("m3", "Search", 2),
    ]
}

/// Two cases under `m1`, two under `m2`, none under `m3`
pub fn sample_cases() -> Vec<TestCase> {
    vec![
        test_case("t1", "m1", "Valid password", 0),
        test_case("t2", "m1", "Wrong password", 1),
        test_case("t3", "m2", "Pay by card", 0),
        test_case("t4", "m2", "Empty cart", 1),
    ]
}

/// One pending result per (case, tester), ids `r-<case>-<tester>`
pub fn pending_results(cases: &[TestCase], testers: &[&str]) -> Vec<TestResult> {
    cases
        .iter()
        .flat_map(|case| {
            testers.iter().map(move |tester| {
                TestResult::pending(result_id(case.id.as_str(), tester), case.id.clone(), *tester)
            })
        })
        .collect()
}

pub fn result_id(test_case_id: &str, tester: &str) -> ResourceId {
    ResourceId::new(format!("r-{test_case_id}-{tester}"))
}

pub fn module_store() -> Arc<MemoryStore<Module>> {
    Arc::new(MemoryStore::with_records(sample_modules()))
}

pub fn case_store() -> Arc<MemoryStore<TestCase>> {
    Arc::new(MemoryStore::with_records(sample_cases()))
}

/// Result store seeded with pending results for `testers` over [`sample_cases`]
pub fn result_store(testers: &[&str]) -> Arc<MemoryStore<TestResult>> {
    Arc::new(MemoryStore::with_records(pending_results(&sample_cases(), testers)))
}
