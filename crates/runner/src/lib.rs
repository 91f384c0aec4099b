//! ACT Rules Conformance Runner
//!
//! This crate drives an ACT rules test suite against an in-browser detection
//! engine (axe-core by default):
//! - Loads the test case catalog and filters it against the implemented rules
//! - Runs every test case on its own browser page through Playwright
//! - Classifies the engine's findings against the expected outcome
//! - Groups verdicts per rule and writes the report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Conformance Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── load_test_cases(catalog) -> [TestCase]               │
//! │    ├── EngineLauncher::start() -> BrowserEngine             │
//! │    ├── execute_test_case(engine, tc) -> DetectionResult     │
//! │    │     navigate → inject → expose globals → evaluate      │
//! │    │     → close page (always)                              │
//! │    ├── classify(detection, expected) -> Verdict             │
//! │    └── aggregate([TestCaseResult]) -> [RuleReport]          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Verdicts                                                   │
//! │    automated | semi-automated | incorrect                   │
//! │    rule verdict = worst test case verdict                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod aggregate;
pub mod catalog;
pub mod classify;
pub mod engine;
pub mod error;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod session;
pub mod types;

pub use catalog::{CatalogSource, FileCatalog, HttpCatalog};
pub use engine::{BindingKind, BrowserEngine, EngineLauncher, GlobalBinding, HostFunction, PageId, ScriptSource};
pub use error::{RunnerError, RunnerResult};
pub use runner::{RunnerConfig, TestRunner};
pub use types::{
    Bucket, DetectionResult, ExpectedOutcome, Finding, Report, RuleMap, RuleReport, SkipPolicy, TestCase,
    TestCaseError, TestCaseResult, Verdict,
};
