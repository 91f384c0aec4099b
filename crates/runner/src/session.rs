//! Page session executor: one isolated page per test case
//!
//! Phases run strictly in order and the first failing phase aborts the rest.
//! Once a page is open it is closed again whatever happened, before the
//! outcome of the session is handed back.

use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{BindingKind, BrowserEngine, GlobalBinding, PageId, ScriptSource};
use crate::error::{RunnerError, RunnerResult};
use crate::types::{DetectionResult, TestCase};

/// Global under which the current test case is exposed to the page
pub const TESTCASE_GLOBAL: &str = "testcase";

/// What every page session injects, exposes and evaluates
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Scripts injected in order after navigation
    pub inject_scripts: Vec<ScriptSource>,

    /// Globals exposed to the page
    pub globals: Vec<GlobalBinding>,

    /// Source of the JavaScript function evaluated in the page
    pub evaluate: String,
}

/// Run one test case on its own page and return the engine's findings
pub async fn execute_test_case(
    engine: &dyn BrowserEngine,
    testcase: &TestCase,
    options: &SessionOptions,
) -> RunnerResult<DetectionResult> {
    let page = engine.open_page().await?;
    debug!("Opened {} for {}", page, testcase.url);

    let outcome = run_phases(engine, page, testcase, options).await;

    match engine.close_page(page).await {
        Ok(()) => debug!("Closed {}", page),
        Err(e) => warn!("Failed to close {} for {}: {}", page, testcase.url, e),
    }

    outcome
}

async fn run_phases(
    engine: &dyn BrowserEngine,
    page: PageId,
    testcase: &TestCase,
    options: &SessionOptions,
) -> RunnerResult<DetectionResult> {
    engine.navigate(page, &testcase.url).await?;
    debug!("{} loaded {}", page, testcase.url);

    for script in &options.inject_scripts {
        engine.inject_script(page, script).await?;
        debug!("{} injected {}", page, script);
    }

    for binding in page_context(&options.globals, testcase)? {
        match binding.kind {
            BindingKind::Value(value) => engine.set_global(page, &binding.name, &value).await?,
            BindingKind::Callable(function) => engine.expose_function(page, &binding.name, function).await?,
        }
    }

    let value = engine.evaluate(page, &options.evaluate).await?;
    debug!("{} evaluation resolved", page);

    parse_detection(value)
}

/// Globals for one page: plain values first, then callables. The test case
/// always wins over a configured global of the same name.
pub fn page_context(globals: &[GlobalBinding], testcase: &TestCase) -> RunnerResult<Vec<GlobalBinding>> {
    let testcase_value = serde_json::to_value(testcase)?;

    let (callables, values): (Vec<_>, Vec<_>) = globals
        .iter()
        .filter(|b| b.name != TESTCASE_GLOBAL)
        .cloned()
        .partition(GlobalBinding::is_callable);

    let mut context = values;
    context.push(GlobalBinding::value(TESTCASE_GLOBAL, testcase_value));
    context.extend(callables);
    Ok(context)
}

/// The routine must resolve with all four buckets as lists
pub fn parse_detection(value: Value) -> RunnerResult<DetectionResult> {
    if !value.is_object() {
        return Err(RunnerError::MalformedDetection(format!(
            "expected an object with passes/violations/incomplete/inapplicable, got {}",
            value
        )));
    }
    serde_json::from_value(value).map_err(|e| RunnerError::MalformedDetection(e.to_string()))
}
