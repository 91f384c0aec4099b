//! Main conformance runner: owns the engine for one run and drives every test case through it

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::catalog::{load_test_cases, CatalogSource};
use crate::classify::classify;
use crate::engine::{BrowserEngine, EngineLauncher, GlobalBinding, ScriptSource};
use crate::error::{RunnerError, RunnerResult};
use crate::session::{execute_test_case, SessionOptions};
use crate::types::{DetectionResult, Report, RuleMap, SkipPolicy, TestCase, TestCaseError, TestCaseResult};

/// Global under which the rule map is exposed to every page
pub const RULES_MAP_GLOBAL: &str = "rulesMap";

/// Evaluation routine running axe-core scoped to the detectors mapped for the test case
pub const DEFAULT_EVALUATE: &str = include_str!("../assets/evaluate.js");

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// ACT rule id -> detector ids. Required.
    pub rule_map: Option<RuleMap>,

    pub skip: SkipPolicy,

    /// Restrict the run to these test case file names
    pub run_only: Vec<String>,

    pub inject_scripts: Vec<ScriptSource>,

    /// Extra globals exposed to every page
    pub globals: Vec<GlobalBinding>,

    /// Source of the routine evaluated in each page
    pub evaluate: String,

    /// Maximum number of pages open at once; 1 runs test cases in order
    pub concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            rule_map: None,
            skip: SkipPolicy::default(),
            run_only: Vec::new(),
            inject_scripts: Vec::new(),
            globals: Vec::new(),
            evaluate: DEFAULT_EVALUATE.to_string(),
            concurrency: 1,
        }
    }
}

impl RunnerConfig {
    /// Check the preconditions of a run and hand back the rule map
    pub fn validate(&self) -> RunnerResult<&RuleMap> {
        let rule_map = self.rule_map.as_ref().ok_or(RunnerError::MissingRuleMap)?;
        if rule_map.is_empty() {
            return Err(RunnerError::EmptyRuleMap);
        }
        if self.concurrency == 0 {
            return Err(RunnerError::InvalidConfig("concurrency must be at least 1".to_string()));
        }
        if self.evaluate.trim().is_empty() {
            return Err(RunnerError::InvalidConfig("evaluate routine is empty".to_string()));
        }
        Ok(rule_map)
    }

    fn session_options(&self, rule_map: &RuleMap) -> RunnerResult<SessionOptions> {
        let mut globals: Vec<GlobalBinding> = self
            .globals
            .iter()
            .filter(|b| b.name != RULES_MAP_GLOBAL)
            .cloned()
            .collect();
        globals.insert(0, GlobalBinding::value(RULES_MAP_GLOBAL, serde_json::to_value(rule_map)?));

        Ok(SessionOptions {
            inject_scripts: self.inject_scripts.clone(),
            globals,
            evaluate: self.evaluate.clone(),
        })
    }
}

/// Main conformance runner
pub struct TestRunner {
    config: RunnerConfig,
    catalog: Arc<dyn CatalogSource>,
    launcher: Arc<dyn EngineLauncher>,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, catalog: Arc<dyn CatalogSource>, launcher: Arc<dyn EngineLauncher>) -> Self {
        Self {
            config,
            catalog,
            launcher,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the whole pipeline: load, execute, classify, aggregate
    pub async fn run(&self) -> RunnerResult<Report> {
        let start = Instant::now();
        info!("TestRunner: Start.");

        let rule_map = self.config.validate()?;
        let options = self.config.session_options(rule_map)?;

        let testcases = load_test_cases(
            self.catalog.as_ref(),
            rule_map,
            &self.config.skip,
            &self.config.run_only,
        )
        .await?;

        let engine = self.launcher.start().await.map_err(|e| match e {
            RunnerError::EngineStart(_) => e,
            other => RunnerError::EngineStart(other.to_string()),
        })?;

        let outcomes = self.execute_all(engine.as_ref(), &testcases, &options).await;

        if let Err(e) = engine.stop().await {
            warn!("Browser engine did not stop cleanly: {}", e);
        }

        let mut results = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for (testcase, outcome) in testcases.iter().zip(outcomes) {
            match outcome {
                Ok(detection) => results.push(TestCaseResult {
                    rule_id: testcase.rule_id.clone(),
                    test_case_url: testcase.url.clone(),
                    verdict: classify(&detection, testcase.expected),
                }),
                Err(e) => errors.push(TestCaseError {
                    rule_id: testcase.rule_id.clone(),
                    test_case_url: testcase.url.clone(),
                    error: e.to_string(),
                }),
            }
        }

        let report = Report::build(results, errors, rule_map);

        info!(
            "TestRunner: End. {} rule(s), {} test case(s) classified, {} errored ({} ms)",
            report.rules.len(),
            report.test_case_count(),
            report.errors.len(),
            start.elapsed().as_millis()
        );

        Ok(report)
    }

    /// Execute every test case on the shared engine. Outcomes come back in
    /// test case order whatever the concurrency.
    async fn execute_all(
        &self,
        engine: &dyn BrowserEngine,
        testcases: &[TestCase],
        options: &SessionOptions,
    ) -> Vec<RunnerResult<DetectionResult>> {
        let total = testcases.len();
        info!("Running {} test case(s), {} at a time", total, self.config.concurrency);

        stream::iter(testcases.iter().enumerate())
            .map(|(index, testcase)| async move {
                info!("Executing test case {} of {}: {}", index + 1, total, testcase.url);
                let start = Instant::now();

                let outcome = execute_test_case(engine, testcase, options).await;
                match &outcome {
                    Ok(detection) => debug!(
                        "{} -> {} pass / {} violation / {} incomplete / {} inapplicable ({} ms)",
                        testcase.file_name(),
                        detection.passes.len(),
                        detection.violations.len(),
                        detection.incomplete.len(),
                        detection.inapplicable.len(),
                        start.elapsed().as_millis()
                    ),
                    Err(e) => warn!("✗ {} - {}", testcase.url, e),
                }
                outcome
            })
            .buffered(self.config.concurrency)
            .collect()
            .await
    }
}
