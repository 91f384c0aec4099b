//! Test case catalog loading and filtering

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{RunnerError, RunnerResult};
use crate::types::{RuleMap, SkipPolicy, TestCase};

/// Default location of the ACT rules test case catalog
pub const DEFAULT_CATALOG_URL: &str = "https://act-rules.github.io/testcases.json";

/// Key under which the catalog document lists its test cases
pub const DEFAULT_CATALOG_KEY: &str = "testcases";

/// Where the full list of test cases comes from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> RunnerResult<Vec<TestCase>>;

    /// Human-readable location, for logging
    fn describe(&self) -> String;
}

/// Catalog served over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    pub url: String,
    pub key: String,

    /// Request timeout; none by default
    pub timeout: Option<Duration>,
}

impl Default for HttpCatalog {
    fn default() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            key: DEFAULT_CATALOG_KEY.to_string(),
            timeout: None,
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch(&self) -> RunnerResult<Vec<TestCase>> {
        let unavailable = |e: reqwest::Error| RunnerError::CatalogUnavailable(format!("{}: {}", self.url, e));

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(unavailable)?;

        let document: Value = client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        extract_test_cases(document, &self.key)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Catalog read from a local JSON document
#[derive(Debug, Clone)]
pub struct FileCatalog {
    pub path: PathBuf,
    pub key: String,
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn fetch(&self) -> RunnerResult<Vec<TestCase>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RunnerError::CatalogUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let document: Value = serde_json::from_str(&content).map_err(|e| {
            RunnerError::CatalogUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        extract_test_cases(document, &self.key)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory catalog
#[async_trait]
impl CatalogSource for Vec<TestCase> {
    async fn fetch(&self) -> RunnerResult<Vec<TestCase>> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("<{} in-memory test cases>", self.len())
    }
}

/// Pull the test case list out of a catalog document
pub fn extract_test_cases(mut document: Value, key: &str) -> RunnerResult<Vec<TestCase>> {
    let list = document
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| RunnerError::CatalogUnavailable(format!("catalog has no '{}' key", key)))?;

    if !list.is_array() {
        return Err(RunnerError::CatalogUnavailable(format!("catalog '{}' is not a list", key)));
    }

    serde_json::from_value(list)
        .map_err(|e| RunnerError::CatalogUnavailable(format!("malformed test case record: {}", e)))
}

/// Keep the test cases that should run, in catalog order.
///
/// `run_only`, when non-empty, restricts the run to the listed file names.
pub fn filter_test_cases(
    testcases: Vec<TestCase>,
    rule_map: &RuleMap,
    skip: &SkipPolicy,
    run_only: &[String],
) -> Vec<TestCase> {
    testcases
        .into_iter()
        .filter(|tc| run_only.is_empty() || run_only.iter().any(|name| name == tc.file_name()))
        .filter(|tc| rule_map.is_runnable(&tc.rule_id) && !skip.skips(tc))
        .collect()
}

/// Fetch the catalog and produce the execution list
pub async fn load_test_cases(
    source: &dyn CatalogSource,
    rule_map: &RuleMap,
    skip: &SkipPolicy,
    run_only: &[String],
) -> RunnerResult<Vec<TestCase>> {
    info!("Loading test cases from {}", source.describe());

    let all = source.fetch().await?;
    let total = all.len();
    let selected = filter_test_cases(all, rule_map, skip, run_only);

    debug!("Selected {} of {} test case(s)", selected.len(), total);

    if selected.is_empty() {
        return Err(RunnerError::NoTestCases);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExpectedOutcome;
    use serde_json::json;

    const BASE: &str = "https://act-rules.github.io/testcases";

    fn tc(rule_id: &str, file: &str) -> TestCase {
        TestCase::new(rule_id, format!("{}/{}", BASE, file), ExpectedOutcome::Passed)
    }

    fn catalog() -> Vec<TestCase> {
        vec![
            tc("R1", "a.html"),
            tc("R1", "b.html"),
            tc("R2", "c.svg"),
            tc("R3", "d.html"),
            tc("R4", "e.html"),
        ]
    }

    fn rule_map() -> RuleMap {
        [
            ("R1", vec!["image-alt".to_string()]),
            ("R2", vec!["svg-img-alt".to_string()]),
            ("R3", vec![]),
        ]
        .into_iter()
        .collect()
    }

    fn files(testcases: &[TestCase]) -> Vec<&str> {
        testcases.iter().map(TestCase::file_name).collect()
    }

    #[test]
    fn test_filter_by_rule_map() {
        let selected = filter_test_cases(catalog(), &rule_map(), &SkipPolicy::default(), &[]);
        // R3 maps to nothing and R4 is not mapped at all
        assert_eq!(files(&selected), vec!["a.html", "b.html", "c.svg"]);
    }

    #[test]
    fn test_filter_skip_policy() {
        let mut skip = SkipPolicy::default();
        skip.test_cases.insert("a.html".into());
        skip.file_extensions.insert("svg".into());
        let selected = filter_test_cases(catalog(), &rule_map(), &skip, &[]);
        assert_eq!(files(&selected), vec!["b.html"]);

        let mut skip = SkipPolicy::default();
        skip.rule_ids.insert("R1".into());
        let selected = filter_test_cases(catalog(), &rule_map(), &skip, &[]);
        assert_eq!(files(&selected), vec!["c.svg"]);
    }

    #[test]
    fn test_skipped_file_removed_even_if_unmapped_rule_would_keep_it() {
        let mut skip = SkipPolicy::default();
        skip.test_cases.insert("a.html".into());
        let everything: RuleMap = ["R1", "R2", "R3", "R4"]
            .into_iter()
            .map(|r| (r, vec!["d".to_string()]))
            .collect();
        let selected = filter_test_cases(catalog(), &everything, &skip, &[]);
        assert_eq!(files(&selected), vec!["b.html", "c.svg", "d.html", "e.html"]);
    }

    #[test]
    fn test_run_only_preserves_catalog_order() {
        let run_only = vec!["c.svg".to_string(), "a.html".to_string(), "missing.html".to_string()];
        let selected = filter_test_cases(catalog(), &rule_map(), &SkipPolicy::default(), &run_only);
        assert_eq!(files(&selected), vec!["a.html", "c.svg"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut skip = SkipPolicy::default();
        skip.test_cases.insert("b.html".into());
        let once = filter_test_cases(catalog(), &rule_map(), &skip, &[]);
        let twice = filter_test_cases(once.clone(), &rule_map(), &skip, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extract_test_cases() {
        let document = json!({
            "name": "ACT Rules testcases",
            "testcases": [
                {"ruleId": "R1", "url": format!("{}/a.html", BASE), "expected": "failed"}
            ]
        });
        let testcases = extract_test_cases(document, "testcases").unwrap();
        assert_eq!(testcases.len(), 1);
        assert_eq!(testcases[0].expected, ExpectedOutcome::Failed);

        assert!(matches!(
            extract_test_cases(json!({"other": []}), "testcases"),
            Err(RunnerError::CatalogUnavailable(_))
        ));
        assert!(matches!(
            extract_test_cases(json!({"testcases": {}}), "testcases"),
            Err(RunnerError::CatalogUnavailable(_))
        ));
        assert!(matches!(
            extract_test_cases(json!({"testcases": [{"ruleId": "R1", "url": "x", "expected": "maybe"}]}), "testcases"),
            Err(RunnerError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn test_http_catalog_has_no_timeout_by_default() {
        let catalog = HttpCatalog::default();
        assert_eq!(catalog.url, DEFAULT_CATALOG_URL);
        assert_eq!(catalog.timeout, None);
        assert_eq!(catalog.describe(), DEFAULT_CATALOG_URL);
    }

    #[tokio::test]
    async fn test_load_empty_rule_map_yields_no_test_cases() {
        let result = load_test_cases(&catalog(), &RuleMap::new(), &SkipPolicy::default(), &[]).await;
        assert!(matches!(result, Err(RunnerError::NoTestCases)));
    }

    #[tokio::test]
    async fn test_file_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testcases.json");
        std::fs::write(
            &path,
            json!({"testcases": [{"ruleId": "R1", "url": format!("{}/a.html", BASE), "expected": "passed"}]})
                .to_string(),
        )
        .unwrap();

        let source = FileCatalog {
            path,
            key: DEFAULT_CATALOG_KEY.to_string(),
        };
        let selected = load_test_cases(&source, &rule_map(), &SkipPolicy::default(), &[])
            .await
            .unwrap();
        assert_eq!(files(&selected), vec!["a.html"]);

        let missing = FileCatalog {
            path: dir.path().join("missing.json"),
            key: DEFAULT_CATALOG_KEY.to_string(),
        };
        assert!(matches!(missing.fetch().await, Err(RunnerError::CatalogUnavailable(_))));
    }
}
