//! Data model shared by the loader, executor, classifier and aggregator

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single ACT test case: one document plus the outcome it is expected to produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// ACT rule identifier this test case belongs to
    pub rule_id: String,

    /// Absolute URL of the test case document
    pub url: String,

    /// Expected conformance outcome
    #[serde(rename = "expected", alias = "expectedOutcome")]
    pub expected: ExpectedOutcome,

    /// Element the rule applies to, when the catalog narrows it down
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testcase_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testcase_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

impl TestCase {
    pub fn new(rule_id: impl Into<String>, url: impl Into<String>, expected: ExpectedOutcome) -> Self {
        Self {
            rule_id: rule_id.into(),
            url: url.into(),
            expected,
            selector: None,
            testcase_id: None,
            testcase_title: None,
            rule_name: None,
        }
    }

    /// Final path segment of the test case URL, e.g. `SC2-4-2-page-has-title_passed_example_1.html`
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    /// Extension of the test case file, without the leading dot
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.').map(|idx| &name[idx + 1..])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedOutcome {
    Passed,
    Failed,
    Inapplicable,
}

impl ExpectedOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedOutcome::Passed => "passed",
            ExpectedOutcome::Failed => "failed",
            ExpectedOutcome::Inapplicable => "inapplicable",
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping of ACT rule ids to the detector ids implemented by the engine under test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleMap(BTreeMap<String, Vec<String>>);

impl RuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule_id: impl Into<String>, detectors: Vec<String>) {
        self.0.insert(rule_id.into(), detectors);
    }

    pub fn detectors(&self, rule_id: &str) -> Option<&[String]> {
        self.0.get(rule_id).map(Vec::as_slice)
    }

    /// A rule is runnable only when it is mapped to at least one detector
    pub fn is_runnable(&self, rule_id: &str) -> bool {
        self.detectors(rule_id).map(|d| !d.is_empty()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for RuleMap {
    fn from_iter<I: IntoIterator<Item = (K, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Test cases excluded from a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    #[serde(default)]
    pub rule_ids: BTreeSet<String>,

    /// File names (final URL segment) of test cases to skip
    #[serde(default)]
    pub test_cases: BTreeSet<String>,

    /// Extensions to skip, with or without the leading dot
    #[serde(default)]
    pub file_extensions: BTreeSet<String>,
}

impl SkipPolicy {
    pub fn skips(&self, testcase: &TestCase) -> bool {
        if self.rule_ids.contains(&testcase.rule_id) {
            return true;
        }
        if self.test_cases.contains(testcase.file_name()) {
            return true;
        }
        match testcase.extension() {
            Some(ext) => self
                .file_extensions
                .iter()
                .any(|skipped| skipped.trim_start_matches('.').eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// One finding reported by the detection engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<serde_json::Value>,
}

impl Finding {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Findings of one detection engine invocation, split in four disjoint buckets.
/// All four lists must be present; an empty bucket is an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub passes: Vec<Finding>,
    pub violations: Vec<Finding>,
    pub incomplete: Vec<Finding>,
    pub inapplicable: Vec<Finding>,
}

impl DetectionResult {
    pub fn bucket(&self, bucket: Bucket) -> &[Finding] {
        match bucket {
            Bucket::Passes => &self.passes,
            Bucket::Violations => &self.violations,
            Bucket::Incomplete => &self.incomplete,
            Bucket::Inapplicable => &self.inapplicable,
        }
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.bucket(bucket).len()
    }

    /// Build a result holding `n` placeholder findings per bucket
    pub fn from_counts(passes: usize, violations: usize, incomplete: usize, inapplicable: usize) -> Self {
        let fill = |n: usize, id: &str| (0..n).map(|_| Finding::new(id)).collect();
        Self {
            passes: fill(passes, "pass"),
            violations: fill(violations, "violation"),
            incomplete: fill(incomplete, "incomplete"),
            inapplicable: fill(inapplicable, "inapplicable"),
        }
    }
}

/// Detection result categories, in tie-break priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Passes,
    Violations,
    Incomplete,
    Inapplicable,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Passes,
        Bucket::Violations,
        Bucket::Incomplete,
        Bucket::Inapplicable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Passes => "passes",
            Bucket::Violations => "violations",
            Bucket::Incomplete => "incomplete",
            Bucket::Inapplicable => "inapplicable",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assessment of whether the engine's detection matches the expected outcome.
///
/// Variants are ordered from best to worst so the worst of a set is its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Automated,
    SemiAutomated,
    Incorrect,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Automated => "automated",
            Verdict::SemiAutomated => "semi-automated",
            Verdict::Incorrect => "incorrect",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub rule_id: String,
    pub test_case_url: String,
    pub verdict: Verdict,
}

/// A test case whose page session failed and which is left out of the rule reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseError {
    pub rule_id: String,
    pub test_case_url: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleReport {
    pub rule_id: String,
    pub detector_ids: Vec<String>,
    pub rule_verdict: Verdict,
    pub test_case_results: Vec<TestCaseResult>,
}

/// Outcome of a full run, grouped per rule in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub rules: Vec<RuleReport>,
    #[serde(default)]
    pub errors: Vec<TestCaseError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testcase(url: &str) -> TestCase {
        TestCase::new("SC2-4-2-page-has-title", url, ExpectedOutcome::Passed)
    }

    #[test]
    fn test_parse_act_record() {
        let json = r#"{
            "ruleId": "SC1-1-1-image-has-name",
            "ruleName": "Image has accessible name",
            "testcaseId": "59796f",
            "testcaseTitle": "Passed Example 1",
            "expected": "passed",
            "url": "https://act-rules.github.io/testcases/23a2a8/59796f.html",
            "relativePath": "testcases/23a2a8/59796f.html"
        }"#;
        let tc: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(tc.rule_id, "SC1-1-1-image-has-name");
        assert_eq!(tc.expected, ExpectedOutcome::Passed);
        assert_eq!(tc.testcase_id.as_deref(), Some("59796f"));
        assert!(tc.selector.is_none());
    }

    #[test]
    fn test_expected_outcome_alias() {
        let json = r#"{"ruleId": "R1", "url": "https://x/a.html", "expectedOutcome": "inapplicable"}"#;
        let tc: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(tc.expected, ExpectedOutcome::Inapplicable);
    }

    #[test]
    fn test_file_name_and_extension() {
        let tc = testcase("https://auto-wcag.github.io/testcases/SC2-4-2/page_inapplicable_example_1.svg");
        assert_eq!(tc.file_name(), "page_inapplicable_example_1.svg");
        assert_eq!(tc.extension(), Some("svg"));

        let bare = testcase("https://example.com/testcases/README");
        assert_eq!(bare.extension(), None);
    }

    #[test]
    fn test_rule_map_runnable() {
        let map: RuleMap = [
            ("R1", vec!["image-alt".to_string()]),
            ("R2", vec![]),
        ]
        .into_iter()
        .collect();
        assert!(map.is_runnable("R1"));
        assert!(!map.is_runnable("R2"));
        assert!(!map.is_runnable("R3"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_skip_policy() {
        let mut skip = SkipPolicy::default();
        skip.test_cases.insert("a.html".into());
        skip.file_extensions.insert(".svg".into());

        assert!(skip.skips(&testcase("https://x/a.html")));
        assert!(!skip.skips(&testcase("https://x/b.html")));
        assert!(skip.skips(&testcase("https://x/c.SVG")));

        skip.rule_ids.insert("SC2-4-2-page-has-title".into());
        assert!(skip.skips(&testcase("https://x/b.html")));
    }

    #[test]
    fn test_verdict_serialization_and_order() {
        assert_eq!(serde_json::to_string(&Verdict::SemiAutomated).unwrap(), "\"semi-automated\"");
        assert!(Verdict::Automated < Verdict::SemiAutomated);
        assert!(Verdict::SemiAutomated < Verdict::Incorrect);
    }

    #[test]
    fn test_detection_result_requires_every_bucket() {
        let result: DetectionResult = serde_json::from_str(
            r#"{"passes": [], "violations": [{"id": "image-alt", "impact": "critical"}], "incomplete": [], "inapplicable": []}"#,
        )
        .unwrap();
        assert_eq!(result.count(Bucket::Violations), 1);
        assert_eq!(result.count(Bucket::Passes), 0);
        assert_eq!(result.violations[0].impact.as_deref(), Some("critical"));

        let partial = serde_json::from_str::<DetectionResult>(r#"{"violations": [{"id": "image-alt"}]}"#);
        assert!(partial.is_err());
    }
}
