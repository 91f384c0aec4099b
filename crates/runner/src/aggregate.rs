//! Grouping of per test case verdicts into rule-level verdicts

use crate::types::{Report, RuleMap, RuleReport, TestCaseError, TestCaseResult, Verdict};

/// Worst verdict among the results; an empty set is treated as automated.
pub fn rule_verdict<'a>(results: impl IntoIterator<Item = &'a TestCaseResult>) -> Verdict {
    results
        .into_iter()
        .map(|r| r.verdict)
        .max()
        .unwrap_or(Verdict::Automated)
}

/// Group results by rule id, keeping the first-seen order of rules and the
/// insertion order of test cases within a rule.
pub fn aggregate(results: Vec<TestCaseResult>, rule_map: &RuleMap) -> Vec<RuleReport> {
    let mut groups: Vec<(String, Vec<TestCaseResult>)> = Vec::new();

    for result in results {
        match groups.iter_mut().find(|(rule_id, _)| *rule_id == result.rule_id) {
            Some((_, group)) => group.push(result),
            None => groups.push((result.rule_id.clone(), vec![result])),
        }
    }

    groups
        .into_iter()
        .map(|(rule_id, test_case_results)| RuleReport {
            detector_ids: rule_map
                .detectors(&rule_id)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            rule_verdict: rule_verdict(&test_case_results),
            rule_id,
            test_case_results,
        })
        .collect()
}

impl Report {
    pub fn build(results: Vec<TestCaseResult>, errors: Vec<TestCaseError>, rule_map: &RuleMap) -> Self {
        Self {
            rules: aggregate(results, rule_map),
            errors,
        }
    }

    /// Total number of classified test cases
    pub fn test_case_count(&self) -> usize {
        self.rules.iter().map(|r| r.test_case_results.len()).sum()
    }
}
