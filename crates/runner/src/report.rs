//! Report sinks: JSON results, Markdown table and summary counts

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RunnerResult;
use crate::types::{Report, Verdict};

/// Counts per verdict, for rules and for test cases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub automated: usize,
    pub semi_automated: usize,
    pub incorrect: usize,
}

impl VerdictCounts {
    fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Automated => self.automated += 1,
            Verdict::SemiAutomated => self.semi_automated += 1,
            Verdict::Incorrect => self.incorrect += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.automated + self.semi_automated + self.incorrect
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub rules: VerdictCounts,
    pub test_cases: VerdictCounts,
    pub errored: usize,
}

impl ReportSummary {
    pub fn from_report(report: &Report) -> Self {
        let mut summary = Self {
            errored: report.errors.len(),
            ..Default::default()
        };
        for rule in &report.rules {
            summary.rules.add(rule.rule_verdict);
            for result in &rule.test_case_results {
                summary.test_cases.add(result.verdict);
            }
        }
        summary
    }

    /// True when no rule is incorrect and no test case errored
    pub fn is_clean(&self) -> bool {
        self.rules.incorrect == 0 && self.errored == 0
    }
}

/// Write the rule reports as pretty-printed JSON. Errored test cases go to
/// `errors.json` next to it, only when there are any.
pub fn write_json(report: &Report, path: &Path) -> RunnerResult<Vec<PathBuf>> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_string_pretty(&report.rules)?)?;
    info!("Results written to: {}", path.display());

    let mut written = vec![path.to_path_buf()];

    if !report.errors.is_empty() {
        let errors_path = path.with_file_name("errors.json");
        std::fs::write(&errors_path, serde_json::to_string_pretty(&report.errors)?)?;
        info!("Errors written to: {}", errors_path.display());
        written.push(errors_path);
    }

    Ok(written)
}

fn cell_style(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Automated => "background-color: lightseagreen; color: black; padding: 4px;",
        Verdict::SemiAutomated => "background-color: orange; color: black; padding: 4px;",
        Verdict::Incorrect => "background-color: red; color: white; padding: 4px;",
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Render the report as a Markdown table
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    out.push_str("| Rule Id | Detector Ids | Rule Status | Test Cases Results |\n");
    out.push_str("| --- | --- | --- | --- |\n");

    for rule in &report.rules {
        let results = rule
            .test_case_results
            .iter()
            .map(|result| {
                let file = result.test_case_url.rsplit('/').next().unwrap_or(&result.test_case_url);
                format!(
                    "<div style='display: block; margin: 4px'> <span style='{}'>{}</span> <a href='{}'>{}</a> </div>",
                    cell_style(result.verdict),
                    result.verdict,
                    result.test_case_url,
                    file
                )
            })
            .collect::<Vec<_>>()
            .join(" <br> ");

        out.push_str(&format!(
            "| {} | {} | <span style='{}'> {} </span> | {} |\n",
            escape_cell(&rule.rule_id),
            escape_cell(&rule.detector_ids.join(", ")),
            cell_style(rule.rule_verdict),
            rule.rule_verdict,
            escape_cell(&results)
        ));
    }

    if !report.errors.is_empty() {
        out.push_str("\n## Errored test cases\n\n");
        for error in &report.errors {
            out.push_str(&format!(
                "- `{}` <a href='{}'>{}</a>: {}\n",
                error.rule_id,
                error.test_case_url,
                error.test_case_url.rsplit('/').next().unwrap_or(&error.test_case_url),
                error.error.replace('\n', " ")
            ));
        }
    }

    out.push_str(&format!(
        "\n_Generated {}_\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

pub fn write_markdown(report: &Report, path: &Path) -> RunnerResult<PathBuf> {
    ensure_parent(path)?;
    std::fs::write(path, render_markdown(report))?;
    info!("Results table written to: {}", path.display());
    Ok(path.to_path_buf())
}

fn ensure_parent(path: &Path) -> RunnerResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
