//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use act_runner::report::ReportSummary;
use act_runner::{Report, RuleReport, TestCaseError, Verdict};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<Cell>;
}

fn verdict_cell(verdict: Verdict) -> Cell {
    let color = match verdict {
        Verdict::Automated => Color::Green,
        Verdict::SemiAutomated => Color::Yellow,
        Verdict::Incorrect => Color::Red,
    };
    Cell::new(verdict).fg(color)
}

impl TableDisplay for RuleReport {
    fn headers() -> Vec<&'static str> {
        vec!["Rule", "Detectors", "Verdict", "Test Cases"]
    }

    fn row(&self) -> Vec<Cell> {
        let incorrect = self
            .test_case_results
            .iter()
            .filter(|r| r.verdict == Verdict::Incorrect)
            .count();
        let cases = if incorrect > 0 {
            format!("{} ({} incorrect)", self.test_case_results.len(), incorrect)
        } else {
            self.test_case_results.len().to_string()
        };
        vec![
            Cell::new(&self.rule_id),
            Cell::new(self.detector_ids.join(", ")),
            verdict_cell(self.rule_verdict),
            Cell::new(cases),
        ]
    }
}

impl TableDisplay for TestCaseError {
    fn headers() -> Vec<&'static str> {
        vec!["Rule", "Test Case", "Error"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.rule_id),
            Cell::new(&self.test_case_url),
            Cell::new(&self.error).fg(Color::Red),
        ]
    }
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

fn summary_table(summary: &ReportSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["", "Automated", "Semi-automated", "Incorrect", "Total"]);
    for (label, counts) in [("Rules", &summary.rules), ("Test cases", &summary.test_cases)] {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(counts.automated),
            Cell::new(counts.semi_automated),
            Cell::new(counts.incorrect),
            Cell::new(counts.total()),
        ]);
    }
    table
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    summary: &'a ReportSummary,
    #[serde(flatten)]
    report: &'a Report,
}

/// Print the outcome of a run
pub fn print_report(report: &Report, summary: &ReportSummary, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if report.rules.is_empty() {
                println!("No rule could be evaluated.");
            } else {
                println!("{}", table(&report.rules));
            }
            if !report.errors.is_empty() {
                println!("\nErrored test cases:");
                println!("{}", table(&report.errors));
            }
            println!("{}", summary_table(summary));
            if summary.errored > 0 {
                println!("{} test case(s) errored", summary.errored);
            }
        }
        OutputFormat::Json => {
            let out = JsonSummary { summary, report };
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        }
    }
}
