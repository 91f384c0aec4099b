//! Error types for the conformance runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("No rules map defined via configuration")]
    MissingRuleMap,

    #[error("Rules map does not contain any rule id")]
    EmptyRuleMap,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Test case catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("No test cases left to run after filtering")]
    NoTestCases,

    #[error("Browser engine failed to start: {0}")]
    EngineStart(String),

    #[error("Browser engine failed to stop: {0}")]
    EngineStop(String),

    #[error("Browser driver closed the connection")]
    DriverClosed,

    #[error("Opening page failed: {0}")]
    PageOpen(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Script injection failed for {script}: {reason}")]
    ScriptInjection { script: String, reason: String },

    #[error("Exposing global '{name}' failed: {reason}")]
    Expose { name: String, reason: String },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Closing page failed: {0}")]
    PageClose(String),

    #[error("Detection result is malformed: {0}")]
    MalformedDetection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RunnerError {
    /// Whether the error ends the whole run rather than a single test case.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunnerError::MissingRuleMap
                | RunnerError::EmptyRuleMap
                | RunnerError::InvalidConfig(_)
                | RunnerError::CatalogUnavailable(_)
                | RunnerError::NoTestCases
                | RunnerError::EngineStart(_)
        )
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_split() {
        assert!(RunnerError::NoTestCases.is_fatal());
        assert!(RunnerError::EngineStart("no node".into()).is_fatal());
        assert!(!RunnerError::Evaluation("axe rejected".into()).is_fatal());
        assert!(!RunnerError::EngineStop("gone".into()).is_fatal());
        assert!(!RunnerError::Navigation {
            url: "https://example.com/a.html".into(),
            reason: "timeout".into(),
        }
        .is_fatal());
    }
}
