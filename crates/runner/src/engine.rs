//! Browser engine handle used by the page session executor
//!
//! The runner never talks to a browser directly. Everything goes through
//! [`BrowserEngine`], which the Playwright driver implements and which the
//! tests replace with a scripted engine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RunnerResult;

/// Identifier of a page opened on an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Host function callable from inside a page
pub type HostFunction = Arc<dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync>;

/// A script to inject into a page before evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Remote script, loaded through a `<script src>` tag
    Url(String),
    /// Local script file, read and injected as inline content
    Path(PathBuf),
    /// Inline script body
    Inline(String),
}

impl ScriptSource {
    /// Classify a configured script reference: absolute http(s) URLs are
    /// remote, anything else is a local path.
    pub fn parse(script: &str) -> Self {
        match reqwest::Url::parse(script) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ScriptSource::Url(script.to_string()),
            _ => ScriptSource::Path(PathBuf::from(script)),
        }
    }
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptSource::Url(url) => f.write_str(url),
            ScriptSource::Path(path) => write!(f, "{}", path.display()),
            ScriptSource::Inline(body) => write!(f, "<inline {} bytes>", body.len()),
        }
    }
}

#[derive(Clone)]
pub enum BindingKind {
    /// Assigned directly onto the page's global scope
    Value(Value),
    /// Exposed as a bridge the page can call back into
    Callable(HostFunction),
}

impl fmt::Debug for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Value(v) => f.debug_tuple("Value").field(v).finish(),
            BindingKind::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// A named global exposed to every page
#[derive(Debug, Clone)]
pub struct GlobalBinding {
    pub name: String,
    pub kind: BindingKind,
}

impl GlobalBinding {
    pub fn value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            kind: BindingKind::Value(value),
        }
    }

    pub fn callable<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: BindingKind::Callable(Arc::new(f)),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, BindingKind::Callable(_))
    }
}

/// A running browser instance shared by all page sessions of a run
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh, isolated page
    async fn open_page(&self) -> RunnerResult<PageId>;

    /// Navigate and wait for the document `load` event
    async fn navigate(&self, page: PageId, url: &str) -> RunnerResult<()>;

    async fn inject_script(&self, page: PageId, script: &ScriptSource) -> RunnerResult<()>;

    async fn set_global(&self, page: PageId, name: &str, value: &Value) -> RunnerResult<()>;

    async fn expose_function(&self, page: PageId, name: &str, function: HostFunction) -> RunnerResult<()>;

    /// Evaluate a routine (source of a JavaScript function) in the page and
    /// await whatever it resolves to
    async fn evaluate(&self, page: PageId, routine: &str) -> RunnerResult<Value>;

    async fn close_page(&self, page: PageId) -> RunnerResult<()>;

    /// Shut the engine down; no page may be used afterwards
    async fn stop(&self) -> RunnerResult<()>;
}

/// Starts a [`BrowserEngine`] for one run
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn start(&self) -> RunnerResult<Arc<dyn BrowserEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_source_parse() {
        assert_eq!(
            ScriptSource::parse("https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.8.2/axe.min.js"),
            ScriptSource::Url("https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.8.2/axe.min.js".into())
        );
        assert_eq!(
            ScriptSource::parse("node_modules/axe-core/axe.min.js"),
            ScriptSource::Path(PathBuf::from("node_modules/axe-core/axe.min.js"))
        );
        assert_eq!(
            ScriptSource::parse("/usr/lib/node_modules/axe-core/axe.js"),
            ScriptSource::Path(PathBuf::from("/usr/lib/node_modules/axe-core/axe.js"))
        );
        assert!(matches!(ScriptSource::parse("file:///tmp/axe.js"), ScriptSource::Path(_)));
    }

    #[test]
    fn test_callable_binding() {
        let binding = GlobalBinding::callable("double", |args| {
            let n = args.first().and_then(Value::as_i64).ok_or("expected a number")?;
            Ok(Value::from(n * 2))
        });
        assert!(binding.is_callable());
        match binding.kind {
            BindingKind::Callable(f) => assert_eq!(f(vec![Value::from(21)]).unwrap(), Value::from(42)),
            BindingKind::Value(_) => unreachable!(),
        }
    }
}
