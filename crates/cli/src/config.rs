//! Runner configuration file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use act_runner::catalog::{DEFAULT_CATALOG_KEY, DEFAULT_CATALOG_URL};
use act_runner::playwright::{Browser, PlaywrightConfig};
use act_runner::runner::DEFAULT_EVALUATE;
use act_runner::{CatalogSource, FileCatalog, GlobalBinding, HttpCatalog, RuleMap, RunnerConfig, ScriptSource, SkipPolicy};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "act-runner.toml";

/// Contents of `act-runner.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Headed browser, slowed down, with debug logging
    pub debug: bool,

    /// Pages open at once
    pub concurrency: usize,

    /// File holding the evaluation routine; the bundled axe routine otherwise
    pub evaluate: Option<PathBuf>,

    /// Scripts injected into every page, URLs or local paths
    pub inject_scripts: Vec<String>,

    /// Test case file names to restrict the run to
    pub run_only: Vec<String>,

    pub catalog: CatalogConfig,

    pub skip: SkipPolicy,

    pub rules_map: Option<RuleMap>,

    /// Extra values exposed as page globals
    pub globals: BTreeMap<String, toml::Value>,

    pub browser: BrowserConfig,

    pub output: OutputConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            debug: false,
            concurrency: 1,
            evaluate: None,
            inject_scripts: Vec::new(),
            run_only: Vec::new(),
            catalog: CatalogConfig::default(),
            skip: SkipPolicy::default(),
            rules_map: None,
            globals: BTreeMap::new(),
            browser: BrowserConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Where the test case catalog comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub url: Option<String>,

    /// Local catalog file, for offline runs
    pub path: Option<PathBuf>,

    /// Key of the test case array in the catalog document
    pub key: String,

    /// HTTP request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            key: DEFAULT_CATALOG_KEY.to_string(),
            timeout_secs: None,
        }
    }
}

impl CatalogConfig {
    pub fn source(&self) -> anyhow::Result<Arc<dyn CatalogSource>> {
        match (&self.url, &self.path) {
            (Some(_), Some(_)) => bail!("catalog url and catalog path are mutually exclusive"),
            (None, Some(path)) => Ok(Arc::new(FileCatalog {
                path: path.clone(),
                key: self.key.clone(),
            })),
            (url, None) => Ok(Arc::new(HttpCatalog {
                url: url.clone().unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
                key: self.key.clone(),
                timeout: self.timeout_secs.map(Duration::from_secs),
            })),
        }
    }
}

/// Browser and driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: Browser,
    pub headless: bool,

    /// Node binary running the Playwright driver
    pub node_binary: PathBuf,

    /// `NODE_PATH` for the driver, usually a `node_modules` holding `playwright`
    pub node_path: Option<PathBuf>,

    /// Give up on a browser that is not up after this many seconds
    pub launch_timeout_secs: Option<u64>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Chromium,
            headless: true,
            node_binary: PathBuf::from("node"),
            node_path: None,
            launch_timeout_secs: None,
        }
    }
}

/// Report locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub json: String,
    pub markdown: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            json: "result.json".to_string(),
            markdown: "result.md".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn json_path(&self) -> PathBuf {
        self.dir.join(&self.json)
    }

    pub fn markdown_path(&self) -> PathBuf {
        self.dir.join(&self.markdown)
    }
}

impl FileConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file that must exist
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn playwright_config(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser.kind,
            headless: self.browser.headless,
            debug: self.debug,
            node_binary: self.browser.node_binary.clone(),
            node_path: self.browser.node_path.clone(),
            launch_timeout: self.browser.launch_timeout_secs.map(Duration::from_secs),
            ..Default::default()
        }
    }

    /// Build the pipeline configuration. `host_functions` are exposed next to
    /// the value globals from the file.
    pub fn runner_config(&self, host_functions: Vec<GlobalBinding>) -> anyhow::Result<RunnerConfig> {
        let evaluate = match &self.evaluate {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading evaluation routine {}", path.display()))?,
            None => DEFAULT_EVALUATE.to_string(),
        };

        let mut globals = Vec::with_capacity(self.globals.len() + host_functions.len());
        for (name, value) in &self.globals {
            let value = serde_json::to_value(value).with_context(|| format!("converting global '{}'", name))?;
            globals.push(GlobalBinding::value(name.clone(), value));
        }
        globals.extend(host_functions);

        Ok(RunnerConfig {
            rule_map: self.rules_map.clone(),
            skip: self.skip.clone(),
            run_only: self.run_only.clone(),
            inject_scripts: self.inject_scripts.iter().map(|s| ScriptSource::parse(s)).collect(),
            globals,
            evaluate,
            concurrency: self.concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use act_runner::BindingKind;
    use serde_json::json;

    const SAMPLE: &str = r#"
concurrency = 4
inject_scripts = ["node_modules/axe-core/axe.min.js", "https://cdn.example/axe-locale.js"]

[catalog]
path = "testcases.json"

[skip]
file_extensions = ["svg", ".xml"]

[rules_map]
"SC1-1-1-image-has-name" = ["image-alt"]
"SC4-1-1-unique-id" = ["duplicate-id", "duplicate-id-aria"]

[globals]
locale = "en"
limits = { max = 3 }

[browser]
kind = "firefox"
headless = false

[output]
dir = "reports"
"#;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.concurrency, 1);
        assert!(config.rules_map.is_none());
        assert_eq!(config.output.json_path(), PathBuf::from("./result.json"));

        assert!(FileConfig::read(&dir.path().join(DEFAULT_CONFIG_FILE)).is_err());
    }

    #[test]
    fn test_parse_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.catalog.key, "testcases");
        assert_eq!(config.browser.kind, Browser::Firefox);
        assert!(!config.browser.headless);
        assert_eq!(config.output.markdown_path(), PathBuf::from("reports/result.md"));

        let rules = config.rules_map.as_ref().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.detectors("SC4-1-1-unique-id"),
            Some(&["duplicate-id".to_string(), "duplicate-id-aria".to_string()][..])
        );
    }

    #[test]
    fn test_runner_config_from_file() {
        let config: FileConfig = toml::from_str(SAMPLE).unwrap();
        let host = GlobalBinding::callable("hostLog", |_| Ok(serde_json::Value::Null));
        let runner = config.runner_config(vec![host]).unwrap();

        assert!(runner.validate().is_ok());
        assert_eq!(runner.concurrency, 4);
        assert_eq!(runner.evaluate, DEFAULT_EVALUATE);
        assert_eq!(
            runner.inject_scripts,
            vec![
                ScriptSource::Path(PathBuf::from("node_modules/axe-core/axe.min.js")),
                ScriptSource::Url("https://cdn.example/axe-locale.js".to_string()),
            ]
        );

        let names: Vec<&str> = runner.globals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["limits", "locale", "hostLog"]);
        match &runner.globals[0].kind {
            BindingKind::Value(v) => assert_eq!(v, &json!({"max": 3})),
            BindingKind::Callable(_) => panic!("limits is a value"),
        }
        assert!(runner.globals[2].is_callable());
    }

    #[test]
    fn test_catalog_source_selection() {
        let mut catalog = CatalogConfig::default();
        assert!(catalog.source().unwrap().describe().contains(DEFAULT_CATALOG_URL));

        catalog.path = Some(PathBuf::from("testcases.json"));
        assert!(catalog.source().unwrap().describe().contains("testcases.json"));

        catalog.url = Some("https://example.com/testcases.json".to_string());
        assert!(catalog.source().is_err());
    }

    #[test]
    fn test_playwright_config_carries_debug() {
        let mut config = FileConfig::default();
        config.debug = true;
        config.browser.node_path = Some(PathBuf::from("node_modules"));

        let playwright = config.playwright_config();
        assert!(playwright.debug);
        assert_eq!(playwright.launch_timeout, None);

        config.browser.launch_timeout_secs = Some(90);
        assert_eq!(config.playwright_config().launch_timeout, Some(Duration::from_secs(90)));
        assert_eq!(playwright.browser, Browser::Chromium);
        assert_eq!(playwright.node_path, Some(PathBuf::from("node_modules")));
    }
}
