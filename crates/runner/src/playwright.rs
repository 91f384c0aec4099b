//! Playwright browser automation
//!
//! A small Node driver (`assets/driver.js`) owns the Playwright browser and
//! speaks line-delimited JSON over stdin/stdout. Requests are multiplexed by
//! id so several page sessions can be in flight against the one browser.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::engine::{BrowserEngine, EngineLauncher, HostFunction, PageId, ScriptSource};
use crate::error::{RunnerError, RunnerResult};

const DRIVER_SCRIPT: &str = include_str!("../assets/driver.js");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(RunnerError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,

    /// Headed browser with slowed-down actions and devtools
    pub debug: bool,

    /// Node binary used to run the driver
    pub node_binary: PathBuf,

    /// `NODE_PATH` for the driver, so it can resolve `playwright`
    pub node_path: Option<PathBuf>,

    /// How long to wait for the browser to come up; unbounded when unset
    pub launch_timeout: Option<Duration>,

    /// How long to wait for the driver to exit after shutdown
    pub shutdown_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            debug: false,
            node_binary: PathBuf::from("node"),
            node_path: None,
            launch_timeout: None,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Starts one [`PlaywrightEngine`] per run
#[derive(Debug, Clone, Default)]
pub struct PlaywrightLauncher {
    pub config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLauncher for PlaywrightLauncher {
    async fn start(&self) -> RunnerResult<Arc<dyn BrowserEngine>> {
        let engine = PlaywrightEngine::launch(self.config.clone()).await?;
        Ok(Arc::new(engine))
    }
}

/// Request sent to the driver
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverRequest<'a> {
    NewPage,
    Goto {
        page: u64,
        url: &'a str,
    },
    AddScript {
        page: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<&'a str>,
    },
    SetGlobal {
        page: u64,
        name: &'a str,
        value: &'a Value,
    },
    Expose {
        page: u64,
        name: &'a str,
    },
    Evaluate {
        page: u64,
        source: &'a str,
    },
    ClosePage {
        page: u64,
    },
    Shutdown,
}

/// Wire form of a request: the tagged request plus its id
fn encode(id: u64, request: &DriverRequest<'_>) -> serde_json::Result<Value> {
    let mut message = serde_json::to_value(request)?;
    message["id"] = Value::from(id);
    Ok(message)
}

/// Message received from the driver
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DriverMessage {
    Ready,
    Fatal {
        error: String,
    },
    Response {
        id: u64,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Call {
        call_id: u64,
        page: u64,
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Console {
        page: u64,
        level: String,
        text: String,
    },
}

/// In-flight requests. Once the driver output closes no new request is accepted.
#[derive(Default)]
struct Waiters {
    open: HashMap<u64, oneshot::Sender<Result<Value, String>>>,
    closed: bool,
}

type Pending = Arc<Mutex<Waiters>>;
type Functions = Arc<Mutex<HashMap<(u64, String), HostFunction>>>;

/// Browser engine backed by a Playwright driver process
pub struct PlaywrightEngine {
    outbound: mpsc::UnboundedSender<String>,
    pending: Pending,
    functions: Functions,
    next_id: AtomicU64,
    child: tokio::sync::Mutex<Option<Child>>,
    shutdown_timeout: Duration,
    // Keeps the staged driver script alive for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightEngine {
    /// Spawn the driver and wait until the browser is up
    pub async fn launch(config: PlaywrightConfig) -> RunnerResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        tokio::fs::write(&script_path, DRIVER_SCRIPT).await?;

        info!(
            "Launching {} ({})",
            config.browser.as_str(),
            if config.debug { "debug" } else if config.headless { "headless" } else { "headed" }
        );

        let mut cmd = Command::new(&config.node_binary);
        cmd.arg(&script_path)
            .env("ACT_RUNNER_BROWSER", config.browser.as_str())
            .env("ACT_RUNNER_HEADLESS", if config.headless { "1" } else { "0" })
            .env("ACT_RUNNER_DEBUG", if config.debug { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            RunnerError::EngineStart(format!("failed to spawn {}: {}", config.node_binary.display(), e))
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(mut stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            return Err(RunnerError::EngineStart("driver stdio not captured".to_string()));
        };

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(line) = outbound_rx.recv().await {
                let written = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                };
                if let Err(e) = written.await {
                    warn!("Writing to Playwright driver failed: {}", e);
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[driver] {}", line);
            }
        });

        let pending: Pending = Arc::new(Mutex::new(Waiters::default()));
        let functions: Functions = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(read_driver(
            stdout,
            ready_tx,
            pending.clone(),
            functions.clone(),
            outbound.clone(),
        ));

        let ready = match config.launch_timeout {
            Some(limit) => timeout(limit, ready_rx).await.map_err(|_| {
                RunnerError::EngineStart(format!("browser not ready after {}s", limit.as_secs()))
            })?,
            None => ready_rx.await,
        };

        match ready {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(RunnerError::EngineStart(reason)),
            Err(_) => {
                return Err(RunnerError::EngineStart(
                    "driver exited before the browser was ready (is playwright installed?)".to_string(),
                ))
            }
        }

        info!("Browser ready");

        Ok(Self {
            outbound,
            pending,
            functions,
            next_id: AtomicU64::new(1),
            child: tokio::sync::Mutex::new(Some(child)),
            shutdown_timeout: config.shutdown_timeout,
            _script_dir: script_dir,
        })
    }

    /// Send a request and wait for its response. The outer error means the
    /// driver is gone; the inner one is an error reported by Playwright.
    async fn call(&self, request: DriverRequest<'_>) -> RunnerResult<Result<Value, String>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode(id, &request)?.to_string();

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(RunnerError::DriverClosed);
            }
            pending.open.insert(id, tx);
        }

        if self.outbound.send(line).is_err() {
            self.pending.lock().open.remove(&id);
            return Err(RunnerError::DriverClosed);
        }

        rx.await.map_err(|_| RunnerError::DriverClosed)
    }
}

/// Route driver output to waiting requests and answer page callbacks
async fn read_driver(
    stdout: ChildStdout,
    ready_tx: oneshot::Sender<Result<(), String>>,
    pending: Pending,
    functions: Functions,
    outbound: mpsc::UnboundedSender<String>,
) {
    let mut ready_tx = Some(ready_tx);
    let mut lines = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let message: DriverMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(_) => {
                debug!("[driver] {}", line);
                continue;
            }
        };

        match message {
            DriverMessage::Ready => {
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            DriverMessage::Fatal { error } => {
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Err(error));
                } else {
                    warn!("Playwright driver failed: {}", error);
                }
            }
            DriverMessage::Response { id, value, error } => {
                let waiter = pending.lock().open.remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(match error {
                            Some(e) => Err(e),
                            None => Ok(value),
                        });
                    }
                    None => warn!("Driver response for unknown request {}", id),
                }
            }
            DriverMessage::Call { call_id, page, name, args } => {
                let function = functions.lock().get(&(page, name.clone())).cloned();
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    let result = match function {
                        Some(f) => tokio::task::spawn_blocking(move || f(args))
                            .await
                            .unwrap_or_else(|e| Err(format!("host function panicked: {}", e))),
                        None => Err(format!("no host function '{}' on page {}", name, page)),
                    };
                    let reply = match result {
                        Ok(value) => json!({ "op": "call_result", "call_id": call_id, "value": value }),
                        Err(error) => json!({ "op": "call_result", "call_id": call_id, "error": error }),
                    };
                    let _ = outbound.send(reply.to_string());
                });
            }
            DriverMessage::Console { page, level, text } => {
                debug!("[page-{} console.{}] {}", page, level, text);
            }
        }
    }

    // Dropping the senders fails every in-flight request with DriverClosed
    let mut pending = pending.lock();
    pending.closed = true;
    pending.open.clear();
    drop(pending);
    debug!("Playwright driver output closed");
}

#[async_trait]
impl BrowserEngine for PlaywrightEngine {
    async fn open_page(&self) -> RunnerResult<PageId> {
        let value = self
            .call(DriverRequest::NewPage)
            .await?
            .map_err(RunnerError::PageOpen)?;
        value
            .as_u64()
            .map(PageId)
            .ok_or_else(|| RunnerError::PageOpen(format!("driver returned page id {}", value)))
    }

    async fn navigate(&self, page: PageId, url: &str) -> RunnerResult<()> {
        self.call(DriverRequest::Goto { page: page.0, url })
            .await?
            .map(drop)
            .map_err(|reason| RunnerError::Navigation {
                url: url.to_string(),
                reason,
            })
    }

    async fn inject_script(&self, page: PageId, script: &ScriptSource) -> RunnerResult<()> {
        let injection_failed = |reason: String| RunnerError::ScriptInjection {
            script: script.to_string(),
            reason,
        };

        let content;
        let request = match script {
            ScriptSource::Url(url) => DriverRequest::AddScript {
                page: page.0,
                url: Some(url.as_str()),
                content: None,
            },
            ScriptSource::Path(path) => {
                content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| injection_failed(e.to_string()))?;
                DriverRequest::AddScript {
                    page: page.0,
                    url: None,
                    content: Some(content.as_str()),
                }
            }
            ScriptSource::Inline(body) => DriverRequest::AddScript {
                page: page.0,
                url: None,
                content: Some(body.as_str()),
            },
        };

        self.call(request).await?.map(drop).map_err(injection_failed)
    }

    async fn set_global(&self, page: PageId, name: &str, value: &Value) -> RunnerResult<()> {
        self.call(DriverRequest::SetGlobal { page: page.0, name, value })
            .await?
            .map(drop)
            .map_err(|reason| RunnerError::Expose {
                name: name.to_string(),
                reason,
            })
    }

    async fn expose_function(&self, page: PageId, name: &str, function: HostFunction) -> RunnerResult<()> {
        self.functions.lock().insert((page.0, name.to_string()), function);
        self.call(DriverRequest::Expose { page: page.0, name })
            .await?
            .map(drop)
            .map_err(|reason| RunnerError::Expose {
                name: name.to_string(),
                reason,
            })
    }

    async fn evaluate(&self, page: PageId, routine: &str) -> RunnerResult<Value> {
        self.call(DriverRequest::Evaluate { page: page.0, source: routine })
            .await?
            .map_err(RunnerError::Evaluation)
    }

    async fn close_page(&self, page: PageId) -> RunnerResult<()> {
        self.functions.lock().retain(|(p, _), _| *p != page.0);
        self.call(DriverRequest::ClosePage { page: page.0 })
            .await?
            .map(drop)
            .map_err(RunnerError::PageClose)
    }

    async fn stop(&self) -> RunnerResult<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        info!("Stopping browser");

        let closed = match self.call(DriverRequest::Shutdown).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RunnerError::EngineStop(e)),
            Err(e) => Err(RunnerError::EngineStop(e.to_string())),
        };

        match timeout(self.shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!("Playwright driver exited with {}", status),
            Ok(Err(e)) => warn!("Waiting for Playwright driver failed: {}", e),
            Err(_) => {
                warn!("Playwright driver did not exit, killing it");
                child.kill().await?;
            }
        }

        closed
    }
}
