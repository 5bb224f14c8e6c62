use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PageError;
use crate::page::context::{NodeId, NodeSnapshot, PageContext};

/// Deadline for the ready line sent after launch.
const READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Request sent to the driver process over stdin (one JSON line).
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DriverRequest {
    Reset,
    Navigate { url: String },
    CurrentUrl,
    Query { selector: String },
    Inspect { node: NodeId },
    Type { node: NodeId, text: String },
    Click { node: NodeId },
    Quit,
}

impl DriverRequest {
    pub fn name(&self) -> &'static str {
        match self {
            DriverRequest::Reset => "reset",
            DriverRequest::Navigate { .. } => "navigate",
            DriverRequest::CurrentUrl => "current_url",
            DriverRequest::Query { .. } => "query",
            DriverRequest::Inspect { .. } => "inspect",
            DriverRequest::Type { .. } => "type",
            DriverRequest::Click { .. } => "click",
            DriverRequest::Quit => "quit",
        }
    }
}

/// Response received from the driver over stdout (one JSON line).
#[derive(Debug, Deserialize, PartialEq, Default)]
pub struct DriverResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Set when the error is a detached node rather than a failed command
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<NodeSnapshot>>,
    #[serde(default)]
    pub node: Option<NodeSnapshot>,
}

/// How to launch the driver process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Program to execute
    pub command: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// How long to wait for any single response line
    #[serde(alias = "responseTimeoutMs")]
    pub response_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: vec!["driver/page_driver.js".to_string()],
            response_timeout_ms: 30_000,
        }
    }
}

/// Page context backed by a long-lived external driver process.
///
/// Commands are sent as NDJSON over stdin and answered on stdout. The driver
/// owns the browser; this side only speaks the protocol.
///
/// Stdout is read on a dedicated thread so every response has a deadline
/// (`response_timeout_ms`). A driver that misses it is killed and the session
/// reports the context as lost. Blank lines between responses are ignored.
pub struct DriverSession {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<io::Result<String>>,
    response_timeout: Duration,
    closed: bool,
}

impl DriverSession {
    /// Spawn the driver and wait for its ready line.
    pub fn launch(config: &DriverConfig) -> Result<Self, PageError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PageError::Io {
                context: format!("spawning {}", config.command),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PageError::ContextLost("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PageError::ContextLost("driver stdout unavailable".into()))?;

        let mut session = DriverSession {
            child,
            stdin,
            lines: spawn_reader(stdout),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            closed: false,
        };

        let response = session.read_response("ready signal", READY_TIMEOUT)?;
        if !response.ok || response.ready != Some(true) {
            return Err(PageError::Protocol {
                command: "launch".into(),
                error: "driver did not report ready".into(),
            });
        }

        tracing::info!(command = %config.command, "driver session ready");
        Ok(session)
    }

    fn read_response(
        &mut self,
        context: &str,
        timeout: Duration,
    ) -> Result<DriverResponse, PageError> {
        loop {
            let line = match self.lines.recv_timeout(timeout) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => {
                    self.closed = true;
                    return Err(PageError::Io {
                        context: format!("reading {}", context),
                        source: e,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(context, "driver stopped answering, killing it");
                    self.abandon();
                    return Err(PageError::ContextLost(format!(
                        "driver did not answer {} within {}ms",
                        context,
                        timeout.as_millis()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.closed = true;
                    return Err(PageError::ContextLost(format!(
                        "driver closed its output while waiting for {}",
                        context
                    )));
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(line.trim()).map_err(|e| PageError::Json {
                context: context.to_string(),
                source: e,
            });
        }
    }

    /// Give up on an unresponsive driver.
    fn abandon(&mut self) {
        self.closed = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    /// Send a request and read its response.
    fn send(&mut self, request: &DriverRequest) -> Result<DriverResponse, PageError> {
        if self.closed {
            return Err(PageError::ContextLost("driver session already closed".into()));
        }

        let json = serde_json::to_string(request).map_err(|e| PageError::Json {
            context: "encoding request".into(),
            source: e,
        })?;

        if let Err(e) = writeln!(self.stdin, "{}", json).and_then(|_| self.stdin.flush()) {
            // A broken pipe means the driver is gone
            self.closed = true;
            return Err(PageError::Io {
                context: format!("sending {}", request.name()),
                source: e,
            });
        }

        self.read_response(request.name(), self.response_timeout)
    }

    /// Send a request and turn a negative answer into an error.
    fn send_ok(&mut self, request: &DriverRequest) -> Result<DriverResponse, PageError> {
        let response = self.send(request)?;
        if response.ok {
            return Ok(response);
        }
        match request {
            DriverRequest::Type { node, .. } | DriverRequest::Click { node }
                if response.stale =>
            {
                Err(PageError::StaleNode(*node))
            }
            _ => Err(PageError::Protocol {
                command: request.name().into(),
                error: response.error.unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }

    pub fn quit(&mut self) -> Result<(), PageError> {
        if self.closed {
            return Ok(());
        }
        // Best effort: the process may already be gone
        let answered = self.send(&DriverRequest::Quit).is_ok();
        if answered {
            self.closed = true;
            let _ = self.child.wait();
        } else {
            self.abandon();
        }
        Ok(())
    }
}

/// Forward driver stdout line by line until it closes.
fn spawn_reader(stdout: ChildStdout) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

impl PageContext for DriverSession {
    fn reset(&mut self) -> Result<(), PageError> {
        self.send_ok(&DriverRequest::Reset).map(|_| ())
    }

    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.send_ok(&DriverRequest::Navigate { url: url.to_string() })
            .map(|_| ())
    }

    fn current_url(&mut self) -> Result<String, PageError> {
        let response = self.send_ok(&DriverRequest::CurrentUrl)?;
        response.url.ok_or_else(|| PageError::Protocol {
            command: "current_url".into(),
            error: "no url in response".into(),
        })
    }

    fn query(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, PageError> {
        let response = self.send_ok(&DriverRequest::Query {
            selector: selector.to_string(),
        })?;
        Ok(response.nodes.unwrap_or_default())
    }

    fn inspect(&mut self, node: NodeId) -> Result<Option<NodeSnapshot>, PageError> {
        let response = self.send_ok(&DriverRequest::Inspect { node })?;
        Ok(response.node)
    }

    fn type_text(&mut self, node: NodeId, text: &str) -> Result<(), PageError> {
        self.send_ok(&DriverRequest::Type {
            node,
            text: text.to_string(),
        })
        .map(|_| ())
    }

    fn click(&mut self, node: NodeId) -> Result<(), PageError> {
        self.send_ok(&DriverRequest::Click { node }).map(|_| ())
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}
