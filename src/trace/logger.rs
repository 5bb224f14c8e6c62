use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::scenario::scenario_model::StepResult;
use crate::trace::trace::TraceEvent;

/// JSONL sink for step events, shared by every worker of a suite.
///
/// Recording is best effort: a failed write is logged and the run goes on.
pub struct TraceLogger {
    sink: Option<Sink>,
    written: AtomicUsize,
}

struct Sink {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

impl TraceLogger {
    /// Open `path` for appending, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Some(Sink {
                path: path.to_path_buf(),
                out: Mutex::new(BufWriter::new(file)),
            }),
            written: AtomicUsize::new(0),
        })
    }

    /// Like [`open`](Self::open), falling back to a disabled logger.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::open(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "step trace disabled");
            Self::disabled()
        })
    }

    pub fn disabled() -> Self {
        Self {
            sink: None,
            written: AtomicUsize::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.path.as_path())
    }

    /// Events that reached the file so far.
    pub fn events_written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    pub fn record_step(&self, scenario: &str, step: &StepResult) {
        self.log(&TraceEvent::for_step(scenario, step));
    }

    pub fn log(&self, event: &TraceEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, scenario = %event.scenario, "unencodable trace event");
                return;
            }
        };

        // Lines are flushed whole, so a poisoned lock still guards a usable writer
        let mut out = sink.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match writeln!(out, "{}", line).and_then(|_| out.flush()) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => tracing::warn!(
                path = %sink.path.display(),
                scenario = %event.scenario,
                step = event.step_index,
                error = %e,
                "trace write failed"
            ),
        }
    }
}
