use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::trace::trace::TraceEvent;

/// Optional JSONL sink for per-call transform outcomes.
///
/// Tracing is best effort: an unopenable file leaves the sink disabled, and
/// write failures are logged and dropped. Each record is flushed so a crash
/// loses at most the line being written.
pub struct TraceLogger {
    sink: Option<Sink>,
}

struct Sink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl TraceLogger {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                debug!(path = %path.display(), "trace file opened");
                Self {
                    sink: Some(Sink {
                        path: path.to_path_buf(),
                        writer: Mutex::new(BufWriter::new(file)),
                    }),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), "trace disabled, cannot open file: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.path.as_path())
    }

    pub fn record(&self, event: &TraceEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("trace event not serializable: {}", e);
                return;
            }
        };

        let mut writer = sink.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(path = %sink.path.display(), "trace write failed: {}", e);
        }
    }
}
