//! Optional NDJSON request/response tracing for AI drivers (spec §4.9, §6).
//!
//! Modeled as an injected `TraceSink` capability rather than a process-wide
//! singleton (spec §9 "Replacing a process-wide tracer singleton"): a no-op
//! default is always available, and a global install is left to the caller.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub timestamp_millis: i64,
    pub driver: String,
    pub endpoint: String,
    pub method: String,
    pub model: String,
    pub request_body: String,
    pub status_code: u16,
    pub response_body: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub trait TraceSink: Send + Sync {
    fn trace(&self, entry: &TraceEntry);
}

#[derive(Default)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn trace(&self, _entry: &TraceEntry) {}
}

/// Append-only NDJSON file sink. Writes are serialized through a mutex;
/// the file is opened once at construction with 0600 permissions on unix.
pub struct FileTraceSink {
    file: Mutex<File>,
}

impl FileTraceSink {
    pub fn open(path: &std::path::Path) -> std::io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl TraceSink for FileTraceSink {
    fn trace(&self, entry: &TraceEntry) {
        let Ok(mut line) = serde_json::to_string(entry) else { return };
        line.push('\n');
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    fn sample_entry(i: u64) -> TraceEntry {
        TraceEntry {
            timestamp_millis: 0,
            driver: "xai".to_string(),
            endpoint: "https://api.x.ai/v1/chat/completions".to_string(),
            method: "POST".to_string(),
            model: "grok-4".to_string(),
            request_body: "{}".to_string(),
            status_code: 200,
            response_body: "{}".to_string(),
            error: None,
            duration_ms: i,
        }
    }

    #[test]
    fn noop_sink_never_panics() {
        let sink = NoopTraceSink;
        sink.trace(&sample_entry(0));
    }

    #[test]
    fn file_sink_writes_one_parseable_json_object_per_line() {
        let dir = std::env::temp_dir().join(format!("namelens-trace-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trace.ndjson");

        let sink = FileTraceSink::open(&path).unwrap();
        for i in 0..3 {
            sink.trace(&sample_entry(i));
        }
        drop(sink);

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = BufReader::new(file).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            let _: serde_json::Value = serde_json::from_str(line).expect("each line must parse independently");
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
