//! FileSink - hourly-rolling append-only record log
//!
//! Lines are `table \t key \t json \n` appended to `<path>.<YYYYMMDDHH>`
//! (local time). The file is reopened whenever the hour bucket changes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use contracts::{ContractError, RecordSink, SinkOption, SinkOptions};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::metrics::SinkMetrics;

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[derive(Default)]
struct OpenFile {
    bucket: String,
    file: Option<File>,
}

/// Sink that appends records to hourly files
pub struct FileSink {
    name: String,
    /// Resolved path prefix, set by `initialize`
    path: Option<PathBuf>,
    current: Mutex<OpenFile>,
    clock: Clock,
    metrics: Arc<SinkMetrics>,
}

impl FileSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, Arc::new(Local::now))
    }

    pub fn with_clock(name: impl Into<String>, clock: Clock) -> Self {
        let name = name.into();
        Self {
            metrics: Arc::new(SinkMetrics::new(name.clone())),
            name,
            path: None,
            current: Mutex::new(OpenFile::default()),
            clock,
        }
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Path of the file for a given hour bucket
    pub fn bucket_path(prefix: &Path, bucket: &str) -> PathBuf {
        let mut name = prefix.as_os_str().to_owned();
        name.push(".");
        name.push(bucket);
        PathBuf::from(name)
    }

    /// Make sure the file for the current hour is open
    fn roll(&self, state: &mut OpenFile) {
        let Some(prefix) = &self.path else {
            return;
        };
        let bucket = (self.clock)().format("%Y%m%d%H").to_string();
        if state.bucket == bucket {
            return;
        }

        let path = Self::bucket_path(prefix, &bucket);
        state.file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                debug!(sink = %self.name, path = %path.display(), "Opened output file");
                Some(file)
            }
            Err(e) => {
                warn!(sink = %self.name, path = %path.display(), error = %e, "Open file failed");
                None
            }
        };
        state.bucket = bucket;
    }
}

impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self) -> Vec<SinkOption> {
        vec![
            SinkOption::new("file_name", "path prefix of the output files")
                .with_default("production"),
            SinkOption::new("data_dir", "directory relative file names resolve against")
                .with_default("."),
        ]
    }

    #[instrument(name = "file_sink_initialize", skip(self, options), fields(sink = %self.name))]
    fn initialize(&mut self, options: &SinkOptions) -> Result<(), ContractError> {
        let file_name = PathBuf::from(&options.file.file_name);
        let path = if file_name.is_relative() {
            options.file.data_dir.join(file_name)
        } else {
            file_name
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ContractError::sink_init(&self.name, format!("{}: {e}", parent.display())))?;
        }
        info!(sink = %self.name, path = %path.display(), "FileSink initialized");
        self.path = Some(path);
        Ok(())
    }

    fn startup(&self) -> Result<(), ContractError> {
        if let Ok(mut state) = self.current.lock() {
            self.roll(&mut state);
        }
        Ok(())
    }

    fn produce(&self, table: &str, key: &str, value: &Value) {
        self.metrics.inc_produced();
        let Ok(mut state) = self.current.lock() else {
            return;
        };
        self.roll(&mut state);

        let Some(file) = state.file.as_mut() else {
            warn!(sink = %self.name, table, key, "File not open, record dropped");
            self.metrics.inc_abandoned();
            return;
        };
        let line = format!("{table}\t{key}\t{value}\n");
        match file.write_all(line.as_bytes()) {
            Ok(()) => self.metrics.inc_delivered(),
            Err(e) => {
                warn!(sink = %self.name, table, key, error = %e, "Write failed");
                self.metrics.inc_abandoned();
            }
        }
    }

    #[instrument(name = "file_sink_stop", skip(self), fields(sink = %self.name))]
    fn stop(&self) {
        if let Ok(mut state) = self.current.lock() {
            if let Some(mut file) = state.file.take() {
                if let Err(e) = file.flush() {
                    warn!(sink = %self.name, error = %e, "Flush failed on stop");
                }
            }
            state.bucket.clear();
        }
        debug!(sink = %self.name, "FileSink stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    fn options(dir: &Path, file_name: &str) -> SinkOptions {
        let mut options = SinkOptions::default();
        options.file.file_name = file_name.to_string();
        options.file.data_dir = dir.to_path_buf();
        options
    }

    fn hour_clock(hour: Arc<AtomicU32>) -> Clock {
        Arc::new(move || {
            Local
                .with_ymd_and_hms(2019, 5, 21, hour.load(Ordering::SeqCst), 30, 0)
                .single()
                .unwrap()
        })
    }

    #[test]
    fn test_line_format_and_relative_path() {
        let dir = tempdir().unwrap();
        let hour = Arc::new(AtomicU32::new(10));
        let mut sink = FileSink::with_clock("file", hour_clock(hour));
        sink.initialize(&options(dir.path(), "out/records")).unwrap();
        sink.startup().unwrap();

        sink.produce("eosio.es.transfer", "k1", &json!({"a": 1}));
        sink.stop();

        let path = dir.path().join("out/records.2019052110");
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "eosio.es.transfer\tk1\t{\"a\":1}\n");
        assert_eq!(sink.metrics().delivered(), 1);
    }

    #[test]
    fn test_rolls_on_hour_change() {
        let dir = tempdir().unwrap();
        let hour = Arc::new(AtomicU32::new(10));
        let mut sink = FileSink::with_clock("file", hour_clock(Arc::clone(&hour)));
        sink.initialize(&options(dir.path(), "production")).unwrap();
        sink.startup().unwrap();

        sink.produce("t", "a", &json!({}));
        hour.store(11, Ordering::SeqCst);
        sink.produce("t", "b", &json!({}));
        sink.produce("t", "c", &json!({}));
        sink.stop();

        let first = fs::read_to_string(dir.path().join("production.2019052110")).unwrap();
        let second = fs::read_to_string(dir.path().join("production.2019052111")).unwrap();
        assert_eq!(first.lines().count(), 1);
        assert_eq!(second.lines().count(), 2);
    }

    #[test]
    fn test_appends_across_restarts() {
        let dir = tempdir().unwrap();
        let hour = Arc::new(AtomicU32::new(3));
        for key in ["x", "y"] {
            let mut sink = FileSink::with_clock("file", hour_clock(Arc::clone(&hour)));
            sink.initialize(&options(dir.path(), "production")).unwrap();
            sink.startup().unwrap();
            sink.produce("t", key, &json!({}));
            sink.stop();
        }
        let content = fs::read_to_string(dir.path().join("production.2019052103")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
