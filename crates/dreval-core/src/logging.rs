//! Per-run log with explicit lifecycle.
//!
//! Console output goes through `tracing` (the binary installs the
//! subscriber); the per-version `log.txt` is a file handler owned by the
//! evaluator, opened on construction and flushed on drop. File writes are
//! best-effort: a failing log line never aborts a run.

use crate::config::LogLevel;
use crate::errors::EvalError;
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug)]
pub struct RunLog {
    file: Option<Mutex<BufWriter<File>>>,
    level: LogLevel,
}

impl RunLog {
    /// Open (append) the run's log file.
    pub fn open(path: &Path, level: LogLevel) -> Result<Self, EvalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EvalError::io("open", path, e))?;
        Ok(Self {
            file: Some(Mutex::new(BufWriter::new(file))),
            level,
        })
    }

    /// Console-only logging (save_log disabled).
    pub fn console_only(level: LogLevel) -> Self {
        Self { file: None, level }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::error!("{msg}");
        self.write(LogLevel::Error, msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::warn!("{msg}");
        self.write(LogLevel::Warn, msg);
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::info!("{msg}");
        self.write(LogLevel::Info, msg);
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::debug!("{msg}");
        self.write(LogLevel::Debug, msg);
    }

    fn write(&self, level: LogLevel, msg: &str) {
        if level.rank() > self.level.rank() {
            return;
        }
        let Some(file) = &self.file else {
            return;
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{stamp} [{}] {msg}\n", level.as_str());
        if let Ok(mut writer) = file.lock() {
            let _ = writer.write_all(line.as_bytes());
        }
    }

    pub fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut writer) = file.lock() {
                let _ = writer.flush();
            }
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_level_filtered_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let log = RunLog::open(&path, LogLevel::Info).unwrap();
        log.info("kept");
        log.debug("dropped");
        log.flush();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[INFO] kept"));
        assert!(!text.contains("dropped"));
    }

    #[test]
    fn console_only_writes_nothing() {
        let log = RunLog::console_only(LogLevel::Debug);
        log.info("nowhere to go");
        log.flush();
    }
}
