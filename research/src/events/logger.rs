//! EventLogger - persists the event stream to a JSONL file
//!
//! Off by default; enabled by config (see [`crate::config::Config::event_log_path`]).
//! Useful for replaying or auditing a run after the fact.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::Event;

#[derive(Serialize)]
struct LogEntry<'a> {
    ts: chrono::DateTime<Utc>,
    event: &'a Event,
}

/// Appends every event on the bus to a single JSONL file.
pub struct EventLogger {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl EventLogger {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "Opening event log file");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, writer: Mutex::new(BufWriter::new(file)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_event(&self, event: &Event) -> std::io::Result<()> {
        let entry = LogEntry { ts: Utc::now(), event };
        let json = serde_json::to_string(&entry)?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{json}")?;
        writer.flush()
    }

    /// Consume events from the bus until it closes, spawned as a background task.
    pub async fn run(self: Arc<Self>, event_bus: Arc<EventBus>) {
        debug!("Draining event bus to log file");
        let mut rx = event_bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(error = %e, "Failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "Lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Channel closed, shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_event_appends_jsonl_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = EventLogger::open(&path).unwrap();
        logger
            .write_event(&Event::Complete { run_id: "r1".into(), completion_reason: "answered".into(), step_count: 2 })
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert!(parsed.get("ts").is_some());
        assert!(parsed.get("event").is_some());
    }

    #[test]
    fn multiple_writes_append_multiple_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = EventLogger::open(&path).unwrap();
        for i in 0..3 {
            logger.write_event(&Event::IterationStart { run_id: "r1".into(), step: i }).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn run_drains_bus_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = Arc::new(EventLogger::open(&path).unwrap());
        let bus = Arc::new(EventBus::new(16));

        let handle = tokio::spawn(logger.clone().run(bus.clone()));
        bus.emit(Event::IterationStart { run_id: "r1".into(), step: 1 });
        bus.emit(Event::Complete { run_id: "r1".into(), completion_reason: "answered".into(), step_count: 1 });
        drop(bus);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), handle).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
