use heartwatch_core::epoch_now;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only JSON Lines file, one compact object per event.
pub struct EventLog {
    path: PathBuf,
    file: Mutex<File>,
}

#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    logged_at: f64,
    #[serde(flatten)]
    event: &'a T,
}

impl EventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<T: Serialize>(&self, event: &T) -> io::Result<()> {
        let line = Line {
            logged_at: epoch_now(),
            event,
        };
        let mut buf = serde_json::to_vec(&line)?;
        buf.push(b'\n');
        self.file.lock().write_all(&buf)
    }

    /// Log and swallow write failures; the event log never stops the monitor.
    pub fn record<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.append(event) {
            tracing::error!("[events] failed to append to {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heartwatch_core::HeartbeatEvent;

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.jsonl")).unwrap();

        log.record(&HeartbeatEvent::Collect {
            mac: "a".into(),
            count: 1,
            history: vec![10.0],
        });
        log.record(&HeartbeatEvent::PublishFailure {
            mac: "a".into(),
            reason: "rc=4".into(),
        });

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "COLLECT");
        assert_eq!(lines[1]["reason"], "rc=4");
        assert!(lines[1]["logged_at"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn reopening_keeps_previous_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        EventLog::open(&path).unwrap().record(&serde_json::json!({"n": 1}));
        EventLog::open(&path).unwrap().record(&serde_json::json!({"n": 2}));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
