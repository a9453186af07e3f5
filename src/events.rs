use crate::record::{Record, State};
use crate::registry::{RecordId, StateChange};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Append-only JSONL log of registry activity, one file per run
pub struct EventLog {
    pub path: PathBuf,
    session_id: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

fn record_json(id: RecordId, record: &Record) -> serde_json::Value {
    serde_json::json!({
        "id": id.to_string(),
        "code": record.code,
        "input_time": record.input_time,
        "output_time": record.output_time,
    })
}

impl EventLog {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            session_id: session_id.to_string(),
            file,
        })
    }

    /// Open `<dir>/<session_id>.jsonl`, creating the directory
    pub fn in_dir(dir: &Path, session_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create events dir {}", dir.display()))?;
        Self::new(&dir.join(format!("{}.jsonl", session_id)), session_id)
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn session_start(&mut self, interval: Duration) -> Result<()> {
        self.log(
            "session_start",
            serde_json::json!({ "interval_ms": interval.as_millis() as u64 }),
        )
    }

    pub fn record_added(&mut self, id: RecordId, record: &Record) -> Result<()> {
        self.log("record_added", record_json(id, record))
    }

    pub fn record_updated(&mut self, id: RecordId, record: &Record) -> Result<()> {
        self.log("record_updated", record_json(id, record))
    }

    pub fn record_removed(&mut self, id: RecordId, record: &Record) -> Result<()> {
        self.log("record_removed", record_json(id, record))
    }

    /// Log a state transition seen during a refresh
    pub fn state_changed(&mut self, change: &StateChange, at: NaiveDateTime) -> Result<()> {
        self.log(
            "state_changed",
            serde_json::json!({
                "id": change.id.to_string(),
                "code": change.code,
                "from": change.from,
                "to": change.to,
                "at": at,
            }),
        )
    }

    pub fn watch_start(&mut self, interval: Duration) -> Result<()> {
        self.log(
            "watch_start",
            serde_json::json!({ "interval_ms": interval.as_millis() as u64 }),
        )
    }

    pub fn watch_stop(&mut self, ticks: u64, states: &[State]) -> Result<()> {
        self.log(
            "watch_stop",
            serde_json::json!({ "ticks": ticks, "states": states }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use chrono::{NaiveDate, TimeDelta};

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_events_are_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = EventLog::in_dir(&dir.path().join("events"), "abc").unwrap();
        assert!(log.path.ends_with("events/abc.jsonl"));

        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut reg = Registry::new();
        let output = now + TimeDelta::minutes(10);
        let record = Record::with_window("fix0002", Some(now), Some(output));
        let id = reg.add(record.clone());

        log.session_start(Duration::from_secs(1)).unwrap();
        log.record_added(id, &record).unwrap();
        for change in reg.refresh_all(now) {
            log.state_changed(&change, now).unwrap();
        }
        log.watch_stop(3, &[State::Active]).unwrap();

        let events = read_lines(&log.path);
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e["session_id"] == "abc"));
        assert_eq!(events[0]["type"], "session_start");
        assert_eq!(events[1]["type"], "record_added");
        assert_eq!(events[1]["code"], "fix0002");
        assert_eq!(events[1]["input_time"], "2024-01-01T12:00:00");
        assert_eq!(events[2]["type"], "state_changed");
        assert_eq!(events[2]["from"], "FREE");
        assert_eq!(events[2]["to"], "ACTIVE");
        assert_eq!(events[3]["states"][0], "ACTIVE");
    }

    #[test]
    fn test_log_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        for ms in [1000, 250] {
            let mut log = EventLog::new(&path, "s").unwrap();
            log.session_start(Duration::from_millis(ms)).unwrap();
        }
        let events = read_lines(&path);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["interval_ms"], 250);
    }
}
