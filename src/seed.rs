//! Initial records: the built-in demo set and TOML records files.
//!
//! A records file holds a list of `[[records]]` tables:
//!
//! ```toml
//! [[records]]
//! code = "fix0001"
//! input_time = "2024-01-01 11:00"
//! output_time = "+10m"
//! ```
//!
//! Times use the forms accepted by `timespec::parse`, relative to load time.

use crate::record::Record;
use crate::timespec;
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    records: Vec<RecordEntry>,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    #[serde(default)]
    code: String,
    #[serde(default)]
    input_time: Option<String>,
    #[serde(default)]
    output_time: Option<String>,
}

/// Four sample rows, one per state, anchored on `now` rounded down to the minute
pub fn demo_records(now: NaiveDateTime) -> Vec<Record> {
    let now = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let hour = TimeDelta::hours(1);
    let five = TimeDelta::minutes(5);
    let ten = TimeDelta::minutes(10);

    vec![
        Record::with_window("fix0001", Some(now - hour), Some(now - hour + ten)),
        Record::with_window("fix0002", Some(now), Some(now + ten)),
        Record::new("fix0003"),
        Record::with_window("fix0004", Some(now + five), Some(now + five + ten)),
    ]
}

/// Load records from a TOML file
pub fn load_records(path: &Path, now: NaiveDateTime) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records file {}", path.display()))?;
    parse_records(&content, now)
        .with_context(|| format!("in records file {}", path.display()))
}

fn parse_records(content: &str, now: NaiveDateTime) -> Result<Vec<Record>> {
    let file: RecordsFile = toml::from_str(content)?;
    file.records
        .into_iter()
        .enumerate()
        .map(|(i, entry)| -> Result<Record> {
            let parse_field = |value: Option<&str>, field: &str| {
                value
                    .map(|v| timespec::parse(v, now))
                    .transpose()
                    .map(Option::flatten)
                    .with_context(|| format!("records[{}].{}", i, field))
            };
            let input = parse_field(entry.input_time.as_deref(), "input_time")?;
            let output = parse_field(entry.output_time.as_deref(), "output_time")?;
            Ok(Record::with_window(entry.code, input, output))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::State;
    use chrono::NaiveDate;
    use std::io::Write;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_demo_records_cover_every_state() {
        let now = noon();
        let records = demo_records(now);
        let evals: Vec<_> = records.iter().map(|r| r.evaluate(now)).collect();

        assert_eq!(evals[0].state, State::Expired);
        assert_eq!(evals[0].remaining, "0");
        assert_eq!(evals[1].state, State::Active);
        assert_eq!(evals[1].remaining, "00:10:00");
        assert_eq!(evals[2].state, State::Free);
        assert_eq!(evals[2].remaining, "");
        assert_eq!(evals[3].state, State::Waiting);
        assert_eq!(evals[3].remaining, "00:10");
    }

    #[test]
    fn test_demo_records_round_to_minute() {
        let now = noon() + TimeDelta::seconds(42) + TimeDelta::milliseconds(300);
        let records = demo_records(now);
        assert_eq!(records[1].input_time, Some(noon()));
        // Active row has a little less than ten minutes left
        assert_eq!(records[1].evaluate(now).remaining, "00:09:17");
    }

    #[test]
    fn test_parse_records() {
        let content = r#"
[[records]]
code = "a"
input_time = "2024-01-01 11:00"
output_time = "+10m"

[[records]]
code = "b"

[[records]]
code = "c"
input_time = "none"
output_time = "13:00"
"#;
        let records = parse_records(content, noon()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].code, "a");
        assert_eq!(
            records[0].output_time,
            Some(noon() + TimeDelta::minutes(10))
        );
        assert!(records[1].input_time.is_none());
        assert!(records[2].input_time.is_none());
        assert!(records[2].output_time.is_some());
    }

    #[test]
    fn test_parse_records_reports_field() {
        let content = r#"
[[records]]
code = "ok"

[[records]]
code = "bad"
output_time = "whenever"
"#;
        let err = parse_records(content, noon()).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("records[1].output_time"));
        assert!(chain.contains("whenever"));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = "[[records]]\ncode = \"x\"\ninput_time = \"now\"\noutput_time = \"+1h\"";
        writeln!(file, "{}", content).unwrap();
        let records = load_records(file.path(), noon()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].evaluate(noon()).remaining, "01:00:00");
    }

    #[test]
    fn test_load_records_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = load_records(&path, noon()).unwrap_err();
        assert!(err.to_string().contains("failed to read records file"));
    }
}
