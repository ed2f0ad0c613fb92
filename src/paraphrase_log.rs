//! Append-only paraphrase log
//!
//! One JSON object per line. Writers in this process are serialized through an async lock,
//! and readers tolerate a missing file, blank lines and lines that do not parse.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

/// Default number of records returned by a query
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Hard cap on the number of records returned by a query
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Default trailing window of the summary, in days
pub const DEFAULT_SUMMARY_DAYS: u32 = 7;

#[derive(Error, Debug)]
pub enum LogStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One paraphrase request and its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<FixedOffset>,
    pub request_id: String,
    pub original_text: String,
    pub paraphrased_text: String,
}

impl LogRecord {
    /// Record stamped with the current local time
    pub fn new<I, O, P>(request_id: I, original_text: O, paraphrased_text: P) -> Self
    where
        I: Into<String>,
        O: Into<String>,
        P: Into<String>,
    {
        Self {
            timestamp: Local::now().fixed_offset(),
            request_id: request_id.into(),
            original_text: original_text.into(),
            paraphrased_text: paraphrased_text.into(),
        }
    }
}

/// Render a timestamp as ISO-8601 with microseconds and offset
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse an ISO-8601 timestamp
///
/// Values without an offset are read as local time and a bare date means midnight.
/// A space in place of the offset sign is accepted, since `+` decodes to a space in
/// query strings.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }
    if value.contains('T') && value.contains(' ') {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&value.replacen(' ', "+", 1)) {
            return Some(ts);
        }
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.fixed_offset())
}

mod timestamp_format {
    use chrono::{DateTime, FixedOffset};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Selection applied by [`ParaphraseLog::query`]
#[derive(Debug, Clone, PartialEq)]
pub struct LogFilter {
    /// Inclusive lower bound
    pub start: Option<DateTime<FixedOffset>>,
    /// Inclusive upper bound
    pub end: Option<DateTime<FixedOffset>>,
    pub limit: usize,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl LogFilter {
    pub fn matches(&self, record: &LogRecord) -> bool {
        self.start.map_or(true, |start| record.timestamp >= start)
            && self.end.map_or(true, |end| record.timestamp <= end)
    }
}

/// Record counts over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub days: u32,
    /// Start of the window, `None` when it reaches back past any representable date
    pub since: Option<String>,
    pub total: usize,
    /// Counts keyed by `YYYY-MM-DD` in each record's own offset
    pub per_day: BTreeMap<String, usize>,
    pub first: Option<String>,
    pub last: Option<String>,
}

/// The log file and its writer lock
#[derive(Debug)]
pub struct ParaphraseLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ParaphraseLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line
    pub async fn append(&self, record: &LogRecord) -> Result<(), LogStoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("[{}] Appended paraphrase record", record.request_id);
        Ok(())
    }

    /// Records within the filter's bounds, in file order, at most `filter.limit` of them
    pub async fn query(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, LogStoreError> {
        let mut records = Vec::new();
        if filter.limit == 0 {
            return Ok(records);
        }

        let Some(mut lines) = self.open_lines().await? else {
            return Ok(records);
        };

        while let Some(line) = lines.next_line().await? {
            let Some(record) = parse_line(&line) else {
                continue;
            };
            if filter.matches(&record) {
                records.push(record);
                if records.len() >= filter.limit {
                    break;
                }
            }
        }

        Ok(records)
    }

    /// Count records stamped within `days` days before `now`
    pub async fn summarize(
        &self,
        days: u32,
        now: DateTime<FixedOffset>,
    ) -> Result<LogSummary, LogStoreError> {
        let since = now.checked_sub_signed(TimeDelta::days(i64::from(days)));
        let mut summary = LogSummary {
            days,
            since: since.as_ref().map(format_timestamp),
            total: 0,
            per_day: BTreeMap::new(),
            first: None,
            last: None,
        };

        let Some(mut lines) = self.open_lines().await? else {
            return Ok(summary);
        };

        let mut first: Option<DateTime<FixedOffset>> = None;
        let mut last: Option<DateTime<FixedOffset>> = None;
        while let Some(line) = lines.next_line().await? {
            let Some(record) = parse_line(&line) else {
                continue;
            };
            if since.map_or(false, |since| record.timestamp < since) {
                continue;
            }

            summary.total += 1;
            *summary
                .per_day
                .entry(record.timestamp.format("%Y-%m-%d").to_string())
                .or_insert(0) += 1;
            if first.map_or(true, |ts| record.timestamp < ts) {
                first = Some(record.timestamp);
            }
            if last.map_or(true, |ts| record.timestamp > ts) {
                last = Some(record.timestamp);
            }
        }

        summary.first = first.as_ref().map(format_timestamp);
        summary.last = last.as_ref().map(format_timestamp);
        Ok(summary)
    }

    async fn open_lines(&self) -> Result<Option<Lines<BufReader<File>>>, LogStoreError> {
        match File::open(&self.path).await {
            Ok(file) => Ok(Some(BufReader::new(file).lines())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No paraphrase log at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_line(line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping invalid log entry ({}): {}", e, line);
            None
        }
    }
}

/// Plain-text rendering used by `format=text`
pub fn format_records_as_text(records: &[LogRecord]) -> String {
    records
        .iter()
        .map(|record| {
            format!(
                "[{}] {}\nOriginal: {}\nParaphrased: {}\n",
                format_timestamp(&record.timestamp),
                record.request_id,
                record.original_text,
                record.paraphrased_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    fn record(ts: &str, id: &str) -> LogRecord {
        LogRecord {
            timestamp: at(ts),
            request_id: id.to_string(),
            original_text: format!("original {}", id),
            paraphrased_text: format!("paraphrased {}", id),
        }
    }

    async fn seeded_log(dir: &tempfile::TempDir) -> ParaphraseLog {
        let log = ParaphraseLog::new(dir.path().join("logs").join("paraphrase_logs.jsonl"));
        for (ts, id) in [
            ("2026-10-01T09:00:00+00:00", "a"),
            ("2026-10-02T09:00:00+00:00", "b"),
            ("2026-10-03T09:00:00+00:00", "c"),
            ("2026-10-04T09:00:00+00:00", "d"),
        ] {
            log.append(&record(ts, id)).await.unwrap();
        }
        log
    }

    fn ids(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.request_id.as_str()).collect()
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ParaphraseLog::new(dir.path().join("nope.jsonl"));

        assert!(log.query(&LogFilter::default()).await.unwrap().is_empty());
        let summary = log.summarize(7, Local::now().fixed_offset()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.per_day.is_empty());
    }

    #[tokio::test]
    async fn append_creates_parent_directory_and_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded_log(&dir).await;

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 4);
        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["request_id"], "a");
        assert_eq!(first["original_text"], "original a");
        assert_eq!(first["paraphrased_text"], "paraphrased a");
        assert_eq!(first["timestamp"], "2026-10-01T09:00:00.000000+00:00");
    }

    #[tokio::test]
    async fn bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded_log(&dir).await;

        let filter = LogFilter {
            start: Some(at("2026-10-02T09:00:00+00:00")),
            end: Some(at("2026-10-03T09:00:00+00:00")),
            ..LogFilter::default()
        };
        assert_eq!(ids(&log.query(&filter).await.unwrap()), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn bounds_compare_instants_across_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded_log(&dir).await;

        // 11:00 at +02:00 is 09:00 UTC
        let filter = LogFilter {
            start: Some(at("2026-10-04T11:00:00+02:00")),
            ..LogFilter::default()
        };
        assert_eq!(ids(&log.query(&filter).await.unwrap()), vec!["d"]);
    }

    #[tokio::test]
    async fn limit_keeps_the_earliest_matches() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded_log(&dir).await;

        let filter = LogFilter {
            limit: 2,
            ..LogFilter::default()
        };
        assert_eq!(ids(&log.query(&filter).await.unwrap()), vec!["a", "b"]);

        let filter = LogFilter {
            limit: 0,
            ..LogFilter::default()
        };
        assert!(log.query(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_and_legacy_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paraphrase_logs.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"timestamp\": \"2026-10-01T09:00:00.123456\", \"request_id\": \"legacy\", ",
                "\"original_text\": \"o\", \"paraphrased_text\": \"p\"}\n",
                "not json at all\n",
                "\n",
                "{\"timestamp\": \"yesterday\", \"request_id\": \"bad\", ",
                "\"original_text\": \"o\", \"paraphrased_text\": \"p\"}\n",
            ),
        )
        .unwrap();

        let log = ParaphraseLog::new(&path);
        let records = log.query(&LogFilter::default()).await.unwrap();
        assert_eq!(ids(&records), vec!["legacy"]);
        assert_eq!(
            records[0].timestamp.naive_local(),
            NaiveDate::from_ymd_opt(2026, 10, 1)
                .unwrap()
                .and_hms_micro_opt(9, 0, 0, 123_456)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn summary_counts_trailing_days() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded_log(&dir).await;
        log.append(&record("2026-10-04T18:30:00+00:00", "e"))
            .await
            .unwrap();

        let summary = log
            .summarize(2, at("2026-10-05T00:00:00+00:00"))
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.per_day.get("2026-10-03"), Some(&1));
        assert_eq!(summary.per_day.get("2026-10-04"), Some(&2));
        assert_eq!(summary.per_day.get("2026-10-02"), None);
        assert_eq!(summary.first.as_deref(), Some("2026-10-03T09:00:00.000000+00:00"));
        assert_eq!(summary.last.as_deref(), Some("2026-10-04T18:30:00.000000+00:00"));
        assert_eq!(summary.since.as_deref(), Some("2026-10-03T00:00:00.000000+00:00"));
    }

    #[tokio::test]
    async fn concurrent_appends_stay_line_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let log = std::sync::Arc::new(ParaphraseLog::new(dir.path().join("log.jsonl")));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move {
                    log.append(&LogRecord::new(format!("req-{}", i), "text ".repeat(200), "p"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let filter = LogFilter {
            limit: MAX_QUERY_LIMIT,
            ..LogFilter::default()
        };
        assert_eq!(log.query(&filter).await.unwrap().len(), 20);
    }

    #[test]
    fn parse_timestamp_variants() {
        assert_eq!(
            parse_timestamp("2026-10-17T12:00:00+02:00"),
            Some(at("2026-10-17T12:00:00+02:00"))
        );
        assert_eq!(
            parse_timestamp("2026-10-17T12:00:00 02:00"),
            Some(at("2026-10-17T12:00:00+02:00"))
        );
        assert_eq!(
            parse_timestamp("2026-10-17T12:00:00Z"),
            Some(at("2026-10-17T12:00:00+00:00"))
        );
        assert!(parse_timestamp("2026-10-17T12:00:00").is_some());
        assert!(parse_timestamp("2026-10-17").is_some());
        assert!(parse_timestamp("next tuesday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn text_rendering() {
        let text = format_records_as_text(&[
            record("2026-10-01T09:00:00+00:00", "a"),
            record("2026-10-02T09:00:00+00:00", "b"),
        ]);
        assert_eq!(
            text,
            "[2026-10-01T09:00:00.000000+00:00] a\nOriginal: original a\nParaphrased: paraphrased a\n\
             \n[2026-10-02T09:00:00.000000+00:00] b\nOriginal: original b\nParaphrased: paraphrased b\n"
        );
        assert_eq!(format_records_as_text(&[]), "");
    }
}
