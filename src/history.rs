use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;

use crate::model::HistoryEntry;

/// Durable, append-only line sink behind the audit trail.
///
/// The recorder writes exactly one line per recorded event and never
/// rewrites or truncates previous lines. Injectable so tests can swap
/// in an in-memory sink and assert exact contents.
pub trait HistorySink: Send {
    fn append_line(&mut self, line: &str) -> io::Result<()>;
}

/// File-backed sink with open-append-close semantics per line.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistorySink for FileSink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

/// Test sink that collects lines in memory and hands out a shared view.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("Poisoned Lock").clone()
    }
}

impl HistorySink for MemorySink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .expect("Poisoned Lock")
            .push(line.to_string());
        Ok(())
    }
}

/// Ordered, append-only audit trail.
///
/// Entries live in memory for the life of the process and are mirrored
/// to the durable sink, in that order. There is no API to delete or
/// rewrite an entry.
pub struct HistoryRecorder {
    entries: Mutex<Vec<HistoryEntry>>,
    sink: Mutex<Box<dyn HistorySink>>,
}

impl HistoryRecorder {
    pub fn new(sink: Box<dyn HistorySink>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sink: Mutex::new(sink),
        }
    }

    /// Appends a timestamped entry, in-memory first, then the sink.
    ///
    /// A sink failure is returned so the caller can surface it as a
    /// warning; the in-memory entry is retained regardless, since the
    /// mutation that triggered the recording has already committed.
    pub fn record(&self, description: &str) -> io::Result<()> {
        let entry = HistoryEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            description: description.to_string(),
        };
        let line = entry.to_line();

        {
            let mut entries = self.entries.lock().expect("Poisoned Lock");
            entries.push(entry);
        }

        let mut sink = self.sink.lock().expect("Poisoned Lock");
        sink.append_line(&line)
    }

    /// Snapshot of all entries in append order. Callers may iterate
    /// repeatedly; each call observes everything appended so far.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().expect("Poisoned Lock").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("Poisoned Lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl HistorySink for FailingSink {
        fn append_line(&mut self, _line: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "sink down"))
        }
    }

    #[test]
    fn record_mirrors_line_to_sink() {
        let sink = MemorySink::new();
        let recorder = HistoryRecorder::new(Box::new(sink.clone()));

        recorder.record("Configuration created: db").unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("] Configuration created: db"));

        // [YYYY-MM-DD HH:MM:SS] prefix, 21 chars including brackets
        let stamp = &lines[0][1..20];
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
        assert_eq!(&lines[0][20..22], "] ");
    }

    #[test]
    fn entries_survive_sink_failure() {
        let recorder = HistoryRecorder::new(Box::new(FailingSink));

        let res = recorder.record("Configuration deleted: db");
        assert!(res.is_err());

        let entries = recorder.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "Configuration deleted: db");
    }

    #[test]
    fn entries_preserve_append_order() {
        let recorder = HistoryRecorder::new(Box::new(MemorySink::new()));

        for i in 0..5 {
            recorder.record(&format!("event {}", i)).unwrap();
        }

        let entries = recorder.entries();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.description, format!("event {}", i));
        }
        for pair in entries.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn file_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes_config.log");

        let mut sink = FileSink::new(&path);
        sink.append_line("[2026-01-01 00:00:00] first").unwrap();
        sink.append_line("[2026-01-01 00:00:01] second").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[2026-01-01 00:00:00] first",
                "[2026-01-01 00:00:01] second"
            ]
        );
    }
}
