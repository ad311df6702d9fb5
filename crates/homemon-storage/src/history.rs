use crate::error::{Result, StorageError};
use chrono::{DateTime, NaiveDate, Utc};
use homemon_common::types::{LogEntry, Topic};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Append-only durable store of `(timestamp, value)` pairs per topic,
/// partitioned by UTC calendar day.
///
/// Layout: `<data_dir>/<position>/<measurement>/<year>-<month>/<day>.log`,
/// one line per entry, `"<unixSeconds>,<value>\n"`. Month and day carry no
/// zero padding. Partitions are created on first write and never rewritten.
pub struct TimePartitionedLog {
    data_dir: PathBuf,
    writers: Mutex<WriterCache>,
}

struct OpenPartition {
    day: NaiveDate,
    file: File,
}

/// Open append handles, keyed by partition path. `day` tracks the newest
/// day any append has touched so rollovers can evict handles for finished
/// days.
struct WriterCache {
    day: NaiveDate,
    open: HashMap<PathBuf, OpenPartition>,
}

impl TimePartitionedLog {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|source| StorageError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            writers: Mutex::new(WriterCache {
                day: NaiveDate::MIN,
                open: HashMap::new(),
            }),
        })
    }

    /// Lock the writer cache, recovering from a poisoned Mutex if necessary.
    fn lock_writers(&self) -> MutexGuard<'_, WriterCache> {
        self.writers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn partition_path(&self, topic: &Topic, day: NaiveDate) -> PathBuf {
        use chrono::Datelike;
        self.data_dir
            .join(&topic.position)
            .join(&topic.measurement)
            .join(format!("{}-{}", day.year(), day.month()))
            .join(format!("{}.log", day.day()))
    }

    /// Appends one entry to the partition holding `time`'s UTC day, creating
    /// the partition and its directories on first write.
    ///
    /// Appends to the same partition are serialized through the writer map;
    /// the cached handle stays open in append mode, so existing lines are
    /// never reordered or rewritten.
    pub fn append(&self, topic: &Topic, time: DateTime<Utc>, value: f64) -> Result<()> {
        let day = time.date_naive();
        let path = self.partition_path(topic, day);
        let mut writers = self.lock_writers();
        if day > writers.day {
            // Day rollover: finished days no longer receive appends, so
            // their handles would otherwise stay open for the process
            // lifetime.
            writers.open.retain(|_, open| open.day >= day);
            writers.day = day;
        }
        if !writers.open.contains_key(&path) {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing::info!(partition = %path.display(), "created new history partition");
            writers.open.insert(path.clone(), OpenPartition { day, file });
        }
        let open = writers.open.get_mut(&path).expect("inserted above");
        let line = format!("{},{}\n", time.timestamp(), value);
        open.file
            .write_all(line.as_bytes())
            .map_err(|source| StorageError::Io { path, source })
    }

    /// Number of partition files currently held open for appending.
    pub fn open_partitions(&self) -> usize {
        self.lock_writers().open.len()
    }

    /// Returns every entry for `topic` with `timestamp >= min_timestamp`,
    /// sorted ascending.
    ///
    /// Walks the day partitions from `min_timestamp`'s day through today.
    /// Days without a partition file contribute nothing; malformed lines are
    /// skipped with a warning and never abort the query.
    pub fn query(&self, topic: &Topic, min_timestamp: DateTime<Utc>) -> Result<Vec<LogEntry>> {
        let min_secs = min_timestamp.timestamp();
        let today = Utc::now().date_naive();
        let mut entries = Vec::new();

        let mut day = min_timestamp.date_naive();
        while day <= today {
            let path = self.partition_path(topic, day);
            match std::fs::read_to_string(&path) {
                Ok(content) => parse_partition(&path, &content, &mut entries),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(StorageError::Io { path, source }),
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        entries.retain(|entry| entry.timestamp >= min_secs);
        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }
}

fn parse_partition(path: &Path, content: &str, entries: &mut Vec<LogEntry>) {
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => entries.push(entry),
            None => {
                tracing::warn!(
                    partition = %path.display(),
                    line = index + 1,
                    content = line,
                    "skipping malformed history line"
                );
            }
        }
    }
}

fn parse_line(line: &str) -> Option<LogEntry> {
    let (timestamp, value) = line.split_once(',')?;
    let timestamp: i64 = timestamp.trim().parse().ok()?;
    let value: f64 = value.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(LogEntry { timestamp, value })
}
