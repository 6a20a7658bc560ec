//! Stream facet: JSONL append files per session topic for live tailing.

use crate::error::StorageError;
use devlens_protocol::ChangelogEntry;
use log::{debug, info};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only stream of changelog entries, scoped by session topic.
pub trait StreamStore: Send + Sync {
    /// Append one entry to its session topic.
    fn append(&self, entry: &ChangelogEntry) -> Result<(), StorageError>;

    /// Read the most recent entries of a session topic, oldest first.
    fn tail(&self, session_id: &str, limit: usize) -> Result<Vec<ChangelogEntry>, StorageError>;
}

/// JSONL-backed stream store, one topic file per session.
pub struct JsonlStreamStore {
    /// Root directory for topic files.
    root: PathBuf,
    /// Serialize write access to topic files.
    write_lock: Mutex<()>,
}

impl JsonlStreamStore {
    /// Create a new JSONL stream store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL stream store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Build the topic file path for a session.
    ///
    /// Session ids are producer-supplied opaque strings; topic filenames keep
    /// only filesystem-safe characters.
    fn topic_path(&self, session_id: &str) -> PathBuf {
        let safe: String = session_id
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{safe}.jsonl"))
    }
}

impl StreamStore for JsonlStreamStore {
    /// Append an entry to the session topic file.
    fn append(&self, entry: &ChangelogEntry) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let path = self.topic_path(&entry.session_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        debug!(
            "streamed entry (session_id={}, event_id={})",
            entry.session_id, entry.id
        );
        Ok(())
    }

    /// Read the last `limit` entries of a topic, oldest first.
    fn tail(&self, session_id: &str, limit: usize) -> Result<Vec<ChangelogEntry>, StorageError> {
        let path = self.topic_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ChangelogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        let start = entries.len().saturating_sub(limit);
        Ok(entries[start..].to_vec())
    }
}
