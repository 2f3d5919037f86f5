//! Hash-chained, append-only event log

use crate::error::LogError;
use parking_lot::Mutex;
use pim_model::Record;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Position of an entry in the log, starting at 1
pub type Position = u64;

/// One appended record with its chain links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log
    pub position: Position,
    /// Position of the command this entry was produced for
    pub source_position: Option<Position>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// The record itself
    pub record: Record,
    /// Hash of the previous entry, zeroes for the first
    pub prev_hash: [u8; 32],
    /// SHA-256 over `prev_hash` and the encoded entry
    pub hash: [u8; 32],
}

impl LogEntry {
    /// Hash as lowercase hex
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Outcome of a successful chain walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Entries whose links were verified
    pub entries_checked: usize,
    /// Hash of the last entry, `None` for an empty log
    pub head: Option<[u8; 32]>,
}

/// Append-only log shared by all writers of a partition
#[derive(Debug, Default)]
pub struct EventLog {
    inner: Mutex<Vec<LogEntry>>,
}

impl EventLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single record
    ///
    /// # Errors
    /// [`LogError::Encoding`] if the record cannot be hashed
    pub fn append(
        &self,
        record: Record,
        source_position: Option<Position>,
    ) -> Result<Position, LogError> {
        let positions = self.append_batch(vec![record], source_position)?;
        Ok(positions.start)
    }

    /// Append `records` as one contiguous batch
    ///
    /// Either every record is appended or none is.
    ///
    /// # Errors
    /// [`LogError::EmptyBatch`] or [`LogError::Encoding`]
    pub fn append_batch(
        &self,
        records: Vec<Record>,
        source_position: Option<Position>,
    ) -> Result<std::ops::Range<Position>, LogError> {
        if records.is_empty() {
            return Err(LogError::EmptyBatch);
        }

        let mut guard = self.inner.lock();
        let first = guard.last().map_or(1, |e| e.position + 1);
        let mut prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut batch = Vec::with_capacity(records.len());
        for (position, record) in (first..).zip(records) {
            let mut entry = LogEntry {
                position,
                source_position,
                timestamp,
                record,
                prev_hash,
                hash: [0u8; 32],
            };
            entry.hash = compute_hash(&entry)?;
            prev_hash = entry.hash;
            batch.push(entry);
        }

        let end = first + batch.len() as u64;
        guard.extend(batch);
        tracing::trace!(first, end, "Batch appended");
        Ok(first..end)
    }

    /// Snapshot of every entry in position order
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().clone()
    }

    /// Entries written in response to the command at `source_position`
    #[must_use]
    pub fn follow_ups(&self, source_position: Position) -> Vec<LogEntry> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.source_position == Some(source_position))
            .cloned()
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing was appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Position of the newest entry
    #[must_use]
    pub fn last_position(&self) -> Option<Position> {
        self.inner.lock().last().map(|e| e.position)
    }

    /// Re-walk the hash chain
    ///
    /// # Errors
    /// [`LogError::IntegrityViolation`] at the first broken link
    pub fn verify_integrity(&self) -> Result<IntegrityReport, LogError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for e in guard.iter() {
            if e.prev_hash != prev {
                return Err(LogError::IntegrityViolation { position: e.position });
            }
            if e.hash != compute_hash(e)? {
                return Err(LogError::IntegrityViolation { position: e.position });
            }
            prev = e.hash;
        }
        Ok(IntegrityReport {
            entries_checked: guard.len(),
            head: guard.last().map(|e| e.hash),
        })
    }

    #[cfg(test)]
    fn tamper(&self, position: Position, f: impl FnOnce(&mut LogEntry)) {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.iter_mut().find(|e| e.position == position) {
            f(entry);
        }
    }
}

fn compute_hash(entry: &LogEntry) -> Result<[u8; 32], LogError> {
    let mut hasher = Sha256::new();
    hasher.update(entry.position.to_le_bytes());
    hasher.update(entry.source_position.unwrap_or(0).to_le_bytes());
    hasher.update(entry.timestamp.to_le_bytes());
    hasher.update(serde_json::to_vec(&entry.record)?);
    hasher.update([0u8]);
    hasher.update(entry.prev_hash);
    Ok(hasher.finalize().into())
}
