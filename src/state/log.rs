pub mod entry;
pub mod error;

use crate::configuration::LogConfiguration;
use crate::state::command::Command;
use crate::state::error::StateMachineError;
use crate::state::state_machine::StateMachine;
use crate::types::Term;
use bytes::{Buf, Bytes};
use self::entry::LogEntry;
use self::error::LogError;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type LogIndex = u64;

/// The result of applying a committed entry to the state machine, cached by
/// the log until a caller retrieves it.
#[derive(Clone, Debug)]
pub struct LogResult {
    value: Option<Bytes>,
    err: Option<StateMachineError>,
}

impl LogResult {
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    pub fn err(&self) -> Option<&StateMachineError> {
        self.err.as_ref()
    }
}

/// A collection of log entries persisted to durable storage.
///
/// The log owns the ordered entry sequence, the index of the last committed
/// entry, the compaction baseline, the backing file, and the state machine
/// that committed commands are applied to. It is shared between the leader's
/// replication driver, follower RPC handlers, and the compaction routine;
/// one reader/writer lock guards all of its state, so every operation,
/// including file I/O during commit and compaction, serializes with the
/// rest.
pub struct Log<S> {
    inner: RwLock<LogInner<S>>,
    configuration: LogConfiguration,
}

struct LogInner<S> {
    state_machine: S,
    entries: Vec<LogEntry>,
    // One slot per entry; Some once the entry has been applied.
    results: Vec<Option<LogResult>>,
    commit_index: LogIndex,
    // The index/term of the last entry dropped by compaction. In-memory
    // entries begin immediately after start_index.
    start_index: LogIndex,
    start_term: Term,
    file: Option<fs::File>,
    path: Option<PathBuf>,
}

impl<S> Log<S> {
    pub fn new(state_machine: S) -> Self {
        Self::with_configuration(state_machine, LogConfiguration::default())
    }

    pub fn with_configuration(state_machine: S, configuration: LogConfiguration) -> Self {
        Log {
            inner: RwLock::new(LogInner {
                state_machine,
                entries: Vec::new(),
                results: Vec::new(),
                commit_index: 0,
                start_index: 0,
                start_term: 0,
                file: None,
                path: None,
            }),
            configuration,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LogInner<S>> {
        // A panic while the lock was held has already torn the invariants;
        // there is nothing sensible to recover to.
        self.inner.read().expect("log lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, LogInner<S>> {
        self.inner.write().expect("log lock poisoned")
    }

    /// The last committed index in the log.
    pub fn commit_index(&self) -> LogIndex {
        self.read().commit_index
    }

    /// The index of the last entry in the log, or the compaction baseline if
    /// the in-memory window is empty.
    pub fn current_index(&self) -> LogIndex {
        self.read().current_index()
    }

    /// The index a newly created entry will receive.
    pub fn next_index(&self) -> LogIndex {
        self.current_index() + 1
    }

    /// Whether the log has never had anything written to it: no in-memory
    /// entries and no compaction baseline. A log that is merely short is not
    /// empty.
    pub fn is_empty(&self) -> bool {
        let inner = self.read();
        inner.entries.is_empty() && inner.start_index == 0
    }

    /// The name of the most recent entry's command.
    pub fn last_command_name(&self) -> Option<String> {
        self.read()
            .entries
            .last()
            .and_then(|e| e.command.as_ref())
            .map(|c| c.name().to_string())
    }

    /// The term of the last entry, or the baseline term if the in-memory
    /// window is empty.
    pub fn current_term(&self) -> Term {
        let inner = self.read();
        match inner.entries.last() {
            Some(entry) => entry.term,
            None => inner.start_term,
        }
    }

    /// Retrieves the entry at `index`. Returns `None` if the entry was
    /// compacted away or never existed.
    pub fn get_entry(&self, index: LogIndex) -> Option<LogEntry> {
        let inner = self.write();
        inner.entry_at(index).cloned()
    }

    /// Checks if the log contains an entry at `index` with exactly `term`.
    pub fn contains_entry(&self, index: LogIndex, term: Term) -> bool {
        self.get_entry(index).map_or(false, |e| e.term == term)
    }

    /// Retrieves the entries after `index` together with the term of the
    /// entry at `index`. Returns `None` if `index` precedes the compaction
    /// baseline; the entries no longer exist here and the caller has to fall
    /// back to snapshot transfer.
    ///
    /// # Panics
    ///
    /// Panics if `index` is beyond the end of the log. Callers may only ask
    /// for entries they know to exist; anything else is a protocol bug.
    pub fn get_entries_after(&self, index: LogIndex) -> Option<(Vec<LogEntry>, Term)> {
        let inner = self.write();

        if index < inner.start_index {
            tracing::debug!(
                "entries after {} were compacted away (baseline {})",
                index,
                inner.start_index,
            );
            return None;
        }

        let last_index = inner.start_index + inner.entries.len() as LogIndex;
        if index > last_index {
            panic!(
                "index {} is beyond the end of the log ({})",
                index, last_index
            );
        }

        if index == inner.start_index {
            return Some((inner.entries.clone(), inner.start_term));
        }

        let offset = (index - inner.start_index) as usize;
        let term = inner.entries[offset - 1].term;
        Some((inner.entries[offset..].to_vec(), term))
    }

    /// Retrieves the cached result of applying `entry`. `None` means the
    /// entry has not been applied yet: pending, not an error. With `clear`
    /// the cached return value is dropped after retrieval so large payloads
    /// do not accumulate; the error stays re-readable.
    pub fn get_entry_result(&self, entry: &LogEntry, clear: bool) -> Option<LogResult> {
        if clear {
            let mut inner = self.write();
            let offset = inner.result_offset(entry.index)?;
            let slot = inner.results[offset].as_mut()?;
            let result = slot.clone();
            slot.value = None;
            Some(result)
        } else {
            let inner = self.read();
            let offset = inner.result_offset(entry.index)?;
            inner.results[offset].clone()
        }
    }

    /// The index and term of the last committed entry; zeros if nothing has
    /// ever been committed.
    pub fn commit_info(&self) -> (LogIndex, Term) {
        let inner = self.read();

        if inner.commit_index == 0 {
            return (0, 0);
        }

        // Everything real up to the baseline has been compacted away.
        if inner.commit_index == inner.start_index {
            return (inner.start_index, inner.start_term);
        }

        let entry = &inner.entries[(inner.commit_index - inner.start_index - 1) as usize];
        (entry.index, entry.term)
    }

    /// The index and term of the last entry in the log, committed or not.
    /// This is what log recency comparisons during elections run on.
    pub fn last_info(&self) -> (LogIndex, Term) {
        let inner = self.read();
        match inner.entries.last() {
            Some(entry) => (entry.index, entry.term),
            None => (inner.start_index, inner.start_term),
        }
    }

    /// Sets the commit index without persisting or applying anything. Only
    /// for recovery paths where the caller knows the data is already
    /// durable.
    pub fn update_commit_index(&self, index: LogIndex) {
        self.write().commit_index = index;
    }

    /// Resets the compaction baseline, e.g. when restoring a snapshot taken
    /// before the last shutdown. Must happen before `open` replays the file,
    /// so that the replayed entries line up after the baseline.
    pub fn update_baseline(&self, index: LogIndex, term: Term) {
        let mut inner = self.write();
        inner.start_index = index;
        inner.start_term = term;
    }

    /// Creates a log entry stamped with the next index. The entry is not
    /// appended.
    pub fn create_entry(&self, term: Term, command: Command) -> LogEntry {
        LogEntry::new(self.next_index(), term, Some(command))
    }

    /// Appends a series of entries to the log. Entries are not written to
    /// disk until `set_commit_index` is called. Appending stops at the first
    /// failure; entries appended before it remain, and the caller reconciles
    /// by truncating and retrying.
    pub fn append_entries(
        &self,
        entries: impl IntoIterator<Item = LogEntry>,
    ) -> Result<(), LogError> {
        let mut guard = self.write();
        let inner = &mut *guard;
        for entry in entries {
            inner.append_entry(entry)?;
        }
        Ok(())
    }

    /// Rolls the log back so that `index` is its last entry, dropping
    /// everything after it. The entry at `index` must carry `term`; both
    /// sides have to agree on the truncation point. Committed entries can
    /// never be truncated.
    pub fn truncate(&self, index: LogIndex, term: Term) -> Result<(), LogError> {
        let mut inner = self.write();
        tracing::debug!("truncating log at {}:{}", term, index);

        if index < inner.commit_index {
            return Err(LogError::TruncateCommitted {
                index,
                commit_index: inner.commit_index,
            });
        }

        let last_index = inner.start_index + inner.entries.len() as LogIndex;
        if index > last_index {
            return Err(LogError::EntryNotFound { index, last_index });
        }

        if index == inner.start_index {
            inner.entries.clear();
            inner.results.clear();
            return Ok(());
        }

        let offset = (index - inner.start_index) as usize;
        let entry = &inner.entries[offset - 1];
        if entry.term != term {
            return Err(LogError::TermMismatch {
                index,
                expected: term,
                actual: entry.term,
            });
        }

        inner.entries.truncate(offset);
        inner.results.truncate(offset);
        Ok(())
    }

    /// Closes the log file and drops the in-memory entries and results. The
    /// log can be opened again afterwards.
    pub fn close(&self) {
        let mut inner = self.write();
        inner.file = None;
        inner.entries = Vec::new();
        inner.results = Vec::new();
    }
}

impl<S: StateMachine> Log<S> {
    /// Opens the log file at `path`, replaying any existing entries into
    /// memory and the state machine, then keeps the file open for appending.
    ///
    /// Everything in the file was committed before it was written, so every
    /// decoded entry advances the commit index and is applied immediately,
    /// with its result cached. A truncated trailing record (a crash
    /// mid-write) is discarded by cutting the file back to the last complete
    /// entry; it is recovery, not corruption.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<(), LogError> {
        let path = path.as_ref();
        let mut guard = self.write();
        let inner = &mut *guard;

        if path.exists() {
            let mut buf = Bytes::from(fs::read(path)?);
            let mut offset = 0usize;

            while buf.has_remaining() {
                let (entry, n) = match LogEntry::decode_from(&mut buf) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::warn!(
                            "discarding a partial entry at byte {} of {}: {}",
                            offset,
                            path.display(),
                            e,
                        );
                        truncate_file(path, offset as u64)?;
                        break;
                    }
                };

                let result = apply_entry(&mut inner.state_machine, &entry);
                inner.commit_index = entry.index;
                inner.entries.push(entry);
                inner.results.push(Some(result));
                offset += n;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        inner.file = Some(file);
        inner.path = Some(path.to_path_buf());
        tracing::debug!(
            "opened log at {}: {} entries, commit index {}",
            path.display(),
            inner.entries.len(),
            inner.commit_index,
        );
        Ok(())
    }

    /// Advances the commit index to `index`, persisting every newly
    /// committed entry and applying it to the state machine, in log order
    /// with no gaps.
    ///
    /// An `index` lower than the current commit index is silently ignored: a
    /// leader that just took over may replicate with a stale commit index,
    /// and the guarantee is that its log is up to date, not its commit
    /// index. The commit index never moves backward.
    pub fn set_commit_index(&self, index: LogIndex) -> Result<(), LogError> {
        let mut guard = self.write();
        let inner = &mut *guard;

        let last_index = inner.start_index + inner.entries.len() as LogIndex;
        if index > last_index {
            return Err(LogError::CommitBeyondWindow { index, last_index });
        }

        if index < inner.commit_index {
            tracing::debug!(
                "ignoring stale commit index {} (currently at {})",
                index,
                inner.commit_index,
            );
            return Ok(());
        }

        for i in inner.commit_index + 1..=index {
            let offset = (i - inner.start_index - 1) as usize;
            let entry = &inner.entries[offset];

            // Write to storage. The commit index only advances past entries
            // that were durably written.
            let file = inner.file.as_mut().ok_or(LogError::NotOpen)?;
            let n = entry.encode_to(file)?;
            tracing::trace!("committed entry {} ({} bytes)", entry.index, n);

            inner.commit_index = entry.index;

            let result = apply_entry(&mut inner.state_machine, entry);
            inner.results[offset] = Some(result);
        }

        if self.configuration.sync_on_commit {
            if let Some(file) = inner.file.as_ref() {
                file.sync_all()?;
            }
        }

        Ok(())
    }

    /// Rewrites the backing file to drop every entry at or before `index`,
    /// which becomes the new compaction baseline. Called after the state
    /// machine has taken a snapshot covering the log up to `index`.
    ///
    /// The sequence is write-new, fsync, close-old, remove-old,
    /// rename-new-into-place. A failure partway through leaves the file in
    /// whatever state the failing step produced; the caller must treat that
    /// as needing operator attention, not retry blindly.
    pub fn compact(&self, index: LogIndex, term: Term) -> Result<(), LogError> {
        let mut guard = self.write();
        let inner = &mut *guard;

        if inner.file.is_none() {
            return Err(LogError::NotOpen);
        }
        if index < inner.start_index {
            return Err(LogError::IndexCompacted {
                index,
                start_index: inner.start_index,
            });
        }
        let path = inner.path.clone().ok_or(LogError::NotOpen)?;

        // The snapshot may cover more than is known locally, e.g. right
        // after recovering from a snapshot that is ahead of this log; then
        // nothing is retained.
        let (entries, results) = if index >= inner.current_index() {
            (Vec::new(), Vec::new())
        } else {
            let offset = (index - inner.start_index) as usize;
            (
                inner.entries[offset..].to_vec(),
                inner.results[offset..].to_vec(),
            )
        };

        tracing::debug!(
            "compacting log up to {}:{}, retaining {} entries",
            term,
            index,
            entries.len(),
        );

        let mut new_path = path.clone().into_os_string();
        new_path.push(".new");
        let new_path = PathBuf::from(new_path);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_path)?;
        for entry in &entries {
            entry.encode_to(&mut file)?;
        }
        file.sync_all()?;

        // Swap the new file into place. The open handle stays valid across
        // the rename and becomes the log's append handle.
        inner.file = None;
        fs::remove_file(&path)?;
        fs::rename(&new_path, &path)?;
        inner.file = Some(file);

        inner.entries = entries;
        inner.results = results;
        inner.start_index = index;
        inner.start_term = term;
        Ok(())
    }
}

impl<S> LogInner<S> {
    // The current index without locking, for paths that already hold the
    // lock.
    fn current_index(&self) -> LogIndex {
        match self.entries.last() {
            Some(entry) => entry.index,
            None => self.start_index,
        }
    }

    fn entry_at(&self, index: LogIndex) -> Option<&LogEntry> {
        if index <= self.start_index
            || index > self.start_index + self.entries.len() as LogIndex
        {
            return None;
        }
        Some(&self.entries[(index - self.start_index - 1) as usize])
    }

    fn result_offset(&self, index: LogIndex) -> Option<usize> {
        if index <= self.start_index
            || index > self.start_index + self.results.len() as LogIndex
        {
            return None;
        }
        Some((index - self.start_index - 1) as usize)
    }

    // Appends a single entry. The write lock is held by the caller.
    fn append_entry(&mut self, entry: LogEntry) -> Result<(), LogError> {
        if self.file.is_none() {
            return Err(LogError::NotOpen);
        }

        // The term must never decrease, and within a term the index must
        // strictly advance.
        if let Some(last) = self.entries.last() {
            if entry.term < last.term
                || (entry.term == last.term && entry.index <= last.index)
            {
                return Err(LogError::OutOfOrderAppend {
                    index: entry.index,
                    term: entry.term,
                    last_index: last.index,
                    last_term: last.term,
                });
            }
        }

        self.entries.push(entry);
        // The result slot is populated at commit time, never at append time.
        self.results.push(None);
        Ok(())
    }
}

fn apply_entry<S: StateMachine>(state_machine: &mut S, entry: &LogEntry) -> LogResult {
    match entry.command.as_ref() {
        Some(command) => match state_machine.apply(command) {
            Ok(value) => LogResult {
                value: Some(value),
                err: None,
            },
            Err(err) => LogResult {
                value: None,
                err: Some(err),
            },
        },
        // Command-less entries (leader no-ops) succeed with an empty result
        // without touching the state machine.
        None => LogResult {
            value: Some(Bytes::new()),
            err: None,
        },
    }
}

fn truncate_file(path: &Path, len: u64) -> Result<(), LogError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    Ok(())
}
