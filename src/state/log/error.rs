use super::LogIndex;
use crate::types::Term;
use std::error;
use std::fmt;
use std::io;

/// Errors returned by log operations. Each kind carries the indices/terms it
/// was refused over, so the replication layer can branch on the kind instead
/// of parsing a message.
#[derive(Debug)]
pub enum LogError {
    /// The log file is not open.
    NotOpen,
    /// An append would move the term backward, or the index backward within
    /// the same term. The replication layer sent entries out of order.
    OutOfOrderAppend {
        index: LogIndex,
        term: Term,
        last_index: LogIndex,
        last_term: Term,
    },
    /// A commit index beyond the end of the log was requested.
    CommitBeyondWindow {
        index: LogIndex,
        last_index: LogIndex,
    },
    /// A truncation would drop committed entries, which are immutable.
    TruncateCommitted {
        index: LogIndex,
        commit_index: LogIndex,
    },
    /// The index names an entry beyond the end of the log.
    EntryNotFound {
        index: LogIndex,
        last_index: LogIndex,
    },
    /// The entry at the index does not carry the expected term.
    TermMismatch {
        index: LogIndex,
        expected: Term,
        actual: Term,
    },
    /// The index precedes the compaction baseline.
    IndexCompacted {
        index: LogIndex,
        start_index: LogIndex,
    },
    Encode(prost::EncodeError),
    Io(io::Error),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LogError::*;
        match self {
            NotOpen => write!(f, "log is not open"),
            OutOfOrderAppend {
                index,
                term,
                last_index,
                last_term,
            } => write!(
                f,
                "cannot append entry with earlier term or index ({}:{} after {}:{})",
                term, index, last_term, last_index,
            ),
            CommitBeyondWindow { index, last_index } => write!(
                f,
                "commit index {} is out of range (last index {})",
                index, last_index,
            ),
            TruncateCommitted {
                index,
                commit_index,
            } => write!(
                f,
                "cannot truncate at {}: entries up to {} are committed",
                index, commit_index,
            ),
            EntryNotFound { index, last_index } => write!(
                f,
                "entry {} does not exist (last index {})",
                index, last_index,
            ),
            TermMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "entry at {} has term {}, expected {}",
                index, actual, expected,
            ),
            IndexCompacted { index, start_index } => write!(
                f,
                "index {} precedes the compaction baseline {}",
                index, start_index,
            ),
            Encode(e) => {
                write!(f, "failed to encode an entry: ")?;
                e.fmt(f)
            }
            Io(e) => e.fmt(f),
        }
    }
}

impl error::Error for LogError {}

impl From<io::Error> for LogError {
    fn from(e: io::Error) -> Self {
        LogError::Io(e)
    }
}

impl From<prost::EncodeError> for LogError {
    fn from(e: prost::EncodeError) -> Self {
        LogError::Encode(e)
    }
}
