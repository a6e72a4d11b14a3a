use super::error::LogError;
use crate::state::command::Command;
use bytes::{Buf, BytesMut};
use prost::Message;
use std::io::Write;

/// One unit of replicated state: an index, the term it was created in, and
/// the command to replicate. Entries are created by the leader or decoded
/// from the log file and never mutated afterwards.
///
/// A command-less entry is legal (leaders use them as no-ops); committing
/// one records an empty successful result without touching the state
/// machine.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogEntry {
    #[prost(uint64, tag = "1")]
    pub index: u64,
    #[prost(uint64, tag = "2")]
    pub term: u64,
    #[prost(message, optional, tag = "3")]
    pub command: Option<Command>,
}

impl LogEntry {
    pub fn new(index: u64, term: u64, command: Option<Command>) -> Self {
        LogEntry {
            index,
            term,
            command,
        }
    }

    /// Appends this entry to `w` as a single length-delimited frame.
    /// Returns the number of bytes written.
    pub fn encode_to<W: Write>(&self, w: &mut W) -> Result<usize, LogError> {
        let len = self.encoded_len();
        let mut buf = BytesMut::with_capacity(len + prost::length_delimiter_len(len));
        self.encode_length_delimited(&mut buf)?;
        w.write_all(&buf)?;
        Ok(buf.len())
    }

    /// Decodes one length-delimited frame from the front of `buf`, returning
    /// the entry and the number of bytes consumed. A frame cut short by a
    /// crashed write surfaces as a decode error, distinct from `buf` simply
    /// being empty.
    pub fn decode_from<B: Buf>(buf: &mut B) -> Result<(LogEntry, usize), prost::DecodeError> {
        let before = buf.remaining();
        let entry = LogEntry::decode_length_delimited(&mut *buf)?;
        Ok((entry, before - buf.remaining()))
    }
}
