/// A Raft term. Term 0 is reserved for the state of a log that has never
/// seen an entry (or whose compaction baseline precedes all real entries).
pub type Term = u64;
