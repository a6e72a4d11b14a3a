use super::command::Command;
use super::error::StateMachineError;
use bytes::Bytes;

/// The state machine fed by the replicated log.
///
/// `apply` is invoked exactly once per entry, in ascending index order, only
/// for entries that have been committed (or replayed from durable storage on
/// startup, which amounts to the same thing). It is called while the log's
/// own lock is held, so implementations must not call back into the log.
pub trait StateMachine {
    fn apply(&mut self, command: &Command) -> Result<Bytes, StateMachineError>;
}

#[cfg(test)]
pub mod test {
    use super::*;

    pub struct NoopStateMachine {}

    impl StateMachine for NoopStateMachine {
        fn apply(&mut self, _command: &Command) -> Result<Bytes, StateMachineError> {
            Ok(Bytes::new())
        }
    }
}
