use std::error;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum StateMachineError {
    UnknownCommand(String),
    ApplyFailed(String),
}

impl fmt::Display for StateMachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use StateMachineError::*;
        match self {
            UnknownCommand(name) => write!(f, "unknown command: {}", name),
            ApplyFailed(reason) => write!(f, "failed to apply: {}", reason),
        }
    }
}

impl error::Error for StateMachineError {}
