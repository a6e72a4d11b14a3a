use bytes::Bytes;
use replog::{Command, StateMachine, StateMachineError};
use std::sync::{Arc, Mutex};

pub fn init() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Records every applied command name and echoes the command body back as
/// the return value.
pub struct RecordingStateMachine {
    applied: Arc<Mutex<Vec<String>>>,
}

impl RecordingStateMachine {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let applied = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                applied: applied.clone(),
            },
            applied,
        )
    }
}

impl StateMachine for RecordingStateMachine {
    fn apply(&mut self, command: &Command) -> Result<Bytes, StateMachineError> {
        self.applied.lock().unwrap().push(command.name().to_string());
        Ok(command.body().clone())
    }
}

pub fn command(name: &str) -> Command {
    Command::new(name.to_string(), Bytes::copy_from_slice(name.as_bytes()))
}
