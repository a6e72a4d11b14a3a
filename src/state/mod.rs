pub mod command;
pub mod error;
pub mod log;
pub mod state_machine;

pub use command::Command;
pub use error::StateMachineError;
pub use state_machine::StateMachine;
