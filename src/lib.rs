pub mod configuration;
pub mod state;
mod types;

pub use configuration::LogConfiguration;
pub use state::log::entry::LogEntry;
pub use state::log::error::LogError;
pub use state::log::{Log, LogIndex, LogResult};
pub use state::{Command, StateMachine, StateMachineError};
pub use types::Term;
