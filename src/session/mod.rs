mod commands;
mod controller;
mod state;

pub use commands::{Command, Outcome};
pub use controller::{SessionController, HELP_TEXT, TICK_INTERVAL};
pub use state::{storage_key, SessionState, VideoDescriptor};
