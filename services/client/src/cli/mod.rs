pub mod args;
pub mod commands;
pub mod state;

// Re-export the entry points used by the binary.
pub use args::{Cli, Command};
pub use commands::run;
pub use state::AppState;
