mod args;
mod commands;
mod repl;
pub mod theme;

pub use args::CliArgs;
pub use repl::{AppState, run_repl};
