mod commands;
mod scaffold;

pub use commands::{execute, Cli};
