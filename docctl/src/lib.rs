pub mod cli;
pub mod git;
pub mod load_config;
pub mod notion;

pub use cli::{run, Cli, Commands, Outcome};
