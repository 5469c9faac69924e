//! CLI subcommand implementations for the Scribe binary.

pub mod doctor;
pub mod output;
pub mod replay_cmd;
pub mod run_cmd;
