//! CLI subcommand implementations.

pub mod report;
pub mod track;
