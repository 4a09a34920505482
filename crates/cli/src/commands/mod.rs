//! CLI subcommands

pub mod graph;
pub mod status;
