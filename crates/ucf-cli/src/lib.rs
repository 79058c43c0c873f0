//! Shared infrastructure for the `ucf` command line tool.

pub mod logging;
