//! CLI command implementations, invoked from `main.rs`.

pub mod commands;
