//! Command implementations behind the `reasoning` binary.

pub mod commands;
pub mod display;
