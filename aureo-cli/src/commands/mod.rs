//! Subcommand implementations.

pub mod detect;
pub mod seal;
pub mod verify;
