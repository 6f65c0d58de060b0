//! Subcommand implementations.

pub mod parse;
pub mod score;
pub mod variants;
