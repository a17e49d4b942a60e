//! Command-line front end for `trustload`.
//!
//! The `trustload` binary loads classes through a secure loader, wipes the
//! shared caches, and creates the identities and signed containers the
//! loader expects.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Subcommand implementations
//! - [`error`] - CLI errors and their exit codes
//! - [`logging`] - Stderr `log` backend driven by `-v`/`-q`
//! - [`output`] - Formatting of user-facing results

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
