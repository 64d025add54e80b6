//! kdiag Tools - Diagnostic command execution
//!
//! This crate provides the command execution side of kdiag:
//! - Executor: the `CommandExecutor` contract and the shell-backed implementation
//! - Security: program allow-listing for diagnostic pipelines

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod executor;
pub mod security;

pub use error::{Error, Result};
pub use executor::{CommandExecutor, CommandOutput, ExecutorConfig, ShellExecutor};
