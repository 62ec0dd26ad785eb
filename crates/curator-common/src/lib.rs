//! Common utilities for curator
//!
//! This crate provides the error type shared by the store layer and the CLI.

pub mod error;

pub use error::{CuratorError, Result};
