//! # citelink common library
//!
//! Shared code for the citelink crates:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - SQLite database initialization

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
