//! citelink-linker library
//!
//! Classifies the paragraphs of a course document, resolves readings to
//! open-access links and records the results. The work runs as a resumable
//! batch that pauses when its time budget is spent and continues later from
//! the saved checkpoint.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
