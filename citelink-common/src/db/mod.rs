//! Database initialization shared by citelink crates

pub mod init;

pub use init::init_database;
