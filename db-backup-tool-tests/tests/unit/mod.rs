//! Unit tests for db-backup-tool
//!
//! Contract and configuration behavior; nothing here spawns a process.

mod config;
mod contracts;
