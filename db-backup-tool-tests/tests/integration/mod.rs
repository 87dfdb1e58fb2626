//! Integration tests for db-backup-tool
//!
//! These tests require Docker plus the engine's client tools on the host and
//! run a full backup, drop, restore cycle against a real server.
//! Run with: `cargo test -p db-backup-tool-tests --test integration -- --ignored`

mod mysql;
mod postgres;
