//! Command tests for db-backup-tool
//!
//! These run real child processes against fake dump and restore tools
//! (shell scripts), so they need a Unix `/bin/sh` but no database.

mod backup;
mod restore;
mod upload;
