//! CLI command implementations

pub mod init;
pub mod providers;
pub mod run;
