//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file, writes a
//! default one on request (`--write-default-config`), and supplies defaults
//! for everything the file leaves out.

pub mod config;
