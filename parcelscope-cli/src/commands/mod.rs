//! CLI subcommands.

pub mod basemap;
pub mod common;
pub mod init;
pub mod layers;
pub mod measure;
pub mod resolve;
