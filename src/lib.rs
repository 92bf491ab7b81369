pub mod archive;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod install;
pub mod naming;
pub mod registry;
pub mod runtime;

pub use error::CipError;

/// Version of this tool, recorded as the producer version of every archive it builds.
pub const CIP_VERSION: &str = env!("CIP_VERSION");
