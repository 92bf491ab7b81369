//! One function per CLI subcommand. `main` only parses arguments and
//! wires the real runtime and registry client into these.

mod config;
mod create;
mod download;
mod install;
mod list;
mod serve;
mod upload;

pub use config::{config, reset};
pub use create::create;
pub use download::download;
pub use install::{InstallOptions, install, install_bytes};
pub use list::list;
pub use serve::{ServeOptions, serve};
pub use upload::upload;

use anyhow::Result;
use std::path::PathBuf;

use crate::config::{CipConfig, ConfigStore};
use crate::runtime::Runtime;

/// Loads the client configuration from `config_dir` (default `~/.cip`).
pub fn load_config<R: Runtime>(runtime: &R, config_dir: Option<PathBuf>) -> Result<CipConfig> {
    ConfigStore::new(runtime, config_dir)?.load_or_init()
}

/// Registry URL from the command line, falling back to the configuration.
pub fn registry_url(explicit: Option<String>, config: &CipConfig) -> String {
    explicit.unwrap_or_else(|| config.registry_url.clone())
}
