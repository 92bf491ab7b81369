use anyhow::Result;
use std::path::PathBuf;

use crate::config::{ConfigKey, ConfigStore};
use crate::runtime::Runtime;

/// Prints `key`, or sets it when `value` is given.
#[tracing::instrument(skip(runtime))]
pub fn config<R: Runtime>(
    runtime: &R,
    config_dir: Option<PathBuf>,
    key: &str,
    value: Option<&str>,
) -> Result<Option<String>> {
    let key: ConfigKey = key.parse()?;
    let store = ConfigStore::new(runtime, config_dir)?;
    let mut config = store.load_or_init()?;

    if let Some(value) = value {
        config.set(key, value);
        store.save(&config)?;
    }

    let current = config.get(key);
    match &current {
        Some(v) => println!("{}", v),
        None => println!("(not set)"),
    }
    Ok(current)
}

/// Rewrites the configuration file with defaults.
pub fn reset<R: Runtime>(runtime: &R, config_dir: Option<PathBuf>) -> Result<()> {
    let store = ConfigStore::new(runtime, config_dir)?;
    store.reset()?;
    println!("Configuration reset: {}", store.path().display());
    Ok(())
}
