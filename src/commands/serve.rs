use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::registry::{ArchiveStore, RegistryServer, RegistryState};

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: SocketAddr,
    pub storage: PathBuf,
    pub max_upload_bytes: usize,
}

/// Runs the registry until the process is stopped.
#[tracing::instrument]
pub async fn serve(options: ServeOptions) -> Result<()> {
    let store = ArchiveStore::open(&options.storage).await?;
    let state = RegistryState::load(store).await?;
    RegistryServer::new(options.bind, state, options.max_upload_bytes)
        .serve()
        .await
}
