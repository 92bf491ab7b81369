//! HTTP surface of the registry.
//!
//! | route | handler |
//! |---|---|
//! | `POST /cip/upload` | [`upload`] |
//! | `GET /download/{package_name}/{version}/{filename}` | [`download`] |
//! | `GET /cip/packages` | [`list`] |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, serve};
use log::{info, warn};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use super::index::RegistryIndex;
use super::store::{ArchiveStore, validate_filename};
use crate::error::CipError;
use crate::naming::ArchiveName;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared by every request handler.
#[derive(Clone)]
pub struct RegistryState {
    pub store: ArchiveStore,
    pub index: Arc<RwLock<RegistryIndex>>,
}

impl RegistryState {
    /// Opens the store and rebuilds the index from the files already in it.
    pub async fn load(store: ArchiveStore) -> Result<Self> {
        let index = RegistryIndex::from_filenames(store.filenames().await?);
        info!(
            "Indexed {} package(s) from {:?}",
            index.packages().len(),
            store.dir()
        );
        Ok(Self {
            store,
            index: Arc::new(RwLock::new(index)),
        })
    }
}

pub fn router(state: RegistryState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/cip/upload", post(upload))
        .route("/download/{package_name}/{version}/{filename}", get(download))
        .route("/cip/packages", get(list))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub struct RegistryServer {
    addr: SocketAddr,
    router: Router,
}

impl RegistryServer {
    pub fn new(addr: SocketAddr, state: RegistryState, max_upload_bytes: usize) -> Self {
        Self {
            addr,
            router: router(state, max_upload_bytes),
        }
    }

    /// Binds the listener and serves until the process is stopped.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Registry listening on {}", listener.local_addr()?);
        serve(listener, self.router).await?;
        Ok(())
    }
}

/// Error response carrying `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<CipError>() {
            Some(CipError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(
                CipError::MissingFile
                | CipError::MissingFilename
                | CipError::InvalidFilename(_)
                | CipError::MissingPackageName
                | CipError::NameMismatch { .. },
            ) => StatusCode::BAD_REQUEST,
            _ if self.0.downcast_ref::<axum::extract::multipart::MultipartError>().is_some() => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {:#}", self.0);
        }
        (status, Json(json!({ "error": format!("{:#}", self.0) }))).into_response()
    }
}

struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    package_name: Option<String>,
    package_version: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut package_name = None;
    let mut package_version = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("package_name") => package_name = Some(field.text().await?),
            Some("package_version") => package_version = Some(field.text().await?),
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or(CipError::MissingFile)?;
    let filename = filename
        .filter(|f| !f.is_empty())
        .ok_or(CipError::MissingFilename)?;

    Ok(UploadForm {
        filename,
        bytes,
        package_name: package_name.filter(|n| !n.is_empty()),
        package_version: package_version.filter(|v| !v.is_empty()),
    })
}

pub async fn upload(
    State(state): State<RegistryState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = read_upload_form(multipart).await?;
    validate_filename(&form.filename)?;

    let package_name = match form.package_name {
        Some(name) => name,
        None => form
            .filename
            .parse::<ArchiveName>()
            .map(|n| n.package)
            .map_err(|_| CipError::MissingPackageName)?,
    };

    state.store.save(&form.filename, &form.bytes).await?;
    let added = state
        .index
        .write()
        .await
        .insert(&package_name, &form.filename);

    info!(
        "Stored {} ({} bytes) for {} {}{}",
        form.filename,
        form.bytes.len(),
        package_name,
        form.package_version.as_deref().unwrap_or("?"),
        if added { "" } else { ", replacing previous upload" }
    );

    Ok(Json(json!({
        "message": format!("Uploaded {}", form.filename),
    })))
}

pub async fn download(
    State(state): State<RegistryState>,
    Path((package_name, version, filename)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    // A name the store could never hold is simply absent.
    let stored = match validate_filename(&filename) {
        Ok(()) => state.store.load(&filename).await?,
        Err(_) => None,
    };
    let bytes =
        stored.ok_or_else(|| CipError::NotFound(format!("Archive {} not found", filename)))?;

    let matches = filename
        .parse::<ArchiveName>()
        .is_ok_and(|name| name.matches(&package_name, &version));
    if !matches {
        return Err(CipError::NameMismatch {
            filename,
            package_name,
            version,
        }
        .into());
    }

    info!("Serving {} ({} bytes)", filename, bytes.len());
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, bytes).into_response())
}

pub async fn list(State(state): State<RegistryState>) -> Json<RegistryIndex> {
    Json(state.index.read().await.clone())
}
