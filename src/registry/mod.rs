//! Registry of uploaded archives: storage, index, HTTP server and client.

mod client;
mod index;
mod server;
mod store;

pub use client::{PackageListing, RegistryClient, RegistryTransport};
#[cfg(test)]
pub use client::MockRegistryTransport;
pub use index::RegistryIndex;
pub use server::{
    ApiError, DEFAULT_MAX_UPLOAD_BYTES, RegistryServer, RegistryState, download, list, router,
    upload,
};
pub use store::{ArchiveStore, validate_filename};
