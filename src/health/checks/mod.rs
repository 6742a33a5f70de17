//! Built-in probes for the Google Cloud services the API depends on

pub mod cloud_sql;
pub mod cloud_storage;
pub mod document_ai;
pub mod firestore;
pub mod gcp;
pub mod secret_manager;
pub mod vertex_gemini;
pub mod vertex_index;

pub use cloud_sql::CloudSqlProbe;
pub use cloud_storage::CloudStorageProbe;
pub use document_ai::DocumentAiProbe;
pub use firestore::FirestoreProbe;
pub use gcp::{GoogleApi, MetadataServer, StaticToken, TokenSource};
pub use secret_manager::SecretManagerProbe;
pub use vertex_gemini::VertexGeminiProbe;
pub use vertex_index::VertexIndexProbe;

use super::runner::ProbeRegistry;
use crate::error::Result;

/// Registers every Google Cloud probe, in report order
pub fn google_cloud_probes(api: &GoogleApi) -> Result<ProbeRegistry> {
    ProbeRegistry::new()
        .register(CloudStorageProbe::new(api.clone()))?
        .register(DocumentAiProbe::new(api.clone()))?
        .register(FirestoreProbe::new(api.clone()))?
        .register(SecretManagerProbe::new(api.clone()))?
        .register(VertexGeminiProbe::new(api.clone()))?
        .register(VertexIndexProbe::new(api.clone()))?
        .register(CloudSqlProbe::new(api.clone()))
}
