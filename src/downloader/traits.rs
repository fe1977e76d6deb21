// Extraction engine trait definition

use async_trait::async_trait;
use std::path::PathBuf;

use super::errors::EngineError;
use super::models::{DownloadOutcome, EngineMetadata, PostProcess};
use super::profiles::RetrievalProfile;

/// Everything the engine needs to perform one retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalSpec {
    pub url: String,
    pub expression: String,
    /// Output template; the engine substitutes the final extension
    pub output_template: PathBuf,
    pub post_process: PostProcess,
}

/// Opaque media extraction capability.
///
/// Implementations report failures as raw text; callers classify them.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Metadata-only query, nothing is downloaded
    async fn extract(
        &self,
        url: &str,
        profile: &RetrievalProfile,
    ) -> Result<EngineMetadata, EngineError>;

    /// Download into `spec.output_template`
    async fn download(
        &self,
        spec: &RetrievalSpec,
        profile: &RetrievalProfile,
    ) -> Result<DownloadOutcome, EngineError>;

    /// Resolve a direct remote stream location without downloading
    async fn stream_url(
        &self,
        url: &str,
        expression: &str,
        profile: &RetrievalProfile,
    ) -> Result<String, EngineError>;
}
