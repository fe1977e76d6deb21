// Orchestrator with profile fallback logic
//
// Discovery (metadata) walks every profile in priority order and keeps the
// first one that works. Retrieval is expensive, so it only tries the
// discovered profile plus one broad-compatibility fallback.

use std::sync::Arc;
use std::time::Duration;

use super::errors::{DownloadError, ErrorKind};
use super::format_selector::FormatSelector;
use super::job::JobWorkspace;
use super::lifecycle::{purge, purge_after, CleanupGuard};
use super::locator::normalize_locator;
use super::models::{
    Artifact, DownloadOutcome, FormatCatalog, FormatListing, MediaRequest, PostProcess,
    TierSelector,
};
use super::profiles::{ProfileCatalog, RetrievalProfile};
use super::traits::{ExtractionEngine, RetrievalSpec};

/// A profile that failed during discovery. Logged, never surfaced.
#[derive(Debug, Clone)]
pub struct ProfileFailure {
    pub profile: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of a successful discovery walk.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub catalog: FormatCatalog,
    pub profile: RetrievalProfile,
    pub failures: Vec<ProfileFailure>,
}

pub struct StrategySelector {
    engine: Arc<dyn ExtractionEngine>,
    profiles: Arc<ProfileCatalog>,
}

impl StrategySelector {
    pub fn new(engine: Arc<dyn ExtractionEngine>, profiles: Arc<ProfileCatalog>) -> Self {
        Self { engine, profiles }
    }

    /// Query metadata under each profile until one succeeds.
    ///
    /// When all fail, the last failure is returned; earlier ones are only logged.
    pub async fn discover(&self, url: &str) -> Result<Discovery, DownloadError> {
        let mut failures = Vec::new();
        let mut last_error = None;

        for profile in self.profiles.ordered() {
            tracing::info!(
                engine = self.engine.name(),
                profile = %profile.identity_tag(),
                "fetching formats"
            );

            match self.engine.extract(url, profile).await {
                Ok(metadata) => {
                    tracing::info!(profile = %profile.identity_tag(), "formats fetched");
                    return Ok(Discovery {
                        catalog: FormatSelector::build_catalog(&metadata),
                        profile: profile.clone(),
                        failures,
                    });
                }
                Err(e) => {
                    let err = DownloadError::from(e);
                    tracing::warn!(
                        profile = %profile.identity_tag(),
                        kind = %err.kind(),
                        error = %err.raw_message().lines().last().unwrap_or_default(),
                        "profile failed, trying next"
                    );
                    failures.push(ProfileFailure {
                        profile: profile.identity_tag(),
                        kind: err.kind(),
                        message: err.raw_message().to_string(),
                    });
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DownloadError::ExtractionFailed("no retrieval profiles configured".to_string())
        }))
    }

    /// Preselected (or primary) profile, then the broad profile once.
    fn retrieval_attempts<'a>(
        &'a self,
        preselected: Option<&'a RetrievalProfile>,
    ) -> Vec<&'a RetrievalProfile> {
        let first = preselected.unwrap_or_else(|| self.profiles.primary());
        let broad = self.profiles.broad();
        if first == broad {
            vec![first]
        } else {
            vec![first, broad]
        }
    }

    /// Download under the preselected profile, with one fallback.
    pub async fn retrieve(
        &self,
        spec: &RetrievalSpec,
        preselected: Option<&RetrievalProfile>,
    ) -> Result<(DownloadOutcome, RetrievalProfile), DownloadError> {
        let mut last_error = None;

        for profile in self.retrieval_attempts(preselected) {
            tracing::info!(
                profile = %profile.identity_tag(),
                format = %spec.expression,
                "starting retrieval"
            );
            match self.engine.download(spec, profile).await {
                Ok(outcome) => return Ok((outcome, profile.clone())),
                Err(e) => {
                    let err = DownloadError::from(e);
                    tracing::warn!(
                        profile = %profile.identity_tag(),
                        kind = %err.kind(),
                        "retrieval failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DownloadError::ExtractionFailed("no retrieval profile available".to_string())
        }))
    }

    /// Resolve a direct stream URL, same two-attempt policy as `retrieve`.
    pub async fn stream_url(
        &self,
        url: &str,
        expression: &str,
        preselected: Option<&RetrievalProfile>,
    ) -> Result<String, DownloadError> {
        let mut last_error = None;

        for profile in self.retrieval_attempts(preselected) {
            match self.engine.stream_url(url, expression, profile).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    let err = DownloadError::from(e);
                    tracing::warn!(
                        profile = %profile.identity_tag(),
                        kind = %err.kind(),
                        "stream resolution failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DownloadError::ExtractionFailed("no retrieval profile available".to_string())
        }))
    }
}

/// Container/codec choices for the transcoding step.
#[derive(Debug, Clone)]
pub struct OutputFormats {
    pub merge_format: String,
    pub audio_format: String,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            merge_format: "mp4".to_string(),
            audio_format: "mp3".to_string(),
        }
    }
}

/// A located artifact on its way to the caller.
///
/// Dropping it (or its guard) deletes the job's files.
#[derive(Debug)]
pub struct FetchedArtifact {
    pub title: String,
    pub artifact: Artifact,
    pub guard: CleanupGuard,
}

/// How long after a failed job its prefix is swept a second time. Post-processors
/// spawned by a killed engine can still be flushing files.
const LATE_WRITE_GRACE: Duration = Duration::from_secs(10);

pub struct Downloader {
    selector: StrategySelector,
    workspace: JobWorkspace,
    formats: OutputFormats,
    late_write_grace: Duration,
}

impl Downloader {
    pub fn new(
        selector: StrategySelector,
        workspace: JobWorkspace,
        formats: OutputFormats,
    ) -> Self {
        Self {
            selector,
            workspace,
            formats,
            late_write_grace: LATE_WRITE_GRACE,
        }
    }

    pub fn with_late_write_grace(mut self, grace: Duration) -> Self {
        self.late_write_grace = grace;
        self
    }

    /// Simplified format list for a locator.
    pub async fn list_formats(&self, locator: &str) -> Result<FormatListing, DownloadError> {
        let url = normalize_locator(locator);
        let discovery = self.selector.discover(&url).await?;
        let catalog = discovery.catalog;

        Ok(FormatListing {
            formats: FormatSelector::build_options(
                &catalog,
                &self.formats.merge_format,
                &self.formats.audio_format,
            ),
            title: catalog.title,
            raw_formats_sample: catalog.raw_sample,
        })
    }

    /// Catalog and sticky profile, only when the selector needs them.
    async fn prepare(
        &self,
        url: &str,
        tier: &TierSelector,
    ) -> Result<(FormatCatalog, Option<RetrievalProfile>), DownloadError> {
        if tier.needs_catalog() {
            let discovery = self.selector.discover(url).await?;
            Ok((discovery.catalog, Some(discovery.profile)))
        } else {
            Ok((FormatCatalog::default(), None))
        }
    }

    /// Retrieve the artifact for a request into a fresh job namespace.
    pub async fn fetch(&self, request: &MediaRequest) -> Result<FetchedArtifact, DownloadError> {
        let url = normalize_locator(&request.locator);
        let tier = &request.requested_tier;
        let (catalog, preselected) = self.prepare(&url, tier).await?;
        let expression = FormatSelector::resolve(tier, &catalog);

        let post_process = if tier.is_audio() {
            PostProcess::ExtractAudio(self.formats.audio_format.clone())
        } else {
            PostProcess::Merge(self.formats.merge_format.clone())
        };

        let mut job = self.workspace.create_job();
        let spec = RetrievalSpec {
            url,
            expression,
            output_template: job.output_template.clone(),
            post_process,
        };
        tracing::info!(
            job = %job.job_id,
            url = %spec.url,
            format = %spec.expression,
            "job created"
        );

        let result = async {
            let (outcome, profile) = self.selector.retrieve(&spec, preselected.as_ref()).await?;
            let artifact = self
                .workspace
                .locate(&job, outcome.filepath.as_deref())
                .await?;
            Ok::<_, DownloadError>((outcome, profile, artifact))
        }
        .await;

        match result {
            Ok((outcome, profile, artifact)) => {
                tracing::info!(
                    job = %job.job_id,
                    profile = %profile.identity_tag(),
                    file = %artifact.file_name(),
                    size = artifact.size,
                    "job succeeded"
                );
                job.succeed(profile);
                let title = outcome
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| Some(catalog.title).filter(|t| !t.trim().is_empty()))
                    .unwrap_or_else(|| "download".to_string());
                Ok(FetchedArtifact {
                    title,
                    artifact,
                    guard: CleanupGuard::new(job),
                })
            }
            Err(err) => {
                job.fail();
                tracing::warn!(job = %job.job_id, kind = %err.kind(), "job failed, cleaning up");
                purge(&job).await;
                purge_after(job, self.late_write_grace);
                Err(err)
            }
        }
    }

    /// Run `fetch` on its own task.
    ///
    /// If the caller goes away mid-retrieval the task still completes, and the
    /// dropped result purges whatever the engine produced.
    pub async fn fetch_detached(
        self: Arc<Self>,
        request: MediaRequest,
    ) -> Result<FetchedArtifact, DownloadError> {
        tokio::spawn(async move { self.fetch(&request).await })
            .await
            .map_err(|e| DownloadError::ExtractionFailed(format!("download task failed: {}", e)))?
    }

    /// Direct remote stream location for a request; nothing touches the disk.
    pub async fn resolve_stream(&self, request: &MediaRequest) -> Result<String, DownloadError> {
        let url = normalize_locator(&request.locator);
        let tier = &request.requested_tier;
        let (catalog, preselected) = self.prepare(&url, tier).await?;
        let expression = FormatSelector::resolve_progressive(tier, &catalog);

        self.selector
            .stream_url(&url, &expression, preselected.as_ref())
            .await
    }
}
