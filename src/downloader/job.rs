// Retrieval jobs and artifact discovery
//
// Each job owns the file-name prefix `<job_id>.` inside the shared download
// directory. Job ids are fresh v4 UUIDs, so prefixes of concurrent jobs never
// overlap and no locking is needed.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use super::errors::DownloadError;
use super::models::Artifact;
use super::profiles::RetrievalProfile;

/// Suffixes the engine uses for in-flight files; never handed out as artifacts.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RetrievalJob {
    pub job_id: String,
    pub output_template: PathBuf,
    pub chosen_profile: Option<RetrievalProfile>,
    pub state: JobState,
    dir: PathBuf,
}

impl RetrievalJob {
    /// File-name prefix shared by every file this job may produce.
    pub fn prefix(&self) -> String {
        format!("{}.", self.job_id)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `name` belongs to this job.
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix())
    }

    pub fn succeed(&mut self, profile: RetrievalProfile) {
        self.chosen_profile = Some(profile);
        self.state = JobState::Succeeded;
    }

    pub fn fail(&mut self) {
        self.state = JobState::Failed;
    }
}

/// Bounded wait for the artifact to become visible.
#[derive(Debug, Clone, Copy)]
pub struct LocatePolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LocatePolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(300),
        }
    }
}

/// The shared output directory.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    dir: PathBuf,
    policy: LocatePolicy,
}

impl JobWorkspace {
    pub fn new(dir: impl Into<PathBuf>, policy: LocatePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    /// Start a new job with a never-reused id.
    pub fn create_job(&self) -> RetrievalJob {
        let job_id = Uuid::new_v4().simple().to_string();
        let output_template = self.dir.join(format!("{}.%(ext)s", job_id));
        RetrievalJob {
            job_id,
            output_template,
            chosen_profile: None,
            state: JobState::Pending,
            dir: self.dir.clone(),
        }
    }

    /// Find the file a job produced.
    ///
    /// A path reported by the engine wins when it exists and belongs to the job.
    /// Otherwise the directory is polled; the most recently modified candidate wins.
    pub async fn locate(
        &self,
        job: &RetrievalJob,
        reported: Option<&Path>,
    ) -> Result<Artifact, DownloadError> {
        if let Some(path) = reported {
            let owned = path.parent() == Some(job.dir())
                && path
                    .file_name()
                    .map_or(false, |n| job.owns(&n.to_string_lossy()));
            if owned {
                if let Ok(meta) = tokio::fs::metadata(path).await {
                    if meta.is_file() {
                        return Ok(to_artifact(path.to_path_buf(), meta.len()));
                    }
                }
            }
            tracing::debug!(
                job = %job.job_id,
                path = %path.display(),
                "reported path unusable, scanning"
            );
        }

        for attempt in 1..=self.policy.attempts.max(1) {
            if let Some((path, size)) = newest_candidate(job).await {
                return Ok(to_artifact(path, size));
            }
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        Err(DownloadError::ArtifactMissing(format!(
            "no file with prefix {} in {}",
            job.prefix(),
            job.dir().display()
        )))
    }
}

/// Every file under the job prefix, partial fragments included.
pub async fn job_files(job: &RetrievalJob) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(job.dir()).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if job.owns(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files
}

async fn newest_candidate(job: &RetrievalJob) -> Option<(PathBuf, u64)> {
    let mut best: Option<(PathBuf, u64, SystemTime)> = None;

    for path in job_files(job).await {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if best.as_ref().map_or(true, |(_, _, t)| modified > *t) {
            best = Some((path, meta.len(), modified));
        }
    }

    best.map(|(path, size, _)| (path, size))
}

fn to_artifact(path: PathBuf, size: u64) -> Artifact {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    Artifact {
        path,
        extension,
        size,
    }
}
