// Job file lifecycle
//
// Failure paths purge a job's files immediately. Success paths hand a
// `CleanupGuard` to the response; the files go away when the guard drops,
// i.e. after the body has been fully sent (or abandoned). Cleanup never
// returns an error, it only logs.

use std::time::Duration;

use super::job::{job_files, RetrievalJob};

/// Delete every file under the job prefix. Returns how many were removed.
pub async fn purge(job: &RetrievalJob) -> usize {
    let mut removed = 0;
    for path in job_files(job).await {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    job = %job.job_id,
                    path = %path.display(),
                    error = %e,
                    "cleanup failed"
                );
            }
        }
    }
    if removed > 0 {
        tracing::debug!(job = %job.job_id, removed, "job files removed");
    }
    removed
}

/// Purge once more after `delay`, in the background.
pub fn purge_after(job: RetrievalJob, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        purge(&job).await;
    });
}

fn purge_blocking(job: &RetrievalJob) {
    let prefix = job.prefix();
    let Ok(entries) = std::fs::read_dir(job.dir()) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                tracing::warn!(job = %job.job_id, error = %e, "cleanup failed");
            }
        }
    }
}

/// Owns a finished job's files until it is dropped.
#[derive(Debug)]
pub struct CleanupGuard {
    job: Option<RetrievalJob>,
}

impl CleanupGuard {
    pub fn new(job: RetrievalJob) -> Self {
        Self { job: Some(job) }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.job_id.as_str())
    }

    /// Keep the files for `retention`, then purge them in the background.
    pub fn release_after(mut self, retention: Duration) {
        if let Some(job) = self.job.take() {
            purge_after(job, retention);
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    purge(&job).await;
                });
            }
            Err(_) => purge_blocking(&job),
        }
    }
}
