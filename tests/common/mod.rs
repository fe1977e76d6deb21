//! Scripted extraction engine shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kaneki_downloader_lib::downloader::models::{DownloadOutcome, EngineMetadata, Rendition};
use kaneki_downloader_lib::downloader::{
    ClientIdentity, Downloader, EngineError, ExtractionEngine, JobWorkspace, LocatePolicy,
    OutputFormats, ProfileCatalog, RetrievalProfile, RetrievalSpec, StrategySelector,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Extract { profile: String, url: String },
    Download { profile: String },
    StreamUrl { profile: String, expression: String },
}

/// Engine whose behaviour per profile tag is fixed up front.
pub struct FakeEngine {
    pub metadata: EngineMetadata,
    /// Profile tag -> failure text for metadata queries
    pub extract_failures: HashMap<String, String>,
    /// Profile tag -> failure text for downloads
    pub download_failures: HashMap<String, String>,
    /// Extensions written on a successful download, in order
    pub outputs: Vec<String>,
    pub payload: Vec<u8>,
    pub report_path: bool,
    /// Leave a partial fragment behind before failing
    pub leave_partial: bool,
    pub download_delay: Option<Duration>,
    /// Write `<job>.mp4` this long after a failed download returns
    pub late_write: Option<Duration>,
    pub calls: Mutex<Vec<Call>>,
    pub specs: Mutex<Vec<RetrievalSpec>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            metadata: sample_metadata(),
            extract_failures: HashMap::new(),
            download_failures: HashMap::new(),
            outputs: vec!["mp4".to_string()],
            payload: b"media-bytes".to_vec(),
            report_path: true,
            leave_partial: false,
            download_delay: None,
            late_write: None,
            calls: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn download_profiles(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Download { profile } => Some(profile),
                _ => None,
            })
            .collect()
    }

    pub fn extract_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Extract { .. }))
            .count()
    }

    pub fn last_spec(&self) -> Option<RetrievalSpec> {
        self.specs.lock().unwrap().last().cloned()
    }
}

fn output_path(template: &Path, ext: &str) -> PathBuf {
    PathBuf::from(template.to_string_lossy().replace("%(ext)s", ext))
}

#[async_trait]
impl ExtractionEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(
        &self,
        url: &str,
        profile: &RetrievalProfile,
    ) -> Result<EngineMetadata, EngineError> {
        let tag = profile.identity_tag();
        self.calls.lock().unwrap().push(Call::Extract {
            profile: tag.clone(),
            url: url.to_string(),
        });
        match self.extract_failures.get(&tag) {
            Some(msg) => Err(EngineError::new(msg.clone())),
            None => Ok(self.metadata.clone()),
        }
    }

    async fn download(
        &self,
        spec: &RetrievalSpec,
        profile: &RetrievalProfile,
    ) -> Result<DownloadOutcome, EngineError> {
        let tag = profile.identity_tag();
        self.calls
            .lock()
            .unwrap()
            .push(Call::Download { profile: tag.clone() });
        self.specs.lock().unwrap().push(spec.clone());

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(msg) = self.download_failures.get(&tag) {
            if self.leave_partial {
                std::fs::write(output_path(&spec.output_template, "mp4.part"), b"partial")
                    .unwrap();
            }
            if let Some(delay) = self.late_write {
                let straggler = output_path(&spec.output_template, "mp4");
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = std::fs::write(straggler, b"late");
                });
            }
            return Err(EngineError::new(msg.clone()));
        }

        let mut last = None;
        for ext in &self.outputs {
            let path = output_path(&spec.output_template, ext);
            std::fs::write(&path, &self.payload).unwrap();
            last = Some(path);
        }

        Ok(DownloadOutcome {
            title: self.metadata.title.clone(),
            filepath: if self.report_path { last } else { None },
        })
    }

    async fn stream_url(
        &self,
        _url: &str,
        expression: &str,
        profile: &RetrievalProfile,
    ) -> Result<String, EngineError> {
        self.calls.lock().unwrap().push(Call::StreamUrl {
            profile: profile.identity_tag(),
            expression: expression.to_string(),
        });
        Ok(format!("https://cdn.example/stream?f={}", expression))
    }
}

pub fn rendition(format_id: &str, height: Option<u32>, vcodec: &str, acodec: &str) -> Rendition {
    Rendition {
        format_id: Some(format_id.to_string()),
        ext: Some(if height.is_some() { "mp4" } else { "m4a" }.to_string()),
        height,
        vcodec: Some(vcodec.to_string()),
        acodec: Some(acodec.to_string()),
        ..Default::default()
    }
}

/// Renditions at 1080/720/360 plus an audio-only track.
pub fn sample_metadata() -> EngineMetadata {
    EngineMetadata {
        title: Some("Sample Clip".to_string()),
        renditions: vec![
            rendition("140", None, "none", "mp4a.40.2"),
            rendition("134", Some(360), "avc1", "none"),
            rendition("136", Some(720), "avc1", "none"),
            rendition("22", Some(720), "avc1", "mp4a.40.2"),
            rendition("137", Some(1080), "avc1", "none"),
        ],
    }
}

/// web -> android -> ios, with desktop as the broad fallback.
pub fn three_profiles() -> ProfileCatalog {
    ProfileCatalog::new(
        vec![
            RetrievalProfile::new(ClientIdentity::Web),
            RetrievalProfile::new(ClientIdentity::Android),
            RetrievalProfile::new(ClientIdentity::Ios),
        ],
        RetrievalProfile::new(ClientIdentity::Desktop),
    )
}

pub fn fast_policy() -> LocatePolicy {
    LocatePolicy {
        attempts: 3,
        delay: Duration::from_millis(10),
    }
}

pub fn downloader(engine: Arc<FakeEngine>, dir: &Path) -> Arc<Downloader> {
    let selector = StrategySelector::new(engine, Arc::new(three_profiles()));
    let workspace = JobWorkspace::new(dir, fast_policy());
    Arc::new(
        Downloader::new(selector, workspace, OutputFormats::default())
            .with_late_write_grace(Duration::from_millis(100)),
    )
}

/// Files currently in `dir`.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Wait for background cleanup to empty `dir`.
pub async fn wait_until_empty(dir: &Path) -> bool {
    for _ in 0..100 {
        if dir_entries(dir).is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
