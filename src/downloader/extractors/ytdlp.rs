// yt-dlp engine - drives the `yt-dlp` binary or `python3 -m yt_dlp`
//
// Every mode shares the same profile-derived arguments; only the action
// flags differ (dump JSON, download with post-processing, or print URLs).

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command as StdCommand;

use crate::downloader::errors::EngineError;
use crate::downloader::locator::is_youtube;
use crate::downloader::models::{DownloadOutcome, EngineMetadata, PostProcess, Rendition};
use crate::downloader::profiles::RetrievalProfile;
use crate::downloader::traits::{ExtractionEngine, RetrievalSpec};
use crate::downloader::utils::{error_preview, run_output_with_timeout};

/// How the engine is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Native `yt-dlp` binary
    Binary(String),
    /// `<python> -m yt_dlp`
    PythonModule(String),
}

impl EngineCommand {
    /// Locate a yt-dlp binary in the usual places, falling back to `$PATH`.
    pub fn find_binary() -> Self {
        let common_paths = [
            "/opt/homebrew/bin/yt-dlp",
            "/usr/local/bin/yt-dlp",
            "/usr/bin/yt-dlp",
        ];

        for path in common_paths {
            if std::path::Path::new(path).exists() {
                return Self::Binary(path.to_string());
            }
        }

        if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
            if output.status.success() {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    return Self::Binary(found);
                }
            }
        }

        Self::Binary("yt-dlp".to_string())
    }

    fn program(&self) -> &str {
        match self {
            Self::Binary(path) => path,
            Self::PythonModule(python) => python,
        }
    }

    fn leading_args(&self) -> Vec<String> {
        match self {
            Self::Binary(_) => Vec::new(),
            Self::PythonModule(_) => vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }
}

/// Timeouts and network switches applied to every invocation.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Passed as `--socket-timeout`
    pub socket_timeout_secs: u64,
    /// Wall-clock limit for metadata and URL resolution calls
    pub metadata_timeout_secs: u64,
    /// Wall-clock limit for a full download
    pub download_timeout_secs: u64,
    pub force_ipv4: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            socket_timeout_secs: 120,
            metadata_timeout_secs: 180,
            download_timeout_secs: 1800,
            force_ipv4: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    formats: Option<Vec<Rendition>>,
    // Single-format extractors describe their only rendition at the top level
    #[serde(flatten)]
    top_level: Rendition,
}

#[derive(Debug, Deserialize)]
struct MovedFile {
    title: Option<String>,
    filepath: Option<PathBuf>,
}

/// The locator comes from the caller; `--` keeps yt-dlp from reading it as an option.
fn push_locator(args: &mut Vec<String>, url: &str) {
    args.push("--".to_string());
    args.push(url.to_string());
}

pub struct YtDlpEngine {
    command: EngineCommand,
    settings: EngineSettings,
}

impl YtDlpEngine {
    pub fn new(command: EngineCommand, settings: EngineSettings) -> Self {
        Self { command, settings }
    }

    /// Arguments shared by every mode: network behaviour plus profile signals.
    fn common_args(&self, url: &str, profile: &RetrievalProfile) -> Vec<String> {
        let mut args = self.command.leading_args();
        args.extend([
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--socket-timeout".to_string(),
            self.settings.socket_timeout_secs.to_string(),
        ]);

        if self.settings.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }

        if let Some(ua) = profile.user_agent() {
            args.push("--user-agent".to_string());
            args.push(ua.to_string());
        }

        for (name, value) in &profile.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        if is_youtube(url) {
            if let Some(client) = profile.identity.player_client() {
                args.push("--extractor-args".to_string());
                args.push(format!("youtube:player_client={}", client));
            }
        }

        if let Some(path) = &profile.credential_ref {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        args
    }

    fn metadata_args(&self, url: &str, profile: &RetrievalProfile) -> Vec<String> {
        let mut args = self.common_args(url, profile);
        args.push("--dump-json".to_string());
        push_locator(&mut args, url);
        args
    }

    fn download_args(&self, spec: &RetrievalSpec, profile: &RetrievalProfile) -> Vec<String> {
        let mut args = self.common_args(&spec.url, profile);
        args.extend([
            "-f".to_string(),
            spec.expression.clone(),
            "-o".to_string(),
            spec.output_template.to_string_lossy().to_string(),
            "--retries".to_string(),
            "5".to_string(),
            "--fragment-retries".to_string(),
            "10".to_string(),
            "--print".to_string(),
            "after_move:%(.{title,filepath})j".to_string(),
            "--no-simulate".to_string(),
        ]);

        match &spec.post_process {
            PostProcess::Merge(container) => {
                args.push("--merge-output-format".to_string());
                args.push(container.clone());
            }
            PostProcess::ExtractAudio(codec) => {
                args.push("-x".to_string());
                args.push("--audio-format".to_string());
                args.push(codec.clone());
            }
        }

        push_locator(&mut args, &spec.url);
        args
    }

    fn stream_args(&self, url: &str, expression: &str, profile: &RetrievalProfile) -> Vec<String> {
        let mut args = self.common_args(url, profile);
        args.extend([
            "-f".to_string(),
            expression.to_string(),
            "--get-url".to_string(),
        ]);
        push_locator(&mut args, url);
        args
    }

    async fn run(
        &self,
        args: Vec<String>,
        timeout_secs: u64,
        profile: &RetrievalProfile,
    ) -> Result<Vec<u8>, EngineError> {
        tracing::debug!(
            program = self.command.program(),
            profile = %profile.identity_tag(),
            args = %args.join(" "),
            "running yt-dlp"
        );

        let output = run_output_with_timeout(self.command.program(), &args, timeout_secs).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::debug!(
                profile = %profile.identity_tag(),
                error = %error_preview(&stderr),
                "yt-dlp exited with {}",
                output.status
            );
            return Err(EngineError::new(if stderr.trim().is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                stderr
            }));
        }

        Ok(output.stdout)
    }

    fn parse_metadata(stdout: &[u8]) -> Result<EngineMetadata, EngineError> {
        let info: InfoJson = serde_json::from_slice(stdout)
            .map_err(|e| EngineError::new(format!("Invalid JSON from yt-dlp: {}", e)))?;

        let renditions = match info.formats {
            Some(formats) if !formats.is_empty() => formats,
            _ => vec![info.top_level],
        };

        Ok(EngineMetadata {
            title: info.title,
            renditions,
        })
    }

    /// The `--print after_move:` line is the last JSON object on stdout.
    fn parse_moved(stdout: &[u8]) -> DownloadOutcome {
        let text = String::from_utf8_lossy(stdout);
        text.lines()
            .rev()
            .filter(|l| l.trim_start().starts_with('{'))
            .find_map(|l| serde_json::from_str::<MovedFile>(l.trim()).ok())
            .map(|m| DownloadOutcome {
                title: m.title,
                filepath: m.filepath,
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        match self.command {
            EngineCommand::Binary(_) => "yt-dlp",
            EngineCommand::PythonModule(_) => "python-yt-dlp",
        }
    }

    async fn extract(
        &self,
        url: &str,
        profile: &RetrievalProfile,
    ) -> Result<EngineMetadata, EngineError> {
        let args = self.metadata_args(url, profile);
        let stdout = self
            .run(args, self.settings.metadata_timeout_secs, profile)
            .await?;
        Self::parse_metadata(&stdout)
    }

    async fn download(
        &self,
        spec: &RetrievalSpec,
        profile: &RetrievalProfile,
    ) -> Result<DownloadOutcome, EngineError> {
        let args = self.download_args(spec, profile);

        let stdout = self
            .run(args, self.settings.download_timeout_secs, profile)
            .await?;
        Ok(Self::parse_moved(&stdout))
    }

    async fn stream_url(
        &self,
        url: &str,
        expression: &str,
        profile: &RetrievalProfile,
    ) -> Result<String, EngineError> {
        let args = self.stream_args(url, expression, profile);
        let stdout = self
            .run(args, self.settings.metadata_timeout_secs, profile)
            .await?;

        String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("http"))
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::new("Failed to extract final streaming URL. Source may be unavailable.")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::profiles::ClientIdentity;

    fn engine() -> YtDlpEngine {
        YtDlpEngine::new(
            EngineCommand::Binary("yt-dlp".to_string()),
            EngineSettings::default(),
        )
    }

    #[test]
    fn test_parse_metadata() {
        let json = br#"{
            "id": "XYZ",
            "title": "Clip",
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5},
                {"format_id": "137", "ext": "mp4", "height": 1080, "vcodec": "avc1.640028", "acodec": "none", "filesize": null},
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"}
            ]
        }"#;
        let meta = YtDlpEngine::parse_metadata(json).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Clip"));
        assert_eq!(meta.renditions.len(), 3);
        assert_eq!(meta.renditions[1].height, Some(1080));
        assert!(meta.renditions[0].is_audio_only());
    }

    #[test]
    fn test_parse_single_format_payload() {
        let json = br#"{"title": "Song", "ext": "mp3", "vcodec": "none", "acodec": "mp3"}"#;
        let meta = YtDlpEngine::parse_metadata(json).unwrap();
        assert_eq!(meta.renditions.len(), 1);
        assert!(meta.renditions[0].is_audio_only());
    }

    #[test]
    fn test_parse_metadata_rejects_garbage() {
        assert!(YtDlpEngine::parse_metadata(b"not json").is_err());
    }

    #[test]
    fn test_parse_moved_takes_last_json_line() {
        let stdout = b"[info] something\n{\"title\": \"Clip\", \"filepath\": \"/d/abc.webm\"}\n{\"title\": \"Clip\", \"filepath\": \"/d/abc.mp4\"}\n";
        let outcome = YtDlpEngine::parse_moved(stdout);
        assert_eq!(outcome.filepath, Some(PathBuf::from("/d/abc.mp4")));
        assert_eq!(outcome.title.as_deref(), Some("Clip"));

        assert!(YtDlpEngine::parse_moved(b"").filepath.is_none());
    }

    #[test]
    fn test_profile_args() {
        let cookies = PathBuf::from("/srv/cookies.txt");
        let profile = RetrievalProfile::new(ClientIdentity::Web).with_credentials(Some(&cookies));
        let args = engine().common_args("https://www.youtube.com/watch?v=XYZ", &profile);
        let joined = args.join(" ");

        assert!(joined.contains("--extractor-args youtube:player_client=web,web_safari"));
        assert!(joined.contains("--cookies /srv/cookies.txt"));
        assert!(joined.contains("--add-header Referer:https://www.youtube.com/"));
        assert!(joined.contains("--socket-timeout 120"));
        assert!(joined.contains("--force-ipv4"));
    }

    #[test]
    fn test_player_client_only_for_youtube() {
        let profile = RetrievalProfile::new(ClientIdentity::Android);
        let args = engine().common_args("https://vimeo.com/1", &profile);
        assert!(!args.iter().any(|a| a == "--extractor-args"));
        assert!(!args.iter().any(|a| a == "--user-agent"));

        let web = RetrievalProfile::new(ClientIdentity::Web);
        let lookalike = engine().common_args("https://notyoutube.com.evil/watch?v=x", &web);
        assert!(!lookalike.iter().any(|a| a == "--extractor-args"));
    }

    #[test]
    fn test_locator_never_parsed_as_option() {
        let engine = engine();
        let profile = RetrievalProfile::new(ClientIdentity::Android);
        let hostile = "--batch-file=/etc/passwd";
        let spec = RetrievalSpec {
            url: hostile.to_string(),
            expression: "best".to_string(),
            output_template: PathBuf::from("/d/abc.%(ext)s"),
            post_process: PostProcess::Merge("mp4".to_string()),
        };

        for args in [
            engine.metadata_args(hostile, &profile),
            engine.download_args(&spec, &profile),
            engine.stream_args(hostile, "best", &profile),
        ] {
            let n = args.len();
            assert_eq!(args[n - 1], hostile);
            assert_eq!(args[n - 2], "--");
            assert_eq!(args.iter().filter(|a| *a == hostile).count(), 1);
        }
    }

    #[test]
    fn test_download_args_post_process() {
        let profile = RetrievalProfile::new(ClientIdentity::Desktop);
        let spec = RetrievalSpec {
            url: "https://youtu.be/abc".to_string(),
            expression: "bestaudio/best".to_string(),
            output_template: PathBuf::from("/d/abc.%(ext)s"),
            post_process: PostProcess::ExtractAudio("mp3".to_string()),
        };
        let joined = engine().download_args(&spec, &profile).join(" ");
        assert!(joined.contains("-f bestaudio/best -o /d/abc.%(ext)s"));
        assert!(joined.contains("-x --audio-format mp3"));
        assert!(joined.ends_with("-- https://youtu.be/abc"));
    }

    #[test]
    fn test_python_module_prefix() {
        let engine = YtDlpEngine::new(
            EngineCommand::PythonModule("python3".to_string()),
            EngineSettings::default(),
        );
        let args = engine.common_args("https://x", &RetrievalProfile::new(ClientIdentity::Desktop));
        assert_eq!(&args[..2], &["-m".to_string(), "yt_dlp".to_string()]);
        assert_eq!(engine.name(), "python-yt-dlp");
    }
}
