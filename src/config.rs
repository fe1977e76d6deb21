//! Service configuration.
//!
//! Every option can come from a flag or from the environment; flags win.
//! Credentials are materialized once at startup and then only handed around
//! as a read-only path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::downloader::extractors::{EngineCommand, EngineSettings};
use crate::downloader::{LocatePolicy, OutputFormats};

/// How a finished download reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeliveryMode {
    /// Transfer the file inline, then delete it
    Stream,
    /// Redirect to the upstream stream URL; nothing is stored
    Redirect,
    /// Keep the file under /files for a while and return a link
    Link,
}

/// kaneki-downloader - media download service
#[derive(Parser, Debug, Clone)]
#[command(name = "kaneki-downloader")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory for job output (defaults to the user cache dir)
    #[arg(long, env = "DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    /// Cookie file handed to yt-dlp
    #[arg(long, env = "COOKIE_FILE", default_value = "cookies.txt")]
    pub cookie_file: PathBuf,

    /// Netscape cookies blob; written to the cookie file at startup
    #[arg(long, env = "YOUTUBE_COOKIES", hide_env_values = true)]
    pub cookies: Option<String>,

    /// yt-dlp binary (auto-detected when unset)
    #[arg(long, env = "YTDLP_PATH")]
    pub ytdlp: Option<String>,

    /// Run yt-dlp as a Python module with this interpreter
    #[arg(long, env = "YTDLP_PYTHON")]
    pub python: Option<String>,

    /// Socket timeout passed to yt-dlp
    #[arg(long, env = "SOCKET_TIMEOUT_SECS", default_value_t = 120)]
    pub socket_timeout_secs: u64,

    /// Wall-clock limit for metadata queries
    #[arg(long, env = "METADATA_TIMEOUT_SECS", default_value_t = 180)]
    pub metadata_timeout_secs: u64,

    /// Wall-clock limit for a download
    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value_t = 1800)]
    pub download_timeout_secs: u64,

    /// Container for merged video downloads
    #[arg(long, env = "MERGE_FORMAT", default_value = "mp4")]
    pub merge_format: String,

    /// Codec for the audio tier
    #[arg(long, env = "AUDIO_FORMAT", default_value = "mp3")]
    pub audio_format: String,

    /// How downloads are delivered
    #[arg(long, env = "DELIVERY", value_enum, default_value = "stream")]
    pub delivery: DeliveryMode,

    /// How long linked files stay available
    #[arg(long, env = "LINK_RETENTION_SECS", default_value_t = 600)]
    pub link_retention_secs: u64,

    /// Force IPv4 for upstream connections
    #[arg(long, env = "FORCE_IPV4", default_value_t = true, action = clap::ArgAction::Set)]
    pub force_ipv4: bool,

    /// Polls while waiting for a job's file to appear
    #[arg(long, env = "LOCATE_ATTEMPTS", default_value_t = 10)]
    pub locate_attempts: u32,

    /// Delay between polls, in milliseconds
    #[arg(long, env = "LOCATE_DELAY_MS", default_value_t = 300)]
    pub locate_delay_ms: u64,
}

impl Config {
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|d| d.join("kaneki-downloader").join("downloads"))
                .unwrap_or_else(|| PathBuf::from("downloads"))
        })
    }

    pub fn engine_command(&self) -> EngineCommand {
        match (&self.python, &self.ytdlp) {
            (Some(python), _) => EngineCommand::PythonModule(python.clone()),
            (None, Some(path)) => EngineCommand::Binary(path.clone()),
            (None, None) => EngineCommand::find_binary(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            socket_timeout_secs: self.socket_timeout_secs,
            metadata_timeout_secs: self.metadata_timeout_secs,
            download_timeout_secs: self.download_timeout_secs,
            force_ipv4: self.force_ipv4,
        }
    }

    pub fn output_formats(&self) -> OutputFormats {
        OutputFormats {
            merge_format: self.merge_format.clone(),
            audio_format: self.audio_format.clone(),
        }
    }

    pub fn locate_policy(&self) -> LocatePolicy {
        LocatePolicy {
            attempts: self.locate_attempts,
            delay: Duration::from_millis(self.locate_delay_ms),
        }
    }

    pub fn link_retention(&self) -> Duration {
        Duration::from_secs(self.link_retention_secs)
    }
}

/// Write the cookie blob (if any) and report which cookie file to use.
///
/// Returns `None` when the service has to run without credentials.
pub fn provision_cookies(blob: Option<&str>, cookie_file: &Path) -> Result<Option<PathBuf>> {
    if let Some(blob) = blob.filter(|b| !b.trim().is_empty()) {
        let stripped = blob.trim_start();
        if stripped.starts_with('{') || stripped.starts_with('[') {
            tracing::warn!(
                "YOUTUBE_COOKIES looks like JSON; yt-dlp expects Netscape cookies.txt format"
            );
        }
        if let Some(parent) = cookie_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(cookie_file, blob)
            .with_context(|| format!("writing cookies to {}", cookie_file.display()))?;
        tracing::info!(path = %cookie_file.display(), "wrote cookies");
        return Ok(Some(cookie_file.to_path_buf()));
    }

    if cookie_file.is_file() {
        tracing::info!(path = %cookie_file.display(), "using existing cookies file");
        Ok(Some(cookie_file.to_path_buf()))
    } else {
        tracing::info!("no YOUTUBE_COOKIES provided, running without cookies");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["kaneki-downloader"]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.delivery, DeliveryMode::Stream);
        assert!(config.force_ipv4);
        assert_eq!(config.output_formats().merge_format, "mp4");
        assert_eq!(config.locate_policy().attempts, 10);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "kaneki-downloader",
            "--delivery",
            "redirect",
            "--force-ipv4",
            "false",
            "--python",
            "python3",
            "--download-dir",
            "/srv/dl",
        ])
        .unwrap();
        assert_eq!(config.delivery, DeliveryMode::Redirect);
        assert!(!config.force_ipv4);
        assert_eq!(config.engine_command(), EngineCommand::PythonModule("python3".into()));
        assert_eq!(config.download_dir(), PathBuf::from("/srv/dl"));
    }

    #[test]
    fn test_provision_writes_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cookies.txt");
        let got = provision_cookies(Some("# Netscape HTTP Cookie File\n"), &file).unwrap();
        assert_eq!(got.as_deref(), Some(file.as_path()));
        assert!(std::fs::read_to_string(&file).unwrap().starts_with("# Netscape"));
    }

    #[test]
    fn test_provision_without_credentials() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cookies.txt");
        assert!(provision_cookies(Some("   "), &file).unwrap().is_none());

        std::fs::write(&file, "x").unwrap();
        assert_eq!(provision_cookies(None, &file).unwrap(), Some(file));
    }
}
