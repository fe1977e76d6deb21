// Common data models for the download pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Format id of the audio-only tier.
pub const AUDIO_ID: &str = "mp3-best";

/// Format id of the "best available" video tier.
pub const AUTO_ID: &str = "v-auto";

/// Simplified quality request coming from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierSelector {
    Auto,
    MaxHeight(u32),
    AudioBest,
    /// Engine expression passed through untouched
    Raw(String),
}

impl TierSelector {
    /// Parse a public `format_id`.
    ///
    /// `v-<garbage>` degrades to `Auto`; unknown ids are raw engine expressions.
    pub fn from_format_id(format_id: &str) -> Self {
        if format_id == AUTO_ID {
            return Self::Auto;
        }
        if format_id == AUDIO_ID {
            return Self::AudioBest;
        }
        if let Some(height) = format_id.strip_prefix("v-") {
            return match height.parse::<u32>() {
                Ok(h) => Self::MaxHeight(h),
                Err(_) => Self::Auto,
            };
        }
        Self::Raw(format_id.to_string())
    }

    /// Whether resolving this selector needs the format catalog.
    pub fn needs_catalog(&self) -> bool {
        matches!(self, Self::MaxHeight(_))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::AudioBest)
    }
}

/// One inbound request. Immutable for its whole lifetime.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub locator: String,
    pub requested_tier: TierSelector,
}

impl MediaRequest {
    pub fn new(locator: impl Into<String>, requested_tier: TierSelector) -> Self {
        Self {
            locator: locator.into(),
            requested_tier,
        }
    }
}

/// A single rendition as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub abr: Option<f64>,
    pub tbr: Option<f64>,
    pub filesize: Option<u64>,
}

impl Rendition {
    /// Some extractors omit `vcodec` on muxed renditions; a height still implies video.
    pub fn has_video(&self) -> bool {
        match self.vcodec.as_deref() {
            Some("none") => false,
            Some(v) => !v.is_empty(),
            None => self.height.is_some(),
        }
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().map_or(false, |a| a != "none" && !a.is_empty())
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

/// Metadata-only payload returned by the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineMetadata {
    pub title: Option<String>,
    pub renditions: Vec<Rendition>,
}

/// Simplified catalog of what a locator offers. Rebuilt on every query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatCatalog {
    /// Distinct video heights, highest first
    pub available_heights: Vec<u32>,
    pub has_audio_only: bool,
    pub title: String,
    /// First renditions as reported, for advanced raw selection
    pub raw_sample: Vec<Rendition>,
}

/// Entry of the public format list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub label: String,
    pub ext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Response of the format listing.
#[derive(Debug, Clone, Serialize)]
pub struct FormatListing {
    pub title: String,
    pub formats: Vec<FormatOption>,
    pub raw_formats_sample: Vec<Rendition>,
}

/// Transcoder step the engine runs after fetching streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    /// Merge separate video/audio streams into this container
    Merge(String),
    /// Extract the audio track and convert it to this codec
    ExtractAudio(String),
}

/// What the engine reports after a successful retrieval.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    pub title: Option<String>,
    /// Final path, when the engine was able to report it
    pub filepath: Option<PathBuf>,
}

/// The file a job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_vocabulary() {
        assert_eq!(TierSelector::from_format_id("v-auto"), TierSelector::Auto);
        assert_eq!(TierSelector::from_format_id("v-720"), TierSelector::MaxHeight(720));
        assert_eq!(TierSelector::from_format_id("mp3-best"), TierSelector::AudioBest);
        assert_eq!(TierSelector::from_format_id("v-hd"), TierSelector::Auto);
        assert_eq!(
            TierSelector::from_format_id("137+140"),
            TierSelector::Raw("137+140".to_string())
        );
    }

    #[test]
    fn test_rendition_tracks() {
        let audio = Rendition {
            vcodec: Some("none".into()),
            acodec: Some("opus".into()),
            ..Default::default()
        };
        assert!(audio.is_audio_only());

        let video_only = Rendition {
            height: Some(1080),
            vcodec: Some("avc1.640028".into()),
            acodec: Some("none".into()),
            ..Default::default()
        };
        assert!(video_only.has_video());
        assert!(!video_only.is_audio_only());

        // Storyboards and the like report no codecs at all
        assert!(!Rendition::default().has_video());
        assert!(!Rendition::default().is_audio_only());
    }
}
