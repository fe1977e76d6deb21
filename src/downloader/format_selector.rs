// FormatSelector - catalog simplification and tier -> expression mapping
//
// Converts raw renditions from the engine into a stable tier list and turns a
// tier selector back into a yt-dlp format expression. Only height is ever
// constrained; codec and bitrate ordering is left to the engine.

use super::models::{
    EngineMetadata, FormatCatalog, FormatOption, TierSelector, AUDIO_ID, AUTO_ID,
};

/// Number of raw renditions exposed for advanced selection.
const RAW_SAMPLE_LEN: usize = 40;

const BEST_MERGED: &str = "bestvideo+bestaudio/best";
const BEST_AUDIO: &str = "bestaudio/best";
const BEST_SINGLE: &str = "best";

pub struct FormatSelector;

impl FormatSelector {
    /// Build the simplified catalog from a metadata payload.
    pub fn build_catalog(metadata: &EngineMetadata) -> FormatCatalog {
        let mut heights: Vec<u32> = metadata
            .renditions
            .iter()
            .filter(|r| r.has_video())
            .filter_map(|r| r.height)
            .filter(|h| *h > 0)
            .collect();
        heights.sort_unstable_by(|a, b| b.cmp(a));
        heights.dedup();

        FormatCatalog {
            available_heights: heights,
            has_audio_only: metadata.renditions.iter().any(|r| r.is_audio_only()),
            title: metadata.title.clone().unwrap_or_default(),
            raw_sample: metadata
                .renditions
                .iter()
                .take(RAW_SAMPLE_LEN)
                .cloned()
                .collect(),
        }
    }

    /// Public tier list: auto, one entry per height, then the audio tier.
    pub fn build_options(
        catalog: &FormatCatalog,
        video_ext: &str,
        audio_ext: &str,
    ) -> Vec<FormatOption> {
        let mut options = Vec::new();

        if !catalog.available_heights.is_empty() {
            options.push(FormatOption {
                format_id: AUTO_ID.to_string(),
                label: "Auto (best)".to_string(),
                ext: video_ext.to_string(),
                height: None,
            });
            for h in &catalog.available_heights {
                options.push(FormatOption {
                    format_id: format!("v-{}", h),
                    label: format!("{}p", h),
                    ext: video_ext.to_string(),
                    height: Some(*h),
                });
            }
        }

        if catalog.has_audio_only {
            options.push(FormatOption {
                format_id: AUDIO_ID.to_string(),
                label: format!("{} (bestaudio)", audio_ext.to_uppercase()),
                ext: audio_ext.to_string(),
                height: None,
            });
        }

        options
    }

    /// Largest cataloged height <= `max`, else the smallest cataloged height.
    pub fn select_height(catalog: &FormatCatalog, max: u32) -> Option<u32> {
        let heights = &catalog.available_heights;
        heights
            .iter()
            .copied()
            .filter(|h| *h <= max)
            .max()
            .or_else(|| heights.iter().copied().min())
    }

    /// Expression for a merged (video + audio) retrieval.
    pub fn resolve(selector: &TierSelector, catalog: &FormatCatalog) -> String {
        match selector {
            TierSelector::Auto => BEST_MERGED.to_string(),
            TierSelector::MaxHeight(max) => match Self::select_height(catalog, *max) {
                Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
                None => BEST_MERGED.to_string(),
            },
            TierSelector::AudioBest => BEST_AUDIO.to_string(),
            TierSelector::Raw(expr) => expr.clone(),
        }
    }

    /// Expression for a single progressive stream (direct redirect delivery).
    pub fn resolve_progressive(selector: &TierSelector, catalog: &FormatCatalog) -> String {
        match selector {
            TierSelector::Auto => BEST_SINGLE.to_string(),
            TierSelector::MaxHeight(max) => match Self::select_height(catalog, *max) {
                Some(h) => format!("best[height<={h}]/best"),
                None => BEST_SINGLE.to_string(),
            },
            TierSelector::AudioBest => BEST_AUDIO.to_string(),
            TierSelector::Raw(expr) => expr.clone(),
        }
    }
}
