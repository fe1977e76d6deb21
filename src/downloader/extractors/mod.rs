// Extraction engine adapters
//
// yt-dlp runs either as a native binary (default) or as `python3 -m yt_dlp`
// when a Python interpreter is configured. Both share one argument builder.

mod ytdlp;

pub use ytdlp::{EngineCommand, EngineSettings, YtDlpEngine};
