// Downloader module - request orchestration around the extraction engine

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod job;
pub mod lifecycle;
pub mod locator;
pub mod models;
pub mod orchestrator;
pub mod profiles;
pub mod traits;
pub mod utils;

pub use errors::{DownloadError, EngineError, ErrorKind};
pub use format_selector::FormatSelector;
pub use job::{JobState, JobWorkspace, LocatePolicy, RetrievalJob};
pub use lifecycle::CleanupGuard;
pub use models::{Artifact, FormatCatalog, FormatListing, FormatOption, MediaRequest, TierSelector};
pub use orchestrator::{Downloader, FetchedArtifact, OutputFormats, StrategySelector};
pub use profiles::{ClientIdentity, ProfileCatalog, RetrievalProfile};
pub use traits::{ExtractionEngine, RetrievalSpec};
