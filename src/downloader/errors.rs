// Error types for the download pipeline

use std::fmt;

/// Raw failure reported by the extraction engine.
///
/// The message text is the only signal available; it is classified exactly once,
/// when converted into a [`DownloadError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// Upstream demands a login/bot check the current profile cannot satisfy
    AuthenticationRequired(String),

    /// DNS or connectivity failure reaching the upstream source (timeouts included)
    NetworkUnreachable(String),

    /// The retrieval expression matched no rendition
    FormatUnavailable(String),

    /// Retrieval succeeded but no output file showed up
    ArtifactMissing(String),

    /// Anything else, with the engine's raw message
    ExtractionFailed(String),
}

/// Kind tag of a [`DownloadError`], handy for logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthenticationRequired,
    NetworkUnreachable,
    FormatUnavailable,
    ArtifactMissing,
    ExtractionFailed,
}

impl ErrorKind {
    /// Machine-parsable prefix used in response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "COOKIES_REQUIRED",
            Self::NetworkUnreachable => "NETWORK_UNREACHABLE",
            Self::FormatUnavailable => "FORMAT_NOT_AVAILABLE",
            Self::ArtifactMissing => "ARTIFACT_MISSING",
            Self::ExtractionFailed => "EXTRACTION_FAILED",
        }
    }

    /// Whether an operator can fix the condition (credentials, network) and retry.
    pub fn is_operator_retryable(&self) -> bool {
        matches!(self, Self::AuthenticationRequired | Self::NetworkUnreachable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// Checked in order; the first matching row wins.
const CLASSIFIERS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::AuthenticationRequired,
        &[
            "sign in to confirm",
            "use --cookies",
            "--cookies-from-browser",
            "login required",
            "not a bot",
            "account cookies",
        ],
    ),
    (
        ErrorKind::FormatUnavailable,
        &[
            "requested format is not available",
            "requested format not available",
            "no video formats found",
        ],
    ),
    (
        ErrorKind::NetworkUnreachable,
        &[
            "timed out",
            "timeout",
            "name or service not known",
            "temporary failure in name resolution",
            "nodename nor servname",
            "getaddrinfo failed",
            "failed to resolve",
            "network is unreachable",
            "connection refused",
            "connection reset",
            "no route to host",
        ],
    ),
];

/// Map engine failure text onto the error taxonomy.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    CLASSIFIERS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ErrorKind::ExtractionFailed)
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationRequired(_) => ErrorKind::AuthenticationRequired,
            Self::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            Self::FormatUnavailable(_) => ErrorKind::FormatUnavailable,
            Self::ArtifactMissing(_) => ErrorKind::ArtifactMissing,
            Self::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
        }
    }

    /// The underlying message as reported by the engine (or the locator).
    pub fn raw_message(&self) -> &str {
        match self {
            Self::AuthenticationRequired(msg)
            | Self::NetworkUnreachable(msg)
            | Self::FormatUnavailable(msg)
            | Self::ArtifactMissing(msg)
            | Self::ExtractionFailed(msg) => msg,
        }
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationRequired(_) => write!(
                f,
                "YouTube requires login cookies. Update YOUTUBE_COOKIES and redeploy."
            ),
            Self::NetworkUnreachable(msg) => write!(
                f,
                "Upstream source is unreachable from this deployment: {}",
                msg
            ),
            Self::FormatUnavailable(_) => write!(
                f,
                "Requested format isn't available. Re-query /formats or try 'v-auto'."
            ),
            Self::ArtifactMissing(msg) => write!(f, "Downloaded file not found: {}", msg),
            Self::ExtractionFailed(msg) => write!(f, "Extraction failed: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<EngineError> for DownloadError {
    fn from(err: EngineError) -> Self {
        let EngineError { message } = err;
        match classify(&message) {
            ErrorKind::AuthenticationRequired => Self::AuthenticationRequired(message),
            ErrorKind::NetworkUnreachable => Self::NetworkUnreachable(message),
            ErrorKind::FormatUnavailable => Self::FormatUnavailable(message),
            ErrorKind::ArtifactMissing => Self::ArtifactMissing(message),
            ErrorKind::ExtractionFailed => Self::ExtractionFailed(message),
        }
    }
}
