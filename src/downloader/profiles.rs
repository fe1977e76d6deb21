// Retrieval profiles - client identities presented to the upstream source
//
// Discovery walks the whole catalog in priority order. Retrieval reuses the
// profile that worked and falls back once to the broad-compatibility profile.

use std::fmt;
use std::path::{Path, PathBuf};

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";
const SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15";

/// Which client the engine impersonates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    /// Plain desktop browser, no player client override
    Desktop,
    /// web + web_safari player clients
    Web,
    Android,
    Ios,
    Tv,
    MobileWeb,
}

impl ClientIdentity {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Web => "web",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Tv => "tv",
            Self::MobileWeb => "mweb",
        }
    }

    /// Value for `--extractor-args youtube:player_client=`.
    pub fn player_client(&self) -> Option<&'static str> {
        match self {
            Self::Desktop => None,
            Self::Web => Some("web,web_safari"),
            Self::Android => Some("android"),
            Self::Ios => Some("ios"),
            Self::Tv => Some("tv"),
            Self::MobileWeb => Some("mweb"),
        }
    }

    /// Browser user agent, for identities that pretend to be a browser.
    /// Native app clients let the engine pick a matching agent.
    pub fn user_agent(&self) -> Option<&'static str> {
        match self {
            Self::Desktop | Self::Web => Some(DESKTOP_UA),
            Self::MobileWeb => Some(SAFARI_UA),
            Self::Android | Self::Ios | Self::Tv => None,
        }
    }

    /// Whether the engine can present cookies with this client.
    pub fn accepts_credentials(&self) -> bool {
        !matches!(self, Self::Android | Self::Ios)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A bundle of client-identity signals handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalProfile {
    pub identity: ClientIdentity,
    pub headers: Vec<(String, String)>,
    pub credential_ref: Option<PathBuf>,
}

impl RetrievalProfile {
    pub fn new(identity: ClientIdentity) -> Self {
        let headers = match identity {
            ClientIdentity::Desktop | ClientIdentity::Web | ClientIdentity::MobileWeb => vec![
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
                ("Referer".to_string(), "https://www.youtube.com/".to_string()),
            ],
            _ => Vec::new(),
        };
        Self {
            identity,
            headers,
            credential_ref: None,
        }
    }

    pub fn with_credentials(mut self, cookies: Option<&Path>) -> Self {
        if self.identity.accepts_credentials() {
            self.credential_ref = cookies.map(Path::to_path_buf);
        }
        self
    }

    /// Tag used in logs, e.g. `web+cookies`.
    pub fn identity_tag(&self) -> String {
        if self.credential_ref.is_some() {
            format!("{}+cookies", self.identity.tag())
        } else {
            self.identity.tag().to_string()
        }
    }

    pub fn user_agent(&self) -> Option<&'static str> {
        self.identity.user_agent()
    }
}

/// Ordered, read-only set of profiles built once at startup.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    ordered: Vec<RetrievalProfile>,
    broad: RetrievalProfile,
}

impl ProfileCatalog {
    /// Build the default priority list.
    ///
    /// The cookie-backed web profile only exists when a credential file is present.
    pub fn standard(cookies: Option<&Path>) -> Self {
        let mut ordered = Vec::new();
        if cookies.is_some() {
            ordered.push(RetrievalProfile::new(ClientIdentity::Web).with_credentials(cookies));
        }
        ordered.push(RetrievalProfile::new(ClientIdentity::Android));
        ordered.push(RetrievalProfile::new(ClientIdentity::Ios));
        ordered.push(RetrievalProfile::new(ClientIdentity::Tv).with_credentials(cookies));
        ordered.push(RetrievalProfile::new(ClientIdentity::MobileWeb).with_credentials(cookies));

        let broad = RetrievalProfile::new(ClientIdentity::Desktop).with_credentials(cookies);

        Self { ordered, broad }
    }

    /// Custom ordering. The broad profile is the single retrieval fallback.
    pub fn new(ordered: Vec<RetrievalProfile>, broad: RetrievalProfile) -> Self {
        Self { ordered, broad }
    }

    pub fn ordered(&self) -> &[RetrievalProfile] {
        &self.ordered
    }

    /// First choice when no discovery happened for a request.
    pub fn primary(&self) -> &RetrievalProfile {
        self.ordered.first().unwrap_or(&self.broad)
    }

    /// Most broadly compatible profile, the one extra retrieval attempt.
    pub fn broad(&self) -> &RetrievalProfile {
        &self.broad
    }
}
