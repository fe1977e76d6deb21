// Locator normalization
//
// Playlist/mix links and short links for the same video collapse into one
// canonical watch URL. Anything unrecognized passes through untouched.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap();
}

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

const CANONICAL_WATCH: &str = "https://www.youtube.com/watch";

const SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

/// Whether the locator's host is a YouTube host. Unparsable locators are not.
pub fn is_youtube(url: &str) -> bool {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .map_or(false, |host| {
            YOUTUBE_HOSTS.contains(&host.as_str()) || SHORT_HOSTS.contains(&host.as_str())
        })
}

/// Canonicalize a locator. Best effort: never fails, never rejects.
pub fn normalize_locator(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(parsed) => canonical_form(&parsed).unwrap_or_else(|| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    }
}

fn canonical_form(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let is_youtube_host = YOUTUBE_HOSTS.contains(&host.as_str());

    // youtu.be/<id>
    if SHORT_HOSTS.contains(&host.as_str()) {
        let id = url.path_segments()?.next()?;
        return valid_id(id).map(|id| watch_url(CANONICAL_WATCH, id));
    }

    // /watch?v=<id>&list=...&index=...
    if url.path() == "/watch" {
        let id = url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())?;
        let id = valid_id(&id)?;
        if is_youtube_host {
            return Some(watch_url(CANONICAL_WATCH, id));
        }
        let base = format!("{}://{}/watch", url.scheme(), authority(url)?);
        return Some(watch_url(&base, id));
    }

    // /shorts/<id>, /live/<id>
    if is_youtube_host {
        let mut segments = url.path_segments()?;
        if let (Some("shorts" | "live" | "embed"), Some(id)) = (segments.next(), segments.next()) {
            return valid_id(id).map(|id| watch_url(CANONICAL_WATCH, id));
        }
    }

    None
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn valid_id(id: &str) -> Option<&str> {
    VIDEO_ID.is_match(id).then_some(id)
}

fn watch_url(base: &str, id: &str) -> String {
    format!("{}?v={}", base, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_playlist_noise() {
        assert_eq!(
            normalize_locator(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=RDdQw4w9WgXcQ&index=2"
            ),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_short_link() {
        assert_eq!(
            normalize_locator("https://youtu.be/dQw4w9WgXcQ?si=abc123"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_mobile_and_shorts() {
        assert_eq!(
            normalize_locator("https://m.youtube.com/watch?v=dQw4w9WgXcQ&feature=share"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_locator("https://www.youtube.com/shorts/abcDEF12345"),
            "https://www.youtube.com/watch?v=abcDEF12345"
        );
    }

    #[test]
    fn test_other_host_keeps_identity() {
        assert_eq!(
            normalize_locator("https://example/watch?v=XYZ&list=PL123"),
            "https://example/watch?v=XYZ"
        );
    }

    #[test]
    fn test_passthrough() {
        let cases = [
            "https://soundcloud.com/artist/track",
            "https://www.youtube.com/playlist?list=PL123",
            "https://youtu.be/",
            "not a url at all",
            "",
        ];
        for case in cases {
            assert_eq!(normalize_locator(case), case);
        }
    }

    #[test]
    fn test_is_youtube() {
        assert!(is_youtube("https://YOUTU.BE/x"));
        assert!(is_youtube("https://music.youtube.com/watch?v=x"));
        assert!(!is_youtube("https://vimeo.com/1"));
        assert!(!is_youtube("https://notyoutube.com.evil/watch?v=x"));
        assert!(!is_youtube("https://evil.example/?u=youtube.com"));
        assert!(!is_youtube("youtube.com/watch?v=x"));
    }
}
