//! Conversion of YouTube links into embeddable player URLs, and the reverse
//! lookup used to build preview thumbnails.

use url::Url;

/// Base of every canonical embed URL
pub const EMBED_BASE: &str = "https://www.youtube.com/embed/";

/// Shown when no video id can be recovered from a stored URL
pub const PLACEHOLDER_THUMBNAIL: &str = "https://placehold.co/480x360?text=Live";

const EMBED_MARKER: &str = "/embed/";

/// Size variant of a YouTube thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailQuality {
    /// `0.jpg`, full size
    #[default]
    High,
    /// `default.jpg`, small
    Default,
}

impl ThumbnailQuality {
    fn file_name(self) -> &'static str {
        match self {
            ThumbnailQuality::High => "0.jpg",
            ThumbnailQuality::Default => "default.jpg",
        }
    }
}

/// Turn a YouTube watch or short link into `https://www.youtube.com/embed/<id>`.
///
/// Anything else (embed links, other providers, unparseable input) is
/// returned unchanged.
pub fn normalize_url(input: &str) -> String {
    let Ok(parsed) = Url::parse(input) else {
        return input.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return input.to_string();
    };

    if host.contains("youtube.com") {
        let id = parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            return format!("{EMBED_BASE}{id}");
        }
    }

    if host == "youtu.be" {
        let id = parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty());
        if let Some(id) = id {
            return format!("{EMBED_BASE}{id}");
        }
    }

    input.to_string()
}

/// Video id following `/embed/`, if the URL has one
pub fn video_id(url: &str) -> Option<&str> {
    let start = url.find(EMBED_MARKER)? + EMBED_MARKER.len();
    let rest = &url[start..];
    let end = rest.find(['?', '#', '/']).unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Preview image for a stored URL, or [`PLACEHOLDER_THUMBNAIL`] when the URL
/// carries no recognizable video id
pub fn thumbnail_url(url: &str, quality: ThumbnailQuality) -> String {
    match video_id(url) {
        Some(id) => format!("https://img.youtube.com/vi/{id}/{}", quality.file_name()),
        None => PLACEHOLDER_THUMBNAIL.to_string(),
    }
}
