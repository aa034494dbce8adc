use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

pub(crate) const IMAGE_EXTS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];
pub(crate) const VIDEO_EXTS: &[&str] = &[".mp4", ".webm", ".mov", ".m4v"];
const STREAM_MANIFEST_EXTS: &[&str] = &[".m3u8", ".mpd"];
const MEDIA_HOST_SUFFIX: &str = "pinimg.com";
const REJECT_MARKERS: &[&str] = &["placeholder", "default_", "/default/", "/images/default"];
const MAX_STEM_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Unknown,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Unknown => "unknown",
        }
    }

    fn default_extension(self) -> &'static str {
        match self {
            MediaType::Image => ".jpg",
            MediaType::Video => ".mp4",
            MediaType::Unknown => ".bin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeHint {
    pub width: u32,
    pub height: u32,
}

impl SizeHint {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub source_url: String,
    pub media_type: MediaType,
    pub suggested_filename: String,
    pub size_hint: Option<SizeHint>,
}

impl MediaDescriptor {
    pub fn new(
        source_url: String,
        type_hint: Option<MediaType>,
        size_hint: Option<SizeHint>,
    ) -> Self {
        let media_type = match type_hint {
            Some(hint) if hint != MediaType::Unknown => hint,
            _ => media_type_from_url(&source_url),
        };
        let suggested_filename = suggested_filename(&source_url, media_type);
        Self {
            source_url,
            media_type,
            suggested_filename,
            size_hint,
        }
    }

    pub fn key(&self) -> String {
        canonical_media_key(&self.source_url)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    items: Vec<MediaDescriptor>,
    seen: HashSet<String>,
}

impl DescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    // Returns `true` when the descriptor was new.
    pub fn push(&mut self, descriptor: MediaDescriptor) -> bool {
        if !self.seen.insert(descriptor.key()) {
            return false;
        }
        self.items.push(descriptor);
        true
    }

    pub fn extend(&mut self, descriptors: impl IntoIterator<Item = MediaDescriptor>) -> usize {
        descriptors
            .into_iter()
            .map(|d| self.push(d))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn into_vec(self) -> Vec<MediaDescriptor> {
        self.items
    }
}

pub fn canonical_media_key(raw: &str) -> String {
    let upgraded = upgrade_resolution(raw);
    let Ok(mut parsed) = Url::parse(&upgraded) else {
        return raw.trim().to_string();
    };
    parsed.set_fragment(None);
    if is_media_host_url(&parsed) {
        parsed.set_query(None);
        let _ = parsed.set_scheme("https");
    }
    parsed.to_string()
}

pub fn upgrade_resolution(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if !is_media_host_url(&parsed) || is_video_path(parsed.path()) {
        return raw.to_string();
    }
    let path = parsed.path();
    let upgraded = size_dir_re().replace(path, "/originals/");
    if upgraded == path {
        return raw.to_string();
    }
    let mut updated = parsed.clone();
    updated.set_path(&upgraded);
    updated.to_string()
}

pub fn media_type_from_url(raw: &str) -> MediaType {
    let path = url_path_lower(raw);
    if IMAGE_EXTS.iter().any(|ext| path.ends_with(ext)) {
        MediaType::Image
    } else if VIDEO_EXTS.iter().any(|ext| path.ends_with(ext)) {
        MediaType::Video
    } else {
        MediaType::Unknown
    }
}

pub fn media_type_from_content_type(content_type: &str) -> MediaType {
    let ctype = content_type.trim().to_ascii_lowercase();
    if ctype.starts_with("image/") {
        MediaType::Image
    } else if ctype.starts_with("video/") {
        MediaType::Video
    } else {
        MediaType::Unknown
    }
}

pub fn is_plausible_media_url(raw: &str, type_hint: Option<MediaType>) -> bool {
    if raw.len() < 10 {
        return false;
    }
    let Ok(parsed) = Url::parse(raw) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return false;
    }
    let path = parsed.path().to_ascii_lowercase();
    if STREAM_MANIFEST_EXTS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    let lower = raw.to_ascii_lowercase();
    if REJECT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return false;
    }
    if is_media_host_url(&parsed) && avatar_re().is_match(&path) {
        return false;
    }
    media_type_from_url(raw) != MediaType::Unknown
        || matches!(type_hint, Some(MediaType::Image | MediaType::Video))
}

pub fn is_media_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == MEDIA_HOST_SUFFIX || host.ends_with(&format!(".{MEDIA_HOST_SUFFIX}"))
}

pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let ctype = content_type.trim().to_ascii_lowercase();
    let ext = if ctype.contains("jpeg") || ctype.contains("jpg") {
        ".jpg"
    } else if ctype.contains("png") {
        ".png"
    } else if ctype.contains("gif") {
        ".gif"
    } else if ctype.contains("webp") {
        ".webp"
    } else if ctype.contains("mp4") {
        ".mp4"
    } else if ctype.contains("webm") {
        ".webm"
    } else if ctype.contains("quicktime") {
        ".mov"
    } else {
        return None;
    };
    Some(ext)
}

pub(crate) fn is_stream_manifest_url(raw: &str) -> bool {
    let path = url_path_lower(raw);
    STREAM_MANIFEST_EXTS.iter().any(|ext| path.ends_with(ext))
}

/// `<stem>_<sha256(url)[..12]><ext>`: stable for a given URL, distinct across URLs.
pub fn suggested_filename(source_url: &str, media_type: MediaType) -> String {
    let path = url_path_lower(source_url);
    let ext = IMAGE_EXTS
        .iter()
        .chain(VIDEO_EXTS.iter())
        .find(|ext| path.ends_with(*ext))
        .copied()
        .unwrap_or_else(|| media_type.default_extension());

    let stem_raw = Url::parse(source_url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|name| {
            Path::new(&name)
                .file_stem()
                .map(|v| v.to_string_lossy().to_string())
        })
        .unwrap_or_default();
    let mut stem = sanitize_name(&stem_raw);
    if stem.len() > MAX_STEM_LEN {
        stem.truncate(MAX_STEM_LEN);
    }
    if stem.is_empty() {
        stem = media_type.as_str().to_string();
    }

    let digest = hex::encode(Sha256::digest(source_url.as_bytes()));
    format!("{stem}_{}{ext}", &digest[..12])
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')
}

// Lowercase stem safe on every filesystem; anything else collapses to `_`.
fn sanitize_name(text: &str) -> String {
    let mapped: String = text
        .trim()
        .chars()
        .map(|ch| if is_name_char(ch) { ch.to_ascii_lowercase() } else { '_' })
        .collect();
    mapped.trim_matches(['.', '_']).to_string()
}

fn is_media_host_url(parsed: &Url) -> bool {
    parsed.host_str().map(is_media_host).unwrap_or(false)
}

fn is_video_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("/videos/") || VIDEO_EXTS.iter().any(|ext| lower.ends_with(ext))
}

fn url_path_lower(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => raw
            .split(&['?', '#'][..])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase(),
    }
}

fn size_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/\d{2,4}x(?:\d{2,4})?/").expect("size dir regex")
    })
}

fn avatar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/\d{2,4}x\d{2,4}_rs/").expect("avatar regex"))
}
