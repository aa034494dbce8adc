use crate::{GrabError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

const SHORT_LINK_HOST: &str = "pin.it";
const PRIMARY_HOST: &str = "www.pinterest.com";

const RESERVED_SEGMENTS: &[&str] = &[
    "_",
    "about",
    "business",
    "categories",
    "explore",
    "home",
    "ideas",
    "login",
    "logout",
    "news_hub",
    "password",
    "pin",
    "pin-builder",
    "resource",
    "search",
    "settings",
    "signup",
    "today",
    "topics",
    "videos",
];

const PROFILE_TABS: &[&str] = &["_created", "_saved", "pins", "boards"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Pin,
    Board,
    Profile,
    Unknown,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Pin => "pin",
            ContentKind::Board => "board",
            ContentKind::Profile => "profile",
            ContentKind::Unknown => "unknown",
        }
    }

    pub fn paginates(self) -> bool {
        matches!(self, ContentKind::Board | ContentKind::Profile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    pub original_url: String,
    pub canonical_url: String,
    pub kind: ContentKind,
}

impl ContentReference {
    pub fn pin_id(&self) -> Option<String> {
        if self.kind != ContentKind::Pin {
            return None;
        }
        self.canonical_segments().get(1).cloned()
    }

    pub fn username(&self) -> Option<String> {
        match self.kind {
            ContentKind::Board | ContentKind::Profile => self.canonical_segments().first().cloned(),
            _ => None,
        }
    }

    pub fn board_path(&self) -> Option<String> {
        if self.kind != ContentKind::Board {
            return None;
        }
        Url::parse(&self.canonical_url)
            .ok()
            .map(|url| url.path().to_string())
    }

    // `/user/board/section/`
    pub fn is_board_section(&self) -> bool {
        self.kind == ContentKind::Board && self.canonical_segments().len() == 3
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.canonical_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    fn canonical_segments(&self) -> Vec<String> {
        Url::parse(&self.canonical_url)
            .ok()
            .and_then(|url| {
                url.path_segments().map(|segments| {
                    segments
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
            })
            .unwrap_or_default()
    }
}

/// Parses, canonicalizes and classifies a pin, board or profile URL.
pub fn classify(raw_url: &str) -> Result<ContentReference> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err(GrabError::invalid_url(raw_url, "empty URL provided"));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|_| GrabError::invalid_url(trimmed, "invalid URL format"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(GrabError::invalid_url(
                trimmed,
                format!("unsupported URL scheme {other}; only http/https are allowed"),
            ));
        }
    }
    let Some(host) = parsed.host_str().map(|h| h.to_ascii_lowercase()) else {
        return Err(GrabError::invalid_url(trimmed, "URL is missing host"));
    };

    let segments: Vec<String> = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if host == SHORT_LINK_HOST {
        let [code] = segments.as_slice() else {
            return Err(GrabError::invalid_url(
                trimmed,
                "short link must have exactly one path segment",
            ));
        };
        if !is_identifier(code) {
            return Err(GrabError::invalid_url(trimmed, "short link code is malformed"));
        }
        return Ok(ContentReference {
            original_url: raw_url.to_string(),
            canonical_url: format!("https://{SHORT_LINK_HOST}/{code}"),
            kind: ContentKind::Unknown,
        });
    }

    let Some(canonical_host) = canonical_site_host(&host) else {
        return Err(GrabError::invalid_url(trimmed, format!("unrecognized host {host}")));
    };

    let (kind, kept) = match_path(&segments).ok_or_else(|| {
        GrabError::invalid_url(trimmed, "path does not address a pin, board or profile")
    })?;

    Ok(ContentReference {
        original_url: raw_url.to_string(),
        canonical_url: format!("https://{canonical_host}/{}/", kept.join("/")),
        kind,
    })
}

pub fn is_site_host(host: &str) -> bool {
    canonical_site_host(&host.to_ascii_lowercase()).is_some()
}

fn canonical_site_host(host: &str) -> Option<String> {
    match host {
        "pinterest.com" | "www.pinterest.com" => Some(host.to_string()),
        _ => {
            let sub = host.strip_suffix(".pinterest.com")?;
            if sub.len() == 2 && sub.chars().all(|ch| ch.is_ascii_lowercase()) {
                Some(PRIMARY_HOST.to_string())
            } else {
                None
            }
        }
    }
}

fn match_path(segments: &[String]) -> Option<(ContentKind, Vec<String>)> {
    let first = segments.first()?;
    if first == "pin" {
        // Trailing segments such as `/sent/` appear on shared-pin redirects.
        let [_, id, ..] = segments else {
            return None;
        };
        if !is_identifier(id) {
            return None;
        }
        return Some((ContentKind::Pin, vec!["pin".to_string(), id.clone()]));
    }

    let lowered = first.to_ascii_lowercase();
    if RESERVED_SEGMENTS.contains(&lowered.as_str()) || !is_username(first) {
        return None;
    }

    match segments {
        [user] => Some((ContentKind::Profile, vec![user.clone()])),
        [user, tab] if PROFILE_TABS.contains(&tab.as_str()) => {
            Some((ContentKind::Profile, vec![user.clone()]))
        }
        [user, board] if is_slug(board) => {
            Some((ContentKind::Board, vec![user.clone(), board.clone()]))
        }
        [user, board, section] if is_slug(board) && is_slug(section) => Some((
            ContentKind::Board,
            vec![user.clone(), board.clone(), section.clone()],
        )),
        _ => None,
    }
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

fn is_username(value: &str) -> bool {
    is_identifier(value) && !value.starts_with('_')
}

fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('_')
        && !value.contains(&['?', '#', '/'][..])
        && value.chars().all(|ch| !ch.is_control() && !ch.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_url_drops_tracking_params_and_keeps_host() {
        let r = classify("https://pinterest.com/pin/12345/?utm_source=x").expect("classify");
        assert_eq!(r.kind, ContentKind::Pin);
        assert_eq!(r.canonical_url, "https://pinterest.com/pin/12345/");
        assert_eq!(r.pin_id().as_deref(), Some("12345"));
        assert_eq!(r.original_url, "https://pinterest.com/pin/12345/?utm_source=x");
    }

    #[test]
    fn classification_is_idempotent() {
        let inputs = [
            "https://www.pinterest.com/pin/998877/?utm_medium=share&mt=login#comments",
            "http://pinterest.com/pin/998877",
            "https://de.pinterest.com/someone/travel-ideas/?invite_code=abc",
            "https://www.pinterest.com/someone/travel-ideas/beaches//",
            "https://www.pinterest.com/someone/_saved/",
            "https://pin.it/4xYzAbC?src=share",
        ];
        for input in inputs {
            let first = classify(input).expect("first");
            let second = classify(&first.canonical_url).expect("second");
            assert_eq!(first.kind, second.kind, "input={input}");
            assert_eq!(first.canonical_url, second.canonical_url, "input={input}");
        }
    }

    #[test]
    fn tracking_params_do_not_change_canonical_url() {
        let bare = classify("https://www.pinterest.com/someone/recipes/").expect("bare");
        let tracked = classify(
            "https://www.pinterest.com/someone/recipes?utm_source=a&utm_campaign=b&fbclid=1",
        )
        .expect("tracked");
        assert_eq!(bare.canonical_url, tracked.canonical_url);
        assert_eq!(tracked.kind, ContentKind::Board);
    }

    #[test]
    fn country_domains_map_to_primary_host() {
        let r = classify("https://in.pinterest.com/pin/42/").expect("classify");
        assert_eq!(r.canonical_url, "https://www.pinterest.com/pin/42/");
    }

    #[test]
    fn profile_and_profile_tabs_share_canonical_url() {
        let plain = classify("https://www.pinterest.com/someone").expect("plain");
        let tab = classify("https://www.pinterest.com/someone/_created/").expect("tab");
        assert_eq!(plain.kind, ContentKind::Profile);
        assert_eq!(tab.kind, ContentKind::Profile);
        assert_eq!(plain.canonical_url, tab.canonical_url);
        assert_eq!(plain.username().as_deref(), Some("someone"));
    }

    #[test]
    fn board_sections_are_boards() {
        let r = classify("https://www.pinterest.com/someone/travel/beaches/").expect("classify");
        assert_eq!(r.kind, ContentKind::Board);
        assert_eq!(r.board_path().as_deref(), Some("/someone/travel/beaches/"));
        assert!(r.is_board_section());
        let board = classify("https://www.pinterest.com/someone/travel/").expect("classify");
        assert!(!board.is_board_section());
    }

    #[test]
    fn shared_pin_suffixes_collapse_onto_the_pin() {
        let r =
            classify("https://www.pinterest.com/pin/987654/sent/?invite_code=x").expect("classify");
        assert_eq!(r.kind, ContentKind::Pin);
        assert_eq!(r.canonical_url, "https://www.pinterest.com/pin/987654/");
    }

    #[test]
    fn short_links_are_unknown_until_resolved() {
        let r = classify("https://pin.it/4xYzAbC/").expect("classify");
        assert_eq!(r.kind, ContentKind::Unknown);
        assert_eq!(r.canonical_url, "https://pin.it/4xYzAbC");
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in [
            "",
            "   ",
            "not a url",
            "ftp://pinterest.com/pin/1/",
            "javascript:alert(1)",
            "https://example.com/pin/1/",
            "https://notpinterest.com/pin/1/",
            "https://www.pinterest.com/",
            "https://www.pinterest.com/search/pins/?q=cats",
            "https://www.pinterest.com/pin/",
            "https://www.pinterest.com/a/b/c/d/",
            "https://pin.it/",
        ] {
            let err = classify(bad).expect_err(bad);
            assert!(matches!(err, GrabError::InvalidUrl { .. }), "input={bad:?} err={err}");
        }
    }

    #[test]
    fn site_host_detection() {
        assert!(is_site_host("WWW.Pinterest.com"));
        assert!(is_site_host("fr.pinterest.com"));
        assert!(!is_site_host("i.pinimg.com"));
        assert!(!is_site_host("evil-pinterest.com"));
    }
}
