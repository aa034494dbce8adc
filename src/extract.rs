use crate::crawl::PaginationCursor;
use crate::media::{
    is_plausible_media_url, upgrade_resolution, DescriptorSet, MediaDescriptor, MediaType, SizeHint,
};
use crate::reference::ContentReference;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use url::Url;

const DATA_SCRIPT_IDS: &[&str] = &["__PWS_DATA__", "__PWS_INITIAL_PROPS__"];
const CURSOR_KEYS: &[&str] = &["nextBookmark", "bookmark"];
const IMAGE_META_MARKERS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
];
const VIDEO_META_MARKERS: &[&str] = &["og:video", "og:video:url", "og:video:secure_url"];
const JS_URL_ESCAPES: &[(&str, &str)] = &[
    ("\\/", "/"),
    ("\\u002F", "/"),
    ("\\u002f", "/"),
    ("\\u0026", "&"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    Structured,
    Heuristic,
}

impl ExtractionStrategy {
    pub const ORDERED: [ExtractionStrategy; 2] =
        [ExtractionStrategy::Structured, ExtractionStrategy::Heuristic];

    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStrategy::Structured => "structured",
            ExtractionStrategy::Heuristic => "heuristic",
        }
    }

    fn run(self, page: &ParsedPage, reference: &ContentReference) -> Vec<MediaDescriptor> {
        match self {
            ExtractionStrategy::Structured => structured_descriptors(page, reference),
            ExtractionStrategy::Heuristic => heuristic_descriptors(page, reference),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub descriptors: Vec<MediaDescriptor>,
    pub next_cursor: Option<PaginationCursor>,
    pub strategy: Option<ExtractionStrategy>,
}

impl PageExtraction {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Pulls media descriptors and the next-page cursor out of a page body.
pub fn extract(page_body: &str, reference: &ContentReference) -> PageExtraction {
    let page = ParsedPage::parse(page_body);

    let mut out = PageExtraction::default();
    for strategy in ExtractionStrategy::ORDERED {
        let found = strategy.run(&page, reference);
        if !found.is_empty() {
            out.descriptors = found;
            out.strategy = Some(strategy);
            break;
        }
    }

    if reference.kind.paginates() {
        out.next_cursor = find_bookmark(&page.documents)
            .and_then(|bookmark| PaginationCursor::new(bookmark, find_board_id(&page.documents)));
    }
    out
}

pub(crate) fn canonical_link(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let link_selector =
        Selector::parse(r#"link[rel="canonical"][href]"#).expect("canonical selector");
    if let Some(href) = document
        .select(&link_selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
    {
        return Some(href.to_string());
    }
    let meta_selector =
        Selector::parse(r#"meta[property="og:url"][content]"#).expect("og:url selector");
    document
        .select(&meta_selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

struct ParsedPage<'a> {
    raw: &'a str,
    html: Option<Html>,
    documents: Vec<Value>,
}

impl<'a> ParsedPage<'a> {
    fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                return Self {
                    raw,
                    html: None,
                    documents: vec![value],
                };
            }
        }

        let html = Html::parse_document(raw);
        let script_selector = Selector::parse("script").expect("script selector");
        let mut documents = Vec::new();
        for script in html.select(&script_selector) {
            let kind = script.value().attr("type").unwrap_or("").to_ascii_lowercase();
            let id = script.value().attr("id").unwrap_or("");
            if !kind.contains("json") && !DATA_SCRIPT_IDS.contains(&id) {
                continue;
            }
            let text: String = script.text().collect();
            if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
                documents.push(value);
            }
        }
        Self {
            raw,
            html: Some(html),
            documents,
        }
    }
}

fn structured_descriptors(page: &ParsedPage, reference: &ContentReference) -> Vec<MediaDescriptor> {
    let base = Url::parse(&reference.canonical_url).ok();

    if let Some(pin_id) = reference.pin_id() {
        for doc in &page.documents {
            if let Some(scoped) = pin_scoped_descriptors(doc, &pin_id) {
                return scoped;
            }
        }
    }

    let mut set = DescriptorSet::new();
    for doc in &page.documents {
        walk_json(doc, &mut set);
    }
    if let Some(html) = &page.html {
        let selector = Selector::parse("[data-pin-media]").expect("data-pin-media selector");
        for el in html.select(&selector) {
            if let Some(raw) = el.value().attr("data-pin-media") {
                push_candidate(&mut set, raw, base.as_ref(), None, None);
            }
        }
    }
    set.into_vec()
}

fn pin_scoped_descriptors(value: &Value, pin_id: &str) -> Option<Vec<MediaDescriptor>> {
    match value {
        Value::Object(map) => {
            if map.get("id").and_then(json_id).as_deref() == Some(pin_id) {
                let mut set = DescriptorSet::new();
                walk_json(value, &mut set);
                if !set.is_empty() {
                    return Some(set.into_vec());
                }
            }
            map.values().find_map(|child| pin_scoped_descriptors(child, pin_id))
        }
        Value::Array(items) => items.iter().find_map(|child| pin_scoped_descriptors(child, pin_id)),
        _ => None,
    }
}

fn walk_json(value: &Value, set: &mut DescriptorSet) {
    match value {
        Value::Object(map) => {
            if let Some(url) = json_ld_content_url(map) {
                let hint = match json_ld_type(map) {
                    Some("VideoObject") => MediaType::Video,
                    _ => MediaType::Image,
                };
                push_candidate(set, &url, None, Some(hint), None);
            }
            if let Some((url, size)) = map
                .get("images")
                .and_then(Value::as_object)
                .and_then(pick_image_variant)
            {
                push_candidate(set, &url, None, Some(MediaType::Image), size);
            }
            if let Some((url, size)) = map
                .get("video_list")
                .and_then(Value::as_object)
                .and_then(pick_video_variant)
            {
                push_candidate(set, &url, None, Some(MediaType::Video), size);
            }
            for (key, child) in map {
                if key == "images" || key == "video_list" {
                    continue;
                }
                walk_json(child, set);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_json(item, set);
            }
        }
        _ => {}
    }
}

fn json_ld_type(map: &Map<String, Value>) -> Option<&str> {
    let declared = map.get("@type")?;
    let types: Vec<&str> = match declared {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    types
        .into_iter()
        .find(|t| *t == "ImageObject" || *t == "VideoObject")
}

fn json_ld_content_url(map: &Map<String, Value>) -> Option<String> {
    json_ld_type(map)?;
    match map.get("contentUrl")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().filter_map(Value::as_str).next().map(str::to_string),
        _ => None,
    }
}

fn pick_image_variant(images: &Map<String, Value>) -> Option<(String, Option<SizeHint>)> {
    if let Some(orig) = images.get("orig").and_then(variant_url_and_size) {
        return Some(orig);
    }
    images
        .values()
        .filter_map(variant_url_and_size)
        .max_by_key(|(_, size)| size.map(|s| s.area()).unwrap_or(0))
}

// Largest progressive variant; HLS playlists are skipped.
fn pick_video_variant(videos: &Map<String, Value>) -> Option<(String, Option<SizeHint>)> {
    videos
        .iter()
        .filter(|(key, _)| !key.to_ascii_uppercase().contains("HLS"))
        .filter_map(|(_, variant)| variant_url_and_size(variant))
        .filter(|(url, _)| !url.to_ascii_lowercase().contains(".m3u8"))
        .max_by_key(|(_, size)| size.map(|s| s.area()).unwrap_or(0))
}

fn variant_url_and_size(variant: &Value) -> Option<(String, Option<SizeHint>)> {
    let obj = variant.as_object()?;
    let url = obj.get("url").and_then(Value::as_str)?.trim();
    if url.is_empty() {
        return None;
    }
    let dim = |key: &str| obj.get(key).and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok());
    let size = match (dim("width"), dim("height")) {
        (Some(width), Some(height)) => Some(SizeHint { width, height }),
        _ => None,
    };
    Some((url.to_string(), size))
}

fn heuristic_descriptors(page: &ParsedPage, reference: &ContentReference) -> Vec<MediaDescriptor> {
    let base = Url::parse(&reference.canonical_url).ok();
    let mut set = DescriptorSet::new();

    if let Some(html) = &page.html {
        let meta_selector = Selector::parse("meta[content]").expect("meta selector");
        for tag in html.select(&meta_selector) {
            let marker = tag
                .value()
                .attr("property")
                .or_else(|| tag.value().attr("name"))
                .unwrap_or("")
                .to_ascii_lowercase();
            let hint = if IMAGE_META_MARKERS.contains(&marker.as_str()) {
                MediaType::Image
            } else if VIDEO_META_MARKERS.contains(&marker.as_str()) {
                MediaType::Video
            } else {
                continue;
            };
            if let Some(content) = tag.value().attr("content") {
                push_candidate(&mut set, content, base.as_ref(), Some(hint), None);
            }
        }

        let img_selector = Selector::parse("img").expect("img selector");
        for img in html.select(&img_selector) {
            for attr in ["src", "data-src"] {
                if let Some(raw) = img.value().attr(attr) {
                    push_candidate(&mut set, raw, base.as_ref(), None, None);
                }
            }
            if let (Some(srcset), Some(base)) = (img.value().attr("srcset"), base.as_ref()) {
                if let Some(best) = parse_srcset_best(srcset, base) {
                    push_candidate(&mut set, &best, Some(base), None, None);
                }
            }
        }

        let video_selector = Selector::parse("video[src], source[src]").expect("video selector");
        for el in html.select(&video_selector) {
            if let Some(raw) = el.value().attr("src") {
                let hint = el
                    .value()
                    .attr("type")
                    .filter(|t| t.to_ascii_lowercase().starts_with("video/"))
                    .map(|_| MediaType::Video);
                push_candidate(&mut set, raw, base.as_ref(), hint, None);
            }
        }
    }

    let unescaped = unescape_js_url(&page.raw);
    for m in media_host_url_re().find_iter(&unescaped) {
        push_candidate(&mut set, m.as_str(), None, None, None);
    }

    set.into_vec()
}

fn push_candidate(
    set: &mut DescriptorSet,
    raw: &str,
    base: Option<&Url>,
    hint: Option<MediaType>,
    size: Option<SizeHint>,
) {
    let Some(absolute) = absolutize(raw, base) else {
        return;
    };
    let upgraded = upgrade_resolution(&absolute);
    if !is_plausible_media_url(&upgraded, hint) {
        return;
    }
    let size = if upgraded == absolute { size } else { None };
    set.push(MediaDescriptor::new(upgraded, hint, size));
}

fn absolutize(raw: &str, base: Option<&Url>) -> Option<String> {
    let value = unescape_js_url(raw.trim());
    if value.is_empty() || value.starts_with("data:") || value.starts_with("blob:") {
        return None;
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    if let Ok(parsed) = Url::parse(&value) {
        return Some(parsed.to_string());
    }
    base?.join(&value).ok().map(|url| url.to_string())
}

fn unescape_js_url(raw: &str) -> String {
    JS_URL_ESCAPES
        .iter()
        .fold(raw.to_string(), |acc, (escaped, plain)| acc.replace(escaped, plain))
}

fn parse_srcset_best(srcset: &str, base: &Url) -> Option<String> {
    let mut best_url: Option<String> = None;
    let mut best_score = -1_i64;
    for chunk in srcset.split(',') {
        let bits: Vec<&str> = chunk.split_whitespace().collect();
        let Some(first) = bits.first() else {
            continue;
        };
        let Some(candidate) = absolutize(first, Some(base)) else {
            continue;
        };
        let mut score = 1_i64;
        if let Some(token) = bits.get(1) {
            let token = token.trim().to_ascii_lowercase();
            if let Some(width) = token.strip_suffix('w') {
                score = width.parse::<i64>().unwrap_or(1).max(1);
            } else if let Some(density) = token.strip_suffix('x') {
                score = (density.parse::<f64>().unwrap_or(1.0).max(1.0) * 1000.0) as i64;
            }
        }
        if score > best_score {
            best_score = score;
            best_url = Some(candidate);
        }
    }
    best_url
}

fn find_bookmark(documents: &[Value]) -> Option<String> {
    let mut preferred = None;
    let mut fallback = None;
    for doc in documents {
        collect_bookmark(doc, false, &mut preferred, &mut fallback);
        if preferred.is_some() {
            break;
        }
    }
    preferred.or(fallback)
}

fn collect_bookmark(
    value: &Value,
    in_resource: bool,
    preferred: &mut Option<String>,
    fallback: &mut Option<String>,
) {
    if preferred.is_some() {
        return;
    }
    match value {
        Value::Object(map) => {
            for key in CURSOR_KEYS {
                if let Some(bookmark) = map.get(*key).and_then(Value::as_str) {
                    if in_resource {
                        *preferred = Some(bookmark.to_string());
                        return;
                    }
                    if fallback.is_none() {
                        *fallback = Some(bookmark.to_string());
                    }
                }
            }
            for (key, child) in map {
                let child_in_resource = in_resource || is_feed_resource_key(key);
                collect_bookmark(child, child_in_resource, preferred, fallback);
                if preferred.is_some() {
                    return;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_bookmark(item, in_resource, preferred, fallback);
            }
        }
        _ => {}
    }
}

fn is_feed_resource_key(key: &str) -> bool {
    key == "resource_response" || key.ends_with("FeedResource") || key.ends_with("PinsResource")
}

fn find_board_id(documents: &[Value]) -> Option<String> {
    documents.iter().find_map(board_id_in)
}

fn board_id_in(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.get("board").and_then(|b| b.get("id")).and_then(json_id) {
                return Some(id);
            }
            map.values().find_map(board_id_in)
        }
        Value::Array(items) => items.iter().find_map(board_id_in),
        _ => None,
    }
}

fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn media_host_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)https?://[a-z0-9.-]*pinimg\.com/[^"'<>\s\\]+?\.(?:jpe?g|png|gif|webp|mp4|webm|mov|m4v)\b"#,
        )
        .expect("media host url regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::classify;

    fn pin() -> ContentReference {
        classify("https://www.pinterest.com/pin/111/").expect("pin")
    }

    fn board() -> ContentReference {
        classify("https://www.pinterest.com/someone/recipes/").expect("board")
    }

    fn pws_page(data: &str) -> String {
        format!(
            r#"<html><head><title>t</title></head><body>
<script id="__PWS_DATA__" type="application/json">{data}</script>
</body></html>"#
        )
    }

    fn urls(extraction: &PageExtraction) -> Vec<&str> {
        extraction
            .descriptors
            .iter()
            .map(|d| d.source_url.as_str())
            .collect()
    }

    #[test]
    fn pin_page_is_scoped_to_the_requested_pin() {
        let data = r#"{"props":{"initialReduxState":{"pins":{
            "111":{"id":"111","images":{
                "236x":{"url":"https://i.pinimg.com/236x/aa/bb/cc/main.jpg",
                    "width":236,"height":400},
                "orig":{"url":"https://i.pinimg.com/originals/aa/bb/cc/main.jpg",
                    "width":1000,"height":1600}}},
            "222":{"id":"222","images":{
                "orig":{"url":"https://i.pinimg.com/originals/dd/ee/ff/related.jpg",
                    "width":800,"height":800}}}
        }}}}"#;
        let out = extract(&pws_page(data), &pin());
        assert_eq!(out.strategy, Some(ExtractionStrategy::Structured));
        assert_eq!(urls(&out), vec!["https://i.pinimg.com/originals/aa/bb/cc/main.jpg"]);
        assert_eq!(
            out.descriptors[0].size_hint,
            Some(SizeHint {
                width: 1000,
                height: 1600
            })
        );
        assert!(out.next_cursor.is_none());
    }

    #[test]
    fn largest_variant_wins_without_orig() {
        let data = r#"{"pin":{"id":"111","images":{
            "170x":{"url":"https://cdn.example.com/small.jpg","width":170,"height":200},
            "600x":{"url":"https://cdn.example.com/large.jpg","width":600,"height":900},
            "236x":{"url":"https://cdn.example.com/mid.jpg","width":236,"height":300}}}}"#;
        let out = extract(&pws_page(data), &pin());
        assert_eq!(urls(&out), vec!["https://cdn.example.com/large.jpg"]);
    }

    #[test]
    fn video_list_prefers_largest_progressive_variant() {
        let data = r#"{"pin":{"id":"111","videos":{"video_list":{
            "V_HLSV4":{"url":"https://v1.pinimg.com/videos/hls/clip.m3u8",
                "width":1920,"height":1080},
            "V_720P":{"url":"https://v1.pinimg.com/videos/mc/720p/clip.mp4",
                "width":1280,"height":720},
            "V_240P":{"url":"https://v1.pinimg.com/videos/mc/240p/clip.mp4",
                "width":426,"height":240}}}}}"#;
        let out = extract(&pws_page(data), &pin());
        assert_eq!(urls(&out), vec!["https://v1.pinimg.com/videos/mc/720p/clip.mp4"]);
        assert_eq!(out.descriptors[0].media_type, MediaType::Video);
    }

    #[test]
    fn json_ld_image_objects_are_structured() {
        let html = r#"<html><head>
<script type="application/ld+json">{"@context":"https://schema.org","@type":"ImageObject",
"contentUrl":"https://i.pinimg.com/originals/11/22/33/ld.png"}</script>
</head><body></body></html>"#;
        let out = extract(html, &pin());
        assert_eq!(out.strategy, Some(ExtractionStrategy::Structured));
        assert_eq!(urls(&out), vec!["https://i.pinimg.com/originals/11/22/33/ld.png"]);
    }

    #[test]
    fn heuristic_runs_when_no_structured_data() {
        let html = r#"<html><head>
<meta property="og:image" content="https://i.pinimg.com/736x/aa/bb/cc/hero.jpg">
<meta name="twitter:image" content="https://i.pinimg.com/originals/aa/bb/cc/hero.jpg">
</head><body>
<img src="https://i.pinimg.com/75x75_RS/aa/bb/avatar.jpg">
<img src="/static/placeholder.png">
<script>window.x = "https:\/\/i.pinimg.com\/564x\/dd\/ee\/ff\/inline.webp";</script>
</body></html>"#;
        let out = extract(html, &pin());
        assert_eq!(out.strategy, Some(ExtractionStrategy::Heuristic));
        assert_eq!(
            urls(&out),
            vec![
                "https://i.pinimg.com/originals/aa/bb/cc/hero.jpg",
                "https://i.pinimg.com/originals/dd/ee/ff/inline.webp",
            ]
        );
    }

    #[test]
    fn escaped_urls_in_scripts_and_attributes_are_recovered() {
        let html = r#"<html><body>
<img src="https:\/\/cdn.example.com\/photo.jpg?w=1\u0026h=2">
<script>var a = "https:\u002f\u002fi.pinimg.com\u002f736x\u002fq\u002flower.jpg";
var b = "https:\u002F\u002Fv1.pinimg.com\u002Fvideos\u002Fmc\u002Fclip.mp4";</script>
</body></html>"#;
        let out = extract(html, &pin());
        assert_eq!(out.strategy, Some(ExtractionStrategy::Heuristic));
        assert_eq!(
            urls(&out),
            vec![
                "https://cdn.example.com/photo.jpg?w=1&h=2",
                "https://i.pinimg.com/originals/q/lower.jpg",
                "https://v1.pinimg.com/videos/mc/clip.mp4",
            ]
        );
        assert_eq!(unescape_js_url(r"a\/b\u0026c"), "a/b&c");
    }

    #[test]
    fn srcset_picks_widest_candidate() {
        let html = r#"<html><body>
<img srcset="https://cdn.example.com/a-small.jpg 300w, https://cdn.example.com/a-big.jpg 1200w">
</body></html>"#;
        let out = extract(html, &pin());
        assert_eq!(urls(&out), vec!["https://cdn.example.com/a-big.jpg"]);
    }

    #[test]
    fn changed_page_structure_yields_empty_extraction() {
        let html = r#"<html><head><title>Pin</title></head>
<body><div class="new-layout"><p>Nothing to see</p></div></body></html>"#;
        let out = extract(html, &pin());
        assert!(out.is_empty());
        assert_eq!(out.strategy, None);
        assert!(out.next_cursor.is_none());
    }

    #[test]
    fn duplicates_collapse_in_first_seen_order() {
        let data = r#"{"pins":[
            {"id":"1","images":{"orig":{"url":"https://i.pinimg.com/originals/a/first.jpg"}}},
            {"id":"2","images":{"orig":{"url":"https://i.pinimg.com/originals/b/second.jpg"}}},
            {"id":"3","images":{"474x":{"url":"https://i.pinimg.com/474x/a/first.jpg",
                "width":474,"height":600}}},
            {"id":"4",
                "images":{"orig":{"url":"https://i.pinimg.com/originals/b/second.jpg?cache=1"}}},
            {"id":"5","images":{"orig":{"url":"https://i.pinimg.com/originals/c/third.jpg"}}}
        ]}"#;
        let out = extract(&pws_page(data), &board());
        assert_eq!(
            urls(&out),
            vec![
                "https://i.pinimg.com/originals/a/first.jpg",
                "https://i.pinimg.com/originals/b/second.jpg",
                "https://i.pinimg.com/originals/c/third.jpg",
            ]
        );
    }

    #[test]
    fn board_page_yields_cursor_with_board_id() {
        let data = r#"{"props":{"initialReduxState":{
            "boards":{"x":{"board":{"id":"5551","name":"recipes"}}},
            "resources":{"BoardFeedResource":{"k":{"nextBookmark":"Y2JVSG81"}}},
            "pins":[{"id":"1","images":{"orig":{"url":"https://i.pinimg.com/originals/a/1.jpg"}}}]
        }}}"#;
        let out = extract(&pws_page(data), &board());
        let cursor = out.next_cursor.expect("cursor");
        assert_eq!(cursor.bookmark, "Y2JVSG81");
        assert_eq!(cursor.board_id.as_deref(), Some("5551"));
    }

    #[test]
    fn resource_response_bookmark_is_read_from_json_body() {
        let body = r#"{"resource":{"options":{"bookmarks":["old"]}},
            "resource_response":{"bookmark":"next-page","data":[
                {"id":"9","board":{"id":"5551"},
                    "images":{"orig":{"url":"https://i.pinimg.com/originals/z/9.jpg"}}}
            ]}}"#;
        let out = extract(body, &board());
        assert_eq!(urls(&out), vec!["https://i.pinimg.com/originals/z/9.jpg"]);
        let cursor = out.next_cursor.expect("cursor");
        assert_eq!(cursor.bookmark, "next-page");
    }

    #[test]
    fn end_marker_means_no_cursor() {
        let body = r#"{"resource_response":{"bookmark":"-end-","data":[]}}"#;
        let out = extract(body, &board());
        assert!(out.next_cursor.is_none());
        assert!(out.is_empty());
    }

    #[test]
    fn pin_pages_never_report_a_cursor() {
        let data = r#"{"resource_response":{"bookmark":"abc"},"pin":{"id":"111",
            "images":{"orig":{"url":"https://i.pinimg.com/originals/a/1.jpg"}}}}"#;
        let out = extract(&pws_page(data), &pin());
        assert!(out.next_cursor.is_none());
    }

    #[test]
    fn canonical_link_prefers_link_tag() {
        let html = r#"<html><head>
<meta property="og:url" content="https://www.pinterest.com/pin/2/">
<link rel="canonical" href="https://www.pinterest.com/pin/1/">
</head></html>"#;
        assert_eq!(canonical_link(html).as_deref(), Some("https://www.pinterest.com/pin/1/"));
        assert_eq!(canonical_link("<html></html>"), None);
    }
}
