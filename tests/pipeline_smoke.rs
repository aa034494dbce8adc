use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pingrab_engine::cancel::CancelToken;
use pingrab_engine::config::GrabConfig;
use pingrab_engine::grab::{self, DiscoveryStatus, DownloadStatus, Selection};
use pingrab_engine::http::{HttpResponse, HttpTransport, TransportError};
use pingrab_engine::journal::Journal;
use pingrab_engine::paths::GrabPaths;
use pingrab_engine::GrabError;

const BOARD_URL: &str = "https://www.pinterest.com/maker/workshop/";
const RESOURCE_PREFIX: &str = "https://www.pinterest.com/resource/BoardFeedResource/get/";

struct FakeSite {
    pages: Mutex<Vec<(String, u16, &'static str, Vec<u8>)>>,
    hits: Mutex<HashMap<String, usize>>,
    requests: AtomicUsize,
}

impl FakeSite {
    fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            hits: Mutex::new(HashMap::new()),
            requests: AtomicUsize::new(0),
        }
    }

    fn serve(self, prefix: &str, status: u16, content_type: &'static str, body: &[u8]) -> Self {
        self.pages
            .lock()
            .expect("pages lock")
            .push((prefix.to_string(), status, content_type, body.to_vec()));
        self
    }

    fn hits(&self, prefix: &str) -> usize {
        self.hits
            .lock()
            .expect("hits lock")
            .get(prefix)
            .copied()
            .unwrap_or(0)
    }
}

impl HttpTransport for FakeSite {
    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().expect("pages lock");
        let Some((prefix, status, content_type, body)) = pages
            .iter()
            .filter(|(prefix, ..)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, ..)| prefix.len())
        else {
            return Err(TransportError::Network(format!("no route for {url}")));
        };
        *self
            .hits
            .lock()
            .expect("hits lock")
            .entry(prefix.clone())
            .or_insert(0) += 1;
        Ok(HttpResponse {
            status: *status,
            content_type: content_type.to_string(),
            final_url: url.to_string(),
            body: Box::new(Cursor::new(body.clone())),
        })
    }
}

fn quick_config() -> GrabConfig {
    let mut config = GrabConfig::default();
    config.fetch.max_retries = 0;
    config.crawl.page_delay_ms = 0;
    config.download.concurrency = 3;
    config.download.max_retries_per_item = 0;
    config
}

fn board_html() -> String {
    let pins: Vec<String> = (0..6)
        .map(|i| {
            let thumb = format!("https://i.pinimg.com/236x/f0/0{i}/pin{i}.jpg");
            let orig = format!("https://i.pinimg.com/originals/f0/0{i}/pin{i}.jpg");
            format!(
                r#"{{"id":"{i}","images":{{
                    "236x":{{"url":"{thumb}","width":236,"height":300}},
                    "orig":{{"url":"{orig}","width":1000,"height":1270}}}}}}"#
            )
        })
        .collect();
    format!(
        r#"<!doctype html><html><head><title>workshop</title></head><body>
<script id="__PWS_DATA__" type="application/json">{{"props":{{"initialReduxState":{{
"boards":{{"workshop":{{"board":{{"id":"31337"}}}}}},
"resources":{{"BoardFeedResource":{{"first":{{"nextBookmark":"b2"}}}}}},
"pins":[{}]}}}}}}</script></body></html>"#,
        pins.join(",")
    )
}

fn board_site() -> FakeSite {
    let second_page = br#"{"resource_response":{"bookmark":"-end-","data":[
        {"id":"6","images":{"orig":{"url":"https://i.pinimg.com/originals/f0/06/pin6.mp4"}}},
        {"id":"0","images":{"orig":{"url":"https://i.pinimg.com/originals/f0/00/pin0.jpg"}}}
    ]}}"#;
    let mut site = FakeSite::new()
        .serve(BOARD_URL, 200, "text/html; charset=utf-8", board_html().as_bytes())
        .serve(RESOURCE_PREFIX, 200, "application/json", second_page);
    for i in 0..6 {
        site = site.serve(
            &format!("https://i.pinimg.com/originals/f0/0{i}/pin{i}.jpg"),
            200,
            "image/jpeg",
            format!("\u{FF}jpeg-{i}").as_bytes(),
        );
    }
    site.serve(
        "https://i.pinimg.com/originals/f0/06/pin6.mp4",
        404,
        "text/html",
        b"<html>gone</html>",
    )
}

#[test]
fn board_is_discovered_downloaded_and_bundled() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let paths = GrabPaths::new(tmp.path().to_path_buf());
    paths.ensure_dirs().expect("dirs");
    let journal = Journal::open(&paths).expect("journal");
    let site = Arc::new(board_site());
    let cancel = CancelToken::new();

    let discovery = grab::discover(
        "https://de.pinterest.com/maker/workshop/?invite_code=zz",
        &quick_config(),
        site.clone(),
        &cancel,
        &journal,
    )
    .expect("discover");
    assert_eq!(discovery.reference.canonical_url, BOARD_URL);
    assert_eq!(discovery.status(), DiscoveryStatus::Complete);
    assert_eq!(discovery.pages_fetched, 2);
    assert_eq!(discovery.descriptors.len(), 7);
    assert_eq!(site.hits(RESOURCE_PREFIX), 1);

    let destination = tmp.path().join("out");
    let mut finished = 0;
    let report = grab::download(
        &discovery.descriptors,
        &Selection::All,
        &destination,
        &quick_config(),
        site.as_ref(),
        &cancel,
        &journal,
        |event| {
            if event.completed > finished {
                finished = event.completed;
            }
        },
    );
    assert_eq!(finished, 7);
    assert_eq!(report.total, 7);
    assert_eq!(report.succeeded, 6);
    assert_eq!(report.status(), DownloadStatus::PartialSuccess);
    assert!(!report.items[6].outcome.is_success());
    assert_eq!(report.summary_line(), "6 of 7 succeeded");

    let zip_path = tmp.path().join("workshop.zip");
    let summary = grab::bundle(&report, &zip_path, &journal).expect("bundle");
    assert_eq!(summary.entries, 6);

    let file = std::fs::File::open(&zip_path).expect("open zip");
    let mut archive = zip::ZipArchive::new(file).expect("zip archive");
    assert_eq!(archive.len(), 6);
    let first_name = report.items[0].descriptor.suggested_filename.clone();
    let mut first = Vec::new();
    archive
        .by_name(&first_name)
        .expect("first entry")
        .read_to_end(&mut first)
        .expect("read entry");
    assert_eq!(first, "\u{FF}jpeg-0".as_bytes());
}

#[test]
fn selection_downloads_only_requested_items_and_reuses_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let site = Arc::new(board_site());
    let cancel = CancelToken::new();
    let discovery = grab::discover(
        BOARD_URL,
        &quick_config(),
        site.clone(),
        &cancel,
        &Journal::disabled(),
    )
    .expect("discover");

    let selection = Selection::Indices(vec![2, 0, 2, 40]);
    let report = grab::download(
        &discovery.descriptors,
        &selection,
        tmp.path(),
        &quick_config(),
        site.as_ref(),
        &cancel,
        &Journal::disabled(),
        |_| {},
    );
    assert_eq!(report.status(), DownloadStatus::AllSucceeded);
    assert_eq!(report.total, 2);
    assert_eq!(
        report.items[0].descriptor.source_url,
        "https://i.pinimg.com/originals/f0/00/pin0.jpg"
    );

    let before = site.requests.load(Ordering::SeqCst);
    let again = grab::download(
        &discovery.descriptors,
        &selection,
        tmp.path(),
        &quick_config(),
        site.as_ref(),
        &cancel,
        &Journal::disabled(),
        |_| {},
    );
    assert_eq!(again.succeeded, 2);
    assert_eq!(site.requests.load(Ordering::SeqCst), before);
}

#[test]
fn item_cap_stops_discovery_early() {
    let site = Arc::new(board_site());
    let mut config = quick_config();
    config.crawl.max_items = 4;
    let discovery = grab::discover(
        BOARD_URL,
        &config,
        site.clone(),
        &CancelToken::new(),
        &Journal::disabled(),
    )
    .expect("discover");
    assert_eq!(discovery.status(), DiscoveryStatus::Capped);
    assert_eq!(discovery.descriptors.len(), 4);
    assert_eq!(site.hits(RESOURCE_PREFIX), 0);
}

#[test]
fn malformed_url_is_rejected_up_front() {
    let site = Arc::new(FakeSite::new());
    let err = grab::discover(
        "www.pinterest.com/pin/123",
        &quick_config(),
        site.clone(),
        &CancelToken::new(),
        &Journal::disabled(),
    )
    .expect_err("invalid");
    assert!(matches!(err, GrabError::InvalidUrl { .. }));
    assert_eq!(site.requests.load(Ordering::SeqCst), 0);
}
