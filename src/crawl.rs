use crate::cancel::CancelToken;
use crate::config::CrawlConfig;
use crate::extract::{extract, PageExtraction};
use crate::fetch::{resource_url, FetchError, PageFetcher};
use crate::media::{DescriptorSet, MediaDescriptor};
use crate::reference::ContentReference;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

const END_BOOKMARK: &str = "-end-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub bookmark: String,
    /// Board id discovered on the first page; board feeds cannot be paged without it.
    pub board_id: Option<String>,
}

impl PaginationCursor {
    pub fn new(bookmark: String, board_id: Option<String>) -> Option<Self> {
        let bookmark = bookmark.trim().to_string();
        if bookmark.is_empty() || bookmark == END_BOOKMARK {
            return None;
        }
        Some(Self { bookmark, board_id })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Start,
    FetchingPage,
    Exhausted,
    Capped,
    Aborted,
}

impl CrawlState {
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlState::Start => "start",
            CrawlState::FetchingPage => "fetching_page",
            CrawlState::Exhausted => "exhausted",
            CrawlState::Capped => "capped",
            CrawlState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CrawlState::Exhausted | CrawlState::Capped | CrawlState::Aborted)
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub descriptors: Vec<MediaDescriptor>,
    pub terminal: CrawlState,
    pub error: Option<FetchError>,
    pub pages_fetched: usize,
}

pub trait PageSource {
    fn fetch_page(
        &self,
        reference: &ContentReference,
        cursor: Option<&PaginationCursor>,
    ) -> Result<PageExtraction, FetchError>;
}

impl PageSource for PageFetcher {
    fn fetch_page(
        &self,
        reference: &ContentReference,
        cursor: Option<&PaginationCursor>,
    ) -> Result<PageExtraction, FetchError> {
        let result = self.fetch(reference, cursor);
        if let Some(err) = result.fetch_error {
            return Err(err);
        }
        let body = result.raw_body.unwrap_or_default();
        let extraction = extract(&body, reference);
        self.journal().info(
            "page_extracted",
            serde_json::json!({
                "kind": reference.kind,
                "descriptors": extraction.descriptors.len(),
                "strategy": extraction.strategy,
                "has_next": extraction.next_cursor.is_some(),
            }),
        );
        Ok(extraction)
    }
}

pub fn crawl<S: PageSource + ?Sized>(
    source: &S,
    reference: &ContentReference,
    config: &CrawlConfig,
    cancel: &CancelToken,
) -> CrawlOutcome {
    let max_items = config.max_items.max(1);
    let max_pages = config.max_pages.max(1);

    let mut state = CrawlState::Start;
    let mut collected = DescriptorSet::new();
    let mut cursor: Option<PaginationCursor> = None;
    let mut seen_bookmarks: HashSet<String> = HashSet::new();
    let mut pages_fetched = 0_usize;
    let mut error: Option<FetchError> = None;

    while !state.is_terminal() {
        state = match state {
            CrawlState::Start => CrawlState::FetchingPage,
            CrawlState::FetchingPage => {
                if pages_fetched > 0
                    && config.page_delay_ms > 0
                    && !cancel.sleep(Duration::from_millis(config.page_delay_ms))
                {
                    error = Some(FetchError::cancelled(0));
                    break;
                }
                if cancel.is_cancelled() {
                    error = Some(FetchError::cancelled(0));
                    break;
                }

                let page = match source.fetch_page(reference, cursor.as_ref()) {
                    Ok(page) => page,
                    Err(err) => {
                        error = Some(err);
                        break;
                    }
                };
                pages_fetched += 1;
                collected.extend(page.descriptors);

                let previous_board_id = cursor.as_ref().and_then(|c| c.board_id.clone());
                next_state(
                    reference,
                    page.next_cursor,
                    previous_board_id,
                    collected.len() >= max_items,
                    pages_fetched >= max_pages,
                    &mut seen_bookmarks,
                    &mut cursor,
                )
            }
            terminal => terminal,
        };
    }

    let terminal = if error.is_some() {
        CrawlState::Aborted
    } else {
        state
    };
    if terminal == CrawlState::Capped {
        collected.truncate(max_items);
    }
    CrawlOutcome {
        descriptors: collected.into_vec(),
        terminal,
        error,
        pages_fetched,
    }
}

fn next_state(
    reference: &ContentReference,
    next: Option<PaginationCursor>,
    previous_board_id: Option<String>,
    items_capped: bool,
    pages_capped: bool,
    seen_bookmarks: &mut HashSet<String>,
    cursor: &mut Option<PaginationCursor>,
) -> CrawlState {
    if items_capped {
        return CrawlState::Capped;
    }
    if !reference.kind.paginates() {
        return CrawlState::Exhausted;
    }
    let Some(mut next) = next else {
        return CrawlState::Exhausted;
    };
    if next.board_id.is_none() {
        next.board_id = previous_board_id;
    }
    if !seen_bookmarks.insert(next.bookmark.clone()) || resource_url(reference, &next).is_none() {
        return CrawlState::Exhausted;
    }
    if pages_capped {
        return CrawlState::Capped;
    }
    *cursor = Some(next);
    CrawlState::FetchingPage
}
