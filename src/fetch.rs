use crate::cancel::{backoff_delay, CancelToken};
use crate::config::FetchConfig;
use crate::crawl::PaginationCursor;
use crate::extract::canonical_link;
use crate::http::{redact_url_for_log, HttpTransport, TransportError, UreqTransport};
use crate::journal::Journal;
use crate::reference::{classify, ContentKind, ContentReference};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

const MAX_PAGE_BYTES: u64 = 16 * 1024 * 1024;
const RESOURCE_PAGE_SIZE: u32 = 25;
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    HttpError,
    NetworkError,
    Cancelled,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::HttpError => "http_error",
            FetchErrorKind::NetworkError => "network_error",
            FetchErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub attempts: u32,
}

impl FetchError {
    fn new(
        kind: FetchErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            attempts,
        }
    }

    pub(crate) fn cancelled(attempts: u32) -> Self {
        Self::new(FetchErrorKind::Cancelled, None, "cancelled", attempts)
    }
}

#[derive(Debug, Clone)]
pub struct PageFetchResult {
    pub reference: ContentReference,
    pub raw_body: Option<String>,
    pub http_status: Option<u16>,
    pub fetch_error: Option<FetchError>,
}

impl PageFetchResult {
    pub fn is_ok(&self) -> bool {
        self.fetch_error.is_none() && self.raw_body.is_some()
    }
}

struct FetchedBody {
    status: u16,
    final_url: String,
    body: String,
}

pub struct PageFetcher {
    transport: Arc<dyn HttpTransport>,
    config: FetchConfig,
    cancel: CancelToken,
    journal: Journal,
}

impl PageFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: FetchConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            transport,
            config,
            cancel,
            journal: Journal::disabled(),
        }
    }

    pub fn with_ureq(config: FetchConfig, cancel: CancelToken) -> Self {
        let transport = UreqTransport::new(&config.user_agent, config.timeout_secs);
        Self::new(Arc::new(transport), config, cancel)
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub(crate) fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn fetch(
        &self,
        reference: &ContentReference,
        cursor: Option<&PaginationCursor>,
    ) -> PageFetchResult {
        let (url, accept, xhr) = match cursor {
            None => (reference.canonical_url.clone(), HTML_ACCEPT, false),
            Some(cursor) => match resource_url(reference, cursor) {
                Some(url) => (url, "application/json, text/javascript, */*; q=0.01", true),
                None => {
                    return PageFetchResult {
                        reference: reference.clone(),
                        raw_body: None,
                        http_status: None,
                        fetch_error: Some(FetchError::new(
                            FetchErrorKind::HttpError,
                            None,
                            format!("no resource endpoint for {} pages", reference.kind.as_str()),
                            0,
                        )),
                    }
                }
            },
        };

        let mut headers: Vec<(&str, &str)> = vec![
            ("Accept", accept),
            ("Accept-Language", self.config.accept_language.as_str()),
        ];
        if xhr {
            headers.push(("X-Requested-With", "XMLHttpRequest"));
        }

        match self.get_with_retry(&url, &headers) {
            Ok(fetched) => {
                self.journal.info(
                    "page_fetched",
                    serde_json::json!({
                        "url": redact_url_for_log(&url),
                        "status": fetched.status,
                        "bytes": fetched.body.len(),
                        "resource": xhr,
                    }),
                );
                PageFetchResult {
                    reference: reference.clone(),
                    raw_body: Some(fetched.body),
                    http_status: Some(fetched.status),
                    fetch_error: None,
                }
            }
            Err(err) => {
                self.journal.warn(
                    "page_fetch_failed",
                    serde_json::json!({
                        "url": redact_url_for_log(&url),
                        "kind": err.kind,
                        "status": err.status,
                        "attempts": err.attempts,
                        "message": err.message,
                    }),
                );
                PageFetchResult {
                    reference: reference.clone(),
                    raw_body: None,
                    http_status: err.status,
                    fetch_error: Some(err),
                }
            }
        }
    }

    pub fn resolve_short_link(&self, raw: &str) -> Result<ContentReference, FetchError> {
        let reference = classify(raw).map_err(|e| {
            FetchError::new(FetchErrorKind::HttpError, None, e.to_string(), 0)
        })?;
        if reference.kind != ContentKind::Unknown {
            return Ok(reference);
        }

        let headers = [
            ("Accept", HTML_ACCEPT),
            ("Accept-Language", self.config.accept_language.as_str()),
        ];
        let fetched = self.get_with_retry(&reference.canonical_url, &headers)?;

        let mut candidates = vec![fetched.final_url.clone()];
        if let Some(link) = canonical_link(&fetched.body) {
            candidates.push(link);
        }
        for candidate in &candidates {
            if let Ok(resolved) = classify(candidate) {
                if resolved.kind != ContentKind::Unknown {
                    self.journal.info(
                        "short_link_resolved",
                        serde_json::json!({
                            "short": reference.canonical_url,
                            "canonical": resolved.canonical_url,
                            "kind": resolved.kind,
                        }),
                    );
                    return Ok(ContentReference {
                        original_url: raw.trim().to_string(),
                        ..resolved
                    });
                }
            }
        }
        Err(FetchError::new(
            FetchErrorKind::HttpError,
            Some(fetched.status),
            format!(
                "short link did not resolve to a pin, board or profile ({})",
                redact_url_for_log(&fetched.final_url)
            ),
            1,
        ))
    }

    fn get_with_retry(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchedBody, FetchError> {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::cancelled(attempt));
            }
            attempt += 1;

            let failure = match self.transport.get(url, headers) {
                Ok(response) if response.is_success() => {
                    let status = response.status;
                    let final_url = response.final_url;
                    let mut raw = Vec::new();
                    match response.body.take(MAX_PAGE_BYTES).read_to_end(&mut raw) {
                        Ok(_) => {
                            return Ok(FetchedBody {
                                status,
                                final_url,
                                body: String::from_utf8_lossy(&raw).into_owned(),
                            })
                        }
                        Err(e) => FetchError::new(
                            FetchErrorKind::NetworkError,
                            Some(status),
                            format!("failed to read body: {e}"),
                            attempt,
                        ),
                    }
                }
                Ok(response) if response.is_transient_failure() => FetchError::new(
                    FetchErrorKind::HttpError,
                    Some(response.status),
                    format!("HTTP {}", response.status),
                    attempt,
                ),
                Ok(response) => {
                    return Err(FetchError::new(
                        FetchErrorKind::HttpError,
                        Some(response.status),
                        format!("HTTP {}", response.status),
                        attempt,
                    ))
                }
                Err(TransportError::Timeout(message)) => {
                    FetchError::new(FetchErrorKind::Timeout, None, message, attempt)
                }
                Err(TransportError::Network(message)) => {
                    FetchError::new(FetchErrorKind::NetworkError, None, message, attempt)
                }
            };

            if attempt >= max_attempts {
                return Err(failure);
            }
            if !self
                .cancel
                .sleep(backoff_delay(self.config.retry_backoff_base_ms, attempt - 1))
            {
                return Err(FetchError::cancelled(attempt));
            }
        }
    }
}

// Boards need the board id discovered on the first page; profiles only need the username.
pub fn resource_url(reference: &ContentReference, cursor: &PaginationCursor) -> Option<String> {
    let host = reference.host()?;
    let (resource, source_url, options) = match reference.kind {
        ContentKind::Board if reference.is_board_section() => return None,
        ContentKind::Board => {
            let board_url = reference.board_path()?;
            let board_id = cursor.board_id.as_deref()?;
            (
                "BoardFeedResource",
                board_url.clone(),
                serde_json::json!({
                    "board_id": board_id,
                    "board_url": board_url,
                    "page_size": RESOURCE_PAGE_SIZE,
                    "bookmarks": [cursor.bookmark],
                }),
            )
        }
        ContentKind::Profile => {
            let username = reference.username()?;
            (
                "UserPinsResource",
                format!("/{username}/"),
                serde_json::json!({
                    "username": username,
                    "page_size": RESOURCE_PAGE_SIZE,
                    "bookmarks": [cursor.bookmark],
                }),
            )
        }
        ContentKind::Pin | ContentKind::Unknown => return None,
    };
    let data = serde_json::json!({ "options": options, "context": {} }).to_string();
    Url::parse_with_params(
        &format!("https://{host}/resource/{resource}/get/"),
        &[("source_url", source_url.as_str()), ("data", data.as_str())],
    )
    .ok()
    .map(|url| url.to_string())
}
