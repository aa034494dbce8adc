use crate::archive::{bundle_archive, ArchiveSummary};
use crate::cancel::CancelToken;
use crate::config::{DownloadConfig, FetchConfig, GrabConfig};
use crate::crawl::{crawl, CrawlState};
use crate::download::{download_all_logged, DownloadOutcome, ProgressEvent};
use crate::fetch::{FetchError, PageFetcher};
use crate::http::{redact_url_for_log, HttpTransport, UreqTransport};
use crate::journal::Journal;
use crate::media::MediaDescriptor;
use crate::paths::GrabPaths;
use crate::reference::{classify, ContentKind, ContentReference};
use crate::{GrabError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Complete,
    Capped,
    ExtractionEmpty,
    Partial,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub reference: ContentReference,
    pub descriptors: Vec<MediaDescriptor>,
    pub pages_fetched: usize,
    pub terminal: CrawlState,
    pub error: Option<FetchError>,
}

impl Discovery {
    pub fn status(&self) -> DiscoveryStatus {
        match self.terminal {
            CrawlState::Aborted if self.descriptors.is_empty() => DiscoveryStatus::Failed,
            CrawlState::Aborted => DiscoveryStatus::Partial,
            CrawlState::Capped => DiscoveryStatus::Capped,
            _ if self.descriptors.is_empty() => DiscoveryStatus::ExtractionEmpty,
            _ => DiscoveryStatus::Complete,
        }
    }

    pub fn default_destination(&self, paths: &GrabPaths) -> PathBuf {
        let reference = &self.reference;
        let label = match reference.kind {
            ContentKind::Pin => reference.pin_id(),
            ContentKind::Board => reference.board_path(),
            ContentKind::Profile => reference.username(),
            ContentKind::Unknown => None,
        }
        .unwrap_or_else(|| "unknown".to_string());
        paths.download_dir_for(reference.kind.as_str(), &label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    All,
    Indices(Vec<usize>),
}

impl Selection {
    pub fn apply(&self, descriptors: &[MediaDescriptor]) -> Vec<MediaDescriptor> {
        match self {
            Selection::All => descriptors.to_vec(),
            Selection::Indices(indices) => {
                let mut wanted: Vec<usize> = indices
                    .iter()
                    .copied()
                    .filter(|i| *i < descriptors.len())
                    .collect();
                wanted.sort_unstable();
                wanted.dedup();
                wanted.into_iter().map(|i| descriptors[i].clone()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    AllSucceeded,
    PartialSuccess,
    AllFailed,
    Nothing,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadItem {
    pub descriptor: MediaDescriptor,
    pub outcome: DownloadOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub items: Vec<DownloadItem>,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl DownloadReport {
    fn new(items: Vec<DownloadItem>) -> Self {
        let succeeded = items.iter().filter(|i| i.outcome.is_success()).count();
        let total = items.len();
        Self {
            items,
            succeeded,
            failed: total - succeeded,
            total,
        }
    }

    pub fn status(&self) -> DownloadStatus {
        if self.total == 0 {
            DownloadStatus::Nothing
        } else if self.failed == 0 {
            DownloadStatus::AllSucceeded
        } else if self.succeeded == 0 {
            DownloadStatus::AllFailed
        } else {
            DownloadStatus::PartialSuccess
        }
    }

    pub fn succeeded_paths(&self) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.path().map(Path::to_path_buf))
            .collect()
    }

    pub fn summary_line(&self) -> String {
        format!("{} of {} succeeded", self.succeeded, self.total)
    }
}

pub fn page_transport(config: &FetchConfig) -> Arc<dyn HttpTransport> {
    Arc::new(UreqTransport::new(&config.user_agent, config.timeout_secs))
}

pub fn asset_transport(fetch: &FetchConfig, download: &DownloadConfig) -> Arc<dyn HttpTransport> {
    Arc::new(UreqTransport::new(&fetch.user_agent, download.per_item_timeout_secs))
}

pub fn discover(
    raw_url: &str,
    config: &GrabConfig,
    transport: Arc<dyn HttpTransport>,
    cancel: &CancelToken,
    journal: &Journal,
) -> Result<Discovery> {
    let config = config.clone().sanitized();
    let classified = classify(raw_url)?;
    journal.info(
        "classified",
        serde_json::json!({
            "kind": classified.kind,
            "canonical_url": classified.canonical_url,
        }),
    );

    let fetcher = PageFetcher::new(transport, config.fetch.clone(), cancel.clone())
        .with_journal(journal.clone());
    let reference = if classified.kind == ContentKind::Unknown {
        fetcher.resolve_short_link(raw_url)?
    } else {
        classified
    };

    let outcome = crawl(&fetcher, &reference, &config.crawl, cancel);
    journal.info(
        "crawl_finished",
        serde_json::json!({
            "url": redact_url_for_log(&reference.canonical_url),
            "kind": reference.kind,
            "terminal": outcome.terminal,
            "pages": outcome.pages_fetched,
            "descriptors": outcome.descriptors.len(),
            "error": outcome.error.as_ref().map(|e| e.to_string()),
        }),
    );

    if let (ContentKind::Pin, Some(err)) = (reference.kind, &outcome.error) {
        return Err(GrabError::Fetch(err.clone()));
    }

    Ok(Discovery {
        reference,
        descriptors: outcome.descriptors,
        pages_fetched: outcome.pages_fetched,
        terminal: outcome.terminal,
        error: outcome.error,
    })
}

pub fn download<F>(
    descriptors: &[MediaDescriptor],
    selection: &Selection,
    destination: &Path,
    config: &GrabConfig,
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    journal: &Journal,
    progress: F,
) -> DownloadReport
where
    F: FnMut(&ProgressEvent),
{
    let config = config.clone().sanitized();
    let selected = selection.apply(descriptors);
    let outcomes = download_all_logged(
        &selected,
        destination,
        &config.download,
        transport,
        cancel,
        journal,
        progress,
    );
    let items = selected
        .into_iter()
        .zip(outcomes)
        .map(|(descriptor, outcome)| DownloadItem { descriptor, outcome })
        .collect();
    DownloadReport::new(items)
}

pub fn bundle(
    report: &DownloadReport,
    zip_path: &Path,
    journal: &Journal,
) -> Result<ArchiveSummary> {
    let summary = bundle_archive(&report.succeeded_paths(), zip_path)?;
    journal.info(
        "archive_written",
        serde_json::json!({
            "entries": summary.entries,
            "missing": summary.missing,
            "file_bytes": summary.file_bytes,
        }),
    );
    Ok(summary)
}
