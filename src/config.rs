use crate::paths::GrabPaths;
use crate::{GrabError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36"
);
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_RETRIES: u32 = 10;
const MAX_BACKOFF_BASE_MS: u64 = 30_000;
const MAX_CONCURRENCY: usize = 16;
const MAX_MAX_ITEMS: usize = 10_000;
const MAX_MAX_PAGES: usize = 500;
const MAX_PAGE_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_base_ms: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Stop once this many distinct descriptors have been collected.
    pub max_items: usize,
    pub max_pages: usize,
    pub page_delay_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_items: 1_000,
            max_pages: 100,
            page_delay_ms: 350,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    Skip,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub concurrency: usize,
    pub per_item_timeout_secs: u64,
    pub max_retries_per_item: u32,
    pub retry_backoff_base_ms: u64,
    pub overwrite: OverwritePolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            per_item_timeout_secs: 60,
            max_retries_per_item: 3,
            retry_backoff_base_ms: 500,
            overwrite: OverwritePolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    pub fetch: FetchConfig,
    pub crawl: CrawlConfig,
    pub download: DownloadConfig,
}

impl GrabConfig {
    /// Clamps every value into the range the engine is willing to run with.
    pub fn sanitized(mut self) -> Self {
        self.fetch.timeout_secs = self.fetch.timeout_secs.clamp(1, MAX_TIMEOUT_SECS);
        self.fetch.max_retries = self.fetch.max_retries.min(MAX_RETRIES);
        self.fetch.retry_backoff_base_ms =
            self.fetch.retry_backoff_base_ms.min(MAX_BACKOFF_BASE_MS);
        if self.fetch.user_agent.trim().is_empty() {
            self.fetch.user_agent = DEFAULT_USER_AGENT.to_string();
        }
        if self.fetch.accept_language.trim().is_empty() {
            self.fetch.accept_language = DEFAULT_ACCEPT_LANGUAGE.to_string();
        }

        self.crawl.max_items = self.crawl.max_items.clamp(1, MAX_MAX_ITEMS);
        self.crawl.max_pages = self.crawl.max_pages.clamp(1, MAX_MAX_PAGES);
        self.crawl.page_delay_ms = self.crawl.page_delay_ms.min(MAX_PAGE_DELAY_MS);

        self.download.concurrency = self.download.concurrency.clamp(1, MAX_CONCURRENCY);
        self.download.per_item_timeout_secs =
            self.download.per_item_timeout_secs.clamp(1, MAX_TIMEOUT_SECS);
        self.download.max_retries_per_item = self.download.max_retries_per_item.min(MAX_RETRIES);
        self.download.retry_backoff_base_ms =
            self.download.retry_backoff_base_ms.min(MAX_BACKOFF_BASE_MS);
        self
    }
}

pub fn load_config(paths: &GrabPaths) -> Result<GrabConfig> {
    let path = paths.config_path();
    if !path.exists() {
        return Ok(GrabConfig::default());
    }
    let bytes = std::fs::read(&path)?;
    let parsed: GrabConfig = serde_json::from_slice(&bytes).map_err(|e| {
        GrabError::Config(format!(
            "failed to parse config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    Ok(parsed.sanitized())
}

pub fn save_config(paths: &GrabPaths, config: &GrabConfig) -> Result<()> {
    let path = paths.config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = GrabPaths::new(tmp.path().to_path_buf());
        let config = load_config(&paths).expect("load");
        assert_eq!(config, GrabConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = GrabPaths::new(tmp.path().to_path_buf());
        let mut config = GrabConfig::default();
        config.download.concurrency = 7;
        config.download.overwrite = OverwritePolicy::Overwrite;
        config.crawl.max_items = 25;
        save_config(&paths, &config).expect("save");
        assert_eq!(load_config(&paths).expect("load"), config);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = GrabPaths::new(tmp.path().to_path_buf());
        std::fs::create_dir_all(paths.config_dir()).expect("mkdir");
        std::fs::write(
            paths.config_path(),
            r#"{"download":{"concurrency":2,"overwrite":"overwrite"}}"#,
        )
        .expect("write");
        let config = load_config(&paths).expect("load");
        assert_eq!(config.download.concurrency, 2);
        assert_eq!(config.download.overwrite, OverwritePolicy::Overwrite);
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn invalid_config_is_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = GrabPaths::new(tmp.path().to_path_buf());
        std::fs::create_dir_all(paths.config_dir()).expect("mkdir");
        std::fs::write(paths.config_path(), "{ nope").expect("write");
        assert!(matches!(load_config(&paths), Err(GrabError::Config(_))));
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let mut config = GrabConfig::default();
        config.download.concurrency = 0;
        config.download.max_retries_per_item = 99;
        config.fetch.timeout_secs = 0;
        config.fetch.user_agent = "  ".to_string();
        config.crawl.max_items = 0;
        config.crawl.max_pages = 99_999;
        config.crawl.page_delay_ms = 99_999;
        let config = config.sanitized();
        assert_eq!(config.download.concurrency, 1);
        assert_eq!(config.download.max_retries_per_item, MAX_RETRIES);
        assert_eq!(config.fetch.timeout_secs, 1);
        assert_eq!(config.fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.crawl.max_items, 1);
        assert_eq!(config.crawl.max_pages, MAX_MAX_PAGES);
        assert_eq!(config.crawl.page_delay_ms, MAX_PAGE_DELAY_MS);
    }
}
