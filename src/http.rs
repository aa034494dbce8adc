use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use ureq::ResponseExt;

pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub final_url: String,
    pub body: Box<dyn Read>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    // 5xx and 429 are retryable.
    pub fn is_transient_failure(&self) -> bool {
        self.status >= 500 || self.status == 429
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("final_url", &self.final_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),
}

pub trait HttpTransport: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, TransportError>;

    /// `get` bounded by `timeout` where the transport can enforce one.
    fn get_within(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        _timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.get(url, headers)
    }
}

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        let mut config = ureq::Agent::config_builder();
        config = config
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(timeout_secs.max(1))))
            .user_agent(user_agent);
        Self {
            agent: config.build().into(),
        }
    }

    fn call(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                request = request.header(*name, trimmed);
            }
        }
        if let Some(timeout) = timeout {
            request = request
                .config()
                .timeout_global(Some(timeout.max(Duration::from_secs(1))))
                .build();
        }
        let response = request.call().map_err(classify_ureq_error)?;
        let status = response.status().as_u16();
        let content_type = header_string(&response, "content-type");
        let final_url = response.get_uri().to_string();
        Ok(HttpResponse {
            status,
            content_type,
            final_url,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}

impl HttpTransport for UreqTransport {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.call(url, headers, None)
    }

    fn get_within(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.call(url, headers, Some(timeout))
    }
}

fn classify_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
        ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
            TransportError::Timeout(err.to_string())
        }
        other => TransportError::Network(other.to_string()),
    }
}

fn header_string(response: &ureq::http::Response<ureq::Body>, key: &str) -> String {
    response
        .headers()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub(crate) fn redact_url_for_log(value: &str) -> String {
    match url::Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}
