use crate::config::HttpConfig;
use crate::error::{PriceError, Result};
use crate::scraper::Transport;
use async_trait::async_trait;
use reqwest::Response;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub struct HttpClient {
    inner: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .map_err(|e| PriceError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Doubling delays starting at `retry_base_delay_ms`, capped at
    /// `MAX_RETRY_DELAY`. `from_millis(b)` alone would grow as `b^n`.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        let half_base = (self.config.retry_base_delay_ms / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half_base)
            .max_delay(MAX_RETRY_DELAY)
            .take(self.config.max_retries as usize)
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        self.backoff().map(jitter)
    }

    /// GET with retry on transient failures (connect/timeout, 429, 5xx).
    async fn get(&self, url: &Url) -> Result<Response> {
        let mut attempt = 0u32;
        RetryIf::spawn(
            self.retry_strategy(),
            || {
                attempt += 1;
                self.get_once(url, attempt)
            },
            |e: &PriceError| {
                let retry = e.is_transient();
                if retry {
                    warn!("{}, retrying", e);
                }
                retry
            },
        )
        .await
    }

    async fn get_once(&self, url: &Url, attempt: u32) -> Result<Response> {
        debug!("GET {} (attempt {})", url, attempt);

        let resp = self
            .inner
            .get(url.clone())
            .send()
            .await
            .map_err(|source| PriceError::Http { url: url.to_string(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PriceError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get_text(&self, url: &Url) -> Result<String> {
        let resp = self.get(url).await?;
        resp.text()
            .await
            .map_err(|source| PriceError::Http { url: url.to_string(), source })
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self.get(url).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| PriceError::Http { url: url.to_string(), source })?;
        Ok(bytes.to_vec())
    }
}
