pub mod dom;
pub mod http_client;
pub mod link_locator;
pub mod xpath;

use crate::error::Result;
use async_trait::async_trait;
use url::Url;

pub use self::http_client::HttpClient;
pub use self::link_locator::LinkLocator;
pub use self::xpath::PatternEvaluator;

// ── Transport trait ───────────────────────────────────────────────────────────

/// Swappable fetch abstraction. Retries, if any, live behind this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_text(&self, url: &Url) -> Result<String>;
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}
