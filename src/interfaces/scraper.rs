use async_trait::async_trait;

use crate::error::Result;

/// Fetches a page body. Separated from parsing so analysis runs on fixtures.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
