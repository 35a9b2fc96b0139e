//! Search through the extractor's own search prefix (no API key needed)

use crate::error::{Error, Result};
use crate::traits::SearchProvider;
use async_trait::async_trait;

const SEARCH_PREFIX: &str = "ytsearch1:";

/// Turns a query into an extractor search reference; the resolver picks the
/// first hit.
#[derive(Debug, Default, Clone)]
pub struct ExtractorSearch;

#[async_trait]
impl SearchProvider for ExtractorSearch {
    async fn find(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Search("empty query".to_string()));
        }
        Ok(format!("{}{}", SEARCH_PREFIX, query))
    }
}
