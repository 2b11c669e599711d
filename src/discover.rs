//! Listing pages over HTTP.
//!
//! [`HttpListingSource`] turns `(category, page)` into a listing URL from
//! `crawl.base_url` and `crawl.listing_path`, fetches it with the same
//! [`PageFetcher`] the pipeline uses, and hands the markup to the
//! extractor's link finder.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use shelfscrape_core::error::Result as IngestResult;
use shelfscrape_core::traits::{Extractor, ListingSource, PageFetcher};

use crate::config::CrawlConfig;
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter};

pub struct HttpListingSource {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    base_url: Url,
    listing_path: String,
    progress: Arc<dyn CrawlProgressReporter>,
}

impl HttpListingSource {
    pub fn new(
        crawl: &CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        progress: Arc<dyn CrawlProgressReporter>,
    ) -> Result<Self> {
        let base_url = Url::parse(&crawl.base_url)
            .with_context(|| format!("invalid crawl.base_url: {}", crawl.base_url))?;
        Ok(Self {
            fetcher,
            extractor,
            base_url,
            listing_path: crawl.listing_path.clone(),
            progress,
        })
    }

    /// Absolute URL of one listing page.
    pub fn listing_url(&self, category: &str, page: u32) -> String {
        let category: String = url::form_urlencoded::byte_serialize(category.as_bytes()).collect();
        let path = self
            .listing_path
            .replace("{category}", &category)
            .replace("{page}", &page.to_string());
        match self.base_url.join(&path) {
            Ok(u) => u.to_string(),
            Err(_) => format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path),
        }
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn list_page(&self, category: &str, page: u32) -> IngestResult<Vec<String>> {
        self.progress.report(CrawlProgressEvent::Discovering {
            category: category.to_string(),
            page,
        });
        let url = self.listing_url(category, page);
        let html = self.fetcher.fetch(&url).await?;
        Ok(self.extractor.listing_links(&url, &html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use shelfscrape_core::BookRecord;

    struct Echo;

    #[async_trait]
    impl PageFetcher for Echo {
        async fn fetch(&self, url: &str) -> IngestResult<String> {
            Ok(url.to_string())
        }
    }

    struct OneLink;

    impl Extractor for OneLink {
        fn extract(&self, _url: &str, _html: &str) -> IngestResult<BookRecord> {
            unreachable!()
        }

        fn listing_links(&self, page_url: &str, _html: &str) -> Vec<String> {
            vec![format!("{page_url}#link")]
        }
    }

    fn source(base: &str) -> HttpListingSource {
        let crawl = CrawlConfig {
            base_url: base.to_string(),
            ..Default::default()
        };
        HttpListingSource::new(&crawl, Arc::new(Echo), Arc::new(OneLink), Arc::new(NoProgress))
            .unwrap()
    }

    #[test]
    fn builds_listing_urls() {
        let s = source("https://books.test");
        assert_eq!(
            s.listing_url("fiction", 3),
            "https://books.test/shelf/show/fiction?page=3"
        );
        assert_eq!(
            s.listing_url("science fiction", 1),
            "https://books.test/shelf/show/science+fiction?page=1"
        );
    }

    #[tokio::test]
    async fn list_page_fetches_the_listing_url() {
        let s = source("http://127.0.0.1:9");
        let links = s.list_page("poetry", 2).await.unwrap();
        assert_eq!(links, vec!["http://127.0.0.1:9/shelf/show/poetry?page=2#link"]);
    }
}
