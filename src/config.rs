//! Configuration parsing and validation.
//!
//! shelfscrape is configured via a TOML file (default: `config/shelf.toml`).
//! Only `[db]` is required. `[crawl]` and `[selectors]` fall back to
//! defaults that match the catalogue site's current markup.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/shelf.sqlite"
//!
//! [crawl]
//! base_url = "https://www.goodreads.com"
//! categories = ["fiction", "fantasy"]
//! max_pages = 20
//! concurrency = 10
//!
//! [selectors]
//! title = "h1[data-testid='bookTitle']"
//! ```
//!
//! Validation runs once in [`load_config`] and again after CLI overrides
//! are applied; any error is fatal before a single request is made.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use shelfscrape_core::id::DEFAULT_ID_PREFIX;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// `[crawl]`: where to look and how hard to push.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,
    /// Path template with `{category}` and `{page}` placeholders.
    pub listing_path: String,
    /// Path fragment a listing link must contain to count as a book page.
    pub detail_path: String,
    pub categories: Vec<String>,
    pub max_pages: u32,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub fetch_retries: u32,
    pub write_retries: u32,
    pub max_reviews: usize,
    pub user_agent: String,
    pub id_prefix: String,
    pub skip_existing: bool,
    pub limit: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.goodreads.com".to_string(),
            listing_path: "/shelf/show/{category}?page={page}".to_string(),
            detail_path: "/book/show/".to_string(),
            categories: Vec::new(),
            max_pages: 20,
            concurrency: 10,
            timeout_secs: 10,
            fetch_retries: 0,
            write_retries: 1,
            max_reviews: 5,
            user_agent: "Mozilla/5.0 (compatible; shelfscrape)".to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            skip_existing: false,
            limit: None,
        }
    }
}

/// `[selectors]`: CSS selectors used by the HTML extractor.
///
/// Comma-separated selector groups are allowed; the first matching element
/// wins.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelectorConfig {
    pub title: String,
    pub author: String,
    pub rating: String,
    pub rating_count: String,
    pub publish_info: String,
    pub cover: String,
    /// Detail-page links on a listing page.
    pub listing_link: String,
    pub review_card: String,
    pub review_text: String,
    pub reviewer: String,
    pub review_rating: String,
    pub review_date: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: "h1[data-testid='bookTitle'], h1".to_string(),
            author: "a.ContributorLink span.ContributorLink__name, a.ContributorLink".to_string(),
            rating: "div.RatingStatistics__rating".to_string(),
            rating_count: "span[data-testid='ratingsCount']".to_string(),
            publish_info: "p[data-testid='publicationInfo'], div.FeaturedDetails".to_string(),
            cover: "img.ResponsiveImage".to_string(),
            listing_link: "a.bookTitle".to_string(),
            review_card: "article.ReviewCard, article[data-testid='review']".to_string(),
            review_text: "section.ReviewText span.Formatted, span.Formatted".to_string(),
            reviewer: "div.ReviewerProfile__name a, [data-testid='name']".to_string(),
            review_rating: "span.RatingStars[aria-label], span[aria-label*='stars']".to_string(),
            review_date: "span.Text__body3 a, time".to_string(),
        }
    }
}

impl SelectorConfig {
    /// `(name, selector)` pairs, for validation and error messages.
    pub fn entries(&self) -> [(&'static str, &str); 12] {
        [
            ("title", self.title.as_str()),
            ("author", self.author.as_str()),
            ("rating", self.rating.as_str()),
            ("rating_count", self.rating_count.as_str()),
            ("publish_info", self.publish_info.as_str()),
            ("cover", self.cover.as_str()),
            ("listing_link", self.listing_link.as_str()),
            ("review_card", self.review_card.as_str()),
            ("review_text", self.review_text.as_str()),
            ("reviewer", self.reviewer.as_str()),
            ("review_rating", self.review_rating.as_str()),
            ("review_date", self.review_date.as_str()),
        ]
    }
}

/// Per-run values from the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub categories: Vec<String>,
    pub max_pages: Option<u32>,
    pub concurrency: Option<usize>,
    pub limit: Option<usize>,
    pub skip_existing: bool,
}

impl Config {
    /// Apply CLI overrides and re-validate.
    pub fn with_overrides(mut self, o: &CrawlOverrides) -> Result<Self> {
        if !o.categories.is_empty() {
            self.crawl.categories = o.categories.clone();
        }
        if let Some(n) = o.max_pages {
            self.crawl.max_pages = n;
        }
        if let Some(n) = o.concurrency {
            self.crawl.concurrency = n;
        }
        if o.limit.is_some() {
            self.crawl.limit = o.limit;
        }
        if o.skip_existing {
            self.crawl.skip_existing = true;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let crawl = &self.crawl;

        if crawl.concurrency == 0 {
            bail!("crawl.concurrency must be >= 1");
        }
        if crawl.max_pages == 0 {
            bail!("crawl.max_pages must be >= 1");
        }
        if crawl.timeout_secs == 0 {
            bail!("crawl.timeout_secs must be >= 1");
        }
        if crawl.limit == Some(0) {
            bail!("crawl.limit must be >= 1 when set");
        }

        let base = url::Url::parse(&crawl.base_url)
            .with_context(|| format!("crawl.base_url is not a valid URL: '{}'", crawl.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!("crawl.base_url must be http or https, got '{}'", base.scheme());
        }

        for placeholder in ["{category}", "{page}"] {
            if !crawl.listing_path.contains(placeholder) {
                bail!(
                    "crawl.listing_path must contain {}: '{}'",
                    placeholder,
                    crawl.listing_path
                );
            }
        }

        if crawl.detail_path.trim().is_empty() {
            bail!("crawl.detail_path must not be empty");
        }

        if crawl.categories.iter().any(|c| c.trim().is_empty()) {
            bail!("crawl.categories must not contain empty names");
        }

        for (name, selector) in self.selectors.entries() {
            if let Err(e) = scraper::Selector::parse(selector) {
                bail!("selectors.{} is not a valid CSS selector '{}': {}", name, selector, e);
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
