//! HTML extraction with CSS selectors.
//!
//! [`HtmlExtractor`] compiles the `[selectors]` section once and applies it
//! to detail and listing pages. Only the title is mandatory; every other
//! field is parsed leniently and left empty when absent or malformed.
//! Listing links only count when their path contains `crawl.detail_path`,
//! so series or author pages never reach identifier derivation.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use shelfscrape_core::error::Result as IngestResult;
use shelfscrape_core::id::canonical_url;
use shelfscrape_core::parse::{clean_text, parse_count, parse_rating, parse_review_stars, parse_year};
use shelfscrape_core::traits::Extractor;
use shelfscrape_core::{BookRecord, IngestError, ReviewItem};

use crate::config::{Config, SelectorConfig};

pub struct HtmlExtractor {
    title: Selector,
    author: Selector,
    rating: Selector,
    rating_count: Selector,
    publish_info: Selector,
    cover: Selector,
    listing_link: Selector,
    review_card: Selector,
    review_text: Selector,
    reviewer: Selector,
    review_rating: Selector,
    review_date: Selector,
    detail_path: String,
}

fn compile(name: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| anyhow!("selectors.{}: invalid selector '{}': {}", name, selector, e))
}

impl HtmlExtractor {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.selectors, &config.crawl.detail_path)
    }

    pub fn new(s: &SelectorConfig, detail_path: &str) -> Result<Self> {
        Ok(Self {
            title: compile("title", &s.title)?,
            author: compile("author", &s.author)?,
            rating: compile("rating", &s.rating)?,
            rating_count: compile("rating_count", &s.rating_count)?,
            publish_info: compile("publish_info", &s.publish_info)?,
            cover: compile("cover", &s.cover)?,
            listing_link: compile("listing_link", &s.listing_link)?,
            review_card: compile("review_card", &s.review_card)?,
            review_text: compile("review_text", &s.review_text)?,
            reviewer: compile("reviewer", &s.reviewer)?,
            review_rating: compile("review_rating", &s.review_rating)?,
            review_date: compile("review_date", &s.review_date)?,
            detail_path: detail_path.to_string(),
        })
    }

    fn review(&self, card: ElementRef<'_>) -> Option<ReviewItem> {
        let text = card.select(&self.review_text).next().and_then(text_of)?;
        let rating = card.select(&self.review_rating).next().and_then(|el| {
            el.value()
                .attr("aria-label")
                .and_then(parse_review_stars)
                .or_else(|| text_of(el).as_deref().and_then(parse_review_stars))
        });

        Some(ReviewItem {
            text,
            reviewer: card.select(&self.reviewer).next().and_then(text_of),
            rating,
            posted_on: card.select(&self.review_date).next().and_then(text_of),
        })
    }
}

fn text_of(el: ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector).find_map(text_of)
}

/// Resolve `href` against `base`, keeping only http(s) results.
fn resolve(base: Option<&Url>, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    Some(resolved)
}

/// Like [`resolve`], without query or fragment.
fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    resolve(base, href).map(|u| canonical_url(u.as_str()))
}

impl Extractor for HtmlExtractor {
    fn extract(&self, url: &str, html: &str) -> IngestResult<BookRecord> {
        let doc = Html::parse_document(html);
        let root = doc.root_element();

        let title = first_text(root, &self.title).ok_or_else(|| IngestError::IncompleteData {
            url: url.to_string(),
            field: "title",
        })?;

        let base = Url::parse(url).ok();
        let cover_image = root
            .select(&self.cover)
            .filter_map(|img| img.value().attr("src"))
            .find_map(|src| absolutize(base.as_ref(), src));

        let reviews = root
            .select(&self.review_card)
            .filter_map(|card| self.review(card))
            .collect();

        Ok(BookRecord {
            book_url: canonical_url(url),
            title,
            author: first_text(root, &self.author),
            avg_rating: first_text(root, &self.rating).as_deref().and_then(parse_rating),
            review_count: first_text(root, &self.rating_count)
                .as_deref()
                .and_then(parse_count),
            publish_year: first_text(root, &self.publish_info)
                .as_deref()
                .and_then(parse_year),
            cover_image,
            reviews,
        })
    }

    fn listing_links(&self, page_url: &str, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let mut links: Vec<String> = Vec::new();
        for a in doc.select(&self.listing_link) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let Some(resolved) = resolve(base.as_ref(), href) else {
                continue;
            };
            if !resolved.path().contains(&self.detail_path) {
                continue;
            }
            let link = canonical_url(resolved.as_str());
            if !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }
}
