//! A tiny catalogue site served by axum for end-to-end tests.
//!
//! Listings:
//! - `fiction`: page 1 → books 1, 2, 3; page 2 → books 2, 4; page 3 empty.
//! - `fantasy`: page 1 → books 1, 9; page 2 empty.
//!
//! Book 3 has no title; book 9 does not exist (404). Bumping `edition`
//! changes book 1's title, rating and rating count.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

pub struct Site {
    pub base: String,
    pub edition: Arc<AtomicU32>,
}

impl Site {
    pub fn bump_edition(&self) {
        self.edition.fetch_add(1, Ordering::SeqCst);
    }
}

fn listing(ids: &[u32]) -> String {
    let links: String = ids
        .iter()
        .map(|id| {
            // Series links share the book's numeric prefix and come first.
            format!(
                r#"<tr><td><a class="bookTitle" href="/series/{id}-saga">Saga {id}</a>
                   <a class="bookTitle" href="/book/show/{id}-book-{id}?from=shelf">Book {id}</a></td></tr>"#
            )
        })
        .collect();
    format!("<html><body><table>{links}</table></body></html>")
}

fn review(reviewer: &str, stars: u8, text: &str) -> String {
    format!(
        r#"<article class="ReviewCard">
             <div class="ReviewerProfile__name"><a href="/user/x">{reviewer}</a></div>
             <span class="RatingStars" aria-label="Rating {stars} out of 5"></span>
             <span class="Text__body3"><a href="/review/x">June 1, 2024</a></span>
             <section class="ReviewText"><span class="Formatted">{text}</span></section>
           </article>"#
    )
}

fn book_page(id: u32, edition: u32) -> Option<String> {
    let (title, rating, count, reviews) = match id {
        1 if edition == 0 => (
            "Book One",
            "4.00",
            "1,000 ratings",
            review("Ann", 5, "Loved it.") + &review("Bo", 3, "Shared text."),
        ),
        1 => (
            "Book One (Revised)",
            "3.50",
            "1,500 ratings",
            review("Ann", 5, "Loved it.") + &review("Bo", 3, "Shared text."),
        ),
        2 => ("Book Two", "3.75", "20 ratings", review("Cy", 4, "Shared text.")),
        3 => ("", "2.00", "5 ratings", String::new()),
        4 => ("Book Four", "", "", review("Di", 1, "Short and sweet.")),
        _ => return None,
    };

    let title_html = if title.is_empty() {
        String::new()
    } else {
        format!(r#"<h1 data-testid="bookTitle">{title}</h1>"#)
    };
    Some(format!(
        r#"<html><body>
             <img class="ResponsiveImage" src="/covers/{id}.jpg">
             {title_html}
             <a class="ContributorLink"><span class="ContributorLink__name">Author {id}</span></a>
             <div class="RatingStatistics__rating">{rating}</div>
             <span data-testid="ratingsCount">{count}</span>
             <p data-testid="publicationInfo">First published March 3, 19{id:02}</p>
             {reviews}
           </body></html>"#
    ))
}

async fn shelf(
    Path(category): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Html<String> {
    let page: u32 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let ids: &[u32] = match (category.as_str(), page) {
        ("fiction", 1) => &[1, 2, 3],
        ("fiction", 2) => &[2, 4],
        ("fantasy", 1) => &[1, 9],
        _ => &[],
    };
    Html(listing(ids))
}

async fn book(
    State(edition): State<Arc<AtomicU32>>,
    Path(slug): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let id: u32 = slug
        .split('-')
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(StatusCode::NOT_FOUND)?;
    book_page(id, edition.load(Ordering::SeqCst))
        .map(Html)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Serve the site on an ephemeral port of the current runtime.
pub async fn serve() -> Site {
    let edition = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route("/shelf/show/{category}", get(shelf))
        .route("/book/show/{slug}", get(book))
        .with_state(edition.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Site {
        base: format!("http://{addr}"),
        edition,
    }
}

/// Serve the site from a background runtime, for tests that drive the
/// binary synchronously. Keep the runtime alive for the test's duration.
pub fn serve_in_background() -> (tokio::runtime::Runtime, Site) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let site = rt.block_on(serve());
    (rt, site)
}

/// Config file body pointing at `base` with its database under `root`.
pub fn config_toml(root: &std::path::Path, base: &str) -> String {
    format!(
        r#"[db]
path = "{}/data/shelf.sqlite"

[crawl]
base_url = "{}"
categories = ["fiction", "fantasy"]
max_pages = 5
concurrency = 3
timeout_secs = 5
"#,
        root.display(),
        base
    )
}
