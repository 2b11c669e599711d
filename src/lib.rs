//! # shelfscrape
//!
//! A bulk ingestion pipeline for a public book catalogue.
//!
//! shelfscrape walks category listing pages to discover book detail pages,
//! fetches and extracts them with a bounded number of concurrent workers,
//! and upserts the results into SQLite: one row per book, one metric
//! snapshot per book per calendar day, and content-hash-deduplicated
//! reviews.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌────────────────────┐
//! │  Listings   │──▶│ Pipeline (N workers) │──▶│       SQLite        │
//! │ category/pg │   │ fetch→extract→persist│   │ books · metrics    │
//! └─────────────┘   └──────────────────────┘   │ reviews · runs     │
//!                                              └─────────┬──────────┘
//!                                                        ▼
//!                                            shelf show / stats / export
//! ```
//!
//! The pipeline, store trait and error taxonomy live in
//! [`shelfscrape_core`]; this crate supplies the concrete adapters.
//!
//! ## Quick Start
//!
//! ```bash
//! shelf init                              # create database
//! shelf crawl --category fiction          # discover and crawl
//! shelf crawl --url https://…/book/show/1 # crawl specific pages
//! shelf show GR_1
//! shelf stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`fetch`] | HTTP page fetcher |
//! | [`extract`] | CSS-selector extractor |
//! | [`discover`] | Listing pages over HTTP |
//! | [`ingest`] | Crawl orchestration |
//! | [`progress`] | Progress reporting on stderr |
//! | [`get`], [`stats`], [`export`] | Read-side commands |

pub mod config;
pub mod db;
pub mod discover;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
