//! # shelfscrape core
//!
//! Runtime-agnostic logic for shelfscrape: data models, identifier
//! derivation, format-tolerant field parsing, the error taxonomy, work
//! discovery, the store abstraction, the persistence stage and the
//! bounded-concurrency crawl pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP client or HTML parser. The
//! concrete adapters (SQLite store, reqwest fetcher, scraper-based
//! extractor) live in the `shelfscrape` crate and plug in through the
//! traits in [`traits`] and [`store`].
//!
//! ## Data flow
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────────────┐   ┌─────────┐
//! │ discovery │──▶│ WorkSet  │──▶│ Pipeline::run     │──▶│  Store  │
//! │ (listing) │   │ url→tags │   │ fetch→extract→    │   │ books   │
//! └───────────┘   └──────────┘   │ persist (N-bound) │   │ metrics │
//!                                └──────────────────┘   │ reviews │
//!                                                       └─────────┘
//! ```

pub mod discovery;
pub mod error;
pub mod id;
pub mod models;
pub mod parse;
pub mod persist;
pub mod pipeline;
pub mod store;
pub mod traits;

pub use error::{FailureKind, FetchFailure, IngestError, WriteKind};
pub use models::{BookRecord, ReviewItem, RunSummary, WorkItem};
pub use pipeline::{ItemOutcome, Pipeline, PipelineOptions};
