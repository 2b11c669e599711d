//! Crawl progress reporting.
//!
//! Reports observable progress during `shelf crawl` so users see which
//! listing page is being read and how many detail pages are done.
//! Progress is emitted on **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for a crawl.
#[derive(Clone, Debug)]
pub enum CrawlProgressEvent {
    /// Reading listing page `page` of `category`. Total unknown.
    Discovering { category: String, page: u32 },
    /// Detail pages: `n` of `total` done, `failed` of them dropped.
    Crawling { n: u64, total: u64, failed: u64 },
}

/// Reports crawl progress. Implementations write to stderr (human or JSON).
pub trait CrawlProgressReporter: Send + Sync {
    fn report(&self, event: CrawlProgressEvent);
}

/// Human-friendly progress on stderr: "crawl  1,234 / 5,000 books  (3 failed)".
pub struct StderrProgress;

impl CrawlProgressReporter for StderrProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let line = match &event {
            CrawlProgressEvent::Discovering { category, page } => {
                format!("discover {}  page {}\n", category, page)
            }
            CrawlProgressEvent::Crawling { n, total, failed } => {
                let mut line = format!(
                    "crawl  {} / {} books",
                    format_number(*n),
                    format_number(*total)
                );
                if *failed > 0 {
                    line.push_str(&format!("  ({} failed)", format_number(*failed)));
                }
                line.push('\n');
                line
            }
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CrawlProgressReporter for JsonProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let obj = match &event {
            CrawlProgressEvent::Discovering { category, page } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "category": category,
                "page": page
            }),
            CrawlProgressEvent::Crawling { n, total, failed } => serde_json::json!({
                "event": "progress",
                "phase": "crawling",
                "n": n,
                "total": total,
                "failed": failed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CrawlProgressReporter for NoProgress {
    fn report(&self, _event: CrawlProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn CrawlProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
