//! news-capture: announcement pages to structured records
//!
//! Pipeline:
//! - resolve: walk the paginated listing into a date -> links index
//! - filter: keep dates inside an inclusive range
//! - enrich: scroll-capture each page with headless Chrome, stitch the
//!   screenshots, and extract title/date/text with a vision model

pub mod analyze;
pub mod browser;
pub mod capture;
pub mod config;
pub mod date_index;
pub mod error;
pub mod listing;
pub mod pagination;
pub mod pipeline;
pub mod schema;

pub use analyze::{Analyzer, OpenAiAnalyzer};
pub use browser::ChromeLauncher;
pub use capture::{capture, stitch, CompositeImage, SessionFactory, Viewport};
pub use config::{Config, DelayRange, ViewportSize};
pub use date_index::DateIndex;
pub use error::{NewsError, Result};
pub use listing::ListingClient;
pub use pagination::resolve_all;
pub use pipeline::Pipeline;
pub use schema::{Analysis, AnalysisRecord, ListingEntry};
