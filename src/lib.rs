//! Price sheet tracker.
//!
//! Finds the monthly price sheet PDF linked from a listing page, downloads it
//! and rebuilds its price table from positioned words.
//!
//! - `scraper`: transport, HTML → XPath bridge, `matches()` extension, link lookup
//! - `pdf`: layout tokens, row clustering, cell parsing, table assembly
//! - `pipeline`: the end-to-end `PriceService`

pub mod config;
pub mod error;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod scraper;
pub mod utils;

pub use config::AppConfig;
pub use error::{PriceError, Result};
pub use models::{PriceEntry, PriceSchedule};
pub use pipeline::PriceService;
