//! Retrieval orchestrator: listing page → download link → PDF → prices.
//!
//! ## Stages
//!
//! `get_price_schedule()` walks
//!   FetchingPage → LocatingLink → FetchingDocument → ReconstructingTable → Done
//! and drops into Failed from any stage. Every call re-fetches and re-parses;
//! nothing is kept between calls. Cancellation is checked at each stage
//! boundary and raced against both network fetches.

use crate::config::AppConfig;
use crate::error::{PriceError, Result};
use crate::models::{PriceEntry, PriceSchedule};
use crate::pdf::PdfTableParser;
use crate::scraper::{HttpClient, LinkLocator, PatternEvaluator, Transport};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStage {
    FetchingPage,
    LocatingLink,
    FetchingDocument,
    ReconstructingTable,
    Done,
    Failed,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrievalStage::FetchingPage => "fetching page",
            RetrievalStage::LocatingLink => "locating link",
            RetrievalStage::FetchingDocument => "fetching document",
            RetrievalStage::ReconstructingTable => "reconstructing table",
            RetrievalStage::Done => "done",
            RetrievalStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-call stage tracker.
struct Retrieval<'a> {
    stage: RetrievalStage,
    cancel: &'a CancellationToken,
}

impl<'a> Retrieval<'a> {
    fn start(cancel: &'a CancellationToken) -> Self {
        Self {
            stage: RetrievalStage::FetchingPage,
            cancel,
        }
    }

    /// Enter the next stage unless cancellation was requested.
    fn enter(&mut self, stage: RetrievalStage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(PriceError::Cancelled);
        }
        self.stage = stage;
        Ok(())
    }

    /// Run a suspension point, abandoning it if cancellation fires first.
    async fn race<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PriceError::Cancelled),
            result = fut => result,
        }
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.stage = RetrievalStage::Done,
            Err(e) if e.is_cancelled() => {
                warn!("Retrieval cancelled while {}", self.stage);
                self.stage = RetrievalStage::Failed;
            }
            Err(e) => {
                error!("Retrieval failed while {}: {}", self.stage, e);
                self.stage = RetrievalStage::Failed;
            }
        }
        result
    }
}

// ── Price service ─────────────────────────────────────────────────────────────

pub struct PriceService {
    transport: Arc<dyn Transport>,
    page_url: Url,
    locator: LinkLocator,
    parser: PdfTableParser,
}

impl PriceService {
    /// Service backed by the real HTTP client and PDF layout.
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpClient::new(&config.http)?);
        let parser = PdfTableParser::new(config.parsing, config.locale);
        Self::with_parts(config, transport, parser)
    }

    pub fn with_parts(
        config: &AppConfig,
        transport: Arc<dyn Transport>,
        parser: PdfTableParser,
    ) -> Result<Self> {
        let page_url = config.source.page_url()?;
        let locator = LinkLocator::new(&config.source.pdf_link_xpath, PatternEvaluator::new())?;
        Ok(Self {
            transport,
            page_url,
            locator,
            parser,
        })
    }

    /// Fetch the listing page and locate the download link.
    pub async fn find_pdf_link(&self, cancel: &CancellationToken) -> Result<Option<Url>> {
        let mut retrieval = Retrieval::start(cancel);
        let result = self.find_pdf_link_inner(&mut retrieval).await;
        retrieval.finish(result)
    }

    async fn find_pdf_link_inner(&self, retrieval: &mut Retrieval<'_>) -> Result<Option<Url>> {
        retrieval.enter(RetrievalStage::FetchingPage)?;
        info!("Fetching downloads page {}", self.page_url);
        let html = retrieval.race(self.transport.get_text(&self.page_url)).await?;

        retrieval.enter(RetrievalStage::LocatingLink)?;
        let link = self.locator.locate_url(&html, &self.page_url)?;
        if let Some(link) = &link {
            info!("Found PDF download link {}", link);
        }
        Ok(link)
    }

    /// The end-to-end retrieval.
    pub async fn get_price_schedule(&self, cancel: &CancellationToken) -> Result<PriceSchedule> {
        let mut retrieval = Retrieval::start(cancel);
        let result = self.get_price_schedule_inner(&mut retrieval).await;
        retrieval.finish(result)
    }

    async fn get_price_schedule_inner(&self, retrieval: &mut Retrieval<'_>) -> Result<PriceSchedule> {
        let pdf_url = self
            .find_pdf_link_inner(retrieval)
            .await?
            .ok_or_else(|| PriceError::LinkNotFound {
                page_url: self.page_url.to_string(),
            })?;

        retrieval.enter(RetrievalStage::FetchingDocument)?;
        info!("Downloading PDF from {}", pdf_url);
        let bytes = retrieval.race(self.transport.get_bytes(&pdf_url)).await?;

        retrieval.enter(RetrievalStage::ReconstructingTable)?;
        let schedule = self
            .parser
            .parse_pdf(&bytes)
            .map_err(|e| e.with_document(pdf_url.as_str()))?;
        info!("Parsed {} price entries", schedule.entries.len());
        Ok(schedule)
    }

    /// Entry for the month containing `now`, if the sheet lists it.
    pub async fn get_current_entry(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<PriceEntry>> {
        let schedule = self.get_price_schedule(cancel).await?;
        Ok(schedule.current_entry(now).cloned())
    }
}
