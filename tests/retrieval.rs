use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use price_sheet_tracker::config::{AppConfig, LocaleFormat, ParseGeometry, SourceConfig};
use price_sheet_tracker::error::{PriceError, Result};
use price_sheet_tracker::models::PositionedToken;
use price_sheet_tracker::pdf::PdfTableParser;
use price_sheet_tracker::pdf::layout::{LayoutEngine, PageLayout};
use price_sheet_tracker::scraper::Transport;
use price_sheet_tracker::PriceService;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use url::Url;

const PAGE_URL: &str = "https://energy.example.at/service/downloads";
const PDF_URL: &str = "https://energy.example.at/media/Preisblatt_2023.pdf";

const LISTING: &str = r#"
<html><body>
  <a href="/media/AGB.pdf">AGB</a>
  <a href="/media/Preisblatt_2023.pdf">Preisblatt</a>
</body></html>"#;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeTransport {
    html: String,
    hang_on_document: bool,
    page_calls: AtomicUsize,
    document_calls: AtomicUsize,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &Url) -> Result<String> {
        assert_eq!(url.as_str(), PAGE_URL);
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.html.clone())
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        assert_eq!(url.as_str(), PDF_URL);
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_document {
            std::future::pending::<()>().await;
        }
        Ok(b"%PDF-1.5".to_vec())
    }
}

#[derive(Clone)]
struct FakeLayout {
    pages: Vec<Vec<PositionedToken>>,
}

impl PageLayout for FakeLayout {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_tokens(&self, page_number: u32) -> Result<Vec<PositionedToken>> {
        Ok(self.pages[page_number as usize - 1].clone())
    }
}

impl LayoutEngine for FakeLayout {
    fn open(&self, _bytes: &[u8]) -> Result<Box<dyn PageLayout>> {
        Ok(Box::new(self.clone()))
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn config() -> AppConfig {
    AppConfig {
        source: SourceConfig {
            fetch_url: PAGE_URL.into(),
            pdf_link_xpath: r"//a[matches(@href, 'Preisblatt_\d{4}\.pdf$')]".into(),
        },
        parsing: ParseGeometry {
            max_row_top_y: 600,
            min_row_top_y_delta: 8,
        },
        ..AppConfig::default()
    }
}

/// Header row width (untrimmed) equals the trimmed data row width.
fn sheet_tokens() -> Vec<PositionedToken> {
    let row = |y: f64, cells: &[&str]| -> Vec<PositionedToken> {
        cells.iter().map(|c| PositionedToken::new(*c, y)).collect()
    };
    [
        row(790.0, &["Preisblatt", "Strom", "gültig", "ab", "01.01.2023"]),
        row(520.0, &["Jän.23", "Feb.23", "Mär.23"]),
        row(500.0, &["Bruttopreis", "12,34", "13,00", "13,10", "ct/kWh"]),
        row(480.0, &["Nettopreis", "10,00", "10,50", "10,58", "ct/kWh"]),
    ]
    .concat()
}

fn service(transport: Arc<FakeTransport>, tokens: Vec<PositionedToken>) -> PriceService {
    let cfg = config();
    let layout = Arc::new(FakeLayout { pages: vec![tokens] });
    let parser = PdfTableParser::with_layout(layout, cfg.parsing, LocaleFormat::default());
    assert_ok!(PriceService::with_parts(&cfg, transport, parser))
}

fn listing_transport() -> Arc<FakeTransport> {
    Arc::new(FakeTransport {
        html: LISTING.into(),
        ..FakeTransport::default()
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_schedule() {
    let transport = listing_transport();
    let svc = service(Arc::clone(&transport), sheet_tokens());

    let schedule = assert_ok!(svc.get_price_schedule(&CancellationToken::new()).await);

    let months: Vec<NaiveDate> = schedule.entries.iter().map(|e| e.month_of).collect();
    assert_eq!(
        months,
        vec![
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        ]
    );
    assert_eq!(schedule.entries[0].gross_price_ct_per_unit, Decimal::new(1234, 2));
    assert_eq!(schedule.entries[0].net_price_ct_per_unit, Decimal::new(1000, 2));
    assert_eq!(schedule.entries[2].net_price_ct_per_unit, Decimal::new(1058, 2));
    assert_eq!(transport.document_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_every_call_refetches() {
    let transport = listing_transport();
    let svc = service(Arc::clone(&transport), sheet_tokens());
    let cancel = CancellationToken::new();

    assert_ok!(svc.get_price_schedule(&cancel).await);
    assert_ok!(svc.get_price_schedule(&cancel).await);

    assert_eq!(transport.page_calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.document_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_current_entry() {
    let svc = service(listing_transport(), sheet_tokens());
    let now = Utc.with_ymd_and_hms(2023, 2, 14, 12, 0, 0).unwrap();

    let entry = assert_ok!(svc.get_current_entry(now, &CancellationToken::new()).await);
    let entry = entry.expect("February is listed");
    assert_eq!(entry.gross_price_ct_per_unit, Decimal::new(1300, 2));

    let later = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let none = assert_ok!(svc.get_current_entry(later, &CancellationToken::new()).await);
    assert_eq!(none, None);
}

#[tokio::test]
async fn test_find_pdf_link_only() {
    let transport = listing_transport();
    let svc = service(Arc::clone(&transport), sheet_tokens());

    let link = assert_ok!(svc.find_pdf_link(&CancellationToken::new()).await);
    assert_eq!(link.map(String::from).as_deref(), Some(PDF_URL));
    assert_eq!(transport.document_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_link_is_link_not_found() {
    let transport = Arc::new(FakeTransport {
        html: "<html><body><a href='/media/AGB.pdf'>AGB</a></body></html>".into(),
        ..FakeTransport::default()
    });
    let svc = service(transport, sheet_tokens());

    let err = assert_err!(svc.get_price_schedule(&CancellationToken::new()).await);
    assert!(matches!(err, PriceError::LinkNotFound { ref page_url } if page_url == PAGE_URL));
}

#[tokio::test]
async fn test_empty_page_is_table_not_detected() {
    let svc = service(listing_transport(), vec![]);
    let err = assert_err!(svc.get_price_schedule(&CancellationToken::new()).await);
    assert!(matches!(err, PriceError::TableNotDetected { ref document } if document == PDF_URL));
    assert!(err.to_string().contains(PDF_URL));
}

#[tokio::test]
async fn test_pageless_document_names_its_url() {
    let cfg = config();
    let layout = Arc::new(FakeLayout { pages: vec![] });
    let parser = PdfTableParser::with_layout(layout, cfg.parsing, LocaleFormat::default());
    let svc = assert_ok!(PriceService::with_parts(&cfg, listing_transport(), parser));

    let err = assert_err!(svc.get_price_schedule(&CancellationToken::new()).await);
    assert!(matches!(err, PriceError::MalformedDocument(ref msg) if msg.starts_with(PDF_URL)));
}

#[tokio::test]
async fn test_bad_cell_aborts_whole_retrieval() {
    let mut tokens = sheet_tokens();
    let bad = tokens.iter_mut().find(|t| t.text == "13,10").unwrap();
    bad.text = "13;10".into();

    let svc = service(listing_transport(), tokens);
    let err = assert_err!(svc.get_price_schedule(&CancellationToken::new()).await);
    assert!(matches!(err, PriceError::PriceParse { ref text, .. } if text == "13;10"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let transport = listing_transport();
    let svc = service(Arc::clone(&transport), sheet_tokens());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = assert_err!(svc.get_price_schedule(&cancel).await);
    assert!(err.is_cancelled());
    assert_eq!(transport.page_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_during_document_fetch() {
    let transport = Arc::new(FakeTransport {
        html: LISTING.into(),
        hang_on_document: true,
        ..FakeTransport::default()
    });
    let svc = service(Arc::clone(&transport), sheet_tokens());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let watcher = Arc::clone(&transport);
    tokio::spawn(async move {
        while watcher.document_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        trigger.cancel();
    });

    let err = assert_err!(svc.get_price_schedule(&cancel).await);
    assert!(matches!(err, PriceError::Cancelled));
}

#[test]
fn test_unsupported_function_in_configured_query() {
    let mut cfg = config();
    cfg.source.pdf_link_xpath = "//a[lower-case(@href) = 'x.pdf']".into();
    let layout = Arc::new(FakeLayout { pages: vec![] });
    let parser = PdfTableParser::with_layout(layout, cfg.parsing, LocaleFormat::default());

    let result = PriceService::with_parts(&cfg, listing_transport(), parser);
    assert!(matches!(result, Err(PriceError::UnsupportedFunction { ref name }) if name == "lower-case"));
}
