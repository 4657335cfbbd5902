pub mod cells;
pub mod layout;
pub mod months;
pub mod table;

use crate::config::{LocaleFormat, ParseGeometry};
use crate::error::{PriceError, PriceKind, Result};
use crate::models::{CellGrid, PriceEntry, PriceSchedule};
use std::sync::Arc;
use tracing::info;

use self::cells::{parse_cell_date, parse_cell_price};
use self::layout::{LayoutEngine, LopdfLayout, PageLayout};
use self::table::reconstruct_table;

const DATE_ROW: usize = 0;
const GROSS_ROW: usize = 1;
const NET_ROW: usize = 2;

// ── PDF price table parser ────────────────────────────────────────────────────

/// Turns price sheet bytes into a [`PriceSchedule`].
#[derive(Clone)]
pub struct PdfTableParser {
    layout: Arc<dyn LayoutEngine>,
    geometry: ParseGeometry,
    locale: LocaleFormat,
}

impl PdfTableParser {
    pub fn new(geometry: ParseGeometry, locale: LocaleFormat) -> Self {
        Self::with_layout(Arc::new(LopdfLayout), geometry, locale)
    }

    pub fn with_layout(
        layout: Arc<dyn LayoutEngine>,
        geometry: ParseGeometry,
        locale: LocaleFormat,
    ) -> Self {
        Self { layout, geometry, locale }
    }

    pub fn parse_pdf(&self, bytes: &[u8]) -> Result<PriceSchedule> {
        info!("Opening PDF ({} bytes)", bytes.len());
        let document = self.layout.open(bytes)?;

        info!("Detecting tables in PDF");
        let grid = self.find_table(document.as_ref())?;

        info!("Parsing prices from table in PDF ({} columns)", grid.column_count);
        let entries = self.parse_table(&grid)?;
        Ok(PriceSchedule::new(entries))
    }

    /// The table always sits on the first page.
    pub fn find_table(&self, document: &dyn PageLayout) -> Result<CellGrid> {
        if document.page_count() == 0 {
            return Err(PriceError::MalformedDocument("PDF has no pages".into()));
        }
        let tokens = document.page_tokens(1)?;
        let grid = reconstruct_table(&tokens, &self.geometry);
        if grid.is_empty() {
            return Err(PriceError::TableNotDetected { document: "PDF".into() });
        }
        Ok(grid)
    }

    /// One entry per header column; the first bad cell aborts the whole table.
    pub fn parse_table(&self, grid: &CellGrid) -> Result<Vec<PriceEntry>> {
        (0..grid.column_count)
            .map(|column| self.parse_column(grid, column))
            .collect()
    }

    fn parse_column(&self, grid: &CellGrid, column: usize) -> Result<PriceEntry> {
        let cell = |row| grid.cell(row, column).ok_or(PriceError::TableShape { row, column });

        let month_of = parse_cell_date(cell(DATE_ROW)?, &self.locale)?;
        let gross = parse_cell_price(cell(GROSS_ROW)?, PriceKind::Gross, &self.locale)?;
        let net = parse_cell_price(cell(NET_ROW)?, PriceKind::Net, &self.locale)?;

        Ok(PriceEntry {
            month_of,
            gross_price_ct_per_unit: gross,
            net_price_ct_per_unit: net,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
