use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Layout tokens ─────────────────────────────────────────────────────────────

/// A word from the layout engine. PDF origin is bottom-left, so a larger
/// `top_y` is physically higher on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken {
    pub text: String,
    pub top_y: f64,
}

impl PositionedToken {
    pub fn new(text: impl Into<String>, top_y: f64) -> Self {
        Self { text: text.into(), top_y }
    }
}

// ── Reconstructed table ───────────────────────────────────────────────────────

/// Rows of raw cell text. Row 0 holds the month headers, row 1 the gross
/// prices and row 2 the net prices. `column_count` is the untrimmed width of
/// row 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGrid {
    pub rows: Vec<Vec<String>>,
    pub column_count: usize,
}

impl CellGrid {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}

// ── Parsed prices ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    /// First day of the month the prices apply to.
    pub month_of: NaiveDate,
    pub gross_price_ct_per_unit: Decimal,
    pub net_price_ct_per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSchedule {
    pub entries: Vec<PriceEntry>,
    pub retrieved_at: DateTime<Utc>,
}

impl PriceSchedule {
    pub fn new(entries: Vec<PriceEntry>) -> Self {
        Self {
            entries,
            retrieved_at: Utc::now(),
        }
    }

    pub fn entry_for(&self, year: i32, month: u32) -> Option<&PriceEntry> {
        self.entries
            .iter()
            .find(|e| e.month_of.year() == year && e.month_of.month() == month)
    }

    pub fn current_entry(&self, now: DateTime<Utc>) -> Option<&PriceEntry> {
        self.entry_for(now.year(), now.month())
    }
}
