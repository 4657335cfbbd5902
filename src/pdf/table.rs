//! Regroups a page's words into table rows by vertical position.
//!
//! The layout engine hands out words in reading order without any row or
//! column structure. Words are clustered into rows by watching the top edge:
//! a drop larger than `min_row_top_y_delta` relative to the previous kept word
//! starts the next row. Everything above `max_row_top_y` is page header.

use crate::config::ParseGeometry;
use crate::models::{CellGrid, PositionedToken};
use tracing::debug;

pub fn reconstruct_table(tokens: &[PositionedToken], geometry: &ParseGeometry) -> CellGrid {
    let max_top_y = f64::from(geometry.max_row_top_y);
    let min_delta = f64::from(geometry.min_row_top_y_delta);

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(20);
    let mut row_idx = 0usize;
    let mut last_y: Option<f64> = None;

    for token in tokens {
        if token.top_y > max_top_y {
            continue;
        }
        if let Some(prev) = last_y {
            if prev - token.top_y > min_delta {
                row_idx += 1;
            }
        }
        last_y = Some(token.top_y);

        if rows.len() <= row_idx {
            rows.resize_with(row_idx + 1, || Vec::with_capacity(20));
        }
        rows[row_idx].push(token.text.clone());
    }

    let column_count = rows.first().map_or(0, Vec::len);
    debug!("Clustered {} tokens into {} rows ({} columns)", tokens.len(), rows.len(), column_count);

    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| if idx == 0 { row } else { trim_labels(row) })
        .collect();

    CellGrid { rows, column_count }
}

/// Data rows start with their label ("Bruttopreis"/"Nettopreis") and end with
/// the unit ("ct/kWh").
fn trim_labels(mut row: Vec<String>) -> Vec<String> {
    if row.len() < 2 {
        return Vec::new();
    }
    row.pop();
    row.remove(0);
    row
}
