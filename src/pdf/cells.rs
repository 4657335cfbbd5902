use crate::config::LocaleFormat;
use crate::error::{PriceError, PriceKind, Result};
use crate::pdf::months::month_number;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Parse a header cell such as `"Mär.23"` into the first day of that month.
pub fn parse_cell_date(text: &str, locale: &LocaleFormat) -> Result<NaiveDate> {
    let fail = || PriceError::DateParse { text: text.to_string() };

    let mut parts = text.split('.');
    let month_name = parts.next().ok_or_else(fail)?;
    let year_text = parts.next().ok_or_else(fail)?;

    let two_digit = parse_two_digit_year(year_text).ok_or_else(fail)?;
    let year = expand_two_digit_year(two_digit, locale.two_digit_year_max);
    let month = month_number(month_name).ok_or_else(fail)?;

    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(fail)
}

fn parse_two_digit_year(s: &str) -> Option<i32> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(i32::from(bytes[0] - b'0') * 10 + i32::from(bytes[1] - b'0'))
}

/// `two_digit_year_max = 2049`: 00..=49 → 2000s, 50..=99 → 1900s.
fn expand_two_digit_year(yy: i32, two_digit_year_max: i32) -> i32 {
    let century = two_digit_year_max / 100 * 100;
    let year = century + yy;
    if year > two_digit_year_max { year - 100 } else { year }
}

// ── Prices ────────────────────────────────────────────────────────────────────

/// Parse a price cell using the sheet's separators. "1.234,56" → 1234.56
pub fn parse_cell_price(text: &str, kind: PriceKind, locale: &LocaleFormat) -> Result<Decimal> {
    let fail = || PriceError::PriceParse { kind, text: text.to_string() };

    let s = text.trim();
    let (negative, body) = split_sign(s);

    let mut int_digits = String::new();
    let mut frac_digits = String::new();
    let mut in_fraction = false;

    for ch in body.chars() {
        if ch.is_ascii_digit() {
            if in_fraction {
                frac_digits.push(ch);
            } else {
                int_digits.push(ch);
            }
        } else if ch == locale.decimal_separator && !in_fraction {
            in_fraction = true;
        } else if ch == locale.group_separator && !in_fraction && !int_digits.is_empty() {
            continue;
        } else {
            return Err(fail());
        }
    }

    if int_digits.is_empty() && frac_digits.is_empty() {
        return Err(fail());
    }

    let mut normalized = String::with_capacity(int_digits.len() + frac_digits.len() + 3);
    if negative {
        normalized.push('-');
    }
    normalized.push_str(if int_digits.is_empty() { "0" } else { &int_digits });
    if !frac_digits.is_empty() {
        normalized.push('.');
        normalized.push_str(&frac_digits);
    }

    Decimal::from_str(&normalized).map_err(|_| fail())
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else if let Some(rest) = s.strip_suffix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_suffix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

/// Render a price the way the sheet prints it. 1234.5 → "1.234,5"
pub fn format_price(value: Decimal, locale: &LocaleFormat) -> String {
    let plain = value.abs().to_string();
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (plain.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(locale.group_separator);
        }
        grouped.push(ch);
    }
    if value.is_sign_negative() && !value.is_zero() {
        grouped.push('-');
    }

    let mut result: String = grouped.chars().rev().collect();
    if let Some(frac) = frac_part {
        result.push(locale.decimal_separator);
        result.push_str(frac);
    }
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
