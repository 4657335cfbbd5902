//! Month abbreviations as printed in the price sheet header row.
//!
//! The sheet uses the stand-alone (ICU `LLL`) Austrian German forms, which
//! differ from the usual format abbreviations for several months: January is
//! `Jän`, and March/June/July are cut to three letters (`Mär`, `Jun`, `Jul`).

const MONTHS: [(&str, u32); 12] = [
    ("Jän", 1),
    ("Feb", 2),
    ("Mär", 3),
    ("Apr", 4),
    ("Mai", 5),
    ("Jun", 6),
    ("Jul", 7),
    ("Aug", 8),
    ("Sep", 9),
    ("Okt", 10),
    ("Nov", 11),
    ("Dez", 12),
];

/// Month number (1-12) for an abbreviation. Matching is case-sensitive.
pub fn month_number(token: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(abbr, _)| *abbr == token)
        .map(|(_, num)| *num)
}
