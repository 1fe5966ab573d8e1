//! Deterministic filter extraction from free-text queries.
//!
//! Every extractor takes an explicit `reference_date` rather than reading
//! the clock itself, so relative-date extraction ("last month",
//! "yesterday") stays reproducible in tests.

use chrono::{Datelike, Duration, NaiveDate};
use finsight_core::{AmountRange, DateRange};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());
static DMY_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(january|february|march|april|may|june|july|august|september|october|november|december)\b").unwrap()
});
static AMOUNT_OVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:over|above|more than)\s+(?:sar\s*)?(\d+(?:\.\d+)?)\s*(?:sar)?\b").unwrap());
static AMOUNT_UNDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:under|below|less than)\s+(?:sar\s*)?(\d+(?:\.\d+)?)\s*(?:sar)?\b").unwrap());
static AMOUNT_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:sar\s*)?(\d+(?:\.\d+)?)\s*(?:sar)?\b").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static MERCHANT_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:at|from|to)\s+((?:[A-Z][\w.&'-]*\s*){1,4})").unwrap());

fn month_number(name: &str) -> Option<u32> {
    let months = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    months
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

/// Extracts a `[start, end)` date range from `text`, if any recognizable
/// date form is present. `reference_date` anchors relative forms.
pub fn extract_date_range(text: &str, reference_date: NaiveDate) -> Option<DateRange> {
    let lower = text.to_lowercase();

    if lower.contains("yesterday") {
        return Some(DateRange::single_day(reference_date - Duration::days(1)));
    }
    if lower.contains("today") {
        return Some(DateRange::single_day(reference_date));
    }
    if lower.contains("last month") {
        let first_of_this_month =
            NaiveDate::from_ymd_opt(reference_date.year(), reference_date.month(), 1).unwrap();
        let first_of_last_month = if reference_date.month() == 1 {
            NaiveDate::from_ymd_opt(reference_date.year() - 1, 12, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(reference_date.year(), reference_date.month() - 1, 1).unwrap()
        };
        return Some(DateRange {
            start: first_of_last_month,
            end: first_of_this_month,
        });
    }

    if let Some(caps) = ISO_DATE.captures(text) {
        let y: i32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let d: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d).map(DateRange::single_day);
    }
    if let Some(caps) = DMY_DATE.captures(text) {
        let d: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let y: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d).map(DateRange::single_day);
    }
    if let Some(caps) = DAY_MONTH.captures(text) {
        let d: u32 = caps[1].parse().ok()?;
        let m = month_number(&caps[2])?;
        return NaiveDate::from_ymd_opt(reference_date.year(), m, d).map(DateRange::single_day);
    }

    None
}

/// Extracts an amount interval, applying `±1` tolerance to a bare exact
/// match.
pub fn extract_amount_range(text: &str) -> Option<AmountRange> {
    if let Some(caps) = AMOUNT_OVER.captures(text) {
        let n: f64 = caps[1].parse().ok()?;
        return Some(AmountRange { min: n, max: f64::MAX });
    }
    if let Some(caps) = AMOUNT_UNDER.captures(text) {
        let n: f64 = caps[1].parse().ok()?;
        return Some(AmountRange { min: f64::MIN, max: n });
    }
    if let Some(caps) = AMOUNT_EXACT.captures(text) {
        let n: f64 = caps[1].parse().ok()?;
        return Some(AmountRange::around(n));
    }
    None
}

/// Extracts merchant names: quoted strings take priority, then
/// `at|from|to <CapitalizedPhrase>` forms.
pub fn extract_merchants(text: &str) -> Vec<String> {
    let mut merchants: Vec<String> = QUOTED
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .collect();

    for caps in MERCHANT_PHRASE.captures_iter(text) {
        let phrase = caps[1].trim().to_string();
        if !phrase.is_empty() && !merchants.iter().any(|m| m.eq_ignore_ascii_case(&phrase)) {
            merchants.push(phrase);
        }
    }
    merchants
}

/// Extracts any recognized domain keyword from a closed vocabulary of
/// domain terms.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    finsight_core::keywords::DOMAIN_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| kw.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ref_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    #[test]
    fn iso_date_expands_to_single_day_range() {
        let range = extract_date_range("what happened on 2026-01-15", ref_date()).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2026, 1, 16).unwrap());
    }

    #[test]
    fn last_month_spans_the_full_prior_calendar_month() {
        let range = extract_date_range("spending last month", ref_date()).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
    }

    #[test]
    fn exact_amount_gets_plus_minus_one_tolerance() {
        let range = extract_amount_range("payments of 15000 SAR").unwrap();
        assert_eq!(range.min, 14999.0);
        assert_eq!(range.max, 15001.0);
    }

    #[test]
    fn over_amount_is_open_ended_above() {
        let range = extract_amount_range("GOSI payments over 15000").unwrap();
        assert_eq!(range.min, 15000.0);
        assert_eq!(range.max, f64::MAX);
    }

    #[test]
    fn merchant_phrase_after_preposition_is_captured() {
        let merchants = extract_merchants("transfer to Client Invoices Co");
        assert!(merchants.iter().any(|m| m.starts_with("Client")));
    }

    #[test]
    fn quoted_merchant_is_captured_verbatim() {
        let merchants = extract_merchants(r#"payments to "Al Rajhi Bank""#);
        assert_eq!(merchants[0], "Al Rajhi Bank");
    }

    #[test]
    fn gosi_keyword_is_recognized() {
        assert_eq!(extract_keywords("show me GOSI payments"), vec!["gosi"]);
    }
}
