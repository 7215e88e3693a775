//! Money amounts in Indonesian chat shorthand.
//!
//! `50rb`, `50 ribu`, `50k`, `1.5jt`, `1,5 juta`, `Rp 25.000`, `gocap`.

use regex::Regex;
use std::sync::LazyLock;

use super::keywords::contains_word;

static CURRENCY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brp\.?\s*|\brupiah\b|\bidr\b").expect("Invalid currency regex")
});

static AMOUNT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*(ribu|rb|k|juta|jt)?\b").expect("Invalid amount regex")
});

static THOUSANDS_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:[.,]\d{3})+$").expect("Invalid grouping regex"));

/// Slang amounts, checked before any digits.
const SLANG: &[(&str, i64)] = &[
    ("gocap", 50_000),
    ("cepe", 100_000),
    ("gopek", 500_000),
    ("sejuta", 1_000_000),
    ("duajuta", 2_000_000),
];

/// Parse the first money amount in `text`.
///
/// Returns `None` for anything that does not yield a positive amount. A bare
/// number below 1 000 without a suffix is read as thousands (`25` means
/// Rp25.000), which is how people type prices in chat.
pub fn parse_amount(text: &str) -> Option<i64> {
    let lower = text.to_lowercase();
    let cleaned = CURRENCY_WORDS.replace_all(&lower, " ");

    for (word, value) in SLANG {
        if contains_word(&cleaned, word) {
            return Some(*value);
        }
    }

    let caps = AMOUNT_TOKEN.captures(&cleaned)?;
    let digits = caps.get(1)?.as_str();
    let suffix = caps.get(2).map(|m| m.as_str());

    let number = parse_number(digits, suffix.is_some())?;
    let multiplier = match suffix {
        Some("rb") | Some("ribu") | Some("k") => 1_000.0,
        Some("jt") | Some("juta") => 1_000_000.0,
        _ if number < 1_000.0 => 1_000.0,
        _ => 1.0,
    };

    let amount = (number * multiplier).round() as i64;
    (amount > 0).then_some(amount)
}

/// Interpret separators: `15.000` is grouping, `1.5` is a decimal point.
fn parse_number(digits: &str, has_suffix: bool) -> Option<f64> {
    let separators = digits.chars().filter(|c| *c == '.' || *c == ',').count();

    if separators == 0 {
        return digits.parse().ok();
    }
    if separators == 1 && has_suffix {
        return digits.replace(',', ".").parse().ok();
    }
    if THOUSANDS_GROUPED.is_match(digits) {
        return digits.replace(['.', ','], "").parse().ok();
    }
    if separators == 1 {
        return digits.replace(',', ".").parse().ok();
    }
    None
}

/// Whether `text` contains something that parses as an amount.
pub fn has_amount(text: &str) -> bool {
    parse_amount(text).is_some()
}

/// Remove every amount token (digits with optional suffix, slang words) from `text`.
pub fn strip_amounts(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut out = CURRENCY_WORDS.replace_all(&lower, " ").to_string();
    out = AMOUNT_TOKEN.replace_all(&out, " ").to_string();
    for (word, _) in SLANG {
        if contains_word(&out, word) {
            out = out.replace(word, " ");
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Short display: `Rp50rb`, `Rp1.5jt`, `Rp750`.
pub fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    if abs >= 1_000_000 {
        format!("{}Rp{}jt", sign, trim_decimal(abs as f64 / 1_000_000.0))
    } else if abs >= 1_000 {
        format!("{}Rp{}rb", sign, trim_decimal(abs as f64 / 1_000.0))
    } else {
        format!("{}Rp{}", sign, abs)
    }
}

/// Full display with dot grouping: `Rp1.500.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}Rp{}", sign, grouped)
}

fn trim_decimal(value: f64) -> String {
    let s = format!("{:.1}", value);
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}
