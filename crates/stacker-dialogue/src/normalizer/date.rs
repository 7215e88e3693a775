//! Relative and absolute calendar dates, Indonesian first, English accepted.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use std::sync::LazyLock;

use super::keywords::contains_word;

// =============================================================================
// Compiled patterns
// =============================================================================

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(senin|selasa|rabu|kamis|jum'?at|sabtu|minggu|ahad|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b(\s+depan)?",
    )
    .expect("Invalid weekday regex")
});

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?\b").expect("Invalid numeric date regex")
});

static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*(januari|februari|maret|april|mei|juni|juli|agustus|september|oktober|november|desember|january|february|march|may|june|july|august|october|december|jan|feb|mar|apr|jun|jul|agu|agt|aug|sept|sep|okt|oct|nov|des|dec)\b(?:\s+(\d{4}))?",
    )
    .expect("Invalid day-month regex")
});

static DAY_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:tanggal|tgl|tang)\.?\s*(\d{1,2})\b").expect("Invalid day regex")
});

static BARE_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}$").expect("Invalid bare day regex"));

/// Relative day words and their offsets, checked in order.
const RELATIVE_DAYS: &[(&str, i64)] = &[
    ("day after tomorrow", 2),
    ("lusa", 2),
    ("besok", 1),
    ("besuk", 1),
    ("bsk", 1),
    ("tomorrow", 1),
    ("hari ini", 0),
    ("today", 0),
    ("kemarin", -1),
    ("yesterday", -1),
];

// =============================================================================
// Parsing
// =============================================================================

/// Resolve a date mentioned in `text`, relative to `today`.
///
/// Returns `None` when nothing recognizable is found or the calendar date
/// does not exist (31 February).
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if let Some(date) = week_or_month(&lower, today) {
        return Some(date);
    }

    for (word, offset) in RELATIVE_DAYS {
        if contains_word(&lower, word) {
            return Some(today + Duration::days(*offset));
        }
    }

    if let Some(caps) = WEEKDAY.captures(&lower) {
        let target = weekday_from_name(caps.get(1)?.as_str())?;
        let mut ahead = (7 + target.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            % 7;
        if ahead == 0 {
            ahead = 7;
        }
        if caps.get(2).is_some() {
            ahead += 7;
        }
        return Some(today + Duration::days(ahead));
    }

    if let Some(caps) = DAY_MONTH.captures(&lower) {
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month = month_from_name(caps.get(2)?.as_str())?;
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        return day_month(day, month, year, today);
    }

    if let Some(caps) = NUMERIC_DATE.captures(&lower) {
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let year = caps.get(3).and_then(|m| {
            m.as_str()
                .parse::<i32>()
                .ok()
                .map(|y| if y < 100 { 2000 + y } else { y })
        });
        return day_month(day, month, year, today);
    }

    let day = if let Some(caps) = DAY_ONLY.captures(&lower) {
        caps.get(1)?.as_str().parse::<u32>().ok()?
    } else if BARE_DAY.is_match(&lower) {
        lower.parse::<u32>().ok()?
    } else {
        return None;
    };
    day_only(day, today)
}

/// `minggu ini`, `minggu depan`, `bulan ini`, `bulan depan` and English equivalents.
fn week_or_month(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    let to_sunday = 6 - today.weekday().num_days_from_monday() as i64;
    let end_of_week = today + Duration::days(to_sunday);

    if contains_word(lower, "minggu depan") || contains_word(lower, "next week") {
        return Some(end_of_week + Duration::days(7));
    }
    if contains_word(lower, "minggu ini") || contains_word(lower, "this week") {
        return Some(end_of_week);
    }
    if contains_word(lower, "bulan depan") || contains_word(lower, "next month") {
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        return last_day_of_month(year, month);
    }
    if contains_word(lower, "bulan ini") || contains_word(lower, "this month") {
        return last_day_of_month(today.year(), today.month());
    }
    None
}

/// A day and month; a date already past this year rolls to next year.
fn day_month(day: u32, month: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

/// A day of month alone; a day already past rolls to next month.
fn day_only(day: u32, today: NaiveDate) -> Option<NaiveDate> {
    if day >= today.day() {
        return NaiveDate::from_ymd_opt(today.year(), today.month(), day);
    }
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).map(|d| d - Duration::days(1))
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "senin" | "monday" => Some(Weekday::Mon),
        "selasa" | "tuesday" => Some(Weekday::Tue),
        "rabu" | "wednesday" => Some(Weekday::Wed),
        "kamis" | "thursday" => Some(Weekday::Thu),
        "jumat" | "jum'at" | "friday" => Some(Weekday::Fri),
        "sabtu" | "saturday" => Some(Weekday::Sat),
        "minggu" | "ahad" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name {
        "januari" | "january" | "jan" => 1,
        "februari" | "february" | "feb" => 2,
        "maret" | "march" | "mar" => 3,
        "april" | "apr" => 4,
        "mei" | "may" => 5,
        "juni" | "june" | "jun" => 6,
        "juli" | "july" | "jul" => 7,
        "agustus" | "august" | "agu" | "agt" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "oktober" | "october" | "okt" | "oct" => 10,
        "november" | "nov" => 11,
        "desember" | "december" | "des" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Whether `text` mentions anything date-like, without resolving it.
pub fn mentions_date(text: &str) -> bool {
    let lower = text.to_lowercase();
    RELATIVE_DAYS.iter().any(|(w, _)| contains_word(&lower, w))
        || WEEKDAY.is_match(&lower)
        || DAY_MONTH.is_match(&lower)
        || NUMERIC_DATE.is_match(&lower)
        || DAY_ONLY.is_match(&lower)
        || PERIOD_PHRASES.iter().any(|p| contains_word(&lower, p))
}

const PERIOD_PHRASES: &[&str] = &[
    "minggu ini",
    "minggu depan",
    "bulan ini",
    "bulan depan",
    "this week",
    "next week",
    "this month",
    "next month",
];

/// `YYYY-MM-DD`, the format events and the cache use.
pub fn format_ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Short human form for summaries: `Sen, 20 Jan 2025`.
pub fn format_human(date: NaiveDate) -> String {
    const DAYS: [&str; 7] = ["Sen", "Sel", "Rab", "Kam", "Jum", "Sab", "Min"];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "Mei", "Jun", "Jul", "Agu", "Sep", "Okt", "Nov", "Des",
    ];
    format!(
        "{}, {} {} {}",
        DAYS[date.weekday().num_days_from_monday() as usize],
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_relative_days() {
        assert_eq!(parse_date("besok", today()), Some(ymd(2025, 1, 16)));
        assert_eq!(parse_date("bsk", today()), Some(ymd(2025, 1, 16)));
        assert_eq!(parse_date("lusa", today()), Some(ymd(2025, 1, 17)));
        assert_eq!(parse_date("hari ini", today()), Some(today()));
        assert_eq!(parse_date("kemarin", today()), Some(ymd(2025, 1, 14)));
        assert_eq!(parse_date("day after tomorrow", today()), Some(ymd(2025, 1, 17)));
    }

    #[test]
    fn test_relative_word_inside_sentence() {
        assert_eq!(
            parse_date("tugas database deadline besok", today()),
            Some(ymd(2025, 1, 16))
        );
    }

    #[test]
    fn test_week_and_month_phrases() {
        assert_eq!(parse_date("minggu ini", today()), Some(ymd(2025, 1, 19)));
        assert_eq!(parse_date("minggu depan", today()), Some(ymd(2025, 1, 26)));
        assert_eq!(parse_date("bulan ini", today()), Some(ymd(2025, 1, 31)));
        assert_eq!(parse_date("bulan depan", today()), Some(ymd(2025, 2, 28)));
        assert_eq!(parse_date("next week", today()), Some(ymd(2025, 1, 26)));
    }

    #[test]
    fn test_next_month_rolls_year_in_december() {
        let dec = ymd(2025, 12, 3);
        assert_eq!(parse_date("bulan depan", dec), Some(ymd(2026, 1, 31)));
    }

    #[test]
    fn test_weekdays() {
        assert_eq!(parse_date("jumat", today()), Some(ymd(2025, 1, 17)));
        assert_eq!(parse_date("senin", today()), Some(ymd(2025, 1, 20)));
        // Same weekday means next week.
        assert_eq!(parse_date("rabu", today()), Some(ymd(2025, 1, 22)));
        assert_eq!(parse_date("senin depan", today()), Some(ymd(2025, 1, 27)));
        assert_eq!(parse_date("friday", today()), Some(ymd(2025, 1, 17)));
    }

    #[test]
    fn test_minggu_alone_is_sunday() {
        assert_eq!(parse_date("minggu", today()), Some(ymd(2025, 1, 19)));
    }

    #[test]
    fn test_day_month() {
        assert_eq!(parse_date("20 januari", today()), Some(ymd(2025, 1, 20)));
        assert_eq!(parse_date("tanggal 3 mar", today()), Some(ymd(2025, 3, 3)));
        assert_eq!(parse_date("25 des 2026", today()), Some(ymd(2026, 12, 25)));
    }

    #[test]
    fn test_past_day_month_rolls_to_next_year() {
        assert_eq!(parse_date("10 januari", today()), Some(ymd(2026, 1, 10)));
    }

    #[test]
    fn test_numeric_dates() {
        assert_eq!(parse_date("20/1", today()), Some(ymd(2025, 1, 20)));
        assert_eq!(parse_date("5-2-2025", today()), Some(ymd(2025, 2, 5)));
        assert_eq!(parse_date("5/2/26", today()), Some(ymd(2026, 2, 5)));
    }

    #[test]
    fn test_day_only() {
        assert_eq!(parse_date("tanggal 20", today()), Some(ymd(2025, 1, 20)));
        assert_eq!(parse_date("20", today()), Some(ymd(2025, 1, 20)));
        // Already past this month.
        assert_eq!(parse_date("tgl 3", today()), Some(ymd(2025, 2, 3)));
    }

    #[test]
    fn test_invalid_calendar_dates() {
        assert_eq!(parse_date("31 februari", today()), None);
        assert_eq!(parse_date("45", today()), None);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(parse_date("kapan-kapan", today()), None);
        assert_eq!(parse_date("", today()), None);
        assert_eq!(parse_date("makan siang", today()), None);
    }

    #[test]
    fn test_mentions_date() {
        assert!(mentions_date("deadline besok"));
        assert!(mentions_date("dl 20 jan"));
        assert!(!mentions_date("beli kopi 25rb"));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_ymd(ymd(2025, 1, 6)), "2025-01-06");
        assert_eq!(format_human(ymd(2025, 1, 15)), "Rab, 15 Jan 2025");
    }
}
