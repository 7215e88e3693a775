//! Keyword tables and small single-value parsers.
//!
//! Everything here expects lower-cased input unless noted.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Category, Priority, ProjectType};

// =============================================================================
// Word matching
// =============================================================================

/// Whether `needle` occurs in `haystack` bounded by non-alphanumerics or the ends.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn contains_any_word(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| contains_word(haystack, n))
}

/// Lower-case, trim, and drop trailing punctuation such as `ya!` or `oke.`.
fn bare(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_lowercase()
}

// =============================================================================
// Conversation control words
// =============================================================================

const CANCEL_WORDS: &[&str] = &[
    "ga jadi",
    "gak jadi",
    "gajadi",
    "nggak jadi",
    "tidak jadi",
    "batal",
    "batalin",
    "cancel",
    "udahan",
    "gasido",
];

const SKIP_WORDS: &[&str] = &[
    "-",
    "skip",
    "ga ada",
    "gak ada",
    "tidak ada",
    "nggak ada",
    "kosong",
    "ga usah",
    "gak usah",
    "none",
];

const CONFIRM_YES: &[&str] = &[
    "ya", "y", "iya", "yes", "ok", "oke", "okay", "gas", "lanjut", "benar", "bener", "betul",
    "sip", "siap", "udah", "sudah", "iye", "ye", "hooh", "yak",
];

const CONFIRM_NO: &[&str] = &["tidak", "ga", "gak", "nggak", "enggak", "no", "nope", "jangan"];

const MORE_YES: &[&str] = &[
    "ya", "y", "iya", "yes", "boleh", "tambah", "lagi", "mau", "lanjut", "ada", "ok", "oke",
];

const MORE_NO: &[&str] = &[
    "tidak", "ga", "gak", "nggak", "enggak", "no", "cukup", "udah", "sudah", "selesai", "done",
];

const INCOME_CUES: &[&str] = &[
    "dikasih",
    "dapat",
    "dapet",
    "nemu",
    "gajian",
    "cair",
    "transferan",
];

/// A cancel phrase anywhere in the message.
pub fn is_cancel(text: &str) -> bool {
    contains_any_word(&text.to_lowercase(), CANCEL_WORDS)
}

/// The whole message is a skip answer.
pub fn is_skip(text: &str) -> bool {
    SKIP_WORDS.contains(&bare(text).as_str())
}

/// The whole message accepts a confirmation.
pub fn is_confirm_yes(text: &str) -> bool {
    CONFIRM_YES.contains(&bare(text).as_str())
}

/// The whole message rejects a confirmation.
pub fn is_confirm_no(text: &str) -> bool {
    CONFIRM_NO.contains(&bare(text).as_str())
}

/// Answer to "add another link?". `None` when it is neither yes nor no.
pub fn parse_more(text: &str) -> Option<bool> {
    let word = bare(text);
    if MORE_YES.contains(&word.as_str()) {
        Some(true)
    } else if MORE_NO.contains(&word.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Money-received wording that turns an expense into income.
pub fn has_income_cue(text: &str) -> bool {
    contains_any_word(&text.to_lowercase(), INCOME_CUES)
}

// =============================================================================
// Categories
// =============================================================================

/// Checked in order; generic shopping verbs come last so that
/// `beli kopi` is Food and `beli pulsa` is Bills.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &[
            "makan", "minum", "jajan", "kopi", "nasi", "bakso", "mie", "mi ayam", "ayam", "snack",
            "cemilan", "sarapan", "lunch", "dinner", "breakfast", "warteg", "geprek", "martabak",
            "gorengan", "es teh", "boba", "food", "seblak", "soto", "sate",
        ],
    ),
    (
        Category::Transport,
        &[
            "gojek", "grab", "bensin", "parkir", "ojek", "ojol", "angkot", "bus", "kereta", "krl",
            "tol", "transport", "taxi", "taksi", "maxim", "bbm", "pertalite", "pertamax",
        ],
    ),
    (
        Category::Bills,
        &[
            "listrik", "pulsa", "internet", "wifi", "token", "pln", "pdam", "kos", "kost",
            "tagihan", "bpjs", "paket data", "kuota",
        ],
    ),
    (
        Category::Subscription,
        &[
            "netflix", "spotify", "youtube premium", "langganan", "subscription", "disney",
            "icloud", "chatgpt", "vidio",
        ],
    ),
    (
        Category::Salary,
        &[
            "gaji", "gajian", "salary", "honor", "bonus", "freelance", "thr", "upah", "fee",
        ],
    ),
    (Category::Transfer, &["transfer", "transferan", "tf", "kirim uang"]),
    (
        Category::Shopping,
        &[
            "beli", "belanja", "shopee", "tokopedia", "tokped", "lazada", "baju", "sepatu",
            "shopping", "celana", "tas",
        ],
    ),
];

/// Guess a category from free text.
pub fn infer_category(text: &str) -> Option<Category> {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| contains_any_word(&lower, words))
        .map(|(category, _)| *category)
}

/// A category typed or tapped directly, falling back to keyword inference.
pub fn parse_category(text: &str) -> Option<Category> {
    text.trim().parse::<Category>().ok().or_else(|| infer_category(text))
}

// =============================================================================
// Tasks and projects
// =============================================================================

static TASK_TYPE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(laporan resmi|laporan sementara|laporan pendahuluan|lapres|lapsem|lapen|lp|kuis|quiz|uts|uas|tugas|pr)\b",
    )
    .expect("Invalid task type regex")
});

/// Canonical task type for a short code or phrase.
///
/// Only the three report kinds are distinct; quizzes, exams and anything
/// unknown are plain `Tugas`.
pub fn normalize_task_type(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "lapres" | "laporan resmi" => "Laporan Resmi",
        "lapsem" | "laporan sementara" => "Laporan Sementara",
        "lapen" | "lp" | "laporan pendahuluan" => "Laporan Pendahuluan",
        _ => "Tugas",
    };
    canonical.to_string()
}

/// The first task type word mentioned in a sentence, normalized.
pub fn find_task_type(text: &str) -> Option<String> {
    TASK_TYPE_WORD
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| normalize_task_type(m.as_str()))
}

pub fn parse_priority(text: &str) -> Option<Priority> {
    let lower = text.to_lowercase();
    if contains_any_word(&lower, &["urgent", "penting", "high", "tinggi", "mendesak"]) {
        Some(Priority::High)
    } else if contains_any_word(&lower, &["santai", "low", "rendah", "nanti"]) {
        Some(Priority::Low)
    } else if contains_any_word(&lower, &["sedang", "medium", "normal", "biasa"]) {
        Some(Priority::Medium)
    } else {
        None
    }
}

pub fn parse_project_type(text: &str) -> Option<ProjectType> {
    let lower = text.to_lowercase();
    if contains_any_word(&lower, &["personal", "pribadi", "sendiri"]) {
        Some(ProjectType::Personal)
    } else if contains_any_word(&lower, &["course", "matkul", "kuliah", "kampus"]) {
        Some(ProjectType::Course)
    } else {
        None
    }
}

// =============================================================================
// Progress
// =============================================================================

static PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3})\s*(?:%|persen\b|percent\b)").expect("Invalid percent regex")
});

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(jam|hours?|hrs?|h|menit|minutes?|mins?|m)\b")
        .expect("Invalid duration regex")
});

static WHOLE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}$").expect("Invalid number regex"));

/// `50%`, `50 persen`, or a bare number when the whole text is one. 0..=100.
pub fn parse_percentage(text: &str) -> Option<u8> {
    let trimmed = text.trim();
    let value: u32 = if let Some(caps) = PERCENT.captures(trimmed) {
        caps.get(1)?.as_str().parse().ok()?
    } else if WHOLE_NUMBER.is_match(trimmed) {
        trimmed.parse().ok()?
    } else {
        return None;
    };
    u8::try_from(value).ok().filter(|v| *v <= 100)
}

/// Total minutes in `2 jam`, `1.5 jam`, `1 jam 30 menit`, `45m`.
///
/// A bare number is taken as minutes. Zero is rejected.
pub fn parse_duration(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if WHOLE_NUMBER.is_match(trimmed) {
        return trimmed.parse().ok().filter(|m| *m > 0);
    }

    let mut total = 0.0_f64;
    for caps in DURATION_PART.captures_iter(trimmed) {
        let amount: f64 = caps[1].replace(',', ".").parse().ok()?;
        let unit = caps[2].to_lowercase();
        total += if unit.starts_with('j') || unit.starts_with('h') {
            amount * 60.0
        } else {
            amount
        };
    }
    let minutes = total.round() as u32;
    (minutes > 0).then_some(minutes)
}

/// `1j 30m`-style display for minutes.
pub fn format_minutes(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{} menit", m),
        (h, 0) => format!("{} jam", h),
        (h, m) => format!("{} jam {} menit", h, m),
    }
}

/// Something that looks like a link: `http(s)://...` or `domain.tld/...` without spaces.
pub fn looks_like_url(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() || t.chars().any(char::is_whitespace) {
        return false;
    }
    let lower = t.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return true;
    }
    match t.find('.') {
        Some(i) => i > 0 && i + 1 < t.len(),
        None => false,
    }
}
