//! Rule-based entity normalization.
//!
//! Turns raw chat text into typed slot values: money amounts, calendar
//! dates, courses, categories and the small enumerations used by tasks and
//! projects. Everything sits behind the [`EntityNormalizer`] trait so the
//! state machine never depends on how extraction is done.

pub mod amount;
pub mod course;
pub mod date;
pub mod keywords;

use std::collections::HashMap;

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::cache::CachedProject;
use crate::error::DialogueError;
use crate::types::{Category, Intent, Slot, SlotData, SlotValue};

pub use amount::{format_amount, format_rupiah, parse_amount};
pub use course::{find_course, Course, CourseMatch, KeywordEntry, MatchKind, SynonymTable};
pub use date::{format_human, format_ymd, parse_date};

/// Confidence attached to values pulled out of a whole sentence.
const EXTRACTED_CONFIDENCE: f32 = 0.8;

/// Everything a normalizer may consult besides the text itself.
#[derive(Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub intent: Intent,
    pub today: NaiveDate,
    pub courses: &'a [Course],
    pub projects: &'a [CachedProject],
    pub synonyms: &'a SynonymTable,
}

/// Slot values found in a message before any question was asked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedEntities {
    values: HashMap<Slot, SlotValue>,
}

impl ExtractedEntities {
    pub fn insert(&mut self, slot: Slot, value: SlotValue) {
        self.values.insert(slot, value);
    }

    pub fn get(&self, slot: Slot) -> Option<&SlotValue> {
        self.values.get(&slot)
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.values.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Pluggable extraction and normalization.
pub trait EntityNormalizer: Send + Sync {
    /// Pull whatever slot values can be recognized from a first message.
    fn extract(&self, text: &str, ctx: &NormalizeContext<'_>) -> ExtractedEntities;

    /// Normalize an answer to one specific slot.
    ///
    /// Returns `DialogueError::Validation` when the answer cannot be used;
    /// the caller re-asks the same slot.
    fn normalize_slot(
        &self,
        slot: Slot,
        text: &str,
        ctx: &NormalizeContext<'_>,
    ) -> Result<SlotValue, DialogueError>;
}

// =============================================================================
// Rule-based implementation
// =============================================================================

/// Words that only announce a transaction and never belong in its note.
const TRANSACTION_FILLER: &[&str] = &[
    "catat",
    "catet",
    "tambah",
    "tambahin",
    "input",
    "pengeluaran",
    "pemasukan",
    "expense",
    "income",
    "keluar",
    "masuk",
    "abis",
    "habis",
    "buat",
    "untuk",
    "for",
    "tadi",
];

static PROJECT_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:project|projek|proyek)\s+(.+)").expect("Invalid project title regex")
});

static PROJECT_TITLE_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:deadline|dl|tanggal|tgl|besok|lusa|minggu|bulan|prioritas|priority|urgent|penting|santai|personal|pribadi|matkul|kuliah|course|link)\b",
    )
    .expect("Invalid project title stop regex")
});

/// Keyword, regex and synonym-table driven normalizer.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedNormalizer;

impl RuleBasedNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn extract_transaction(&self, text: &str, out: &mut ExtractedEntities) {
        if let Some(amount) = parse_amount(text) {
            out.insert(
                Slot::Amount,
                SlotValue::new(SlotData::Amount(amount), text).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        if let Some(category) = keywords::infer_category(text) {
            out.insert(
                Slot::Category,
                SlotValue::new(SlotData::Text(category.to_string()), category.as_str())
                    .with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        let residue = amount::strip_amounts(text);
        let note: Vec<&str> = residue
            .split_whitespace()
            .filter(|w| !TRANSACTION_FILLER.contains(w))
            .collect();
        let note = note.join(" ");
        if note.chars().count() >= 3 {
            out.insert(
                Slot::Note,
                SlotValue::text(note).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
    }

    fn extract_task(&self, text: &str, ctx: &NormalizeContext<'_>, out: &mut ExtractedEntities) {
        if let Some(found) = find_course(text, ctx.courses, ctx.synonyms) {
            out.insert(
                Slot::Course,
                course_value(&found, text).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        if let Some(date) = parse_date(text, ctx.today) {
            out.insert(
                Slot::Deadline,
                SlotValue::new(SlotData::Date(date), text).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        if let Some(task_type) = keywords::find_task_type(text) {
            out.insert(
                Slot::TaskType,
                SlotValue::text(task_type).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
    }

    fn extract_project(&self, text: &str, ctx: &NormalizeContext<'_>, out: &mut ExtractedEntities) {
        if let Some(caps) = PROJECT_TITLE.captures(text) {
            let rest = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let title = match PROJECT_TITLE_STOP.find(rest) {
                Some(stop) => &rest[..stop.start()],
                None => rest,
            };
            let title = title.trim().trim_end_matches([',', '.', '-']).trim();
            if !title.is_empty() {
                out.insert(
                    Slot::Project,
                    SlotValue::text(title).with_confidence(EXTRACTED_CONFIDENCE),
                );
            }
        }
        if let Some(project_type) = keywords::parse_project_type(text) {
            out.insert(
                Slot::ProjectType,
                SlotValue::text(project_type.to_string()).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        if let Some(priority) = keywords::parse_priority(text) {
            out.insert(
                Slot::Priority,
                SlotValue::text(priority.to_string()).with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        if date::mentions_date(text) {
            if let Some(date) = parse_date(text, ctx.today) {
                out.insert(
                    Slot::Deadline,
                    SlotValue::new(SlotData::Date(date), text)
                        .with_confidence(EXTRACTED_CONFIDENCE),
                );
            }
        }
    }

    fn extract_progress(&self, text: &str, ctx: &NormalizeContext<'_>, out: &mut ExtractedEntities) {
        let lower = text.to_lowercase();
        let project = ctx
            .projects
            .iter()
            .filter(|p| !p.title.is_empty() && lower.contains(&p.title.to_lowercase()))
            .max_by_key(|p| p.title.len());
        if let Some(project) = project {
            out.insert(Slot::Project, project_value(project, text));
        }
        if let Some(percent) = keywords::parse_percentage(text) {
            out.insert(
                Slot::Percentage,
                SlotValue::new(SlotData::Percent(percent), text)
                    .with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
        if let Some(minutes) = keywords::parse_duration(text) {
            out.insert(
                Slot::Duration,
                SlotValue::new(SlotData::Minutes(minutes), text)
                    .with_confidence(EXTRACTED_CONFIDENCE),
            );
        }
    }
}

impl EntityNormalizer for RuleBasedNormalizer {
    fn extract(&self, text: &str, ctx: &NormalizeContext<'_>) -> ExtractedEntities {
        let mut out = ExtractedEntities::default();
        match ctx.intent {
            Intent::AddExpense | Intent::AddIncome => self.extract_transaction(text, &mut out),
            Intent::CreateTask => self.extract_task(text, ctx, &mut out),
            Intent::CreateProject => self.extract_project(text, ctx, &mut out),
            Intent::LogProgress => self.extract_progress(text, ctx, &mut out),
            _ => {}
        }
        out
    }

    fn normalize_slot(
        &self,
        slot: Slot,
        text: &str,
        ctx: &NormalizeContext<'_>,
    ) -> Result<SlotValue, DialogueError> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(DialogueError::validation(slot, "Jawabannya masih kosong."));
        }

        match slot {
            Slot::Amount => parse_amount(raw)
                .map(|n| SlotValue::new(SlotData::Amount(n), raw))
                .ok_or_else(|| {
                    DialogueError::validation(slot, "Nominalnya nggak kebaca. Contoh: 50rb, 1.5jt, 25000.")
                }),
            Slot::Category => keywords::parse_category(raw)
                .map(|c: Category| SlotValue::new(SlotData::Text(c.to_string()), raw))
                .ok_or_else(|| DialogueError::validation(slot, "Pilih kategori dari tombol ya.")),
            Slot::Note | Slot::LinkTitle => Ok(SlotValue::text(raw)),
            Slot::Project if ctx.intent == Intent::LogProgress => {
                let lower = raw.to_lowercase();
                ctx.projects
                    .iter()
                    .find(|p| p.title.to_lowercase() == lower)
                    .or_else(|| {
                        ctx.projects
                            .iter()
                            .find(|p| p.title.to_lowercase().contains(&lower))
                    })
                    .or_else(|| ctx.projects.iter().find(|p| p.id.to_string() == raw))
                    .map(|p| project_value(p, raw).with_confidence(1.0))
                    .ok_or_else(|| {
                        DialogueError::validation(slot, "Project itu nggak ketemu. Coba ketik judulnya lagi.")
                    })
            }
            Slot::Project => Ok(SlotValue::text(raw)),
            Slot::Course => Ok(resolve_course_answer(raw, ctx)),
            Slot::Deadline => parse_date(raw, ctx.today)
                .map(|d| SlotValue::new(SlotData::Date(d), raw))
                .ok_or_else(|| {
                    DialogueError::validation(
                        slot,
                        "Tanggalnya nggak kebaca. Contoh: besok, lusa, jumat, 25 desember.",
                    )
                }),
            Slot::TaskType => Ok(SlotValue::text(keywords::normalize_task_type(raw)).with_raw(raw)),
            Slot::ProjectType => keywords::parse_project_type(raw)
                .map(|t| SlotValue::new(SlotData::Text(t.to_string()), raw))
                .ok_or_else(|| DialogueError::validation(slot, "Pilih personal atau course ya.")),
            Slot::Priority => keywords::parse_priority(raw)
                .map(|p| SlotValue::new(SlotData::Text(p.to_string()), raw))
                .ok_or_else(|| DialogueError::validation(slot, "Pilih Low, Medium, atau High.")),
            Slot::Link => {
                if keywords::looks_like_url(raw) {
                    Ok(SlotValue::text(raw))
                } else {
                    Err(DialogueError::validation(
                        slot,
                        "Itu bukan link. Kirim link (contoh: github.com/kamu/repo) atau ketik - untuk skip.",
                    ))
                }
            }
            Slot::AddMoreLinks => keywords::parse_more(raw)
                .map(|b| SlotValue::new(SlotData::Flag(b), raw))
                .ok_or_else(|| DialogueError::validation(slot, "Jawab ya atau tidak.")),
            Slot::Percentage => keywords::parse_percentage(raw)
                .map(|p| SlotValue::new(SlotData::Percent(p), raw))
                .ok_or_else(|| DialogueError::validation(slot, "Progress harus 0-100%. Contoh: 60%.")),
            Slot::Duration => keywords::parse_duration(raw)
                .map(|m| SlotValue::new(SlotData::Minutes(m), raw))
                .ok_or_else(|| {
                    DialogueError::validation(slot, "Durasinya nggak kebaca. Contoh: 2 jam, 45 menit.")
                }),
        }
    }
}

/// Course answer. A miss keeps the raw text and carries no identifier.
fn resolve_course_answer(raw: &str, ctx: &NormalizeContext<'_>) -> SlotValue {
    match lookup_course(raw, ctx) {
        Ok(found) => course_value(&found, raw),
        Err(e) => {
            warn!(error = %e, "Course resolution missed, keeping raw text");
            SlotValue::text(raw).missed()
        }
    }
}

fn lookup_course(raw: &str, ctx: &NormalizeContext<'_>) -> Result<CourseMatch, DialogueError> {
    find_course(raw, ctx.courses, ctx.synonyms)
        .ok_or_else(|| DialogueError::ResolutionMiss(raw.to_string()))
}

fn course_value(found: &CourseMatch, raw: &str) -> SlotValue {
    SlotValue::new(SlotData::Text(found.course.name.clone()), raw).resolved(found.course.id.clone())
}

fn project_value(project: &CachedProject, raw: &str) -> SlotValue {
    SlotValue::new(SlotData::Text(project.title.clone()), raw)
        .with_confidence(EXTRACTED_CONFIDENCE)
        .resolved(Some(project.id.to_string()))
}
