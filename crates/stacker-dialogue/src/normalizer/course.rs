//! Fuzzy course-name resolution against the user's course list and a
//! keyword/synonym table.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::keywords::contains_word;
use crate::error::DialogueError;

/// A course as the local cache knows it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// `None` for a course inferred from the synonym table alone.
    pub id: Option<String>,
    pub name: String,
}

impl Course {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }
}

/// One record of the synonym source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Deserialize)]
struct SynonymFile {
    #[serde(default)]
    keywords: Vec<KeywordEntry>,
}

/// Immutable synonym → canonical keyword table, loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct SynonymTable {
    entries: Vec<KeywordEntry>,
    /// Lower-cased synonym (and keyword) → canonical keyword.
    by_key: HashMap<String, String>,
    /// Normalized key → canonical keyword.
    by_normalized: HashMap<String, String>,
    /// Keys sorted longest first for substring scanning.
    scan_order: Vec<String>,
}

impl SynonymTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<KeywordEntry>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_normalized = HashMap::new();

        for entry in &entries {
            let keyword = entry.keyword.trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }
            let keys = std::iter::once(keyword.clone())
                .chain(entry.synonyms.iter().map(|s| s.trim().to_lowercase()))
                .filter(|k| !k.is_empty());
            for key in keys {
                by_normalized
                    .entry(normalize(&key))
                    .or_insert_with(|| keyword.clone());
                by_key.entry(key).or_insert_with(|| keyword.clone());
            }
        }

        let mut scan_order: Vec<String> = by_key.keys().cloned().collect();
        scan_order.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self {
            entries,
            by_key,
            by_normalized,
            scan_order,
        }
    }

    /// Parse the `{"keywords": [{"keyword": .., "synonyms": [..]}]}` format.
    pub fn from_json(json: &str) -> Result<Self, DialogueError> {
        let file: SynonymFile = serde_json::from_str(json)?;
        Ok(Self::from_entries(file.keywords))
    }

    /// Load from disk. A missing or malformed file yields an empty table.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Synonym file unavailable, course synonyms disabled");
                return Self::empty();
            }
        };
        match Self::from_json(&content) {
            Ok(table) => {
                info!(path = %path.display(), keywords = table.entries.len(), "Synonym table loaded");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Synonym file malformed, course synonyms disabled");
                Self::empty()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical keywords in file order, used for course buttons.
    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    /// Canonical keyword for an exact synonym.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        let key = collapse_whitespace(&text.to_lowercase());
        self.by_key
            .get(&key)
            .or_else(|| self.by_normalized.get(&normalize(&key)))
            .map(String::as_str)
    }

    /// Longest synonym key occurring in `text`. Keys shorter than four
    /// characters must stand as whole words.
    pub fn scan(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.scan_order
            .iter()
            .find(|key| {
                if key.chars().count() < 4 {
                    contains_word(&lower, key)
                } else {
                    lower.contains(key.as_str())
                }
            })
            .and_then(|key| self.by_key.get(key))
            .map(String::as_str)
    }

    fn synonyms_of(&self, keyword: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.keyword.trim().eq_ignore_ascii_case(keyword))
            .flat_map(|e| e.synonyms.iter().map(String::as_str))
            .collect()
    }
}

/// How a course was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    SynonymExact,
    SynonymScan,
    NameExact,
    NameContained,
    Acronym,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CourseMatch {
    pub course: Course,
    pub kind: MatchKind,
}

/// Words ignored when building the short acronym of a course name.
const ACRONYM_STOP_WORDS: &[&str] = &["dan", "and", "lab", "workshop", "praktikum", "of", "the"];

/// Resolve `text` to a course. First match wins:
///
/// 1. whole text is a known synonym
/// 2. a synonym occurs inside the text (longest first)
/// 3. normalized text equals a course name
/// 4. a full course name occurs inside the text
/// 5. the whole text is a course acronym
pub fn find_course(text: &str, courses: &[Course], synonyms: &SynonymTable) -> Option<CourseMatch> {
    let query = normalize(text);
    if query.is_empty() {
        return None;
    }

    if let Some(keyword) = synonyms.lookup(text) {
        return Some(CourseMatch {
            course: course_for_keyword(keyword, courses, synonyms),
            kind: MatchKind::SynonymExact,
        });
    }

    if let Some(keyword) = synonyms.scan(text) {
        return Some(CourseMatch {
            course: course_for_keyword(keyword, courses, synonyms),
            kind: MatchKind::SynonymScan,
        });
    }

    if let Some(course) = courses.iter().find(|c| normalize(&c.name) == query) {
        return Some(CourseMatch {
            course: course.clone(),
            kind: MatchKind::NameExact,
        });
    }

    let contained = courses
        .iter()
        .filter(|c| {
            let name = normalize(&c.name);
            name.len() >= 3 && query.contains(&name)
        })
        .max_by_key(|c| normalize(&c.name).len());
    if let Some(course) = contained {
        return Some(CourseMatch {
            course: course.clone(),
            kind: MatchKind::NameContained,
        });
    }

    // Whole query only. Single words of a sentence ("di", "ke") would
    // collide with two-letter acronyms.
    for course in courses {
        let (full, short) = acronyms(&course.name);
        let hit = (full.len() >= 2 && query == full) || (short.len() >= 2 && query == short);
        if hit {
            return Some(CourseMatch {
                course: course.clone(),
                kind: MatchKind::Acronym,
            });
        }
    }

    None
}

/// Map a canonical keyword to a course from the list.
///
/// Tries the keyword and then each synonym against every course: equality,
/// containment, then abbreviation. With no match, a course named after the
/// keyword and carrying no id is returned.
fn course_for_keyword(keyword: &str, courses: &[Course], synonyms: &SynonymTable) -> Course {
    let terms: Vec<String> = std::iter::once(keyword)
        .chain(synonyms.synonyms_of(keyword))
        .map(normalize)
        .filter(|t| !t.is_empty())
        .collect();
    let names: Vec<(usize, String)> = courses
        .iter()
        .enumerate()
        .map(|(i, c)| (i, normalize(&c.name)))
        .collect();

    let passes: [fn(&str, &str) -> bool; 3] = [same_name, overlapping_name, abbreviated_name];

    for pass in passes {
        for term in &terms {
            if let Some((i, _)) = names.iter().find(|(_, name)| pass(term, name)) {
                return courses[*i].clone();
            }
        }
    }

    debug!(keyword, "Synonym matched but no course in the list, using keyword");
    Course {
        id: None,
        name: keyword.to_string(),
    }
}

fn same_name(term: &str, name: &str) -> bool {
    term == name
}

fn overlapping_name(term: &str, name: &str) -> bool {
    (term.len() >= 3 && name.contains(term)) || (name.len() >= 3 && term.contains(name))
}

fn abbreviated_name(term: &str, name: &str) -> bool {
    term.len() >= 4 && is_abbreviation(term, name)
}

/// `pemweb` abbreviates `pemrogramanweb`: same first letter, letters in order.
fn is_abbreviation(term: &str, name: &str) -> bool {
    let mut term_chars = term.chars();
    let Some(first) = term_chars.next() else {
        return false;
    };
    if !name.starts_with(first) {
        return false;
    }
    let mut rest = name.chars().skip(1);
    term_chars.all(|c| rest.any(|n| n == c))
}

/// Initials of every word, and initials without stop words.
fn acronyms(name: &str) -> (String, String) {
    let words: Vec<String> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let full = initials(words.iter());
    let short = initials(
        words
            .iter()
            .filter(|w| !ACRONYM_STOP_WORDS.contains(&w.as_str())),
    );
    (full, short)
}

fn initials<'a>(words: impl Iterator<Item = &'a String>) -> String {
    words.filter_map(|w| w.chars().next()).collect()
}

/// Lower-case and strip everything that is not a letter or digit.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
