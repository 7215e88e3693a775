//! Mid-flow edit detection.
//!
//! An edit needs a trigger word (`ganti`, `ubah`, `bukan`, ...), a field
//! keyword naming the slot, and a value that looks right for that slot.
//! `ganti harganya jadi 22rb` is an edit of `amount`; `salah` on its own is
//! not.

use regex::Regex;
use std::sync::LazyLock;

use crate::normalizer::amount::has_amount;
use crate::normalizer::date::mentions_date;
use crate::normalizer::keywords::{contains_word, parse_category, parse_priority};
use crate::types::{Intent, Slot, TransactionKind};

const TRIGGERS: &[&str] = &["ganti", "ubah", "koreksi", "bukan", "salah", "edit", "change"];

/// Field keywords per slot. Suffixed forms (`harganya`) are covered by the regex.
const FIELDS: &[(Slot, &[&str])] = &[
    (Slot::Amount, &["harga", "nominal", "jumlah", "amount", "price", "duit"]),
    (Slot::Deadline, &["deadline", "tanggal", "tgl", "waktu", "due"]),
    (Slot::Note, &["note", "catatan", "keterangan", "deskripsi", "desc"]),
    (Slot::Category, &["kategori", "category"]),
    (Slot::Priority, &["prioritas", "priority"]),
    (Slot::Course, &["matkul", "mata kuliah"]),
    (Slot::TaskType, &["tipe", "jenis"]),
    (Slot::Project, &["judul", "nama project", "title"]),
    (Slot::Percentage, &["persen", "persentase", "progress"]),
    (Slot::Duration, &["durasi", "lama"]),
];

/// Separator between the field and the new value.
static VALUE_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:jadi|menjadi|ke|tapi|harusnya|seharusnya)\b\s*[:=]?\s*(.+)$")
        .expect("Invalid edit value regex")
});

/// A recognized correction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditCommand {
    /// Overwrite `slot` with the normalized form of `value`.
    Slot { slot: Slot, value: String },
    /// Switch a transaction between expense and income.
    SwitchKind(TransactionKind),
}

fn has_trigger(lower: &str) -> bool {
    TRIGGERS.iter().any(|t| contains_word(lower, t))
}

/// Whether `word` appears as a word, optionally with an `-nya` suffix.
fn mentions_field(lower: &str, word: &str) -> bool {
    contains_word(lower, word) || contains_word(lower, &format!("{}nya", word))
}

fn field_in(lower: &str) -> Option<Slot> {
    FIELDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| mentions_field(lower, w)))
        .map(|(slot, _)| *slot)
}

/// The new value: text after `jadi`/`ke`/..., or after the field keyword.
fn value_in(text: &str, lower: &str, slot: Option<Slot>) -> Option<String> {
    if let Some(caps) = VALUE_AFTER.captures(text) {
        let value = caps.get(1)?.as_str().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    let slot = slot?;
    let words = FIELDS.iter().find(|(s, _)| *s == slot)?.1;
    let end = words
        .iter()
        .flat_map(|w| [format!("{}nya", w), w.to_string()])
        .filter_map(|w| lower.find(&w).map(|i| i + w.len()))
        .max()?;
    let value = text.get(end..)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether `value` has the shape the slot needs.
fn value_fits(slot: Slot, value: &str) -> bool {
    match slot {
        Slot::Amount => has_amount(value),
        Slot::Deadline => mentions_date(value),
        Slot::Category => parse_category(value).is_some(),
        Slot::Priority => parse_priority(value).is_some(),
        _ => true,
    }
}

/// Detect a correction in a message sent while a request is pending.
pub fn detect_edit(text: &str, intent: Intent) -> Option<EditCommand> {
    let lower = text.to_lowercase();
    if !has_trigger(&lower) {
        return None;
    }

    if intent.is_transaction() && field_in(&lower).is_none() {
        let income = ["pemasukan", "income"].iter().any(|w| contains_word(&lower, w));
        let expense = ["pengeluaran", "expense"].iter().any(|w| contains_word(&lower, w));
        match (income, expense) {
            (true, false) => return Some(EditCommand::SwitchKind(TransactionKind::Income)),
            (false, true) => return Some(EditCommand::SwitchKind(TransactionKind::Expense)),
            _ => {}
        }
    }

    let field = field_in(&lower);
    let value = value_in(text, &lower, field)?;

    let slot = match field {
        Some(slot) => slot,
        // "bukan food tapi transport"
        None if parse_category(&value).is_some() && intent.is_transaction() => Slot::Category,
        None if parse_priority(&value).is_some() && intent == Intent::CreateProject => {
            Slot::Priority
        }
        None => return None,
    };

    value_fits(slot, &value).then_some(EditCommand::Slot { slot, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_edit(slot: Slot, value: &str) -> Option<EditCommand> {
        Some(EditCommand::Slot {
            slot,
            value: value.to_string(),
        })
    }

    #[test]
    fn test_amount_edit() {
        assert_eq!(
            detect_edit("ganti harganya jadi 22rb", Intent::AddExpense),
            slot_edit(Slot::Amount, "22rb")
        );
        assert_eq!(
            detect_edit("ubah nominal 15000", Intent::AddExpense),
            slot_edit(Slot::Amount, "15000")
        );
    }

    #[test]
    fn test_amount_edit_needs_amount_value() {
        assert_eq!(detect_edit("ganti harganya jadi murah", Intent::AddExpense), None);
    }

    #[test]
    fn test_deadline_edit() {
        assert_eq!(
            detect_edit("deadline ubah ke jumat", Intent::CreateTask),
            slot_edit(Slot::Deadline, "jumat")
        );
    }

    #[test]
    fn test_note_edit() {
        assert_eq!(
            detect_edit("ganti catatan jadi kopi susu", Intent::AddExpense),
            slot_edit(Slot::Note, "kopi susu")
        );
    }

    #[test]
    fn test_category_without_field_keyword() {
        assert_eq!(
            detect_edit("bukan food tapi transport", Intent::AddExpense),
            slot_edit(Slot::Category, "transport")
        );
    }

    #[test]
    fn test_kind_switch() {
        assert_eq!(
            detect_edit("salah, ini pemasukan", Intent::AddExpense),
            Some(EditCommand::SwitchKind(TransactionKind::Income))
        );
        assert_eq!(detect_edit("salah, ini pemasukan", Intent::CreateTask), None);
    }

    #[test]
    fn test_plain_answers_are_not_edits() {
        assert_eq!(detect_edit("beli kopi", Intent::AddExpense), None);
        assert_eq!(detect_edit("deadline besok", Intent::CreateTask), None);
        assert_eq!(detect_edit("salah", Intent::AddExpense), None);
    }
}
