//! Questions, keyboards and fixed replies.
//!
//! Button payloads follow `nlp_<slot>_<value>`; `project_type` uses
//! `nlp_proj_<value>` and `add_more_links` uses `nlp_addlink_<yes|no>`.

use crate::normalizer::SynonymTable;
use crate::types::{Button, Category, Intent, OutboundMessage, PendingRequest, Slot};

pub const CANCELLED_TEXT: &str = "Okee, dibatalin yaa 👌";
pub const EXPIRED_TEXT: &str = "⏳ Sesi udah habis atau nggak ketemu. Ketik ulang permintaannya ya.";
pub const OFFLINE_NOTICE: &str = "☁️ Tersimpan di cloud (desktop offline)";
pub const APOLOGY_TEXT: &str = "Maaf, ada yang error. Coba lagi ya.";
pub const FALLBACK_TEXT: &str =
    "Hmm, aku belum terlalu paham nih~ Coba ketik \"bantuan\" buat lihat contoh yaa";
pub const CONFIRM_HINT: &str = "Jawab *ya* buat simpan atau *tidak* buat batal.";
pub const NOT_FOUND_TEXT: &str = "🤔 Datanya nggak ketemu. Mungkin udah dihapus?";

const TASK_TYPES: [&str; 4] = [
    "Tugas",
    "Laporan Pendahuluan",
    "Laporan Sementara",
    "Laporan Resmi",
];

pub fn too_long_text(limit: usize) -> String {
    format!("Pesannya kepanjangan 😅 Maksimal {} karakter ya.", limit)
}

/// Question text for a slot.
pub fn question(slot: Slot, intent: Intent, has_links: bool) -> &'static str {
    match slot {
        Slot::Amount => "Berapa nominalnya? 💵",
        Slot::Category => "Kategorinya apa?",
        Slot::Note => match intent {
            Intent::AddExpense => "Beli apa? 🛒 (ketik - kalau nggak ada)",
            Intent::AddIncome => "Dari mana? 💰 (ketik - kalau nggak ada)",
            Intent::CreateTask => "Ada catatan/deskripsi? 📝",
            Intent::CreateProject => "Deskripsi projectnya? 📋 (ketik - kalau nggak ada)",
            Intent::LogProgress => "Keterangannya apa? (wajib)",
            _ => "Ada note ga?",
        },
        Slot::Course => "Buat matkul apa? 📚",
        Slot::Deadline => "Deadlinenya kapan? 📅",
        Slot::TaskType => "Jenis tugasnya apa?",
        Slot::Project if intent == Intent::LogProgress => "Mau log progress project mana?",
        Slot::Project => "Apa nama projectnya? 📝",
        Slot::ProjectType => "Tipe projectnya apa?",
        Slot::Priority => "Prioritasnya?",
        Slot::Link if has_links => "Mana link nya? 🔗",
        Slot::Link => "Ada link/material ga? 🔗 (ketik - atau skip kalau ga ada)",
        Slot::LinkTitle => "Apa judul linknya?",
        Slot::AddMoreLinks => "Ada link lagi?",
        Slot::Percentage => "Mau update progress ke berapa persen?",
        Slot::Duration => "Berapa lama kerjanya? ⏱️",
    }
}

fn slot_button(slot: Slot, label: impl Into<String>, value: &str) -> Button {
    Button::new(label, format!("nlp_{}_{}", slot, value))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Buttons for a slot; empty when it is answered by typing.
pub fn keyboard(slot: Slot, intent: Intent, synonyms: &SynonymTable) -> Vec<Vec<Button>> {
    match slot {
        Slot::Category => {
            let choices: &[Category] = if intent == Intent::AddIncome {
                &Category::INCOME_CHOICES
            } else {
                &Category::EXPENSE_CHOICES
            };
            choices
                .chunks(2)
                .map(|row| {
                    row.iter()
                        .map(|c| slot_button(slot, c.as_str(), c.as_str()))
                        .collect()
                })
                .collect()
        }
        Slot::Priority => vec![["Low", "Medium", "High"]
            .iter()
            .map(|p| slot_button(slot, *p, p))
            .collect()],
        Slot::ProjectType => vec![vec![
            Button::new("👤 Personal", "nlp_proj_personal"),
            Button::new("🏫 Matkul", "nlp_proj_course"),
        ]],
        Slot::AddMoreLinks => vec![vec![
            Button::new("✅ Ya", "nlp_addlink_yes"),
            Button::new("❌ Tidak", "nlp_addlink_no"),
        ]],
        Slot::Course => synonyms
            .entries()
            .chunks(2)
            .map(|row| {
                row.iter()
                    .map(|entry| slot_button(slot, title_case(&entry.keyword), &entry.keyword))
                    .collect()
            })
            .collect(),
        Slot::TaskType => TASK_TYPES
            .chunks(2)
            .map(|row| row.iter().map(|t| slot_button(slot, *t, t)).collect())
            .collect(),
        _ => Vec::new(),
    }
}

/// The question for `slot` with its buttons and a cancel row.
pub fn slot_prompt(request: &PendingRequest, slot: Slot, synonyms: &SynonymTable) -> OutboundMessage {
    let intent = request.intent();
    let mut rows = keyboard(slot, intent, synonyms);
    rows.push(vec![Button::new("❌ Batal", "nlp_cancel")]);
    OutboundMessage::text(question(slot, intent, !request.links().is_empty())).with_keyboard(rows)
}

/// A summary with accept and reject buttons.
pub fn confirmation(summary: impl Into<String>) -> OutboundMessage {
    OutboundMessage::text(summary).with_keyboard(vec![vec![
        Button::new("✅ Ya", "nlp_confirm_yes"),
        Button::new("❌ Batal", "nlp_confirm_no"),
    ]])
}

/// A validation problem, shown above the repeated question.
pub fn guidance(reason: &str) -> String {
    format!("⚠️ {}", reason)
}

/// Put a line above a message, keeping its buttons.
pub fn with_prefix(prefix: &str, mut message: OutboundMessage) -> OutboundMessage {
    message.text = format!("{}\n\n{}", prefix, message.text);
    message
}
