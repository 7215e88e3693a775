//! Read-only intents and list item actions.
//!
//! Balance, paginated transaction history, task and project lists, help and
//! greeting are answered straight from the cached snapshot without a
//! pending request. Deleting a listed transaction and changing a listed
//! task's status build events the same way a confirmed request does.

use std::fmt;

use serde_json::json;
use stacker_core::events::{DomainEvent, EventType};
use stacker_core::types::UserId;
use uuid::Uuid;

use crate::cache::{CacheMutation, CachedTask, CachedTransaction, UserSnapshot};
use crate::error::DialogueError;
use crate::intent::{Execution, ExecutionContext};
use crate::normalizer::amount::format_rupiah;
use crate::normalizer::date::format_human;
use crate::normalizer::keywords::{contains_word, format_minutes};
use crate::types::{Button, Intent, OutboundMessage, TaskStatus, TransactionKind};

/// How a transaction page is presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListMode {
    #[default]
    View,
    Edit,
    Delete,
}

impl ListMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListMode::View => "view",
            ListMode::Edit => "edit",
            ListMode::Delete => "delete",
        }
    }

    /// Unknown modes fall back to viewing.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "edit" => ListMode::Edit,
            "delete" => ListMode::Delete,
            _ => ListMode::View,
        }
    }

    /// Mode requested by a chat message such as `hapus transaksi`.
    pub fn from_message(text: &str) -> Self {
        let lower = text.to_lowercase();
        if contains_word(&lower, "hapus") || contains_word(&lower, "delete") {
            ListMode::Delete
        } else if ["edit", "ubah", "ganti"].iter().any(|w| contains_word(&lower, w)) {
            ListMode::Edit
        } else {
            ListMode::View
        }
    }
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buttons per row for numbered transaction picks.
const PICK_ROW: usize = 5;
/// At most this many tasks get an edit button.
const TASK_BUTTONS: usize = 10;

pub const HELP_TEXT: &str = "🤖 *Stacker Bot*\n\n\
Ngobrol aja kayak biasa, contoh:\n\
• `beli kopi 25rb` - catat pengeluaran\n\
• `gajian 5jt` - catat pemasukan\n\
• `tugas database deadline besok` - tambah tugas\n\
• `buat project Portfolio` - bikin project\n\
• `catat progress skripsi 60% 2 jam` - log progress\n\
• `cek saldo`, `lihat transaksi`, `lihat tugas`, `lihat project`\n\n\
Ketik `batal` kapan aja buat membatalkan.";

/// Renders answers for the read-only intents.
#[derive(Clone, Debug)]
pub struct QueryResponder {
    per_page: usize,
}

impl Default for QueryResponder {
    fn default() -> Self {
        Self::new(5)
    }
}

impl QueryResponder {
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    /// Answer a read-only intent detected from `text`.
    pub fn respond(&self, intent: Intent, text: &str, snapshot: &UserSnapshot) -> OutboundMessage {
        match intent {
            Intent::CheckBalance => self.balance(snapshot),
            Intent::ListTransactions => {
                self.transactions_page(snapshot, 1, ListMode::from_message(text))
            }
            Intent::ListTasks => self.tasks(snapshot),
            Intent::ListProjects => self.projects(snapshot),
            Intent::Greeting => OutboundMessage::text(
                "Halo! 👋 Mau catat apa hari ini? Ketik /help buat lihat contoh.",
            ),
            _ => OutboundMessage::text(HELP_TEXT),
        }
    }

    pub fn balance(&self, snapshot: &UserSnapshot) -> OutboundMessage {
        OutboundMessage::text(format!(
            "💳 Saldo kamu sekarang: *{}*",
            format_rupiah(snapshot.current_balance)
        ))
        .with_keyboard(vec![vec![Button::new("📜 Lihat Riwayat", "list_tx_page_1")]])
    }

    pub fn page_count(&self, snapshot: &UserSnapshot) -> usize {
        snapshot.transactions.len().div_ceil(self.per_page).max(1)
    }

    /// One page (1-based, clamped) of the transaction history, newest first.
    pub fn transactions_page(
        &self,
        snapshot: &UserSnapshot,
        page: usize,
        mode: ListMode,
    ) -> OutboundMessage {
        if snapshot.transactions.is_empty() {
            return OutboundMessage::text("📭 Belum ada transaksi.");
        }

        let pages = self.page_count(snapshot);
        let page = page.clamp(1, pages);
        let start = (page - 1) * self.per_page;

        let title = match mode {
            ListMode::View => "💰 *Riwayat Transaksi*",
            ListMode::Edit => "✏️ *Edit Transaksi* (pilih nomor)",
            ListMode::Delete => "🗑️ *Hapus Transaksi* (pilih nomor)",
        };
        let mut text = format!("{} ({}/{})\n\n", title, page, pages);
        let mut picks = Vec::new();

        for (offset, tx) in snapshot
            .transactions
            .iter()
            .skip(start)
            .take(self.per_page)
            .enumerate()
        {
            let number = start + offset + 1;
            if mode != ListMode::View {
                text.push_str(&format!("*{}.* ", number));
                let prefix = if mode == ListMode::Delete { "del_tx_" } else { "edit_tx_" };
                picks.push(Button::new(number.to_string(), format!("{}{}", prefix, tx.id)));
            }
            text.push_str(&transaction_line(tx));
        }

        if mode == ListMode::View {
            text.push_str(&format!(
                "💳 *Saldo Akhir:* {}",
                format_rupiah(snapshot.current_balance)
            ));
        }

        let mut keyboard: Vec<Vec<Button>> =
            picks.chunks(PICK_ROW).map(|row| row.to_vec()).collect();

        let suffix = match mode {
            ListMode::View => String::new(),
            other => format!("_mode={}", other),
        };
        let mut nav = Vec::new();
        if page > 1 {
            nav.push(Button::new("⬅️ Prev", format!("list_tx_page_{}{}", page - 1, suffix)));
        }
        if page < pages {
            nav.push(Button::new("Next ➡️", format!("list_tx_page_{}{}", page + 1, suffix)));
        }
        if !nav.is_empty() {
            keyboard.push(nav);
        }
        if mode != ListMode::View {
            keyboard.push(vec![Button::new("❌ Batal / Selesai", "cancel_tx_action")]);
        }

        OutboundMessage::text(text).with_keyboard(keyboard)
    }

    /// Detail of one transaction with a delete option.
    pub fn transaction_detail(&self, tx: &CachedTransaction) -> OutboundMessage {
        OutboundMessage::text(format!("✏️ *Detail Transaksi*\n\n{}", transaction_line(tx)))
            .with_keyboard(vec![
                vec![Button::new("🗑️ Hapus", format!("del_tx_{}", tx.id))],
                vec![Button::new("❌ Batal", "cancel_tx_action")],
            ])
    }

    /// Ask before deleting a transaction.
    pub fn delete_prompt(&self, tx: &CachedTransaction) -> OutboundMessage {
        let kind = match tx.kind {
            TransactionKind::Income => "Pemasukan",
            TransactionKind::Expense => "Pengeluaran",
        };
        let note = if tx.note.is_empty() { tx.category.as_str() } else { tx.note.as_str() };
        OutboundMessage::text(format!(
            "⚠️ *Konfirmasi Hapus*\n\nJenis: {}\nNominal: {}\nCatatan: {}\n\nYakin mau dihapus permanen?",
            kind,
            format_rupiah(tx.amount),
            note
        ))
        .with_keyboard(vec![
            vec![Button::new("✅ Ya, Hapus", format!("confirm_del_tx_{}", tx.id))],
            vec![Button::new("❌ Batal", "cancel_tx_action")],
        ])
    }

    /// Open tasks, nearest deadline first, each with a status button.
    pub fn tasks(&self, snapshot: &UserSnapshot) -> OutboundMessage {
        let mut open: Vec<&CachedTask> = snapshot
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .collect();
        if open.is_empty() {
            return OutboundMessage::text("🎉 Nggak ada tugas yang pending. Santai dulu!");
        }
        open.sort_by_key(|t| t.deadline);

        let mut text = String::from("📚 *Tugas Kamu*\n\n");
        for task in &open {
            text.push_str(&format!(
                "• [{}] {} - {} ({})\n",
                task.course,
                task.task_type,
                format_human(task.deadline),
                task.status
            ));
        }
        let keyboard = open
            .iter()
            .take(TASK_BUTTONS)
            .map(|t| {
                vec![Button::new(
                    format!("✏️ {} {}", t.task_type, t.course),
                    format!("EDIT_TASK:{}", t.id),
                )]
            })
            .collect();
        OutboundMessage::text(text).with_keyboard(keyboard)
    }

    /// Status choices for one task.
    pub fn task_status_menu(&self, task: &CachedTask) -> OutboundMessage {
        OutboundMessage::text(format!(
            "📝 *{}*\nStatus sekarang: {}\n\nPilih status baru:",
            task.title, task.status
        ))
        .with_keyboard(vec![
            vec![Button::new("⬜ To Do", format!("SET_STATUS:{}:pending", task.id))],
            vec![Button::new("⏳ In Progress", format!("SET_STATUS:{}:in-progress", task.id))],
            vec![Button::new("✅ Done", format!("SET_STATUS:{}:completed", task.id))],
            vec![Button::new("🔙 Batal", "CANCEL_EDIT")],
        ])
    }

    /// Projects with a progress button each.
    pub fn projects(&self, snapshot: &UserSnapshot) -> OutboundMessage {
        if snapshot.projects.is_empty() {
            return OutboundMessage::text("📭 Belum ada project. Coba `buat project <judul>`.");
        }
        let mut text = String::from("🚀 *Project Kamu*\n\n");
        for project in &snapshot.projects {
            text.push_str(&format!(
                "• {} - {}% ({})\n",
                project.title,
                project.progress,
                format_minutes(project.total_minutes)
            ));
        }
        let keyboard = snapshot
            .projects
            .iter()
            .map(|p| {
                vec![Button::new(
                    format!("📈 Log {}", p.title),
                    format!("nlp_progress_{}", p.id),
                )]
            })
            .collect();
        OutboundMessage::text(text).with_keyboard(keyboard)
    }
}

fn transaction_line(tx: &CachedTransaction) -> String {
    let (icon, sign) = match tx.kind {
        TransactionKind::Income => ("🟢", "+"),
        TransactionKind::Expense => ("🔴", "-"),
    };
    let note = if tx.note.is_empty() { "-" } else { tx.note.as_str() };
    format!(
        "{} *{}{}* ({})\n   {} • _{}_\n\n",
        icon,
        sign,
        format_rupiah(tx.amount),
        tx.category,
        note,
        format_human(tx.date)
    )
}

// =============================================================================
// Item actions
// =============================================================================

/// Delete a cached transaction, reversing its balance effect.
pub fn delete_transaction(
    snapshot: &UserSnapshot,
    id: Uuid,
    user: &UserId,
    ctx: &ExecutionContext,
) -> Result<Execution, DialogueError> {
    let tx = snapshot
        .transaction(id)
        .ok_or_else(|| DialogueError::ResolutionMiss(format!("transaction {}", id)))?;

    let event = DomainEvent::new(
        EventType::TransactionDeleted,
        user.clone(),
        json!({ "id": id }),
        ctx.source.clone(),
    );
    let note = if tx.note.is_empty() { tx.category.as_str() } else { tx.note.as_str() };

    Ok(Execution {
        event,
        mutations: vec![
            CacheMutation::AdjustBalance(-tx.signed_amount()),
            CacheMutation::RemoveTransaction(id),
        ],
        success_text: format!(
            "✅ Transaksi dihapus!\nNominal: {}\nNote: {}",
            format_rupiah(tx.amount),
            note
        ),
    })
}

/// Change a cached task's status.
pub fn set_task_status(
    snapshot: &UserSnapshot,
    id: Uuid,
    status: TaskStatus,
    user: &UserId,
    ctx: &ExecutionContext,
) -> Result<Execution, DialogueError> {
    let task = snapshot
        .task(id)
        .ok_or_else(|| DialogueError::ResolutionMiss(format!("task {}", id)))?;

    let event = DomainEvent::new(
        EventType::TaskUpdated,
        user.clone(),
        json!({
            "id": id,
            "status": status,
            "updatedAt": chrono::Utc::now().to_rfc3339(),
        }),
        ctx.source.clone(),
    );
    let label = match status {
        TaskStatus::Pending => "To Do",
        TaskStatus::InProgress => "In Progress",
        TaskStatus::Completed => "Done",
    };

    Ok(Execution {
        event,
        mutations: vec![CacheMutation::SetTaskStatus { task_id: id, status }],
        success_text: format!("✅ Status {} diubah ke *{}*", task.title, label),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedProject;
    use crate::types::Category;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn snapshot(count: usize) -> UserSnapshot {
        let transactions = (0..count)
            .map(|i| CachedTransaction {
                id: Uuid::new_v4(),
                kind: TransactionKind::Expense,
                amount: 1_000 * (i as i64 + 1),
                category: Category::Food,
                note: format!("item {}", i + 1),
                date: day(15),
            })
            .collect();
        UserSnapshot {
            current_balance: 100_000,
            transactions,
            ..Default::default()
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            today: day(15),
            source: "telegram".to_string(),
        }
    }

    #[test]
    fn test_list_mode_parsing() {
        assert_eq!(ListMode::parse("delete"), ListMode::Delete);
        assert_eq!(ListMode::parse("weird"), ListMode::View);
        assert_eq!(ListMode::from_message("hapus transaksi"), ListMode::Delete);
        assert_eq!(ListMode::from_message("edit transaksi"), ListMode::Edit);
        assert_eq!(ListMode::from_message("lihat transaksi"), ListMode::View);
    }

    #[test]
    fn test_first_page_has_next_only() {
        let responder = QueryResponder::new(5);
        let msg = responder.transactions_page(&snapshot(12), 1, ListMode::View);
        assert!(msg.text.contains("(1/3)"));
        assert!(msg.text.contains("item 5"));
        assert!(!msg.text.contains("item 6"));
        assert_eq!(msg.payloads(), vec!["list_tx_page_2"]);
    }

    #[test]
    fn test_delete_mode_page_buttons() {
        let responder = QueryResponder::new(5);
        let snap = snapshot(7);
        let msg = responder.transactions_page(&snap, 2, ListMode::Delete);
        let payloads = msg.payloads();
        assert_eq!(payloads[0], format!("del_tx_{}", snap.transactions[5].id));
        assert!(payloads.contains(&"list_tx_page_1_mode=delete"));
        assert_eq!(payloads.last(), Some(&"cancel_tx_action"));
    }

    #[test]
    fn test_page_is_clamped() {
        let responder = QueryResponder::new(5);
        let msg = responder.transactions_page(&snapshot(3), 9, ListMode::View);
        assert!(msg.text.contains("(1/1)"));
        assert!(msg.keyboard.is_empty());
    }

    #[test]
    fn test_tasks_sorted_with_edit_buttons() {
        let task = |d: u32, status: TaskStatus| CachedTask {
            id: Uuid::new_v4(),
            title: "Tugas".into(),
            course: format!("C{}", d),
            course_id: None,
            task_type: "Tugas".into(),
            deadline: day(d),
            status,
            note: None,
        };
        let snap = UserSnapshot {
            tasks: vec![
                task(20, TaskStatus::Pending),
                task(16, TaskStatus::InProgress),
                task(17, TaskStatus::Completed),
            ],
            ..Default::default()
        };
        let msg = QueryResponder::default().tasks(&snap);
        let payloads = msg.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], format!("EDIT_TASK:{}", snap.tasks[1].id));
        assert!(!msg.text.contains("C17"));
    }

    #[test]
    fn test_projects_have_progress_buttons() {
        let project = CachedProject::new("Skripsi");
        let snap = UserSnapshot {
            projects: vec![project.clone()],
            ..Default::default()
        };
        let msg = QueryResponder::default().projects(&snap);
        assert_eq!(msg.payloads(), vec![format!("nlp_progress_{}", project.id)]);
    }

    #[test]
    fn test_delete_transaction_reverses_balance() {
        let snap = snapshot(2);
        let target = snap.transactions[1].clone();
        let done =
            delete_transaction(&snap, target.id, &UserId::new("u1"), &ctx()).unwrap();
        assert_eq!(done.event.event_type, EventType::TransactionDeleted);
        assert_eq!(done.mutations[0], CacheMutation::AdjustBalance(2_000));
        assert_eq!(done.mutations[1], CacheMutation::RemoveTransaction(target.id));
    }

    #[test]
    fn test_delete_unknown_transaction() {
        let result = delete_transaction(&snapshot(1), Uuid::new_v4(), &UserId::new("u1"), &ctx());
        assert!(matches!(result, Err(DialogueError::ResolutionMiss(_))));
    }
}
