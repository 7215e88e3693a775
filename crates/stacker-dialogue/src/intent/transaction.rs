//! Expense and income recording.

use async_trait::async_trait;
use serde_json::json;
use stacker_core::events::{DomainEvent, EventType};
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheMutation, CachedTransaction};
use crate::error::DialogueError;
use crate::intent::{
    amount_of, optional_text, text_of, Execution, ExecutionContext, IntentHandler,
};
use crate::normalizer::amount::format_rupiah;
use crate::normalizer::keywords::has_income_cue;
use crate::types::{Category, Intent, PendingRequest, Slot, TransactionKind};

const SLOTS: &[Slot] = &[Slot::Amount, Slot::Category, Slot::Note];

/// Handler for `AddExpense` or `AddIncome`, depending on `kind`.
pub struct TransactionHandler {
    kind: TransactionKind,
}

impl TransactionHandler {
    pub fn new(kind: TransactionKind) -> Self {
        Self { kind }
    }

    /// The kind actually recorded. An expense whose text says money came in
    /// and whose category fits income is recorded as income.
    fn effective_kind(&self, request: &PendingRequest, category: Category) -> TransactionKind {
        if self.kind == TransactionKind::Expense
            && Category::INCOME_CHOICES.contains(&category)
            && has_income_cue(request.raw_text())
        {
            TransactionKind::Income
        } else {
            self.kind
        }
    }

    /// Kind shown in the summary, before the category is known too.
    fn summary_kind(&self, request: &PendingRequest) -> TransactionKind {
        match category_of(request) {
            Ok(category) => self.effective_kind(request, category),
            Err(_) => self.kind,
        }
    }
}

fn category_of(request: &PendingRequest) -> Result<Category, DialogueError> {
    text_of(request, Slot::Category)?
        .parse::<Category>()
        .map_err(DialogueError::Internal)
}

#[async_trait]
impl IntentHandler for TransactionHandler {
    fn intent(&self) -> Intent {
        match self.kind {
            TransactionKind::Expense => Intent::AddExpense,
            TransactionKind::Income => Intent::AddIncome,
        }
    }

    fn required_slots(&self) -> &'static [Slot] {
        SLOTS
    }

    fn build_summary(&self, request: &PendingRequest) -> String {
        let title = match self.summary_kind(request) {
            TransactionKind::Expense => "💸 *Konfirmasi Pengeluaran*",
            TransactionKind::Income => "💰 *Konfirmasi Pemasukan*",
        };
        let amount = amount_of(request, Slot::Amount)
            .map(format_rupiah)
            .unwrap_or_else(|_| "-".to_string());
        let category = text_of(request, Slot::Category).unwrap_or("-");
        let note = optional_text(request, Slot::Note).unwrap_or("-");

        format!(
            "{}\n\n💵 Nominal: {}\n🏷️ Kategori: {}\n📝 Catatan: {}\n\nUdah bener?",
            title, amount, category, note
        )
    }

    async fn execute(
        &self,
        request: &PendingRequest,
        ctx: &ExecutionContext,
    ) -> Result<Execution, DialogueError> {
        let amount = amount_of(request, Slot::Amount)?;
        let category = category_of(request)?;
        let note = optional_text(request, Slot::Note).unwrap_or_default().to_string();
        let kind = self.effective_kind(request, category);
        let id = Uuid::new_v4();

        let payload = json!({
            "id": id,
            "type": kind,
            "amount": amount,
            "category": category,
            "note": note,
            "date": ctx.today.format("%Y-%m-%d").to_string(),
        });
        let event = DomainEvent::new(
            EventType::TransactionCreated,
            request.user_id().clone(),
            payload,
            ctx.source.clone(),
        )
        .with_id(id);

        let record = CachedTransaction {
            id,
            kind,
            amount,
            category,
            note: note.clone(),
            date: ctx.today,
        };
        let mutations = vec![
            CacheMutation::AdjustBalance(kind.signed(amount)),
            CacheMutation::PrependTransaction(record),
        ];

        info!(chat_id = %request.chat_id(), kind = %kind, amount, category = %category, "Transaction built");

        let mut success_text = match kind {
            TransactionKind::Income => format!(
                "✅ Asik! Pemasukan {} dari {} tercatat 🤑",
                format_rupiah(amount),
                category
            ),
            TransactionKind::Expense => format!(
                "✅ Oke, pengeluaran {} buat {} tercatat 💸",
                format_rupiah(amount),
                category
            ),
        };
        if !note.is_empty() {
            success_text.push_str(&format!("\n📝 \"{}\"", note));
        }

        Ok(Execution {
            event,
            mutations,
            success_text,
        })
    }
}
