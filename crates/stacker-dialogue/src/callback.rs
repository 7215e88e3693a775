//! Button payload decoding.
//!
//! Parsing is pure and total: anything unrecognized becomes
//! [`CallbackAction::Unknown`], which the engine acknowledges and ignores.
//! Identifiers are carried as opaque strings and only interpreted when the
//! action is dispatched.

use crate::intent::query::ListMode;
use crate::types::Slot;

/// What a tapped button asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Confirm,
    Reject,
    Cancel,
    FillSlot { slot: Slot, value: String },
    StartProgress { project_id: String },
    TransactionPage { page: usize, mode: ListMode },
    AskDeleteTransaction { id: String },
    DeleteTransaction { id: String },
    EditTransaction { id: String },
    DismissTransactionAction,
    EditTask { id: String },
    SetTaskStatus { id: String, status: String },
    DismissTaskEdit,
    Unknown(String),
}

/// Slot names, longest first, so `link_title` wins over `link`.
fn slots_longest_first() -> Vec<Slot> {
    let mut slots = Slot::ALL.to_vec();
    slots.sort_by_key(|s| std::cmp::Reverse(s.as_str().len()));
    slots
}

fn parse_fill(rest: &str) -> Option<CallbackAction> {
    slots_longest_first().into_iter().find_map(|slot| {
        let value = rest.strip_prefix(slot.as_str())?.strip_prefix('_')?;
        (!value.is_empty()).then(|| CallbackAction::FillSlot {
            slot,
            value: value.to_string(),
        })
    })
}

/// `<n>` or `<n>_mode=<mode>`.
fn parse_page(rest: &str) -> Option<CallbackAction> {
    let (page, mode) = match rest.split_once("_mode=") {
        Some((page, mode)) => (page, ListMode::parse(mode)),
        None => (rest, ListMode::View),
    };
    let page = page.parse().ok()?;
    Some(CallbackAction::TransactionPage { page, mode })
}

fn non_empty(id: &str) -> Option<String> {
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        Self::try_parse(data).unwrap_or_else(|| CallbackAction::Unknown(data.to_string()))
    }

    fn try_parse(data: &str) -> Option<Self> {
        match data {
            "nlp_confirm_yes" => return Some(CallbackAction::Confirm),
            "nlp_confirm_no" => return Some(CallbackAction::Reject),
            "nlp_cancel" => return Some(CallbackAction::Cancel),
            "cancel_tx_action" => return Some(CallbackAction::DismissTransactionAction),
            "CANCEL_EDIT" => return Some(CallbackAction::DismissTaskEdit),
            _ => {}
        }

        if let Some(answer) = data.strip_prefix("nlp_addlink_") {
            return matches!(answer, "yes" | "no").then(|| CallbackAction::FillSlot {
                slot: Slot::AddMoreLinks,
                value: answer.to_string(),
            });
        }
        if let Some(value) = data.strip_prefix("nlp_proj_") {
            return non_empty(value).map(|value| CallbackAction::FillSlot {
                slot: Slot::ProjectType,
                value,
            });
        }
        if let Some(id) = data.strip_prefix("nlp_progress_") {
            return non_empty(id).map(|project_id| CallbackAction::StartProgress { project_id });
        }
        if let Some(rest) = data.strip_prefix("nlp_") {
            return parse_fill(rest);
        }
        if let Some(rest) = data.strip_prefix("list_tx_page_") {
            return parse_page(rest);
        }
        if let Some(id) = data.strip_prefix("confirm_del_tx_") {
            return non_empty(id).map(|id| CallbackAction::DeleteTransaction { id });
        }
        if let Some(id) = data.strip_prefix("del_tx_") {
            return non_empty(id).map(|id| CallbackAction::AskDeleteTransaction { id });
        }
        if let Some(id) = data.strip_prefix("edit_tx_") {
            return non_empty(id).map(|id| CallbackAction::EditTransaction { id });
        }
        if let Some(id) = data.strip_prefix("EDIT_TASK:") {
            return non_empty(id).map(|id| CallbackAction::EditTask { id });
        }
        if let Some(rest) = data.strip_prefix("SET_STATUS:") {
            let (id, status) = rest.rsplit_once(':')?;
            return Some(CallbackAction::SetTaskStatus {
                id: non_empty(id)?,
                status: non_empty(status)?,
            });
        }
        None
    }
}
