use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stacker_core::types::{ChatId, MessageId, Timestamp, UserId};

use crate::error::DialogueError;
use crate::lifecycle::{validate_transition, Phase, SubState};

// =============================================================================
// Intents
// =============================================================================

/// What the user is trying to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddExpense,
    AddIncome,
    CreateTask,
    CreateProject,
    LogProgress,
    CheckBalance,
    ListTransactions,
    ListTasks,
    ListProjects,
    Help,
    Greeting,
}

impl Intent {
    /// Intents that collect slots and end in a confirmation.
    pub fn fills_slots(&self) -> bool {
        matches!(
            self,
            Intent::AddExpense
                | Intent::AddIncome
                | Intent::CreateTask
                | Intent::CreateProject
                | Intent::LogProgress
        )
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Intent::AddExpense | Intent::AddIncome)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::AddExpense => write!(f, "add_expense"),
            Intent::AddIncome => write!(f, "add_income"),
            Intent::CreateTask => write!(f, "create_task"),
            Intent::CreateProject => write!(f, "create_project"),
            Intent::LogProgress => write!(f, "log_progress"),
            Intent::CheckBalance => write!(f, "check_balance"),
            Intent::ListTransactions => write!(f, "list_transactions"),
            Intent::ListTasks => write!(f, "list_tasks"),
            Intent::ListProjects => write!(f, "list_projects"),
            Intent::Help => write!(f, "help"),
            Intent::Greeting => write!(f, "greeting"),
        }
    }
}

// =============================================================================
// Slots
// =============================================================================

/// A named piece of information an intent needs before it can execute.
///
/// The wire names (`as_str`) appear in callback payloads such as
/// `nlp_kategori_Food` and must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    #[serde(rename = "amount")]
    Amount,
    #[serde(rename = "kategori")]
    Category,
    #[serde(rename = "note")]
    Note,
    #[serde(rename = "matkul")]
    Course,
    #[serde(rename = "waktu")]
    Deadline,
    #[serde(rename = "tipe_tugas")]
    TaskType,
    #[serde(rename = "project")]
    Project,
    #[serde(rename = "project_type")]
    ProjectType,
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "link")]
    Link,
    #[serde(rename = "link_title")]
    LinkTitle,
    #[serde(rename = "add_more_links")]
    AddMoreLinks,
    #[serde(rename = "persentase")]
    Percentage,
    #[serde(rename = "duration")]
    Duration,
}

impl Slot {
    pub const ALL: [Slot; 14] = [
        Slot::Amount,
        Slot::Category,
        Slot::Note,
        Slot::Course,
        Slot::Deadline,
        Slot::TaskType,
        Slot::Project,
        Slot::ProjectType,
        Slot::Priority,
        Slot::Link,
        Slot::LinkTitle,
        Slot::AddMoreLinks,
        Slot::Percentage,
        Slot::Duration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Amount => "amount",
            Slot::Category => "kategori",
            Slot::Note => "note",
            Slot::Course => "matkul",
            Slot::Deadline => "waktu",
            Slot::TaskType => "tipe_tugas",
            Slot::Project => "project",
            Slot::ProjectType => "project_type",
            Slot::Priority => "priority",
            Slot::Link => "link",
            Slot::LinkTitle => "link_title",
            Slot::AddMoreLinks => "add_more_links",
            Slot::Percentage => "persentase",
            Slot::Duration => "duration",
        }
    }

    /// Label used in confirmation summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Amount => "Nominal",
            Slot::Category => "Kategori",
            Slot::Note => "Catatan",
            Slot::Course => "Matkul",
            Slot::Deadline => "Deadline",
            Slot::TaskType => "Tipe",
            Slot::Project => "Project",
            Slot::ProjectType => "Jenis",
            Slot::Priority => "Prioritas",
            Slot::Link => "Link",
            Slot::LinkTitle => "Judul link",
            Slot::AddMoreLinks => "Tambah link",
            Slot::Percentage => "Progress",
            Slot::Duration => "Durasi",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Slot {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .iter()
            .find(|slot| slot.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown slot: {}", s))
    }
}

// =============================================================================
// Domain enums
// =============================================================================

/// Transaction category. The closed set the desktop app understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Bills,
    Subscription,
    Transfer,
    Salary,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Bills,
        Category::Subscription,
        Category::Transfer,
        Category::Salary,
    ];

    pub const EXPENSE_CHOICES: [Category; 6] = [
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Bills,
        Category::Subscription,
        Category::Transfer,
    ];

    pub const INCOME_CHOICES: [Category; 2] = [Category::Salary, Category::Transfer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Shopping => "Shopping",
            Category::Bills => "Bills",
            Category::Subscription => "Subscription",
            Category::Transfer => "Transfer",
            Category::Salary => "Salary",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    /// Signed balance delta for an amount of this kind.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Income => write!(f, "income"),
            TransactionKind::Expense => write!(f, "expense"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Personal,
    Course,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectType::Personal => write!(f, "personal"),
            ProjectType::Course => write!(f, "course"),
        }
    }
}

/// Status of a cached task, as the desktop app names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

// =============================================================================
// Slot values
// =============================================================================

/// Normalized, typed content of a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SlotData {
    Text(String),
    Amount(i64),
    Date(NaiveDate),
    Percent(u8),
    Minutes(u32),
    Flag(bool),
}

impl SlotData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SlotData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<i64> {
        match self {
            SlotData::Amount(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SlotData::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_percent(&self) -> Option<u8> {
        match self {
            SlotData::Percent(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_minutes(&self) -> Option<u32> {
        match self {
            SlotData::Minutes(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SlotData::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

/// Whether a reference slot was matched against known entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    NotApplicable,
    Resolved,
    /// Nothing matched; the raw text was kept as the value.
    Miss,
}

/// A filled slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotValue {
    pub value: SlotData,
    /// What the user actually typed or tapped.
    pub raw: String,
    /// Informational only.
    pub confidence: f32,
    /// Identifier of the resolved course or project, when there is one.
    pub ref_id: Option<String>,
    pub resolution: Resolution,
}

impl SlotValue {
    pub fn new(value: SlotData, raw: impl Into<String>) -> Self {
        Self {
            value,
            raw: raw.into(),
            confidence: 1.0,
            ref_id: None,
            resolution: Resolution::NotApplicable,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(SlotData::Text(text.clone()), text)
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn resolved(mut self, ref_id: Option<String>) -> Self {
        self.ref_id = ref_id;
        self.resolution = Resolution::Resolved;
        self
    }

    pub fn missed(mut self) -> Self {
        self.ref_id = None;
        self.resolution = Resolution::Miss;
        self
    }

    /// The skip marker used for optional text slots.
    pub fn skipped(raw: impl Into<String>) -> Self {
        Self::new(SlotData::Text("-".to_string()), raw)
    }

    pub fn is_skipped(&self) -> bool {
        self.value.as_text() == Some("-")
    }
}

/// A link collected by the project link sub-loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLink {
    pub url: String,
    pub title: String,
}

// =============================================================================
// Pending request
// =============================================================================

/// Per-chat in-progress request.
///
/// `sub_state` is `Confirming` exactly when `missing` is empty once the
/// orchestrator has finished a turn. Every method that makes `missing`
/// non-empty drops back to `Collecting`; only [`PendingRequest::begin_confirmation`]
/// moves forward.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRequest {
    chat_id: ChatId,
    user_id: UserId,
    intent: Intent,
    filled: HashMap<Slot, SlotValue>,
    missing: Vec<Slot>,
    sub_state: SubState,
    raw_text: String,
    links: Vec<ProjectLink>,
    confirmation_message: Option<MessageId>,
    prompt_message: Option<MessageId>,
    updated_at: Timestamp,
}

impl PendingRequest {
    pub fn new(chat_id: ChatId, user_id: UserId, intent: Intent, raw_text: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id,
            intent,
            filled: HashMap::new(),
            missing: Vec::new(),
            sub_state: SubState::Collecting,
            raw_text: raw_text.into(),
            links: Vec::new(),
            confirmation_message: None,
            prompt_message: None,
            updated_at: Timestamp::now(),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn filled(&self) -> &HashMap<Slot, SlotValue> {
        &self.filled
    }

    pub fn get(&self, slot: Slot) -> Option<&SlotValue> {
        self.filled.get(&slot)
    }

    pub fn is_filled(&self, slot: Slot) -> bool {
        self.filled.contains_key(&slot)
    }

    pub fn missing(&self) -> &[Slot] {
        &self.missing
    }

    pub fn next_missing(&self) -> Option<Slot> {
        self.missing.first().copied()
    }

    pub fn is_missing(&self, slot: Slot) -> bool {
        self.missing.contains(&slot)
    }

    pub fn sub_state(&self) -> SubState {
        self.sub_state
    }

    pub fn is_confirming(&self) -> bool {
        self.sub_state == SubState::Confirming
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn links(&self) -> &[ProjectLink] {
        &self.links
    }

    pub fn confirmation_message(&self) -> Option<MessageId> {
        self.confirmation_message
    }

    /// The last question sent, whose buttons go stale once it is answered.
    pub fn prompt_message(&self) -> Option<MessageId> {
        self.prompt_message
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// `Confirming` iff nothing is missing.
    pub fn is_consistent(&self) -> bool {
        (self.sub_state == SubState::Confirming) == self.missing.is_empty()
    }

    /// Append slots to the end of the queue, skipping ones already queued or filled.
    pub fn queue(&mut self, slots: impl IntoIterator<Item = Slot>) {
        for slot in slots {
            if !self.missing.contains(&slot) && !self.filled.contains_key(&slot) {
                self.missing.push(slot);
            }
        }
        self.reopen_if_needed();
    }

    /// Insert a slot at the front of the queue unless it is already queued or filled.
    pub fn inject_front(&mut self, slot: Slot) {
        if self.missing.contains(&slot) || self.filled.contains_key(&slot) {
            return;
        }
        self.missing.insert(0, slot);
        self.reopen_if_needed();
    }

    /// Insert a slot right after `missing[0]`, or at the front if nothing is queued.
    pub fn inject_after_front(&mut self, slot: Slot) {
        if self.missing.contains(&slot) || self.filled.contains_key(&slot) {
            return;
        }
        let at = usize::from(!self.missing.is_empty());
        self.missing.insert(at, slot);
        self.reopen_if_needed();
    }

    /// Fill a slot and drop it from `missing`. Other entries keep their order.
    pub fn fill(&mut self, slot: Slot, value: SlotValue) {
        self.missing.retain(|s| *s != slot);
        self.filled.insert(slot, value);
    }

    /// Remove a filled value. Does not queue the slot again.
    pub fn unfill(&mut self, slot: Slot) -> Option<SlotValue> {
        self.filled.remove(&slot)
    }

    /// Drop a slot from the queue without filling it.
    pub fn dequeue(&mut self, slot: Slot) {
        self.missing.retain(|s| *s != slot);
    }

    pub fn push_link(&mut self, link: ProjectLink) {
        self.links.push(link);
    }

    pub fn set_confirmation_message(&mut self, message: Option<MessageId>) {
        self.confirmation_message = message;
    }

    pub fn set_prompt_message(&mut self, message: Option<MessageId>) {
        self.prompt_message = message;
    }

    pub(crate) fn set_intent(&mut self, intent: Intent) {
        self.intent = intent;
    }

    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }

    /// Move to `Confirming`. Fails while anything is still missing.
    pub(crate) fn begin_confirmation(&mut self) -> Result<(), DialogueError> {
        if !self.missing.is_empty() {
            return Err(DialogueError::Internal(format!(
                "cannot confirm {} with {} slot(s) missing",
                self.intent,
                self.missing.len()
            )));
        }
        validate_transition(self.sub_state.into(), Phase::Confirming)?;
        self.sub_state = SubState::Confirming;
        Ok(())
    }

    fn reopen_if_needed(&mut self) {
        if !self.missing.is_empty() && self.sub_state == SubState::Confirming {
            self.sub_state = SubState::Collecting;
        }
    }
}

// =============================================================================
// Chat I/O
// =============================================================================

/// An inbound chat update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    Message {
        chat_id: ChatId,
        user_id: UserId,
        message_id: MessageId,
        text: String,
    },
    Callback {
        chat_id: ChatId,
        user_id: UserId,
        callback_id: String,
        /// The message carrying the tapped button.
        message_id: Option<MessageId>,
        data: String,
    },
}

impl Update {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Update::Message { chat_id, .. } | Update::Callback { chat_id, .. } => *chat_id,
        }
    }
}

/// A single inline button.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// A message to send, optionally with rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<Button>>) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// All button payloads, row by row.
    pub fn payloads(&self) -> Vec<&str> {
        self.keyboard
            .iter()
            .flatten()
            .map(|b| b.data.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PendingRequest {
        PendingRequest::new(ChatId(1), UserId::new("u1"), Intent::CreateProject, "buat project")
    }

    #[test]
    fn test_slot_wire_names_roundtrip() {
        for slot in Slot::ALL {
            assert_eq!(slot.as_str().parse::<Slot>().unwrap(), slot);
        }
        assert!("harga".parse::<Slot>().is_err());
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!(" Bills ".parse::<Category>().unwrap(), Category::Bills);
        assert!("Snacks".parse::<Category>().is_err());
    }

    #[test]
    fn test_task_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
    }

    #[test]
    fn test_signed_amounts() {
        assert_eq!(TransactionKind::Expense.signed(50_000), -50_000);
        assert_eq!(TransactionKind::Income.signed(50_000), 50_000);
    }

    #[test]
    fn test_fill_keeps_remaining_order() {
        let mut req = request();
        req.queue([Slot::Project, Slot::ProjectType, Slot::Deadline]);
        req.fill(Slot::ProjectType, SlotValue::text("personal"));
        assert_eq!(req.missing(), &[Slot::Project, Slot::Deadline]);
        assert!(req.is_filled(Slot::ProjectType));
    }

    #[test]
    fn test_inject_front_skips_filled_and_queued() {
        let mut req = request();
        req.queue([Slot::Deadline]);
        req.inject_front(Slot::Course);
        req.inject_front(Slot::Course);
        assert_eq!(req.missing(), &[Slot::Course, Slot::Deadline]);

        req.fill(Slot::Course, SlotValue::text("Database"));
        req.inject_front(Slot::Course);
        assert_eq!(req.missing(), &[Slot::Deadline]);
    }

    #[test]
    fn test_begin_confirmation_requires_empty_queue() {
        let mut req = request();
        req.queue([Slot::Project]);
        assert!(req.begin_confirmation().is_err());
        assert_eq!(req.sub_state(), SubState::Collecting);

        req.fill(Slot::Project, SlotValue::text("Portfolio"));
        req.begin_confirmation().unwrap();
        assert!(req.is_confirming());
        assert!(req.is_consistent());
    }

    #[test]
    fn test_reinjecting_drops_back_to_collecting() {
        let mut req = request();
        req.begin_confirmation().unwrap();
        req.inject_front(Slot::Link);
        assert_eq!(req.sub_state(), SubState::Collecting);
        assert!(req.is_consistent());
    }

    #[test]
    fn test_inject_after_front() {
        let mut req = request();
        req.inject_after_front(Slot::LinkTitle);
        assert_eq!(req.missing(), &[Slot::LinkTitle]);
        req.queue([Slot::Note]);
        req.inject_after_front(Slot::AddMoreLinks);
        assert_eq!(req.missing(), &[Slot::LinkTitle, Slot::AddMoreLinks, Slot::Note]);
    }

    #[test]
    fn test_skipped_marker() {
        assert!(SlotValue::skipped("skip").is_skipped());
        assert!(!SlotValue::text("makan").is_skipped());
    }

    #[test]
    fn test_outbound_payloads_flatten_rows() {
        let msg = OutboundMessage::text("pilih").with_keyboard(vec![
            vec![Button::new("A", "a"), Button::new("B", "b")],
            vec![Button::new("C", "c")],
        ]);
        assert_eq!(msg.payloads(), vec!["a", "b", "c"]);
    }
}
