//! End-to-end conversations through the dialogue engine.
//!
//! Each test builds its own engine over in-memory stores and a recording
//! chat client, then drives it with the same updates a chat transport would
//! deliver.

use std::sync::Arc;

use chrono::NaiveDate;
use stacker_core::events::EventType;
use stacker_core::types::{ChatId, MessageId, Timestamp, UserId};
use uuid::Uuid;

use stacker_dialogue::broadcast::BroadcastReceipt;
use stacker_dialogue::cache::CachedTask;
use stacker_dialogue::normalizer::amount::parse_amount;
use stacker_dialogue::prompts::{CANCELLED_TEXT, EXPIRED_TEXT, OFFLINE_NOTICE};
use stacker_dialogue::{
    Broadcaster, CachedProject, CachedTransaction, Category, ChannelBroadcaster, ChatAction,
    Course, DialogueEngine, DialogueError, EngineSettings, InMemoryCache, InMemorySessionStore,
    KeywordEntry, LocalCache, RecordingChat, Services, SessionStore, Slot, SlotData, SynonymTable,
    TaskStatus, TransactionKind, Update, UserSnapshot,
};

// =============================================================================
// Helpers
// =============================================================================

const CHAT: ChatId = ChatId(42);

fn user() -> UserId {
    UserId::new("user-1")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn synonyms() -> SynonymTable {
    SynonymTable::from_entries(vec![
        KeywordEntry {
            keyword: "database".into(),
            synonyms: vec!["basdat".into(), "db".into()],
        },
        KeywordEntry {
            keyword: "webpro".into(),
            synonyms: vec!["pemrograman web".into(), "pweb".into()],
        },
    ])
}

fn seeded_snapshot() -> UserSnapshot {
    UserSnapshot {
        current_balance: 1_000_000,
        courses: vec![
            Course::new("c1", "Database"),
            Course::new("c2", "Pemrograman Web"),
            Course::new("c3", "Praktikum Jaringan"),
        ],
        ..Default::default()
    }
}

struct Harness {
    engine: Arc<DialogueEngine>,
    chat: Arc<RecordingChat>,
    cache: Arc<InMemoryCache>,
    sessions: Arc<InMemorySessionStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with_snapshot(seeded_snapshot(), Arc::new(ChannelBroadcaster::new()))
    }

    fn with_snapshot(snapshot: UserSnapshot, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let chat = Arc::new(RecordingChat::new());
        let cache = Arc::new(InMemoryCache::new().with_snapshot(user(), snapshot));
        let sessions = Arc::new(InMemorySessionStore::new(15));
        let services = Services {
            sessions: sessions.clone(),
            cache: cache.clone(),
            broadcaster,
            chat: chat.clone(),
        };
        let settings = EngineSettings {
            today: Some(today()),
            ..Default::default()
        };
        Self {
            engine: Arc::new(DialogueEngine::new(settings, services, synonyms())),
            chat,
            cache,
            sessions,
        }
    }

    async fn say(&self, text: &str) -> String {
        self.engine
            .handle_update(Update::Message {
                chat_id: CHAT,
                user_id: user(),
                message_id: MessageId(1000),
                text: text.to_string(),
            })
            .await;
        self.last_text()
    }

    async fn tap(&self, data: &str) {
        self.engine.handle_update(tap_update(data)).await;
    }

    fn last_text(&self) -> String {
        self.chat.last_sent().map(|m| m.text).unwrap_or_default()
    }

    fn next_missing(&self) -> Option<Slot> {
        self.sessions
            .get(CHAT)
            .unwrap()
            .and_then(|r| r.next_missing())
    }

    async fn snapshot(&self) -> UserSnapshot {
        self.cache.read(&user()).await.unwrap().unwrap()
    }
}

fn tap_update(data: &str) -> Update {
    Update::Callback {
        chat_id: CHAT,
        user_id: user(),
        callback_id: format!("cb-{}", data),
        message_id: Some(MessageId(999)),
        data: data.to_string(),
    }
}

struct FailingBroadcaster;

#[async_trait::async_trait]
impl Broadcaster for FailingBroadcaster {
    async fn send(
        &self,
        _user: &UserId,
        _event: &stacker_core::events::DomainEvent,
    ) -> Result<BroadcastReceipt, DialogueError> {
        Err(DialogueError::Broadcast("desktop unreachable".into()))
    }
}

struct SlowBroadcaster;

#[async_trait::async_trait]
impl Broadcaster for SlowBroadcaster {
    async fn send(
        &self,
        _user: &UserId,
        _event: &stacker_core::events::DomainEvent,
    ) -> Result<BroadcastReceipt, DialogueError> {
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        Ok(BroadcastReceipt { online: true })
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_expense_filled_by_text() {
    let h = Harness::new();

    assert!(h.say("catat pengeluaran").await.contains("nominal"));
    assert_eq!(h.next_missing(), Some(Slot::Amount));
    h.say("50rb").await;
    assert_eq!(h.next_missing(), Some(Slot::Category));
    h.say("food").await;
    assert_eq!(h.next_missing(), Some(Slot::Note));
    assert!(h.say("makan siang").await.contains("Rp50.000"));

    let reply = h.say("ya").await;
    assert!(reply.contains(OFFLINE_NOTICE));
    assert!(h.sessions.get(CHAT).unwrap().is_none());

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.current_balance, 950_000);
    assert_eq!(snapshot.transactions.len(), 1);
    assert_eq!(snapshot.transactions[0].category, Category::Food);
    assert_eq!(snapshot.transactions[0].note, "makan siang");
}

#[tokio::test]
async fn test_expense_filled_by_buttons() {
    let h = Harness::new();

    h.say("catat pengeluaran 50rb").await;
    assert_eq!(h.next_missing(), Some(Slot::Category));
    h.tap("nlp_kategori_Transport").await;
    assert_eq!(h.next_missing(), Some(Slot::Note));
    h.say("skip").await;
    h.tap("nlp_confirm_yes").await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.current_balance, 950_000);
    assert_eq!(snapshot.transactions[0].category, Category::Transport);
    assert_eq!(snapshot.transactions[0].note, "");
}

#[tokio::test]
async fn test_second_yes_does_not_execute_again() {
    let h = Harness::new();

    h.say("beli kopi 25rb").await;
    h.say("ya").await;
    assert_eq!(h.say("ya").await, EXPIRED_TEXT);

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.transactions.len(), 1);
    assert_eq!(snapshot.current_balance, 975_000);
}

#[tokio::test]
async fn test_concurrent_confirm_taps_execute_once() {
    let h = Harness::new();
    h.say("beli kopi 25rb").await;

    let (a, b) = (h.engine.clone(), h.engine.clone());
    tokio::join!(
        a.handle_update(tap_update("nlp_confirm_yes")),
        b.handle_update(tap_update("nlp_confirm_yes")),
    );

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.transactions.len(), 1);
    assert_eq!(snapshot.current_balance, 975_000);
    let expired = h
        .chat
        .sent()
        .iter()
        .filter(|m| m.text == EXPIRED_TEXT)
        .count();
    assert_eq!(expired, 1);
}

#[tokio::test]
async fn test_edit_amount_before_confirming() {
    let h = Harness::new();

    h.say("beli kopi 25rb").await;
    let summary = h.say("ganti harganya jadi 22rb").await;
    assert!(summary.contains("Rp22.000"));
    assert!(summary.contains("kuganti"));

    h.say("ya").await;
    assert_eq!(h.snapshot().await.current_balance, 978_000);
}

#[tokio::test]
async fn test_edit_amount_while_category_pending() {
    let h = Harness::new();

    h.say("catat pengeluaran 25rb").await;
    assert_eq!(h.next_missing(), Some(Slot::Category));

    let reply = h.say("ganti harganya jadi 22rb").await;
    assert!(reply.contains("kuganti"));
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert_eq!(request.missing(), &[Slot::Category, Slot::Note]);
    assert_eq!(
        request.get(Slot::Amount).unwrap().value,
        SlotData::Amount(22_000)
    );
}

#[tokio::test]
async fn test_slow_broadcast_does_not_hold_back_cache() {
    let h = Harness::with_snapshot(seeded_snapshot(), Arc::new(SlowBroadcaster));
    h.say("beli kopi 50rb").await;

    let engine = h.engine.clone();
    let confirm = tokio::spawn(async move {
        engine
            .handle_update(Update::Message {
                chat_id: CHAT,
                user_id: user(),
                message_id: MessageId(1001),
                text: "ya".to_string(),
            })
            .await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert_eq!(h.snapshot().await.current_balance, 950_000);

    confirm.await.unwrap();
    assert!(h.last_text().contains(OFFLINE_NOTICE));
}

#[tokio::test]
async fn test_broadcast_failure_still_updates_cache() {
    let h = Harness::with_snapshot(seeded_snapshot(), Arc::new(FailingBroadcaster));

    h.say("beli kopi 50rb").await;
    let reply = h.say("ya").await;
    assert!(reply.contains(OFFLINE_NOTICE));

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.current_balance, 950_000);
    assert_eq!(snapshot.transactions.len(), 1);
}

#[tokio::test]
async fn test_live_subscriber_receives_event() {
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let mut rx = broadcaster.subscribe();
    let h = Harness::with_snapshot(seeded_snapshot(), broadcaster);

    h.say("beli kopi 50rb").await;
    let reply = h.say("ya").await;
    assert!(!reply.contains(OFFLINE_NOTICE));

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::TransactionCreated);
    assert_eq!(event.payload["amount"], 50_000);
    assert_eq!(event.actor_user_id, user());
}

#[test]
fn test_amount_shorthands() {
    assert_eq!(parse_amount("50rb"), Some(50_000));
    assert_eq!(parse_amount("1.5jt"), Some(1_500_000));
    assert_eq!(parse_amount("50k"), Some(50_000));
    assert_eq!(parse_amount("gocap"), Some(50_000));
    assert_eq!(parse_amount("Rp 1.500.000"), Some(1_500_000));
    assert_eq!(parse_amount("25"), Some(25_000));
    assert_eq!(parse_amount("abc"), None);
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn test_task_from_one_sentence() {
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let mut rx = broadcaster.subscribe();
    let h = Harness::with_snapshot(seeded_snapshot(), broadcaster);

    let summary = h.say("tugas database deadline besok").await;
    assert!(summary.contains("Database"));
    assert!(h.sessions.get(CHAT).unwrap().unwrap().is_confirming());

    h.say("ya").await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::TaskCreated);
    assert_eq!(event.payload["deadline"], "2025-01-16");
    assert_eq!(event.payload["courseId"], "c1");
    assert_eq!(event.payload["courseName"], "Database");

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_short_word_in_sentence_is_not_a_course_acronym() {
    let mut snapshot = seeded_snapshot();
    snapshot.courses.push(Course::new("d1", "Desain Interaksi"));
    let h = Harness::with_snapshot(snapshot, Arc::new(ChannelBroadcaster::new()));

    h.say("ada tugas di kelas besok").await;
    assert_eq!(h.next_missing(), Some(Slot::Course));
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert!(!request.is_filled(Slot::Course));

    h.say("di").await;
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert_eq!(request.get(Slot::Course).unwrap().ref_id.as_deref(), Some("d1"));
}

#[tokio::test]
async fn test_course_synonym_resolves_to_listed_course() {
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let mut rx = broadcaster.subscribe();
    let h = Harness::with_snapshot(seeded_snapshot(), broadcaster);

    h.say("tugas webpro besok").await;
    h.say("ya").await;

    let event = rx.try_recv().unwrap();
    assert_eq!(event.payload["courseId"], "c2");
    assert_eq!(event.payload["courseName"], "Pemrograman Web");
}

#[tokio::test]
async fn test_task_course_by_button() {
    let h = Harness::new();

    h.say("buat tugas").await;
    assert_eq!(h.next_missing(), Some(Slot::Course));
    let question = h.chat.last_sent().unwrap();
    assert!(question.payloads().contains(&"nlp_matkul_database"));

    h.tap("nlp_matkul_database").await;
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    let course = request.get(Slot::Course).unwrap();
    assert_eq!(course.value.as_text(), Some("Database"));
    assert_eq!(course.ref_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_task_status_button() {
    let task_id = Uuid::new_v4();
    let mut snapshot = seeded_snapshot();
    snapshot.tasks.push(CachedTask {
        id: task_id,
        title: "Tugas Database".into(),
        course: "Database".into(),
        course_id: Some("c1".into()),
        task_type: "Tugas".into(),
        deadline: today(),
        status: TaskStatus::Pending,
        note: None,
    });
    let h = Harness::with_snapshot(snapshot, Arc::new(ChannelBroadcaster::new()));

    h.say("lihat tugas").await;
    h.tap(&format!("EDIT_TASK:{}", task_id)).await;
    assert!(h.chat.last_sent().unwrap().payloads().contains(&"CANCEL_EDIT"));

    h.tap(&format!("SET_STATUS:{}:completed", task_id)).await;
    assert_eq!(h.snapshot().await.tasks[0].status, TaskStatus::Completed);
}

// =============================================================================
// Projects
// =============================================================================

#[tokio::test]
async fn test_project_link_loop() {
    let h = Harness::new();

    h.say("buat project Portfolio").await;
    for _ in 0..8 {
        match h.next_missing() {
            Some(Slot::ProjectType) => h.tap("nlp_proj_personal").await,
            Some(Slot::Deadline) => {
                h.say("besok").await;
            }
            Some(Slot::Priority) => h.tap("nlp_priority_High").await,
            Some(Slot::Note) => {
                h.say("-").await;
            }
            _ => break,
        }
    }
    assert_eq!(h.next_missing(), Some(Slot::Link));

    h.say("github.com/me/portfolio").await;
    assert_eq!(h.next_missing(), Some(Slot::LinkTitle));
    h.say("Repo").await;
    assert_eq!(h.next_missing(), Some(Slot::AddMoreLinks));

    h.tap("nlp_addlink_yes").await;
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert_eq!(request.missing(), &[Slot::Link]);
    assert!(!request.is_filled(Slot::Link));
    assert!(!request.is_filled(Slot::LinkTitle));
    assert!(!request.is_filled(Slot::AddMoreLinks));
    assert_eq!(request.links().len(), 1);

    h.say("-").await;
    assert!(h.sessions.get(CHAT).unwrap().unwrap().is_confirming());
    h.say("ya").await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.projects.len(), 1);
    assert_eq!(snapshot.projects[0].title, "Portfolio");
    assert_eq!(snapshot.projects[0].links.len(), 1);
    assert_eq!(snapshot.projects[0].links[0].url, "https://github.com/me/portfolio");
}

#[tokio::test]
async fn test_add_link_again_from_summary() {
    let h = Harness::new();

    h.say("buat project Portfolio").await;
    for _ in 0..8 {
        match h.next_missing() {
            Some(Slot::ProjectType) => h.tap("nlp_proj_personal").await,
            Some(Slot::Deadline) => {
                h.say("besok").await;
            }
            Some(Slot::Priority) => h.tap("nlp_priority_High").await,
            Some(Slot::Note) | Some(Slot::Link) => {
                h.say("-").await;
            }
            _ => break,
        }
    }
    assert!(h.sessions.get(CHAT).unwrap().unwrap().is_confirming());

    h.tap("nlp_addlink_yes").await;
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert_eq!(request.missing(), &[Slot::Link]);
    assert!(!request.is_confirming());
    assert!(!h.last_text().contains("kuganti"));

    h.say("github.com/me/portfolio").await;
    h.say("Repo").await;
    assert_eq!(h.next_missing(), Some(Slot::AddMoreLinks));
    h.tap("nlp_addlink_no").await;
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert!(request.is_confirming());
    assert_eq!(request.links().len(), 1);
}

#[tokio::test]
async fn test_progress_from_project_list() {
    let project = CachedProject::new("Skripsi");
    let project_id = project.id;
    let mut snapshot = seeded_snapshot();
    snapshot.projects.push(project);
    let h = Harness::with_snapshot(snapshot, Arc::new(ChannelBroadcaster::new()));

    h.say("lihat project").await;
    h.tap(&format!("nlp_progress_{}", project_id)).await;
    assert_eq!(h.next_missing(), Some(Slot::Percentage));
    h.say("60%").await;
    h.say("2 jam").await;
    h.say("bab 2 selesai").await;
    h.say("ya").await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.projects[0].progress, 60);
    assert_eq!(snapshot.projects[0].total_minutes, 120);
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_cancel_mid_flow() {
    let h = Harness::new();

    h.say("catat pengeluaran").await;
    assert_eq!(h.say("batal").await, CANCELLED_TEXT);
    assert!(h.sessions.get(CHAT).unwrap().is_none());
    assert_eq!(h.snapshot().await.transactions.len(), 0);
}

#[tokio::test]
async fn test_expired_session_button() {
    let h = Harness::new();

    h.say("catat pengeluaran 20rb").await;
    let later = Timestamp(Timestamp::now().0 + 16 * 60);
    assert!(h.sessions.get_at(CHAT, later).unwrap().is_none());

    h.tap("nlp_kategori_Food").await;
    assert_eq!(h.last_text(), EXPIRED_TEXT);
    assert_eq!(h.snapshot().await.transactions.len(), 0);
}

#[tokio::test]
async fn test_unknown_callback_is_acknowledged_only() {
    let h = Harness::new();
    h.say("catat pengeluaran").await;
    let before = h.sessions.get(CHAT).unwrap();
    let sent_before = h.chat.sent().len();

    h.tap("something_else").await;

    assert_eq!(h.chat.sent().len(), sent_before);
    assert_eq!(h.sessions.get(CHAT).unwrap(), before);
    assert!(h.chat.actions().contains(&ChatAction::Answered {
        callback_id: "cb-something_else".into(),
        text: None,
    }));
}

#[tokio::test]
async fn test_switch_expense_to_income() {
    let h = Harness::new();

    h.say("catat pengeluaran 100rb").await;
    h.say("bukan, ini pemasukan").await;
    let request = h.sessions.get(CHAT).unwrap().unwrap();
    assert_eq!(request.intent(), stacker_dialogue::Intent::AddIncome);
    assert_eq!(request.next_missing(), Some(Slot::Category));

    let question = h.chat.last_sent().unwrap();
    assert!(question.payloads().contains(&"nlp_kategori_Salary"));
}

// =============================================================================
// Transaction list actions
// =============================================================================

#[tokio::test]
async fn test_delete_listed_transaction() {
    let tx = CachedTransaction {
        id: Uuid::new_v4(),
        kind: TransactionKind::Expense,
        amount: 30_000,
        category: Category::Food,
        note: "bakso".into(),
        date: today(),
    };
    let mut snapshot = seeded_snapshot();
    snapshot.current_balance = 970_000;
    snapshot.transactions.push(tx.clone());
    let h = Harness::with_snapshot(snapshot, Arc::new(ChannelBroadcaster::new()));

    h.say("hapus transaksi").await;
    let list = h.chat.last_sent().unwrap();
    assert!(list.payloads().contains(&format!("del_tx_{}", tx.id).as_str()));

    h.tap(&format!("del_tx_{}", tx.id)).await;
    assert!(h.last_text().contains("Yakin"));
    h.tap(&format!("confirm_del_tx_{}", tx.id)).await;

    let snapshot = h.snapshot().await;
    assert!(snapshot.transactions.is_empty());
    assert_eq!(snapshot.current_balance, 1_000_000);
}

#[tokio::test]
async fn test_delete_unknown_transaction() {
    let h = Harness::new();
    h.tap(&format!("confirm_del_tx_{}", Uuid::new_v4())).await;
    assert!(h.last_text().contains("nggak ketemu"));
}
