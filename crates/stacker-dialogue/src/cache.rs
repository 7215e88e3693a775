//! Optimistic local cache of the user's data.
//!
//! The system of record lives elsewhere; this is the per-user snapshot the
//! engine reads for balances, lists and course/project lookups, and patches
//! right after an event is produced so the next turn already sees it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stacker_core::types::UserId;
use tracing::debug;
use uuid::Uuid;

use crate::error::DialogueError;
use crate::normalizer::Course;
use crate::types::{Category, Priority, ProjectLink, ProjectType, TaskStatus, TransactionKind};

// =============================================================================
// Snapshot records
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub category: Category,
    pub note: String,
    pub date: NaiveDate,
}

impl CachedTransaction {
    /// Balance delta this transaction contributed.
    pub fn signed_amount(&self) -> i64 {
        self.kind.signed(self.amount)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedTask {
    pub id: Uuid,
    pub title: String,
    pub course: String,
    #[serde(default)]
    pub course_id: Option<String>,
    pub task_type: String,
    pub deadline: NaiveDate,
    pub status: TaskStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedProject {
    pub id: Uuid,
    pub title: String,
    pub project_type: ProjectType,
    pub priority: Priority,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub total_minutes: u32,
    #[serde(default)]
    pub links: Vec<ProjectLink>,
}

impl CachedProject {
    /// A fresh personal project with medium priority and no progress.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            project_type: ProjectType::Personal,
            priority: Priority::Medium,
            deadline: None,
            course: None,
            progress: 0,
            total_minutes: 0,
            links: Vec::new(),
        }
    }
}

/// Everything cached for one user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSnapshot {
    pub current_balance: i64,
    /// Newest first.
    pub transactions: Vec<CachedTransaction>,
    pub tasks: Vec<CachedTask>,
    pub projects: Vec<CachedProject>,
    pub courses: Vec<Course>,
}

impl UserSnapshot {
    pub fn transaction(&self, id: Uuid) -> Option<&CachedTransaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn task(&self, id: Uuid) -> Option<&CachedTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn project(&self, id: Uuid) -> Option<&CachedProject> {
        self.projects.iter().find(|p| p.id == id)
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// A single optimistic patch to a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheMutation {
    AdjustBalance(i64),
    PrependTransaction(CachedTransaction),
    RemoveTransaction(Uuid),
    AppendTask(CachedTask),
    SetTaskStatus { task_id: Uuid, status: TaskStatus },
    AppendProject(CachedProject),
    RecordProgress {
        project_id: Uuid,
        progress: u8,
        minutes: u32,
    },
}

impl CacheMutation {
    /// Apply to `snapshot`. Records that no longer exist are left alone.
    pub fn apply(&self, snapshot: &mut UserSnapshot) {
        match self {
            CacheMutation::AdjustBalance(delta) => {
                snapshot.current_balance = snapshot.current_balance.saturating_add(*delta);
            }
            CacheMutation::PrependTransaction(tx) => snapshot.transactions.insert(0, tx.clone()),
            CacheMutation::RemoveTransaction(id) => snapshot.transactions.retain(|t| t.id != *id),
            CacheMutation::AppendTask(task) => snapshot.tasks.push(task.clone()),
            CacheMutation::SetTaskStatus { task_id, status } => {
                if let Some(task) = snapshot.tasks.iter_mut().find(|t| t.id == *task_id) {
                    task.status = *status;
                }
            }
            CacheMutation::AppendProject(project) => snapshot.projects.push(project.clone()),
            CacheMutation::RecordProgress {
                project_id,
                progress,
                minutes,
            } => {
                if let Some(project) = snapshot.projects.iter_mut().find(|p| p.id == *project_id) {
                    project.progress = *progress;
                    project.total_minutes = project.total_minutes.saturating_add(*minutes);
                }
            }
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Read/write access to per-user snapshots.
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn read(&self, user: &UserId) -> Result<Option<UserSnapshot>, DialogueError>;
    async fn write(&self, user: &UserId, snapshot: UserSnapshot) -> Result<(), DialogueError>;
}

/// Read the snapshot (or an empty one), apply every mutation, write it back.
pub async fn apply_mutations(
    cache: &dyn LocalCache,
    user: &UserId,
    mutations: &[CacheMutation],
) -> Result<(), DialogueError> {
    if mutations.is_empty() {
        return Ok(());
    }
    let mut snapshot = cache.read(user).await?.unwrap_or_default();
    for mutation in mutations {
        mutation.apply(&mut snapshot);
    }
    cache.write(user, snapshot).await?;
    debug!(user = %user, count = mutations.len(), "Applied cache mutations");
    Ok(())
}

/// Process-local cache, used by tests and the console host.
#[derive(Default)]
pub struct InMemoryCache {
    snapshots: Mutex<HashMap<UserId, UserSnapshot>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's snapshot.
    pub fn with_snapshot(self, user: UserId, snapshot: UserSnapshot) -> Self {
        if let Ok(mut map) = self.snapshots.lock() {
            map.insert(user, snapshot);
        }
        self
    }
}

#[async_trait]
impl LocalCache for InMemoryCache {
    async fn read(&self, user: &UserId) -> Result<Option<UserSnapshot>, DialogueError> {
        let map = self
            .snapshots
            .lock()
            .map_err(|e| DialogueError::Cache(format!("cache lock poisoned: {}", e)))?;
        Ok(map.get(user).cloned())
    }

    async fn write(&self, user: &UserId, snapshot: UserSnapshot) -> Result<(), DialogueError> {
        let mut map = self
            .snapshots
            .lock()
            .map_err(|e| DialogueError::Cache(format!("cache lock poisoned: {}", e)))?;
        map.insert(user.clone(), snapshot);
        Ok(())
    }
}

/// One pretty-printed JSON file per user under a directory.
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user: &UserId) -> PathBuf {
        let safe: String = user
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl LocalCache for JsonFileCache {
    async fn read(&self, user: &UserId) -> Result<Option<UserSnapshot>, DialogueError> {
        let path = self.path_for(user);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DialogueError::Cache(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(&self, user: &UserId, snapshot: UserSnapshot) -> Result<(), DialogueError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DialogueError::Cache(format!("failed to create cache dir: {}", e)))?;
        let path = self.path_for(user);
        let content = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DialogueError::Cache(format!("failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: i64) -> CachedTransaction {
        CachedTransaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Expense,
            amount,
            category: Category::Food,
            note: "kopi".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_transaction_mutations() {
        let mut snapshot = UserSnapshot {
            current_balance: 100_000,
            ..Default::default()
        };
        let first = tx(20_000);
        let second = tx(5_000);
        CacheMutation::AdjustBalance(-20_000).apply(&mut snapshot);
        CacheMutation::PrependTransaction(first.clone()).apply(&mut snapshot);
        CacheMutation::PrependTransaction(second.clone()).apply(&mut snapshot);

        assert_eq!(snapshot.current_balance, 80_000);
        assert_eq!(snapshot.transactions[0].id, second.id);

        CacheMutation::RemoveTransaction(second.id).apply(&mut snapshot);
        assert_eq!(snapshot.transactions.len(), 1);
        assert!(snapshot.transaction(first.id).is_some());
    }

    #[test]
    fn test_progress_accumulates_minutes() {
        let project = CachedProject::new("Skripsi");
        let id = project.id;
        let mut snapshot = UserSnapshot::default();
        CacheMutation::AppendProject(project).apply(&mut snapshot);
        for progress in [30, 45] {
            CacheMutation::RecordProgress {
                project_id: id,
                progress,
                minutes: 60,
            }
            .apply(&mut snapshot);
        }
        let project = snapshot.project(id).unwrap();
        assert_eq!(project.progress, 45);
        assert_eq!(project.total_minutes, 120);
    }

    #[test]
    fn test_mutation_on_missing_record_is_noop() {
        let mut snapshot = UserSnapshot::default();
        CacheMutation::SetTaskStatus {
            task_id: Uuid::new_v4(),
            status: TaskStatus::Completed,
        }
        .apply(&mut snapshot);
        assert_eq!(snapshot, UserSnapshot::default());
    }

    #[tokio::test]
    async fn test_apply_mutations_creates_snapshot() {
        let cache = InMemoryCache::new();
        let user = UserId::new("u1");
        apply_mutations(&cache, &user, &[CacheMutation::AdjustBalance(10_000)])
            .await
            .unwrap();
        let snapshot = cache.read(&user).await.unwrap().unwrap();
        assert_eq!(snapshot.current_balance, 10_000);
    }

    #[tokio::test]
    async fn test_json_file_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache"));
        let user = UserId::new("tg:42");

        assert!(cache.read(&user).await.unwrap().is_none());

        let snapshot = UserSnapshot {
            current_balance: 5_000,
            transactions: vec![tx(1_000)],
            ..Default::default()
        };
        cache.write(&user, snapshot.clone()).await.unwrap();

        let reopened = JsonFileCache::new(dir.path().join("cache"));
        assert_eq!(reopened.read(&user).await.unwrap(), Some(snapshot));
        assert!(dir.path().join("cache").join("tg_42.json").exists());
    }

    #[tokio::test]
    async fn test_json_file_cache_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("u1.json"), "not json").unwrap();
        let cache = JsonFileCache::new(dir.path());
        assert!(matches!(
            cache.read(&UserId::new("u1")).await,
            Err(DialogueError::Cache(_))
        ));
    }
}
