//! Course task creation.

use async_trait::async_trait;
use serde_json::json;
use stacker_core::events::{DomainEvent, EventType};
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheMutation, CachedTask};
use crate::error::DialogueError;
use crate::intent::{
    date_of, display_optional, optional_text, text_of, Execution, ExecutionContext, IntentHandler,
    SlotSeed,
};
use crate::normalizer::ExtractedEntities;
use crate::normalizer::date::{format_human, format_ymd};
use crate::types::{Intent, PendingRequest, Resolution, Slot, SlotValue, TaskStatus};

const REQUIRED: &[Slot] = &[Slot::Course, Slot::Deadline, Slot::TaskType];
const OPTIONAL: &[Slot] = &[Slot::Note];

const REPORT_TYPES: &[&str] = &["Laporan Resmi", "Laporan Sementara", "Laporan Pendahuluan"];

pub struct TaskHandler;

/// Reports only exist for lab and workshop courses.
fn report_mismatch(course: &str, task_type: &str) -> Option<String> {
    let course_lower = course.to_lowercase();
    let practical = course_lower.contains("praktikum") || course_lower.contains("workshop");
    if REPORT_TYPES.contains(&task_type) && !practical {
        Some(format!(
            "\"{}\" cuma bisa buat matkul Praktikum/Workshop, sedangkan {} itu matkul teori. Pilih tipe lain ya.",
            task_type, course
        ))
    } else {
        None
    }
}

#[async_trait]
impl IntentHandler for TaskHandler {
    fn intent(&self) -> Intent {
        Intent::CreateTask
    }

    fn required_slots(&self) -> &'static [Slot] {
        REQUIRED
    }

    fn optional_slots(&self) -> &'static [Slot] {
        OPTIONAL
    }

    fn compute_initial_slots(&self, extracted: &ExtractedEntities) -> SlotSeed {
        let mut seed = SlotSeed::default();
        let course = extracted.get(Slot::Course).and_then(|v| v.value.as_text());
        for slot in REQUIRED.iter().chain(OPTIONAL) {
            let value = extracted.get(*slot).filter(|v| {
                *slot != Slot::TaskType
                    || match (course, v.value.as_text()) {
                        (Some(course), Some(task_type)) => {
                            report_mismatch(course, task_type).is_none()
                        }
                        _ => true,
                    }
            });
            match value {
                Some(value) => seed.filled.push((*slot, value.clone())),
                None if REQUIRED.contains(slot) => seed.missing.push(*slot),
                None => {}
            }
        }
        seed
    }

    fn validate_fill(
        &self,
        request: &PendingRequest,
        slot: Slot,
        value: &SlotValue,
    ) -> Result<(), DialogueError> {
        let (course, task_type) = match slot {
            Slot::TaskType => (text_of(request, Slot::Course).ok(), value.value.as_text()),
            Slot::Course => (value.value.as_text(), text_of(request, Slot::TaskType).ok()),
            _ => return Ok(()),
        };
        match (course, task_type) {
            (Some(course), Some(task_type)) => match report_mismatch(course, task_type) {
                Some(reason) => Err(DialogueError::validation(slot, reason)),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn build_summary(&self, request: &PendingRequest) -> String {
        let course = match request.get(Slot::Course) {
            Some(v) if v.resolution == Resolution::Miss => {
                format!("{} (belum terdaftar)", v.value.as_text().unwrap_or("-"))
            }
            Some(v) => v.value.as_text().unwrap_or("-").to_string(),
            None => "-".to_string(),
        };
        let deadline = date_of(request, Slot::Deadline)
            .map(format_human)
            .unwrap_or_else(|_| "-".to_string());

        format!(
            "📝 *Konfirmasi Tugas*\n\n📚 Matkul: {}\n🏷️ Tipe: {}\n📅 Deadline: {}\n📄 Note: {}\n\nUdah bener?",
            course,
            text_of(request, Slot::TaskType).unwrap_or("-"),
            deadline,
            display_optional(request, Slot::Note)
        )
    }

    async fn execute(
        &self,
        request: &PendingRequest,
        ctx: &ExecutionContext,
    ) -> Result<Execution, DialogueError> {
        let course_value = request
            .get(Slot::Course)
            .ok_or_else(|| DialogueError::Internal("task executed without a course".into()))?;
        let course = text_of(request, Slot::Course)?.to_string();
        let course_id = course_value.ref_id.clone();
        let task_type = text_of(request, Slot::TaskType)?.to_string();
        let deadline = date_of(request, Slot::Deadline)?;
        let note = optional_text(request, Slot::Note).map(str::to_string);
        let id = Uuid::new_v4();

        let payload = json!({
            "id": id,
            "courseId": course_id,
            "courseName": course,
            "type": task_type,
            "deadline": format_ymd(deadline),
            "notes": note.clone().unwrap_or_default(),
            "completed": false,
        });
        let event = DomainEvent::new(
            EventType::TaskCreated,
            request.user_id().clone(),
            payload,
            ctx.source.clone(),
        )
        .with_id(id);

        let task = CachedTask {
            id,
            title: format!("{} {}", task_type, course),
            course: course.clone(),
            course_id,
            task_type: task_type.clone(),
            deadline,
            status: TaskStatus::Pending,
            note,
        };

        info!(chat_id = %request.chat_id(), course = %course, deadline = %format_ymd(deadline), "Task built");

        Ok(Execution {
            event,
            mutations: vec![CacheMutation::AppendTask(task)],
            success_text: format!(
                "✅ Siapp! {} {} deadline {} udah dicatet 📝\nSemangat ngerjainnya! 🔥",
                task_type,
                course,
                format_human(deadline)
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SlotData, SlotValue};
    use chrono::NaiveDate;
    use stacker_core::types::{ChatId, UserId};

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            today: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            source: "telegram".to_string(),
        }
    }

    fn request(course: SlotValue) -> PendingRequest {
        let mut request =
            PendingRequest::new(ChatId(1), UserId::new("u1"), Intent::CreateTask, "tugas");
        request.fill(Slot::Course, course);
        request.fill(
            Slot::Deadline,
            SlotValue::new(SlotData::Date(NaiveDate::from_ymd_opt(2025, 1, 16).unwrap()), "besok"),
        );
        request.fill(Slot::TaskType, SlotValue::text("Tugas"));
        request
    }

    #[tokio::test]
    async fn test_task_payload() {
        let course = SlotValue::text("Database").resolved(Some("c1".to_string()));
        let done = TaskHandler.execute(&request(course), &ctx()).await.unwrap();

        assert_eq!(done.event.event_type, EventType::TaskCreated);
        assert_eq!(done.event.payload["deadline"], "2025-01-16");
        assert_eq!(done.event.payload["courseId"], "c1");
        assert_eq!(done.event.payload["courseName"], "Database");
        assert_eq!(done.event.payload["notes"], "");
        match &done.mutations[0] {
            CacheMutation::AppendTask(task) => {
                assert_eq!(task.status, TaskStatus::Pending);
                assert_eq!(task.id, done.event.event_id);
            }
            other => panic!("unexpected mutation {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unresolved_course_has_null_id() {
        let course = SlotValue::text("Kalkulus 3").missed();
        let done = TaskHandler.execute(&request(course), &ctx()).await.unwrap();
        assert!(done.event.payload["courseId"].is_null());
        assert_eq!(done.event.payload["courseName"], "Kalkulus 3");
    }

    #[test]
    fn test_report_needs_practical_course() {
        let req = request(SlotValue::text("Database"));
        let lapres = SlotValue::text("Laporan Resmi");
        assert!(TaskHandler.validate_fill(&req, Slot::TaskType, &lapres).is_err());

        let req = request(SlotValue::text("Praktikum Jaringan"));
        assert!(TaskHandler.validate_fill(&req, Slot::TaskType, &lapres).is_ok());
    }

    #[test]
    fn test_seed_drops_mismatched_report_type() {
        let mut extracted = ExtractedEntities::default();
        extracted.insert(Slot::Course, SlotValue::text("Database"));
        extracted.insert(Slot::TaskType, SlotValue::text("Laporan Sementara"));
        let seed = TaskHandler.compute_initial_slots(&extracted);
        assert_eq!(seed.missing, vec![Slot::Deadline, Slot::TaskType]);
        assert_eq!(seed.filled.len(), 1);
    }

    #[test]
    fn test_summary_flags_unknown_course() {
        let summary = TaskHandler.build_summary(&request(SlotValue::text("Kalkulus 3").missed()));
        assert!(summary.contains("Kalkulus 3 (belum terdaftar)"));
        assert!(summary.contains("16 Jan 2025"));
    }
}
