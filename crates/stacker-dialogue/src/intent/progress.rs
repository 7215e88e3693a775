//! Progress logging against a cached project.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use stacker_core::events::{DomainEvent, EventType};
use tracing::info;
use uuid::Uuid;

use crate::cache::CacheMutation;
use crate::error::DialogueError;
use crate::intent::{
    data_of, optional_text, text_of, Execution, ExecutionContext, IntentHandler,
};
use crate::normalizer::keywords::{format_minutes, is_skip};
use crate::types::{Intent, PendingRequest, Slot, SlotValue};

const REQUIRED: &[Slot] = &[Slot::Project, Slot::Percentage, Slot::Duration, Slot::Note];

pub struct ProgressHandler;

fn project_id(request: &PendingRequest) -> Result<Uuid, DialogueError> {
    request
        .get(Slot::Project)
        .and_then(|v| v.ref_id.as_deref())
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| DialogueError::Internal("progress logged without a known project".into()))
}

fn percent_of(request: &PendingRequest) -> Result<u8, DialogueError> {
    data_of(request, Slot::Percentage)?
        .as_percent()
        .ok_or_else(|| DialogueError::Internal("progress is not a percentage".into()))
}

fn minutes_of(request: &PendingRequest) -> Result<u32, DialogueError> {
    data_of(request, Slot::Duration)?
        .as_minutes()
        .ok_or_else(|| DialogueError::Internal("duration is not in minutes".into()))
}

#[async_trait]
impl IntentHandler for ProgressHandler {
    fn intent(&self) -> Intent {
        Intent::LogProgress
    }

    fn required_slots(&self) -> &'static [Slot] {
        REQUIRED
    }

    /// The progress note is mandatory.
    fn validate_fill(
        &self,
        _request: &PendingRequest,
        slot: Slot,
        value: &SlotValue,
    ) -> Result<(), DialogueError> {
        if slot == Slot::Note && (value.is_skipped() || is_skip(&value.raw)) {
            return Err(DialogueError::validation(
                slot,
                "Keterangan progress wajib diisi ya.",
            ));
        }
        Ok(())
    }

    fn build_summary(&self, request: &PendingRequest) -> String {
        let percent = percent_of(request)
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|_| "-".to_string());
        let duration = minutes_of(request)
            .map(format_minutes)
            .unwrap_or_else(|_| "-".to_string());

        format!(
            "📈 *Konfirmasi Progress*\n\n📌 Project: {}\n📊 Progress: {}\n⏱️ Durasi: {}\n📝 Catatan: {}\n\nUdah bener?",
            text_of(request, Slot::Project).unwrap_or("-"),
            percent,
            duration,
            optional_text(request, Slot::Note).unwrap_or("-")
        )
    }

    async fn execute(
        &self,
        request: &PendingRequest,
        ctx: &ExecutionContext,
    ) -> Result<Execution, DialogueError> {
        let project_id = project_id(request)?;
        let title = text_of(request, Slot::Project)?.to_string();
        let progress = percent_of(request)?;
        let minutes = minutes_of(request)?;
        let note = optional_text(request, Slot::Note).unwrap_or_default().to_string();
        let status = if progress >= 100 { "completed" } else { "active" };

        let payload = json!({
            "projectId": project_id,
            "progress": progress,
            "duration": minutes,
            "note": note,
            "status": status,
            "loggedAt": Utc::now().to_rfc3339(),
        });
        let event = DomainEvent::new(
            EventType::ProgressLogged,
            request.user_id().clone(),
            payload,
            ctx.source.clone(),
        );

        info!(chat_id = %request.chat_id(), project = %project_id, progress, minutes, "Progress built");

        let mut success_text = format!(
            "✅ Nice! Progress {} sekarang {}% 💪\n⏱️ {}",
            title,
            progress,
            format_minutes(minutes)
        );
        if progress >= 100 {
            success_text.push_str("\n🎉 Project selesai!");
        }

        Ok(Execution {
            event,
            mutations: vec![CacheMutation::RecordProgress {
                project_id,
                progress,
                minutes,
            }],
            success_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SlotData, SlotValue};
    use chrono::NaiveDate;
    use stacker_core::types::{ChatId, UserId};

    fn request(project: SlotValue, percent: u8) -> PendingRequest {
        let mut request =
            PendingRequest::new(ChatId(1), UserId::new("u1"), Intent::LogProgress, "catat progress");
        request.fill(Slot::Project, project);
        request.fill(Slot::Percentage, SlotValue::new(SlotData::Percent(percent), "x"));
        request.fill(Slot::Duration, SlotValue::new(SlotData::Minutes(90), "1.5 jam"));
        request.fill(Slot::Note, SlotValue::text("bab 2"));
        request
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            today: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            source: "telegram".to_string(),
        }
    }

    #[tokio::test]
    async fn test_progress_event() {
        let id = Uuid::new_v4();
        let project = SlotValue::text("Skripsi").resolved(Some(id.to_string()));
        let done = ProgressHandler.execute(&request(project, 100), &ctx()).await.unwrap();

        assert_eq!(done.event.event_type, EventType::ProgressLogged);
        assert_eq!(done.event.payload["projectId"], id.to_string());
        assert_eq!(done.event.payload["duration"], 90);
        assert_eq!(done.event.payload["status"], "completed");
        assert_eq!(
            done.mutations,
            vec![CacheMutation::RecordProgress {
                project_id: id,
                progress: 100,
                minutes: 90
            }]
        );
        assert!(done.success_text.contains("1 jam 30 menit"));
    }

    #[tokio::test]
    async fn test_unknown_project_fails() {
        let project = SlotValue::text("Skripsi");
        assert!(ProgressHandler.execute(&request(project, 40), &ctx()).await.is_err());
    }

    #[test]
    fn test_summary() {
        let project = SlotValue::text("Skripsi").resolved(Some(Uuid::new_v4().to_string()));
        let summary = ProgressHandler.build_summary(&request(project, 40));
        assert!(summary.contains("Skripsi"));
        assert!(summary.contains("40%"));
        assert!(summary.contains("bab 2"));
    }
}
