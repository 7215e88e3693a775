//! Project creation, including the course follow-up and the link sub-loop.
//!
//! `link` accepts a URL or a skip word. A URL asks for its title next; the
//! title stores the pair and asks whether to add another; a yes clears the
//! three link slots and asks for `link` again.

use async_trait::async_trait;
use serde_json::json;
use stacker_core::events::{DomainEvent, EventType};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheMutation, CachedProject};
use crate::error::DialogueError;
use crate::intent::{
    date_of, display_optional, optional_text, text_of, Execution, ExecutionContext, IntentHandler,
};
use crate::normalizer::date::{format_human, format_ymd};
use crate::normalizer::keywords::{parse_priority, parse_project_type};
use crate::types::{
    Intent, PendingRequest, Priority, ProjectLink, ProjectType, Slot, SlotValue,
};

const REQUIRED: &[Slot] = &[
    Slot::Project,
    Slot::ProjectType,
    Slot::Deadline,
    Slot::Priority,
    Slot::Note,
    Slot::Link,
];
const OPTIONAL: &[Slot] = &[Slot::Course, Slot::LinkTitle, Slot::AddMoreLinks];

const DEFAULT_LINK_TITLE: &str = "Ref Link";

pub struct ProjectHandler;

/// Prefix a scheme when the user typed a bare domain.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn project_type_of(request: &PendingRequest) -> Option<ProjectType> {
    text_of(request, Slot::ProjectType).ok().and_then(parse_project_type)
}

/// Collected links plus a filled `link` that never got its title.
fn attachments(request: &PendingRequest) -> Vec<ProjectLink> {
    let mut links = request.links().to_vec();
    if let Some(url) = optional_text(request, Slot::Link) {
        let url = normalize_url(url);
        if !links.iter().any(|l| l.url == url) {
            links.push(ProjectLink {
                url,
                title: DEFAULT_LINK_TITLE.to_string(),
            });
        }
    }
    links
}

#[async_trait]
impl IntentHandler for ProjectHandler {
    fn intent(&self) -> Intent {
        Intent::CreateProject
    }

    fn required_slots(&self) -> &'static [Slot] {
        REQUIRED
    }

    fn optional_slots(&self) -> &'static [Slot] {
        OPTIONAL
    }

    fn on_slot_filled(&self, request: &mut PendingRequest, slot: Slot, value: &SlotValue) {
        match slot {
            Slot::ProjectType => match parse_project_type(value.value.as_text().unwrap_or("")) {
                Some(ProjectType::Course) => request.inject_front(Slot::Course),
                _ => {
                    request.dequeue(Slot::Course);
                    request.unfill(Slot::Course);
                }
            },
            Slot::Link if value.is_skipped() => {
                request.dequeue(Slot::LinkTitle);
                request.dequeue(Slot::AddMoreLinks);
            }
            Slot::Link => request.inject_front(Slot::LinkTitle),
            Slot::LinkTitle => {
                let url = optional_text(request, Slot::Link).map(normalize_url);
                if let Some(url) = url {
                    let title = if value.is_skipped() {
                        DEFAULT_LINK_TITLE.to_string()
                    } else {
                        value.value.as_text().unwrap_or(DEFAULT_LINK_TITLE).to_string()
                    };
                    request.push_link(ProjectLink { url, title });
                    debug!(chat_id = %request.chat_id(), links = request.links().len(), "Project link collected");
                }
                request.inject_front(Slot::AddMoreLinks);
            }
            Slot::AddMoreLinks if value.value.as_flag() == Some(true) => {
                request.unfill(Slot::Link);
                request.unfill(Slot::LinkTitle);
                request.unfill(Slot::AddMoreLinks);
                request.inject_front(Slot::Link);
            }
            _ => {}
        }
    }

    fn build_summary(&self, request: &PendingRequest) -> String {
        let project_type = match project_type_of(request) {
            Some(ProjectType::Course) => {
                format!("Course ({})", text_of(request, Slot::Course).unwrap_or("-"))
            }
            Some(ProjectType::Personal) => "Personal".to_string(),
            None => "-".to_string(),
        };
        let deadline = date_of(request, Slot::Deadline)
            .map(format_human)
            .unwrap_or_else(|_| "-".to_string());
        let links = attachments(request);
        let links = if links.is_empty() {
            "-".to_string()
        } else {
            links
                .iter()
                .map(|l| format!("\n  • {} ({})", l.title, l.url))
                .collect::<String>()
        };

        format!(
            "🚀 *Konfirmasi Project*\n\n📌 Judul: {}\n📂 Jenis: {}\n📅 Deadline: {}\n⚡ Prioritas: {}\n📝 Deskripsi: {}\n🔗 Link: {}\n\nUdah bener?",
            text_of(request, Slot::Project).unwrap_or("-"),
            project_type,
            deadline,
            text_of(request, Slot::Priority).unwrap_or("-"),
            display_optional(request, Slot::Note),
            links
        )
    }

    async fn execute(
        &self,
        request: &PendingRequest,
        ctx: &ExecutionContext,
    ) -> Result<Execution, DialogueError> {
        let title = text_of(request, Slot::Project)?.to_string();
        let project_type = project_type_of(request).unwrap_or(ProjectType::Personal);
        let priority = text_of(request, Slot::Priority)
            .ok()
            .and_then(parse_priority)
            .unwrap_or(Priority::Medium);
        let deadline = date_of(request, Slot::Deadline)?;
        let description = optional_text(request, Slot::Note).unwrap_or_default().to_string();
        let (course, course_id) = match (project_type, request.get(Slot::Course)) {
            (ProjectType::Course, Some(v)) => (
                v.value.as_text().map(str::to_string),
                v.ref_id.clone(),
            ),
            _ => (None, None),
        };
        let links = attachments(request);
        let id = Uuid::new_v4();

        let payload = json!({
            "id": id,
            "title": title,
            "description": description,
            "deadline": format_ymd(deadline),
            "priority": priority,
            "type": project_type,
            "courseId": course_id,
            "courseName": course.clone().unwrap_or_default(),
            "attachments": links,
        });
        let event = DomainEvent::new(
            EventType::ProjectCreated,
            request.user_id().clone(),
            payload,
            ctx.source.clone(),
        )
        .with_id(id);

        let project = CachedProject {
            id,
            title: title.clone(),
            project_type,
            priority,
            deadline: Some(deadline),
            course,
            progress: 0,
            total_minutes: 0,
            links,
        };

        info!(chat_id = %request.chat_id(), title = %title, links = project.links.len(), "Project built");

        Ok(Execution {
            event,
            mutations: vec![CacheMutation::AppendProject(project)],
            success_text: format!("✅ Project \"{}\" siap dilacak! 🚀", title),
        })
    }
}
