//! Ticket activity log entries.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::types::{Ticket, TicketActivity, UpdateTicketRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Created,
    Updated,
    Commented,
    Escalated,
    EmailReceived,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Commented => "commented",
            Self::Escalated => "escalated",
            Self::EmailReceived => "email_received",
        }
    }
}

pub fn entry(
    ticket_id: Uuid,
    actor_id: Option<Uuid>,
    kind: ActivityKind,
    detail: serde_json::Value,
) -> TicketActivity {
    TicketActivity {
        id: Uuid::new_v4(),
        ticket_id,
        actor_id,
        kind: kind.as_str().to_string(),
        detail,
        created_at: Utc::now(),
    }
}

/// `{field: {from, to}}` for every field the update actually changes.
pub fn diff(before: &Ticket, req: &UpdateTicketRequest) -> serde_json::Value {
    let mut changes = serde_json::Map::new();
    let mut record = |name: &str, from: serde_json::Value, to: serde_json::Value| {
        if from != to {
            changes.insert(name.to_string(), json!({ "from": from, "to": to }));
        }
    };
    if let Some(title) = &req.title {
        record("title", json!(before.title), json!(title));
    }
    if let Some(description) = &req.description {
        record("description", json!(before.description), json!(description));
    }
    if let Some(priority) = req.priority {
        record("priority", json!(before.priority), json!(priority.as_str()));
    }
    if let Some(kind) = req.ticket_type {
        record("type", json!(before.ticket_type), json!(kind.as_str()));
    }
    if let Some(state) = req.state_id {
        record("stateId", json!(before.state_id), json!(state));
    }
    if let Some(assignee) = req.assignee_id {
        record("assigneeId", json!(before.assignee_id), json!(assignee));
    }
    if let Some(department) = req.department_id {
        record("departmentId", json!(before.department_id), json!(department));
    }
    serde_json::Value::Object(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpdesk::Priority;

    fn ticket() -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            helpdesk_id: Uuid::nil(),
            department_id: Uuid::nil(),
            form_category_id: None,
            ticket_number: "TKT-000001".into(),
            title: "Old".into(),
            description: None,
            priority: "medium".into(),
            ticket_type: "request".into(),
            source: "web".into(),
            state_id: None,
            assignee_id: None,
            created_by: None,
            custom_fields: json!({}),
            email_message_id: None,
            first_response_at: None,
            resolved_at: None,
            version: 1,
            embedding: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_diff_only_lists_changes() {
        let req = UpdateTicketRequest {
            version: 1,
            title: Some("Old".into()),
            priority: Some(Priority::Urgent),
            ..Default::default()
        };
        let changes = diff(&ticket(), &req);
        let obj = changes.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["priority"], json!({ "from": "medium", "to": "urgent" }));
    }
}
