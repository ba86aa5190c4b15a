use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::shared::schema::{ticket_activity, ticket_comments, ticket_escalations, tickets};
use crate::helpdesk::escalation::TicketSnapshot;
use crate::helpdesk::sla::SlaClock;
use crate::helpdesk::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Incident,
    #[default]
    Request,
    Question,
    Problem,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Request => "request",
            Self::Question => "question",
            Self::Problem => "problem",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incident" => Ok(Self::Incident),
            "request" => Ok(Self::Request),
            "question" => Ok(Self::Question),
            "problem" => Ok(Self::Problem),
            other => Err(format!("unknown ticket type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSource {
    #[default]
    Web,
    Email,
    Api,
    Phone,
}

impl TicketSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Email => "email",
            Self::Api => "api",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for TicketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub tenant_id: Uuid,
    pub helpdesk_id: Uuid,
    pub department_id: Uuid,
    pub form_category_id: Option<Uuid>,
    pub ticket_number: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub ticket_type: String,
    pub source: String,
    pub state_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub custom_fields: serde_json::Value,
    pub email_message_id: Option<String>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub version: i32,
    #[serde(skip, default)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn priority(&self) -> Priority {
        self.priority.parse().unwrap_or_default()
    }

    /// Text fed to the embedding provider.
    pub fn embedding_text(&self) -> String {
        match &self.description {
            Some(d) if !d.trim().is_empty() => format!("{}\n\n{}", self.title, d),
            _ => self.title.clone(),
        }
    }

    pub fn sla_clock(&self, in_final_state: bool) -> SlaClock {
        SlaClock {
            created_at: self.created_at,
            first_response_at: self.first_response_at,
            resolved_at: self.resolved_at,
            in_final_state,
        }
    }

    pub fn snapshot(&self, sla_breached: bool) -> TicketSnapshot {
        TicketSnapshot {
            id: self.id,
            priority: self.priority(),
            ticket_type: self.ticket_type.clone(),
            source: self.source.clone(),
            state_id: self.state_id,
            department_id: self.department_id,
            assignee_id: self.assignee_id,
            title: self.title.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            first_response_at: self.first_response_at,
            sla_breached,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = ticket_comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub content: String,
    pub is_internal: bool,
    pub source: String,
    pub email_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = ticket_activity)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct TicketActivity {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = ticket_escalations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TicketEscalation {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub rule_id: Uuid,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub helpdesk_id: Uuid,
    pub form_category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub ticket_type: TicketType,
    /// Overrides the helpdesk's department, e.g. an AI-suggested sub-department.
    pub department_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    /// The version the caller last saw; a mismatch is a conflict.
    pub version: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub ticket_type: Option<TicketType>,
    pub state_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTicketsQuery {
    pub helpdesk_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub comments: Vec<TicketComment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTicketRequest = serde_json::from_value(serde_json::json!({
            "helpdeskId": "550e8400-e29b-41d4-a716-446655440000",
            "title": "Laptop will not boot"
        }))
        .unwrap();
        assert_eq!(req.priority, Priority::Medium);
        assert_eq!(req.ticket_type, TicketType::Request);
        assert!(req.custom_fields.is_empty());
        assert!(req.form_category_id.is_none());
    }

    #[test]
    fn test_ticket_type_round_trip_names() {
        assert_eq!("incident".parse::<TicketType>(), Ok(TicketType::Incident));
        assert!("bug".parse::<TicketType>().is_err());
        assert_eq!(TicketSource::Email.to_string(), "email");
    }
}
