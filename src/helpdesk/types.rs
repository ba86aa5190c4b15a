use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::shared::schema::{
    department_hierarchy, departments, helpdesks, inbound_email_configs, sla_states,
    ticket_form_categories, webhooks,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = departments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub head_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parent to child link. A `None` parent marks an explicit top-level entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = department_hierarchy)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct HierarchyEdge {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub tenant_id: Uuid,
    pub parent_department_id: Option<Uuid>,
    pub child_department_id: Uuid,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = helpdesks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Helpdesk {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub tenant_id: Uuid,
    pub department_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub public_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = sla_states)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct SlaState {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub name: String,
    pub color: String,
    #[diesel(column_name = sort_order)]
    pub order: i32,
    pub is_final: bool,
    pub is_default: bool,
    pub target_hours: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaPolicy {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub priority: Priority,
    pub first_response_hours: i32,
    pub resolution_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = ticket_form_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct FormCategory {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[diesel(column_name = sort_order)]
    pub order: i32,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = inbound_email_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct InboundEmailConfig {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub address: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    pub auto_reply: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub tenant_id: Uuid,
    pub helpdesk_id: Option<Uuid>,
    pub url: String,
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub events: Vec<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub head_user_id: Option<Uuid>,
    /// Convenience: also link the new department under this parent.
    pub parent_department_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHierarchyEdgeRequest {
    pub parent_department_id: Option<Uuid>,
    pub child_department_id: Uuid,
    pub relation_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHelpdeskRequest {
    pub department_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub public_access: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = helpdesks)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHelpdeskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub public_access: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlaStateRequest {
    pub name: String,
    pub color: Option<String>,
    pub order: Option<i32>,
    pub is_final: Option<bool>,
    pub is_default: Option<bool>,
    pub target_hours: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSlaPolicyRequest {
    pub priority: Priority,
    pub first_response_hours: i32,
    pub resolution_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmailConfigRequest {
    pub address: String,
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub auto_reply: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    pub helpdesk_id: Option<Uuid>,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_and_order() {
        assert_eq!("URGENT".parse::<Priority>(), Ok(Priority::Urgent));
        assert_eq!(" low ".parse::<Priority>(), Ok(Priority::Low));
        assert!("critical".parse::<Priority>().is_err());
        assert!(Priority::Urgent > Priority::High);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_priority_serde_lowercase() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: Priority = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, Priority::Medium);
    }
}
