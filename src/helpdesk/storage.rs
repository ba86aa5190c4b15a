//! Diesel queries for departments and helpdesk configuration.
//!
//! Everything here is blocking and runs inside `run_db`. Rows hanging off a
//! helpdesk are only reachable after [`get_helpdesk`] has confirmed the
//! helpdesk belongs to the caller's tenant.

use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use uuid::Uuid;

use super::error::HelpdeskError;
use super::escalation::{DbEscalationCondition, DbEscalationRule, EscalationRule};
use super::forms::{DbFormField, FormField};
use super::hierarchy::DepartmentGraph;
use super::sla::DbSlaPolicy;
use super::types::*;
use crate::core::shared::schema::{
    department_hierarchy, departments, escalation_conditions, escalation_rules, helpdesks,
    inbound_email_configs, sla_policies, sla_states, ticket_form_categories, ticket_form_fields,
    webhooks,
};

pub const DEFAULT_RELATION: &str = "subdivision";

// departments

pub fn list_departments(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> Result<Vec<Department>, HelpdeskError> {
    Ok(departments::table
        .filter(departments::tenant_id.eq(tenant_id))
        .order(departments::name.asc())
        .select(Department::as_select())
        .load(conn)?)
}

pub fn get_department(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Department, HelpdeskError> {
    departments::table
        .filter(departments::tenant_id.eq(tenant_id))
        .filter(departments::id.eq(id))
        .select(Department::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| HelpdeskError::NotFound(format!("department {id}")))
}

pub fn list_edges(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> Result<Vec<HierarchyEdge>, HelpdeskError> {
    Ok(department_hierarchy::table
        .filter(department_hierarchy::tenant_id.eq(tenant_id))
        .order(department_hierarchy::created_at.asc())
        .select(HierarchyEdge::as_select())
        .load(conn)?)
}

pub fn load_graph(conn: &mut PgConnection, tenant_id: Uuid) -> Result<DepartmentGraph, HelpdeskError> {
    Ok(DepartmentGraph::from_edges(&list_edges(conn, tenant_id)?))
}

fn insert_edge_unchecked(
    conn: &mut PgConnection,
    edge: &HierarchyEdge,
) -> Result<HierarchyEdge, HelpdeskError> {
    Ok(diesel::insert_into(department_hierarchy::table)
        .values(edge)
        .returning(HierarchyEdge::as_returning())
        .get_result(conn)?)
}

/// Self-edges and edges closing a cycle are conflicts.
pub fn ensure_acyclic(graph: &DepartmentGraph, parent: Uuid, child: Uuid) -> Result<(), HelpdeskError> {
    graph
        .check_edge(parent, child)
        .map_err(|e| HelpdeskError::Conflict(e.to_string()))
}

/// Inserts an edge after checking tenant ownership and that it keeps the graph acyclic.
pub fn create_edge(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    req: CreateHierarchyEdgeRequest,
) -> Result<HierarchyEdge, HelpdeskError> {
    conn.transaction(|conn| {
        get_department(conn, tenant_id, req.child_department_id)?;
        if let Some(parent) = req.parent_department_id {
            get_department(conn, tenant_id, parent)?;
            ensure_acyclic(&load_graph(conn, tenant_id)?, parent, req.child_department_id)?;
        }
        let edge = HierarchyEdge {
            id: Uuid::new_v4(),
            tenant_id,
            parent_department_id: req.parent_department_id,
            child_department_id: req.child_department_id,
            relation_type: req
                .relation_type
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RELATION.to_string()),
            created_at: Utc::now(),
        };
        insert_edge_unchecked(conn, &edge)
    })
}

pub fn delete_edge(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), HelpdeskError> {
    let deleted = diesel::delete(
        department_hierarchy::table
            .filter(department_hierarchy::tenant_id.eq(tenant_id))
            .filter(department_hierarchy::id.eq(id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(HelpdeskError::NotFound(format!("hierarchy edge {id}")));
    }
    Ok(())
}

pub fn create_department(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    req: CreateDepartmentRequest,
) -> Result<Department, HelpdeskError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(HelpdeskError::Validation("department name is required".to_string()));
    }
    conn.transaction(|conn| {
        if let Some(parent) = req.parent_department_id {
            get_department(conn, tenant_id, parent)?;
        }
        let now = Utc::now();
        let department = Department {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            description: req.description,
            color: req.color,
            head_user_id: req.head_user_id,
            created_at: now,
            updated_at: now,
        };
        let department: Department = diesel::insert_into(departments::table)
            .values(&department)
            .returning(Department::as_returning())
            .get_result(conn)?;

        // a brand-new department has no edges yet, so this link cannot close a cycle
        if let Some(parent) = req.parent_department_id {
            insert_edge_unchecked(
                conn,
                &HierarchyEdge {
                    id: Uuid::new_v4(),
                    tenant_id,
                    parent_department_id: Some(parent),
                    child_department_id: department.id,
                    relation_type: DEFAULT_RELATION.to_string(),
                    created_at: now,
                },
            )?;
        }
        Ok(department)
    })
}

// helpdesks

pub fn list_helpdesks(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<Helpdesk>, HelpdeskError> {
    Ok(helpdesks::table
        .filter(helpdesks::tenant_id.eq(tenant_id))
        .order(helpdesks::name.asc())
        .select(Helpdesk::as_select())
        .load(conn)?)
}

/// Enabled helpdesks of every tenant, for the escalation sweeper.
pub fn list_enabled_helpdesks(conn: &mut PgConnection) -> Result<Vec<Helpdesk>, HelpdeskError> {
    Ok(helpdesks::table
        .filter(helpdesks::enabled.eq(true))
        .select(Helpdesk::as_select())
        .load(conn)?)
}

pub fn get_helpdesk(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Helpdesk, HelpdeskError> {
    helpdesks::table
        .filter(helpdesks::tenant_id.eq(tenant_id))
        .filter(helpdesks::id.eq(id))
        .select(Helpdesk::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| HelpdeskError::NotFound(format!("helpdesk {id}")))
}

pub fn create_helpdesk(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    req: CreateHelpdeskRequest,
) -> Result<Helpdesk, HelpdeskError> {
    if req.name.trim().is_empty() {
        return Err(HelpdeskError::Validation("helpdesk name is required".to_string()));
    }
    get_department(conn, tenant_id, req.department_id)?;
    let now = Utc::now();
    let helpdesk = Helpdesk {
        id: Uuid::new_v4(),
        tenant_id,
        department_id: req.department_id,
        name: req.name.trim().to_string(),
        description: req.description,
        enabled: req.enabled.unwrap_or(true),
        public_access: req.public_access.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(helpdesks::table)
        .values(&helpdesk)
        .returning(Helpdesk::as_returning())
        .get_result(conn)
        .map_err(|e| match HelpdeskError::from(e) {
            HelpdeskError::Conflict(_) => HelpdeskError::Conflict(format!(
                "department {} already has a helpdesk",
                req.department_id
            )),
            other => other,
        })
}

pub fn update_helpdesk(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    req: UpdateHelpdeskRequest,
) -> Result<Helpdesk, HelpdeskError> {
    get_helpdesk(conn, tenant_id, id)?;
    let target = helpdesks::table
        .filter(helpdesks::tenant_id.eq(tenant_id))
        .filter(helpdesks::id.eq(id));
    let nothing_to_change = req.name.is_none()
        && req.description.is_none()
        && req.enabled.is_none()
        && req.public_access.is_none();
    if nothing_to_change {
        diesel::update(target)
            .set(helpdesks::updated_at.eq(Utc::now()))
            .execute(conn)?;
    } else {
        diesel::update(target)
            .set((&req, helpdesks::updated_at.eq(Utc::now())))
            .execute(conn)?;
    }
    get_helpdesk(conn, tenant_id, id)
}

// SLA states and policies

pub fn list_states(conn: &mut PgConnection, helpdesk_id: Uuid) -> Result<Vec<SlaState>, HelpdeskError> {
    Ok(sla_states::table
        .filter(sla_states::helpdesk_id.eq(helpdesk_id))
        .order((sla_states::sort_order.asc(), sla_states::created_at.asc()))
        .select(SlaState::as_select())
        .load(conn)?)
}

pub fn get_state(conn: &mut PgConnection, helpdesk_id: Uuid, id: Uuid) -> Result<SlaState, HelpdeskError> {
    sla_states::table
        .filter(sla_states::helpdesk_id.eq(helpdesk_id))
        .filter(sla_states::id.eq(id))
        .select(SlaState::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            HelpdeskError::Validation(format!("state {id} does not belong to helpdesk {helpdesk_id}"))
        })
}

pub fn create_state(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    req: CreateSlaStateRequest,
) -> Result<SlaState, HelpdeskError> {
    if req.name.trim().is_empty() {
        return Err(HelpdeskError::Validation("state name is required".to_string()));
    }
    if req.target_hours.is_some_and(|h| h < 0) {
        return Err(HelpdeskError::Validation("target hours cannot be negative".to_string()));
    }
    let state = SlaState {
        id: Uuid::new_v4(),
        helpdesk_id,
        name: req.name.trim().to_string(),
        color: req.color.unwrap_or_else(|| "#64748b".to_string()),
        order: req.order.unwrap_or(0),
        is_final: req.is_final.unwrap_or(false),
        is_default: req.is_default.unwrap_or(false),
        target_hours: req.target_hours,
        created_at: Utc::now(),
    };
    // At most one default per helpdesk.
    conn.transaction::<_, HelpdeskError, _>(|conn| {
        if state.is_default {
            diesel::update(sla_states::table.filter(sla_states::helpdesk_id.eq(helpdesk_id)))
                .set(sla_states::is_default.eq(false))
                .execute(conn)?;
        }
        Ok(diesel::insert_into(sla_states::table)
            .values(&state)
            .returning(SlaState::as_returning())
            .get_result(conn)?)
    })
}

pub fn list_policies(conn: &mut PgConnection, helpdesk_id: Uuid) -> Result<Vec<SlaPolicy>, HelpdeskError> {
    let rows: Vec<DbSlaPolicy> = sla_policies::table
        .filter(sla_policies::helpdesk_id.eq(helpdesk_id))
        .select(DbSlaPolicy::as_select())
        .load(conn)?;
    let mut policies = rows
        .into_iter()
        .map(SlaPolicy::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(HelpdeskError::Internal)?;
    policies.sort_by_key(|p| p.priority);
    Ok(policies)
}

/// One policy per priority; posting an existing priority replaces its hours.
pub fn upsert_policy(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    req: UpsertSlaPolicyRequest,
) -> Result<SlaPolicy, HelpdeskError> {
    if req.first_response_hours <= 0 || req.resolution_hours <= 0 {
        return Err(HelpdeskError::Validation("SLA hours must be positive".to_string()));
    }
    if req.first_response_hours > req.resolution_hours {
        return Err(HelpdeskError::Validation(
            "first response cannot be due after resolution".to_string(),
        ));
    }
    let now = Utc::now();
    let row = DbSlaPolicy {
        id: Uuid::new_v4(),
        helpdesk_id,
        priority: req.priority.to_string(),
        first_response_hours: req.first_response_hours,
        resolution_hours: req.resolution_hours,
        created_at: now,
        updated_at: now,
    };
    let saved: DbSlaPolicy = diesel::insert_into(sla_policies::table)
        .values(&row)
        .on_conflict((sla_policies::helpdesk_id, sla_policies::priority))
        .do_update()
        .set((
            sla_policies::first_response_hours.eq(excluded(sla_policies::first_response_hours)),
            sla_policies::resolution_hours.eq(excluded(sla_policies::resolution_hours)),
            sla_policies::updated_at.eq(now),
        ))
        .returning(DbSlaPolicy::as_returning())
        .get_result(conn)?;
    SlaPolicy::try_from(saved).map_err(HelpdeskError::Internal)
}

// escalation rules

pub fn list_rules(conn: &mut PgConnection, helpdesk_id: Uuid) -> Result<Vec<EscalationRule>, HelpdeskError> {
    let rows: Vec<DbEscalationRule> = escalation_rules::table
        .filter(escalation_rules::helpdesk_id.eq(helpdesk_id))
        .order(escalation_rules::sort_order.asc())
        .select(DbEscalationRule::as_select())
        .load(conn)?;
    let rule_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut conditions: Vec<DbEscalationCondition> = escalation_conditions::table
        .filter(escalation_conditions::rule_id.eq_any(&rule_ids))
        .select(DbEscalationCondition::as_select())
        .load(conn)?;

    rows.into_iter()
        .map(|row| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                conditions.drain(..).partition(|c| c.rule_id == row.id);
            conditions = rest;
            EscalationRule::from_row(row, mine).map_err(HelpdeskError::Internal)
        })
        .collect()
}

pub fn create_rule(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    rule: &EscalationRule,
) -> Result<(), HelpdeskError> {
    if let Some(state) = rule.from_state_id {
        get_state(conn, helpdesk_id, state)?;
    }
    let (row, conditions) = rule.to_row();
    conn.transaction(|conn| {
        diesel::insert_into(escalation_rules::table)
            .values(&row)
            .execute(conn)?;
        if !conditions.is_empty() {
            diesel::insert_into(escalation_conditions::table)
                .values(&conditions)
                .execute(conn)?;
        }
        Ok(())
    })
}

// form categories and fields

pub fn list_categories(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
) -> Result<Vec<FormCategory>, HelpdeskError> {
    Ok(ticket_form_categories::table
        .filter(ticket_form_categories::helpdesk_id.eq(helpdesk_id))
        .order(ticket_form_categories::sort_order.asc())
        .select(FormCategory::as_select())
        .load(conn)?)
}

/// A category only counts when it belongs to `helpdesk_id`.
pub fn get_category(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    id: Uuid,
) -> Result<FormCategory, HelpdeskError> {
    ticket_form_categories::table
        .filter(ticket_form_categories::helpdesk_id.eq(helpdesk_id))
        .filter(ticket_form_categories::id.eq(id))
        .select(FormCategory::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            HelpdeskError::Validation(format!(
                "form category {id} does not belong to helpdesk {helpdesk_id}"
            ))
        })
}

/// Looks a category up by id alone and checks its helpdesk against the tenant.
pub fn get_category_for_tenant(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<FormCategory, HelpdeskError> {
    let category: FormCategory = ticket_form_categories::table
        .filter(ticket_form_categories::id.eq(id))
        .select(FormCategory::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| HelpdeskError::NotFound(format!("form category {id}")))?;
    get_helpdesk(conn, tenant_id, category.helpdesk_id)
        .map_err(|_| HelpdeskError::NotFound(format!("form category {id}")))?;
    Ok(category)
}

pub fn create_category(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    req: CreateFormCategoryRequest,
) -> Result<FormCategory, HelpdeskError> {
    if req.name.trim().is_empty() {
        return Err(HelpdeskError::Validation("category name is required".to_string()));
    }
    let category = FormCategory {
        id: Uuid::new_v4(),
        helpdesk_id,
        name: req.name.trim().to_string(),
        description: req.description,
        order: req.order.unwrap_or(0),
        icon: req.icon,
        color: req.color,
        enabled: req.enabled.unwrap_or(true),
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(ticket_form_categories::table)
        .values(&category)
        .returning(FormCategory::as_returning())
        .get_result(conn)?)
}

fn to_fields(rows: Vec<DbFormField>) -> Result<Vec<FormField>, HelpdeskError> {
    rows.into_iter()
        .map(FormField::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(HelpdeskError::Internal)
}

pub fn list_fields(conn: &mut PgConnection, helpdesk_id: Uuid) -> Result<Vec<FormField>, HelpdeskError> {
    let rows: Vec<DbFormField> = ticket_form_fields::table
        .filter(ticket_form_fields::helpdesk_id.eq(helpdesk_id))
        .order(ticket_form_fields::sort_order.asc())
        .select(DbFormField::as_select())
        .load(conn)?;
    to_fields(rows)
}

pub fn list_category_fields(
    conn: &mut PgConnection,
    category_id: Uuid,
) -> Result<Vec<FormField>, HelpdeskError> {
    let rows: Vec<DbFormField> = ticket_form_fields::table
        .filter(ticket_form_fields::form_category_id.eq(category_id))
        .order(ticket_form_fields::sort_order.asc())
        .select(DbFormField::as_select())
        .load(conn)?;
    to_fields(rows)
}

pub fn create_field(conn: &mut PgConnection, field: &FormField) -> Result<FormField, HelpdeskError> {
    if let Some(category) = field.form_category_id {
        get_category(conn, field.helpdesk_id, category)?;
    }
    let duplicate: i64 = ticket_form_fields::table
        .filter(ticket_form_fields::helpdesk_id.eq(field.helpdesk_id))
        .filter(ticket_form_fields::field_key.eq(&field.key))
        .count()
        .get_result(conn)?;
    if duplicate > 0 {
        return Err(HelpdeskError::Conflict(format!("field key '{}' already exists", field.key)));
    }
    let row: DbFormField = diesel::insert_into(ticket_form_fields::table)
        .values(&DbFormField::from(field))
        .returning(DbFormField::as_returning())
        .get_result(conn)?;
    FormField::try_from(row).map_err(HelpdeskError::Internal)
}

// inbound email

pub fn list_email_configs(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
) -> Result<Vec<InboundEmailConfig>, HelpdeskError> {
    Ok(inbound_email_configs::table
        .filter(inbound_email_configs::helpdesk_id.eq(helpdesk_id))
        .order(inbound_email_configs::created_at.asc())
        .select(InboundEmailConfig::as_select())
        .load(conn)?)
}

pub fn create_email_config(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    req: CreateEmailConfigRequest,
) -> Result<InboundEmailConfig, HelpdeskError> {
    let address = req.address.trim().to_ascii_lowercase();
    if !address.contains('@') {
        return Err(HelpdeskError::Validation(format!("'{address}' is not an email address")));
    }
    let config = InboundEmailConfig {
        id: Uuid::new_v4(),
        helpdesk_id,
        address,
        display_name: req.display_name,
        enabled: req.enabled.unwrap_or(true),
        auto_reply: req.auto_reply.unwrap_or(false),
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(inbound_email_configs::table)
        .values(&config)
        .returning(InboundEmailConfig::as_returning())
        .get_result(conn)?)
}

pub fn find_email_config(
    conn: &mut PgConnection,
    helpdesk_id: Uuid,
    address: &str,
) -> Result<Option<InboundEmailConfig>, HelpdeskError> {
    Ok(inbound_email_configs::table
        .filter(inbound_email_configs::helpdesk_id.eq(helpdesk_id))
        .filter(inbound_email_configs::address.eq(address.trim().to_ascii_lowercase()))
        .select(InboundEmailConfig::as_select())
        .first(conn)
        .optional()?)
}

// webhooks

pub fn list_webhooks(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<Webhook>, HelpdeskError> {
    Ok(webhooks::table
        .filter(webhooks::tenant_id.eq(tenant_id))
        .order(webhooks::created_at.asc())
        .select(Webhook::as_select())
        .load(conn)?)
}

pub fn create_webhook(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    req: CreateWebhookRequest,
) -> Result<Webhook, HelpdeskError> {
    super::webhooks::validate_events(&req.events).map_err(HelpdeskError::Validation)?;
    if !(req.url.starts_with("http://") || req.url.starts_with("https://")) {
        return Err(HelpdeskError::Validation("webhook url must be http(s)".to_string()));
    }
    if req.secret.len() < 16 {
        return Err(HelpdeskError::Validation(
            "webhook secret must be at least 16 characters".to_string(),
        ));
    }
    if let Some(helpdesk_id) = req.helpdesk_id {
        get_helpdesk(conn, tenant_id, helpdesk_id)?;
    }
    let hook = Webhook {
        id: Uuid::new_v4(),
        tenant_id,
        helpdesk_id: req.helpdesk_id,
        url: req.url,
        secret: req.secret,
        events: req.events,
        enabled: req.enabled.unwrap_or(true),
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(webhooks::table)
        .values(&hook)
        .returning(Webhook::as_returning())
        .get_result(conn)?)
}

pub fn delete_webhook(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), HelpdeskError> {
    let deleted = diesel::delete(
        webhooks::table
            .filter(webhooks::tenant_id.eq(tenant_id))
            .filter(webhooks::id.eq(id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(HelpdeskError::NotFound(format!("webhook {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn edge(parent: Uuid, child: Uuid) -> HierarchyEdge {
        HierarchyEdge {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            parent_department_id: Some(parent),
            child_department_id: child,
            relation_type: DEFAULT_RELATION.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cyclic_edge_is_conflict() {
        let (it, net, vpn) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let graph = DepartmentGraph::from_edges(&[edge(it, net), edge(net, vpn)]);

        assert!(ensure_acyclic(&graph, it, vpn).is_ok());
        let err = ensure_acyclic(&graph, vpn, it).unwrap_err();
        assert!(matches!(err, HelpdeskError::Conflict(_)));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_self_edge_is_conflict() {
        let it = Uuid::new_v4();
        let err = ensure_acyclic(&DepartmentGraph::default(), it, it).unwrap_err();
        assert!(err.to_string().contains("own parent"));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
