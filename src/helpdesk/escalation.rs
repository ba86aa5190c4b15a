//! Escalation rules: trigger checks, condition evaluation and rule selection.
//!
//! Conditions are combined as a strict left fold. The logic operator stored on
//! condition *n* joins it to the result accumulated from conditions `1..n`, so
//! `[a, or b, and c]` reads `(a || b) && c`. The operator on the first
//! condition is ignored and an empty list holds.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::types::Priority;
use crate::core::shared::schema::{escalation_conditions, escalation_rules};

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

string_enum!(TriggerType {
    TimeBased => "time_based",
    NoResponse => "no_response",
    SlaBreach => "sla_breach",
});

string_enum!(ConditionField {
    Priority => "priority",
    Type => "type",
    Source => "source",
    StateId => "state_id",
    DepartmentId => "department_id",
    AssigneeId => "assignee_id",
    Title => "title",
    Description => "description",
    AgeHours => "age_hours",
});

string_enum!(ConditionOperator {
    Equals => "equals",
    NotEquals => "not_equals",
    Contains => "contains",
    NotContains => "not_contains",
    GreaterThan => "greater_than",
    LessThan => "less_than",
    IsEmpty => "is_empty",
    IsNotEmpty => "is_not_empty",
});

string_enum!(LogicOperator {
    And => "and",
    Or => "or",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationCondition {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: String,
    pub logic_operator: LogicOperator,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRule {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub name: String,
    pub trigger_type: TriggerType,
    pub trigger_hours: i32,
    pub priority_filter: Option<Priority>,
    pub ticket_type_filter: Option<String>,
    pub from_state_id: Option<Uuid>,
    pub target_department_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub notify_managers: bool,
    pub enabled: bool,
    pub order: i32,
    pub conditions: Vec<EscalationCondition>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = escalation_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbEscalationRule {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub name: String,
    pub trigger_type: String,
    pub trigger_hours: i32,
    pub priority_filter: Option<String>,
    pub ticket_type_filter: Option<String>,
    pub from_state_id: Option<Uuid>,
    pub target_department_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub notify_managers: bool,
    pub enabled: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = escalation_conditions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbEscalationCondition {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub field: String,
    pub operator: String,
    pub value: String,
    pub logic_operator: String,
    pub position: i32,
}

impl TryFrom<DbEscalationCondition> for EscalationCondition {
    type Error = String;

    fn try_from(row: DbEscalationCondition) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            rule_id: row.rule_id,
            field: row.field.parse()?,
            operator: row.operator.parse()?,
            value: row.value,
            logic_operator: row.logic_operator.parse()?,
            position: row.position,
        })
    }
}

impl From<&EscalationCondition> for DbEscalationCondition {
    fn from(c: &EscalationCondition) -> Self {
        Self {
            id: c.id,
            rule_id: c.rule_id,
            field: c.field.to_string(),
            operator: c.operator.to_string(),
            value: c.value.clone(),
            logic_operator: c.logic_operator.to_string(),
            position: c.position,
        }
    }
}

impl EscalationRule {
    pub fn from_row(
        row: DbEscalationRule,
        conditions: Vec<DbEscalationCondition>,
    ) -> Result<Self, String> {
        let mut conditions = conditions
            .into_iter()
            .map(EscalationCondition::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        conditions.sort_by_key(|c| c.position);
        Ok(Self {
            id: row.id,
            helpdesk_id: row.helpdesk_id,
            name: row.name,
            trigger_type: row.trigger_type.parse()?,
            trigger_hours: row.trigger_hours,
            priority_filter: row.priority_filter.map(|p| p.parse()).transpose()?,
            ticket_type_filter: row.ticket_type_filter,
            from_state_id: row.from_state_id,
            target_department_id: row.target_department_id,
            target_user_id: row.target_user_id,
            notify_managers: row.notify_managers,
            enabled: row.enabled,
            order: row.sort_order,
            conditions,
            created_at: row.created_at,
        })
    }

    pub fn to_row(&self) -> (DbEscalationRule, Vec<DbEscalationCondition>) {
        let row = DbEscalationRule {
            id: self.id,
            helpdesk_id: self.helpdesk_id,
            name: self.name.clone(),
            trigger_type: self.trigger_type.to_string(),
            trigger_hours: self.trigger_hours,
            priority_filter: self.priority_filter.map(|p| p.to_string()),
            ticket_type_filter: self.ticket_type_filter.clone(),
            from_state_id: self.from_state_id,
            target_department_id: self.target_department_id,
            target_user_id: self.target_user_id,
            notify_managers: self.notify_managers,
            enabled: self.enabled,
            sort_order: self.order,
            created_at: self.created_at,
        };
        let conditions = self.conditions.iter().map(DbEscalationCondition::from).collect();
        (row, conditions)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionInput {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_logic")]
    pub logic_operator: LogicOperator,
}

fn default_logic() -> LogicOperator {
    LogicOperator::And
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEscalationRuleRequest {
    pub name: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub trigger_hours: i32,
    pub priority_filter: Option<Priority>,
    pub ticket_type_filter: Option<String>,
    pub from_state_id: Option<Uuid>,
    pub target_department_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    #[serde(default)]
    pub notify_managers: bool,
    pub enabled: Option<bool>,
    pub order: Option<i32>,
    #[serde(default)]
    pub conditions: Vec<ConditionInput>,
}

impl CreateEscalationRuleRequest {
    pub fn into_rule(self, helpdesk_id: Uuid) -> Result<EscalationRule, String> {
        if self.name.trim().is_empty() {
            return Err("rule name is required".to_string());
        }
        if self.trigger_hours < 0 {
            return Err("trigger hours cannot be negative".to_string());
        }
        let id = Uuid::new_v4();
        let conditions = self
            .conditions
            .into_iter()
            .enumerate()
            .map(|(i, c)| EscalationCondition {
                id: Uuid::new_v4(),
                rule_id: id,
                field: c.field,
                operator: c.operator,
                value: c.value,
                logic_operator: c.logic_operator,
                position: i as i32,
            })
            .collect();
        Ok(EscalationRule {
            id,
            helpdesk_id,
            name: self.name,
            trigger_type: self.trigger_type,
            trigger_hours: self.trigger_hours,
            priority_filter: self.priority_filter,
            ticket_type_filter: self.ticket_type_filter,
            from_state_id: self.from_state_id,
            target_department_id: self.target_department_id,
            target_user_id: self.target_user_id,
            notify_managers: self.notify_managers,
            enabled: self.enabled.unwrap_or(true),
            order: self.order.unwrap_or(0),
            conditions,
            created_at: Utc::now(),
        })
    }
}

/// What the escalation evaluator needs to know about a ticket.
#[derive(Debug, Clone)]
pub struct TicketSnapshot {
    pub id: Uuid,
    pub priority: Priority,
    pub ticket_type: String,
    pub source: String,
    pub state_id: Option<Uuid>,
    pub department_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub sla_breached: bool,
}

impl TicketSnapshot {
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }

    fn field_text(&self, field: ConditionField, now: DateTime<Utc>) -> Option<String> {
        match field {
            ConditionField::Priority => Some(self.priority.to_string()),
            ConditionField::Type => Some(self.ticket_type.clone()),
            ConditionField::Source => Some(self.source.clone()),
            ConditionField::StateId => self.state_id.map(|id| id.to_string()),
            ConditionField::DepartmentId => Some(self.department_id.to_string()),
            ConditionField::AssigneeId => self.assignee_id.map(|id| id.to_string()),
            ConditionField::Title => Some(self.title.clone()),
            ConditionField::Description => self.description.clone(),
            ConditionField::AgeHours => Some(format!("{:.2}", self.age_hours(now))),
        }
    }
}

pub fn evaluate_condition(
    condition: &EscalationCondition,
    ticket: &TicketSnapshot,
    now: DateTime<Utc>,
) -> bool {
    let actual = ticket
        .field_text(condition.field, now)
        .filter(|v| !v.trim().is_empty());
    let expected = condition.value.trim();

    match condition.operator {
        ConditionOperator::IsEmpty => actual.is_none(),
        ConditionOperator::IsNotEmpty => actual.is_some(),
        ConditionOperator::Equals => actual.is_some_and(|a| values_equal(&a, expected)),
        ConditionOperator::NotEquals => !actual.is_some_and(|a| values_equal(&a, expected)),
        ConditionOperator::Contains => {
            actual.is_some_and(|a| a.to_lowercase().contains(&expected.to_lowercase()))
        }
        ConditionOperator::NotContains => {
            !actual.is_some_and(|a| a.to_lowercase().contains(&expected.to_lowercase()))
        }
        ConditionOperator::GreaterThan => compare(actual.as_deref(), expected, |a, b| a > b),
        ConditionOperator::LessThan => compare(actual.as_deref(), expected, |a, b| a < b),
    }
}

fn values_equal(actual: &str, expected: &str) -> bool {
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() < f64::EPSILON,
        _ => actual.eq_ignore_ascii_case(expected),
    }
}

fn compare(actual: Option<&str>, expected: &str, op: impl Fn(f64, f64) -> bool) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    match (actual.trim().parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => op(a, b),
        _ => false,
    }
}

/// Strict left fold over the conditions in `position` order.
pub fn evaluate_conditions(
    conditions: &[EscalationCondition],
    ticket: &TicketSnapshot,
    now: DateTime<Utc>,
) -> bool {
    let mut ordered: Vec<&EscalationCondition> = conditions.iter().collect();
    ordered.sort_by_key(|c| c.position);

    let mut iter = ordered.into_iter();
    let Some(first) = iter.next() else {
        return true;
    };
    iter.fold(evaluate_condition(first, ticket, now), |acc, c| {
        let value = evaluate_condition(c, ticket, now);
        match c.logic_operator {
            LogicOperator::And => acc && value,
            LogicOperator::Or => acc || value,
        }
    })
}

pub fn trigger_fires(rule: &EscalationRule, ticket: &TicketSnapshot, now: DateTime<Utc>) -> bool {
    let aged = ticket.age_hours(now) >= f64::from(rule.trigger_hours);
    match rule.trigger_type {
        TriggerType::TimeBased => aged,
        TriggerType::NoResponse => ticket.first_response_at.is_none() && aged,
        TriggerType::SlaBreach => ticket.sla_breached,
    }
}

fn filters_pass(rule: &EscalationRule, ticket: &TicketSnapshot) -> bool {
    rule.priority_filter.map_or(true, |p| p == ticket.priority)
        && rule
            .ticket_type_filter
            .as_deref()
            .map_or(true, |t| t.eq_ignore_ascii_case(&ticket.ticket_type))
        && rule.from_state_id.map_or(true, |s| ticket.state_id == Some(s))
}

pub fn rule_matches(rule: &EscalationRule, ticket: &TicketSnapshot, now: DateTime<Utc>) -> bool {
    rule.enabled
        && filters_pass(rule, ticket)
        && trigger_fires(rule, ticket, now)
        && evaluate_conditions(&rule.conditions, ticket, now)
}

/// Lowest-order matching rule that has not been applied to the ticket yet.
pub fn select_rule<'a>(
    rules: &'a [EscalationRule],
    ticket: &TicketSnapshot,
    already_applied: &HashSet<Uuid>,
    now: DateTime<Utc>,
) -> Option<&'a EscalationRule> {
    rules
        .iter()
        .filter(|r| !already_applied.contains(&r.id))
        .filter(|r| rule_matches(r, ticket, now))
        .min_by_key(|r| r.order)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationAction {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub reassign_department: Option<Uuid>,
    pub reassign_user: Option<Uuid>,
    pub notify_managers: bool,
}

impl EscalationAction {
    pub fn for_rule(rule: &EscalationRule, ticket: &TicketSnapshot) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            reassign_department: rule
                .target_department_id
                .filter(|d| *d != ticket.department_id),
            reassign_user: rule.target_user_id.filter(|u| Some(*u) != ticket.assignee_id),
            notify_managers: rule.notify_managers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket() -> TicketSnapshot {
        TicketSnapshot {
            id: Uuid::new_v4(),
            priority: Priority::High,
            ticket_type: "incident".to_string(),
            source: "web".to_string(),
            state_id: None,
            department_id: Uuid::new_v4(),
            assignee_id: None,
            title: "VPN down in Lisbon office".to_string(),
            description: Some("Nobody can connect".to_string()),
            created_at: Utc::now() - Duration::hours(5),
            first_response_at: None,
            sla_breached: false,
        }
    }

    fn cond(
        position: i32,
        field: ConditionField,
        operator: ConditionOperator,
        value: &str,
        logic: LogicOperator,
    ) -> EscalationCondition {
        EscalationCondition {
            id: Uuid::new_v4(),
            rule_id: Uuid::nil(),
            field,
            operator,
            value: value.to_string(),
            logic_operator: logic,
            position,
        }
    }

    fn rule(name: &str, trigger: TriggerType, hours: i32, order: i32) -> EscalationRule {
        EscalationRule {
            id: Uuid::new_v4(),
            helpdesk_id: Uuid::nil(),
            name: name.to_string(),
            trigger_type: trigger,
            trigger_hours: hours,
            priority_filter: None,
            ticket_type_filter: None,
            from_state_id: None,
            target_department_id: None,
            target_user_id: None,
            notify_managers: false,
            enabled: true,
            order,
            conditions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_left_fold_is_not_precedence_based() {
        use ConditionField::*;
        use ConditionOperator::*;
        use LogicOperator::*;
        let t = ticket();
        let now = Utc::now();
        // operator precedence would read this as true || (false && false)
        let conds = vec![
            cond(0, Priority, Equals, "high", And),
            cond(1, Source, Equals, "email", Or),
            cond(2, Title, Contains, "printer", And),
        ];
        // (true || false) && false
        assert!(!evaluate_conditions(&conds, &t, now));

        let conds = vec![
            cond(0, Source, Equals, "email", And),
            cond(1, Title, Contains, "printer", And),
            cond(2, Priority, Equals, "high", Or),
        ];
        // (false && false) || true
        assert!(evaluate_conditions(&conds, &t, now));
    }

    #[test]
    fn test_first_logic_operator_ignored_and_empty_holds() {
        let t = ticket();
        let now = Utc::now();
        let only = vec![cond(0, ConditionField::Priority, ConditionOperator::Equals, "low", LogicOperator::Or)];
        assert!(!evaluate_conditions(&only, &t, now));
        assert!(evaluate_conditions(&[], &t, now));
    }

    #[test]
    fn test_position_orders_conditions() {
        let t = ticket();
        let now = Utc::now();
        let conds = vec![
            cond(1, ConditionField::Priority, ConditionOperator::Equals, "high", LogicOperator::Or),
            cond(0, ConditionField::Source, ConditionOperator::Equals, "email", LogicOperator::And),
        ];
        assert!(evaluate_conditions(&conds, &t, now));
    }

    #[test]
    fn test_operators() {
        let t = ticket();
        let now = Utc::now();
        let check = |field, op, value: &str| evaluate_condition(&cond(0, field, op, value, LogicOperator::And), &t, now);

        assert!(check(ConditionField::AgeHours, ConditionOperator::GreaterThan, "4"));
        assert!(check(ConditionField::AgeHours, ConditionOperator::LessThan, "6"));
        assert!(!check(ConditionField::Title, ConditionOperator::GreaterThan, "3"));
        assert!(check(ConditionField::AssigneeId, ConditionOperator::IsEmpty, ""));
        assert!(check(ConditionField::Description, ConditionOperator::IsNotEmpty, ""));
        assert!(check(ConditionField::Title, ConditionOperator::NotContains, "printer"));
        assert!(check(ConditionField::Type, ConditionOperator::Equals, "INCIDENT"));
        assert!(check(ConditionField::StateId, ConditionOperator::NotEquals, "anything"));
    }

    #[test]
    fn test_triggers() {
        let now = Utc::now();
        let mut t = ticket();
        assert!(trigger_fires(&rule("age", TriggerType::TimeBased, 4, 0), &t, now));
        assert!(!trigger_fires(&rule("age", TriggerType::TimeBased, 6, 0), &t, now));
        assert!(trigger_fires(&rule("silent", TriggerType::NoResponse, 2, 0), &t, now));
        t.first_response_at = Some(now);
        assert!(!trigger_fires(&rule("silent", TriggerType::NoResponse, 2, 0), &t, now));
        assert!(!trigger_fires(&rule("sla", TriggerType::SlaBreach, 0, 0), &t, now));
        t.sla_breached = true;
        assert!(trigger_fires(&rule("sla", TriggerType::SlaBreach, 0, 0), &t, now));
    }

    #[test]
    fn test_select_lowest_order_skipping_applied() {
        let now = Utc::now();
        let t = ticket();
        let late = rule("late", TriggerType::TimeBased, 1, 5);
        let early = rule("early", TriggerType::TimeBased, 1, 1);
        let mut disabled = rule("off", TriggerType::TimeBased, 1, 0);
        disabled.enabled = false;
        let mut wrong_priority = rule("low only", TriggerType::TimeBased, 1, 0);
        wrong_priority.priority_filter = Some(Priority::Low);
        let rules = vec![late.clone(), early.clone(), disabled, wrong_priority];

        let chosen = select_rule(&rules, &t, &HashSet::new(), now).map(|r| r.name.as_str());
        assert_eq!(chosen, Some("early"));

        let applied = HashSet::from([early.id]);
        let chosen = select_rule(&rules, &t, &applied, now).map(|r| r.name.as_str());
        assert_eq!(chosen, Some("late"));

        let applied = HashSet::from([early.id, late.id]);
        assert!(select_rule(&rules, &t, &applied, now).is_none());
    }

    #[test]
    fn test_action_skips_noop_reassignments() {
        let t = ticket();
        let mut r = rule("move", TriggerType::TimeBased, 0, 0);
        r.target_department_id = Some(t.department_id);
        r.target_user_id = Some(Uuid::new_v4());
        r.notify_managers = true;
        let action = EscalationAction::for_rule(&r, &t);
        assert_eq!(action.reassign_department, None);
        assert_eq!(action.reassign_user, r.target_user_id);
        assert!(action.notify_managers);
    }

    #[test]
    fn test_request_into_rule_assigns_positions() {
        let req: CreateEscalationRuleRequest = serde_json::from_value(serde_json::json!({
            "name": "Urgent unanswered",
            "triggerType": "no_response",
            "triggerHours": 2,
            "conditions": [
                { "field": "priority", "operator": "equals", "value": "urgent" },
                { "field": "source", "operator": "equals", "value": "email", "logicOperator": "or" }
            ]
        }))
        .unwrap();
        let rule = req.into_rule(Uuid::nil()).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.conditions[1].position, 1);
        assert_eq!(rule.conditions[1].logic_operator, LogicOperator::Or);
        assert_eq!(rule.conditions[0].rule_id, rule.id);
    }
}
