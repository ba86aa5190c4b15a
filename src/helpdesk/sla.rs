use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::types::{Priority, SlaPolicy, SlaState};
use crate::core::shared::schema::sla_policies;

/// Share of a deadline window after which an open deadline is at risk.
pub const AT_RISK_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = sla_policies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSlaPolicy {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub priority: String,
    pub first_response_hours: i32,
    pub resolution_hours: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbSlaPolicy> for SlaPolicy {
    type Error = String;

    fn try_from(row: DbSlaPolicy) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            helpdesk_id: row.helpdesk_id,
            priority: row.priority.parse()?,
            first_response_hours: row.first_response_hours,
            resolution_hours: row.resolution_hours,
        })
    }
}

/// The state a new ticket starts in: the first `is_default` state by order,
/// else the lowest-ordered state.
pub fn initial_state(states: &[SlaState]) -> Option<&SlaState> {
    let mut ordered: Vec<&SlaState> = states.iter().collect();
    ordered.sort_by_key(|s| s.order);
    ordered
        .iter()
        .find(|s| s.is_default)
        .or_else(|| ordered.first())
        .copied()
}

pub fn policy_for(policies: &[SlaPolicy], priority: Priority) -> Option<&SlaPolicy> {
    policies.iter().find(|p| p.priority == priority)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Met,
    OnTrack,
    AtRisk,
    Breached,
}

/// Status of one deadline measured from `start`.
pub fn deadline_status(
    start: DateTime<Utc>,
    due: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SlaStatus {
    if let Some(done) = completed_at {
        return if done <= due {
            SlaStatus::Met
        } else {
            SlaStatus::Breached
        };
    }
    if now > due {
        return SlaStatus::Breached;
    }
    let window = (due - start).num_seconds();
    if window <= 0 {
        return SlaStatus::AtRisk;
    }
    let elapsed = (now - start).num_seconds().max(0);
    if elapsed as f64 / window as f64 >= AT_RISK_RATIO {
        SlaStatus::AtRisk
    } else {
        SlaStatus::OnTrack
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SlaClock {
    pub created_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub in_final_state: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaEvaluation {
    pub policy_id: Uuid,
    pub priority: Priority,
    pub first_response_due: DateTime<Utc>,
    pub first_response_status: SlaStatus,
    pub resolution_due: DateTime<Utc>,
    pub resolution_status: SlaStatus,
}

impl SlaEvaluation {
    pub fn is_breached(&self) -> bool {
        self.resolution_status == SlaStatus::Breached
    }
}

pub fn evaluate(policy: &SlaPolicy, clock: &SlaClock, now: DateTime<Utc>) -> SlaEvaluation {
    let first_response_due = clock.created_at + Duration::hours(i64::from(policy.first_response_hours));
    let resolution_due = clock.created_at + Duration::hours(i64::from(policy.resolution_hours));

    let first_response_status =
        deadline_status(clock.created_at, first_response_due, clock.first_response_at, now);
    // a ticket sitting in a final state without a resolution stamp is closed out, not late
    let resolution_status = match (clock.in_final_state, clock.resolved_at) {
        (true, None) => SlaStatus::Met,
        _ => deadline_status(clock.created_at, resolution_due, clock.resolved_at, now),
    };

    SlaEvaluation {
        policy_id: policy.id,
        priority: policy.priority,
        first_response_due,
        first_response_status,
        resolution_due,
        resolution_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(name: &str, order: i32, is_default: bool) -> SlaState {
        SlaState {
            id: Uuid::new_v4(),
            helpdesk_id: Uuid::nil(),
            name: name.to_string(),
            color: "#000".to_string(),
            order,
            is_final: false,
            is_default,
            target_hours: None,
            created_at: Utc::now(),
        }
    }

    fn policy() -> SlaPolicy {
        SlaPolicy {
            id: Uuid::new_v4(),
            helpdesk_id: Uuid::nil(),
            priority: Priority::High,
            first_response_hours: 1,
            resolution_hours: 10,
        }
    }

    #[test]
    fn test_initial_state_prefers_first_default_by_order() {
        let states = vec![state("Open", 2, true), state("Triage", 1, false), state("New", 0, true)];
        assert_eq!(initial_state(&states).map(|s| s.name.as_str()), Some("New"));
    }

    #[test]
    fn test_initial_state_falls_back_to_lowest_order() {
        let states = vec![state("Open", 5, false), state("Triage", 3, false)];
        assert_eq!(initial_state(&states).map(|s| s.name.as_str()), Some("Triage"));
        assert!(initial_state(&[]).is_none());
    }

    #[test]
    fn test_deadline_status_boundaries() {
        let start = Utc::now();
        let due = start + Duration::hours(10);
        assert_eq!(deadline_status(start, due, None, start + Duration::hours(7)), SlaStatus::OnTrack);
        assert_eq!(deadline_status(start, due, None, start + Duration::hours(8)), SlaStatus::AtRisk);
        assert_eq!(deadline_status(start, due, None, start + Duration::hours(11)), SlaStatus::Breached);
        assert_eq!(
            deadline_status(start, due, Some(start + Duration::hours(9)), start + Duration::hours(20)),
            SlaStatus::Met
        );
        assert_eq!(
            deadline_status(start, due, Some(start + Duration::hours(12)), start + Duration::hours(20)),
            SlaStatus::Breached
        );
    }

    #[test]
    fn test_final_state_is_not_breached() {
        let created = Utc::now() - Duration::hours(48);
        let clock = SlaClock {
            created_at: created,
            first_response_at: Some(created + Duration::minutes(30)),
            resolved_at: None,
            in_final_state: true,
        };
        let eval = evaluate(&policy(), &clock, Utc::now());
        assert_eq!(eval.first_response_status, SlaStatus::Met);
        assert_eq!(eval.resolution_status, SlaStatus::Met);
        assert!(!eval.is_breached());

        let open = SlaClock { in_final_state: false, ..clock };
        assert!(evaluate(&policy(), &open, Utc::now()).is_breached());
    }

    #[test]
    fn test_policy_row_with_bad_priority() {
        let row = DbSlaPolicy {
            id: Uuid::new_v4(),
            helpdesk_id: Uuid::nil(),
            priority: "critical".to_string(),
            first_response_hours: 1,
            resolution_hours: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(SlaPolicy::try_from(row).is_err());
    }
}
