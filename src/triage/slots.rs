//! Routing fields of the quick-create form, filled either by the user or by
//! an AI suggestion. A manual choice always wins.

use uuid::Uuid;

use super::suggestion::RoutingSuggestion;
use crate::tickets::types::CreateTicketRequest;

pub const OVERRIDE_WARNING: &str =
    "The selected assignee differs from the suggested one; the ticket will still be created";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotOrigin {
    #[default]
    Empty,
    Suggested,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    value: Option<Uuid>,
    origin: SlotOrigin,
}

impl Slot {
    pub fn value(&self) -> Option<Uuid> {
        self.value
    }

    pub fn origin(&self) -> SlotOrigin {
        self.origin
    }

    /// A user choice, including clearing the slot.
    pub fn choose(&mut self, value: Option<Uuid>) {
        self.value = value;
        self.origin = SlotOrigin::Manual;
    }

    /// Returns false when a manual choice kept the suggestion out.
    pub fn suggest(&mut self, value: Option<Uuid>) -> bool {
        if self.origin == SlotOrigin::Manual {
            return false;
        }
        self.value = value;
        self.origin = if value.is_some() {
            SlotOrigin::Suggested
        } else {
            SlotOrigin::Empty
        };
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionSlots {
    pub department: Slot,
    pub sub_department: Slot,
    pub assignee: Slot,
    /// Department the suggested sub-department sits under.
    sub_parent: Option<Uuid>,
    suggested_assignee: Option<Uuid>,
    last: Option<RoutingSuggestion>,
}

impl SuggestionSlots {
    pub fn apply(&mut self, suggestion: RoutingSuggestion) {
        let same_department = self.department.suggest(suggestion.department_id)
            || self.department.value() == suggestion.department_id;
        // a sub-department of another department would override the user's pick
        self.sub_department
            .suggest(suggestion.sub_department_id.filter(|_| same_department));
        self.sub_parent = suggestion.department_id;
        self.assignee.suggest(suggestion.assignee_id);
        self.suggested_assignee = suggestion.assignee_id;
        self.last = Some(suggestion);
    }

    pub fn last_suggestion(&self) -> Option<&RoutingSuggestion> {
        self.last.as_ref()
    }

    /// Informational only; never blocks submission.
    pub fn override_warning(&self) -> Option<&'static str> {
        match self.suggested_assignee {
            Some(suggested) if self.assignee.value() != Some(suggested) => Some(OVERRIDE_WARNING),
            _ => None,
        }
    }

    /// Copies the routing choices into a create request. The sub-department,
    /// when set, is the most specific department. A suggested one is dropped
    /// once the department no longer matches the one it was suggested under.
    pub fn fill(&self, request: &mut CreateTicketRequest) {
        let sub_department = match self.sub_department.origin() {
            SlotOrigin::Suggested if self.sub_parent != self.department.value() => None,
            _ => self.sub_department.value(),
        };
        request.department_id = sub_department.or(self.department.value());
        request.assignee_id = self.assignee.value();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(department: Uuid, sub: Option<Uuid>, assignee: Option<Uuid>) -> RoutingSuggestion {
        RoutingSuggestion {
            department_id: Some(department),
            sub_department_id: sub,
            assignee_id: assignee,
            confidence: 0.7,
            reason: "similar tickets".to_string(),
            ..RoutingSuggestion::default()
        }
    }

    #[test]
    fn test_manual_assignee_never_overwritten() {
        let mine = Uuid::new_v4();
        let mut slots = SuggestionSlots::default();
        slots.assignee.choose(Some(mine));

        slots.apply(suggestion(Uuid::new_v4(), None, Some(Uuid::new_v4())));
        assert_eq!(slots.assignee.value(), Some(mine));
        assert_eq!(slots.assignee.origin(), SlotOrigin::Manual);

        slots.apply(suggestion(Uuid::new_v4(), None, Some(Uuid::new_v4())));
        assert_eq!(slots.assignee.value(), Some(mine));
    }

    #[test]
    fn test_suggestions_fill_empty_slots_and_refresh() {
        let mut slots = SuggestionSlots::default();
        let first = Uuid::new_v4();
        slots.apply(suggestion(first, None, None));
        assert_eq!(slots.department.value(), Some(first));
        assert_eq!(slots.department.origin(), SlotOrigin::Suggested);

        let second = Uuid::new_v4();
        slots.apply(suggestion(second, None, None));
        assert_eq!(slots.department.value(), Some(second));
    }

    #[test]
    fn test_manual_clear_is_still_manual() {
        let mut slots = SuggestionSlots::default();
        slots.department.choose(None);
        slots.apply(suggestion(Uuid::new_v4(), None, None));
        assert_eq!(slots.department.value(), None);
    }

    #[test]
    fn test_override_warning() {
        let suggested = Uuid::new_v4();
        let mut slots = SuggestionSlots::default();
        slots.apply(suggestion(Uuid::new_v4(), None, Some(suggested)));
        assert_eq!(slots.override_warning(), None);

        slots.assignee.choose(Some(Uuid::new_v4()));
        assert_eq!(slots.override_warning(), Some(OVERRIDE_WARNING));
    }

    #[test]
    fn test_fill_prefers_sub_department() {
        let it = Uuid::new_v4();
        let network = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let mut slots = SuggestionSlots::default();
        slots.apply(suggestion(it, Some(network), Some(alice)));

        let mut request = CreateTicketRequest::default();
        slots.fill(&mut request);
        assert_eq!(request.department_id, Some(network));
        assert_eq!(request.assignee_id, Some(alice));

        slots.reset();
        assert!(slots.last_suggestion().is_none());
    }

    #[test]
    fn test_manual_department_ignores_foreign_sub_department() {
        let hr = Uuid::new_v4();
        let it = Uuid::new_v4();
        let network = Uuid::new_v4();
        let mut slots = SuggestionSlots::default();
        slots.department.choose(Some(hr));

        slots.apply(suggestion(it, Some(network), None));
        assert_eq!(slots.sub_department.value(), None);

        let mut request = CreateTicketRequest::default();
        slots.fill(&mut request);
        assert_eq!(request.department_id, Some(hr));
    }

    #[test]
    fn test_department_chosen_after_suggestion_drops_its_sub_department() {
        let hr = Uuid::new_v4();
        let it = Uuid::new_v4();
        let network = Uuid::new_v4();
        let mut slots = SuggestionSlots::default();
        slots.apply(suggestion(it, Some(network), None));
        slots.department.choose(Some(hr));

        let mut request = CreateTicketRequest::default();
        slots.fill(&mut request);
        assert_eq!(request.department_id, Some(hr));

        // choosing the suggested department again keeps the sub-department
        slots.department.choose(Some(it));
        slots.fill(&mut request);
        assert_eq!(request.department_id, Some(network));
    }

    #[test]
    fn test_manual_sub_department_always_wins() {
        let hr = Uuid::new_v4();
        let payroll = Uuid::new_v4();
        let mut slots = SuggestionSlots::default();
        slots.department.choose(Some(hr));
        slots.sub_department.choose(Some(payroll));
        slots.apply(suggestion(Uuid::new_v4(), Some(Uuid::new_v4()), None));

        let mut request = CreateTicketRequest::default();
        slots.fill(&mut request);
        assert_eq!(request.department_id, Some(payroll));
    }
}
