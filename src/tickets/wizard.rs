//! Three-step ticket creation wizard: helpdesk, category, details.
//!
//! The wizard holds no I/O of its own. Helpdesk data is handed in when the
//! requester picks a helpdesk and submission goes through a
//! [`TicketSubmitter`], normally [`crate::client::ApiClient`].

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{CreateTicketRequest, Ticket, TicketType};
use crate::client::ClientError;
use crate::helpdesk::forms::{self, FieldError, FieldValues, FormField};
use crate::helpdesk::types::FormCategory;
use crate::helpdesk::Priority;

#[async_trait]
pub trait TicketSubmitter: Send + Sync {
    async fn create_ticket(&self, request: &CreateTicketRequest) -> Result<Ticket, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    Helpdesk = 0,
    Category = 1,
    Details = 2,
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("select a helpdesk first")]
    NoHelpdesk,
    #[error("select a category first")]
    NoCategory,
    #[error("category {0} is not available for this helpdesk")]
    UnknownCategory(Uuid),
    #[error("a title is required")]
    EmptyTitle,
    #[error("some fields are invalid")]
    InvalidFields(Vec<FieldError>),
    #[error("the wizard is not on the details step")]
    NotReady,
    #[error(transparent)]
    Submit(#[from] ClientError),
}

/// Everything the wizard needs to know about the chosen helpdesk.
#[derive(Debug, Clone)]
pub struct HelpdeskChoice {
    pub helpdesk_id: Uuid,
    pub categories: Vec<FormCategory>,
    pub fields: Vec<FormField>,
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub ticket: Ticket,
    /// The caller's ticket list is stale once a ticket was created.
    pub refresh_list: bool,
}

#[derive(Debug, Clone)]
pub struct TicketWizard {
    open: bool,
    step: WizardStep,
    helpdesk: Option<HelpdeskChoice>,
    category: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub ticket_type: TicketType,
    values: FieldValues,
}

impl Default for TicketWizard {
    fn default() -> Self {
        Self {
            open: false,
            step: WizardStep::Helpdesk,
            helpdesk: None,
            category: None,
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            ticket_type: TicketType::default(),
            values: FieldValues::new(),
        }
    }
}

impl TicketWizard {
    pub fn open() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn category(&self) -> Option<Uuid> {
        self.category
    }

    pub fn helpdesk_id(&self) -> Option<Uuid> {
        self.helpdesk.as_ref().map(|h| h.helpdesk_id)
    }

    /// Picking another helpdesk drops the category and any entered values.
    pub fn select_helpdesk(&mut self, choice: HelpdeskChoice) {
        self.helpdesk = Some(choice);
        self.category = None;
        self.values.clear();
    }

    pub fn enabled_categories(&self) -> Vec<&FormCategory> {
        let mut categories: Vec<&FormCategory> = self
            .helpdesk
            .iter()
            .flat_map(|h| h.categories.iter())
            .filter(|c| c.enabled)
            .collect();
        categories.sort_by_key(|c| c.order);
        categories
    }

    pub fn select_category(&mut self, id: Uuid) -> Result<(), WizardError> {
        if !self.enabled_categories().iter().any(|c| c.id == id) {
            return Err(WizardError::UnknownCategory(id));
        }
        if self.category != Some(id) {
            self.values.clear();
        }
        self.category = Some(id);
        Ok(())
    }

    pub fn next(&mut self) -> Result<WizardStep, WizardError> {
        match self.step {
            WizardStep::Helpdesk => {
                if self.helpdesk.is_none() {
                    return Err(WizardError::NoHelpdesk);
                }
                let categories: Vec<Uuid> = self.enabled_categories().iter().map(|c| c.id).collect();
                match categories.as_slice() {
                    [] => {
                        self.category = None;
                        self.step = WizardStep::Details;
                    }
                    [only] => {
                        self.category = Some(*only);
                        self.step = WizardStep::Details;
                    }
                    _ => self.step = WizardStep::Category,
                }
            }
            WizardStep::Category => {
                if self.category.is_none() {
                    return Err(WizardError::NoCategory);
                }
                self.step = WizardStep::Details;
            }
            WizardStep::Details => {}
        }
        Ok(self.step)
    }

    pub fn back(&mut self) -> WizardStep {
        self.step = match self.step {
            WizardStep::Details if self.enabled_categories().len() > 1 => WizardStep::Category,
            _ => WizardStep::Helpdesk,
        };
        self.step
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Fields to render on the details step, in order, with visibility applied.
    pub fn active_fields(&self) -> Vec<&FormField> {
        let Some(helpdesk) = &self.helpdesk else {
            return Vec::new();
        };
        forms::active_fields(&helpdesk.fields, self.category)
            .into_iter()
            .filter(|f| forms::is_visible(f, &self.values))
            .collect()
    }

    pub fn payload(&self) -> Result<CreateTicketRequest, WizardError> {
        let helpdesk = self.helpdesk.as_ref().ok_or(WizardError::NoHelpdesk)?;
        if self.step != WizardStep::Details {
            return Err(WizardError::NotReady);
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(WizardError::EmptyTitle);
        }
        let accepted = forms::validate_submission(&helpdesk.fields, self.category, &self.values)
            .map_err(WizardError::InvalidFields)?;

        let description = self.description.trim();
        Ok(CreateTicketRequest {
            helpdesk_id: helpdesk.helpdesk_id,
            form_category_id: self.category,
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            priority: self.priority,
            ticket_type: self.ticket_type,
            custom_fields: accepted
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
            ..CreateTicketRequest::default()
        })
    }

    /// On success the wizard closes and resets; on failure it is left as is.
    pub async fn submit(&mut self, submitter: &dyn TicketSubmitter) -> Result<SubmitOutcome, WizardError> {
        let request = self.payload()?;
        let ticket = submitter.create_ticket(&request).await?;
        *self = Self::default();
        Ok(SubmitOutcome {
            ticket,
            refresh_list: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpdesk::forms::{FieldKind, FieldWidth, VisibilityRule};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSubmitter {
        requests: Mutex<Vec<CreateTicketRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl TicketSubmitter for FakeSubmitter {
        async fn create_ticket(&self, request: &CreateTicketRequest) -> Result<Ticket, ClientError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            if self.fail {
                return Err(ClientError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let now = Utc::now();
            Ok(Ticket {
                id: Uuid::new_v4(),
                tenant_id: Uuid::nil(),
                helpdesk_id: request.helpdesk_id,
                department_id: Uuid::new_v4(),
                form_category_id: request.form_category_id,
                ticket_number: "TKT-000001".to_string(),
                title: request.title.clone(),
                description: request.description.clone(),
                priority: request.priority.as_str().to_string(),
                ticket_type: request.ticket_type.as_str().to_string(),
                source: "web".to_string(),
                state_id: None,
                assignee_id: None,
                created_by: None,
                custom_fields: serde_json::json!({}),
                email_message_id: None,
                first_response_at: None,
                resolved_at: None,
                version: 1,
                embedding: None,
                created_at: now,
                updated_at: now,
            })
        }
    }

    impl FakeSubmitter {
        fn count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or(0)
        }
    }

    fn category(helpdesk_id: Uuid, name: &str, order: i32, enabled: bool) -> FormCategory {
        FormCategory {
            id: Uuid::new_v4(),
            helpdesk_id,
            name: name.to_string(),
            description: None,
            order,
            icon: None,
            color: None,
            enabled,
            created_at: Utc::now(),
        }
    }

    fn field(helpdesk_id: Uuid, category: Option<Uuid>, key: &str, order: i32) -> FormField {
        FormField {
            id: Uuid::new_v4(),
            helpdesk_id,
            form_category_id: category,
            key: key.to_string(),
            label: key.to_string(),
            kind: FieldKind::Text {
                min_length: None,
                max_length: None,
                pattern: None,
            },
            required: false,
            order,
            width: FieldWidth::Full,
            internal_only: false,
            placeholder: None,
            help_text: None,
            visibility: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_category_skips_to_details() {
        let helpdesk_id = Uuid::new_v4();
        let only = category(helpdesk_id, "Hardware", 0, true);
        let disabled = category(helpdesk_id, "Old", 1, false);
        let only_id = only.id;

        let mut wizard = TicketWizard::open();
        wizard.select_helpdesk(HelpdeskChoice {
            helpdesk_id,
            categories: vec![only, disabled],
            fields: vec![],
        });
        assert_eq!(wizard.next().unwrap(), WizardStep::Details);
        assert_eq!(wizard.category(), Some(only_id));
    }

    #[test]
    fn test_cannot_advance_without_helpdesk_or_category() {
        let mut wizard = TicketWizard::open();
        assert!(matches!(wizard.next(), Err(WizardError::NoHelpdesk)));

        let helpdesk_id = Uuid::new_v4();
        let a = category(helpdesk_id, "A", 1, true);
        let b = category(helpdesk_id, "B", 0, true);
        let b_id = b.id;
        wizard.select_helpdesk(HelpdeskChoice {
            helpdesk_id,
            categories: vec![a, b],
            fields: vec![],
        });
        assert_eq!(wizard.next().unwrap(), WizardStep::Category);
        assert_eq!(wizard.enabled_categories()[0].id, b_id);
        assert!(matches!(wizard.next(), Err(WizardError::NoCategory)));
        assert!(matches!(
            wizard.select_category(Uuid::new_v4()),
            Err(WizardError::UnknownCategory(_))
        ));
        wizard.select_category(b_id).unwrap();
        assert_eq!(wizard.next().unwrap(), WizardStep::Details);
        assert_eq!(wizard.back(), WizardStep::Category);
    }

    #[test]
    fn test_zero_categories_uses_uncategorised_fields() {
        let helpdesk_id = Uuid::new_v4();
        let elsewhere = Uuid::new_v4();
        let mut internal = field(helpdesk_id, None, "cost_center", 0);
        internal.internal_only = true;

        let mut wizard = TicketWizard::open();
        wizard.select_helpdesk(HelpdeskChoice {
            helpdesk_id,
            categories: vec![],
            fields: vec![
                field(helpdesk_id, None, "asset", 2),
                field(helpdesk_id, None, "location", 1),
                field(helpdesk_id, Some(elsewhere), "model", 0),
                internal,
            ],
        });
        wizard.next().unwrap();
        let keys: Vec<&str> = wizard.active_fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["location", "asset"]);

        wizard.title = "Broken screen".to_string();
        wizard.set_value("asset", "A-17");
        wizard.set_value("model", "not shown");
        let payload = wizard.payload().unwrap();
        assert_eq!(payload.form_category_id, None);
        assert_eq!(payload.custom_fields.len(), 1);
        assert_eq!(payload.custom_fields["asset"], "A-17");
    }

    #[test]
    fn test_hidden_fields_are_not_sent() {
        let helpdesk_id = Uuid::new_v4();
        let mut details = field(helpdesk_id, None, "other_detail", 1);
        details.visibility = Some(VisibilityRule {
            field: "kind".to_string(),
            equals: "other".to_string(),
        });
        let mut wizard = TicketWizard::open();
        wizard.select_helpdesk(HelpdeskChoice {
            helpdesk_id,
            categories: vec![],
            fields: vec![field(helpdesk_id, None, "kind", 0), details],
        });
        wizard.next().unwrap();
        wizard.title = "Request".to_string();
        wizard.set_value("kind", "laptop");
        wizard.set_value("other_detail", "stale");
        assert_eq!(wizard.active_fields().len(), 1);
        assert!(!wizard.payload().unwrap().custom_fields.contains_key("other_detail"));
    }

    #[tokio::test]
    async fn test_empty_title_never_submits() {
        let submitter = FakeSubmitter::default();
        let mut wizard = TicketWizard::open();
        wizard.select_helpdesk(HelpdeskChoice {
            helpdesk_id: Uuid::new_v4(),
            categories: vec![],
            fields: vec![],
        });
        wizard.next().unwrap();
        wizard.title = "   ".to_string();
        assert!(matches!(wizard.submit(&submitter).await, Err(WizardError::EmptyTitle)));
        assert_eq!(submitter.count(), 0);
    }

    #[tokio::test]
    async fn test_success_resets_and_failure_keeps_state() {
        let helpdesk_id = Uuid::new_v4();
        let choice = HelpdeskChoice {
            helpdesk_id,
            categories: vec![],
            fields: vec![],
        };

        let failing = FakeSubmitter {
            fail: true,
            ..FakeSubmitter::default()
        };
        let mut wizard = TicketWizard::open();
        wizard.select_helpdesk(choice.clone());
        wizard.next().unwrap();
        wizard.title = "VPN down".to_string();
        assert!(matches!(wizard.submit(&failing).await, Err(WizardError::Submit(_))));
        assert!(wizard.is_open());
        assert_eq!(wizard.title, "VPN down");
        assert_eq!(wizard.step(), WizardStep::Details);

        let ok = FakeSubmitter::default();
        let outcome = wizard.submit(&ok).await.unwrap();
        assert!(outcome.refresh_list);
        assert_eq!(outcome.ticket.helpdesk_id, helpdesk_id);
        assert_eq!(ok.count(), 1);
        assert!(!wizard.is_open());
        assert_eq!(wizard.step(), WizardStep::Helpdesk);
        assert!(wizard.title.is_empty());
        assert_eq!(wizard.helpdesk_id(), None);
    }
}
