//! Ticket form fields: typed field kinds, visibility and validation.
//!
//! The same evaluator backs the creation wizard and the server-side check in
//! `POST /api/tickets`, so a value the wizard accepts is a value the server
//! accepts.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::core::shared::schema::ticket_form_fields;

static EMAIL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());
static PHONE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ().\-]{5,19}$").ok());

/// Submitted custom values keyed by field key. Everything arrives as text,
/// checkboxes as `"true"` / `"false"`.
pub type FieldValues = BTreeMap<String, String>;

/// Regex a text value must match in full. Compiled once, when the field is
/// deserialized or loaded, so a bad pattern never reaches a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPattern {
    source: String,
    regex: Regex,
}

impl FieldPattern {
    pub fn new(source: &str) -> Result<Self, String> {
        // the bare pattern must parse too, or `a)|(b` would slip past the anchors
        let regex = Regex::new(source)
            .and_then(|_| Regex::new(&format!("^(?:{source})$")))
            .map_err(|e| format!("invalid pattern '{source}': {e}"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for FieldPattern {
    type Error = String;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::new(&source)
    }
}

impl From<FieldPattern> for String {
    fn from(pattern: FieldPattern) -> Self {
        pattern.source
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text {
        #[serde(default, rename = "minLength")]
        min_length: Option<usize>,
        #[serde(default, rename = "maxLength")]
        max_length: Option<usize>,
        #[serde(default)]
        pattern: Option<FieldPattern>,
    },
    TextArea {
        #[serde(default, rename = "minLength")]
        min_length: Option<usize>,
        #[serde(default, rename = "maxLength")]
        max_length: Option<usize>,
    },
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Email,
    Phone,
    Date {
        #[serde(default)]
        min: Option<NaiveDate>,
        #[serde(default)]
        max: Option<NaiveDate>,
    },
    Select {
        options: Vec<String>,
    },
    Checkbox,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::TextArea { .. } => "textarea",
            Self::Number { .. } => "number",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Date { .. } => "date",
            Self::Select { .. } => "select",
            Self::Checkbox => "checkbox",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    #[default]
    Full,
    Half,
    Third,
}

impl FieldWidth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Half => "half",
            Self::Third => "third",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "half" => Self::Half,
            "third" => Self::Third,
            _ => Self::Full,
        }
    }
}

/// Show the field only while `field` currently holds `equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRule {
    pub field: String,
    pub equals: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub form_category_id: Option<Uuid>,
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    pub order: i32,
    pub width: FieldWidth,
    pub internal_only: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub visibility: Option<VisibilityRule>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormFieldRequest {
    pub form_category_id: Option<Uuid>,
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    pub order: Option<i32>,
    #[serde(default)]
    pub width: FieldWidth,
    #[serde(default)]
    pub internal_only: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub visibility: Option<VisibilityRule>,
}

impl CreateFormFieldRequest {
    pub fn into_field(self, helpdesk_id: Uuid) -> Result<FormField, String> {
        let key = self.key.trim().to_string();
        if key.is_empty() {
            return Err("field key is required".to_string());
        }
        if self.label.trim().is_empty() {
            return Err("field label is required".to_string());
        }
        match &self.kind {
            FieldKind::Select { options } if options.is_empty() => {
                return Err("select fields need at least one option".to_string());
            }
            _ => {}
        }
        if self.visibility.as_ref().is_some_and(|v| v.field == key) {
            return Err("a field cannot depend on itself".to_string());
        }
        Ok(FormField {
            id: Uuid::new_v4(),
            helpdesk_id,
            form_category_id: self.form_category_id,
            key,
            label: self.label,
            kind: self.kind,
            required: self.required,
            order: self.order.unwrap_or(0),
            width: self.width,
            internal_only: self.internal_only,
            placeholder: self.placeholder,
            help_text: self.help_text,
            visibility: self.visibility,
            created_at: Utc::now(),
        })
    }
}

/// Row shape of `ticket_form_fields`. Kind-specific data is spread over
/// nullable columns and folded back into [`FieldKind`] on load.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = ticket_form_fields)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbFormField {
    pub id: Uuid,
    pub helpdesk_id: Uuid,
    pub form_category_id: Option<Uuid>,
    pub field_key: String,
    pub label: String,
    pub field_type: String,
    pub required: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub pattern: Option<String>,
    pub options: Vec<String>,
    pub sort_order: i32,
    pub width: String,
    pub internal_only: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub conditional_field: Option<String>,
    pub conditional_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn as_length(value: Option<f64>) -> Option<usize> {
    value.filter(|v| *v >= 0.0).map(|v| v as usize)
}

impl TryFrom<DbFormField> for FormField {
    type Error = String;

    fn try_from(row: DbFormField) -> Result<Self, Self::Error> {
        let kind = match row.field_type.as_str() {
            "text" => FieldKind::Text {
                min_length: as_length(row.min_value),
                max_length: as_length(row.max_value),
                pattern: row.pattern.as_deref().map(FieldPattern::new).transpose()?,
            },
            "textarea" => FieldKind::TextArea {
                min_length: as_length(row.min_value),
                max_length: as_length(row.max_value),
            },
            "number" => FieldKind::Number {
                min: row.min_value,
                max: row.max_value,
            },
            "email" => FieldKind::Email,
            "phone" => FieldKind::Phone,
            "date" => FieldKind::Date {
                min: row.min_date,
                max: row.max_date,
            },
            "select" => FieldKind::Select {
                options: row.options,
            },
            "checkbox" => FieldKind::Checkbox,
            other => return Err(format!("unknown field type '{other}' on {}", row.field_key)),
        };
        let visibility = match (row.conditional_field, row.conditional_value) {
            (Some(field), Some(equals)) => Some(VisibilityRule { field, equals }),
            _ => None,
        };
        Ok(Self {
            id: row.id,
            helpdesk_id: row.helpdesk_id,
            form_category_id: row.form_category_id,
            key: row.field_key,
            label: row.label,
            kind,
            required: row.required,
            order: row.sort_order,
            width: FieldWidth::parse(&row.width),
            internal_only: row.internal_only,
            placeholder: row.placeholder,
            help_text: row.help_text,
            visibility,
            created_at: row.created_at,
        })
    }
}

impl From<&FormField> for DbFormField {
    fn from(field: &FormField) -> Self {
        let mut row = Self {
            id: field.id,
            helpdesk_id: field.helpdesk_id,
            form_category_id: field.form_category_id,
            field_key: field.key.clone(),
            label: field.label.clone(),
            field_type: field.kind.type_name().to_string(),
            required: field.required,
            min_value: None,
            max_value: None,
            min_date: None,
            max_date: None,
            pattern: None,
            options: Vec::new(),
            sort_order: field.order,
            width: field.width.as_str().to_string(),
            internal_only: field.internal_only,
            placeholder: field.placeholder.clone(),
            help_text: field.help_text.clone(),
            conditional_field: field.visibility.as_ref().map(|v| v.field.clone()),
            conditional_value: field.visibility.as_ref().map(|v| v.equals.clone()),
            created_at: field.created_at,
        };
        match &field.kind {
            FieldKind::Text {
                min_length,
                max_length,
                pattern,
            } => {
                row.min_value = min_length.map(|v| v as f64);
                row.max_value = max_length.map(|v| v as f64);
                row.pattern = pattern.as_ref().map(|p| p.as_str().to_string());
            }
            FieldKind::TextArea {
                min_length,
                max_length,
            } => {
                row.min_value = min_length.map(|v| v as f64);
                row.max_value = max_length.map(|v| v as f64);
            }
            FieldKind::Number { min, max } => {
                row.min_value = *min;
                row.max_value = *max;
            }
            FieldKind::Date { min, max } => {
                row.min_date = *min;
                row.max_date = *max;
            }
            FieldKind::Select { options } => row.options = options.clone(),
            FieldKind::Email | FieldKind::Phone | FieldKind::Checkbox => {}
        }
        row
    }
}

pub fn is_visible(field: &FormField, values: &FieldValues) -> bool {
    match &field.visibility {
        None => true,
        Some(rule) => values.get(&rule.field).is_some_and(|v| v == &rule.equals),
    }
}

/// Requester-facing fields for a helpdesk: those of `category` when one is
/// chosen, otherwise the uncategorised ones. Internal-only fields are dropped.
pub fn active_fields(fields: &[FormField], category: Option<Uuid>) -> Vec<&FormField> {
    let mut active: Vec<&FormField> = fields
        .iter()
        .filter(|f| !f.internal_only && f.form_category_id == category)
        .collect();
    active.sort_by_key(|f| f.order);
    active
}

fn check_length(
    key: &str,
    value: &str,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), FieldError> {
    let len = value.chars().count();
    if let Some(min) = min.filter(|m| len < *m) {
        return Err(FieldError::new(key, format!("must be at least {min} characters")));
    }
    if let Some(max) = max.filter(|m| len > *m) {
        return Err(FieldError::new(key, format!("must be at most {max} characters")));
    }
    Ok(())
}

fn matches(regex: &LazyLock<Option<Regex>>, value: &str) -> bool {
    regex.as_ref().is_some_and(|r| r.is_match(value))
}

/// Checks one non-empty value against its field kind.
pub fn validate_value(field: &FormField, value: &str) -> Result<(), FieldError> {
    let key = field.key.as_str();
    match &field.kind {
        FieldKind::Text {
            min_length,
            max_length,
            pattern,
        } => {
            check_length(key, value, *min_length, *max_length)?;
            if pattern.as_ref().is_some_and(|p| !p.is_match(value)) {
                return Err(FieldError::new(key, "has an invalid format"));
            }
            Ok(())
        }
        FieldKind::TextArea {
            min_length,
            max_length,
        } => check_length(key, value, *min_length, *max_length),
        FieldKind::Number { min, max } => {
            let n: f64 = value
                .trim()
                .parse()
                .map_err(|_| FieldError::new(key, "must be a number"))?;
            if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                let range = match (min, max) {
                    (Some(a), Some(b)) => format!("between {a} and {b}"),
                    (Some(a), None) => format!("at least {a}"),
                    (None, Some(b)) => format!("at most {b}"),
                    (None, None) => String::new(),
                };
                return Err(FieldError::new(key, format!("must be {range}")));
            }
            Ok(())
        }
        FieldKind::Email => {
            if matches(&EMAIL_REGEX, value.trim()) {
                Ok(())
            } else {
                Err(FieldError::new(key, "must be a valid email address"))
            }
        }
        FieldKind::Phone => {
            if matches(&PHONE_REGEX, value.trim()) {
                Ok(())
            } else {
                Err(FieldError::new(key, "must be a valid phone number"))
            }
        }
        FieldKind::Date { min, max } => {
            let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map_err(|_| FieldError::new(key, "must be a date (YYYY-MM-DD)"))?;
            if let Some(min) = min.filter(|m| date < *m) {
                return Err(FieldError::new(key, format!("must be on or after {min}")));
            }
            if let Some(max) = max.filter(|m| date > *m) {
                return Err(FieldError::new(key, format!("must be on or before {max}")));
            }
            Ok(())
        }
        FieldKind::Select { options } => {
            if options.iter().any(|o| o == value) {
                Ok(())
            } else {
                Err(FieldError::new(key, "is not one of the allowed options"))
            }
        }
        FieldKind::Checkbox => match value {
            "true" | "false" => Ok(()),
            _ => Err(FieldError::new(key, "must be true or false")),
        },
    }
}

/// Validates a submission against the active, visible fields and returns the
/// values restricted to those fields. All problems are reported together.
pub fn validate_submission(
    fields: &[FormField],
    category: Option<Uuid>,
    values: &FieldValues,
) -> Result<FieldValues, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut accepted = FieldValues::new();

    for field in active_fields(fields, category) {
        if !is_visible(field, values) {
            continue;
        }
        let value = values.get(&field.key).map(|v| v.as_str()).unwrap_or("");
        // an unticked required checkbox counts as missing
        let missing = value.trim().is_empty()
            || (matches!(field.kind, FieldKind::Checkbox) && value == "false");
        if missing {
            if field.required {
                errors.push(FieldError::new(&field.key, format!("{} is required", field.label)));
            }
            if !value.is_empty() {
                accepted.insert(field.key.clone(), value.to_string());
            }
            continue;
        }
        match validate_value(field, value) {
            Ok(()) => {
                accepted.insert(field.key.clone(), value.to_string());
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(accepted)
    } else {
        Err(errors)
    }
}

/// Flattens a JSON object of custom values into text values.
pub fn normalize_values(raw: &serde_json::Map<String, serde_json::Value>) -> FieldValues {
    raw.iter()
        .filter_map(|(k, v)| {
            let text = match v {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), text))
        })
        .collect()
}

pub fn values_to_json(values: &FieldValues) -> serde_json::Value {
    serde_json::Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}
