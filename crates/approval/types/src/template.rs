//! Form templates: reusable form definitions bound to a workflow.
//!
//! The form builder that authors field definitions is an external
//! collaborator; the engine only reads a template to validate submitted
//! data and to find the bound workflow.

use crate::{TemplateId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ── Field definitions ────────────────────────────────────────────────

/// The value shape a field accepts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free-form string
    Text,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// ISO-8601 date (`YYYY-MM-DD`) or RFC 3339 timestamp string
    Date,
    /// One of a fixed set of options
    Select { options: Vec<String> },
}

/// A single field in a form template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Key under which the value appears in submission data
    pub name: String,
    /// Human-readable label
    pub label: String,
    /// Accepted value shape
    pub field_type: FieldType,
    /// Whether a value must be present and non-null
    pub required: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Validate one submitted value against this definition
    pub fn validate_value(&self, value: Option<&Value>) -> Result<(), FieldError> {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    return Err(FieldError::new(&self.name, "required field is missing"));
                }
                return Ok(());
            }
            Some(v) => v,
        };

        match &self.field_type {
            FieldType::Text => {
                if !value.is_string() {
                    return Err(FieldError::new(&self.name, "expected a string"));
                }
            }
            FieldType::Number => {
                if !value.is_number() {
                    return Err(FieldError::new(&self.name, "expected a number"));
                }
            }
            FieldType::Boolean => {
                if !value.is_boolean() {
                    return Err(FieldError::new(&self.name, "expected a boolean"));
                }
            }
            FieldType::Date => {
                let Some(text) = value.as_str() else {
                    return Err(FieldError::new(&self.name, "expected a date string"));
                };
                let is_date = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
                    || DateTime::parse_from_rfc3339(text).is_ok();
                if !is_date {
                    return Err(FieldError::new(
                        &self.name,
                        "expected YYYY-MM-DD or an RFC 3339 timestamp",
                    ));
                }
            }
            FieldType::Select { options } => {
                let Some(text) = value.as_str() else {
                    return Err(FieldError::new(&self.name, "expected one of the options"));
                };
                if !options.iter().any(|o| o == text) {
                    return Err(FieldError::new(
                        &self.name,
                        format!("'{}' is not an allowed option", text),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A field-level validation failure, surfaced to the caller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The field the error refers to
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ── Form Template ────────────────────────────────────────────────────

/// A reusable form definition bound to exactly one workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormTemplate {
    /// Unique identifier
    pub id: TemplateId,
    /// Human-readable name
    pub name: String,
    /// Description shown to submitters
    pub description: String,
    /// The workflow submissions of this template route through
    pub workflow_id: WorkflowId,
    /// Field definitions submitted data is validated against
    pub fields: Vec<FieldDef>,
    /// Number of live submissions created from this template
    pub usage_count: u64,
    /// When this template was created
    pub created_at: DateTime<Utc>,
}

impl FormTemplate {
    pub fn new(name: impl Into<String>, workflow_id: WorkflowId) -> Self {
        Self {
            id: TemplateId::generate(),
            name: name.into(),
            description: String::new(),
            workflow_id,
            fields: Vec::new(),
            usage_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate submitted data against the field definitions.
    ///
    /// Unknown keys are ignored (the form collaborator owns rendering
    /// concerns); missing required fields and type mismatches are
    /// collected per-field.
    pub fn validate_data(&self, data: &HashMap<String, Value>) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|field| field.validate_value(data.get(&field.name)).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
