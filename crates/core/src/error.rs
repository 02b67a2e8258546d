use serde::Serialize;

use crate::money::Money;
use crate::types::DbId;

/// A validation message attached to a single request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
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

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Invalid request: {}", summarize(.0))]
    InvalidRequest(Vec<FieldError>),

    #[error("Insufficient budget: short by {shortfall}")]
    InsufficientBudget { shortfall: Money },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest(vec![FieldError::new(field, message)])
    }
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", e.code));
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        // field_errors() iterates a HashMap; sort for stable responses.
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Self::InvalidRequest(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_display_lists_fields() {
        let err = CoreError::InvalidRequest(vec![
            FieldError::new("prompt", "too short"),
            FieldError::new("duration", "must be 4, 6 or 8"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid request: prompt: too short; duration: must be 4, 6 or 8"
        );
    }

    #[test]
    fn insufficient_budget_display_shows_shortfall() {
        let err = CoreError::InsufficientBudget {
            shortfall: Money::from_cents(10),
        };
        assert_eq!(err.to_string(), "Insufficient budget: short by $0.10");
    }
}
