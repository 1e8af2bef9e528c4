//! Validation model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single validation failure, optionally tied to a request member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The member the error refers to; `None` for request-wide errors.
    pub member: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    /// Creates a request-wide error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            member: None,
            message: message.into(),
        }
    }

    /// Creates an error attached to `member`.
    pub fn for_member(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            member: Some(member.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{member}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Accumulates validation errors during the validate phase of a command.
#[derive(Debug, Default)]
pub struct ValidationContext {
    errors: Vec<ValidationError>,
}

impl ValidationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request-wide error.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationError::new(message));
    }

    /// Records an error for `member`.
    pub fn add_member_error(&mut self, member: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::for_member(member, message));
    }

    /// Returns `true` when no error has been recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` when no error has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Recorded errors, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Consumes the context.
    #[must_use]
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_valid() {
        let ctx = ValidationContext::new();

        assert!(ctx.is_valid());
        assert_eq!(ctx.len(), 0);
    }

    #[test]
    fn test_errors_keep_insertion_order() {
        // Arrange
        let mut ctx = ValidationContext::new();

        // Act
        ctx.add_member_error("quantity", "must be positive");
        ctx.add_error("order is closed");

        // Assert
        assert!(!ctx.is_valid());
        let errors = ctx.into_errors();
        assert_eq!(errors[0], ValidationError::for_member("quantity", "must be positive"));
        assert_eq!(errors[1], ValidationError::new("order is closed"));
    }

    #[test]
    fn test_display_prefixes_member() {
        assert_eq!(
            ValidationError::for_member("sku", "unknown").to_string(),
            "sku: unknown"
        );
        assert_eq!(ValidationError::new("closed").to_string(), "closed");
    }

    #[test]
    fn test_serializes_member_as_null_when_absent() {
        let json = serde_json::to_value(ValidationError::new("closed")).unwrap();

        assert_eq!(json, serde_json::json!({ "member": null, "message": "closed" }));
    }
}
