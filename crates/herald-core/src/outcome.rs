//! Command outcome.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use crate::validation::{ValidationContext, ValidationError};

/// Shared error list of every outcome that never recorded an error.
const NO_ERRORS: &[ValidationError] = &[];

/// Result of handling a command: success or a list of errors, plus an
/// optional typed payload.
///
/// An outcome is successful exactly when its error list is empty. Outcomes
/// created through [`CommandOutcome::ok`] borrow a static empty list and only
/// allocate when the first error is added.
pub struct CommandOutcome {
    errors: Cow<'static, [ValidationError]>,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

impl CommandOutcome {
    /// A successful outcome without payload.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            errors: Cow::Borrowed(NO_ERRORS),
            payload: None,
        }
    }

    /// A successful outcome carrying `payload`.
    #[must_use]
    pub fn ok_with<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            errors: Cow::Borrowed(NO_ERRORS),
            payload: Some(Box::new(payload)),
        }
    }

    /// A failed outcome with a single request-wide error.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::from_errors(vec![ValidationError::new(message)])
    }

    /// A failed outcome with a single error for `member`.
    #[must_use]
    pub fn failed_member(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_errors(vec![ValidationError::for_member(member, message)])
    }

    /// Builds an outcome from an error list. An empty list is a success.
    #[must_use]
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        let errors = if errors.is_empty() {
            Cow::Borrowed(NO_ERRORS)
        } else {
            Cow::Owned(errors)
        };
        Self {
            errors,
            payload: None,
        }
    }

    /// Builds an outcome from a finished validation pass.
    #[must_use]
    pub fn from_validation(ctx: ValidationContext) -> Self {
        Self::from_errors(ctx.into_errors())
    }

    /// Returns `true` when no error was recorded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Recorded errors, in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Records a request-wide error, turning the outcome into a failure.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.to_mut().push(ValidationError::new(message));
    }

    /// Records an error for `member`, turning the outcome into a failure.
    pub fn add_member_error(&mut self, member: impl Into<String>, message: impl Into<String>) {
        self.errors
            .to_mut()
            .push(ValidationError::for_member(member, message));
    }

    /// Stores `payload` unless one is already present.
    ///
    /// # Errors
    ///
    /// Returns the rejected value when a payload was set earlier.
    pub fn set_payload<T>(&mut self, payload: T) -> Result<(), T>
    where
        T: Any + Send + Sync,
    {
        if self.payload.is_some() {
            return Err(payload);
        }
        self.payload = Some(Box::new(payload));
        Ok(())
    }

    /// Returns `true` when a payload of any type is present.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Borrows the payload as `T`; `None` when unset or of another type.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }

    /// Removes and returns the payload as `T`. A payload of another type is
    /// left in place.
    pub fn take_payload<T: Any>(&mut self) -> Option<T> {
        if !self.payload.as_deref()?.is::<T>() {
            return None;
        }
        let boxed = self.payload.take()?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }
}

impl Default for CommandOutcome {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Debug for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOutcome")
            .field("success", &self.is_success())
            .field("errors", &self.errors)
            .field("has_payload", &self.has_payload())
            .finish()
    }
}

impl From<ValidationContext> for CommandOutcome {
    fn from(ctx: ValidationContext) -> Self {
        Self::from_validation(ctx)
    }
}
