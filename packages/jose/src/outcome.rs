//! Result type carrying a value (when one exists) together with every error

use crate::{error::JoseError, types::Token};

/// `(value_or_absent, error_list)` returned by build and decode
///
/// A value alongside errors is only possible for decoding: the token passed
/// integrity checks but its claims were rejected. Such a value can be
/// inspected with [`Outcome::value`] but is never returned by
/// [`Outcome::trusted`].
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Outcome<T> {
    value: Option<T>,
    errors: Vec<JoseError>,
}

/// Result of building a token: the compact string, or every build error
pub type BuildOutcome = Outcome<String>;

/// Result of decoding a token
pub type DecodeOutcome = Outcome<Token>;

impl<T> Outcome<T> {
    pub(crate) fn success(value: T) -> Self {
        Self {
            value: Some(value),
            errors: Vec::new(),
        }
    }

    pub(crate) fn failure(errors: Vec<JoseError>) -> Self {
        Self {
            value: None,
            errors,
        }
    }

    pub(crate) fn rejected(value: T, errors: Vec<JoseError>) -> Self {
        Self {
            value: Some(value),
            errors,
        }
    }

    /// Whether a value exists and no error was recorded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value.is_some() && self.errors.is_empty()
    }

    /// The value only when no error was recorded
    #[must_use]
    pub fn trusted(&self) -> Option<&T> {
        if self.errors.is_empty() {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// The value regardless of recorded errors, for inspection
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Every recorded error, in pipeline order
    #[must_use]
    pub fn errors(&self) -> &[JoseError] {
        &self.errors
    }

    /// Split into parts
    #[must_use]
    pub fn into_parts(self) -> (Option<T>, Vec<JoseError>) {
        (self.value, self.errors)
    }

    /// `Ok` only for a value with no errors
    ///
    /// # Errors
    /// Returns the error list when anything was recorded
    pub fn into_result(self) -> Result<T, Vec<JoseError>> {
        match (self.value, self.errors.is_empty()) {
            (Some(value), true) => Ok(value),
            (_, _) => Err(self.errors),
        }
    }
}
