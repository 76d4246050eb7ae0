//! Request validation helper.
//!
//! Handlers collect per-field failures into a single 422 response instead of
//! stopping at the first one.

use crate::error::{ApiError, ApiResult};
use std::collections::BTreeMap;

/// Accumulates per-field validation errors.
///
/// The first error recorded for a field wins; subsequent checks on the same
/// field are ignored.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_insert_with(|| message.to_string());
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume the validator, failing with `FailedValidation` if any check
    /// recorded an error.
    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::FailedValidation(self.errors))
        }
    }
}

/// Minimal email shape check: something before and after a single `@`, with a
/// dot in the domain part. Deliverability is proven by the activation flow,
/// not the regex.
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
