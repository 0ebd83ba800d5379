//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings that are empty once surrounding whitespace is trimmed.
///
/// `length` validators count raw characters, so `"   "` would pass them; this check
/// runs next to them on every free-text field.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}
