//! Validation helpers for DTOs.

use validator::ValidationError;

const HANDLE_MIN_LENGTH: usize = 3;
const HANDLE_MAX_LENGTH: usize = 24;

/// Validates that an account handle is 3 to 24 characters of ASCII
/// alphanumerics, underscores, or dashes.
pub fn validate_handle(handle: &str) -> Result<(), ValidationError> {
    if handle.len() < HANDLE_MIN_LENGTH || handle.len() > HANDLE_MAX_LENGTH {
        let mut err = ValidationError::new("handle_length");
        err.message = Some(
            format!(
                "handle must be {HANDLE_MIN_LENGTH} to {HANDLE_MAX_LENGTH} characters (got {})",
                handle.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("handle_format");
        err.message =
            Some("handle must contain only letters, digits, underscores, or dashes".into());
        return Err(err);
    }

    Ok(())
}

/// Whether a skin value is a plain `#rrggbb` hex color.
///
/// Hex colors are always a legal cosmetic; anything else must come from the
/// account's unlocked skin set.
pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_handle_valid() {
        assert!(validate_handle("ada").is_ok());
        assert!(validate_handle("Player_One").is_ok());
        assert!(validate_handle("a-b-c-123").is_ok());
    }

    #[test]
    fn test_validate_handle_invalid_length() {
        assert!(validate_handle("ab").is_err()); // too short
        assert!(validate_handle("").is_err()); // empty
        assert!(validate_handle("abcdefghijklmnopqrstuvwxy").is_err()); // too long
    }

    #[test]
    fn test_validate_handle_invalid_format() {
        assert!(validate_handle("no spaces").is_err());
        assert!(validate_handle("émile42").is_err());
        assert!(validate_handle("semi;colon").is_err());
    }

    #[test]
    fn test_is_hex_color() {
        assert!(is_hex_color("#ff0000"));
        assert!(is_hex_color("#00CCff"));
        assert!(!is_hex_color("ff0000")); // missing #
        assert!(!is_hex_color("#ff00")); // too short
        assert!(!is_hex_color("#ff00zz")); // invalid digit
        assert!(!is_hex_color("skin-rainbow"));
    }
}
