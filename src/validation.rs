//! Identifier validation for serial numbers, pass ids and field keys.
//!
//! Pass ids become file names in the filesystem storage backend and path
//! segments in provider API URLs, so they are restricted to characters that
//! are safe in both places.

use crate::{Result, WalletError};

/// Characters that are unsafe in a file name or URL path segment.
const FORBIDDEN_CHARS: &str = "/\\:*?\"<>|#%&;`$";

/// Maximum allowed length for identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Maximum length of a provider-derived pass id.
///
/// Leaves room for the `.json` suffix within the common 255-byte file name
/// limit.
pub const MAX_PASS_ID_LENGTH: usize = 200;

/// Validates an identifier (serial number, pass id, provider name).
///
/// Rejects:
/// - Empty identifiers
/// - Excessive length (>255 characters)
/// - Null bytes and control characters
/// - Leading dots (`..`, hidden files)
/// - Whitespace and path or URL metacharacters
///
/// # Errors
///
/// Returns [`WalletError::Validation`] if validation fails.
///
/// # Example
///
/// ```
/// use walletmux::validation::validate_identifier;
///
/// assert!(validate_identifier("serial", "TICKET-0001").is_ok());
/// assert!(validate_identifier("pass id", "pass.com.example.events.T1").is_ok());
///
/// assert!(validate_identifier("serial", "").is_err());
/// assert!(validate_identifier("serial", "../../etc/passwd").is_err());
/// assert!(validate_identifier("serial", "a b").is_err());
/// ```
pub fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(WalletError::Validation(format!("{} cannot be empty", what)));
    }

    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(WalletError::Validation(format!(
            "{} exceeds maximum length of {} characters",
            what, MAX_IDENTIFIER_LENGTH
        )));
    }

    if value.chars().any(|c| c.is_control()) {
        return Err(WalletError::Validation(format!(
            "{} contains control characters",
            what
        )));
    }

    if value.starts_with('.') {
        return Err(WalletError::Validation(format!(
            "{} cannot start with '.'",
            what
        )));
    }

    if value
        .chars()
        .any(|c| c.is_whitespace() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(WalletError::Validation(format!(
            "{} '{}' contains forbidden characters (not allowed: whitespace, {})",
            what, value, FORBIDDEN_CHARS
        )));
    }

    Ok(())
}

/// Validates a pass id derived by a provider from a serial number.
///
/// Applies the identifier rules with the tighter [`MAX_PASS_ID_LENGTH`],
/// since providers prefix the serial (e.g. with the pass type identifier)
/// and the result becomes a file name.
///
/// # Example
///
/// ```
/// use walletmux::validation::{validate_pass_id, MAX_PASS_ID_LENGTH};
///
/// assert!(validate_pass_id("pass.com.example.events.T1").is_ok());
/// assert!(validate_pass_id(&"T".repeat(MAX_PASS_ID_LENGTH + 1)).is_err());
/// ```
pub fn validate_pass_id(pass_id: &str) -> Result<()> {
    validate_identifier("pass id", pass_id)?;
    if pass_id.len() > MAX_PASS_ID_LENGTH {
        return Err(WalletError::Validation(format!(
            "pass id exceeds maximum length of {} characters ({}); use a shorter serial number",
            MAX_PASS_ID_LENGTH,
            pass_id.len()
        )));
    }
    Ok(())
}

/// Validates a template field key.
///
/// Keys are emitted verbatim into provider payloads, so they are limited to
/// ASCII letters, digits, `_`, `-` and `.`.
pub fn validate_field_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(WalletError::Validation(
            "field key cannot be empty".to_string(),
        ));
    }

    if key.len() > MAX_IDENTIFIER_LENGTH {
        return Err(WalletError::Validation(format!(
            "field key exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(WalletError::Validation(format!(
            "field key '{}' may only contain ASCII letters, digits, '_', '-' and '.'",
            key
        )));
    }

    Ok(())
}
