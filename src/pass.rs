//! Per-issuance pass data.

use crate::field::FieldValue;
use crate::validation::validate_identifier;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Data for one issued pass, overlaid on a [`Template`](crate::Template).
///
/// The serial number identifies the pass across every provider; it is
/// generated when the caller does not supply one.
///
/// # Example
///
/// ```
/// use walletmux::PassData;
///
/// let data = PassData::new("summer-gala", "c1")
///     .with_serial_number("T-0001")
///     .with_field("event_name", "Gala")
///     .with_barcode("T1", Some("Ticket 1"));
///
/// assert_eq!(data.serial_number, "T-0001");
/// assert!(data.field_values.contains_key("event_name"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassData {
    /// Template this pass is issued from
    pub template_id: String,

    /// Customer the pass belongs to
    pub customer_id: String,

    /// Serial number, unique per provider and pass type
    pub serial_number: String,

    /// Overrides for template field values, keyed by field id
    #[serde(default)]
    pub field_values: BTreeMap<String, FieldValue>,

    /// Message encoded in the barcode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_message: Option<String>,

    /// Human-readable text printed below the barcode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_alt_text: Option<String>,

    /// When the pass becomes relevant (lock-screen surfacing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_date: Option<DateTime<Utc>>,

    /// When the pass stops being valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    /// Whether the pass is voided
    #[serde(default)]
    pub voided: bool,
}

impl PassData {
    /// Creates pass data with a freshly generated serial number.
    pub fn new(template_id: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            customer_id: customer_id.into(),
            serial_number: Uuid::new_v4().to_string(),
            field_values: BTreeMap::new(),
            barcode_message: None,
            barcode_alt_text: None,
            relevant_date: None,
            expiration_date: None,
            voided: false,
        }
    }

    /// Uses a caller-supplied serial number.
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = serial_number.into();
        self
    }

    /// Overrides a template field value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.field_values.insert(key.into(), value.into());
        self
    }

    pub fn with_barcode(mut self, message: impl Into<String>, alt_text: Option<&str>) -> Self {
        self.barcode_message = Some(message.into());
        self.barcode_alt_text = alt_text.map(str::to_string);
        self
    }

    pub fn with_relevant_date(mut self, date: DateTime<Utc>) -> Self {
        self.relevant_date = Some(date);
        self
    }

    pub fn with_expiration_date(mut self, date: DateTime<Utc>) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Checks the identifiers. Field values are checked against the template
    /// by [`Template::resolve`](crate::Template::resolve).
    pub fn validate(&self) -> Result<()> {
        validate_identifier("serial number", &self.serial_number)?;
        validate_identifier("template id", &self.template_id)?;
        if self.customer_id.trim().is_empty() {
            return Err(crate::WalletError::Validation(
                "customer id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_serials_are_unique() {
        let a = PassData::new("t", "c1");
        let b = PassData::new("t", "c1");
        assert_ne!(a.serial_number, b.serial_number);
        assert!(Uuid::parse_str(&a.serial_number).is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(PassData::new("t", "c1").validate().is_ok());
        assert!(PassData::new("t", " ").validate().is_err());
        assert!(PassData::new("t", "c1").with_serial_number("a/b").validate().is_err());
    }

    #[test]
    fn test_serde_skips_empty_options() {
        let data = PassData::new("t", "c1").with_serial_number("S1");
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("barcode_message").is_none());
        assert_eq!(json["serial_number"], "S1");

        let back: PassData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
