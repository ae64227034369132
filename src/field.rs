//! Pass fields, their values and formatting hints.

use crate::validation::validate_field_key;
use crate::{Result, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A field value.
///
/// The builder never coerces between variants: a field whose formatting hint
/// asks for a date must receive a [`FieldValue::Date`], a currency or number
/// field a [`FieldValue::Number`].
///
/// Serialized with an explicit kind (`{"type": "text", "value": ..}`) so a
/// text value that looks like a date or number reads back as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    /// Numeric value (amounts, points, counts)
    Number(f64),
    /// Point in time
    Date(DateTime<Utc>),
    /// Free text
    Text(String),
}

impl FieldValue {
    /// Short name of the variant, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Text(_) => "text",
        }
    }

    /// Renders the value as JSON for provider payloads.
    ///
    /// Dates use RFC 3339 with a `Z` suffix.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(n) => serde_json::json!(n),
            Self::Date(d) => serde_json::Value::String(d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Section a field is placed in.
///
/// Sections render in declaration order: header, primary, secondary,
/// auxiliary, back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSection {
    /// Shown on the pass header (visible when stacked)
    Header,
    /// Most prominent fields
    Primary,
    /// Secondary row
    Secondary,
    /// Auxiliary row
    Auxiliary,
    /// Back of the pass
    Back,
}

impl FieldSection {
    /// All sections in render order.
    pub const ALL: [FieldSection; 5] = [
        Self::Header,
        Self::Primary,
        Self::Secondary,
        Self::Auxiliary,
        Self::Back,
    ];

    /// Key of the section's array in `pass.json`.
    pub fn pass_json_key(&self) -> &'static str {
        match self {
            Self::Header => "headerFields",
            Self::Primary => "primaryFields",
            Self::Secondary => "secondaryFields",
            Self::Auxiliary => "auxiliaryFields",
            Self::Back => "backFields",
        }
    }
}

impl fmt::Display for FieldSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Auxiliary => write!(f, "auxiliary"),
            Self::Back => write!(f, "back"),
        }
    }
}

impl std::str::FromStr for FieldSection {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "header" => Ok(Self::Header),
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "auxiliary" => Ok(Self::Auxiliary),
            "back" => Ok(Self::Back),
            other => Err(WalletError::Validation(format!(
                "unknown field section: {}",
                other
            ))),
        }
    }
}

/// Text alignment hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    Left,
    Center,
    Right,
    Natural,
}

impl TextAlignment {
    pub(crate) fn pass_json_value(&self) -> &'static str {
        match self {
            Self::Left => "PKTextAlignmentLeft",
            Self::Center => "PKTextAlignmentCenter",
            Self::Right => "PKTextAlignmentRight",
            Self::Natural => "PKTextAlignmentNatural",
        }
    }
}

/// Date or time display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStyle {
    None,
    Short,
    Medium,
    Long,
    Full,
}

impl DateStyle {
    pub(crate) fn pass_json_value(&self) -> &'static str {
        match self {
            Self::None => "PKDateStyleNone",
            Self::Short => "PKDateStyleShort",
            Self::Medium => "PKDateStyleMedium",
            Self::Long => "PKDateStyleLong",
            Self::Full => "PKDateStyleFull",
        }
    }
}

/// Number display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStyle {
    Decimal,
    Percent,
    Scientific,
    SpellOut,
}

impl NumberStyle {
    pub(crate) fn pass_json_value(&self) -> &'static str {
        match self {
            Self::Decimal => "PKNumberStyleDecimal",
            Self::Percent => "PKNumberStylePercent",
            Self::Scientific => "PKNumberStyleScientific",
            Self::SpellOut => "PKNumberStyleSpellOut",
        }
    }
}

/// The value type a field's formatting hints require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Any value is accepted and shown as-is.
    Any,
    /// Date or time style set.
    Date,
    /// Currency code or number style set.
    Number,
}

/// A single field declared by a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassField {
    /// Field id, unique across the template
    pub key: String,
    /// Label shown above the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Default value used when pass data carries no override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    /// Lock-screen message on change; `%@` is replaced with the new value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_alignment: Option<TextAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_style: Option<DateStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_style: Option<DateStyle>,
    /// Show dates relative to now ("in 2 hours")
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_relative: bool,
    /// ISO 4217 currency code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_style: Option<NumberStyle>,
}

impl PassField {
    /// Creates a text field with a label and no default value.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: Some(label.into()),
            value: None,
            change_message: None,
            text_alignment: None,
            date_style: None,
            time_style: None,
            is_relative: false,
            currency_code: None,
            number_style: None,
        }
    }

    /// Sets the default value.
    pub fn with_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_change_message(mut self, message: impl Into<String>) -> Self {
        self.change_message = Some(message.into());
        self
    }

    pub fn with_text_alignment(mut self, alignment: TextAlignment) -> Self {
        self.text_alignment = Some(alignment);
        self
    }

    /// Marks the field as a date, rendered with the given styles.
    pub fn with_date_style(mut self, date_style: DateStyle, time_style: DateStyle) -> Self {
        self.date_style = Some(date_style);
        self.time_style = Some(time_style);
        self
    }

    pub fn relative(mut self) -> Self {
        self.is_relative = true;
        self
    }

    /// Marks the field as a monetary amount.
    pub fn with_currency(mut self, code: impl Into<String>) -> Self {
        self.currency_code = Some(code.into());
        self
    }

    pub fn with_number_style(mut self, style: NumberStyle) -> Self {
        self.number_style = Some(style);
        self
    }

    /// Value type required by the formatting hints.
    pub fn value_kind(&self) -> ValueKind {
        if self.date_style.is_some() || self.time_style.is_some() || self.is_relative {
            ValueKind::Date
        } else if self.currency_code.is_some() || self.number_style.is_some() {
            ValueKind::Number
        } else {
            ValueKind::Any
        }
    }

    /// Checks that `value` satisfies the formatting hints.
    pub fn check_value(&self, value: &FieldValue) -> Result<()> {
        let ok = match self.value_kind() {
            ValueKind::Any => true,
            ValueKind::Date => matches!(value, FieldValue::Date(_)),
            ValueKind::Number => matches!(value, FieldValue::Number(_)),
        };
        if ok {
            Ok(())
        } else {
            let expected = match self.value_kind() {
                ValueKind::Date => "a date",
                _ => "a number",
            };
            Err(WalletError::Validation(format!(
                "field '{}' expects {} but got {}",
                self.key,
                expected,
                value.type_name()
            )))
        }
    }

    /// Parses command-line text into the value type the hints ask for.
    ///
    /// Dates accept RFC 3339 or `YYYY-MM-DD` (midnight UTC).
    pub fn parse_value(&self, raw: &str) -> Result<FieldValue> {
        let invalid = |expected: &str| {
            WalletError::Validation(format!(
                "field '{}' expects {} but got '{}'",
                self.key, expected, raw
            ))
        };
        match self.value_kind() {
            ValueKind::Any => Ok(FieldValue::Text(raw.to_string())),
            ValueKind::Number => raw
                .trim()
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| invalid("a number")),
            ValueKind::Date => {
                let raw = raw.trim();
                if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
                    return Ok(FieldValue::Date(date.with_timezone(&Utc)));
                }
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|d| FieldValue::Date(d.and_utc()))
                    .ok_or_else(|| invalid("a date"))
            }
        }
    }

    /// Validates the key and the default value.
    pub fn validate(&self) -> Result<()> {
        validate_field_key(&self.key)?;
        if self.date_style.is_some() && self.currency_code.is_some() {
            return Err(WalletError::Validation(format!(
                "field '{}' cannot be both a date and a currency amount",
                self.key
            )));
        }
        if let Some(code) = &self.currency_code {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(WalletError::Validation(format!(
                    "field '{}' has invalid currency code '{}'",
                    self.key, code
                )));
            }
        }
        if let Some(value) = &self.value {
            self.check_value(value)?;
        }
        Ok(())
    }
}

/// A template field with its value resolved against pass data.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField<'a> {
    /// Section the field belongs to
    pub section: FieldSection,
    /// Field declaration
    pub field: &'a PassField,
    /// Override from pass data, or the template default
    pub value: FieldValue,
}
