//! Provider-agnostic pass templates.
//!
//! A [`Template`] describes the look and the field layout of a pass once;
//! every provider adapter renders it into its own format. Field ids are
//! unique across the whole template, not just within a section.

use crate::field::{FieldSection, PassField, ResolvedField};
use crate::pass::PassData;
use crate::{Result, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// Declared kind of pass. Each provider maps it to its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Generic,
    EventTicket,
    Coupon,
    Loyalty,
    BoardingPass,
    Membership,
    StoreCard,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "generic",
            Self::EventTicket => "event_ticket",
            Self::Coupon => "coupon",
            Self::Loyalty => "loyalty",
            Self::BoardingPass => "boarding_pass",
            Self::Membership => "membership",
            Self::StoreCard => "store_card",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PassKind {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.replace('-', "_").as_str() {
            "generic" => Ok(Self::Generic),
            "event_ticket" | "event" => Ok(Self::EventTicket),
            "coupon" => Ok(Self::Coupon),
            "loyalty" => Ok(Self::Loyalty),
            "boarding_pass" | "boarding" => Ok(Self::BoardingPass),
            "membership" => Ok(Self::Membership),
            "store_card" | "store" => Ok(Self::StoreCard),
            other => Err(WalletError::Validation(format!("unknown pass kind: {}", other))),
        }
    }
}

/// Colors and logo text.
///
/// Colors are `#RRGGBB` or `rgb(r, g, b)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStyle {
    pub background_color: String,
    pub foreground_color: String,
    pub label_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_text: Option<String>,
}

impl Default for PassStyle {
    fn default() -> Self {
        Self {
            background_color: "#FFFFFF".to_string(),
            foreground_color: "#000000".to_string(),
            label_color: "#999999".to_string(),
            logo_text: None,
        }
    }
}

/// Image slot on a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    Logo,
    Icon,
    Strip,
    Background,
    Thumbnail,
    Footer,
}

impl ImageRole {
    /// All roles in archive order.
    pub const ALL: [ImageRole; 6] = [
        Self::Background,
        Self::Footer,
        Self::Icon,
        Self::Logo,
        Self::Strip,
        Self::Thumbnail,
    ];

    /// Canonical file stem (`logo` → `logo.png`, `logo@2x.png`).
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Logo => "logo",
            Self::Icon => "icon",
            Self::Strip => "strip",
            Self::Background => "background",
            Self::Thumbnail => "thumbnail",
            Self::Footer => "footer",
        }
    }
}

/// PNG image bytes with an optional high-resolution variant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub retina: Option<Vec<u8>>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("data", &format_args!("{} bytes", self.data.len()))
            .field("retina", &self.retina.as_ref().map(Vec::len))
            .finish()
    }
}

impl Image {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            retina: None,
        }
    }

    pub fn with_retina(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.retina = Some(data.into());
        self
    }

    /// Reads an image from disk, picking up a `name@2x.ext` sibling when one
    /// exists.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            WalletError::Validation(format!("cannot read image {}: {}", path.display(), e))
        })?;

        let retina_path = match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) => Some(path.with_file_name(format!(
                "{}@2x.{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            ))),
            _ => None,
        };

        let retina = match retina_path {
            Some(p) => match tokio::fs::read(&p).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(WalletError::Validation(format!(
                        "cannot read image {}: {}",
                        p.display(),
                        e
                    )))
                }
            },
            None => None,
        };

        Ok(Self { data, retina })
    }
}

/// Image set. Logo and icon are mandatory for the signed archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Image>,
}

impl PassImages {
    pub fn get(&self, role: ImageRole) -> Option<&Image> {
        self.slot(role).as_ref()
    }

    pub fn set(&mut self, role: ImageRole, image: Image) {
        *self.slot_mut(role) = Some(image);
    }

    fn slot(&self, role: ImageRole) -> &Option<Image> {
        match role {
            ImageRole::Logo => &self.logo,
            ImageRole::Icon => &self.icon,
            ImageRole::Strip => &self.strip,
            ImageRole::Background => &self.background,
            ImageRole::Thumbnail => &self.thumbnail,
            ImageRole::Footer => &self.footer,
        }
    }

    fn slot_mut(&mut self, role: ImageRole) -> &mut Option<Image> {
        match role {
            ImageRole::Logo => &mut self.logo,
            ImageRole::Icon => &mut self.icon,
            ImageRole::Strip => &mut self.strip,
            ImageRole::Background => &mut self.background,
            ImageRole::Thumbnail => &mut self.thumbnail,
            ImageRole::Footer => &mut self.footer,
        }
    }

    /// Present images in archive order.
    pub fn iter(&self) -> impl Iterator<Item = (ImageRole, &Image)> {
        ImageRole::ALL
            .into_iter()
            .filter_map(move |role| self.get(role).map(|img| (role, img)))
    }
}

/// Barcode symbology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    Qr,
    Pdf417,
    Aztec,
    Code128,
}

/// Geofence that surfaces the pass on the lock screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Radius in meters
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Lock-screen text shown when in range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_text: Option<String>,
}

fn default_radius() -> f64 {
    100.0
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            radius: default_radius(),
            relevant_text: None,
        }
    }

    pub fn with_radius(mut self, meters: f64) -> Self {
        self.radius = meters;
        self
    }

    pub fn with_relevant_text(mut self, text: impl Into<String>) -> Self {
        self.relevant_text = Some(text.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(WalletError::Validation(format!(
                "location ({}, {}) is out of range",
                self.latitude, self.longitude
            )));
        }
        if !(self.radius > 0.0) {
            return Err(WalletError::Validation(
                "location radius must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// NFC payload for contactless terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_public_key: Option<String>,
    #[serde(default)]
    pub requires_authentication: bool,
}

/// A pass design shared by many issued passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization_id: String,
    pub kind: PassKind,
    #[serde(default)]
    pub style: PassStyle,
    #[serde(default)]
    pub images: PassImages,
    /// Fields by section; see [`Template::add_field`].
    #[serde(default)]
    sections: BTreeMap<FieldSection, Vec<PassField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_format: Option<BarcodeFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfc: Option<NfcPayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Creates an empty template with default colors and a QR barcode.
    ///
    /// The id is derived from the name (`"Summer Gala"` → `summer-gala`) and
    /// the logo text defaults to the name.
    pub fn new(name: impl Into<String>, organization_id: impl Into<String>, kind: PassKind) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: slug(&name),
            version: 1,
            description: name.clone(),
            style: PassStyle {
                logo_text: Some(name.clone()),
                ..PassStyle::default()
            },
            name,
            organization_id: organization_id.into(),
            kind,
            images: PassImages::default(),
            sections: BTreeMap::new(),
            barcode_format: Some(BarcodeFormat::Qr),
            locations: Vec::new(),
            nfc: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_style(mut self, style: PassStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_image(mut self, role: ImageRole, image: Image) -> Self {
        self.images.set(role, image);
        self
    }

    /// Sets the barcode symbology; `None` removes the barcode.
    pub fn with_barcode_format(mut self, format: Option<BarcodeFormat>) -> Self {
        self.barcode_format = format;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    pub fn with_nfc(mut self, nfc: NfcPayload) -> Self {
        self.nfc = Some(nfc);
        self
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn with_field(mut self, section: FieldSection, field: PassField) -> Result<Self> {
        self.add_field(section, field)?;
        Ok(self)
    }

    /// Adds a field to a section.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Validation`] if the key is malformed, the
    /// default value does not satisfy the field's formatting hints, or any
    /// section already declares the key.
    pub fn add_field(&mut self, section: FieldSection, field: PassField) -> Result<()> {
        field.validate()?;
        if let Some((existing, _)) = self.fields().find(|(_, f)| f.key == field.key) {
            return Err(WalletError::Validation(format!(
                "duplicate field id '{}' (already declared in {} section)",
                field.key, existing
            )));
        }
        self.sections.entry(section).or_default().push(field);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fields in render order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldSection, &PassField)> {
        self.sections
            .iter()
            .flat_map(|(section, fields)| fields.iter().map(move |f| (*section, f)))
    }

    /// Fields of one section, in declaration order.
    pub fn section(&self, section: FieldSection) -> &[PassField] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or_default()
    }

    /// Looks up a field by id.
    pub fn field(&self, key: &str) -> Option<&PassField> {
        self.fields().map(|(_, f)| f).find(|f| f.key == key)
    }

    /// Set of all field ids.
    pub fn field_ids(&self) -> HashSet<&str> {
        self.fields().map(|(_, f)| f.key.as_str()).collect()
    }

    /// Re-checks every invariant. Templates read from JSON bypass
    /// [`add_field`](Self::add_field), so loaders call this.
    pub fn validate(&self) -> Result<()> {
        crate::validation::validate_identifier("template id", &self.id)?;
        if self.organization_id.trim().is_empty() {
            return Err(WalletError::Validation(
                "template organization id cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for (_, field) in self.fields() {
            field.validate()?;
            if !seen.insert(field.key.as_str()) {
                return Err(WalletError::Validation(format!(
                    "duplicate field id '{}'",
                    field.key
                )));
            }
        }
        for location in &self.locations {
            location.validate()?;
        }
        Ok(())
    }

    /// Returns a copy with the version bumped, for changing a design that
    /// already has issued passes.
    pub fn new_version(&self) -> Template {
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        next
    }

    /// Resolves every field against pass data.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Validation`] when the data belongs to another
    /// template, names a field the template does not declare, leaves a field
    /// without any value, or supplies a value of the wrong type.
    pub fn resolve<'a>(&'a self, data: &PassData) -> Result<Vec<ResolvedField<'a>>> {
        if data.template_id != self.id {
            return Err(WalletError::Validation(format!(
                "pass data references template '{}' but template is '{}'",
                data.template_id, self.id
            )));
        }

        if let Some(unknown) = data.field_values.keys().find(|k| self.field(k).is_none()) {
            return Err(WalletError::Validation(format!(
                "template '{}' has no field '{}'",
                self.id, unknown
            )));
        }

        self.fields()
            .map(|(section, field)| {
                let value = data
                    .field_values
                    .get(&field.key)
                    .or(field.value.as_ref())
                    .cloned()
                    .ok_or_else(|| {
                        WalletError::Validation(format!(
                            "field '{}' has no value (no default and no override)",
                            field.key
                        ))
                    })?;
                field.check_value(&value)?;
                Ok(ResolvedField {
                    section,
                    field,
                    value,
                })
            })
            .collect()
    }

    /// Barcode message to encode, if the template declares a barcode.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Validation`] if a format is declared and the
    /// message is missing or blank.
    pub fn barcode<'a>(&self, data: &'a PassData) -> Result<Option<(BarcodeFormat, &'a str)>> {
        let Some(format) = self.barcode_format else {
            return Ok(None);
        };
        match data.barcode_message.as_deref() {
            Some(message) if !message.trim().is_empty() => Ok(Some((format, message))),
            _ => Err(WalletError::Validation(format!(
                "template '{}' declares a barcode but the barcode message is empty",
                self.id
            ))),
        }
    }

    /// Parses a template from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let template: Template = serde_json::from_str(json)
            .map_err(|e| WalletError::Validation(format!("malformed template: {}", e)))?;
        template.validate()?;
        Ok(template)
    }

    /// Loads a template from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            WalletError::NotFound(format!("template {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Serializes the template (images inline as base64).
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "template".to_string()
    } else {
        trimmed.to_string()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{DateStyle, FieldValue};

    fn gala() -> Template {
        Template::new("Summer Gala", "org-1", PassKind::EventTicket)
            .with_field(FieldSection::Primary, PassField::new("event_name", "Event"))
            .unwrap()
            .with_field(FieldSection::Secondary, PassField::new("event_date", "Date"))
            .unwrap()
    }

    #[test]
    fn test_new_template_defaults() {
        let template = gala();
        assert_eq!(template.id, "summer-gala");
        assert_eq!(template.version, 1);
        assert_eq!(template.style.logo_text.as_deref(), Some("Summer Gala"));
        assert_eq!(template.style.background_color, "#FFFFFF");
        assert_eq!(template.barcode_format, Some(BarcodeFormat::Qr));
    }

    #[test]
    fn test_duplicate_field_across_sections() {
        let mut template = gala();
        let err = template
            .add_field(FieldSection::Back, PassField::new("event_name", "Again"))
            .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
        assert!(err.to_string().contains("duplicate field id 'event_name'"));
        assert_eq!(template.fields().count(), 2);
    }

    #[test]
    fn test_fields_render_in_section_order() {
        let template = Template::new("Order", "org", PassKind::Generic)
            .with_field(FieldSection::Back, PassField::new("terms", "Terms").with_value("None"))
            .unwrap()
            .with_field(FieldSection::Header, PassField::new("id", "ID").with_value("1"))
            .unwrap();
        let order: Vec<_> = template.fields().map(|(_, f)| f.key.as_str()).collect();
        assert_eq!(order, vec!["id", "terms"]);
    }

    #[test]
    fn test_json_round_trip_revalidates() {
        let template = gala().with_image(ImageRole::Logo, Image::new(vec![1, 2, 3]).with_retina(vec![4]));
        let json = template.to_json_pretty().unwrap();
        let parsed = Template::from_json(&json).unwrap();
        assert_eq!(parsed, template);

        let duplicated = json.replace("\"event_date\"", "\"event_name\"");
        assert!(Template::from_json(&duplicated).is_err());
    }

    #[test]
    fn test_resolve_uses_defaults_and_overrides() {
        let template = Template::new("Cafe", "org", PassKind::StoreCard)
            .with_field(FieldSection::Primary, PassField::new("balance", "Balance").with_value("0"))
            .unwrap()
            .with_field(FieldSection::Back, PassField::new("terms", "Terms"))
            .unwrap();

        let data = PassData::new(&template.id, "c1").with_field("terms", "No refunds");
        let resolved = template.resolve(&data).unwrap();
        assert_eq!(resolved[0].value, FieldValue::from("0"));
        assert_eq!(resolved[1].value, FieldValue::from("No refunds"));

        let missing = PassData::new(&template.id, "c1");
        let err = template.resolve(&missing).unwrap_err();
        assert!(err.to_string().contains("field 'terms' has no value"));
    }

    #[test]
    fn test_resolve_rejects_unknown_and_mismatched() {
        let template = Template::new("Show", "org", PassKind::EventTicket)
            .with_field(
                FieldSection::Primary,
                PassField::new("starts", "Starts").with_date_style(DateStyle::Short, DateStyle::Short),
            )
            .unwrap();

        let wrong_type = PassData::new(&template.id, "c1").with_field("starts", "tonight");
        assert!(template.resolve(&wrong_type).is_err());

        let unknown = PassData::new(&template.id, "c1")
            .with_field("starts", Utc::now())
            .with_field("seat", "A1");
        assert!(template.resolve(&unknown).unwrap_err().to_string().contains("no field 'seat'"));
    }

    #[test]
    fn test_barcode_requires_message() {
        let template = gala();
        let data = PassData::new(&template.id, "c1");
        assert!(template.barcode(&data).is_err());

        let data = data.with_barcode("T1", None);
        assert_eq!(template.barcode(&data).unwrap(), Some((BarcodeFormat::Qr, "T1")));

        let no_barcode = template.with_barcode_format(None);
        assert_eq!(no_barcode.barcode(&PassData::new("summer-gala", "c1")).unwrap(), None);
    }

    #[test]
    fn test_new_version() {
        let template = gala();
        let next = template.new_version();
        assert_eq!(next.version, 2);
        assert_eq!(next.id, template.id);
        assert_eq!(template.version, 1);
    }

    #[tokio::test]
    async fn test_image_from_file_finds_retina() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("logo.png"), b"1x").await.unwrap();
        tokio::fs::write(dir.path().join("logo@2x.png"), b"2x").await.unwrap();
        tokio::fs::write(dir.path().join("icon.png"), b"icon").await.unwrap();

        let logo = Image::from_file(dir.path().join("logo.png")).await.unwrap();
        assert_eq!(logo.data, b"1x");
        assert_eq!(logo.retina.as_deref(), Some(&b"2x"[..]));

        let icon = Image::from_file(dir.path().join("icon.png")).await.unwrap();
        assert!(icon.retina.is_none());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Summer Gala 2025!"), "summer-gala-2025");
        assert_eq!(slug("***"), "template");
    }
}
