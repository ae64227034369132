//! Rendering of the declarative `pass.json` document.

use super::ArchiveSettings;
use crate::field::{FieldSection, FieldValue, ResolvedField};
use crate::template::{BarcodeFormat, PassKind, Template};
use crate::{PassData, Result, WalletError};
use serde_json::{json, Map, Value};

/// File name of the pass document inside the archive.
pub const PASS_JSON_NAME: &str = "pass.json";

fn style_key(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Generic | PassKind::Membership => "generic",
        PassKind::EventTicket => "eventTicket",
        PassKind::Coupon => "coupon",
        PassKind::Loyalty | PassKind::StoreCard => "storeCard",
        PassKind::BoardingPass => "boardingPass",
    }
}

fn barcode_format(format: BarcodeFormat) -> &'static str {
    match format {
        BarcodeFormat::Qr => "PKBarcodeFormatQR",
        BarcodeFormat::Pdf417 => "PKBarcodeFormatPDF417",
        BarcodeFormat::Aztec => "PKBarcodeFormatAztec",
        BarcodeFormat::Code128 => "PKBarcodeFormatCode128",
    }
}

/// Normalizes `#RRGGBB` or `rgb(r, g, b)` to the `rgb(r, g, b)` form wallet
/// clients expect.
pub fn css_rgb(color: &str) -> Result<String> {
    let invalid = || WalletError::Validation(format!("invalid color '{}'", color));
    let color = color.trim();

    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() != 6 {
            return Err(invalid());
        }
        let bytes = hex::decode(hex).map_err(|_| invalid())?;
        return Ok(format!("rgb({}, {}, {})", bytes[0], bytes[1], bytes[2]));
    }

    let inner = color
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;
    let parts = inner
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    if parts.len() != 3 {
        return Err(invalid());
    }
    Ok(format!("rgb({}, {}, {})", parts[0], parts[1], parts[2]))
}

fn field_json(resolved: &ResolvedField<'_>) -> Value {
    let field = resolved.field;
    let mut out = Map::new();
    out.insert("key".into(), json!(field.key));
    if let Some(label) = &field.label {
        out.insert("label".into(), json!(label));
    }
    out.insert("value".into(), resolved.value.to_json());
    if let Some(message) = &field.change_message {
        out.insert("changeMessage".into(), json!(message));
    }
    if let Some(alignment) = field.text_alignment {
        out.insert("textAlignment".into(), json!(alignment.pass_json_value()));
    }
    if let Some(style) = field.date_style {
        out.insert("dateStyle".into(), json!(style.pass_json_value()));
    }
    if let Some(style) = field.time_style {
        out.insert("timeStyle".into(), json!(style.pass_json_value()));
    }
    if field.is_relative {
        out.insert("isRelative".into(), json!(true));
    }
    if let Some(code) = &field.currency_code {
        out.insert("currencyCode".into(), json!(code));
    }
    if let Some(style) = field.number_style {
        out.insert("numberStyle".into(), json!(style.pass_json_value()));
    }
    Value::Object(out)
}

fn date(value: &chrono::DateTime<chrono::Utc>) -> Value {
    FieldValue::Date(*value).to_json()
}

/// Renders `pass.json` as compact JSON with a fixed key order.
///
/// # Errors
///
/// Returns [`WalletError::Validation`] for unresolved or mistyped fields, a
/// missing barcode message, or a malformed color.
pub fn render(
    settings: &ArchiveSettings,
    template: &Template,
    data: &PassData,
    authentication_token: Option<&str>,
) -> Result<Vec<u8>> {
    let resolved = template.resolve(data)?;
    let barcode = template.barcode(data)?;

    let mut doc = Map::new();
    doc.insert("formatVersion".into(), json!(1));
    doc.insert("passTypeIdentifier".into(), json!(settings.pass_type_identifier));
    doc.insert("serialNumber".into(), json!(data.serial_number));
    doc.insert("teamIdentifier".into(), json!(settings.team_identifier));
    doc.insert(
        "organizationName".into(),
        json!(settings
            .organization_name
            .as_deref()
            .unwrap_or(&template.organization_id)),
    );
    let description = if template.description.is_empty() {
        format!("{} Pass", template.name)
    } else {
        template.description.clone()
    };
    doc.insert("description".into(), json!(description));

    if let Some(text) = &template.style.logo_text {
        doc.insert("logoText".into(), json!(text));
    }
    doc.insert("backgroundColor".into(), json!(css_rgb(&template.style.background_color)?));
    doc.insert("foregroundColor".into(), json!(css_rgb(&template.style.foreground_color)?));
    doc.insert("labelColor".into(), json!(css_rgb(&template.style.label_color)?));

    if let Some(expires) = &data.expiration_date {
        doc.insert("expirationDate".into(), date(expires));
    }
    if let Some(relevant) = &data.relevant_date {
        doc.insert("relevantDate".into(), date(relevant));
    }
    if data.voided {
        doc.insert("voided".into(), json!(true));
    }

    if let Some((format, message)) = barcode {
        let mut code = Map::new();
        code.insert("format".into(), json!(barcode_format(format)));
        code.insert("message".into(), json!(message));
        code.insert("messageEncoding".into(), json!("iso-8859-1"));
        if let Some(alt) = &data.barcode_alt_text {
            code.insert("altText".into(), json!(alt));
        }
        let code = Value::Object(code);
        doc.insert("barcodes".into(), json!([code.clone()]));
        // Legacy single-barcode key for older clients; it cannot carry Code128.
        if format != BarcodeFormat::Code128 {
            doc.insert("barcode".into(), code);
        }
    }

    if let (Some(url), Some(token)) = (&settings.web_service_url, authentication_token) {
        doc.insert("webServiceURL".into(), json!(url));
        doc.insert("authenticationToken".into(), json!(token));
    }

    if !template.locations.is_empty() {
        let locations: Vec<Value> = template
            .locations
            .iter()
            .map(|loc| {
                let mut out = Map::new();
                out.insert("latitude".into(), json!(loc.latitude));
                out.insert("longitude".into(), json!(loc.longitude));
                if let Some(altitude) = loc.altitude {
                    out.insert("altitude".into(), json!(altitude));
                }
                if let Some(text) = &loc.relevant_text {
                    out.insert("relevantText".into(), json!(text));
                }
                Value::Object(out)
            })
            .collect();
        doc.insert("locations".into(), Value::Array(locations));
        let radius = template
            .locations
            .iter()
            .map(|l| l.radius)
            .fold(0.0_f64, f64::max);
        doc.insert("maxDistance".into(), json!(radius));
    }

    if let Some(nfc) = &template.nfc {
        let mut out = Map::new();
        out.insert("message".into(), json!(nfc.message));
        if let Some(key) = &nfc.encryption_public_key {
            out.insert("encryptionPublicKey".into(), json!(key));
        }
        if nfc.requires_authentication {
            out.insert("requiresAuthentication".into(), json!(true));
        }
        doc.insert("nfc".into(), Value::Object(out));
    }

    let mut structure = Map::new();
    for section in FieldSection::ALL {
        let fields: Vec<Value> = resolved
            .iter()
            .filter(|r| r.section == section)
            .map(field_json)
            .collect();
        if !fields.is_empty() {
            structure.insert(section.pass_json_key().into(), Value::Array(fields));
        }
    }
    if template.kind == PassKind::BoardingPass {
        structure.insert("transitType".into(), json!("PKTransitTypeAir"));
    }
    doc.insert(style_key(template.kind).into(), Value::Object(structure));

    Ok(serde_json::to_vec(&Value::Object(doc))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::PassField;
    use crate::template::{Location, NfcPayload};

    fn settings() -> ArchiveSettings {
        ArchiveSettings::new("pass.com.example.test", "ABCDE12345")
    }

    fn template() -> Template {
        Template::new("Gala", "Example Org", PassKind::EventTicket)
            .with_field(FieldSection::Primary, PassField::new("event_name", "Event"))
            .unwrap()
            .with_field(FieldSection::Back, PassField::new("terms", "Terms").with_value("None"))
            .unwrap()
    }

    fn render_value(template: &Template, data: &PassData, token: Option<&str>) -> Value {
        let bytes = render(&settings(), template, data, token).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_css_rgb() {
        assert_eq!(css_rgb("#FF8000").unwrap(), "rgb(255, 128, 0)");
        assert_eq!(css_rgb("rgb(1,2, 3)").unwrap(), "rgb(1, 2, 3)");
        assert!(css_rgb("#FFF").is_err());
        assert!(css_rgb("red").is_err());
        assert!(css_rgb("rgb(256, 0, 0)").is_err());
    }

    #[test]
    fn test_document_shape() {
        let template = template();
        let data = PassData::new(&template.id, "c1")
            .with_serial_number("S1")
            .with_field("event_name", "Gala")
            .with_barcode("T1", Some("Ticket 1"));

        let doc = render_value(&template, &data, None);
        assert_eq!(doc["formatVersion"], 1);
        assert_eq!(doc["serialNumber"], "S1");
        assert_eq!(doc["organizationName"], "Example Org");
        assert_eq!(doc["backgroundColor"], "rgb(255, 255, 255)");
        assert_eq!(doc["barcodes"][0]["format"], "PKBarcodeFormatQR");
        assert_eq!(doc["barcode"]["altText"], "Ticket 1");
        assert_eq!(doc["eventTicket"]["primaryFields"][0]["value"], "Gala");
        assert_eq!(doc["eventTicket"]["backFields"][0]["value"], "None");
        assert!(doc.get("webServiceURL").is_none());
        assert!(doc.get("voided").is_none());
    }

    #[test]
    fn test_web_service_requires_token() {
        let template = template();
        let data = PassData::new(&template.id, "c1")
            .with_field("event_name", "Gala")
            .with_barcode("T1", None);
        let settings = settings().with_web_service_url("https://passes.example.com");

        let bytes = render(&settings, &template, &data, Some("0123456789abcdef0123")).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["webServiceURL"], "https://passes.example.com");
        assert_eq!(doc["authenticationToken"], "0123456789abcdef0123");
    }

    #[test]
    fn test_locations_nfc_and_boarding() {
        let template = Template::new("Flight", "Air", PassKind::BoardingPass)
            .with_field(FieldSection::Primary, PassField::new("gate", "Gate").with_value("B2"))
            .unwrap()
            .with_barcode_format(None)
            .with_location(Location::new(52.37, 4.89).with_relevant_text("Gate B2").with_radius(250.0))
            .with_nfc(NfcPayload {
                message: "member-1".to_string(),
                encryption_public_key: None,
                requires_authentication: true,
            });
        let data = PassData::new(&template.id, "c1");

        let doc = render_value(&template, &data, None);
        assert_eq!(doc["boardingPass"]["transitType"], "PKTransitTypeAir");
        assert_eq!(doc["locations"][0]["relevantText"], "Gate B2");
        assert_eq!(doc["maxDistance"], 250.0);
        assert_eq!(doc["nfc"]["requiresAuthentication"], true);
        assert!(doc.get("barcodes").is_none());
    }

    #[test]
    fn test_canonical_bytes() {
        let template = template();
        let data = PassData::new(&template.id, "c1")
            .with_serial_number("S1")
            .with_field("event_name", "Gala")
            .with_barcode("T1", None);

        let a = render(&settings(), &template, &data, None).unwrap();
        let b = render(&settings(), &template, &data, None).unwrap();
        assert_eq!(a, b);
        assert!(!a.contains(&b'\n'));
    }
}
