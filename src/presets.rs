//! Ready-made templates for common pass kinds.
//!
//! Each preset declares the usual field set for its kind. Fields that differ
//! for every pass (dates, names, seats) have no default, so issuing a pass
//! without them fails validation instead of rendering a blank.

use crate::field::{FieldSection, PassField};
use crate::template::{PassKind, Template};
use crate::Result;

fn build(template: Template, fields: &[(FieldSection, &str, &str, Option<&str>)]) -> Result<Template> {
    let mut template = template;
    for (section, key, label, default) in fields {
        let mut field = PassField::new(*key, *label);
        if let Some(value) = default {
            field = field.with_value(*value);
        }
        template.add_field(*section, field)?;
    }
    Ok(template)
}

/// Event ticket: event name, date, location, ticket type, details.
pub fn event_ticket(name: &str, organization_id: &str) -> Result<Template> {
    use FieldSection::*;
    build(
        Template::new(name, organization_id, PassKind::EventTicket),
        &[
            (Header, "event_name", "Event", Some(name)),
            (Primary, "event_date", "Date", None),
            (Secondary, "event_location", "Location", Some("")),
            (Auxiliary, "ticket_type", "Ticket Type", Some("General Admission")),
            (Back, "event_details", "Details", Some("")),
        ],
    )
}

/// Coupon: offer, expiration, promo code, terms.
pub fn coupon(name: &str, organization_id: &str) -> Result<Template> {
    use FieldSection::*;
    build(
        Template::new(name, organization_id, PassKind::Coupon),
        &[
            (Primary, "offer", "Offer", Some(name)),
            (Secondary, "expiration", "Expires", Some("")),
            (Auxiliary, "promo_code", "Promo Code", None),
            (Back, "terms", "Terms & Conditions", Some("")),
        ],
    )
}

/// Loyalty card: member, points balance, member since, level, details.
pub fn loyalty(name: &str, organization_id: &str) -> Result<Template> {
    use FieldSection::*;
    build(
        Template::new(name, organization_id, PassKind::Loyalty),
        &[
            (Header, "member_name", "Member", None),
            (Primary, "points", "Points", Some("0")),
            (Secondary, "member_since", "Member Since", Some("")),
            (Auxiliary, "membership_level", "Level", Some("Standard")),
            (Back, "program_details", "Program Details", Some("")),
        ],
    )
}

/// Boarding pass: passenger, flight, route, boarding time, seat.
pub fn boarding_pass(name: &str, organization_id: &str) -> Result<Template> {
    use FieldSection::*;
    build(
        Template::new(name, organization_id, PassKind::BoardingPass),
        &[
            (Header, "passenger_name", "Passenger", None),
            (Primary, "flight_number", "Flight", None),
            (Primary, "date", "Date", None),
            (Secondary, "from", "From", None),
            (Secondary, "to", "To", None),
            (Auxiliary, "boarding_time", "Boarding", None),
            (Auxiliary, "seat", "Seat", None),
            (Back, "flight_details", "Flight Details", Some("")),
        ],
    )
}

/// Membership card: member, member number, level, validity, benefits.
pub fn membership(name: &str, organization_id: &str) -> Result<Template> {
    use FieldSection::*;
    build(
        Template::new(name, organization_id, PassKind::Membership),
        &[
            (Header, "member_name", "Member", None),
            (Primary, "member_id", "Member No.", None),
            (Secondary, "membership_level", "Level", Some("Standard")),
            (Auxiliary, "valid_until", "Valid Until", Some("")),
            (Back, "benefits", "Benefits", Some("")),
        ],
    )
}

/// Looks up a preset by pass kind; kinds without a preset get an empty
/// template.
pub fn for_kind(kind: PassKind, name: &str, organization_id: &str) -> Result<Template> {
    match kind {
        PassKind::EventTicket => event_ticket(name, organization_id),
        PassKind::Coupon => coupon(name, organization_id),
        PassKind::Loyalty => loyalty(name, organization_id),
        PassKind::BoardingPass => boarding_pass(name, organization_id),
        PassKind::Membership => membership(name, organization_id),
        PassKind::Generic | PassKind::StoreCard => Ok(Template::new(name, organization_id, kind)),
    }
}
