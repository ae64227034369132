//! Archive determinism and verification properties.

#![cfg(feature = "apple")]

use proptest::prelude::*;
use std::sync::Arc;
use walletmux::archive::{verify_archive, ArchiveBuilder, ArchiveSettings, PassPackage, SigningCredentials};
use walletmux::{FieldSection, Image, ImageRole, PassData, PassField, PassKind, Template};

fn builder() -> ArchiveBuilder {
    let credentials = SigningCredentials::from_pem(
        include_bytes!("fixtures/issuer.pem"),
        include_bytes!("fixtures/issuer.key"),
        include_bytes!("fixtures/trust_chain.pem"),
    )
    .unwrap();
    ArchiveBuilder::new(
        ArchiveSettings::new("pass.com.example.coupons", "ABCDE12345"),
        Arc::new(credentials),
    )
}

fn template(fields: &[(String, String)]) -> Template {
    let mut template = Template::new("Weekly Offer", "Example Org", PassKind::Coupon)
        .with_image(ImageRole::Logo, Image::new(b"logo".to_vec()))
        .with_image(ImageRole::Icon, Image::new(b"icon".to_vec()));
    for (key, value) in fields {
        template
            .add_field(FieldSection::Auxiliary, PassField::new(key, "Label").with_value(value.as_str()))
            .unwrap();
    }
    template
}

#[test]
fn test_repeated_builds_share_manifest_and_verify() {
    let builder = builder();
    let template = template(&[("offer".to_string(), "20% off".to_string())]);
    let data = PassData::new(&template.id, "c1")
        .with_serial_number("C1")
        .with_barcode("C1", None);

    let first = builder.build(&template, &data, None).unwrap();
    let second = builder.build(&template, &data, None).unwrap();

    let first = PassPackage::from_zip(&first).unwrap();
    let second = PassPackage::from_zip(&second).unwrap();
    assert_eq!(first.manifest_bytes(), second.manifest_bytes());
    assert_eq!(first.entries(), second.entries());

    for bytes in [first.to_zip().unwrap(), second.to_zip().unwrap()] {
        verify_archive(&bytes).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn manifest_covers_every_entry(
        values in proptest::collection::btree_map("[a-z][a-z0-9_]{0,11}", "[ -~]{0,40}", 0..6),
        serial in "[A-Z0-9]{1,12}",
    ) {
        let fields: Vec<(String, String)> = values.into_iter().collect();
        let template = template(&fields);
        let data = PassData::new(&template.id, "c1")
            .with_serial_number(serial.clone())
            .with_barcode(serial, None);

        let builder = builder();
        let entries = builder.content(&template, &data, None).unwrap();
        let manifest = builder.manifest(&template, &data, None).unwrap();
        let again = builder.manifest(&template, &data, None).unwrap();

        prop_assert_eq!(&manifest, &again);
        prop_assert_eq!(manifest.entries().len(), entries.len());
        for entry in &entries {
            prop_assert!(manifest.verify_entry(&entry.name, &entry.bytes).is_ok());
        }
    }
}
