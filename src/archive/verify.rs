//! Structural and cryptographic verification of pass archives.

use super::signing::public_key;
use super::{PassPackage, PASS_JSON_NAME};
use crate::{Result, WalletError};
use chrono::{DateTime, Utc};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use const_oid::db::{rfc5911, rfc5912};
use der::asn1::OctetString;
use der::{Any, Decode, DecodeOwned, Encode};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use x509_cert::time::Time;
use x509_cert::Certificate;

/// Who signed an archive, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSummary {
    /// Subject of the signing certificate
    pub subject: String,
    /// Subject of the certificate that issued it
    pub issuer: String,
    pub signing_time: Option<DateTime<Utc>>,
}

fn invalid(message: impl Into<String>) -> WalletError {
    WalletError::Signing(message.into())
}

fn decode_any<T: DecodeOwned>(any: &Any) -> der::Result<T> {
    T::from_der(&any.to_der()?)
}

/// Verifies a finished `.pkpass` archive.
///
/// Checks that:
///
/// - `pass.json`, `manifest.json` and `signature` are present
/// - the manifest lists exactly the content entries and every digest matches
/// - the signature is a valid detached CMS signature over the manifest bytes
/// - the signing certificate was issued by the embedded trust-chain
///   certificate
///
/// # Errors
///
/// Structural problems (missing entries, digest mismatches) are
/// [`WalletError::Validation`]; signature problems are
/// [`WalletError::Signing`].
pub fn verify_archive(bytes: &[u8]) -> Result<SignerSummary> {
    let package = PassPackage::from_zip(bytes)?;

    if package.entry(PASS_JSON_NAME).is_none() {
        return Err(WalletError::Validation(format!(
            "archive has no {}",
            PASS_JSON_NAME
        )));
    }

    let listed: BTreeSet<&str> = package.manifest().entries().keys().map(String::as_str).collect();
    let present: BTreeSet<&str> = package.entries().iter().map(|e| e.name.as_str()).collect();
    if let Some(name) = present.difference(&listed).next() {
        return Err(WalletError::Validation(format!(
            "archive entry '{}' is not covered by the manifest",
            name
        )));
    }
    if let Some(name) = listed.difference(&present).next() {
        return Err(WalletError::Validation(format!(
            "manifest lists '{}' but the archive does not contain it",
            name
        )));
    }
    for entry in package.entries() {
        package.manifest().verify_entry(&entry.name, &entry.bytes)?;
    }

    verify_signature(package.manifest_bytes(), package.signature())
}

/// Verifies a detached CMS signature over `content`.
pub fn verify_signature(content: &[u8], signature: &[u8]) -> Result<SignerSummary> {
    let content_info = ContentInfo::from_der(signature)
        .map_err(|e| invalid(format!("signature is not CMS: {}", e)))?;
    if content_info.content_type != rfc5911::ID_SIGNED_DATA {
        return Err(invalid(format!(
            "signature content type is {}, expected signed data",
            content_info.content_type
        )));
    }
    let signed_data: SignedData = decode_any(&content_info.content)
        .map_err(|e| invalid(format!("malformed signed data: {}", e)))?;
    if signed_data.encap_content_info.econtent.is_some() {
        return Err(invalid("signature is not detached"));
    }

    let certificates: Vec<&Certificate> = signed_data
        .certificates
        .as_ref()
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(cert) => Some(cert),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let signer = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| invalid("signature has no signer"))?;
    let signer_cert = find_signer_certificate(signer, &certificates)?;

    let signed_attrs = signer
        .signed_attrs
        .as_ref()
        .ok_or_else(|| invalid("signature has no signed attributes"))?;

    let digest_attr = signed_attrs
        .iter()
        .find(|attr| attr.oid == rfc5911::ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| invalid("signature has no message digest"))?;
    let digest: OctetString = decode_any(digest_attr)
        .map_err(|e| invalid(format!("malformed message digest: {}", e)))?;
    if digest.as_bytes() != Sha256::digest(content).as_slice() {
        return Err(invalid("manifest does not match the signed digest"));
    }

    let signing_time = signed_attrs
        .iter()
        .find(|attr| attr.oid == rfc5911::ID_SIGNING_TIME)
        .and_then(|attr| attr.values.iter().next())
        .and_then(|value| decode_any::<Time>(value).ok())
        .and_then(|time| {
            DateTime::<Utc>::from_timestamp(time.to_unix_duration().as_secs() as i64, 0)
        });

    let attrs_der = signed_attrs
        .to_der()
        .map_err(|e| invalid(format!("cannot encode signed attributes: {}", e)))?;
    verify_rsa_sha256(signer_cert, &attrs_der, signer.signature.as_bytes())
        .map_err(|_| invalid("signature does not verify against the signing certificate"))?;

    let issuer_name = &signer_cert.tbs_certificate.issuer;
    let issuer = certificates
        .iter()
        .find(|cert| &cert.tbs_certificate.subject == issuer_name)
        .ok_or_else(|| invalid(format!("trust chain certificate {} is not embedded", issuer_name)))?;
    verify_certificate(signer_cert, issuer)?;

    Ok(SignerSummary {
        subject: signer_cert.tbs_certificate.subject.to_string(),
        issuer: issuer.tbs_certificate.subject.to_string(),
        signing_time,
    })
}

fn find_signer_certificate<'a>(
    signer: &SignerInfo,
    certificates: &[&'a Certificate],
) -> Result<&'a Certificate> {
    let SignerIdentifier::IssuerAndSerialNumber(id) = &signer.sid else {
        return Err(invalid("signer is not identified by issuer and serial number"));
    };
    certificates
        .iter()
        .copied()
        .find(|cert| {
            cert.tbs_certificate.issuer == id.issuer
                && cert.tbs_certificate.serial_number == id.serial_number
        })
        .ok_or_else(|| invalid("signing certificate is not embedded"))
}

fn verify_certificate(certificate: &Certificate, issuer: &Certificate) -> Result<()> {
    if certificate.signature_algorithm.oid != rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
        return Err(invalid(format!(
            "unsupported certificate signature algorithm {}",
            certificate.signature_algorithm.oid
        )));
    }
    let tbs = certificate
        .tbs_certificate
        .to_der()
        .map_err(|e| invalid(format!("cannot encode certificate: {}", e)))?;
    let signature = certificate
        .signature
        .as_bytes()
        .ok_or_else(|| invalid("certificate signature has unused bits"))?;
    verify_rsa_sha256(issuer, &tbs, signature).map_err(|_| {
        invalid(format!(
            "signing certificate was not issued by {}",
            issuer.tbs_certificate.subject
        ))
    })
}

fn verify_rsa_sha256(signer: &Certificate, message: &[u8], signature: &[u8]) -> Result<()> {
    let key = VerifyingKey::<Sha256>::new(public_key(signer)?);
    let signature =
        Signature::try_from(signature).map_err(|e| invalid(format!("malformed signature: {}", e)))?;
    key.verify(message, &signature)
        .map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{fixtures, ArchiveEntry};
    use super::*;

    fn rezip(mut package: PassPackage, edit: impl FnOnce(&mut Vec<ArchiveEntry>)) -> Vec<u8> {
        edit(&mut package.entries);
        package.to_zip().unwrap()
    }

    #[test]
    fn test_verifies_built_archive() {
        let template = event_template();
        let bytes = builder().build(&template, &event_data(&template), None).unwrap();

        let summary = verify_archive(&bytes).unwrap();
        assert!(summary.issuer.contains("Walletmux Test Trust Chain"));
        assert!(summary.signing_time.is_some());
    }

    #[test]
    fn test_tampered_entry_is_rejected() {
        let template = event_template();
        let package = builder().package(&template, &event_data(&template), None).unwrap();
        let bytes = rezip(package, |entries| entries[0].bytes.push(b'!'));

        let err = verify_archive(&bytes).unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[test]
    fn test_unlisted_entry_is_rejected() {
        let template = event_template();
        let package = builder().package(&template, &event_data(&template), None).unwrap();
        let bytes = rezip(package, |entries| {
            entries.push(ArchiveEntry {
                name: "strip.png".to_string(),
                bytes: b"strip".to_vec(),
            })
        });

        let err = verify_archive(&bytes).unwrap_err();
        assert!(err.to_string().contains("strip.png"));
    }

    #[test]
    fn test_signature_over_other_content_is_rejected() {
        let signature = fixtures::credentials().sign_detached(b"one manifest").unwrap();
        assert!(verify_signature(b"one manifest", &signature).is_ok());

        let err = verify_signature(b"another manifest", &signature).unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
    }

    #[test]
    fn test_garbage_signature() {
        let err = verify_signature(b"content", b"not der").unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
    }
}
