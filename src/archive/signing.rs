//! Signing credentials and detached CMS signatures.

use crate::{Result, WalletError};
use cms::builder::{create_signing_time_attribute, SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use der::{DecodePem, Encode};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

/// File name of the detached signature inside the archive.
pub const SIGNATURE_NAME: &str = "signature";

fn signing_error(context: &str, err: impl fmt::Display) -> WalletError {
    WalletError::Signing(format!("{}: {}", context, err))
}

/// Issuer certificate, its private key and the trust-chain certificate
/// that issued it.
///
/// Loaded once and shared read-only (usually behind an `Arc`) across
/// concurrent archive builds.
pub struct SigningCredentials {
    certificate: Certificate,
    trust_chain: Certificate,
    signing_key: SigningKey<Sha256>,
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.certificate.tbs_certificate.subject.to_string())
            .field("trust_chain", &self.trust_chain.tbs_certificate.subject.to_string())
            .finish_non_exhaustive()
    }
}

impl SigningCredentials {
    /// Loads credentials from PEM data.
    ///
    /// The private key may be PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] if any input cannot be parsed, the key
    /// does not belong to the certificate, or the trust-chain certificate is
    /// not the certificate's issuer.
    pub fn from_pem(certificate: &[u8], private_key: &[u8], trust_chain: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_pem(certificate)
            .map_err(|e| signing_error("cannot parse certificate", e))?;
        let trust_chain = Certificate::from_pem(trust_chain)
            .map_err(|e| signing_error("cannot parse trust chain certificate", e))?;

        let key_pem = std::str::from_utf8(private_key)
            .map_err(|e| signing_error("private key is not PEM text", e))?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(key_pem))
            .map_err(|e| signing_error("cannot parse private key", e))?;

        let certificate_key = public_key(&certificate)?;
        if private_key.to_public_key() != certificate_key {
            return Err(WalletError::Signing(
                "private key does not match the certificate".to_string(),
            ));
        }

        if certificate.tbs_certificate.issuer != trust_chain.tbs_certificate.subject {
            return Err(WalletError::Signing(format!(
                "certificate issued by '{}', not by trust chain certificate '{}'",
                certificate.tbs_certificate.issuer, trust_chain.tbs_certificate.subject
            )));
        }

        Ok(Self {
            certificate,
            trust_chain,
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Loads credentials from PEM files.
    pub fn from_files(
        certificate_path: impl AsRef<Path>,
        private_key_path: impl AsRef<Path>,
        trust_chain_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|e| signing_error(&format!("cannot read {}", path.display()), e))
        };
        Self::from_pem(
            &read(certificate_path.as_ref())?,
            &read(private_key_path.as_ref())?,
            &read(trust_chain_path.as_ref())?,
        )
    }

    /// Signing certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Trust-chain certificate.
    pub fn trust_chain(&self) -> &Certificate {
        &self.trust_chain
    }

    /// Produces a DER-encoded detached CMS `SignedData` over `content`.
    ///
    /// RSA PKCS#1 v1.5 with SHA-256; signed attributes carry the content
    /// type, message digest and signing time. Both certificates are
    /// embedded.
    pub fn sign_detached(&self, content: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(content);
        let econtent = EncapsulatedContentInfo {
            econtent_type: const_oid::db::rfc5911::ID_DATA,
            econtent: None,
        };
        let digest_algorithm = AlgorithmIdentifierOwned {
            oid: const_oid::db::rfc5912::ID_SHA_256,
            parameters: None,
        };
        let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: self.certificate.tbs_certificate.issuer.clone(),
            serial_number: self.certificate.tbs_certificate.serial_number.clone(),
        });

        let mut signer = SignerInfoBuilder::new(
            &self.signing_key,
            sid,
            digest_algorithm.clone(),
            &econtent,
            Some(digest.as_slice()),
        )
        .map_err(|e| signing_error("cannot prepare signer", e))?;
        let signing_time =
            create_signing_time_attribute().map_err(|e| signing_error("cannot stamp signing time", e))?;
        signer
            .add_signed_attribute(signing_time)
            .map_err(|e| signing_error("cannot stamp signing time", e))?;

        let content_info = SignedDataBuilder::new(&econtent)
            .add_digest_algorithm(digest_algorithm)
            .map_err(|e| signing_error("cannot build signed data", e))?
            .add_certificate(CertificateChoices::Certificate(self.certificate.clone()))
            .map_err(|e| signing_error("cannot embed certificate", e))?
            .add_certificate(CertificateChoices::Certificate(self.trust_chain.clone()))
            .map_err(|e| signing_error("cannot embed trust chain", e))?
            .add_signer_info::<SigningKey<Sha256>, Signature>(signer)
            .map_err(|e| signing_error("cannot sign", e))?
            .build()
            .map_err(|e| signing_error("cannot build signed data", e))?;

        content_info
            .to_der()
            .map_err(|e| signing_error("cannot encode signature", e))
    }
}

/// RSA public key of a certificate.
pub(crate) fn public_key(certificate: &Certificate) -> Result<RsaPublicKey> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| signing_error("cannot encode certificate key", e))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| signing_error("certificate key is not RSA", e))
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const CERTIFICATE: &[u8] = include_bytes!("../../tests/fixtures/issuer.pem");
    pub const PRIVATE_KEY: &[u8] = include_bytes!("../../tests/fixtures/issuer.key");
    pub const TRUST_CHAIN: &[u8] = include_bytes!("../../tests/fixtures/trust_chain.pem");
    pub const UNRELATED_KEY: &[u8] = include_bytes!("../../tests/fixtures/unrelated.key");

    pub fn credentials() -> super::SigningCredentials {
        super::SigningCredentials::from_pem(CERTIFICATE, PRIVATE_KEY, TRUST_CHAIN).unwrap()
    }
}
