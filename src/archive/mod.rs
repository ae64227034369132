//! Signed pass archive builder.
//!
//! Builds the `.pkpass` bundle for the signed-archive provider:
//!
//! 1. render `pass.json` and collect image entries
//! 2. digest every entry into `manifest.json`
//! 3. sign the manifest (detached CMS, issuer and trust-chain certificates
//!    embedded)
//! 4. zip everything with stored entries, fixed timestamps and sorted
//!    entry order
//!
//! Repeated builds from identical input produce identical content entries
//! and manifests; only the signature differs (it carries a signing time).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use walletmux::archive::{verify_archive, ArchiveBuilder, ArchiveSettings, SigningCredentials};
//! use walletmux::{presets, Image, ImageRole, PassData};
//!
//! # fn main() -> walletmux::Result<()> {
//! let credentials = SigningCredentials::from_files("pass.pem", "pass.key", "wwdr.pem")?;
//! let builder = ArchiveBuilder::new(
//!     ArchiveSettings::new("pass.com.example.events", "ABCDE12345"),
//!     Arc::new(credentials),
//! );
//!
//! let template = presets::event_ticket("Summer Gala", "Example Org")?
//!     .with_image(ImageRole::Logo, Image::new(std::fs::read("logo.png")?))
//!     .with_image(ImageRole::Icon, Image::new(std::fs::read("icon.png")?));
//! let data = PassData::new(&template.id, "c1")
//!     .with_field("event_date", "2025-06-01")
//!     .with_barcode("T1", None);
//!
//! let bytes = builder.build(&template, &data, None)?;
//! verify_archive(&bytes)?;
//! # Ok(())
//! # }
//! ```

mod document;
mod manifest;
mod signing;
mod verify;

pub use document::{css_rgb, PASS_JSON_NAME};
pub use manifest::{DigestAlgorithm, Manifest, MANIFEST_NAME};
pub use signing::{SigningCredentials, SIGNATURE_NAME};
pub use verify::{verify_archive, verify_signature, SignerSummary};

#[cfg(test)]
pub(crate) use signing::fixtures;

use crate::template::{ImageRole, Template};
use crate::{PassData, Result, WalletError};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Identity written into every pass the builder produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    /// Pass type identifier the signing certificate was issued for
    pub pass_type_identifier: String,
    /// Developer team identifier
    pub team_identifier: String,
    /// Organization name shown on the lock screen (default: the template's
    /// organization id)
    pub organization_name: Option<String>,
    /// Base URL of the pass update web service
    pub web_service_url: Option<String>,
    /// Manifest digest algorithm
    pub digest: DigestAlgorithm,
}

impl ArchiveSettings {
    pub fn new(pass_type_identifier: impl Into<String>, team_identifier: impl Into<String>) -> Self {
        Self {
            pass_type_identifier: pass_type_identifier.into(),
            team_identifier: team_identifier.into(),
            organization_name: None,
            web_service_url: None,
            digest: DigestAlgorithm::default(),
        }
    }

    pub fn with_organization_name(mut self, name: impl Into<String>) -> Self {
        self.organization_name = Some(name.into());
        self
    }

    pub fn with_web_service_url(mut self, url: impl Into<String>) -> Self {
        self.web_service_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }
}

/// One named file inside the archive.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.bytes.len())
    }
}

/// Content entries, manifest and signature of one pass.
#[derive(Debug, Clone)]
pub struct PassPackage {
    entries: Vec<ArchiveEntry>,
    manifest: Manifest,
    manifest_bytes: Vec<u8>,
    signature: Vec<u8>,
}

impl PassPackage {
    /// Content entries (everything except manifest and signature), sorted
    /// by name.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Exact manifest bytes covered by the signature.
    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest_bytes
    }

    /// DER-encoded detached CMS signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Parsed `pass.json`.
    pub fn pass_json(&self) -> Result<serde_json::Value> {
        let entry = self.entry(PASS_JSON_NAME).ok_or_else(|| {
            WalletError::Validation(format!("archive has no {}", PASS_JSON_NAME))
        })?;
        serde_json::from_slice(&entry.bytes)
            .map_err(|e| WalletError::Validation(format!("malformed {}: {}", PASS_JSON_NAME, e)))
    }

    /// Writes the zip container: content entries, manifest, signature.
    pub fn to_zip(&self) -> Result<Vec<u8>> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let trailer = [
            (MANIFEST_NAME, self.manifest_bytes.as_slice()),
            (SIGNATURE_NAME, self.signature.as_slice()),
        ];
        let all = self
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.bytes.as_slice()))
            .chain(trailer);
        for (name, bytes) in all {
            writer.start_file(name, options).map_err(zip_error)?;
            writer.write_all(bytes)?;
        }

        Ok(writer.finish().map_err(zip_error)?.into_inner())
    }

    /// Reads a zip container back into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Validation`] if the bytes are not a zip or the
    /// manifest or signature is missing.
    pub fn from_zip(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

        let mut entries = Vec::new();
        let mut manifest_bytes = None;
        let mut signature = None;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(zip_error)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            match name.as_str() {
                MANIFEST_NAME => manifest_bytes = Some(buf),
                SIGNATURE_NAME => signature = Some(buf),
                _ => entries.push(ArchiveEntry { name, bytes: buf }),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let manifest_bytes = manifest_bytes.ok_or_else(|| {
            WalletError::Validation(format!("archive has no {}", MANIFEST_NAME))
        })?;
        let signature = signature.ok_or_else(|| {
            WalletError::Validation(format!("archive has no {}", SIGNATURE_NAME))
        })?;

        Ok(Self {
            entries,
            manifest: Manifest::parse(&manifest_bytes)?,
            manifest_bytes,
            signature,
        })
    }
}

fn zip_error(err: zip::result::ZipError) -> WalletError {
    WalletError::Validation(format!("archive container: {}", err))
}

/// Assembles signed pass archives.
///
/// Holds the credentials by `Arc`; builders are cheap to clone and safe to
/// share across tasks.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    settings: ArchiveSettings,
    credentials: Arc<SigningCredentials>,
}

impl ArchiveBuilder {
    pub fn new(settings: ArchiveSettings, credentials: Arc<SigningCredentials>) -> Self {
        Self {
            settings,
            credentials,
        }
    }

    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    /// Step 1: `pass.json` plus image entries, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Validation`] if the logo or icon is missing or
    /// the document cannot be rendered.
    pub fn content(
        &self,
        template: &Template,
        data: &PassData,
        authentication_token: Option<&str>,
    ) -> Result<Vec<ArchiveEntry>> {
        for role in [ImageRole::Logo, ImageRole::Icon] {
            if template.images.get(role).is_none() {
                return Err(WalletError::Validation(format!(
                    "template '{}' is missing the mandatory {} image",
                    template.id,
                    role.file_stem()
                )));
            }
        }

        let mut entries = vec![ArchiveEntry {
            name: PASS_JSON_NAME.to_string(),
            bytes: document::render(&self.settings, template, data, authentication_token)?,
        }];
        for (role, image) in template.images.iter() {
            entries.push(ArchiveEntry {
                name: format!("{}.png", role.file_stem()),
                bytes: image.data.clone(),
            });
            if let Some(retina) = &image.retina {
                entries.push(ArchiveEntry {
                    name: format!("{}@2x.png", role.file_stem()),
                    bytes: retina.clone(),
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Steps 1 and 2, without signing.
    pub fn manifest(
        &self,
        template: &Template,
        data: &PassData,
        authentication_token: Option<&str>,
    ) -> Result<Manifest> {
        let entries = self.content(template, data, authentication_token)?;
        Ok(Manifest::compute(
            self.settings.digest,
            entries.iter().map(|e| (e.name.as_str(), e.bytes.as_slice())),
        ))
    }

    /// Steps 1 to 3.
    pub fn package(
        &self,
        template: &Template,
        data: &PassData,
        authentication_token: Option<&str>,
    ) -> Result<PassPackage> {
        let entries = self.content(template, data, authentication_token)?;
        let manifest = Manifest::compute(
            self.settings.digest,
            entries.iter().map(|e| (e.name.as_str(), e.bytes.as_slice())),
        );
        let manifest_bytes = manifest.to_bytes()?;
        let signature = self.credentials.sign_detached(&manifest_bytes)?;

        Ok(PassPackage {
            entries,
            manifest,
            manifest_bytes,
            signature,
        })
    }

    /// Builds the finished archive bytes.
    pub fn build(
        &self,
        template: &Template,
        data: &PassData,
        authentication_token: Option<&str>,
    ) -> Result<Vec<u8>> {
        self.package(template, data, authentication_token)?.to_zip()
    }
}
