//! Persisted per-provider issuance state.

use crate::pass::PassData;
use crate::template::Template;
use crate::{Result, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an issued pass.
///
/// `active → voided` is the only transition out of `active`; `voided` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Active,
    Voided,
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Voided => write!(f, "voided"),
        }
    }
}

/// Issuance result for one provider and serial number.
///
/// Records are owned by the [`StorageBackend`](crate::storage::StorageBackend);
/// the manager and adapters work on copies for the duration of one
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    /// Provider name the record belongs to
    pub provider: String,

    /// Storage key derived by the provider from the serial number
    pub pass_id: String,

    pub serial_number: String,

    pub template_id: String,

    pub template_version: u32,

    /// Incremented on every successful update or void
    pub revision: u64,

    pub status: PassStatus,

    /// Provider reference such as a share URL or download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Token devices use to authenticate against the pass web service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_token: Option<String>,

    /// Last successfully applied pass data
    pub data: PassData,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl PassRecord {
    /// Creates an active record at revision 1.
    pub fn new(
        provider: impl Into<String>,
        pass_id: impl Into<String>,
        data: &PassData,
        template: &Template,
    ) -> Self {
        let now = Utc::now();
        Self {
            provider: provider.into(),
            pass_id: pass_id.into(),
            serial_number: data.serial_number.clone(),
            template_id: template.id.clone(),
            template_version: template.version,
            revision: 1,
            status: PassStatus::Active,
            reference: None,
            authentication_token: None,
            data: data.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn is_voided(&self) -> bool {
        self.status == PassStatus::Voided
    }

    /// Fails with [`WalletError::InvalidState`] unless the pass is active.
    pub fn ensure_active(&self) -> Result<()> {
        match self.status {
            PassStatus::Active => Ok(()),
            PassStatus::Voided => Err(WalletError::InvalidState(format!(
                "{} pass {} is voided",
                self.provider, self.pass_id
            ))),
        }
    }

    /// Copy carrying new pass data and template version; revision and
    /// timestamps are left to [`advance`](Self::advance).
    pub fn with_data(&self, data: &PassData, template: &Template) -> Self {
        let mut next = self.clone();
        next.data = data.clone();
        next.template_id = template.id.clone();
        next.template_version = template.version;
        next
    }

    /// Voided copy.
    pub fn voided(&self) -> Self {
        let mut next = self.clone();
        next.status = PassStatus::Voided;
        next.data.voided = true;
        next
    }

    /// Stamps `self` as the successor of `previous`: one revision higher,
    /// creation time preserved.
    pub fn advance(&mut self, previous: &PassRecord) {
        self.revision = previous.revision + 1;
        self.created_at = previous.created_at;
        self.updated_at = Utc::now();
    }
}
