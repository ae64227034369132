//! Provider trait definition.
//!
//! The [`Provider`] trait is the core abstraction of walletmux. Every wallet
//! platform implements it, so the [`PassManager`](crate::PassManager) can
//! fan one template out to any mix of providers.

use crate::config::ProviderType;
use crate::{PassData, PassRecord, Result, Template};
use async_trait::async_trait;

/// What a provider hands out for an issued pass.
#[derive(Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Signed archive bytes (`.pkpass`)
    Archive(Vec<u8>),
    /// Save link, share URL or other provider reference
    Reference(String),
}

impl Artifact {
    pub fn as_archive(&self) -> Option<&[u8]> {
        match self {
            Self::Archive(bytes) => Some(bytes),
            Self::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Archive(_) => None,
            Self::Reference(url) => Some(url),
        }
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive(bytes) => write!(f, "Archive({} bytes)", bytes.len()),
            Self::Reference(url) => f.debug_tuple("Reference").field(url).finish(),
        }
    }
}

/// Wallet platform adapter.
///
/// Adapters are stateless with respect to pass records: the manager loads
/// the current record, hands it in, and persists whatever comes back. An
/// adapter never touches storage itself.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the manager calls every
/// provider concurrently.
///
/// # Example
///
/// ```no_run
/// use walletmux::{factory, presets, Config, PassData, ProviderType};
///
/// #[tokio::main]
/// async fn main() -> walletmux::Result<()> {
///     let provider = factory::new_provider(Config::new(ProviderType::Mock))?;
///
///     let template = presets::event_ticket("Summer Gala", "Example Org")?;
///     let data = PassData::new(&template.id, "c1").with_field("event_date", "2025-06-01");
///
///     let record = provider.create(&data, &template).await?;
///     let voided = provider.void(&record, &template).await?;
///     assert!(voided.is_voided());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    // ========================================================================
    // Metadata
    // ========================================================================

    /// Instance name; keys records in storage (e.g., "apple", "google-eu").
    fn name(&self) -> &str;

    /// Platform this adapter talks to.
    fn provider_type(&self) -> ProviderType;

    /// Storage key for a serial number.
    fn pass_id(&self, serial_number: &str) -> String;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Issues a new pass.
    ///
    /// # Errors
    ///
    /// - [`WalletError::Validation`](crate::WalletError::Validation): data
    ///   does not satisfy the template
    /// - [`WalletError::ProviderApi`](crate::WalletError::ProviderApi): the
    ///   platform rejected the request
    async fn create(&self, data: &PassData, template: &Template) -> Result<PassRecord>;

    /// Applies new data to an issued pass.
    ///
    /// Returns the successor record; revision bookkeeping is left to the
    /// caller.
    async fn update(
        &self,
        record: &PassRecord,
        data: &PassData,
        template: &Template,
    ) -> Result<PassRecord>;

    /// Marks an issued pass unusable.
    async fn void(&self, record: &PassRecord, template: &Template) -> Result<PassRecord>;

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Produces the artifact a holder uses to add the pass to a wallet.
    async fn generate_artifact(&self, record: &PassRecord, template: &Template) -> Result<Artifact>;

    /// Tells holders' devices that the pass changed.
    ///
    /// Returns `Ok(false)` when the platform has no notification channel
    /// configured.
    async fn notify(&self, record: &PassRecord) -> Result<bool>;
}
