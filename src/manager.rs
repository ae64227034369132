//! Multi-provider pass lifecycle orchestration.
//!
//! [`PassManager`] fans each operation out to the selected providers
//! concurrently, persists the records that come back and reports one result
//! per provider. A failing provider never stops the others.

use crate::config::WalletConfig;
use crate::storage::{new_storage, StorageBackend};
use crate::validation::validate_pass_id;
use crate::{factory, Artifact, PassData, PassRecord, Provider, Result, Template, WalletError};
use futures::future::join_all;
use crate::locks::{KeyGuard, KeyLocks};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One result per provider, keyed by provider name.
pub type ProviderResults<T> = BTreeMap<String, Result<T>>;

/// Issues, updates and voids passes across several wallet providers.
///
/// Lifecycle per (provider, serial number): `unissued → active → voided`,
/// with `active → active` on update. Every other transition fails with
/// [`WalletError::InvalidState`]. Operations on the same (provider, pass
/// id) are serialized; everything else runs concurrently.
///
/// # Example
///
/// ```
/// use walletmux::providers::mock::MockProvider;
/// use walletmux::storage::MemoryStorage;
/// use walletmux::{presets, PassData, PassManager};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> walletmux::Result<()> {
///     let manager = PassManager::new(Arc::new(MemoryStorage::new()))
///         .with_provider(MockProvider::new().with_name("google"))
///         .with_provider(MockProvider::new().with_name("samsung"));
///
///     let template = presets::event_ticket("Summer Gala", "Example Org")?;
///     let data = PassData::new(&template.id, "c1").with_field("event_date", "2025-06-01");
///
///     let created = manager.create(&data, &template, None).await;
///     assert_eq!(created.len(), 2);
///     assert!(created.values().all(|r| r.is_ok()));
///
///     let voided = manager.void(&data.serial_number, &template, Some(&["google"])).await;
///     assert!(voided["google"].as_ref().unwrap().is_voided());
///     Ok(())
/// }
/// ```
pub struct PassManager {
    providers: BTreeMap<String, Arc<dyn Provider>>,
    storage: Arc<dyn StorageBackend>,
    key_locks: KeyLocks,
}

impl std::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassManager")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("storage", &self.storage.name())
            .finish()
    }
}

impl PassManager {
    /// Creates a manager with no providers.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            providers: BTreeMap::new(),
            storage,
            key_locks: KeyLocks::new(),
        }
    }

    /// Adds a provider under its own name, replacing any provider with the
    /// same name.
    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.add_provider(Arc::new(provider));
        self
    }

    pub fn add_provider(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            warn!(provider = %name, "Replacing provider with the same name");
        }
    }

    /// Builds storage and every configured provider.
    ///
    /// A provider that fails to initialize is logged and skipped; the
    /// remaining providers are still usable.
    pub fn from_config(config: &WalletConfig) -> Self {
        let mut manager = Self::new(new_storage(&config.storage));
        for provider_config in &config.providers {
            let name = provider_config.provider_name();
            match factory::new_provider(provider_config.clone()) {
                Ok(provider) => {
                    info!(provider = %name, provider_type = %provider.provider_type(), "Provider initialized");
                    manager.add_provider(Arc::from(provider));
                }
                Err(e) => warn!(provider = %name, error = %e, "Provider failed to initialize, skipping"),
            }
        }
        manager
    }

    /// Configured provider names, sorted.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Issues a pass on every selected provider.
    ///
    /// Per provider: fails with [`WalletError::InvalidState`] if a record
    /// already exists, otherwise creates the pass remotely and stores the
    /// record.
    pub async fn create(
        &self,
        data: &PassData,
        template: &Template,
        providers: Option<&[&str]>,
    ) -> ProviderResults<PassRecord> {
        self.fan_out("create", &data.serial_number, providers, |p| {
            self.create_one(p, data, template)
        })
        .await
    }

    /// Applies new pass data on every selected provider.
    ///
    /// Per provider: [`WalletError::NotFound`] without a record,
    /// [`WalletError::InvalidState`] if the pass is voided,
    /// [`WalletError::Validation`] if `template` is not the one the pass was
    /// issued from (a newer version of it is fine). A failed update leaves
    /// the stored record untouched.
    pub async fn update(
        &self,
        serial_number: &str,
        data: &PassData,
        template: &Template,
        providers: Option<&[&str]>,
    ) -> ProviderResults<PassRecord> {
        self.fan_out("update", serial_number, providers, |p| {
            self.update_one(p, serial_number, data, template)
        })
        .await
    }

    /// Voids a pass on every selected provider. Voiding twice is
    /// [`WalletError::InvalidState`].
    pub async fn void(
        &self,
        serial_number: &str,
        template: &Template,
        providers: Option<&[&str]>,
    ) -> ProviderResults<PassRecord> {
        self.fan_out("void", serial_number, providers, |p| {
            self.void_one(p, serial_number, template)
        })
        .await
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Produces each provider's artifact (archive bytes or reference).
    /// Stored records are not modified.
    pub async fn generate_artifacts(
        &self,
        serial_number: &str,
        template: &Template,
        providers: Option<&[&str]>,
    ) -> ProviderResults<Artifact> {
        self.fan_out("generate artifact", serial_number, providers, |p| async move {
            let record = self.load(p, serial_number).await?;
            check_template(&record, template)?;
            p.generate_artifact(&record, template).await
        })
        .await
    }

    /// Tells holders' devices that the pass changed.
    ///
    /// `Ok(false)` means the provider has no notification channel
    /// configured.
    pub async fn send_update_notification(
        &self,
        serial_number: &str,
        template: &Template,
        providers: Option<&[&str]>,
    ) -> ProviderResults<bool> {
        self.fan_out("notify", serial_number, providers, |p| async move {
            let record = self.load(p, serial_number).await?;
            check_template(&record, template)?;
            p.notify(&record).await
        })
        .await
    }

    /// Reads the stored record for one provider.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotFound`] if the provider is not configured or has no
    /// record for the serial number.
    pub async fn record(&self, provider: &str, serial_number: &str) -> Result<PassRecord> {
        let provider = self.provider(provider)?;
        self.load(&**provider, serial_number).await
    }

    /// Pass ids stored for one provider, sorted.
    pub async fn list(&self, provider: &str) -> Result<Vec<String>> {
        let provider = self.provider(provider)?;
        self.storage.list(provider.name()).await
    }

    // ========================================================================
    // Per-provider steps
    // ========================================================================

    async fn create_one(&self, p: &dyn Provider, data: &PassData, template: &Template) -> Result<PassRecord> {
        data.validate()?;
        if data.voided {
            return Err(WalletError::Validation(
                "cannot issue a pass that is already voided".to_string(),
            ));
        }

        let pass_id = p.pass_id(&data.serial_number);
        validate_pass_id(&pass_id)?;
        let _guard = self.lock_key(p.name(), &pass_id).await;

        match self.storage.retrieve(p.name(), &pass_id).await {
            Ok(existing) => {
                return Err(WalletError::InvalidState(format!(
                    "pass {} is already issued ({})",
                    pass_id, existing.status
                )))
            }
            Err(WalletError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let record = p.create(data, template).await?;
        self.storage.store(p.name(), &record.pass_id, &record).await?;
        info!(provider = %p.name(), pass_id = %record.pass_id, "Pass issued");
        Ok(record)
    }

    async fn update_one(
        &self,
        p: &dyn Provider,
        serial_number: &str,
        data: &PassData,
        template: &Template,
    ) -> Result<PassRecord> {
        data.validate()?;
        if data.serial_number != serial_number {
            return Err(WalletError::Validation(format!(
                "pass data serial number {} does not match {}",
                data.serial_number, serial_number
            )));
        }
        if data.voided {
            return Err(WalletError::Validation(
                "use void to void a pass".to_string(),
            ));
        }

        let pass_id = p.pass_id(serial_number);
        validate_pass_id(&pass_id)?;
        let _guard = self.lock_key(p.name(), &pass_id).await;

        let current = self.storage.retrieve(p.name(), &pass_id).await?;
        current.ensure_active()?;
        check_template(&current, template)?;

        let mut next = p.update(&current, data, template).await?;
        next.advance(&current);
        self.storage.store(p.name(), &pass_id, &next).await?;
        info!(provider = %p.name(), pass_id = %pass_id, revision = next.revision, "Pass updated");
        Ok(next)
    }

    async fn void_one(&self, p: &dyn Provider, serial_number: &str, template: &Template) -> Result<PassRecord> {
        let pass_id = p.pass_id(serial_number);
        validate_pass_id(&pass_id)?;
        let _guard = self.lock_key(p.name(), &pass_id).await;

        let current = self.storage.retrieve(p.name(), &pass_id).await?;
        if current.is_voided() {
            return Err(WalletError::InvalidState(format!(
                "pass {} is already voided",
                pass_id
            )));
        }
        check_template(&current, template)?;

        let mut next = p.void(&current, template).await?;
        next.advance(&current);
        self.storage.store(p.name(), &pass_id, &next).await?;
        info!(provider = %p.name(), pass_id = %pass_id, "Pass voided");
        Ok(next)
    }

    async fn load(&self, p: &dyn Provider, serial_number: &str) -> Result<PassRecord> {
        self.storage
            .retrieve(p.name(), &p.pass_id(serial_number))
            .await
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    fn provider(&self, name: &str) -> Result<&Arc<dyn Provider>> {
        self.providers
            .get(name)
            .ok_or_else(|| WalletError::NotFound(format!("provider '{}' is not configured", name)))
    }

    async fn lock_key(&self, provider: &str, pass_id: &str) -> KeyGuard<'_> {
        self.key_locks.lock(provider, pass_id).await
    }

    /// Runs `op` for every selected provider concurrently and collects the
    /// outcomes, wrapping errors with provider and operation context.
    async fn fan_out<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        serial_number: &str,
        providers: Option<&[&str]>,
        op: F,
    ) -> ProviderResults<T>
    where
        F: Fn(&'a dyn Provider) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut results = BTreeMap::new();
        let mut selected = Vec::new();
        match providers {
            None => selected.extend(self.providers.values()),
            Some(names) => {
                for name in names {
                    match self.provider(name) {
                        Ok(provider) => selected.push(provider),
                        Err(e) => {
                            warn!(provider = %name, operation, "Provider is not configured");
                            results.insert(name.to_string(), Err(e));
                        }
                    }
                }
            }
        }

        let outcomes = join_all(selected.into_iter().map(|provider| {
            let provider: &'a dyn Provider = &**provider;
            let fut = op(provider);
            async move { (provider, fut.await) }
        }))
        .await;

        for (provider, outcome) in outcomes {
            let name = provider.name().to_string();
            let outcome = outcome.map_err(|e| {
                let pass_id = provider.pass_id(serial_number);
                warn!(provider = %name, operation, pass_id = %pass_id, kind = %e.kind(), error = %e, "Provider operation failed");
                WalletError::provider_op(&name, operation, pass_id, e)
            });
            if outcome.is_ok() {
                debug!(provider = %name, operation, "Provider operation succeeded");
            }
            results.insert(name, outcome);
        }
        results
    }
}

/// Fails with [`WalletError::Validation`] when a record was issued from a
/// different template.
fn check_template(record: &PassRecord, template: &Template) -> Result<()> {
    if record.template_id != template.id {
        return Err(WalletError::Validation(format!(
            "pass {} was issued from template '{}', not '{}'",
            record.pass_id, record.template_id, template.id
        )));
    }
    Ok(())
}
