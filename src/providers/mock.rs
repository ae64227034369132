//! Mock provider for testing.
//!
//! This provider keeps "remote" objects in memory and supports error
//! injection for every operation, so manager behaviour under partial
//! failure can be tested without network access.

use crate::config::ProviderType;
use crate::{Artifact, Config, PassData, PassRecord, Provider, Result, Template, WalletError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock provider for testing.
///
/// # Example
///
/// ```
/// use walletmux::providers::mock::MockProvider;
/// use walletmux::{presets, PassData, Provider, WalletError};
///
/// #[tokio::main]
/// async fn main() -> walletmux::Result<()> {
///     let mut provider = MockProvider::new();
///     let template = presets::event_ticket("Gala", "org")?;
///     let data = PassData::new(&template.id, "c1").with_field("event_date", "2025-06-01");
///
///     let record = provider.create(&data, &template).await?;
///     assert_eq!(provider.object_count().await, 1);
///
///     // Test error conditions
///     provider.void_error = Some(WalletError::provider_api("mock", Some(503), "unavailable"));
///     assert!(provider.void(&record, &template).await.is_err());
///     Ok(())
/// }
/// ```
pub struct MockProvider {
    name: String,
    objects: Arc<RwLock<HashMap<String, PassData>>>,

    /// Error to return from `create()`
    pub create_error: Option<WalletError>,
    /// Error to return from `update()`
    pub update_error: Option<WalletError>,
    /// Error to return from `void()`
    pub void_error: Option<WalletError>,
    /// Error to return from `generate_artifact()`
    pub artifact_error: Option<WalletError>,
    /// Error to return from `notify()`
    pub notify_error: Option<WalletError>,
}

impl MockProvider {
    /// Creates a mock provider named "mock" with no remote objects.
    pub fn new() -> Self {
        Self {
            name: ProviderType::Mock.to_string(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            create_error: None,
            update_error: None,
            void_error: None,
            artifact_error: None,
            notify_error: None,
        }
    }

    /// Renames the instance, e.g. to stand in for a real platform in tests.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of remote objects created so far.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Last data pushed for a pass id.
    pub async fn object(&self, pass_id: &str) -> Option<PassData> {
        self.objects.read().await.get(pass_id).cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Reproduces an injected error with the same kind and message.
fn replay(err: &Option<WalletError>) -> Result<()> {
    let Some(err) = err else {
        return Ok(());
    };
    Err(match err {
        WalletError::Validation(m) => WalletError::Validation(m.clone()),
        WalletError::Signing(m) => WalletError::Signing(m.clone()),
        WalletError::NotFound(m) => WalletError::NotFound(m.clone()),
        WalletError::InvalidState(m) => WalletError::InvalidState(m.clone()),
        WalletError::Storage(m) => WalletError::Storage(m.clone()),
        WalletError::Configuration(m) => WalletError::Configuration(m.clone()),
        WalletError::ProviderApi {
            provider,
            status,
            body,
        } => WalletError::provider_api(provider, *status, body),
        other => WalletError::Other(anyhow::anyhow!("{}", other)),
    })
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Mock
    }

    fn pass_id(&self, serial_number: &str) -> String {
        serial_number.to_string()
    }

    async fn create(&self, data: &PassData, template: &Template) -> Result<PassRecord> {
        replay(&self.create_error)?;
        template.resolve(data)?;

        let pass_id = self.pass_id(&data.serial_number);
        self.objects
            .write()
            .await
            .insert(pass_id.clone(), data.clone());
        Ok(PassRecord::new(&self.name, &pass_id, data, template)
            .with_reference(format!("mock://{}/{}", self.name, pass_id)))
    }

    async fn update(
        &self,
        record: &PassRecord,
        data: &PassData,
        template: &Template,
    ) -> Result<PassRecord> {
        replay(&self.update_error)?;
        template.resolve(data)?;

        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(&record.pass_id)
            .ok_or_else(|| WalletError::provider_api(&self.name, Some(404), "no such object"))?;
        *object = data.clone();
        Ok(record.with_data(data, template))
    }

    async fn void(&self, record: &PassRecord, _template: &Template) -> Result<PassRecord> {
        replay(&self.void_error)?;

        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(&record.pass_id)
            .ok_or_else(|| WalletError::provider_api(&self.name, Some(404), "no such object"))?;
        object.voided = true;
        Ok(record.voided())
    }

    async fn generate_artifact(&self, record: &PassRecord, _template: &Template) -> Result<Artifact> {
        replay(&self.artifact_error)?;
        Ok(Artifact::Reference(
            record
                .reference
                .clone()
                .unwrap_or_else(|| format!("mock://{}/{}", self.name, record.pass_id)),
        ))
    }

    async fn notify(&self, _record: &PassRecord) -> Result<bool> {
        replay(&self.notify_error)?;
        Ok(true)
    }
}

fn factory(config: Config) -> Result<Box<dyn Provider>> {
    Ok(Box::new(MockProvider::new().with_name(config.provider_name())))
}

/// Registers the mock provider with the factory.
pub fn register() {
    crate::factory::register_provider("mock", factory);
}
