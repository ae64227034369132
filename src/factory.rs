//! Provider factory and registration system.

use crate::{Config, Provider, Result, WalletError};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Factory function type for creating providers.
pub type ProviderFactory = fn(Config) -> Result<Box<dyn Provider>>;

static PROVIDER_REGISTRY: OnceLock<RwLock<HashMap<String, ProviderFactory>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, ProviderFactory>> {
    PROVIDER_REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a provider factory function.
///
/// Called from each provider module's `register()` during library
/// initialization. Registering the same type again replaces the factory.
///
/// # Example
///
/// ```no_run
/// use walletmux::factory::register_provider;
/// use walletmux::{Config, Provider, Result};
///
/// fn my_provider_factory(config: Config) -> Result<Box<dyn Provider>> {
///     // Create and return provider instance
///     # unimplemented!()
/// }
///
/// pub fn register() {
///     register_provider("myprovider", my_provider_factory);
/// }
/// ```
pub fn register_provider(provider_type: &str, factory: ProviderFactory) {
    let mut reg = registry().write().unwrap_or_else(|e| e.into_inner());
    reg.insert(provider_type.to_string(), factory);
}

/// Creates a provider from configuration.
///
/// The factory is looked up by `config.provider`.
///
/// # Errors
///
/// - [`WalletError::Configuration`]: the provider type is not compiled in
///   (missing feature flag), or its options are incomplete
/// - [`WalletError::Signing`]: signing credentials could not be loaded
///
/// # Example
///
/// ```
/// use walletmux::{factory, Config, ProviderType};
///
/// let provider = factory::new_provider(Config::new(ProviderType::Mock).with_name("qa"))?;
/// assert_eq!(provider.name(), "qa");
/// # Ok::<(), walletmux::WalletError>(())
/// ```
pub fn new_provider(config: Config) -> Result<Box<dyn Provider>> {
    crate::init();

    let provider_type = config.provider.to_string();
    let factory = {
        let reg = registry().read().unwrap_or_else(|e| e.into_inner());
        reg.get(&provider_type).copied()
    };
    let factory = factory.ok_or_else(|| {
        WalletError::Configuration(format!(
            "unknown provider: {} (did you enable the '{}' feature flag?)",
            provider_type, provider_type
        ))
    })?;

    factory(config)
}

/// Provider types with a registered factory, sorted.
pub fn registered_providers() -> Vec<String> {
    crate::init();
    let reg = registry().read().unwrap_or_else(|e| e.into_inner());
    let mut names: Vec<String> = reg.keys().cloned().collect();
    names.sort();
    names
}
