//! Samsung Wallet provider (REST card API).
//!
//! Cards live under `/issuers/<issuer id>/services/<service id>/cards` and
//! are keyed by serial number. Calls are authorized with the partner API
//! key as a bearer token.
//!
//! # Example
//!
//! ```no_run
//! use walletmux::{factory, Config, ProviderType};
//!
//! # fn main() -> walletmux::Result<()> {
//! let config = Config::new(ProviderType::Samsung)
//!     .with_option("issuer_id", "partner-01")
//!     .with_option("service_id", "membership")
//!     .with_option("api_key", "sk_live_example");
//!
//! let provider = factory::new_provider(config)?;
//! # Ok(())
//! # }
//! ```

mod provider;

pub use provider::SamsungProvider;

/// Registers the Samsung provider with the factory.
pub fn register() {
    crate::factory::register_provider("samsung", |cfg| Ok(Box::new(SamsungProvider::from_config(&cfg)?)));
}
