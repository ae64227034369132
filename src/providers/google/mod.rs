//! Google Wallet provider (cloud object API).
//!
//! Each pass is a wallet object (`eventTicketObject`, `offerObject`, ...)
//! whose id is `<issuer id>.<serial number>`. Objects belong to a class
//! named `<issuer id>.<template id>`; classes are managed outside this
//! crate.
//!
//! # Authentication
//!
//! Either a pre-issued bearer token (`access_token`) or a service account
//! key file (`service_account_file`). With a service account, access tokens
//! are exchanged on demand and cached, and `generate_artifact` returns a
//! signed "save to wallet" link.
//!
//! # Example
//!
//! ```no_run
//! use walletmux::{factory, Config, ProviderType};
//!
//! # fn main() -> walletmux::Result<()> {
//! let config = Config::new(ProviderType::Google)
//!     .with_option("issuer_id", "3388000000012345678")
//!     .with_option("service_account_file", "google-sa.json")
//!     .with_option("origins", "https://example.com");
//!
//! let provider = factory::new_provider(config)?;
//! assert_eq!(provider.pass_id("T1"), "3388000000012345678.T1");
//! # Ok(())
//! # }
//! ```

mod auth;
mod provider;

pub use auth::{GoogleAuth, ServiceAccount};
pub use provider::GoogleProvider;

/// Registers the Google provider with the factory.
pub fn register() {
    crate::factory::register_provider("google", |cfg| Ok(Box::new(GoogleProvider::from_config(&cfg)?)));
}
