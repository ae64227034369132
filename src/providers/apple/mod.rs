//! Apple Wallet provider (signed `.pkpass` archives).
//!
//! Passes are built and signed locally; there is no remote object store.
//! Create and update build the archive to prove it is valid, then record
//! an authentication token (for the pass web service) and, when a web
//! service URL is configured, the download URL.
//!
//! # Requirements
//!
//! - A pass type certificate and private key issued for
//!   `pass_type_identifier`
//! - The trust-chain (WWDR) certificate that issued it
//!
//! # Example
//!
//! ```no_run
//! use walletmux::{factory, Config, ProviderType};
//!
//! # fn main() -> walletmux::Result<()> {
//! let config = Config::new(ProviderType::Apple)
//!     .with_option("pass_type_identifier", "pass.com.example.events")
//!     .with_option("team_identifier", "ABCDE12345")
//!     .with_option("certificate_path", "certs/pass.pem")
//!     .with_option("private_key_path", "certs/pass.key")
//!     .with_option("trust_chain_path", "certs/wwdr.pem")
//!     .with_option("web_service_url", "https://passes.example.com");
//!
//! let provider = factory::new_provider(config)?;
//! assert_eq!(provider.pass_id("T1"), "pass.com.example.events.T1");
//! # Ok(())
//! # }
//! ```

mod provider;
mod push;

pub use provider::AppleProvider;
pub use push::PushDispatcher;

/// Registers the Apple provider with the factory.
pub fn register() {
    crate::factory::register_provider("apple", |cfg| Ok(Box::new(AppleProvider::from_config(&cfg)?)));
}
