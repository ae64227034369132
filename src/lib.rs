//! Walletmux - Unified interface for digital wallet passes.
//!
//! Walletmux issues one pass design to several wallet platforms at once.
//! Define a [`Template`] once, overlay per-customer [`PassData`], and the
//! [`PassManager`] creates, updates, voids and delivers the pass on Apple
//! Wallet, Google Wallet and Samsung Wallet with the same interface.
//!
//! # Features
//!
//! - **Unified API**: Single [`Provider`] trait for every wallet platform
//! - **Async/Await**: Built on tokio; providers run concurrently
//! - **Partial failure**: One result per provider, a failing platform never
//!   blocks the others
//! - **Signed archives**: `.pkpass` building, CMS signing and verification
//!   without external tools
//! - **Pluggable storage**: In-memory or JSON-file records, or bring your own
//! - **Feature Flags**: Optional provider compilation to minimize dependencies
//!
//! # Quick Start
//!
//! ```no_run
//! use walletmux::{presets, PassData, PassManager, WalletConfig};
//!
//! #[tokio::main]
//! async fn main() -> walletmux::Result<()> {
//!     // Providers and storage from WALLETMUX_* environment variables
//!     let config = WalletConfig::from_env()?;
//!     let manager = PassManager::from_config(&config);
//!
//!     // Design the pass once
//!     let template = presets::event_ticket("Summer Gala", "Example Org")?;
//!
//!     // Issue it everywhere
//!     let data = PassData::new(&template.id, "customer-42")
//!         .with_field("event_date", "2025-06-01")
//!         .with_barcode("TICKET-42", None);
//!     for (provider, result) in manager.create(&data, &template, None).await {
//!         match result {
//!             Ok(record) => println!("{}: issued {}", provider, record.pass_id),
//!             Err(e) => eprintln!("{}: {}", provider, e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Supported Providers
//!
//! | Provider | Feature Flag | Transport | Notes |
//! |----------|-------------|-----------|-------|
//! | Mock | `mock` (default) | None | In-memory testing provider |
//! | Apple Wallet | `apple` (default) | None | Locally signed `.pkpass` archives |
//! | Google Wallet | `google` (default) | HTTPS | Wallet objects, save links |
//! | Samsung Wallet | `samsung` (default) | HTTPS | REST card API |
//!
//! # Feature Flags
//!
//! ```toml
//! [dependencies]
//! walletmux = { version = "0.1", default-features = false, features = ["apple"] }
//! ```
//!
//! Use `full` to also build the `walletmux` command-line tool.

pub mod archive;
pub mod config;
pub mod error;
pub mod factory;
pub mod field;
pub mod manager;
pub mod pass;
pub mod presets;
pub mod provider;
pub mod providers;
pub mod record;
pub mod session;
pub mod storage;
pub mod template;
pub mod validation;

#[cfg(feature = "http")]
pub(crate) mod http;
mod locks;

pub use config::{Config, ProviderType, StorageConfig, WalletConfig};
pub use error::{ErrorKind, Result, WalletError};
pub use field::{FieldSection, FieldValue, PassField};
pub use manager::{PassManager, ProviderResults};
pub use pass::PassData;
pub use provider::{Artifact, Provider};
pub use record::{PassRecord, PassStatus};
pub use session::Session;
pub use storage::StorageBackend;
pub use template::{BarcodeFormat, Image, ImageRole, Location, PassKind, PassStyle, Template};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the walletmux library.
///
/// Registers all compiled providers with the factory. Called automatically
/// by [`factory::new_provider`]; calling it again is a no-op.
pub fn init() {
    INIT.call_once(providers::register_all);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_initialization() {
        init();
        init();
    }

    #[test]
    #[cfg(feature = "mock")]
    fn test_mock_provider_roundtrip() {
        init();

        let provider = factory::new_provider(Config::new(ProviderType::Mock));
        assert!(provider.is_ok());
    }
}
