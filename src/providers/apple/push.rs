//! Update notifications for archive-based passes.

use crate::Result;
use async_trait::async_trait;

/// Delivers "pass changed" pushes to registered devices.
///
/// Device registrations live in the pass web service, outside this crate;
/// the dispatcher looks them up and talks to the push gateway.
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    /// Pushes an update for one pass to every device registered for it.
    ///
    /// Returns whether at least one device was notified.
    async fn push(&self, pass_type_identifier: &str, serial_number: &str) -> Result<bool>;
}
