//! Provider implementations.

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "apple")]
pub mod apple;

#[cfg(feature = "google")]
pub mod google;

#[cfg(feature = "samsung")]
pub mod samsung;

/// Registers all compiled providers with the factory.
///
/// Called by [`crate::init`]; safe to call more than once.
pub fn register_all() {
    #[cfg(feature = "mock")]
    mock::register();

    #[cfg(feature = "apple")]
    apple::register();

    #[cfg(feature = "google")]
    google::register();

    #[cfg(feature = "samsung")]
    samsung::register();
}
