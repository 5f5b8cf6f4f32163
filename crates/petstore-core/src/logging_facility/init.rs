//! Subscriber installation
//!
//! The CLI calls [`init`] once after parsing arguments; library code never
//! installs a subscriber.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output flavour of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Plain text on stderr, store internals at debug
    Development,
    /// One JSON object per line on stderr, lifecycle events only
    Production,
    /// Bare registry; tests add their own layer via `init_test_capture`
    Test,
}

impl Profile {
    // Applies to petstore_core, petstore_store and the CLI alike
    fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development => "petstore=debug",
            Profile::Production | Profile::Test => "petstore=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Later calls are ignored, whatever their profile. `RUST_LOG`, when set
/// and valid, replaces the profile's filter.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()));
        match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init(),
            Profile::Test => tracing_subscriber::registry().init(),
        }
    });
}
