pub mod api;
pub mod composer;
pub mod config;
pub mod directory;
pub mod error;
pub mod expiry;
pub mod identity;
pub mod log;
pub mod media;
pub mod session;

pub use api::{ApiClient, RoomService};
pub use composer::{Composer, PrescribedDrug, SendOutcome};
pub use config::CoreConfig;
pub use directory::{partition, Directory, RoomBuckets, Selection};
pub use error::{ApiError, ComposeError, ConfigError, SessionError};
pub use expiry::{ExpiryClock, ExpiryStatus};
pub use identity::{identity_from_token, IdentityProvider, Role, SessionIdentity, StaticIdentity};
pub use log::{MessageLog, Scroll};
pub use session::{ChatSession, SessionEvent};

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging for hosts embedding the chat core.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("telecare_client=debug,telecare_net=debug,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
