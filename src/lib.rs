mod config;
mod error;
mod services;
mod types;

use tracing_subscriber::EnvFilter;

pub use config::ClientConfig;
pub use error::{CredentialError, RequestError, TransportError};
pub use services::credentials::{CredentialStore, KeyringStore, MemoryStore, SecureStore};
pub use services::http::Transport;
pub use services::request::{build_request, bump_last_char};
pub use types::{
    HttpResponse, LoginCredentials, Operation, RequestDescriptor, Session, TokenResponse,
    DEFAULT_LOGIN_AUTH_TOKEN,
};

/// Install the global fmt subscriber; verbosity 0/1/2+ maps to warn/info/debug.
pub fn init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(log_filter(verbosity))?)
        .with_target(false)
        .try_init()
}

fn log_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filter() {
        assert_eq!(log_filter(0), "warn");
        assert_eq!(log_filter(1), "info");
        assert_eq!(log_filter(2), "debug");
        assert_eq!(log_filter(9), "debug");
    }

    #[test]
    fn init_logging_installs_once() {
        let _ = init_logging(1);
        // the global subscriber is already set by now
        assert!(init_logging(0).is_err());
    }
}
