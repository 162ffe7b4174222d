use keyring::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::CredentialError;
use crate::types::LoginCredentials;

/// Secure key-value backend holding one secret per account.
pub trait SecureStore: Send + Sync {
    fn get(&self, account: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, account: &str, secret: &str) -> Result<(), CredentialError>;
    /// Deleting an absent entry is not an error.
    fn delete(&self, account: &str) -> Result<(), CredentialError>;
}

/// Targets where `keyring` is built with a native credential store.
const NATIVE_BACKEND: bool = cfg!(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "windows",
    target_os = "linux"
));

/// OS keychain / credential manager through `keyring`.
///
/// Writes are read back through a fresh entry; a backend that does not
/// persist them fails the write instead of losing the secret.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry, CredentialError> {
        Entry::new(&self.service, account).map_err(|e| CredentialError::Storage {
            message: format!("Failed to create keyring entry: {}", e),
        })
    }
}

impl SecureStore for KeyringStore {
    fn get(&self, account: &str) -> Result<Option<String>, CredentialError> {
        let entry = self.entry(account)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Storage {
                message: format!("Failed to load credentials from keyring: {}", e),
            }),
        }
    }

    fn set(&self, account: &str, secret: &str) -> Result<(), CredentialError> {
        if !NATIVE_BACKEND {
            return Err(CredentialError::Storage {
                message: "No secure credential store on this platform".to_string(),
            });
        }

        let entry = self.entry(account)?;
        entry
            .set_password(secret)
            .map_err(|e| CredentialError::Storage {
                message: format!("Failed to save credentials to keyring: {}", e),
            })?;

        match self.get(account)? {
            Some(stored) if stored == secret => Ok(()),
            _ => Err(CredentialError::Storage {
                message: "Failed to save credentials to keyring: entry was not persisted"
                    .to_string(),
            }),
        }
    }

    fn delete(&self, account: &str) -> Result<(), CredentialError> {
        let entry = self.entry(account)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Storage {
                message: format!("Failed to delete credentials from keyring: {}", e),
            }),
        }
    }
}

/// In-process store for tests and platforms without a keychain.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CredentialError> {
        self.entries.lock().map_err(|_| CredentialError::Storage {
            message: "Failed to lock memory store".to_string(),
        })
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, account: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.lock()?.get(account).cloned())
    }

    fn set(&self, account: &str, secret: &str) -> Result<(), CredentialError> {
        self.lock()?.insert(account.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<(), CredentialError> {
        self.lock()?.remove(account);
        Ok(())
    }
}

/// Username/password pair persisted as a single secure entry.
///
/// Nothing is cached: every call goes through the backend, so the pair
/// is always written and removed as one unit.
pub struct CredentialStore<S: SecureStore = KeyringStore> {
    store: S,
    account: String,
}

impl CredentialStore<KeyringStore> {
    /// Keychain-backed store for the configured service and account.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            KeyringStore::new(&config.keychain_service),
            &config.keychain_account,
        )
    }
}

impl<S: SecureStore> CredentialStore<S> {
    pub fn new(store: S, account: &str) -> Self {
        Self {
            store,
            account: account.to_string(),
        }
    }

    pub fn set_credentials(&self, credentials: &LoginCredentials) -> Result<(), CredentialError> {
        let credentials_json = serde_json::to_string(credentials)?;
        self.store.set(&self.account, &credentials_json)?;
        debug!(account = %self.account, "stored login credentials");
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        matches!(self.get_credentials(), (Some(_), Some(_)))
    }

    /// `(None, None)` when nothing usable is stored.
    pub fn get_credentials(&self) -> (Option<String>, Option<String>) {
        match self.load() {
            Some(credentials) => (Some(credentials.username), Some(credentials.password)),
            None => (None, None),
        }
    }

    pub fn clear(&self) -> Result<(), CredentialError> {
        self.store.delete(&self.account)?;
        debug!(account = %self.account, "cleared login credentials");
        Ok(())
    }

    fn load(&self) -> Option<LoginCredentials> {
        let credentials_json = match self.store.get(&self.account) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(account = %self.account, "{}", e);
                return None;
            }
        };

        match serde_json::from_str(&credentials_json) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!(account = %self.account, "Failed to deserialize login credentials: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectingStore;

    impl SecureStore for RejectingStore {
        fn get(&self, _account: &str) -> Result<Option<String>, CredentialError> {
            Err(CredentialError::Storage {
                message: "keychain locked".to_string(),
            })
        }

        fn set(&self, _account: &str, _secret: &str) -> Result<(), CredentialError> {
            Err(CredentialError::Storage {
                message: "unsupported device".to_string(),
            })
        }

        fn delete(&self, _account: &str) -> Result<(), CredentialError> {
            Ok(())
        }
    }

    fn store() -> CredentialStore<MemoryStore> {
        let store = CredentialStore::new(MemoryStore::new(), "credentials");
        store.clear().expect("clear memory store");
        store
    }

    fn set_credentials(store: &CredentialStore<MemoryStore>) -> Result<(), CredentialError> {
        store.set_credentials(&LoginCredentials::new("testUsername", "testPassword"))
    }

    #[test]
    fn set_credentials_succeeds() {
        let store = store();
        assert!(set_credentials(&store).is_ok());
    }

    #[test]
    fn no_credentials() {
        let store = store();
        assert!(!store.has_credentials());
    }

    #[test]
    fn has_credentials_after_set() -> anyhow::Result<()> {
        let store = store();
        set_credentials(&store)?;
        assert!(store.has_credentials());
        Ok(())
    }

    #[test]
    fn get_without_credentials_is_empty() {
        let store = store();
        assert_eq!(store.get_credentials(), (None, None));
    }

    #[test]
    fn get_returns_stored_pair() -> anyhow::Result<()> {
        let store = store();
        set_credentials(&store)?;
        let (username, password) = store.get_credentials();
        assert_eq!(username.as_deref(), Some("testUsername"));
        assert_eq!(password.as_deref(), Some("testPassword"));
        Ok(())
    }

    #[test]
    fn second_set_overwrites() -> anyhow::Result<()> {
        let store = store();
        set_credentials(&store)?;
        store.set_credentials(&LoginCredentials::new("other", "secret"))?;
        assert_eq!(
            store.get_credentials(),
            (Some("other".to_string()), Some("secret".to_string()))
        );
        Ok(())
    }

    #[test]
    fn clear_removes_pair() -> anyhow::Result<()> {
        let store = store();
        set_credentials(&store)?;
        store.clear()?;
        assert!(!store.has_credentials());
        assert_eq!(store.get_credentials(), (None, None));
        // clearing twice is fine
        store.clear()?;
        Ok(())
    }

    #[test]
    fn accounts_are_isolated() -> anyhow::Result<()> {
        let backend = MemoryStore::new();
        backend.set("other-account", r#"{"username":"a","password":"b"}"#)?;
        let store = CredentialStore::new(backend, "credentials");
        assert!(!store.has_credentials());
        Ok(())
    }

    #[test]
    fn corrupt_entry_reads_as_absent() -> anyhow::Result<()> {
        let backend = MemoryStore::new();
        backend.set("credentials", r#"{"username":"only"}"#)?;
        let store = CredentialStore::new(backend, "credentials");
        assert_eq!(store.get_credentials(), (None, None));
        assert!(!store.has_credentials());
        Ok(())
    }

    #[test]
    fn keyring_store_round_trip_or_refuses() -> anyhow::Result<()> {
        let store = CredentialStore::new(
            KeyringStore::new("cf-apps-tests"),
            &format!("round-trip-{}", std::process::id()),
        );

        match store.set_credentials(&LoginCredentials::new("u", "p")) {
            Ok(()) => {
                assert_eq!(
                    store.get_credentials(),
                    (Some("u".to_string()), Some("p".to_string()))
                );
                assert!(store.has_credentials());
                store.clear()?;
                assert_eq!(store.get_credentials(), (None, None));
            }
            // no usable keychain here (sandbox, missing session keyring)
            Err(err) => {
                assert!(matches!(err, CredentialError::Storage { .. }));
                assert!(!store.has_credentials());
            }
        }
        Ok(())
    }

    #[test]
    fn storage_failure_is_returned() {
        let store = CredentialStore::new(RejectingStore, "credentials");
        let err = store
            .set_credentials(&LoginCredentials::new("u", "p"))
            .unwrap_err();
        assert!(matches!(err, CredentialError::Storage { .. }));
        // a read failure is not confused with stored credentials
        assert_eq!(store.get_credentials(), (None, None));
    }
}
