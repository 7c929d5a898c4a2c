use keyring::Entry;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Fixed service name identifying this application in the platform store.
pub const DEFAULT_SERVICE: &str = "execguard";

/// Fixed account name for the single credential slot.
pub const DEFAULT_ACCOUNT: &str = "llm-api-key";

/// Environment variable consulted when the secure backend is unavailable.
pub const DEFAULT_ENV_FALLBACK: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secure storage backend error: {0}")]
    Backend(String),
}

/// Storage mechanism behind the credential slot. Implementations must treat
/// absence as a normal state, not an error.
pub trait SecretBackend: Send + Sync {
    fn load(&self) -> Result<Option<String>, SecretError>;
    fn save(&self, secret: &str) -> Result<(), SecretError>;
    /// Returns whether a credential was actually removed.
    fn delete(&self) -> Result<bool, SecretError>;
}

/// Platform secure-storage backend over the OS keyring
pub struct KeyringBackend {
    service: String,
    account: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, SecretError> {
        Entry::new(&self.service, &self.account).map_err(|e| SecretError::Backend(e.to_string()))
    }

    /// Check whether the platform store responds at all. A missing entry
    /// counts as available; only mechanism-level failures count against it.
    pub fn probe(&self) -> bool {
        match self.entry() {
            Ok(entry) => matches!(entry.get_password(), Ok(_) | Err(keyring::Error::NoEntry)),
            Err(_) => false,
        }
    }
}

impl SecretBackend for KeyringBackend {
    fn load(&self) -> Result<Option<String>, SecretError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SecretError::Backend(e.to_string())),
        }
    }

    fn save(&self, secret: &str) -> Result<(), SecretError> {
        self.entry()?
            .set_password(secret)
            .map_err(|e| SecretError::Backend(e.to_string()))
    }

    fn delete(&self) -> Result<bool, SecretError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(SecretError::Backend(e.to_string())),
        }
    }
}

/// In-memory backend for tests. `failing()` builds one whose every
/// operation errors, to exercise degradation paths.
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<String>>,
    failing: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            slot: Mutex::new(None),
            failing: true,
        }
    }

    fn check(&self) -> Result<(), SecretError> {
        if self.failing {
            return Err(SecretError::Backend("simulated backend failure".to_string()));
        }
        Ok(())
    }
}

impl SecretBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>, SecretError> {
        self.check()?;
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, secret: &str) -> Result<(), SecretError> {
        self.check()?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(secret.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<bool, SecretError> {
        self.check()?;
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some())
    }
}

/// Owns the single credential slot
///
/// The platform backend is probed once at construction; the selection is
/// never revisited per call. All operations are idempotent and
/// last-writer-wins. The credential value is never logged and never
/// surfaces beyond what the caller explicitly retrieves.
pub struct SecretStore {
    backend: Option<Box<dyn SecretBackend>>,
    env_fallback: String,
}

impl SecretStore {
    /// Build a store over the platform keyring with the default
    /// service/account pair, probing availability once.
    pub fn new() -> Self {
        Self::with_names(DEFAULT_SERVICE, DEFAULT_ACCOUNT, DEFAULT_ENV_FALLBACK)
    }

    pub fn with_names(service: &str, account: &str, env_fallback: &str) -> Self {
        let keyring_backend = KeyringBackend::new(service, account);
        let backend: Option<Box<dyn SecretBackend>> = if keyring_backend.probe() {
            Some(Box::new(keyring_backend))
        } else {
            warn!(
                "secure storage backend unavailable; credential reads fall back to ${}",
                env_fallback
            );
            None
        };
        Self {
            backend,
            env_fallback: env_fallback.to_string(),
        }
    }

    /// Build a store over an explicit backend (tests, alternate platforms)
    pub fn with_backend(backend: Box<dyn SecretBackend>, env_fallback: &str) -> Self {
        Self {
            backend: Some(backend),
            env_fallback: env_fallback.to_string(),
        }
    }

    /// Build a store with no backend at all, exercising the fallback path
    pub fn without_backend(env_fallback: &str) -> Self {
        Self {
            backend: None,
            env_fallback: env_fallback.to_string(),
        }
    }

    /// Store the credential. Returns false (and logs a warning) when the
    /// backend is unavailable or the write fails; never panics.
    pub fn store(&self, secret: &str) -> bool {
        match &self.backend {
            Some(backend) => match backend.save(secret) {
                Ok(()) => true,
                Err(e) => {
                    warn!("failed to store credential: {e}");
                    false
                }
            },
            None => {
                warn!("cannot store credential: secure storage backend unavailable");
                false
            }
        }
    }

    /// Retrieve the credential: backend first, then the environment
    /// fallback. Returns None when neither holds a value.
    pub fn retrieve(&self) -> Option<String> {
        if let Some(backend) = &self.backend {
            match backend.load() {
                Ok(Some(secret)) => return Some(secret),
                Ok(None) => {}
                Err(e) => warn!("failed to read credential from backend: {e}"),
            }
        }
        std::env::var(&self.env_fallback)
            .ok()
            .filter(|value| !value.is_empty())
    }

    /// Delete the credential. Absence is not an error: returns false when
    /// there was nothing to delete.
    pub fn delete(&self) -> bool {
        match &self.backend {
            Some(backend) => match backend.delete() {
                Ok(removed) => removed,
                Err(e) => {
                    warn!("failed to delete credential: {e}");
                    false
                }
            },
            None => false,
        }
    }

    /// Whether the secure-storage mechanism initialized, independent of
    /// whether a secret is currently present.
    pub fn is_backend_available(&self) -> bool {
        self.backend.is_some()
    }
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new()
    }
}
