pub mod store;

pub use store::{KeyringBackend, MemoryBackend, SecretBackend, SecretError, SecretStore};
