//! Ключи доступа к провайдеру синтеза речи

pub mod pool;

pub use pool::{Credential, CredentialPool, CredentialStatus, parse_credentials};
