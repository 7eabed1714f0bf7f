//! Ports (traits) for trust store and crypto provider access
//!
//! The engine depends on these abstractions, never on a concrete backend.
//! A backend that offers all three is a [`SigningBackend`].

mod crypto_provider;
mod installer;
mod trust_store;

pub use crypto_provider::CryptoProvider;
pub use installer::CertificateInstaller;
pub use trust_store::TrustStore;

/// Combined trait for everything the signing service needs
pub trait SigningBackend: TrustStore + CryptoProvider + CertificateInstaller {}

// Blanket implementation for types that implement all capability traits
impl<T> SigningBackend for T where T: TrustStore + CryptoProvider + CertificateInstaller {}
