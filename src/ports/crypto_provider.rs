//! CryptoProvider trait - the single seam to the signing backend

use crate::error::{SignError, StoreError, VerifyError};
use crate::model::{Certificate, KeyRef, Pin, SignatureAlgorithm};

/// Raw signature primitives and trust decisions.
///
/// Implementations hold the private keys; callers only ever see `KeyRef`s.
pub trait CryptoProvider {
    /// Short provider name for logs and the info endpoint
    fn name(&self) -> &str;

    /// Sign `data` with the key behind `key`
    ///
    /// # Arguments
    ///
    /// * `algorithm` - Signature algorithm; the provider hashes `data` itself
    /// * `key` - Handle of the private key
    /// * `pin` - PIN unlocking the key, if it is protected
    /// * `data` - Bytes to sign (DER of the signed attributes)
    ///
    /// # Returns
    ///
    /// The encoded signature value (DER `ECDSA-Sig-Value` or raw PKCS#1 v1.5)
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The key is protected and no PIN was given (`PinRequired`)
    /// - The PIN is wrong (`PinIncorrect`)
    /// - The key is missing or unusable (`ProviderFailure`)
    fn sign(
        &self,
        algorithm: SignatureAlgorithm,
        key: &KeyRef,
        pin: Option<&Pin>,
        data: &[u8],
    ) -> Result<Vec<u8>, SignError>;

    /// Check a signature over `data` with the certificate's public key
    ///
    /// Returns `Ok(false)` for a well-formed but wrong signature.
    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        certificate: &Certificate,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, VerifyError>;

    /// Whether the certificate is currently valid and chains to a trusted root
    ///
    /// # Errors
    ///
    /// Returns the `StoreError` of a root store that could not be read
    /// (busy, access denied, I/O). That is never reported as "untrusted".
    fn verify_chain(&self, certificate: &Certificate) -> Result<bool, StoreError>;
}
