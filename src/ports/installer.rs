//! CertificateInstaller trait - capability to add material to the stores

use crate::error::InstallError;
use crate::model::{KeyContainer, Pin, Thumbprint};

pub trait CertificateInstaller {
    /// Add root certificates to the trusted root store
    ///
    /// # Arguments
    ///
    /// * `material` - DER or PEM certificate, or a PKCS#7 certificate bag
    ///
    /// # Returns
    ///
    /// Thumbprints of every certificate in `material`, including ones that
    /// were already installed
    fn install_root_certificate(&self, material: &[u8]) -> Result<Vec<Thumbprint>, InstallError>;

    /// Add a certificate with its private key to the personal store
    ///
    /// # Arguments
    ///
    /// * `bundle` - Raw container bytes
    /// * `container` - How `bundle` is packaged
    /// * `pin` - PIN protecting the key in the bundle, if any
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The container format is not supported
    /// - The bundle lacks a certificate or key, or the key does not match
    /// - The key is encrypted and the PIN is missing or wrong
    fn install_private_key(
        &self,
        bundle: &[u8],
        container: KeyContainer,
        pin: Option<&Pin>,
    ) -> Result<Thumbprint, InstallError>;
}
