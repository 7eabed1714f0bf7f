//! Install use cases: trusted roots and signing keys

use std::path::Path;

use tracing::info;

use crate::error::InstallError;
use crate::model::{KeyContainer, Pin, Thumbprint};
use crate::ports::CertificateInstaller;

/// Add every certificate in `material` to the root store
pub fn install_root_certificate<I>(installer: &I, material: &[u8]) -> Result<Vec<Thumbprint>, InstallError>
where
    I: CertificateInstaller + ?Sized,
{
    let thumbprints = installer.install_root_certificate(material)?;
    info!(count = thumbprints.len(), "Installed root certificates");
    Ok(thumbprints)
}

/// Install a key bundle, picking the container from the file extension
///
/// # Errors
///
/// `UnsupportedFormat` for extensions other than `.pem`, `.key`, `.pfx`
/// and `.p12`, plus anything the installer reports.
pub fn install_private_key<I>(
    installer: &I,
    file_name: &str,
    bundle: &[u8],
    pin: Option<&Pin>,
) -> Result<Thumbprint, InstallError>
where
    I: CertificateInstaller + ?Sized,
{
    let container =
        KeyContainer::from_file_name(file_name).ok_or_else(|| InstallError::UnsupportedFormat {
            format: Path::new(file_name)
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.to_string()),
        })?;
    let thumbprint = installer.install_private_key(bundle, container, pin)?;
    info!(%thumbprint, container = container.name(), "Installed private key");
    Ok(thumbprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake_store::FakeStore;
    use crate::adapters::fixtures;
    use crate::model::{StoreName, StoreScope};
    use crate::ports::TrustStore;

    #[test]
    fn test_install_pem_bundle() {
        let store = FakeStore::new();
        let bundle = fixtures::bundle(fixtures::SIGNER_RSA_CERT, fixtures::SIGNER_RSA_KEY);
        let thumbprint = install_private_key(&store, "petrov.pem", &bundle, None).unwrap();

        let collection = store.open(StoreScope::CurrentUser, StoreName::My).unwrap();
        assert_eq!(collection.item(1).unwrap().thumbprint(), &thumbprint);
    }

    #[test]
    fn test_unknown_extension() {
        let store = FakeStore::new();
        let err = install_private_key(&store, "keys.zip", b"PK", None).unwrap_err();
        assert_eq!(
            err,
            InstallError::UnsupportedFormat {
                format: "zip".to_string()
            }
        );
    }

    #[test]
    fn test_pfx_unsupported() {
        let store = FakeStore::new();
        let err = install_private_key(&store, "signer.PFX", b"\x30\x00", None).unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_install_root_bundle() {
        let store = FakeStore::new();
        let thumbprints = install_root_certificate(&store, fixtures::ROOT_CA_P7B).unwrap();
        assert_eq!(thumbprints.len(), 1);
    }
}
