//! In-memory backend for tests, with scriptable failures

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use super::chain;
use super::material;
use super::soft_crypto::{self, UnlockError};
use crate::error::{InstallError, SignError, StoreError, VerifyError};
use crate::model::{
    Certificate, CertificateCollection, KeyContainer, KeyRef, Pin, SignatureAlgorithm,
    StoreLocation, StoreName, StoreScope, Thumbprint,
};
use crate::ports::{CertificateInstaller, CryptoProvider, TrustStore};

#[derive(Debug, Clone)]
struct FakeEntry {
    certificate: Certificate,
    key: Option<(bool, Vec<u8>)>,
}

#[derive(Debug, Default)]
pub struct FakeStore {
    stores: Mutex<HashMap<StoreLocation, Vec<FakeEntry>>>,
    open_failure: Option<StoreError>,
    roots_failure: Option<StoreError>,
    sign_delay: Option<Duration>,
    install_delay: Option<Duration>,
    sign_calls: AtomicUsize,
    open_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` fails with `error`
    pub fn failing_open(error: StoreError) -> Self {
        Self {
            open_failure: Some(error),
            ..Self::default()
        }
    }

    /// Every chain check fails with `error`, as if the root store were unreadable
    pub fn with_roots_failure(mut self, error: StoreError) -> Self {
        self.roots_failure = Some(error);
        self
    }

    /// Every `sign` blocks for `delay` first
    pub fn with_sign_delay(mut self, delay: Duration) -> Self {
        self.sign_delay = Some(delay);
        self
    }

    /// Every install blocks for `delay` first
    pub fn with_install_delay(mut self, delay: Duration) -> Self {
        self.install_delay = Some(delay);
        self
    }

    /// Trusted root plus one unprotected signer
    pub fn with_signer(self, cert_pem: &str, key_pem: &str) -> Self {
        self.install_root_certificate(super::fixtures::ROOT_CA_DER)
            .unwrap();
        self.install_private_key(
            &super::fixtures::bundle(cert_pem, key_pem),
            KeyContainer::PemBundle,
            None,
        )
        .unwrap();
        self
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    fn insert(&self, location: StoreLocation, entry: FakeEntry) {
        let mut stores = self.stores.lock().unwrap();
        let entries = stores.entry(location).or_default();
        if !entries
            .iter()
            .any(|e| e.certificate.thumbprint() == entry.certificate.thumbprint())
        {
            entries.push(entry);
        }
    }

    fn snapshot(&self, location: StoreLocation) -> Vec<Certificate> {
        let stores = self.stores.lock().unwrap();
        stores
            .get(&location)
            .map(|entries| entries.iter().map(|e| e.certificate.clone()).collect())
            .unwrap_or_default()
    }
}

impl TrustStore for FakeStore {
    fn open(&self, scope: StoreScope, name: StoreName) -> Result<CertificateCollection, StoreError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.open_failure {
            return Err(err.clone());
        }
        let location = StoreLocation::new(scope, name);
        Ok(CertificateCollection::new(location, self.snapshot(location)))
    }
}

impl CryptoProvider for FakeStore {
    fn name(&self) -> &str {
        "fake"
    }

    fn sign(
        &self,
        algorithm: SignatureAlgorithm,
        key: &KeyRef,
        pin: Option<&Pin>,
        data: &[u8],
    ) -> Result<Vec<u8>, SignError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.sign_delay {
            thread::sleep(delay);
        }

        let (encrypted, der) = {
            let stores = self.stores.lock().unwrap();
            stores
                .get(&key.location)
                .and_then(|entries| {
                    entries
                        .iter()
                        .find(|e| e.certificate.thumbprint() == &key.thumbprint)
                })
                .and_then(|e| e.key.clone())
                .ok_or_else(|| SignError::ProviderFailure {
                    reason: format!("no key {}", key.thumbprint),
                })?
        };

        let pkcs8 = soft_crypto::unlock(encrypted, &der, pin).map_err(|e| match e {
            UnlockError::PinRequired => SignError::PinRequired,
            UnlockError::PinIncorrect => SignError::PinIncorrect,
        })?;
        soft_crypto::sign(algorithm, &pkcs8, data)
            .map_err(|reason| SignError::ProviderFailure { reason })
    }

    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        certificate: &Certificate,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, VerifyError> {
        Ok(soft_crypto::verify(
            algorithm,
            certificate.spki_der(),
            data,
            signature,
        ))
    }

    fn verify_chain(&self, certificate: &Certificate) -> Result<bool, StoreError> {
        if let Some(err) = &self.roots_failure {
            return Err(err.clone());
        }
        let roots: Vec<Certificate> = StoreScope::ALL
            .into_iter()
            .flat_map(|scope| self.snapshot(StoreLocation::root(scope)))
            .collect();
        Ok(chain::is_trusted(certificate, &roots, Utc::now()))
    }
}

impl CertificateInstaller for FakeStore {
    fn install_root_certificate(&self, material: &[u8]) -> Result<Vec<Thumbprint>, InstallError> {
        if let Some(delay) = self.install_delay {
            thread::sleep(delay);
        }
        let certs = material::parse_root_material(material)?;
        let location = StoreLocation::root(StoreScope::CurrentUser);
        Ok(certs
            .into_iter()
            .map(|certificate| {
                let thumbprint = certificate.thumbprint().clone();
                self.insert(
                    location,
                    FakeEntry {
                        certificate,
                        key: None,
                    },
                );
                thumbprint
            })
            .collect())
    }

    fn install_private_key(
        &self,
        bundle: &[u8],
        container: KeyContainer,
        pin: Option<&Pin>,
    ) -> Result<Thumbprint, InstallError> {
        if let Some(delay) = self.install_delay {
            thread::sleep(delay);
        }
        let bundle = material::parse_key_bundle(bundle, container, pin)?;
        let location = StoreLocation::personal(StoreScope::CurrentUser);
        let thumbprint = bundle.certificate.thumbprint().clone();
        let key = KeyRef {
            location,
            thumbprint: thumbprint.clone(),
        };
        self.insert(
            location,
            FakeEntry {
                certificate: bundle.certificate.with_private_key(key, bundle.encrypted),
                key: Some((bundle.encrypted, bundle.key_der)),
            },
        );
        Ok(thumbprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::backend_contract;

    contract_tests_for!(
        fake_store_contract,
        make = || ((), FakeStore::new()),
        tests = {
            test_fresh_personal_store_is_empty => backend_contract::test_fresh_personal_store_is_empty,
            test_installed_key_is_listed => backend_contract::test_installed_key_is_listed,
            test_index_follows_install_order => backend_contract::test_index_follows_install_order,
            test_install_root_is_idempotent => backend_contract::test_install_root_is_idempotent,
            test_install_root_from_p7b => backend_contract::test_install_root_from_p7b,
            test_install_key_is_idempotent => backend_contract::test_install_key_is_idempotent,
            test_install_encrypted_key_requires_pin => backend_contract::test_install_encrypted_key_requires_pin,
            test_install_rejects_foreign_key => backend_contract::test_install_rejects_foreign_key,
            test_install_pfx_unsupported => backend_contract::test_install_pfx_unsupported,
            test_sign_and_verify => backend_contract::test_sign_and_verify,
            test_sign_pin_handling => backend_contract::test_sign_pin_handling,
            test_verify_chain => backend_contract::test_verify_chain,
        }
    );

    #[test]
    fn test_failing_open() {
        let store = FakeStore::failing_open(StoreError::AccessDenied {
            store: "current_user/my".to_string(),
        });
        assert!(matches!(
            store.open(StoreScope::CurrentUser, StoreName::My),
            Err(StoreError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_with_signer_counts_calls() {
        let store = FakeStore::new().with_signer(fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY);
        let collection = store.open(StoreScope::CurrentUser, StoreName::My).unwrap();
        let cert = collection.item(1).unwrap();
        store
            .sign(
                SignatureAlgorithm::EcdsaSha256,
                cert.key().unwrap(),
                None,
                b"x",
            )
            .unwrap();
        assert_eq!(store.sign_calls(), 1);
    }
}
