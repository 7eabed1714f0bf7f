//! File-system implementation of the trust store and crypto provider ports
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<current_user|local_machine>/<my|root>/<SEQ>_<THUMBPRINT>.crt
//! <root>/<current_user|local_machine>/<my|root>/<SEQ>_<THUMBPRINT>.key
//! ```
//!
//! `SEQ` is a zero-padded install counter, so directory order is install
//! order and collection indices stay stable between opens. Keys are stored
//! as PKCS#8 PEM, still encrypted when they were installed encrypted.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::chain;
use super::material::{self, KeyBundle};
use super::soft_crypto::{self, UnlockError, ENCRYPTED_PRIVATE_KEY_LABEL};
use crate::error::{InstallError, SignError, StoreError, VerifyError};
use crate::model::{
    Certificate, CertificateCollection, KeyContainer, KeyRef, Pin, SignatureAlgorithm,
    StoreLocation, StoreName, StoreScope, Thumbprint,
};
use crate::ports::{CertificateInstaller, CryptoProvider, TrustStore};

const CERT_EXT: &str = "crt";
const KEY_EXT: &str = "key";

/// Software trust store and crypto provider backed by a directory tree
#[derive(Debug)]
pub struct SoftStore {
    root: PathBuf,
    install_scope: StoreScope,
    busy_retries: u32,
    busy_backoff: Duration,
    locks: [RwLock<()>; 4],
}

impl SoftStore {
    pub const DEFAULT_BUSY_RETRIES: u32 = 3;
    pub const DEFAULT_BUSY_BACKOFF: Duration = Duration::from_millis(50);

    /// Store rooted at `root`; nothing is created until [`Self::ensure_layout`]
    /// or the first install
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            install_scope: StoreScope::CurrentUser,
            busy_retries: Self::DEFAULT_BUSY_RETRIES,
            busy_backoff: Self::DEFAULT_BUSY_BACKOFF,
            locks: Default::default(),
        }
    }

    /// Scope that installs write into
    pub fn with_install_scope(mut self, scope: StoreScope) -> Self {
        self.install_scope = scope;
        self
    }

    /// How long an open waits for a running install before reporting `Busy`
    pub fn with_busy_policy(mut self, retries: u32, backoff: Duration) -> Self {
        self.busy_retries = retries;
        self.busy_backoff = backoff;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every store directory that does not exist yet
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        for location in StoreLocation::all() {
            let dir = self.store_dir(location);
            fs::create_dir_all(&dir).map_err(|e| io_error(location, e))?;
        }
        debug!(root = %self.root.display(), "Store layout ready");
        Ok(())
    }

    fn store_dir(&self, location: StoreLocation) -> PathBuf {
        self.root
            .join(location.scope.dir_name())
            .join(location.name.dir_name())
    }

    fn lock(&self, location: StoreLocation) -> &RwLock<()> {
        let scope = match location.scope {
            StoreScope::CurrentUser => 0,
            StoreScope::LocalMachine => 2,
        };
        let name = match location.name {
            StoreName::My => 0,
            StoreName::Root => 1,
        };
        &self.locks[scope + name]
    }

    fn read_guard(&self, location: StoreLocation) -> Result<RwLockReadGuard<'_, ()>, StoreError> {
        let lock = self.lock(location);
        for attempt in 0..=self.busy_retries {
            match lock.try_read() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) if attempt < self.busy_retries => {
                    debug!(store = %location, attempt, "Store busy, retrying");
                    thread::sleep(self.busy_backoff);
                }
                Err(TryLockError::WouldBlock) => {}
            }
        }
        warn!(store = %location, "Store still busy after retries");
        Err(StoreError::Busy {
            store: location.to_string(),
        })
    }

    /// Exclusive access for installs; opens of the same store report `Busy`
    /// while the guard lives
    pub(crate) fn write_guard(&self, location: StoreLocation) -> RwLockWriteGuard<'_, ()> {
        self.lock(location)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// `.crt` files of a store in install order
    fn cert_files(&self, location: StoreLocation) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.store_dir(location);
        let entries = fs::read_dir(&dir).map_err(|e| io_error(location, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(location, e))?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CERT_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn load(&self, location: StoreLocation) -> Result<Vec<Certificate>, StoreError> {
        let mut certs = Vec::new();
        for path in self.cert_files(location)? {
            let pem = fs::read_to_string(&path).map_err(|e| io_error(location, e))?;
            let cert = match Certificate::from_pem(&pem) {
                Ok(cert) => cert,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable certificate");
                    continue;
                }
            };

            let key_path = path.with_extension(KEY_EXT);
            let cert = match fs::read_to_string(&key_path) {
                Ok(key_pem) => {
                    let key = KeyRef {
                        location,
                        thumbprint: cert.thumbprint().clone(),
                    };
                    let encrypted = key_pem.contains(ENCRYPTED_PRIVATE_KEY_LABEL);
                    cert.with_private_key(key, encrypted)
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => cert,
                Err(e) => return Err(io_error(location, e)),
            };
            certs.push(cert);
        }
        Ok(certs)
    }

    fn find(&self, location: StoreLocation, thumbprint: &Thumbprint) -> Option<PathBuf> {
        let suffix = format!("_{thumbprint}.{CERT_EXT}");
        self.cert_files(location).ok()?.into_iter().find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix))
        })
    }

    fn next_path(&self, location: StoreLocation, thumbprint: &Thumbprint) -> Result<PathBuf, StoreError> {
        let seq = self
            .cert_files(location)?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str()?.split('_').next()?.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        Ok(self
            .store_dir(location)
            .join(format!("{seq:06}_{thumbprint}.{CERT_EXT}")))
    }

    /// Write the certificate (and key) unless already present; returns
    /// whether anything was written
    fn store_entry(
        &self,
        location: StoreLocation,
        cert: &Certificate,
        key: Option<&KeyBundle>,
    ) -> Result<bool, StoreError> {
        fs::create_dir_all(self.store_dir(location)).map_err(|e| io_error(location, e))?;

        let mut written = false;
        let cert_path = match self.find(location, cert.thumbprint()) {
            Some(path) => path,
            None => {
                let path = self.next_path(location, cert.thumbprint())?;
                let pem = material::pem_encode("CERTIFICATE", cert.der())
                    .map_err(|reason| StoreError::Io { store: location.to_string(), reason })?;
                write_atomic(&path, pem.as_bytes(), false).map_err(|e| io_error(location, e))?;
                written = true;
                path
            }
        };

        if let Some(bundle) = key {
            let key_path = cert_path.with_extension(KEY_EXT);
            if !key_path.exists() {
                let pem = material::pem_encode(bundle.key_label(), &bundle.key_der)
                    .map_err(|reason| StoreError::Io { store: location.to_string(), reason })?;
                write_atomic(&key_path, pem.as_bytes(), true).map_err(|e| io_error(location, e))?;
                written = true;
            }
        }
        Ok(written)
    }

    fn read_key(&self, key: &KeyRef) -> Result<(bool, Vec<u8>), SignError> {
        let path = self
            .find(key.location, &key.thumbprint)
            .map(|p| p.with_extension(KEY_EXT))
            .ok_or_else(|| SignError::ProviderFailure {
                reason: format!("no certificate {} in {}", key.thumbprint, key.location),
            })?;
        let pem = fs::read_to_string(&path).map_err(|e| SignError::ProviderFailure {
            reason: format!("cannot read private key {}: {e}", path.display()),
        })?;
        let block = material::pem_blocks(&pem)
            .map_err(|reason| SignError::ProviderFailure { reason })?
            .into_iter()
            .next()
            .ok_or_else(|| SignError::ProviderFailure {
                reason: format!("empty private key file {}", path.display()),
            })?;
        Ok((block.label == ENCRYPTED_PRIVATE_KEY_LABEL, block.der))
    }

    /// Roots of every scope; a root store that was never created holds none,
    /// any other failure to read one is reported
    fn trusted_roots(&self) -> Result<Vec<Certificate>, StoreError> {
        let mut roots = Vec::new();
        for scope in StoreScope::ALL {
            let location = StoreLocation::root(scope);
            let _guard = self.read_guard(location)?;
            match self.load(location) {
                Ok(certs) => roots.extend(certs),
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(roots)
    }
}

impl TrustStore for SoftStore {
    fn open(&self, scope: StoreScope, name: StoreName) -> Result<CertificateCollection, StoreError> {
        let location = StoreLocation::new(scope, name);
        let _guard = self.read_guard(location)?;
        let certs = self.load(location)?;
        debug!(store = %location, count = certs.len(), "Opened store");
        Ok(CertificateCollection::new(location, certs))
    }
}

impl CryptoProvider for SoftStore {
    fn name(&self) -> &str {
        "software"
    }

    fn sign(
        &self,
        algorithm: SignatureAlgorithm,
        key: &KeyRef,
        pin: Option<&Pin>,
        data: &[u8],
    ) -> Result<Vec<u8>, SignError> {
        let (encrypted, der) = self.read_key(key)?;
        let pkcs8 = soft_crypto::unlock(encrypted, &der, pin).map_err(|e| match e {
            UnlockError::PinRequired => SignError::PinRequired,
            UnlockError::PinIncorrect => SignError::PinIncorrect,
        })?;
        debug!(thumbprint = %key.thumbprint, ?algorithm, "Signing with software key");
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
        Ok(chain::is_trusted(certificate, &self.trusted_roots()?, Utc::now()))
    }
}

impl CertificateInstaller for SoftStore {
    fn install_root_certificate(&self, material: &[u8]) -> Result<Vec<Thumbprint>, InstallError> {
        let certs = material::parse_root_material(material)?;
        let location = StoreLocation::root(self.install_scope);

        let _guard = self.write_guard(location);
        let mut thumbprints = Vec::with_capacity(certs.len());
        for cert in &certs {
            if self.store_entry(location, cert, None)? {
                info!(store = %location, subject = cert.subject(), "Installed root certificate");
            } else {
                debug!(store = %location, subject = cert.subject(), "Root certificate already installed");
            }
            thumbprints.push(cert.thumbprint().clone());
        }
        Ok(thumbprints)
    }

    fn install_private_key(
        &self,
        bundle: &[u8],
        container: KeyContainer,
        pin: Option<&Pin>,
    ) -> Result<Thumbprint, InstallError> {
        let bundle = material::parse_key_bundle(bundle, container, pin)?;
        let location = StoreLocation::personal(self.install_scope);

        let _guard = self.write_guard(location);
        if self.store_entry(location, &bundle.certificate, Some(&bundle))? {
            info!(
                store = %location,
                subject = bundle.certificate.subject(),
                pin_protected = bundle.encrypted,
                "Installed certificate with private key"
            );
        }
        Ok(bundle.certificate.thumbprint().clone())
    }
}

fn io_error(location: StoreLocation, e: io::Error) -> StoreError {
    let store = location.to_string();
    match e.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound { store },
        io::ErrorKind::PermissionDenied => StoreError::AccessDenied { store },
        _ => StoreError::Io {
            store,
            reason: e.to_string(),
        },
    }
}

/// Write through a sibling `.tmp` file and rename it into place
fn write_atomic(path: &Path, contents: &[u8], private: bool) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    match fs::remove_file(&tmp) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut file = create_file(&tmp, private)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)
}

/// New file, owner-only from the moment it exists when `private`
fn create_file(path: &Path, private: bool) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(if private { 0o600 } else { 0o644 });
    }
    #[cfg(not(unix))]
    let _ = private;
    options.open(path)
}
