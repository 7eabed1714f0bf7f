//! Error types for cadesign
//!
//! This module defines the error hierarchy for all cadesign operations.
//! Every stage of the engine (store access, certificate lookup, signing,
//! verification, installation) has its own enum so callers can tell
//! "no certificates installed" apart from "cannot reach the trust store".
//! Errors use thiserror for implementation.

use thiserror::Error;

/// Result type alias for cadesign operations
///
/// This is a convenience alias for `Result<T, CadesError>`.
pub type CadesResult<T> = Result<T, CadesError>;

/// Top-level error type for all cadesign operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CadesError {
    /// Trust store could not be opened
    #[error("Trust store error: {0}")]
    Store(#[from] StoreError),

    /// Certificate could not be resolved from an opened store
    #[error("Certificate lookup error: {0}")]
    Locate(#[from] LocateError),

    /// Signature could not be produced
    #[error("Signing error: {0}")]
    Sign(#[from] SignError),

    /// Signature envelope could not be checked
    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    /// Certificate or key material could not be installed
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Domain validation errors
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),
}

impl CadesError {
    /// Stable taxonomy name of the innermost error, used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            CadesError::Store(e) => e.kind(),
            CadesError::Locate(e) => e.kind(),
            CadesError::Sign(e) => e.kind(),
            CadesError::Verify(e) => e.kind(),
            CadesError::Install(e) => e.kind(),
            CadesError::Config(e) => e.kind(),
            CadesError::Domain(_) => "InvalidInput",
        }
    }
}

/// Trust store access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The platform refused access to the store
    #[error("access to store {store} denied")]
    AccessDenied { store: String },

    /// The named store does not exist
    #[error("store {store} does not exist")]
    NotFound { store: String },

    /// The store is held exclusively by an install in progress
    #[error("store {store} is busy, an install is in progress")]
    Busy { store: String },

    /// Any other platform failure while reading the store
    #[error("store {store} I/O failure: {reason}")]
    Io { store: String, reason: String },
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::AccessDenied { .. } => "AccessDenied",
            StoreError::NotFound { .. } => "StoreNotFound",
            StoreError::Busy { .. } => "Busy",
            StoreError::Io { .. } => "StoreIo",
        }
    }
}

/// Certificate lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// The store opened fine but holds no certificates
    #[error("store {store} contains no certificates")]
    EmptyStore { store: String },

    /// Index outside `1..=count`
    #[error("certificate index {index} out of range 1..={count}")]
    IndexOutOfRange { index: usize, count: usize },

    /// No certificate matched the criterion
    #[error("no certificate matching {criterion}")]
    NotFound { criterion: String },
}

impl LocateError {
    pub fn kind(&self) -> &'static str {
        match self {
            LocateError::EmptyStore { .. } => "EmptyStore",
            LocateError::IndexOutOfRange { .. } => "IndexOutOfRange",
            LocateError::NotFound { .. } => "CertificateNotFound",
        }
    }
}

/// Signing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    /// Certificate is expired, not yet valid or not chained to a trusted root
    #[error("signing certificate is not trusted: {reason}")]
    UntrustedCertificate { reason: String },

    /// The private key is PIN-protected and no PIN was supplied
    #[error("private key is PIN-protected, a PIN is required")]
    PinRequired,

    /// A PIN was supplied but the provider rejected it
    #[error("PIN rejected by the cryptographic provider")]
    PinIncorrect,

    /// The provider did not answer in time
    #[error("signing timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The provider failed for any other reason
    #[error("cryptographic provider failure: {reason}")]
    ProviderFailure { reason: String },
}

impl SignError {
    pub fn kind(&self) -> &'static str {
        match self {
            SignError::UntrustedCertificate { .. } => "UntrustedCertificate",
            SignError::PinRequired => "PinRequired",
            SignError::PinIncorrect => "PinIncorrect",
            SignError::Timeout { .. } => "Timeout",
            SignError::ProviderFailure { .. } => "ProviderFailure",
        }
    }
}

/// Verification errors
///
/// A signature that simply does not verify is not an error; see
/// [`crate::model::VerificationResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Envelope could not be parsed as a CAdES-BES structure
    #[error("malformed signature envelope: {reason}")]
    Malformed { reason: String },

    /// Detached envelope verified without the original document
    #[error("detached signature requires the original document")]
    MissingOriginal,

    /// The provider did not answer in time
    #[error("verification timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The provider failed for any other reason
    #[error("cryptographic provider failure: {reason}")]
    ProviderFailure { reason: String },

    /// Trusted roots could not be read for the chain check
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VerifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Malformed { .. } => "Malformed",
            VerifyError::MissingOriginal => "MissingOriginal",
            VerifyError::Store(e) => e.kind(),
            VerifyError::Timeout { .. } => "Timeout",
            VerifyError::ProviderFailure { .. } => "ProviderFailure",
        }
    }
}

/// Certificate / private key installation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// Container or file format is not accepted
    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Material parsed but is unusable (no certificate, no key, bad PIN...)
    #[error("invalid material: {reason}")]
    InvalidMaterial { reason: String },

    /// Private key does not belong to the bundled certificate
    #[error("private key does not match the certificate public key")]
    KeyMismatch,

    /// Encrypted key bundle installed without a PIN
    #[error("encrypted key bundle requires a PIN")]
    PinRequired,

    /// Target store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl InstallError {
    pub fn kind(&self) -> &'static str {
        match self {
            InstallError::UnsupportedFormat { .. } => "UnsupportedFormat",
            InstallError::InvalidMaterial { .. } => "InvalidMaterial",
            InstallError::KeyMismatch => "KeyMismatch",
            InstallError::PinRequired => "PinRequired",
            InstallError::Store(e) => e.kind(),
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse configuration: {reason}")]
    Parse { reason: String },
}

impl ConfigError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "ConfigRead",
            ConfigError::Parse { .. } => "ConfigParse",
        }
    }
}

/// Domain validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// PIN validation error
    #[error("PIN validation error: {0}")]
    Pin(#[from] crate::model::PinError),

    /// Thumbprint validation error
    #[error("Thumbprint error: {0}")]
    Thumbprint(#[from] crate::model::ThumbprintError),

    /// Certificate selector error
    #[error("Selector error: {0}")]
    Selector(#[from] crate::model::SelectorError),

    /// Certificate parsing error
    #[error("Certificate error: {0}")]
    Certificate(#[from] crate::model::CertificateError),
}

/// Convert model errors to CadesError (via DomainError)
impl From<crate::model::PinError> for CadesError {
    fn from(err: crate::model::PinError) -> Self {
        CadesError::Domain(DomainError::Pin(err))
    }
}

impl From<crate::model::ThumbprintError> for CadesError {
    fn from(err: crate::model::ThumbprintError) -> Self {
        CadesError::Domain(DomainError::Thumbprint(err))
    }
}

impl From<crate::model::SelectorError> for CadesError {
    fn from(err: crate::model::SelectorError) -> Self {
        CadesError::Domain(DomainError::Selector(err))
    }
}

impl From<crate::model::CertificateError> for CadesError {
    fn from(err: crate::model::CertificateError) -> Self {
        CadesError::Domain(DomainError::Certificate(err))
    }
}
