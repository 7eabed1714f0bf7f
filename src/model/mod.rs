mod algorithm;
mod certificate;
mod collection;
mod envelope;
mod install;
mod pin;
mod selector;
mod signer;
mod store;
mod thumbprint;
mod verification;

pub use algorithm::{AlgorithmError, DigestAlgorithm, KeyAlgorithm, SignatureAlgorithm};
pub use certificate::{Certificate, CertificateError, CertificateInfo, KeyRef};
pub use collection::CertificateCollection;
pub use envelope::{
    signed_file_name, unwrapped_file_name, SignatureEnvelope, SignatureMode, SIGNATURE_EXTENSION,
};
pub use install::KeyContainer;
pub use pin::{Pin, PinError};
pub use selector::{CertificateSelector, SelectorError};
pub use signer::{AssuranceMode, SignerContext};
pub use store::{StoreLocation, StoreName, StoreScope};
pub use thumbprint::{Thumbprint, ThumbprintError};
pub use verification::{FailureReason, VerificationResult};
