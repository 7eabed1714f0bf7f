use chrono::{DateTime, Utc};
use tracing::debug;

use super::soft_crypto;
use crate::model::Certificate;

/// Trust decision for the software provider.
///
/// A certificate is trusted when it is valid at `now` and is either one
/// of the `roots` itself or carries a signature from a valid root whose
/// subject equals its issuer. Intermediate CAs are not followed.
pub(crate) fn is_trusted(cert: &Certificate, roots: &[Certificate], now: DateTime<Utc>) -> bool {
    if !cert.is_valid_at(now) {
        debug!(subject = cert.subject(), "Certificate outside its validity period");
        return false;
    }
    if roots.iter().any(|root| root.der() == cert.der()) {
        return true;
    }

    let Some(algorithm) = cert.signature_algorithm() else {
        debug!(subject = cert.subject(), "Unsupported certificate signature algorithm");
        return false;
    };

    roots
        .iter()
        .filter(|root| root.subject_der() == cert.issuer_der())
        .filter(|root| root.is_valid_at(now))
        .any(|root| {
            soft_crypto::verify(algorithm, root.spki_der(), cert.tbs_der(), cert.signature())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures;

    fn roots() -> Vec<Certificate> {
        vec![Certificate::from_pem(fixtures::ROOT_CA_CERT).unwrap()]
    }

    #[test]
    fn test_issued_by_root() {
        let cert = Certificate::from_pem(fixtures::SIGNER_RSA_CERT).unwrap();
        assert!(is_trusted(&cert, &roots(), Utc::now()));
    }

    #[test]
    fn test_root_trusts_itself() {
        let root = Certificate::from_pem(fixtures::ROOT_CA_CERT).unwrap();
        assert!(is_trusted(&root, &roots(), Utc::now()));
    }

    #[test]
    fn test_untrusted_and_expired() {
        let untrusted = Certificate::from_pem(fixtures::UNTRUSTED_CERT).unwrap();
        let expired = Certificate::from_pem(fixtures::EXPIRED_CERT).unwrap();
        assert!(!is_trusted(&untrusted, &roots(), Utc::now()));
        assert!(!is_trusted(&expired, &roots(), Utc::now()));
    }

    #[test]
    fn test_no_roots() {
        let cert = Certificate::from_pem(fixtures::SIGNER_P256_CERT).unwrap();
        assert!(!is_trusted(&cert, &[], Utc::now()));
    }
}
