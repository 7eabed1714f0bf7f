//! Verify and unwrap use cases

use serde::Serialize;
use tracing::{debug, info};

use crate::error::VerifyError;
use crate::logic::cades;
use crate::model::{unwrapped_file_name, FailureReason, SignatureEnvelope, VerificationResult};
use crate::ports::CryptoProvider;

/// Check an envelope.
///
/// Steps run in a fixed order: parse, content digest, signing-certificate
/// hash, signature value, then signer validity and trust. The first failing
/// step decides the reason.
///
/// # Errors
///
/// - `Malformed` when the envelope cannot be decoded
/// - `MissingOriginal` for a detached envelope without `original`
/// - `Store` when the trusted roots cannot be read
///
/// A signature that does not check out is not an error: the result has
/// `valid == false` and a [`FailureReason`].
pub fn verify_envelope<P>(
    provider: &P,
    envelope: &SignatureEnvelope,
    original: Option<&[u8]>,
) -> Result<VerificationResult, VerifyError>
where
    P: CryptoProvider + ?Sized,
{
    let parsed = cades::parse_envelope(envelope.as_bytes())?;
    let mode = parsed.mode();
    let signer = &parsed.signer;
    debug!(
        signer = signer.subject(),
        mode = ?mode,
        "Parsed signature envelope"
    );

    let content: &[u8] = match (parsed.content.as_deref(), original) {
        (None, None) => return Err(VerifyError::MissingOriginal),
        (None, Some(original)) => original,
        (Some(embedded), _) => embedded,
    };

    let reject = |reason: FailureReason| {
        info!(signer = signer.subject(), reason = ?reason, "Signature rejected");
        Ok(VerificationResult::rejected(
            reason,
            signer.subject().to_string(),
            Some(signer.thumbprint().clone()),
            parsed.signing_time,
            mode,
        ))
    };

    if let (Some(embedded), Some(original)) = (parsed.content.as_deref(), original) {
        if embedded != original {
            return reject(FailureReason::DigestMismatch);
        }
    }
    if parsed.digest_algorithm.digest(content) != parsed.message_digest {
        return reject(FailureReason::DigestMismatch);
    }
    if let Some((algorithm, hash)) = &parsed.signing_cert_hash {
        if algorithm.digest(signer.der()) != *hash {
            return reject(FailureReason::DigestMismatch);
        }
    }
    if !provider.verify(
        parsed.signature_algorithm,
        signer,
        &parsed.signed_attrs_der,
        &parsed.signature,
    )? {
        return reject(FailureReason::DigestMismatch);
    }
    if !signer.is_currently_valid() || !provider.verify_chain(signer)? {
        return reject(FailureReason::UntrustedSigner);
    }

    info!(signer = signer.subject(), "Signature verified");
    Ok(VerificationResult::verified(
        content.to_vec(),
        signer.subject().to_string(),
        signer.thumbprint().clone(),
        parsed.signing_time,
        mode,
    ))
}

/// Verification result plus the name to save recovered content under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnwrapOutcome {
    #[serde(flatten)]
    pub result: VerificationResult,
    pub filename: String,
}

/// Verify an enveloping signature and hand back its content.
///
/// Detached envelopes carry nothing to unwrap and fail with
/// `MissingOriginal`.
pub fn unwrap_envelope<P>(
    provider: &P,
    envelope: &SignatureEnvelope,
    file_name: &str,
) -> Result<UnwrapOutcome, VerifyError>
where
    P: CryptoProvider + ?Sized,
{
    let result = verify_envelope(provider, envelope, None)?;
    Ok(UnwrapOutcome {
        result,
        filename: unwrapped_file_name(file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake_store::FakeStore;
    use crate::adapters::fixtures;
    use crate::error::StoreError;
    use crate::model::{CertificateSelector, SignatureMode, StoreScope};
    use crate::ports::CertificateInstaller;
    use crate::use_cases::{sign_document, SignRequest};

    fn signed(store: &FakeStore, detached: bool) -> SignatureEnvelope {
        let request = SignRequest::new(
            b"hello".to_vec(),
            "hello.txt",
            CertificateSelector::Index(1),
        )
        .detached(detached);
        sign_document(store, StoreScope::CurrentUser, &request)
            .unwrap()
            .envelope
    }

    fn signer_store() -> FakeStore {
        FakeStore::new().with_signer(fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY)
    }

    /// Flip the last byte of the DER, which sits inside the signature value
    fn tamper_signature(envelope: &SignatureEnvelope) -> SignatureEnvelope {
        let mut bytes = envelope.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        SignatureEnvelope::from_der(bytes)
    }

    #[test]
    fn test_detached_roundtrip() {
        let store = signer_store();
        let envelope = signed(&store, true);

        let result = verify_envelope(&store, &envelope, Some(b"hello")).unwrap();
        assert!(result.valid);
        assert_eq!(result.recovered_content, b"hello");
        assert!(result.signer_subject.contains("Ivan Petrov"));
        assert!(result.signing_time.is_some());
        assert_eq!(result.mode, SignatureMode::Detached);
    }

    #[test]
    fn test_detached_without_original() {
        let store = signer_store();
        let envelope = signed(&store, true);
        assert_eq!(
            verify_envelope(&store, &envelope, None).unwrap_err(),
            VerifyError::MissingOriginal
        );
    }

    #[test]
    fn test_detached_wrong_original() {
        let store = signer_store();
        let envelope = signed(&store, true);
        let result = verify_envelope(&store, &envelope, Some(b"hellO")).unwrap();
        assert!(!result.valid);
        assert_eq!(result.failure_reason, Some(FailureReason::DigestMismatch));
        assert!(result.recovered_content.is_empty());
    }

    #[test]
    fn test_enveloping_with_differing_original() {
        let store = signer_store();
        let envelope = signed(&store, false);
        let result = verify_envelope(&store, &envelope, Some(b"other")).unwrap();
        assert_eq!(result.failure_reason, Some(FailureReason::DigestMismatch));
    }

    #[test]
    fn test_signing_twice_both_verify() {
        let store = signer_store();
        for envelope in [signed(&store, false), signed(&store, false)] {
            assert!(verify_envelope(&store, &envelope, None).unwrap().valid);
        }
    }

    #[test]
    fn test_tampered_signature_is_digest_mismatch() {
        let store = signer_store();
        let envelope = tamper_signature(&signed(&store, true));
        let result = verify_envelope(&store, &envelope, Some(b"hello")).unwrap();
        assert!(!result.valid);
        assert_eq!(result.failure_reason, Some(FailureReason::DigestMismatch));
    }

    #[test]
    fn test_untrusted_signer_is_distinct() {
        let store = signer_store();
        let envelope = signed(&store, false);

        // the verifier does not know the root
        let verifier = FakeStore::new();
        let result = verify_envelope(&verifier, &envelope, None).unwrap();
        assert!(!result.valid);
        assert_eq!(result.failure_reason, Some(FailureReason::UntrustedSigner));

        verifier
            .install_root_certificate(fixtures::ROOT_CA_CERT.as_bytes())
            .unwrap();
        assert!(verify_envelope(&verifier, &envelope, None).unwrap().valid);
    }

    #[test]
    fn test_every_corrupted_byte_fails_closed() {
        let signers = [
            (fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY),
            (fixtures::SIGNER_RSA_CERT, fixtures::SIGNER_RSA_KEY),
        ];
        for (cert, key) in signers {
            let store = FakeStore::new().with_signer(cert, key);
            for detached in [true, false] {
                let envelope = signed(&store, detached);
                assert!(verify_envelope(&store, &envelope, Some(b"hello")).unwrap().valid);

                for offset in 0..envelope.as_bytes().len() {
                    let mut bytes = envelope.as_bytes().to_vec();
                    bytes[offset] ^= 0x01;
                    let corrupted = SignatureEnvelope::from_der(bytes);
                    if let Ok(result) = verify_envelope(&store, &corrupted, Some(b"hello")) {
                        assert!(
                            !result.valid,
                            "byte {offset} of a {} envelope (detached: {detached}) flipped, still valid",
                            result.signer_subject
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_unreadable_root_store_is_an_error() {
        let store = signer_store();
        let envelope = signed(&store, false);

        let denied = StoreError::AccessDenied {
            store: "current_user/root".to_string(),
        };
        let verifier = FakeStore::new()
            .with_signer(fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY)
            .with_roots_failure(denied.clone());
        assert_eq!(
            verify_envelope(&verifier, &envelope, None).unwrap_err(),
            VerifyError::Store(denied)
        );
    }

    #[test]
    fn test_malformed_envelope() {
        let store = signer_store();
        let garbage = SignatureEnvelope::from_der(vec![0x30, 0x02, 0x05, 0x00]);
        assert!(matches!(
            verify_envelope(&store, &garbage, Some(b"hello")),
            Err(VerifyError::Malformed { .. })
        ));

        let truncated = signed(&store, false).as_bytes()[..40].to_vec();
        assert!(matches!(
            verify_envelope(&store, &SignatureEnvelope::from_der(truncated), None),
            Err(VerifyError::Malformed { .. })
        ));
    }

    #[test]
    fn test_unwrap() {
        let store = signer_store();
        let outcome = unwrap_envelope(&store, &signed(&store, false), "hello.txt.sig").unwrap();
        assert!(outcome.result.valid);
        assert_eq!(outcome.result.recovered_content, b"hello");
        assert_eq!(outcome.filename, "hello.txt");

        assert_eq!(
            unwrap_envelope(&store, &signed(&store, true), "hello.txt.sig").unwrap_err(),
            VerifyError::MissingOriginal
        );
    }
}
