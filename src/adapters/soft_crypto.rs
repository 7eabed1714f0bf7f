//! Software signature primitives over PKCS#8 keys and SPKI public keys
//!
//! Everything hashes up front and works on the prehash, so one digest
//! computation serves both ECDSA curves and every RSA hash.

use der::Decode;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncryptedPrivateKeyInfo};
use rsa::pkcs1v15::Pkcs1v15Sign;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use signature::hazmat::{PrehashSigner, PrehashVerifier};

use crate::model::{DigestAlgorithm, Pin, SignatureAlgorithm};

pub(crate) const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
pub(crate) const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// Why a stored key could not be unlocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnlockError {
    PinRequired,
    PinIncorrect,
}

/// Plain PKCS#8 DER for a stored key, decrypting it with `pin` if needed
pub(crate) fn unlock(encrypted: bool, der: &[u8], pin: Option<&Pin>) -> Result<Vec<u8>, UnlockError> {
    if !encrypted {
        return Ok(der.to_vec());
    }
    let pin = pin.ok_or(UnlockError::PinRequired)?;
    let info = EncryptedPrivateKeyInfo::from_der(der).map_err(|_| UnlockError::PinIncorrect)?;
    let doc = info
        .decrypt(pin.as_bytes())
        .map_err(|_| UnlockError::PinIncorrect)?;
    // a wrong PIN can still yield valid CBC padding
    pkcs8::PrivateKeyInfo::from_der(doc.as_bytes()).map_err(|_| UnlockError::PinIncorrect)?;
    Ok(doc.as_bytes().to_vec())
}

/// Whether a PKCS#8 private key belongs to the given SubjectPublicKeyInfo
pub(crate) fn key_matches(pkcs8_der: &[u8], spki_der: &[u8]) -> Result<bool, String> {
    if let Ok(sk) = p256::SecretKey::from_pkcs8_der(pkcs8_der) {
        return Ok(p256::PublicKey::from_public_key_der(spki_der)
            .map(|pk| pk == sk.public_key())
            .unwrap_or(false));
    }
    if let Ok(sk) = p384::SecretKey::from_pkcs8_der(pkcs8_der) {
        return Ok(p384::PublicKey::from_public_key_der(spki_der)
            .map(|pk| pk == sk.public_key())
            .unwrap_or(false));
    }
    if let Ok(sk) = RsaPrivateKey::from_pkcs8_der(pkcs8_der) {
        return Ok(RsaPublicKey::from_public_key_der(spki_der)
            .map(|pk| pk == sk.to_public_key())
            .unwrap_or(false));
    }
    Err("unsupported private key algorithm".to_string())
}

/// Sign `data` with a plain PKCS#8 key
pub(crate) fn sign(
    algorithm: SignatureAlgorithm,
    pkcs8_der: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, String> {
    let digest = algorithm.digest_algorithm().digest(data);

    match algorithm {
        SignatureAlgorithm::EcdsaSha256 => {
            let key = p256::ecdsa::SigningKey::from_pkcs8_der(pkcs8_der)
                .map_err(|e| format!("not a P-256 key: {e}"))?;
            let sig: p256::ecdsa::Signature = key
                .sign_prehash(&digest)
                .map_err(|e| format!("P-256 signing failed: {e}"))?;
            Ok(sig.to_der().as_bytes().to_vec())
        }
        SignatureAlgorithm::EcdsaSha384 => {
            let key = p384::ecdsa::SigningKey::from_pkcs8_der(pkcs8_der)
                .map_err(|e| format!("not a P-384 key: {e}"))?;
            let sig: p384::ecdsa::Signature = key
                .sign_prehash(&digest)
                .map_err(|e| format!("P-384 signing failed: {e}"))?;
            Ok(sig.to_der().as_bytes().to_vec())
        }
        SignatureAlgorithm::RsaSha256
        | SignatureAlgorithm::RsaSha384
        | SignatureAlgorithm::RsaSha512 => {
            let key = RsaPrivateKey::from_pkcs8_der(pkcs8_der)
                .map_err(|e| format!("not an RSA key: {e}"))?;
            key.sign(pkcs1v15_scheme(algorithm.digest_algorithm()), &digest)
                .map_err(|e| format!("RSA signing failed: {e}"))
        }
    }
}

/// Verify `signature` over `data` against a DER SubjectPublicKeyInfo.
///
/// Undecodable keys or signature values count as a failed verification.
pub(crate) fn verify(
    algorithm: SignatureAlgorithm,
    spki_der: &[u8],
    data: &[u8],
    signature: &[u8],
) -> bool {
    let digest = algorithm.digest_algorithm().digest(data);

    match algorithm {
        SignatureAlgorithm::RsaSha256
        | SignatureAlgorithm::RsaSha384
        | SignatureAlgorithm::RsaSha512 => RsaPublicKey::from_public_key_der(spki_der)
            .map(|key| {
                key.verify(pkcs1v15_scheme(algorithm.digest_algorithm()), &digest, signature)
                    .is_ok()
            })
            .unwrap_or(false),
        // each ECDSA algorithm is bound to its curve
        SignatureAlgorithm::EcdsaSha256 => {
            let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der) else {
                return false;
            };
            let Ok(sig) = p256::ecdsa::Signature::from_der(signature) else {
                return false;
            };
            vk.verify_prehash(&digest, &sig).is_ok()
        }
        SignatureAlgorithm::EcdsaSha384 => {
            let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der) else {
                return false;
            };
            let Ok(sig) = p384::ecdsa::Signature::from_der(signature) else {
                return false;
            };
            vk.verify_prehash(&digest, &sig).is_ok()
        }
    }
}

fn pkcs1v15_scheme(digest: DigestAlgorithm) -> Pkcs1v15Sign {
    match digest {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures;
    use crate::model::Certificate;

    fn pkcs8(pem: &str) -> Vec<u8> {
        der::pem::decode_vec(pem.as_bytes()).unwrap().1
    }

    #[test]
    fn test_sign_verify_each_family() {
        let cases = [
            (fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY),
            (fixtures::SIGNER_P384_CERT, fixtures::SIGNER_P384_KEY),
            (fixtures::SIGNER_RSA_CERT, fixtures::SIGNER_RSA_KEY),
        ];
        for (cert_pem, key_pem) in cases {
            let cert = Certificate::from_pem(cert_pem).unwrap();
            let alg = cert.key_algorithm().unwrap().signature_algorithm();
            let sig = sign(alg, &pkcs8(key_pem), b"attributes").unwrap();

            assert!(verify(alg, cert.spki_der(), b"attributes", &sig));
            assert!(!verify(alg, cert.spki_der(), b"tampered", &sig));
        }
    }

    #[test]
    fn test_wrong_curve_rejected() {
        let err = sign(
            SignatureAlgorithm::EcdsaSha384,
            &pkcs8(fixtures::SIGNER_P256_KEY),
            b"data",
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_algorithm_bound_to_curve() {
        let p256_cert = Certificate::from_pem(fixtures::SIGNER_P256_CERT).unwrap();
        let p384_cert = Certificate::from_pem(fixtures::SIGNER_P384_CERT).unwrap();
        let sig = sign(
            SignatureAlgorithm::EcdsaSha384,
            &pkcs8(fixtures::SIGNER_P384_KEY),
            b"data",
        )
        .unwrap();

        assert!(verify(SignatureAlgorithm::EcdsaSha384, p384_cert.spki_der(), b"data", &sig));
        assert!(!verify(SignatureAlgorithm::EcdsaSha256, p384_cert.spki_der(), b"data", &sig));
        assert!(!verify(SignatureAlgorithm::EcdsaSha384, p256_cert.spki_der(), b"data", &sig));
        assert!(!verify(SignatureAlgorithm::RsaSha384, p384_cert.spki_der(), b"data", &sig));
    }

    #[test]
    fn test_garbage_signature_fails_verification() {
        let cert = Certificate::from_pem(fixtures::SIGNER_P256_CERT).unwrap();
        assert!(!verify(
            SignatureAlgorithm::EcdsaSha256,
            cert.spki_der(),
            b"data",
            b"\x01\x02\x03"
        ));
    }

    #[test]
    fn test_key_matches() {
        let cert = Certificate::from_pem(fixtures::SIGNER_P256_CERT).unwrap();
        let other = Certificate::from_pem(fixtures::SIGNER_RSA_CERT).unwrap();
        let key = pkcs8(fixtures::SIGNER_P256_KEY);
        assert_eq!(key_matches(&key, cert.spki_der()), Ok(true));
        assert_eq!(key_matches(&key, other.spki_der()), Ok(false));
    }

    #[test]
    fn test_unlock_encrypted_key() {
        let der = pkcs8(fixtures::SIGNER_PIN_KEY);
        let pin: Pin = fixtures::SIGNER_PIN.parse().unwrap();
        let wrong: Pin = "00000000".parse().unwrap();

        assert_eq!(unlock(true, &der, None), Err(UnlockError::PinRequired));
        assert_eq!(unlock(true, &der, Some(&wrong)), Err(UnlockError::PinIncorrect));

        let plain = unlock(true, &der, Some(&pin)).unwrap();
        let cert = Certificate::from_pem(fixtures::SIGNER_PIN_CERT).unwrap();
        assert_eq!(key_matches(&plain, cert.spki_der()), Ok(true));
    }
}
