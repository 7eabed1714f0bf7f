//! Key, digest and signature algorithms understood by the engine

use const_oid::ObjectIdentifier;
use der::Decode;
use p256::pkcs8::DecodePublicKey;
use serde::Serialize;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::SubjectPublicKeyInfoRef;
use thiserror::Error;

const RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

const SHA256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const SHA384_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
const SHA512_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

const ECDSA_SHA256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_SHA384_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const RSA_SHA256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const RSA_SHA384_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const RSA_SHA512_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Public key family of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyAlgorithm {
    /// RSA, any modulus size
    Rsa,
    /// ECDSA over NIST P-256
    EcdsaP256,
    /// ECDSA over NIST P-384
    EcdsaP384,
}

impl KeyAlgorithm {
    /// Detect the key family from a DER SubjectPublicKeyInfo
    ///
    /// # Errors
    ///
    /// Returns `AlgorithmError::Unsupported` for families and curves the
    /// software provider cannot use.
    pub fn from_spki_der(spki_der: &[u8]) -> Result<Self, AlgorithmError> {
        let info = SubjectPublicKeyInfoRef::from_der(spki_der).map_err(|e| {
            AlgorithmError::Unsupported {
                algorithm: format!("undecodable public key: {e}"),
            }
        })?;

        let oid = info.algorithm.oid;
        if oid == RSA_ENCRYPTION {
            return Ok(KeyAlgorithm::Rsa);
        }
        if oid == EC_PUBLIC_KEY {
            if p256::PublicKey::from_public_key_der(spki_der).is_ok() {
                return Ok(KeyAlgorithm::EcdsaP256);
            }
            if p384::PublicKey::from_public_key_der(spki_der).is_ok() {
                return Ok(KeyAlgorithm::EcdsaP384);
            }
            return Err(AlgorithmError::Unsupported {
                algorithm: "EC key on an unsupported curve".to_string(),
            });
        }

        Err(AlgorithmError::Unsupported {
            algorithm: oid.to_string(),
        })
    }

    /// Signature algorithm used when this key signs
    pub fn signature_algorithm(self) -> SignatureAlgorithm {
        match self {
            KeyAlgorithm::Rsa => SignatureAlgorithm::RsaSha256,
            KeyAlgorithm::EcdsaP256 => SignatureAlgorithm::EcdsaSha256,
            KeyAlgorithm::EcdsaP384 => SignatureAlgorithm::EcdsaSha384,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::EcdsaP256 => "ECDSA P-256",
            KeyAlgorithm::EcdsaP384 => "ECDSA P-384",
        }
    }
}

/// Hash functions for message digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => SHA256_OID,
            DigestAlgorithm::Sha384 => SHA384_OID,
            DigestAlgorithm::Sha512 => SHA512_OID,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Signature algorithm carried in a SignerInfo or certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignatureAlgorithm {
    EcdsaSha256,
    EcdsaSha384,
    RsaSha256,
    RsaSha384,
    RsaSha512,
}

impl SignatureAlgorithm {
    const ALL: [SignatureAlgorithm; 5] = [
        SignatureAlgorithm::EcdsaSha256,
        SignatureAlgorithm::EcdsaSha384,
        SignatureAlgorithm::RsaSha256,
        SignatureAlgorithm::RsaSha384,
        SignatureAlgorithm::RsaSha512,
    ];

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::EcdsaSha256 => ECDSA_SHA256_OID,
            SignatureAlgorithm::EcdsaSha384 => ECDSA_SHA384_OID,
            SignatureAlgorithm::RsaSha256 => RSA_SHA256_OID,
            SignatureAlgorithm::RsaSha384 => RSA_SHA384_OID,
            SignatureAlgorithm::RsaSha512 => RSA_SHA512_OID,
        }
    }

    /// Resolve an algorithm identifier.
    ///
    /// `digest_hint` covers SignerInfos that name the bare `rsaEncryption`
    /// key OID and leave the hash to the digest algorithm field.
    pub fn from_oid(oid: &ObjectIdentifier, digest_hint: Option<DigestAlgorithm>) -> Option<Self> {
        if let Some(alg) = Self::ALL.into_iter().find(|alg| alg.oid() == *oid) {
            return Some(alg);
        }
        if *oid == RSA_ENCRYPTION {
            return match digest_hint {
                Some(DigestAlgorithm::Sha256) | None => Some(SignatureAlgorithm::RsaSha256),
                Some(DigestAlgorithm::Sha384) => Some(SignatureAlgorithm::RsaSha384),
                Some(DigestAlgorithm::Sha512) => Some(SignatureAlgorithm::RsaSha512),
            };
        }
        None
    }

    pub fn digest_algorithm(self) -> DigestAlgorithm {
        match self {
            SignatureAlgorithm::EcdsaSha256 | SignatureAlgorithm::RsaSha256 => {
                DigestAlgorithm::Sha256
            }
            SignatureAlgorithm::EcdsaSha384 | SignatureAlgorithm::RsaSha384 => {
                DigestAlgorithm::Sha384
            }
            SignatureAlgorithm::RsaSha512 => DigestAlgorithm::Sha512,
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::RsaSha256 | SignatureAlgorithm::RsaSha384 | SignatureAlgorithm::RsaSha512
        )
    }
}

/// Errors that can occur when working with algorithms
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("Algorithm not supported: {algorithm}")]
    Unsupported { algorithm: String },
}
