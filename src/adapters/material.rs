//! Decoding of installable material: root certificates and key bundles

use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use cms::cert::CertificateChoices;
use const_oid::ObjectIdentifier;
use der::pem::LineEnding;
use der::{Decode, Encode};
use tracing::debug;

use super::soft_crypto::{self, UnlockError, ENCRYPTED_PRIVATE_KEY_LABEL, PRIVATE_KEY_LABEL};
use crate::error::InstallError;
use crate::model::{Certificate, KeyContainer, Pin};

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// One `-----BEGIN X-----` block
#[derive(Debug, Clone)]
pub(crate) struct PemBlock {
    pub label: String,
    pub der: Vec<u8>,
}

/// Certificate with its private key, ready to store
#[derive(Debug, Clone)]
pub(crate) struct KeyBundle {
    pub certificate: Certificate,
    /// PKCS#8 DER exactly as supplied, still encrypted when `encrypted`
    pub key_der: Vec<u8>,
    pub encrypted: bool,
}

impl KeyBundle {
    pub fn key_label(&self) -> &'static str {
        if self.encrypted {
            ENCRYPTED_PRIVATE_KEY_LABEL
        } else {
            PRIVATE_KEY_LABEL
        }
    }
}

pub(crate) fn is_pem(data: &[u8]) -> bool {
    data.windows(11).any(|w| w == b"-----BEGIN ")
}

/// Split PEM text into decoded blocks; text between blocks is ignored
pub(crate) fn pem_blocks(text: &str) -> Result<Vec<PemBlock>, String> {
    const BEGIN: &str = "-----BEGIN ";
    const END: &str = "-----END ";

    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(BEGIN) {
        let block = &rest[start..];
        let end = block
            .find(END)
            .ok_or_else(|| "PEM block without END line".to_string())?;
        let tail = &block[end + END.len()..];
        let close = tail
            .find("-----")
            .ok_or_else(|| "unterminated PEM END line".to_string())?;
        let len = end + END.len() + close + 5;

        let (label, der) =
            der::pem::decode_vec(block[..len].as_bytes()).map_err(|e| e.to_string())?;
        blocks.push(PemBlock {
            label: label.to_string(),
            der,
        });
        rest = &block[len..];
    }
    Ok(blocks)
}

pub(crate) fn pem_encode(label: &str, der: &[u8]) -> Result<String, String> {
    der::pem::encode_string(label, LineEnding::LF, der).map_err(|e| e.to_string())
}

/// Certificates from a DER/PEM certificate or a PKCS#7 certificate bag
pub(crate) fn parse_root_material(material: &[u8]) -> Result<Vec<Certificate>, InstallError> {
    if is_pem(material) {
        let text = std::str::from_utf8(material).map_err(|_| InstallError::InvalidMaterial {
            reason: "PEM material is not UTF-8".to_string(),
        })?;
        let blocks = pem_blocks(text).map_err(|reason| InstallError::InvalidMaterial { reason })?;

        let mut certs = Vec::new();
        for block in blocks {
            match block.label.as_str() {
                CERTIFICATE_LABEL => certs.push(parse_certificate(&block.der)?),
                "PKCS7" | "CMS" => certs.extend(certificates_from_pkcs7(&block.der)?),
                other => debug!(label = other, "Skipping non-certificate PEM block"),
            }
        }
        if certs.is_empty() {
            return Err(InstallError::InvalidMaterial {
                reason: "no certificates in PEM material".to_string(),
            });
        }
        return Ok(certs);
    }

    if let Ok(cert) = Certificate::from_der(material) {
        return Ok(vec![cert]);
    }
    certificates_from_pkcs7(material).map_err(|_| InstallError::UnsupportedFormat {
        format: "neither an X.509 certificate nor a PKCS#7 certificate bag".to_string(),
    })
}

fn certificates_from_pkcs7(der: &[u8]) -> Result<Vec<Certificate>, InstallError> {
    let invalid = |reason: String| InstallError::InvalidMaterial { reason };

    let ci = ContentInfo::from_der(der).map_err(|e| invalid(format!("bad PKCS#7: {e}")))?;
    if ci.content_type != ID_SIGNED_DATA {
        return Err(invalid(format!(
            "PKCS#7 content type {} is not signedData",
            ci.content_type
        )));
    }
    let content = ci.content.to_der().map_err(|e| invalid(e.to_string()))?;
    let signed_data =
        SignedData::from_der(&content).map_err(|e| invalid(format!("bad SignedData: {e}")))?;

    let mut certs = Vec::new();
    if let Some(set) = signed_data.certificates {
        for choice in set.0.iter() {
            if let CertificateChoices::Certificate(cert) = choice {
                let der = cert.to_der().map_err(|e| invalid(e.to_string()))?;
                certs.push(parse_certificate(&der)?);
            }
        }
    }
    if certs.is_empty() {
        return Err(invalid("PKCS#7 bag holds no certificates".to_string()));
    }
    Ok(certs)
}

/// Decode a PEM bundle and check its key against its certificate
pub(crate) fn parse_key_bundle(
    bundle: &[u8],
    container: KeyContainer,
    pin: Option<&Pin>,
) -> Result<KeyBundle, InstallError> {
    if container == KeyContainer::Pfx {
        return Err(InstallError::UnsupportedFormat {
            format: container.name().to_string(),
        });
    }
    if !is_pem(bundle) {
        return Err(InstallError::InvalidMaterial {
            reason: "expected a PEM bundle".to_string(),
        });
    }
    let text = std::str::from_utf8(bundle).map_err(|_| InstallError::InvalidMaterial {
        reason: "PEM bundle is not UTF-8".to_string(),
    })?;
    let blocks = pem_blocks(text).map_err(|reason| InstallError::InvalidMaterial { reason })?;

    let mut certs = Vec::new();
    let mut key: Option<(bool, Vec<u8>)> = None;
    for block in blocks {
        match block.label.as_str() {
            CERTIFICATE_LABEL => certs.push(parse_certificate(&block.der)?),
            PRIVATE_KEY_LABEL => key = Some((false, block.der)),
            ENCRYPTED_PRIVATE_KEY_LABEL => key = Some((true, block.der)),
            "RSA PRIVATE KEY" | "EC PRIVATE KEY" => {
                return Err(InstallError::UnsupportedFormat {
                    format: format!("{} (convert to PKCS#8)", block.label),
                })
            }
            other => debug!(label = other, "Skipping unrelated PEM block"),
        }
    }

    let (encrypted, key_der) = key.ok_or_else(|| InstallError::InvalidMaterial {
        reason: "bundle has no private key".to_string(),
    })?;
    if certs.is_empty() {
        return Err(InstallError::InvalidMaterial {
            reason: "bundle has no certificate".to_string(),
        });
    }

    let plain = soft_crypto::unlock(encrypted, &key_der, pin).map_err(|e| match e {
        UnlockError::PinRequired => InstallError::PinRequired,
        UnlockError::PinIncorrect => InstallError::InvalidMaterial {
            reason: "PIN does not decrypt the private key".to_string(),
        },
    })?;

    for certificate in certs {
        let matches = soft_crypto::key_matches(&plain, certificate.spki_der())
            .map_err(|reason| InstallError::InvalidMaterial { reason })?;
        if matches {
            return Ok(KeyBundle {
                certificate,
                key_der,
                encrypted,
            });
        }
    }
    Err(InstallError::KeyMismatch)
}

fn parse_certificate(der: &[u8]) -> Result<Certificate, InstallError> {
    Certificate::from_der(der).map_err(|e| InstallError::InvalidMaterial {
        reason: e.to_string(),
    })
}
