//! Signature envelope and its transport encoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::error::VerifyError;

/// File extension appended to signed documents
pub const SIGNATURE_EXTENSION: &str = ".sig";

/// Whether the envelope embeds the signed content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMode {
    /// Content travels separately; the envelope holds only the signature
    Detached,
    /// Content is embedded in the envelope
    Enveloping,
}

impl SignatureMode {
    pub fn from_detached(detached: bool) -> Self {
        if detached {
            SignatureMode::Detached
        } else {
            SignatureMode::Enveloping
        }
    }

    pub fn is_detached(self) -> bool {
        self == SignatureMode::Detached
    }
}

/// DER-encoded CAdES-BES SignedData wrapped in a ContentInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEnvelope(Vec<u8>);

impl SignatureEnvelope {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// Accept any form a caller may hand back: raw DER, PEM armour or
    /// base64 transport text (line breaks and other whitespace ignored).
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::Malformed` if none of the forms decode.
    pub fn from_transport(input: &[u8]) -> Result<Self, VerifyError> {
        if input.first() == Some(&0x30) {
            return Ok(Self(input.to_vec()));
        }

        let text = std::str::from_utf8(input).map_err(|_| VerifyError::Malformed {
            reason: "envelope is neither DER nor text".to_string(),
        })?;

        if text.contains("-----BEGIN") {
            let (_label, der) =
                der::pem::decode_vec(text.trim().as_bytes()).map_err(|e| VerifyError::Malformed {
                    reason: format!("invalid PEM envelope: {e}"),
                })?;
            return Ok(Self(der));
        }

        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.is_empty() {
            return Err(VerifyError::Malformed {
                reason: "envelope is empty".to_string(),
            });
        }
        STANDARD
            .decode(compact.as_bytes())
            .map(Self)
            .map_err(|e| VerifyError::Malformed {
                reason: format!("invalid base64 envelope: {e}"),
            })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Single-line base64 with no CR or LF, safe to embed in JSON and
    /// decodable back to the identical DER.
    pub fn to_transport_text(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

/// Name of the envelope file produced for `original`
pub fn signed_file_name(original: &str) -> String {
    format!("{original}{SIGNATURE_EXTENSION}")
}

/// Name of the content recovered from `signed`, with the `.sig` suffix stripped
pub fn unwrapped_file_name(signed: &str) -> String {
    signed
        .strip_suffix(SIGNATURE_EXTENSION)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(signed)
        .to_string()
}
