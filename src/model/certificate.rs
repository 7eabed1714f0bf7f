//! Parsed X.509 certificate as seen through a trust store

use std::fmt;

use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use serde::Serialize;
use thiserror::Error;
use x509_cert::Certificate as X509Certificate;

use super::{KeyAlgorithm, SignatureAlgorithm, StoreLocation, Thumbprint};

/// Handle to a private key held by a crypto provider.
///
/// Carries no key material; the provider resolves it at signing time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub location: StoreLocation,
    pub thumbprint: Thumbprint,
}

/// An installed certificate plus what the store knows about its key
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    thumbprint: Thumbprint,
    subject: String,
    issuer: String,
    subject_der: Vec<u8>,
    issuer_der: Vec<u8>,
    serial: Vec<u8>,
    not_before: i64,
    not_after: i64,
    spki_der: Vec<u8>,
    tbs_der: Vec<u8>,
    signature_algorithm: Option<SignatureAlgorithm>,
    signature: Vec<u8>,
    key_algorithm: Option<KeyAlgorithm>,
    key: Option<KeyRef>,
    pin_protected: bool,
}

impl Certificate {
    /// Parse a DER-encoded certificate
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::Parse` if the bytes are not an X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let cert = X509Certificate::from_der(der).map_err(parse_err)?;
        let tbs = &cert.tbs_certificate;

        let spki_der = tbs.subject_public_key_info.to_der().map_err(parse_err)?;
        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| CertificateError::Parse {
                reason: "signature BIT STRING has unused bits".to_string(),
            })?
            .to_vec();

        Ok(Self {
            der: der.to_vec(),
            thumbprint: Thumbprint::of(der),
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            subject_der: tbs.subject.to_der().map_err(parse_err)?,
            issuer_der: tbs.issuer.to_der().map_err(parse_err)?,
            serial: tbs.serial_number.as_bytes().to_vec(),
            not_before: unix_seconds(tbs.validity.not_before),
            not_after: unix_seconds(tbs.validity.not_after),
            key_algorithm: KeyAlgorithm::from_spki_der(&spki_der).ok(),
            spki_der,
            tbs_der: tbs.to_der().map_err(parse_err)?,
            signature_algorithm: SignatureAlgorithm::from_oid(&cert.signature_algorithm.oid, None),
            signature,
            key: None,
            pin_protected: false,
        })
    }

    /// Parse a single PEM `CERTIFICATE` block
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let (label, der) = der::pem::decode_vec(pem.trim().as_bytes()).map_err(|e| {
            CertificateError::Pem {
                reason: e.to_string(),
            }
        })?;
        if label != "CERTIFICATE" {
            return Err(CertificateError::Pem {
                reason: format!("expected CERTIFICATE block, found {label}"),
            });
        }
        Self::from_der(&der)
    }

    /// Attach the provider handle of the matching private key
    pub fn with_private_key(mut self, key: KeyRef, pin_protected: bool) -> Self {
        self.key = Some(key);
        self.pin_protected = pin_protected;
        self
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    /// Big-endian serial number bytes
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    pub fn serial_hex(&self) -> String {
        hex::encode_upper(&self.serial)
    }

    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    pub fn tbs_der(&self) -> &[u8] {
        &self.tbs_der
    }

    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        self.signature_algorithm
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn key_algorithm(&self) -> Option<KeyAlgorithm> {
        self.key_algorithm
    }

    pub fn key(&self) -> Option<&KeyRef> {
        self.key.as_ref()
    }

    pub fn has_private_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn requires_pin(&self) -> bool {
        self.pin_protected
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject_der == self.issuer_der
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        to_datetime(self.not_before)
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        to_datetime(self.not_after)
    }

    /// Whether `at` falls inside the validity window (bounds inclusive)
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        let ts = at.timestamp();
        self.not_before <= ts && ts <= self.not_after
    }

    pub fn is_currently_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Listing entry for the 1-based `index`
    pub fn info(&self, index: usize) -> CertificateInfo {
        CertificateInfo {
            index,
            thumbprint: self.thumbprint.to_string(),
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            serial_number: self.serial_hex(),
            valid_from: self.not_before(),
            valid_to: self.not_after(),
            key_algorithm: self.key_algorithm.map(|alg| alg.name().to_string()),
            has_private_key: self.has_private_key(),
            pin_protected: self.pin_protected,
        }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("thumbprint", &self.thumbprint)
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial_hex())
            .field("has_private_key", &self.has_private_key())
            .field("pin_protected", &self.pin_protected)
            .finish()
    }
}

/// Public description of a store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub index: usize,
    pub thumbprint: String,
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub key_algorithm: Option<String>,
    pub has_private_key: bool,
    pub pin_protected: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("not a valid X.509 certificate: {reason}")]
    Parse { reason: String },

    #[error("invalid PEM: {reason}")]
    Pem { reason: String },
}

fn parse_err(e: der::Error) -> CertificateError {
    CertificateError::Parse {
        reason: e.to_string(),
    }
}

fn unix_seconds(time: x509_cert::time::Time) -> i64 {
    i64::try_from(time.to_unix_duration().as_secs()).unwrap_or(i64::MAX)
}

fn to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_default()
}
