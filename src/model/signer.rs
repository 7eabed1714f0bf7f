//! Signer context: the certificate, its PIN and the validation policy for one signing

use serde::Serialize;

use super::{Certificate, Pin};

/// Assurance of a produced signature.
///
/// `Reduced` marks envelopes made with certificate validation switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssuranceMode {
    Full,
    Reduced,
}

/// Immutable bundle handed to the signature engine.
///
/// Borrows the certificate from the collection it was located in; the
/// private key stays with the crypto provider.
#[derive(Debug, Clone)]
pub struct SignerContext<'a> {
    certificate: &'a Certificate,
    check_certificate: bool,
    pin: Option<Pin>,
}

impl<'a> SignerContext<'a> {
    /// Context with certificate validation on and no PIN
    pub fn new(certificate: &'a Certificate) -> Self {
        Self {
            certificate,
            check_certificate: true,
            pin: None,
        }
    }

    /// Build from all parameters at once
    pub fn build(certificate: &'a Certificate, check_certificate: bool, pin: Option<Pin>) -> Self {
        Self {
            certificate,
            check_certificate,
            pin,
        }
    }

    pub fn with_pin(mut self, pin: Pin) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Skip validity and chain checks when signing; the result is `Reduced`
    pub fn without_certificate_check(mut self) -> Self {
        self.check_certificate = false;
        self
    }

    pub fn certificate(&self) -> &'a Certificate {
        self.certificate
    }

    pub fn check_certificate(&self) -> bool {
        self.check_certificate
    }

    pub fn pin(&self) -> Option<&Pin> {
        self.pin.as_ref()
    }

    pub fn assurance(&self) -> AssuranceMode {
        if self.check_certificate {
            AssuranceMode::Full
        } else {
            AssuranceMode::Reduced
        }
    }
}
