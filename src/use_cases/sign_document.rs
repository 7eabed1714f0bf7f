//! Sign document use case
//!
//! Two entry points share one engine: the context path (store index or any
//! selector, through [`SignerContext`]) and the thumbprint-direct path.
//! Both produce envelopes of the same shape for the same certificate.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CadesResult, SignError};
use crate::logic::{cades, locator};
use crate::model::{
    signed_file_name, AssuranceMode, CertificateSelector, Pin, SignatureEnvelope, SignatureMode,
    SignerContext, StoreName, StoreScope, Thumbprint,
};
use crate::ports::{CryptoProvider, TrustStore};

/// Everything a caller supplies for one signing request
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub document: Vec<u8>,
    /// Name of the signed file, used for the suggested output name
    pub file_name: String,
    pub selector: CertificateSelector,
    pub pin: Option<Pin>,
    pub mode: SignatureMode,
    pub check_certificate: bool,
}

impl SignRequest {
    pub fn new(document: Vec<u8>, file_name: impl Into<String>, selector: CertificateSelector) -> Self {
        Self {
            document,
            file_name: file_name.into(),
            selector,
            pin: None,
            mode: SignatureMode::Enveloping,
            check_certificate: true,
        }
    }

    pub fn with_pin(mut self, pin: Option<Pin>) -> Self {
        self.pin = pin;
        self
    }

    pub fn detached(mut self, detached: bool) -> Self {
        self.mode = SignatureMode::from_detached(detached);
        self
    }

    pub fn check_certificate(mut self, check: bool) -> Self {
        self.check_certificate = check;
        self
    }
}

/// Result of a successful signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutcome {
    #[serde(skip)]
    pub envelope: SignatureEnvelope,
    /// Single-line base64 of the envelope
    pub signed_content: String,
    pub filename: String,
    pub assurance: AssuranceMode,
    pub signer_subject: String,
    pub signer_thumbprint: Thumbprint,
}

/// Core signing algorithm over an already built context.
///
/// Checks the certificate (unless the context opts out), then the PIN, then
/// builds the envelope with the provider's signature over the signed
/// attributes.
///
/// # Errors
///
/// - `UntrustedCertificate` when the certificate is expired or does not
///   chain to a trusted root and checking is on
/// - `PinRequired` when the key is PIN-protected and no PIN was given
/// - the `StoreError` of a root store that could not be read for the
///   chain check
/// - anything the provider reports while signing
pub fn sign_envelope<P>(
    provider: &P,
    context: &SignerContext<'_>,
    document: &[u8],
    mode: SignatureMode,
) -> CadesResult<SignatureEnvelope>
where
    P: CryptoProvider + ?Sized,
{
    let certificate = context.certificate();

    if context.check_certificate() {
        if !certificate.is_currently_valid() {
            return Err(SignError::UntrustedCertificate {
                reason: format!(
                    "certificate {} is valid only from {} to {}",
                    certificate.thumbprint(),
                    certificate.not_before(),
                    certificate.not_after()
                ),
            }
            .into());
        }
        if !provider.verify_chain(certificate)? {
            return Err(SignError::UntrustedCertificate {
                reason: format!(
                    "certificate {} does not chain to a trusted root",
                    certificate.thumbprint()
                ),
            }
            .into());
        }
        debug!(thumbprint = %certificate.thumbprint(), "Signer certificate is trusted");
    } else {
        warn!(
            thumbprint = %certificate.thumbprint(),
            "Certificate check disabled, signature has reduced assurance"
        );
    }

    let key = certificate.key().ok_or_else(|| SignError::ProviderFailure {
        reason: format!("certificate {} has no private key", certificate.thumbprint()),
    })?;
    if certificate.requires_pin() && context.pin().is_none() {
        return Err(SignError::PinRequired.into());
    }

    let envelope = cades::build_envelope(certificate, document, mode, Utc::now(), |alg, data| {
        debug!(algorithm = ?alg, provider = provider.name(), "Signing attributes");
        provider.sign(alg, key, context.pin(), data)
    })?;

    info!(
        thumbprint = %certificate.thumbprint(),
        mode = ?mode,
        size = envelope.as_bytes().len(),
        "Document signed"
    );
    Ok(envelope)
}

/// Thumbprint-direct signing: resolve the certificate by thumbprint in the
/// personal store, then run the full signing algorithm.
pub fn sign_with_thumbprint<B>(
    backend: &B,
    scope: StoreScope,
    document: &[u8],
    thumbprint: &Thumbprint,
    mode: SignatureMode,
    pin: Option<Pin>,
    check_certificate: bool,
) -> CadesResult<SignatureEnvelope>
where
    B: TrustStore + CryptoProvider + ?Sized,
{
    let collection = backend.open(scope, StoreName::My)?;
    let certificate = locator::by_thumbprint(&collection, thumbprint)?;
    let context = SignerContext::build(certificate, check_certificate, pin);
    sign_envelope(backend, &context, document, mode)
}

/// Sign `request.document` with the certificate the selector names.
///
/// The personal store is opened once; lookup, signing and the reported
/// signer all come from that one snapshot.
pub fn sign_document<B>(backend: &B, scope: StoreScope, request: &SignRequest) -> CadesResult<SignOutcome>
where
    B: TrustStore + CryptoProvider + ?Sized,
{
    let collection = backend.open(scope, StoreName::My)?;
    let certificate = locator::by_selector(&collection, &request.selector)?;
    debug!(
        selector = %request.selector,
        thumbprint = %certificate.thumbprint(),
        "Located signer certificate"
    );

    let context =
        SignerContext::build(certificate, request.check_certificate, request.pin.clone());
    let envelope = sign_envelope(backend, &context, &request.document, request.mode)?;

    Ok(SignOutcome {
        signed_content: envelope.to_transport_text(),
        envelope,
        filename: signed_file_name(&request.file_name),
        assurance: context.assurance(),
        signer_subject: certificate.subject().to_string(),
        signer_thumbprint: certificate.thumbprint().clone(),
    })
}
