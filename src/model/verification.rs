use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{SignatureMode, Thumbprint};

/// Why an envelope did not verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// Content, signed attributes or signature value do not match
    DigestMismatch,
    /// Signer certificate is expired or does not chain to a trusted root
    UntrustedSigner,
}

/// Outcome of checking an envelope.
///
/// When `valid` is false `recovered_content` is always empty; a failed
/// check never hands back content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(skip)]
    pub recovered_content: Vec<u8>,
    pub signer_subject: String,
    pub signer_thumbprint: Option<Thumbprint>,
    pub signing_time: Option<DateTime<Utc>>,
    pub mode: SignatureMode,
    pub failure_reason: Option<FailureReason>,
}

impl VerificationResult {
    pub fn verified(
        content: Vec<u8>,
        signer_subject: String,
        signer_thumbprint: Thumbprint,
        signing_time: Option<DateTime<Utc>>,
        mode: SignatureMode,
    ) -> Self {
        Self {
            valid: true,
            recovered_content: content,
            signer_subject,
            signer_thumbprint: Some(signer_thumbprint),
            signing_time,
            mode,
            failure_reason: None,
        }
    }

    pub fn rejected(
        reason: FailureReason,
        signer_subject: String,
        signer_thumbprint: Option<Thumbprint>,
        signing_time: Option<DateTime<Utc>>,
        mode: SignatureMode,
    ) -> Self {
        Self {
            valid: false,
            recovered_content: Vec::new(),
            signer_subject,
            signer_thumbprint,
            signing_time,
            mode,
            failure_reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_carries_no_content() {
        let result = VerificationResult::rejected(
            FailureReason::DigestMismatch,
            "CN=Test".to_string(),
            None,
            None,
            SignatureMode::Enveloping,
        );
        assert!(!result.valid);
        assert!(result.recovered_content.is_empty());
        assert_eq!(result.failure_reason, Some(FailureReason::DigestMismatch));
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = VerificationResult::verified(
            b"hello".to_vec(),
            "CN=Test".to_string(),
            Thumbprint::of(b"cert"),
            None,
            SignatureMode::Detached,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["signerSubject"], "CN=Test");
        assert_eq!(json["mode"], "detached");
        assert!(json.get("recoveredContent").is_none());
    }
}
