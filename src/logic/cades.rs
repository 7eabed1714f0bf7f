//! CAdES-BES SignedData construction and parsing
//!
//! Every envelope carries exactly one SignerInfo with four signed
//! attributes: content-type, signing-time, message-digest and
//! signing-certificate-v2. The signer certificate is embedded. What gets
//! signed is the DER of the signed attributes encoded as a SET OF.

use chrono::{DateTime, Datelike, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, DecodeOwned, Encode, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;

use crate::error::{SignError, VerifyError};
use crate::model::{
    Certificate, DigestAlgorithm, SignatureAlgorithm, SignatureEnvelope, SignatureMode,
};

const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
const ID_AA_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");

/// ESSCertIDv2 (RFC 5035); an absent hash algorithm means SHA-256
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct EssCertIdV2 {
    hash_algorithm: Option<AlgorithmIdentifierOwned>,
    cert_hash: OctetString,
    issuer_serial: Option<IssuerSerial>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct IssuerSerial {
    issuer: Vec<GeneralName>,
    serial_number: SerialNumber,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SigningCertificateV2 {
    certs: Vec<EssCertIdV2>,
    policies: Option<Vec<Any>>,
}

/// Fields of an envelope the verifier needs
#[derive(Debug, Clone)]
pub(crate) struct ParsedEnvelope {
    pub signer: Certificate,
    pub digest_algorithm: DigestAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
    pub signed_attrs_der: Vec<u8>,
    pub signature: Vec<u8>,
    pub message_digest: Vec<u8>,
    pub signing_cert_hash: Option<(DigestAlgorithm, Vec<u8>)>,
    pub signing_time: Option<DateTime<Utc>>,
    /// `None` for detached envelopes
    pub content: Option<Vec<u8>>,
}

impl ParsedEnvelope {
    pub fn mode(&self) -> SignatureMode {
        SignatureMode::from_detached(self.content.is_none())
    }
}

/// Build a CAdES-BES envelope over `content`.
///
/// `sign` receives the signature algorithm and the DER signed attributes
/// and returns the raw signature value.
pub(crate) fn build_envelope<F>(
    certificate: &Certificate,
    content: &[u8],
    mode: SignatureMode,
    signing_time: DateTime<Utc>,
    sign: F,
) -> Result<SignatureEnvelope, SignError>
where
    F: FnOnce(SignatureAlgorithm, &[u8]) -> Result<Vec<u8>, SignError>,
{
    let key_algorithm = certificate
        .key_algorithm()
        .ok_or_else(|| SignError::ProviderFailure {
            reason: format!("unsupported key algorithm for {}", certificate.subject()),
        })?;
    let signature_algorithm = key_algorithm.signature_algorithm();
    let digest_algorithm = signature_algorithm.digest_algorithm();

    let x509 = x509_cert::Certificate::from_der(certificate.der()).map_err(encoding)?;
    let issuer = x509.tbs_certificate.issuer.clone();
    let serial_number = x509.tbs_certificate.serial_number.clone();

    let signing_certificate = SigningCertificateV2 {
        certs: vec![EssCertIdV2 {
            hash_algorithm: None,
            cert_hash: OctetString::new(DigestAlgorithm::Sha256.digest(certificate.der()))
                .map_err(encoding)?,
            issuer_serial: Some(IssuerSerial {
                issuer: vec![GeneralName::DirectoryName(issuer.clone())],
                serial_number: serial_number.clone(),
            }),
        }],
        policies: None,
    };

    let signed_attrs: SignedAttributes = SetOfVec::try_from(vec![
        attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA).map_err(encoding)?)?,
        attribute(ID_SIGNING_TIME, time_value(signing_time)?)?,
        attribute(
            ID_MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(digest_algorithm.digest(content)).map_err(encoding)?)
                .map_err(encoding)?,
        )?,
        attribute(
            ID_AA_SIGNING_CERTIFICATE_V2,
            Any::encode_from(&signing_certificate).map_err(encoding)?,
        )?,
    ])
    .map_err(encoding)?;

    let signed_attrs_der = signed_attrs.to_der().map_err(encoding)?;
    let signature = sign(signature_algorithm, &signed_attrs_der)?;

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer,
            serial_number,
        }),
        digest_alg: AlgorithmIdentifierOwned {
            oid: digest_algorithm.oid(),
            parameters: None,
        },
        signed_attrs: Some(signed_attrs),
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: signature_algorithm.oid(),
            parameters: signature_algorithm.is_rsa().then(Any::null),
        },
        signature: OctetString::new(signature).map_err(encoding)?,
        unsigned_attrs: None,
    };

    let econtent = match mode {
        SignatureMode::Detached => None,
        SignatureMode::Enveloping => Some(
            Any::encode_from(&OctetString::new(content).map_err(encoding)?).map_err(encoding)?,
        ),
    };

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![AlgorithmIdentifierOwned {
            oid: digest_algorithm.oid(),
            parameters: None,
        }])
        .map_err(encoding)?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent,
        },
        certificates: Some(CertificateSet(
            SetOfVec::try_from(vec![CertificateChoices::Certificate(x509)]).map_err(encoding)?,
        )),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info]).map_err(encoding)?),
    };

    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data).map_err(encoding)?,
    };
    Ok(SignatureEnvelope::from_der(
        content_info.to_der().map_err(encoding)?,
    ))
}

/// Decode an envelope into the parts needed for verification
///
/// # Errors
///
/// Returns `VerifyError::Malformed` for anything that is not a
/// single-signer SignedData with signed attributes and an embedded signer
/// certificate.
pub(crate) fn parse_envelope(der: &[u8]) -> Result<ParsedEnvelope, VerifyError> {
    let content_info = ContentInfo::from_der(der).map_err(malformed)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(VerifyError::Malformed {
            reason: format!("content type {} is not signedData", content_info.content_type),
        });
    }
    let signed_data =
        SignedData::from_der(&content_info.content.to_der().map_err(malformed)?).map_err(malformed)?;

    let signer_infos = signed_data.signer_infos.0.as_slice();
    let [signer_info] = signer_infos else {
        return Err(VerifyError::Malformed {
            reason: format!("expected one signer, found {}", signer_infos.len()),
        });
    };

    // id-data content with an IssuerAndSerialNumber signer is version 1 throughout
    if !matches!(signed_data.version, CmsVersion::V1) {
        return Err(VerifyError::Malformed {
            reason: format!("unsupported SignedData version {:?}", signed_data.version),
        });
    }
    if !matches!(signer_info.version, CmsVersion::V1) {
        return Err(VerifyError::Malformed {
            reason: format!("unsupported SignerInfo version {:?}", signer_info.version),
        });
    }

    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer_info.sid else {
        return Err(VerifyError::Malformed {
            reason: "signer identified by key identifier is not supported".to_string(),
        });
    };
    let signer_x509 = signed_data
        .certificates
        .as_ref()
        .and_then(|set| {
            set.0.iter().find_map(|choice| match choice {
                CertificateChoices::Certificate(cert)
                    if cert.tbs_certificate.issuer == sid.issuer
                        && cert.tbs_certificate.serial_number == sid.serial_number =>
                {
                    Some(cert)
                }
                _ => None,
            })
        })
        .ok_or_else(|| VerifyError::Malformed {
            reason: "signer certificate not embedded".to_string(),
        })?;
    let signer = Certificate::from_der(&signer_x509.to_der().map_err(malformed)?).map_err(|e| {
        VerifyError::Malformed {
            reason: e.to_string(),
        }
    })?;

    let digest_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid).ok_or_else(|| {
        VerifyError::Malformed {
            reason: format!("unsupported digest algorithm {}", signer_info.digest_alg.oid),
        }
    })?;
    let signature_algorithm = SignatureAlgorithm::from_oid(
        &signer_info.signature_algorithm.oid,
        Some(digest_algorithm),
    )
    .ok_or_else(|| VerifyError::Malformed {
        reason: format!(
            "unsupported signature algorithm {}",
            signer_info.signature_algorithm.oid
        ),
    })?;
    check_algorithms(&signed_data, signer_info, digest_algorithm, signature_algorithm)?;

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| VerifyError::Malformed {
            reason: "signed attributes missing".to_string(),
        })?;

    let content_type: ObjectIdentifier = required_attr(signed_attrs, ID_CONTENT_TYPE)?;
    if content_type != signed_data.encap_content_info.econtent_type {
        return Err(VerifyError::Malformed {
            reason: "content-type attribute does not match encapsulated content".to_string(),
        });
    }
    let message_digest: OctetString = required_attr(signed_attrs, ID_MESSAGE_DIGEST)?;
    let signing_time = optional_attr::<Time>(signed_attrs, ID_SIGNING_TIME)?
        .map(|t| to_datetime(t.to_unix_duration().as_secs()));
    let signing_cert_hash = optional_attr::<SigningCertificateV2>(
        signed_attrs,
        ID_AA_SIGNING_CERTIFICATE_V2,
    )?
    .and_then(|sc| sc.certs.into_iter().next())
    .map(|id| {
        let alg = match &id.hash_algorithm {
            None => Some(DigestAlgorithm::Sha256),
            Some(alg) => DigestAlgorithm::from_oid(&alg.oid),
        };
        alg.map(|alg| (alg, id.cert_hash.as_bytes().to_vec()))
            .ok_or_else(|| VerifyError::Malformed {
                reason: "unsupported signing-certificate hash algorithm".to_string(),
            })
    })
    .transpose()?;

    let content = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .map(|any| decode_any::<OctetString>(any).map(|os| os.as_bytes().to_vec()))
        .transpose()
        .map_err(malformed)?;

    Ok(ParsedEnvelope {
        signer,
        digest_algorithm,
        signature_algorithm,
        signed_attrs_der: signed_attrs.to_der().map_err(malformed)?,
        signature: signer_info.signature.as_bytes().to_vec(),
        message_digest: message_digest.as_bytes().to_vec(),
        signing_cert_hash,
        signing_time,
        content,
    })
}

/// Algorithm identifiers outside the signed attributes are not covered by
/// the signature, so every byte of them is pinned down here.
fn check_algorithms(
    signed_data: &SignedData,
    signer_info: &SignerInfo,
    digest_algorithm: DigestAlgorithm,
    signature_algorithm: SignatureAlgorithm,
) -> Result<(), VerifyError> {
    let digest_alg = &signer_info.digest_alg;
    // SHA-2 parameters are absent, NULL is tolerated on input
    if !(digest_alg.parameters.is_none() || is_null(&digest_alg.parameters)) {
        return Err(VerifyError::Malformed {
            reason: "digest algorithm parameters must be absent".to_string(),
        });
    }
    if !signed_data.digest_algorithms.iter().any(|alg| alg == digest_alg) {
        return Err(VerifyError::Malformed {
            reason: format!("digest algorithm {} not listed in SignedData", digest_alg.oid),
        });
    }
    if signature_algorithm.digest_algorithm() != digest_algorithm {
        return Err(VerifyError::Malformed {
            reason: format!(
                "signature algorithm {:?} does not use digest {:?}",
                signature_algorithm, digest_algorithm
            ),
        });
    }

    let params = &signer_info.signature_algorithm.parameters;
    let params_ok = if signature_algorithm.is_rsa() {
        params.is_none() || is_null(params)
    } else {
        params.is_none()
    };
    if !params_ok {
        return Err(VerifyError::Malformed {
            reason: format!("unexpected parameters for {:?}", signature_algorithm),
        });
    }
    Ok(())
}

fn is_null(params: &Option<Any>) -> bool {
    params.as_ref().is_some_and(|p| *p == Any::null())
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute, SignError> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value]).map_err(encoding)?,
    })
}

/// UTCTime through 2049, GeneralizedTime after
fn time_value(at: DateTime<Utc>) -> Result<Any, SignError> {
    let secs = u64::try_from(at.timestamp()).map_err(|_| SignError::ProviderFailure {
        reason: "signing time before 1970".to_string(),
    })?;
    let dt = der::DateTime::from_unix_duration(std::time::Duration::from_secs(secs))
        .map_err(encoding)?;
    let time = if at.year() < 2050 {
        Time::UtcTime(UtcTime::from_date_time(dt).map_err(encoding)?)
    } else {
        Time::GeneralTime(GeneralizedTime::from_date_time(dt))
    };
    Any::encode_from(&time).map_err(encoding)
}

fn find_attr(attrs: &SignedAttributes, oid: ObjectIdentifier) -> Option<&Any> {
    attrs
        .iter()
        .find(|attr| attr.oid == oid)
        .and_then(|attr| attr.values.iter().next())
}

fn required_attr<T: DecodeOwned>(attrs: &SignedAttributes, oid: ObjectIdentifier) -> Result<T, VerifyError> {
    let value = find_attr(attrs, oid).ok_or_else(|| VerifyError::Malformed {
        reason: format!("required signed attribute {oid} missing"),
    })?;
    decode_any(value).map_err(malformed)
}

fn optional_attr<T: DecodeOwned>(
    attrs: &SignedAttributes,
    oid: ObjectIdentifier,
) -> Result<Option<T>, VerifyError> {
    find_attr(attrs, oid)
        .map(decode_any)
        .transpose()
        .map_err(malformed)
}

fn decode_any<T: DecodeOwned>(any: &Any) -> der::Result<T> {
    T::from_der(&any.to_der()?)
}

fn to_datetime(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .unwrap_or_default()
}

fn encoding(e: der::Error) -> SignError {
    SignError::ProviderFailure {
        reason: format!("failed to encode envelope: {e}"),
    }
}

fn malformed(e: der::Error) -> VerifyError {
    VerifyError::Malformed {
        reason: e.to_string(),
    }
}
