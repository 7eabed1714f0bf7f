//! Certificate lookup inside an opened collection

use crate::error::LocateError;
use crate::model::{Certificate, CertificateCollection, CertificateSelector, Thumbprint};

/// Certificate at 1-based `index`.
///
/// An empty collection is `EmptyStore` for every index, so callers can
/// tell "nothing installed" from a bad index.
pub fn by_index(collection: &CertificateCollection, index: usize) -> Result<&Certificate, LocateError> {
    if collection.is_empty() {
        return Err(LocateError::EmptyStore {
            store: collection.location().to_string(),
        });
    }
    collection
        .item(index)
        .ok_or(LocateError::IndexOutOfRange {
            index,
            count: collection.count(),
        })
}

/// First certificate whose thumbprint matches, ignoring case
pub fn by_thumbprint<'a>(
    collection: &'a CertificateCollection,
    thumbprint: &Thumbprint,
) -> Result<&'a Certificate, LocateError> {
    collection
        .iter()
        .map(|(_, cert)| cert)
        .find(|cert| cert.thumbprint() == thumbprint)
        .ok_or_else(|| LocateError::NotFound {
            criterion: format!("thumbprint {thumbprint}"),
        })
}

pub fn by_selector<'a>(
    collection: &'a CertificateCollection,
    selector: &CertificateSelector,
) -> Result<&'a Certificate, LocateError> {
    match selector {
        CertificateSelector::Index(index) => by_index(collection, *index),
        CertificateSelector::Thumbprint(thumbprint) => by_thumbprint(collection, thumbprint),
    }
}

/// Lowest-indexed certificate that has a private key.
///
/// This is a convenience policy for callers without a selector; nothing in
/// the envelope format requires it.
pub fn first_signing_certificate(
    collection: &CertificateCollection,
) -> Result<&Certificate, LocateError> {
    if collection.is_empty() {
        return Err(LocateError::EmptyStore {
            store: collection.location().to_string(),
        });
    }
    collection
        .iter()
        .map(|(_, cert)| cert)
        .find(|cert| cert.has_private_key())
        .ok_or_else(|| LocateError::NotFound {
            criterion: "certificate with a private key".to_string(),
        })
}
