//! List certificates use case

use tracing::debug;

use crate::error::CadesResult;
use crate::model::{CertificateInfo, StoreName, StoreScope};
use crate::ports::TrustStore;

/// Describe every certificate in one store, in collection order.
///
/// An empty store yields an empty list; only a store that cannot be opened
/// is an error.
pub fn list_certificates<S>(
    store: &S,
    scope: StoreScope,
    name: StoreName,
) -> CadesResult<Vec<CertificateInfo>>
where
    S: TrustStore + ?Sized,
{
    let collection = store.open(scope, name)?;
    debug!(
        store = %collection.location(),
        count = collection.count(),
        "Opened certificate store"
    );
    Ok(collection
        .iter()
        .map(|(index, cert)| cert.info(index))
        .collect())
}
