//! TrustStore trait - capability to enumerate installed certificates

use crate::error::StoreError;
use crate::model::{CertificateCollection, StoreName, StoreScope};

/// Read access to the platform certificate stores
pub trait TrustStore {
    /// Open a named store and snapshot its certificates
    ///
    /// # Arguments
    ///
    /// * `scope` - Whose stores to open (current user or local machine)
    /// * `name` - Which store within the scope
    ///
    /// # Returns
    ///
    /// The certificates in the order the store reports them. An existing
    /// store with no certificates yields an empty collection, not an error.
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The platform refuses access (`AccessDenied`)
    /// - The store does not exist (`NotFound`)
    /// - An install holds the store past the retry budget (`Busy`)
    fn open(&self, scope: StoreScope, name: StoreName) -> Result<CertificateCollection, StoreError>;
}
