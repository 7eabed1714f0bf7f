use super::{Certificate, StoreLocation};

/// Snapshot of one store's certificates.
///
/// Indexing is 1-based; entries keep the order the store reported them in,
/// so an index stays stable for as long as the snapshot lives.
#[derive(Debug, Clone)]
pub struct CertificateCollection {
    location: StoreLocation,
    items: Vec<Certificate>,
}

impl CertificateCollection {
    pub fn new(location: StoreLocation, items: Vec<Certificate>) -> Self {
        Self { location, items }
    }

    pub fn location(&self) -> StoreLocation {
        self.location
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Certificate at the 1-based `index`, `None` outside `1..=count`
    pub fn item(&self, index: usize) -> Option<&Certificate> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }

    /// `(index, certificate)` pairs with 1-based indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Certificate)> {
        self.items.iter().enumerate().map(|(i, cert)| (i + 1, cert))
    }

    pub fn contains_der(&self, der: &[u8]) -> bool {
        self.items.iter().any(|cert| cert.der() == der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures;
    use crate::model::StoreScope;

    fn collection() -> CertificateCollection {
        CertificateCollection::new(
            StoreLocation::personal(StoreScope::CurrentUser),
            vec![
                Certificate::from_pem(fixtures::SIGNER_P256_CERT).unwrap(),
                Certificate::from_pem(fixtures::SIGNER_RSA_CERT).unwrap(),
            ],
        )
    }

    #[test]
    fn test_one_based_indexing() {
        let c = collection();
        assert_eq!(c.count(), 2);
        assert!(c.item(0).is_none());
        assert!(c.item(1).unwrap().subject().contains("Ivan Petrov"));
        assert!(c.item(2).unwrap().subject().contains("Petr Ivanov"));
        assert!(c.item(3).is_none());
    }

    #[test]
    fn test_iter_yields_indices() {
        let indices: Vec<usize> = collection().iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
