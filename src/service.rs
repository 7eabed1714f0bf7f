//! Async façade over a signing backend
//!
//! Store and provider calls block (file system, native crypto). Each
//! request runs them on the tokio blocking pool, so one slow provider never
//! starves other requests. Provider-bound calls (list, sign, verify) are
//! bounded by the configured timeout. Installs always run to completion:
//! a blocking write cannot be cancelled, so a timeout would report failure
//! for material that still lands in the store. Nothing is cached between
//! requests.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::adapters::SoftStore;
use crate::config::ServiceConfig;
use crate::error::{CadesError, CadesResult, InstallError, SignError, StoreError, VerifyError};
use crate::model::{
    CertificateInfo, Pin, SignatureEnvelope, StoreLocation, StoreName, StoreScope, Thumbprint,
    VerificationResult,
};
use crate::ports::SigningBackend;
use crate::use_cases::{self, SignOutcome, SignRequest, UnwrapOutcome};

/// Version and backend details reported by `info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub version: String,
    pub provider: String,
    pub store_root: String,
    pub scope: StoreScope,
    pub check_certificate: bool,
}

pub struct SigningService<B> {
    backend: Arc<B>,
    config: ServiceConfig,
}

impl<B> Clone for SigningService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl SigningService<SoftStore> {
    /// Service over a [`SoftStore`] rooted at `config.store_root`, creating
    /// empty stores on first use
    pub fn open(config: ServiceConfig) -> Result<Self, StoreError> {
        let store = SoftStore::new(&config.store_root)
            .with_install_scope(config.scope)
            .with_busy_policy(config.busy_retries, config.busy_backoff());
        store.ensure_layout()?;
        Ok(Self::new(store, config))
    }
}

impl<B> SigningService<B>
where
    B: SigningBackend + Send + Sync + 'static,
{
    pub fn new(backend: B, config: ServiceConfig) -> Self {
        Self::with_shared(Arc::new(backend), config)
    }

    pub fn with_shared(backend: Arc<B>, config: ServiceConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub async fn list_certificates(&self, name: StoreName) -> CadesResult<Vec<CertificateInfo>> {
        let scope = self.config.scope;
        let store = StoreLocation::new(scope, name).to_string();
        let busy = store.clone();
        self.run(
            move |backend| use_cases::list_certificates(backend, scope, name),
            move |_| CadesError::from(StoreError::Busy { store: busy }),
            move |reason| CadesError::from(StoreError::Io { store, reason }),
        )
        .await
    }

    /// Sign a document. A service configured with `check_certificate =
    /// false` signs every request with reduced assurance.
    pub async fn sign(&self, mut request: SignRequest) -> CadesResult<SignOutcome> {
        if !self.config.check_certificate {
            request.check_certificate = false;
        }
        let scope = self.config.scope;
        self.run(
            move |backend| use_cases::sign_document(backend, scope, &request),
            |after_ms| CadesError::from(SignError::Timeout { after_ms }),
            |reason| CadesError::from(SignError::ProviderFailure { reason }),
        )
        .await
    }

    pub async fn verify(
        &self,
        envelope: SignatureEnvelope,
        original: Option<Vec<u8>>,
    ) -> Result<VerificationResult, VerifyError> {
        self.run(
            move |backend| use_cases::verify_envelope(backend, &envelope, original.as_deref()),
            |after_ms| VerifyError::Timeout { after_ms },
            |reason| VerifyError::ProviderFailure { reason },
        )
        .await
    }

    pub async fn unwrap(
        &self,
        envelope: SignatureEnvelope,
        file_name: String,
    ) -> Result<UnwrapOutcome, VerifyError> {
        self.run(
            move |backend| use_cases::unwrap_envelope(backend, &envelope, &file_name),
            |after_ms| VerifyError::Timeout { after_ms },
            |reason| VerifyError::ProviderFailure { reason },
        )
        .await
    }

    pub async fn install_root_certificate(
        &self,
        material: Vec<u8>,
    ) -> Result<Vec<Thumbprint>, InstallError> {
        self.run_to_completion(
            move |backend| use_cases::install_root_certificate(backend, &material),
            install_panicked,
        )
        .await
    }

    pub async fn install_private_key(
        &self,
        file_name: String,
        bundle: Vec<u8>,
        pin: Option<Pin>,
    ) -> Result<Thumbprint, InstallError> {
        self.run_to_completion(
            move |backend| {
                use_cases::install_private_key(backend, &file_name, &bundle, pin.as_ref())
            },
            install_panicked,
        )
        .await
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            provider: self.backend.name().to_string(),
            store_root: self.config.store_root.display().to_string(),
            scope: self.config.scope,
            check_certificate: self.config.check_certificate,
        }
    }

    /// Run `op` on the blocking pool, bounded by the provider timeout
    fn run<T, E, F, TE, PE>(
        &self,
        op: F,
        on_timeout: TE,
        on_panic: PE,
    ) -> impl Future<Output = Result<T, E>> + Send + 'static
    where
        F: FnOnce(&B) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        TE: FnOnce(u64) -> E + Send + 'static,
        PE: FnOnce(String) -> E + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let limit = self.config.provider_timeout();
        let after_ms = self.config.provider_timeout_ms;

        async move {
            let task = tokio::task::spawn_blocking(move || op(backend.as_ref()));
            match tokio::time::timeout(limit, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    warn!(error = %join_error, "Backend worker failed");
                    Err(on_panic(join_error.to_string()))
                }
                Err(_) => {
                    warn!(after_ms, "Backend call timed out");
                    Err(on_timeout(after_ms))
                }
            }
        }
    }

    /// Run `op` on the blocking pool and wait for it however long it takes
    async fn run_to_completion<T, E, F, PE>(&self, op: F, on_panic: PE) -> Result<T, E>
    where
        F: FnOnce(&B) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        PE: FnOnce(String) -> E,
    {
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || op(backend.as_ref())).await {
            Ok(result) => result,
            Err(join_error) => {
                warn!(error = %join_error, "Backend worker failed");
                Err(on_panic(join_error.to_string()))
            }
        }
    }
}

fn install_panicked(reason: String) -> InstallError {
    InstallError::Store(StoreError::Io {
        store: "install".to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake_store::FakeStore;
    use crate::adapters::fixtures;
    use crate::model::{AssuranceMode, CertificateSelector};
    use crate::ports::TrustStore;
    use std::time::Duration;

    fn config() -> ServiceConfig {
        ServiceConfig {
            provider_timeout_ms: 5_000,
            ..ServiceConfig::default()
        }
    }

    fn service() -> SigningService<FakeStore> {
        SigningService::new(
            FakeStore::new().with_signer(fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY),
            config(),
        )
    }

    fn request(detached: bool) -> SignRequest {
        SignRequest::new(b"hello".to_vec(), "hello.txt", CertificateSelector::Index(1))
            .detached(detached)
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let service = service();
        let outcome = service.sign(request(true)).await.unwrap();
        let result = service
            .verify(outcome.envelope, Some(b"hello".to_vec()))
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.recovered_content, b"hello");
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let service = service();
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move { service.sign(request(i % 2 == 0)).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(service.backend.sign_calls(), 8);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let backend = FakeStore::new()
            .with_signer(fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY)
            .with_sign_delay(Duration::from_millis(300));
        let service = SigningService::new(
            backend,
            ServiceConfig {
                provider_timeout_ms: 20,
                ..ServiceConfig::default()
            },
        );

        let err = service.sign(request(false)).await.unwrap_err();
        assert_eq!(err, CadesError::Sign(SignError::Timeout { after_ms: 20 }));
    }

    #[tokio::test]
    async fn test_store_errors_surface() {
        let service = SigningService::new(
            FakeStore::failing_open(StoreError::Busy {
                store: "current_user/my".to_string(),
            }),
            config(),
        );
        assert!(matches!(
            service.list_certificates(StoreName::My).await,
            Err(CadesError::Store(StoreError::Busy { .. }))
        ));
        assert!(matches!(
            service.sign(request(false)).await,
            Err(CadesError::Store(StoreError::Busy { .. }))
        ));
    }

    #[tokio::test]
    async fn test_config_disables_certificate_check() {
        let backend = FakeStore::new().with_signer(fixtures::EXPIRED_CERT, fixtures::EXPIRED_KEY);
        let service = SigningService::new(
            backend,
            ServiceConfig {
                check_certificate: false,
                ..config()
            },
        );
        let outcome = service.sign(request(false)).await.unwrap();
        assert_eq!(outcome.assurance, AssuranceMode::Reduced);
    }

    #[tokio::test]
    async fn test_install_and_list() {
        let service = SigningService::new(FakeStore::new(), config());
        service
            .install_root_certificate(fixtures::ROOT_CA_P7B.to_vec())
            .await
            .unwrap();
        service
            .install_private_key(
                "rsa.pem".to_string(),
                fixtures::bundle(fixtures::SIGNER_RSA_CERT, fixtures::SIGNER_RSA_KEY),
                None,
            )
            .await
            .unwrap();

        let personal = service.list_certificates(StoreName::My).await.unwrap();
        let roots = service.list_certificates(StoreName::Root).await.unwrap();
        assert_eq!(personal.len(), 1);
        assert_eq!(roots.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_install_is_not_cut_short() {
        let backend = FakeStore::new().with_install_delay(Duration::from_millis(100));
        let service = SigningService::new(
            backend,
            ServiceConfig {
                provider_timeout_ms: 10,
                ..ServiceConfig::default()
            },
        );

        let installed = service
            .install_root_certificate(fixtures::ROOT_CA_DER.to_vec())
            .await
            .unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(
            service.backend.open(StoreScope::CurrentUser, StoreName::Root).unwrap().count(),
            1
        );
    }

    #[tokio::test]
    async fn test_verify_surfaces_unreadable_roots() {
        let signer = service();
        let outcome = signer.sign(request(false)).await.unwrap();

        let busy = StoreError::Busy {
            store: "current_user/root".to_string(),
        };
        let verifier = SigningService::new(
            FakeStore::new()
                .with_signer(fixtures::SIGNER_P256_CERT, fixtures::SIGNER_P256_KEY)
                .with_roots_failure(busy.clone()),
            config(),
        );
        assert_eq!(
            verifier.verify(outcome.envelope, None).await.unwrap_err(),
            VerifyError::Store(busy)
        );
    }

    #[tokio::test]
    async fn test_unwrap() {
        let service = service();
        let outcome = service.sign(request(false)).await.unwrap();
        let unwrapped = service
            .unwrap(outcome.envelope, outcome.filename)
            .await
            .unwrap();
        assert_eq!(unwrapped.filename, "hello.txt");
        assert_eq!(unwrapped.result.recovered_content, b"hello");
    }

    #[test]
    fn test_info() {
        let info = service().info();
        assert_eq!(info.provider, "fake");
        assert_eq!(info.scope, StoreScope::CurrentUser);
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }
}
