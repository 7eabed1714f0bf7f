//! CAdES-BES signing against a certificate trust store
//!
//! Certificates are picked from a personal store by 1-based index or by
//! thumbprint, and documents are signed into CMS SignedData envelopes,
//! either enveloping (content embedded) or detached. Verification checks
//! the content digest, the signature and the signer's trust, and reports a
//! failed check as a result rather than an error.
//!
//! ```no_run
//! use cadesign::{CertificateSelector, ServiceConfig, SignRequest, SigningService};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SigningService::open(ServiceConfig::default())?;
//! let request = SignRequest::new(b"hello".to_vec(), "hello.txt", CertificateSelector::Index(1));
//! let outcome = service.sign(request).await?;
//! let result = service.verify(outcome.envelope, None).await?;
//! assert!(result.valid);
//! # Ok(())
//! # }
//! ```

mod adapters;
pub mod config;
pub mod error;
mod logic;
pub mod model;
pub mod ports;
pub mod service;
pub mod use_cases;

pub use adapters::SoftStore;
pub use config::ServiceConfig;
pub use error::{CadesError, CadesResult};
pub use logic::locator;
pub use model::*;
pub use service::{ServiceInfo, SigningService};
pub use use_cases::{SignOutcome, SignRequest, UnwrapOutcome};
