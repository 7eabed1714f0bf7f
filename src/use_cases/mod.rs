//! Use cases (orchestration)
//!
//! Each use case coordinates the ports with the engine in `logic` for one
//! caller-facing operation. None of them keep state between calls.

mod install_material;
mod list_certificates;
mod sign_document;
mod verify_signature;

pub use install_material::{install_private_key, install_root_certificate};
pub use list_certificates::list_certificates;
pub use sign_document::{sign_document, sign_envelope, sign_with_thumbprint, SignOutcome, SignRequest};
pub use verify_signature::{unwrap_envelope, verify_envelope, UnwrapOutcome};
