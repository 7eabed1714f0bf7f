//! Test certificates and keys shared by unit tests
//!
//! All leaves are issued by the P-256 test root. `SIGNER_PIN_KEY` is an
//! encrypted PKCS#8 key protected by `SIGNER_PIN`.

pub const ROOT_CA_CERT: &str = include_str!("../../tests/fixtures/root_ca.crt");
pub const ROOT_CA_DER: &[u8] = include_bytes!("../../tests/fixtures/root_ca.der");
pub const ROOT_CA_P7B: &[u8] = include_bytes!("../../tests/fixtures/root_ca.p7b");

pub const SIGNER_P256_CERT: &str = include_str!("../../tests/fixtures/signer_p256.crt");
pub const SIGNER_P256_KEY: &str = include_str!("../../tests/fixtures/signer_p256.key");

pub const SIGNER_P384_CERT: &str = include_str!("../../tests/fixtures/signer_p384.crt");
pub const SIGNER_P384_KEY: &str = include_str!("../../tests/fixtures/signer_p384.key");

pub const SIGNER_RSA_CERT: &str = include_str!("../../tests/fixtures/signer_rsa.crt");
pub const SIGNER_RSA_KEY: &str = include_str!("../../tests/fixtures/signer_rsa.key");

pub const SIGNER_PIN_CERT: &str = include_str!("../../tests/fixtures/signer_pin.crt");
pub const SIGNER_PIN_KEY: &str = include_str!("../../tests/fixtures/signer_pin.key");
pub const SIGNER_PIN: &str = "12345678";

pub const EXPIRED_CERT: &str = include_str!("../../tests/fixtures/expired.crt");
pub const EXPIRED_KEY: &str = include_str!("../../tests/fixtures/expired.key");

pub const UNTRUSTED_CERT: &str = include_str!("../../tests/fixtures/untrusted.crt");
pub const UNTRUSTED_KEY: &str = include_str!("../../tests/fixtures/untrusted.key");

/// PEM bundle of a certificate followed by its key
pub fn bundle(cert: &str, key: &str) -> Vec<u8> {
    format!("{cert}\n{key}").into_bytes()
}
