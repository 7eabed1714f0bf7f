//! Pure engine pieces: certificate lookup and the CAdES-BES envelope codec

pub(crate) mod cades;
pub mod locator;
