use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Secret that unlocks a PIN-protected private key.
///
/// Any non-empty string is accepted; whether it is right is the
/// provider's call. Never logged or printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(Vec<u8>);

impl Pin {
    pub const MAX_LENGTH: usize = 64;

    pub fn new(pin: Vec<u8>) -> Result<Self, PinError> {
        if pin.is_empty() {
            return Err(PinError::Empty);
        }
        if pin.len() > Self::MAX_LENGTH {
            return Err(PinError::TooLong);
        }
        Ok(Self(pin))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Pin {
    type Err = PinError;

    fn from_str(pin: &str) -> Result<Self, Self::Err> {
        Self::new(pin.as_bytes().to_vec())
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin([REDACTED])")
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    #[error("PIN must not be empty")]
    Empty,

    #[error("PIN must be at most {max} characters", max = Pin::MAX_LENGTH)]
    TooLong,
}
