use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::{Thumbprint, ThumbprintError};

/// How a caller picks a signing certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSelector {
    /// 1-based position in the personal store
    Index(usize),
    /// SHA-1 thumbprint, case-insensitive
    Thumbprint(Thumbprint),
}

impl FromStr for CertificateSelector {
    type Err = SelectorError;

    /// Accepts `index:N`, `thumbprint:HEX`, a bare number or a bare
    /// 40-digit thumbprint.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("index:") {
            return parse_index(rest);
        }
        if let Some(rest) = s.strip_prefix("thumbprint:") {
            return Ok(CertificateSelector::Thumbprint(Thumbprint::parse(rest)?));
        }
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) && s.len() < 40 {
            return parse_index(s);
        }
        Ok(CertificateSelector::Thumbprint(Thumbprint::parse(s)?))
    }
}

impl fmt::Display for CertificateSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateSelector::Index(i) => write!(f, "index:{i}"),
            CertificateSelector::Thumbprint(t) => write!(f, "thumbprint:{t}"),
        }
    }
}

fn parse_index(s: &str) -> Result<CertificateSelector, SelectorError> {
    let index: usize = s.trim().parse().map_err(|_| SelectorError::InvalidIndex {
        value: s.to_string(),
    })?;
    if index == 0 {
        return Err(SelectorError::InvalidIndex {
            value: s.to_string(),
        });
    }
    Ok(CertificateSelector::Index(index))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("certificate index must be a positive integer, got {value:?}")]
    InvalidIndex { value: String },

    #[error(transparent)]
    Thumbprint(#[from] ThumbprintError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            "index:2".parse::<CertificateSelector>().unwrap(),
            CertificateSelector::Index(2)
        );
        assert_eq!(
            "3".parse::<CertificateSelector>().unwrap(),
            CertificateSelector::Index(3)
        );
        assert_eq!(
            "thumbprint:abcd1234".parse::<CertificateSelector>().unwrap(),
            CertificateSelector::Thumbprint(Thumbprint::parse("ABCD1234").unwrap())
        );
    }

    #[test]
    fn test_zero_index_rejected() {
        assert!(matches!(
            "index:0".parse::<CertificateSelector>(),
            Err(SelectorError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_display_roundtrips() {
        let sel = CertificateSelector::Index(7);
        assert_eq!(sel.to_string().parse::<CertificateSelector>().unwrap(), sel);
    }
}
