use std::path::Path;

/// Packaging of a private key handed to the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContainer {
    /// PEM text with a certificate and a PKCS#8 key (plain or encrypted)
    PemBundle,
    /// PKCS#12 / PFX archive
    Pfx,
}

impl KeyContainer {
    /// Guess the container from a file name extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pem" | "key" => Some(KeyContainer::PemBundle),
            "pfx" | "p12" => Some(KeyContainer::Pfx),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyContainer::PemBundle => "PEM bundle",
            KeyContainer::Pfx => "PKCS#12/PFX",
        }
    }
}
