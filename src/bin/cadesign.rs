use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use cadesign::{
    CadesError, CertificateSelector, Pin, ServiceConfig, SignRequest, SignatureEnvelope,
    SigningService, StoreName, StoreScope, Thumbprint,
};

/// Exit code for a signature that parsed but did not verify
const EXIT_INVALID: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "cadesign")]
#[command(about = "CAdES-BES document signing with a certificate trust store", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Trust store root directory (overrides the config file)
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Store scope (overrides the config file)
    #[arg(long, global = true)]
    pub scope: Option<ScopeArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List certificates in the personal store (or the root store)
    List {
        /// List trusted roots instead of personal certificates
        #[arg(long)]
        root: bool,
    },

    /// Sign a file
    Sign {
        file: PathBuf,

        /// 1-based position in the personal store
        #[arg(long, conflicts_with = "thumbprint", required_unless_present = "thumbprint")]
        index: Option<usize>,

        /// Certificate thumbprint (hex, any case)
        #[arg(long)]
        thumbprint: Option<String>,

        /// PIN of the private key
        #[arg(long)]
        pin: Option<String>,

        /// Leave the content out of the envelope
        #[arg(long)]
        detached: bool,

        /// Skip validity and trust checks (reduced assurance)
        #[arg(long)]
        no_check_certificate: bool,

        /// Output path, defaults to <FILE>.sig
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Verify a signature file
    Verify {
        signature: PathBuf,

        /// Original document, required for detached signatures
        #[arg(long)]
        original: Option<PathBuf>,
    },

    /// Verify an enveloping signature and extract its content
    Unwrap {
        signature: PathBuf,

        /// Output path, defaults to the signature name without .sig
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Add a root certificate (.cer, .crt, .der, .pem or .p7b) to the trusted roots
    InstallRoot { file: PathBuf },

    /// Add a certificate with its private key to the personal store
    InstallKey {
        /// PEM bundle with certificate and PKCS#8 key
        file: PathBuf,

        /// PIN of an encrypted key
        #[arg(long)]
        pin: Option<String>,
    },

    /// Show version and store details
    Info,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    CurrentUser,
    LocalMachine,
}

impl From<ScopeArg> for StoreScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::CurrentUser => StoreScope::CurrentUser,
            ScopeArg::LocalMachine => StoreScope::LocalMachine,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level_filter())
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path).map_err(CadesError::from)?,
        None => ServiceConfig::default(),
    };
    if let Some(root) = &cli.store_root {
        config.store_root = root.clone();
    }
    if let Some(scope) = cli.scope {
        config.scope = scope.into();
    }
    debug!(?config, "Loaded configuration");
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    let service = SigningService::open(config).map_err(CadesError::from)?;

    match cli.command {
        Commands::List { root } => {
            let name = if root { StoreName::Root } else { StoreName::My };
            let certificates = service.list_certificates(name).await?;
            print_json(&certificates)?;
        }

        Commands::Sign {
            file,
            index,
            thumbprint,
            pin,
            detached,
            no_check_certificate,
            out,
        } => {
            let selector = match (index, thumbprint) {
                (Some(index), _) => CertificateSelector::Index(index),
                (None, Some(hex)) => CertificateSelector::Thumbprint(
                    Thumbprint::parse(&hex).map_err(CadesError::from)?,
                ),
                (None, None) => anyhow::bail!("either --index or --thumbprint is required"),
            };
            let document = read_file(&file)?;
            let request = SignRequest::new(document, file_name(&file), selector)
                .with_pin(parse_pin(pin)?)
                .detached(detached)
                .check_certificate(!no_check_certificate);

            let outcome = service.sign(request).await?;
            let target = out.unwrap_or_else(|| file.with_file_name(&outcome.filename));
            fs::write(&target, &outcome.signed_content)
                .with_context(|| format!("failed to write {}", target.display()))?;
            print_json(&outcome)?;
        }

        Commands::Verify {
            signature,
            original,
        } => {
            let envelope = read_envelope(&signature)?;
            let original = original.as_deref().map(read_file).transpose()?;
            let result = service
                .verify(envelope, original)
                .await
                .map_err(CadesError::from)?;
            print_json(&result)?;
            if !result.valid {
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        }

        Commands::Unwrap { signature, out } => {
            let envelope = read_envelope(&signature)?;
            let outcome = service
                .unwrap(envelope, file_name(&signature))
                .await
                .map_err(CadesError::from)?;
            if outcome.result.valid {
                let target = out.unwrap_or_else(|| signature.with_file_name(&outcome.filename));
                fs::write(&target, &outcome.result.recovered_content)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            }
            print_json(&outcome)?;
            if !outcome.result.valid {
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        }

        Commands::InstallRoot { file } => {
            let material = read_file(&file)?;
            let installed = service
                .install_root_certificate(material)
                .await
                .map_err(CadesError::from)?;
            print_json(&json!({ "installed": installed }))?;
        }

        Commands::InstallKey { file, pin } => {
            let bundle = read_file(&file)?;
            let thumbprint = service
                .install_private_key(file_name(&file), bundle, parse_pin(pin)?)
                .await
                .map_err(CadesError::from)?;
            print_json(&json!({ "thumbprint": thumbprint }))?;
        }

        Commands::Info => {
            print_json(&service.info())?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn parse_pin(pin: Option<String>) -> anyhow::Result<Option<Pin>> {
    Ok(pin
        .map(|p| p.parse::<Pin>())
        .transpose()
        .map_err(CadesError::from)?)
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_envelope(path: &Path) -> anyhow::Result<SignatureEnvelope> {
    let bytes = read_file(path)?;
    Ok(SignatureEnvelope::from_transport(&bytes).map_err(CadesError::from)?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Structured error payload on stderr; the kind is the taxonomy name when
/// the failure came from the library
fn report_error(e: &anyhow::Error) {
    let kind = e
        .downcast_ref::<CadesError>()
        .map(CadesError::kind)
        .unwrap_or("Io");
    let payload = json!({
        "error": {
            "kind": kind,
            "message": format!("{e:#}"),
        }
    });
    eprintln!("{payload}");
}
