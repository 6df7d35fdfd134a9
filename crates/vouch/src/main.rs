use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use vouch::ledger::view_for_presentation;
use vouch::{
    initialize_root, CredentialHolder, InMemoryLedger, RootConfig, RootError, RootResult,
    VaultBackendKind,
};
use vouch_core::{CredentialDefinition, CredentialId, RevocationRegistryDefinition};
use vouch_cred::{CredentialData, CredentialOffer, CredentialRequestMetadata, StoreOptions};
use vouch_proof::{Presentation, PresentationRequest, RequestedCredentials};
use vouch_vault::mime::MimeTypes;

/// Vouch: a verifiable-credential holder
///
/// Stores credentials from issuers and answers presentation requests
/// with zero-knowledge proofs.
#[derive(Parser, Debug)]
#[command(name = "vouch", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the root key, the vault and default configuration
    Init {
        /// Data directory for the root key and vault
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Storage backend: memory or sqlite
        #[arg(long)]
        backend: Option<String>,
    },

    /// Build a credential request for an offer
    Request {
        #[arg(long)]
        offer: PathBuf,

        #[arg(long)]
        cred_def: PathBuf,

        /// DID sent to the issuer (defaults to holder.did)
        #[arg(long)]
        did: Option<String>,

        /// Where to write the request for the issuer
        #[arg(long)]
        out: PathBuf,

        /// Where to keep the metadata needed by `store`
        #[arg(long)]
        metadata_out: PathBuf,
    },

    /// Verify and store an issued credential
    Store {
        #[arg(long)]
        cred_def: PathBuf,

        #[arg(long)]
        credential: PathBuf,

        #[arg(long)]
        metadata: PathBuf,

        /// Revocation registry definition, for revocable credentials
        #[arg(long)]
        rev_reg_def: Option<PathBuf>,

        /// MIME type of an attribute, as attr=type (repeatable)
        #[arg(long = "mime", value_parser = parse_mime)]
        mime_types: Vec<(String, String)>,

        /// Credential id to use instead of a random one
        #[arg(long)]
        id: Option<String>,
    },

    /// Show a stored credential without signature material
    Get { id: String },

    /// Delete a stored credential
    Delete { id: String },

    /// Show recorded MIME types of a credential
    Mime {
        id: String,

        /// Only this attribute
        #[arg(long)]
        attribute: Option<String>,
    },

    /// Build a presentation for a request
    Present {
        #[arg(long)]
        request: PathBuf,

        /// Credential chosen per referent
        #[arg(long)]
        requested: PathBuf,

        /// Ledger document with schemas, definitions and registry states
        #[arg(long)]
        ledger: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Verify a presentation against its request
    Verify {
        #[arg(long)]
        presentation: PathBuf,

        #[arg(long)]
        request: PathBuf,

        #[arg(long)]
        ledger: PathBuf,
    },
}

fn parse_mime(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(attr, mime)| (attr.trim().to_string(), mime.trim().to_string()))
        .filter(|(attr, mime)| !attr.is_empty() && !mime.is_empty())
        .ok_or_else(|| format!("expected attr=type, got '{}'", s))
}

const LOG_TARGETS: [&str; 4] = ["vouch", "vouch_vault", "vouch_cred", "vouch_proof"];

/// Filter directive setting every vouch crate to `level`.
fn log_directive(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(log_directive("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_directive("info")))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RootResult<RootConfig> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> RootResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        RootError::Internal(format!("failed to read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RootResult<()> {
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents).map_err(|e| {
        RootError::Internal(format!("failed to write {}: {}", path.display(), e))
    })
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!(kind = %e.kind(), "{}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when a verification ran and failed.
fn run(cli: Cli) -> RootResult<bool> {
    let config_path = cli.config.as_ref();
    match cli.command {
        Commands::Init { data_dir, backend } => cmd_init(config_path, data_dir, backend),
        Commands::Request {
            offer,
            cred_def,
            did,
            out,
            metadata_out,
        } => cmd_request(config_path, &offer, &cred_def, did, &out, &metadata_out),
        Commands::Store {
            cred_def,
            credential,
            metadata,
            rev_reg_def,
            mime_types,
            id,
        } => cmd_store(
            config_path,
            &cred_def,
            &credential,
            &metadata,
            rev_reg_def.as_deref(),
            mime_types.into_iter().collect(),
            id,
        ),
        Commands::Get { id } => cmd_get(config_path, &id),
        Commands::Delete { id } => cmd_delete(config_path, &id),
        Commands::Mime { id, attribute } => cmd_mime(config_path, &id, attribute.as_deref()),
        Commands::Present {
            request,
            requested,
            ledger,
            out,
        } => cmd_present(config_path, &request, &requested, &ledger, &out),
        Commands::Verify {
            presentation,
            request,
            ledger,
        } => cmd_verify(&presentation, &request, &ledger),
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    data_dir: Option<PathBuf>,
    backend: Option<String>,
) -> RootResult<bool> {
    let mut config = load_config(config_path)?;

    if let Some(dd) = data_dir {
        config.data_dir = dd;
    }
    if let Some(b) = backend {
        config.vault.backend = match b.as_str() {
            "memory" => VaultBackendKind::Memory,
            "sqlite" => VaultBackendKind::Sqlite,
            other => {
                return Err(RootError::Config(format!(
                    "backend must be 'memory' or 'sqlite', got '{}'",
                    other
                )))
            }
        };
    }

    info!("initializing vouch");

    let state = initialize_root(config.clone())?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("Vouch initialized successfully.");
    println!("  Data dir:    {}", state.config.data_dir.display());
    println!("  Root key:    {}", state.config.root_key_path().display());
    println!("  Link secret: {}", state.config.holder.link_secret_id);
    println!("  Config:      {}", save_path.display());

    Ok(true)
}

fn cmd_request(
    config_path: Option<&PathBuf>,
    offer: &Path,
    cred_def: &Path,
    did: Option<String>,
    out: &Path,
    metadata_out: &Path,
) -> RootResult<bool> {
    let state = initialize_root(load_config(config_path)?)?;
    let offer: CredentialOffer = read_json(offer)?;
    let cred_def: CredentialDefinition = read_json(cred_def)?;
    let did = did.unwrap_or_else(|| state.config.holder.did.clone());

    let (request, metadata) = state
        .holder
        .create_credential_request(&offer, &cred_def, &did)?;
    write_json(out, &request)?;
    write_json(metadata_out, &metadata)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(metadata_out, perms);
    }

    println!("Credential request written to {}", out.display());
    println!("Keep {} until the credential is stored.", metadata_out.display());
    Ok(true)
}

fn cmd_store(
    config_path: Option<&PathBuf>,
    cred_def: &Path,
    credential: &Path,
    metadata: &Path,
    rev_reg_def: Option<&Path>,
    mime_types: MimeTypes,
    id: Option<String>,
) -> RootResult<bool> {
    let state = initialize_root(load_config(config_path)?)?;
    let cred_def: CredentialDefinition = read_json(cred_def)?;
    let data: CredentialData = read_json(credential)?;
    let metadata: CredentialRequestMetadata = read_json(metadata)?;
    let rev_reg_def: Option<RevocationRegistryDefinition> =
        rev_reg_def.map(read_json::<RevocationRegistryDefinition>).transpose()?;

    let options = StoreOptions {
        mime_types,
        credential_id: id.map(CredentialId::new),
    };
    let id = state.holder.store_credential(
        &cred_def,
        &data,
        &metadata,
        &options,
        rev_reg_def.as_ref(),
    )?;

    println!("{}", id);
    Ok(true)
}

fn cmd_get(config_path: Option<&PathBuf>, id: &str) -> RootResult<bool> {
    let state = initialize_root(load_config(config_path)?)?;
    let record = state.holder.get_credential(&CredentialId::new(id))?;
    println!("{}", serde_json::to_string_pretty(&record.info())?);
    Ok(true)
}

fn cmd_delete(config_path: Option<&PathBuf>, id: &str) -> RootResult<bool> {
    let state = initialize_root(load_config(config_path)?)?;
    state.holder.delete_credential(&CredentialId::new(id))?;
    println!("Deleted {}", id);
    Ok(true)
}

fn cmd_mime(
    config_path: Option<&PathBuf>,
    id: &str,
    attribute: Option<&str>,
) -> RootResult<bool> {
    let state = initialize_root(load_config(config_path)?)?;
    let id = CredentialId::new(id);
    match attribute {
        Some(attr) => match state.holder.mime_type_of(&id, attr)? {
            Some(mime) => println!("{}", mime),
            None => println!("(none)"),
        },
        None => {
            let all = state.holder.mime_types_of(&id)?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }
    Ok(true)
}

fn cmd_present(
    config_path: Option<&PathBuf>,
    request: &Path,
    requested: &Path,
    ledger: &Path,
    out: &Path,
) -> RootResult<bool> {
    let state = initialize_root(load_config(config_path)?)?;
    let request: PresentationRequest = read_json(request)?;
    let requested: RequestedCredentials = read_json(requested)?;
    let ledger = InMemoryLedger::load(ledger)?;

    let presentation = state
        .holder
        .create_presentation_resolved(&request, &requested, &ledger)?;
    write_json(out, &presentation)?;

    println!(
        "Presentation with {} sub-proof(s) written to {}",
        presentation.sub_proof_count(),
        out.display()
    );
    Ok(true)
}

fn cmd_verify(presentation: &Path, request: &Path, ledger: &Path) -> RootResult<bool> {
    let presentation: Presentation = read_json(presentation)?;
    let request: PresentationRequest = read_json(request)?;
    let ledger = InMemoryLedger::load(ledger)?;

    let view = view_for_presentation(&presentation, &ledger)?;
    let valid = vouch_proof::verify_presentation(&presentation, &request, &view)?;
    if valid {
        for (referent, attr) in &presentation.requested_proof.revealed_attrs {
            println!("{} = {}", referent, attr.raw);
        }
        println!("Presentation valid.");
    } else {
        println!("Presentation invalid.");
    }
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mime() {
        assert_eq!(
            parse_mime("photo=image/png").unwrap(),
            ("photo".to_string(), "image/png".to_string())
        );
        assert!(parse_mime("photo").is_err());
        assert!(parse_mime("=image/png").is_err());
    }

    #[test]
    fn test_log_directive_covers_every_crate() {
        assert_eq!(
            log_directive("info"),
            "vouch=info,vouch_vault=info,vouch_cred=info,vouch_proof=info"
        );
    }

    #[test]
    fn test_cli_parses_store() {
        let cli = Cli::try_parse_from([
            "vouch",
            "store",
            "--cred-def",
            "cd.json",
            "--credential",
            "cred.json",
            "--metadata",
            "meta.json",
            "--mime",
            "photo=image/png",
        ])
        .unwrap();
        match cli.command {
            Commands::Store { mime_types, .. } => {
                assert_eq!(mime_types, vec![("photo".into(), "image/png".into())]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
