use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Storage backend behind the credential store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackendKind {
    /// Process-local map. Nothing survives a restart.
    Memory,
    /// SQLite file, encrypted record by record.
    #[default]
    Sqlite,
}

/// Proof system used for requests, credentials and presentations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProofSystem {
    /// BBS+ signatures over BN254.
    #[default]
    Bbs,
}

/// Configuration for the credential vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub backend: VaultBackendKind,

    /// Database file. Relative paths resolve against `data_dir`.
    #[serde(
        default = "default_vault_file",
        skip_serializing_if = "Option::is_none"
    )]
    pub path: Option<PathBuf>,
}

fn default_vault_file() -> Option<PathBuf> {
    Some(PathBuf::from("vault.db"))
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: VaultBackendKind::default(),
            path: default_vault_file(),
        }
    }
}

/// Configuration for the holder itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderConfig {
    #[serde(default)]
    pub proof_system: ProofSystem,

    /// Id of the link secret bound into every credential.
    #[serde(default = "default_link_secret_id")]
    pub link_secret_id: String,

    /// DID presented to issuers in credential requests.
    #[serde(default = "default_did")]
    pub did: String,
}

fn default_link_secret_id() -> String {
    "default".to_string()
}

fn default_did() -> String {
    "did:vouch:holder".to_string()
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            proof_system: ProofSystem::default(),
            link_secret_id: default_link_secret_id(),
            did: default_did(),
        }
    }
}

/// Top-level configuration for the Vouch holder.
///
/// Loaded from a TOML file (typically `~/.vouch/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Directory for the root key and the vault database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub holder: HolderConfig,
}

fn default_data_dir() -> PathBuf {
    dirs_or_default(".vouch")
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            vault: VaultConfig::default(),
            holder: HolderConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.holder.link_secret_id.trim().is_empty() {
            return Err(RootError::Config("link_secret_id must not be empty".into()));
        }
        if self.holder.did.trim().is_empty() {
            return Err(RootError::Config("holder did must not be empty".into()));
        }
        if self.vault.backend == VaultBackendKind::Sqlite && self.vault.path.is_none() {
            return Err(RootError::Config(
                "the sqlite backend needs vault.path".into(),
            ));
        }
        Ok(())
    }

    /// Database file with relative paths resolved against `data_dir`.
    pub fn vault_path(&self) -> Option<PathBuf> {
        self.vault.path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.data_dir.join(p)
            }
        })
    }

    /// Hex root key of the vault's key hierarchy.
    pub fn root_key_path(&self) -> PathBuf {
        self.data_dir.join("root.key")
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".vouch/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RootConfig::default();
        assert!(config.data_dir.to_str().unwrap().contains(".vouch"));
        assert_eq!(config.vault.backend, VaultBackendKind::Sqlite);
        assert_eq!(config.holder.proof_system, ProofSystem::Bbs);
        assert_eq!(config.holder.link_secret_id, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
data_dir = "/tmp/test-vouch"

[vault]
backend = "memory"

[holder]
proof_system = "bbs"
link_secret_id = "main"
"#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/test-vouch"));
        assert_eq!(config.vault.backend, VaultBackendKind::Memory);
        assert_eq!(config.holder.link_secret_id, "main");
        assert_eq!(config.holder.did, "did:vouch:holder");
    }

    #[test]
    fn test_unknown_proof_system_rejected() {
        let toml_str = r#"
[holder]
proof_system = "cl"
"#;
        assert!(toml::from_str::<RootConfig>(toml_str).is_err());
    }

    #[test]
    fn test_config_validate_empty_link_secret_id() {
        let mut config = RootConfig::default();
        config.holder.link_secret_id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_sqlite_without_path() {
        let mut config = RootConfig::default();
        config.vault.path = None;
        assert!(config.validate().is_err());

        config.vault.backend = VaultBackendKind::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_vault_path_resolution() {
        let mut config = RootConfig {
            data_dir: PathBuf::from("/srv/vouch"),
            ..Default::default()
        };
        assert_eq!(
            config.vault_path(),
            Some(PathBuf::from("/srv/vouch/vault.db"))
        );

        config.vault.path = Some(PathBuf::from("/var/lib/vouch.db"));
        assert_eq!(config.vault_path(), Some(PathBuf::from("/var/lib/vouch.db")));
        assert_eq!(config.root_key_path(), PathBuf::from("/srv/vouch/root.key"));
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = RootConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.holder.link_secret_id, "default");
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join("vouch-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let config = RootConfig {
            data_dir: dir.clone(),
            vault: VaultConfig {
                backend: VaultBackendKind::Memory,
                path: None,
            },
            holder: HolderConfig {
                link_secret_id: "work".into(),
                ..Default::default()
            },
        };
        config.save(&path).unwrap();

        let loaded = RootConfig::load(&path).unwrap();
        assert_eq!(loaded.data_dir, dir);
        assert_eq!(loaded.vault.backend, VaultBackendKind::Memory);
        assert_eq!(loaded.holder.link_secret_id, "work");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
