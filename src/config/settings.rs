use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PasshError, Result};

/// User-level configuration, loaded from `<config_dir>/passh/config.toml`.
///
/// Every field has a sensible default so passh works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where entries are stored.  `~` is expanded.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Directory searched for key files.  `~` is expanded.
    #[serde(default = "default_ssh_dir")]
    pub ssh_dir: String,

    /// Private key file names, in lookup order.
    #[serde(default = "default_private_keys")]
    pub private_keys: Vec<String>,

    /// Public key file names, in lookup order.
    #[serde(default = "default_public_keys")]
    pub public_keys: Vec<String>,

    /// Consult `ssh-agent` for signing identities.
    #[serde(default = "default_use_agent")]
    pub use_agent: bool,

    /// Default length for generated secrets.
    #[serde(default = "default_generate_length")]
    pub generate_length: usize,

    /// Include symbols in generated secrets by default.
    #[serde(default = "default_generate_symbols")]
    pub generate_symbols: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_store_dir() -> String {
    "~/.passh".to_string()
}

fn default_ssh_dir() -> String {
    "~/.ssh".to_string()
}

fn default_private_keys() -> Vec<String> {
    ["id_ed25519", "id_ecdsa", "id_rsa"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_public_keys() -> Vec<String> {
    default_private_keys()
        .into_iter()
        .map(|s| format!("{s}.pub"))
        .collect()
}

fn default_use_agent() -> bool {
    true
}

fn default_generate_length() -> usize {
    16
}

fn default_generate_symbols() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            ssh_dir: default_ssh_dir(),
            private_keys: default_private_keys(),
            public_keys: default_public_keys(),
            use_agent: default_use_agent(),
            generate_length: default_generate_length(),
            generate_symbols: default_generate_symbols(),
        }
    }
}

impl Settings {
    /// Environment variable naming an explicit config file.
    pub const ENV_VAR: &'static str = "PASSH_CONFIG";

    /// Load settings from `path`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PasshError::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;

        Ok(settings)
    }

    /// Load from `$PASSH_CONFIG`, or the platform config directory.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// `$PASSH_CONFIG` if set, else `<config_dir>/passh/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(Self::ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|dir| dir.join("passh").join("config.toml"))
    }

    /// The store root with `~` expanded.
    pub fn store_dir(&self) -> PathBuf {
        expand_home(&self.store_dir)
    }

    /// The key directory with `~` expanded.
    pub fn ssh_dir(&self) -> PathBuf {
        expand_home(&self.ssh_dir)
    }
}

/// Expand a leading `~` to the home directory.  Paths without one, or a
/// system without a home directory, are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };

    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.store_dir, "~/.passh");
        assert_eq!(s.private_keys, vec!["id_ed25519", "id_ecdsa", "id_rsa"]);
        assert_eq!(
            s.public_keys,
            vec!["id_ed25519.pub", "id_ecdsa.pub", "id_rsa.pub"]
        );
        assert!(s.use_agent);
        assert_eq!(s.generate_length, 16);
        assert!(s.generate_symbols);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(settings.ssh_dir, "~/.ssh");
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "store_dir = \"/srv/pw\"\nuse_agent = false\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.store_dir, "/srv/pw");
        assert!(!settings.use_agent);
        assert_eq!(settings.generate_length, 16);
        assert_eq!(settings.store_dir(), PathBuf::from("/srv/pw"));
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "not valid {{toml").unwrap();

        assert!(matches!(Settings::load(&path), Err(PasshError::Config(_))));
    }

    #[test]
    fn expand_home_leaves_other_paths_alone() {
        assert_eq!(expand_home("/etc/passh"), PathBuf::from("/etc/passh"));
        assert_eq!(expand_home("rel/~/x"), PathBuf::from("rel/~/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.passh"), home.join(".passh"));
        }
    }
}
