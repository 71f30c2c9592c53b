//! Configuration: the TOML `Settings` file and the resolved `KeyConfig`
//! handed to the keyring.

pub mod settings;

use std::path::{Path, PathBuf};

pub use settings::Settings;

/// Environment variable the agent socket is discovered from.
pub const AGENT_SOCK_VAR: &str = "SSH_AUTH_SOCK";

/// Which key files and agent a keyring should use.
///
/// Built once per invocation from `Settings`, command-line overrides and
/// the environment, then passed explicitly to `KeyRing::new`.
#[derive(Debug, Clone, Default)]
pub struct KeyConfig {
    /// Public key file used as the encryption recipient.
    pub public_key: Option<PathBuf>,
    /// Private key file used for decryption.
    pub private_key: Option<PathBuf>,
    pub use_agent: bool,
    pub agent_socket: Option<PathBuf>,
}

impl KeyConfig {
    /// Resolve key paths: explicit overrides win, otherwise the first file
    /// from the settings' lookup tables that exists under `ssh_dir`.
    pub fn resolve(
        settings: &Settings,
        public_key: Option<&Path>,
        private_key: Option<&Path>,
        no_agent: bool,
    ) -> Self {
        let ssh_dir = settings.ssh_dir();

        let public_key = public_key
            .map(Path::to_path_buf)
            .or_else(|| first_existing(&ssh_dir, &settings.public_keys));
        let private_key = private_key
            .map(Path::to_path_buf)
            .or_else(|| first_existing(&ssh_dir, &settings.private_keys));

        let agent_socket = std::env::var_os(AGENT_SOCK_VAR)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            public_key,
            private_key,
            use_agent: settings.use_agent && !no_agent,
            agent_socket,
        }
    }
}

/// The first `dir/<name>` that exists, in table order.
pub fn first_existing(dir: &Path, names: &[String]) -> Option<PathBuf> {
    names.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}
