//! `passh setup`: check the environment passh depends on.
//!
//! Reports on the store directory, the SSH key files that will be used,
//! and the agent.  The only thing it changes is creating the store
//! directory, and only after asking.

use std::io::{self, IsTerminal};

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{key_config, load_settings, store_dir, Cli};
use crate::config::KeyConfig;
use crate::errors::{PasshError, Result};
use crate::keyring::{fingerprint, parse_private_key, parse_public_key, KeyRing};
use crate::store::CredentialStore;

/// Execute the `setup` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = load_settings()?;
    let keys = key_config(cli, &settings);
    let root = store_dir(cli, &settings);

    println!("passh setup");
    println!();

    // 1. Store directory.
    if root.is_dir() {
        output::check("Store", true, &root.display().to_string());
    } else {
        output::check("Store", false, &format!("{} does not exist", root.display()));
        let create = io::stdin().is_terminal()
            && Confirm::new()
                .with_prompt(format!("Create {}?", root.display()))
                .default(true)
                .interact()
                .map_err(|e| PasshError::CommandFailed(format!("confirm prompt: {e}")))?;
        if create {
            CredentialStore::open(&root)?;
            output::success(&format!("Created {}", root.display()));
        }
    }

    // 2. Key files.
    let public_fp = check_public_key(&keys);
    let private_ok = check_private_key(&keys);

    // 3. Agent.
    let agent_has_key = check_agent(&keys, public_fp.as_deref());

    println!();
    if public_fp.is_none() || !(private_ok || agent_has_key) {
        output::tip("Generate a key with: ssh-keygen -t ed25519");
        output::tip("Or point passh at one with --public-key / --private-key");
        return Err(PasshError::Config("no usable SSH key pair found".into()));
    }
    if !agent_has_key {
        output::tip("Run `ssh-add` to let the agent unlock entries without a passphrase prompt");
    }
    output::success("passh is ready. Try: passh add example/password");
    Ok(())
}

/// Report the recipient key.  Returns its fingerprint when usable.
fn check_public_key(keys: &KeyConfig) -> Option<String> {
    let Some(path) = keys.public_key.as_deref() else {
        output::check("Public key", false, "none found");
        return None;
    };

    match std::fs::read(path).map_err(PasshError::from).and_then(|d| parse_public_key(&d)) {
        Ok(key) => {
            let fp = fingerprint(&key);
            output::check(
                "Public key",
                true,
                &format!("{} {} ({})", key.algorithm().as_str(), fp, path.display()),
            );
            Some(fp)
        }
        Err(e) => {
            output::check("Public key", false, &format!("{}: {e}", path.display()));
            None
        }
    }
}

/// Report the private key file without asking for its passphrase.
fn check_private_key(keys: &KeyConfig) -> bool {
    let Some(path) = keys.private_key.as_deref() else {
        output::check("Private key", false, "none found");
        return false;
    };

    match std::fs::read(path).map_err(PasshError::from).and_then(|d| parse_private_key(&d)) {
        Ok(key) => {
            let protection = if key.is_encrypted() {
                "passphrase protected"
            } else {
                "not passphrase protected"
            };
            output::check(
                "Private key",
                true,
                &format!("{} ({protection})", path.display()),
            );
            if !key.is_encrypted() {
                output::warning("Consider protecting your key: ssh-keygen -p -f <key>");
            }
            true
        }
        Err(e) => {
            output::check("Private key", false, &format!("{}: {e}", path.display()));
            false
        }
    }
}

/// Report the agent.  Returns whether it holds the recipient key.
fn check_agent(keys: &KeyConfig, public_fp: Option<&str>) -> bool {
    if !keys.use_agent {
        output::check("SSH agent", false, "disabled");
        return false;
    }
    let Some(socket) = keys.agent_socket.as_deref() else {
        output::check("SSH agent", false, "not running (SSH_AUTH_SOCK is not set)");
        output::tip("Start one with: eval `ssh-agent` && ssh-add");
        return false;
    };

    let mut ring = KeyRing::new(keys);
    match ring.add_agent_signers() {
        Ok(count) => {
            output::check(
                "SSH agent",
                true,
                &format!("{} ({count} identities)", socket.display()),
            );
            let holds_key = public_fp
                .map(|fp| ring.signers().iter().any(|s| s.fingerprint() == fp))
                .unwrap_or(false);
            if public_fp.is_some() {
                output::check(
                    "Agent holds your key",
                    holds_key,
                    if holds_key { "yes" } else { "no" },
                );
            }
            holds_key
        }
        Err(e) => {
            output::check("SSH agent", false, &e.to_string());
            false
        }
    }
}
