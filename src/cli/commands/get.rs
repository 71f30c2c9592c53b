//! `passh get`: decrypt a password and print it to stdout.

use crate::cli::{existing_store, key_config, keyring_for_decryption, load_settings};
use crate::cli::{prompt_passphrase, Cli};
use crate::errors::{PasshError, Result};
use crate::keyring::KeyRing;
use crate::store::CredentialStore;

/// Execute the `get` command.
pub fn execute(cli: &Cli, name: &str) -> Result<()> {
    let settings = load_settings()?;
    let store = existing_store(cli, &settings);
    if !store.contains(name)? {
        return Err(PasshError::EntryNotFound(name.to_string()));
    }

    let keys = key_config(cli, &settings);
    let mut keyring = keyring_for_decryption(&keys)?;

    let secret = get_with_fallback(&store, &mut keyring, name)?;
    println!("{}", String::from_utf8_lossy(&secret));
    Ok(())
}

/// Decrypt `name`; if no loaded key matches and key files were skipped
/// in favour of the agent, unlock those and try again.
///
/// Entries written before the agent held a key only carry key-transport
/// slots, which need the key file itself.
fn get_with_fallback(
    store: &CredentialStore,
    keyring: &mut KeyRing,
    name: &str,
) -> Result<zeroize::Zeroizing<Vec<u8>>> {
    match store.get(keyring, name) {
        Err(PasshError::NoMatchingKey) if !keyring.deferred_keys().is_empty() => {
            for path in keyring.deferred_keys().to_vec() {
                tracing::debug!(path = %path.display(), "agent could not open entry, loading key file");
                let passphrase = prompt_passphrase(&path)?;
                keyring.add_file_signer(&path, Some(passphrase.as_bytes()))?;
            }
            store.get(keyring, name)
        }
        other => other,
    }
}
