//! `passh add`: store a password, prompted for or generated.

use crate::cli::output;
use crate::cli::{generate_length, generator, key_config, keyring_for_encryption, load_settings};
use crate::cli::{open_store, prompt_secret, Cli};
use crate::errors::Result;
use crate::store::EntryName;

/// Execute the `add` command.
pub fn execute(cli: &Cli, name: &str, generate: bool, length: Option<usize>) -> Result<()> {
    // Fail on a bad name before prompting for anything.
    EntryName::parse(name)?;

    let settings = load_settings()?;
    let keys = key_config(cli, &settings);
    let keyring = keyring_for_encryption(&keys)?;

    let secret = if generate {
        let length = generate_length(length, &settings);
        generator::generate(length, settings.generate_symbols)?
    } else {
        prompt_secret(name)?
    };

    let store = open_store(cli, &settings)?;
    let existed = store.contains(name)?;
    store.add(&keyring, name, secret.as_bytes())?;

    if generate {
        println!("{}", secret.as_str());
    }
    if existed {
        output::success(&format!("Updated password '{name}'"));
    } else {
        output::success(&format!("Added password '{name}'"));
    }

    Ok(())
}
