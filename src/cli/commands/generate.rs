//! `passh generate`: generate a random password, store it, print it.

use crate::cli::{generate_length, generator, key_config, keyring_for_encryption, load_settings};
use crate::cli::{open_store, Cli};
use crate::errors::Result;
use crate::store::EntryName;

/// Execute the `generate` command.
pub fn execute(cli: &Cli, name: &str, length: Option<usize>, no_symbols: bool) -> Result<()> {
    EntryName::parse(name)?;

    let settings = load_settings()?;
    let length = generate_length(length, &settings);
    let symbols = settings.generate_symbols && !no_symbols;
    let secret = generator::generate(length, symbols)?;

    let keys = key_config(cli, &settings);
    let keyring = keyring_for_encryption(&keys)?;
    let store = open_store(cli, &settings)?;
    store.add(&keyring, name, secret.as_bytes())?;

    println!("{}", secret.as_str());
    Ok(())
}
