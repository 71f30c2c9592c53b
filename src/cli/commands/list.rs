//! `passh list`: print every entry name, one per line.

use crate::cli::output;
use crate::cli::{existing_store, load_settings, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = load_settings()?;
    let store = existing_store(cli, &settings);
    let names = store.list()?;

    // stdout carries names only, so an empty store prints nothing there.
    if names.is_empty() {
        output::hint("No passwords stored yet. Run `passh add <NAME>` to add one.");
        return Ok(());
    }

    for name in names {
        println!("{name}");
    }
    Ok(())
}
