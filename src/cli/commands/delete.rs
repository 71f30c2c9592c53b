//! `passh delete`: remove an entry from the store.

use std::io::{self, IsTerminal};

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{existing_store, load_settings, Cli};
use crate::errors::{PasshError, Result};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    let settings = load_settings()?;
    let store = existing_store(cli, &settings);

    if !store.contains(name)? {
        return Err(PasshError::EntryNotFound(name.to_string()));
    }

    if !force {
        match confirm(name) {
            Ok(()) => {}
            Err(PasshError::UserCancelled) => {
                output::info("Deletion cancelled.");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }

    store.delete(name)?;
    output::success(&format!("Deleted password '{name}'"));

    Ok(())
}

/// Ask before deleting.  Without a terminal to ask on, the answer is no.
fn confirm(name: &str) -> Result<()> {
    if !io::stdin().is_terminal() {
        return Err(PasshError::UserCancelled);
    }

    let confirmed = Confirm::new()
        .with_prompt(format!("Delete password '{name}'?"))
        .default(false)
        .interact()
        .map_err(|e| PasshError::CommandFailed(format!("confirm prompt: {e}")))?;

    if confirmed {
        Ok(())
    } else {
        Err(PasshError::UserCancelled)
    }
}
