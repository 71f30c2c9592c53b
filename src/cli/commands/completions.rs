//! `passh completions`: generate shell completion scripts.
//!
//! Usage:
//!   passh completions bash > ~/.bash_completion.d/passh
//!   passh completions zsh
//!   passh completions fish
//!
//! The bash and fish scripts also complete entry names after `get`,
//! `delete`, `add` and `generate`, by asking `passh list`.

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::Result;

const BIN_NAME: &str = "passh";

/// Subcommands whose first positional argument is an entry name.
const NAME_COMMANDS: &[&str] = &["get", "delete", "add", "generate"];

/// Execute the `completions` command.
pub fn execute(shell: Shell) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write_script(shell, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write clap's completion script for `shell`, followed by the entry-name
/// hook where the shell has one.
pub fn write_script(shell: Shell, out: &mut impl Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BIN_NAME, &mut *out);

    if let Some(hook) = entry_name_hook(shell) {
        out.write_all(hook.as_bytes())?;
    }
    Ok(())
}

fn entry_name_hook(shell: Shell) -> Option<String> {
    let commands = NAME_COMMANDS.join(" ");
    match shell {
        Shell::Bash => Some(format!(
            r#"
# Entry names come from the store.
_passh_entries() {{
    local prev="${{COMP_WORDS[COMP_CWORD-1]}}"
    case " {commands} " in
        *" $prev "*)
            COMPREPLY=( $(compgen -W "$({BIN_NAME} list 2>/dev/null)" -- "${{COMP_WORDS[COMP_CWORD]}}") )
            return 0
            ;;
    esac
    _{BIN_NAME} "$@"
}}
complete -F _passh_entries -o bashdefault -o default {BIN_NAME}
"#
        )),
        Shell::Fish => Some(format!(
            "\n# Entry names come from the store.\n\
             complete -c {BIN_NAME} -n \"__fish_seen_subcommand_from {commands}\" -f -a \"({BIN_NAME} list 2>/dev/null)\"\n"
        )),
        _ => None,
    }
}
