use clap::Parser;
use passh::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `PASSH_LOG=debug`.
const LOG_ENV: &str = "PASSH_LOG";

fn main() {
    // Logs go to stderr so `passh get` output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Add {
            ref name,
            generate,
            length,
        } => passh::cli::commands::add::execute(&cli, name, generate, length),
        Commands::Get { ref name } => passh::cli::commands::get::execute(&cli, name),
        Commands::List => passh::cli::commands::list::execute(&cli),
        Commands::Delete { ref name, force } => {
            passh::cli::commands::delete::execute(&cli, name, force)
        }
        Commands::Generate {
            ref name,
            length,
            no_symbols,
        } => passh::cli::commands::generate::execute(&cli, name, length, no_symbols),
        Commands::Setup => passh::cli::commands::setup::execute(&cli),
        Commands::Completions { shell } => passh::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        passh::cli::output::error(&e.to_string());
        if e.is_auth() {
            passh::cli::output::warning("Run `passh setup` to check which keys passh is using");
        }
        std::process::exit(1);
    }
}
