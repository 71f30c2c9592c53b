//! One module per subcommand.  Each exposes an `execute` function that
//! `main` dispatches to.

pub mod add;
pub mod completions;
pub mod delete;
pub mod generate;
pub mod get;
pub mod list;
pub mod setup;
