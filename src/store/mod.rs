//! Store module: hierarchical, encrypted credential storage.
//!
//! This module provides:
//! - Entry-name validation (`name`)
//! - The `.pass` file format and atomic writes (`format`)
//! - `CredentialStore` with add / get / list / delete (`credential_store`)

pub mod credential_store;
pub mod format;
pub mod name;

pub use credential_store::{CredentialStore, ENTRY_EXTENSION};
pub use name::EntryName;
