//! High-level store operations used by CLI commands.
//!
//! `CredentialStore` maps hierarchical names to `.pass` files under a root
//! directory.  It owns no key material: each operation that needs keys
//! takes the invocation's `KeyRing` explicitly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zeroize::Zeroizing;

use super::format;
use super::name::EntryName;
use crate::crypto::EnvelopeCipher;
use crate::errors::{PasshError, Result};
use crate::keyring::KeyRing;

/// File extension of entry files.
pub const ENTRY_EXTENSION: &str = "pass";

/// Mode for the root and every directory beneath it.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// A store rooted at one directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Open the store at `root`, creating the directory (owner-only) if
    /// needed.
    pub fn open(root: &Path) -> Result<Self> {
        create_private_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Handle to `root` without touching the filesystem.
    pub fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry file for `name`.
    pub fn entry_path(&self, name: &str) -> Result<PathBuf> {
        let name = EntryName::parse(name)?;
        Ok(name.to_path(&self.root, ENTRY_EXTENSION))
    }

    /// Whether an entry exists under `name`.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.entry_path(name)?.is_file())
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Encrypt `secret` to the keyring's recipients and store it under
    /// `name`, replacing any existing entry.
    pub fn add(&self, keyring: &KeyRing, name: &str, secret: &[u8]) -> Result<()> {
        let path = self.entry_path(name)?;

        let envelope = EnvelopeCipher::new(keyring).encrypt(secret)?;

        if let Some(parent) = path.parent() {
            create_private_dir_all(parent)?;
        }
        format::write_entry(&path, &envelope)?;

        tracing::debug!(%name, recipients = keyring.recipients().len(), "stored entry");
        Ok(())
    }

    /// Decrypt the entry stored under `name`.
    pub fn get(&self, keyring: &KeyRing, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let path = self.entry_path(name)?;

        let envelope = match format::read_entry(&path) {
            Err(PasshError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PasshError::EntryNotFound(name.to_string()))
            }
            other => other?,
        };

        EnvelopeCipher::new(keyring).decrypt(&envelope)
    }

    /// Every entry name, sorted.  Directories, temp files and files
    /// without the entry extension are skipped.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => PasshError::Io(io),
                None => PasshError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "filesystem loop while listing",
                )),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };

            let mut segments = Vec::new();
            for component in relative.with_extension("").components() {
                match component.as_os_str().to_str() {
                    Some(segment) => segments.push(segment.to_string()),
                    None => break,
                }
            }
            if segments.len() != relative.components().count() {
                tracing::debug!(path = %path.display(), "skipping non UTF-8 entry path");
                continue;
            }

            let name = segments.join("/");
            if name.starts_with('.') || name.contains("/.") {
                // Hidden files, including interrupted temp files.
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    /// Remove the entry under `name`.  Emptied parent directories are
    /// left in place.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(%name, "deleted entry");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PasshError::EntryNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn create_private_dir_all(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir_all(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}
