//! On-disk entry format and atomic writes.
//!
//! A `.pass` file has this layout:
//!
//! ```text
//! [PSSH: 4 bytes][version: 1 byte][envelope JSON]
//! ```
//!
//! - **Magic** (`PSSH`): identifies the file as a passh entry.
//! - **Version**: format version (currently `1`).
//! - **Envelope JSON**: serialized `Envelope`, byte fields base64.
//!
//! There is no separate MAC: every byte that matters is covered by the
//! AES-GCM tags inside the envelope.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand::RngCore;

use crate::crypto::Envelope;
use crate::errors::{PasshError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every entry file.
const MAGIC: &[u8; 4] = b"PSSH";

/// Current format version.
pub const CURRENT_VERSION: u8 = 1;

/// 4 (magic) + 1 (version).
const PREFIX_LEN: usize = 5;

/// Mode for entry files and temp files.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Encode an envelope into entry-file bytes.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(envelope)
        .map_err(|e| PasshError::Serialization(format!("envelope: {e}")))?;

    let mut buf = Vec::with_capacity(PREFIX_LEN + json.len());
    buf.extend_from_slice(MAGIC);
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Decode entry-file bytes back into an envelope.
pub fn decode(data: &[u8]) -> Result<Envelope> {
    if data.len() < PREFIX_LEN {
        return Err(PasshError::InvalidFormat(
            "file too small to be a passh entry".into(),
        ));
    }
    if &data[0..4] != MAGIC {
        return Err(PasshError::InvalidFormat("missing PSSH magic bytes".into()));
    }

    let version = data[4];
    if version != CURRENT_VERSION {
        return Err(PasshError::InvalidFormat(format!(
            "unsupported version {version}, expected {CURRENT_VERSION}"
        )));
    }

    serde_json::from_slice(&data[PREFIX_LEN..])
        .map_err(|e| PasshError::InvalidFormat(format!("envelope JSON: {e}")))
}

/// Write an envelope to `path` **atomically**.
///
/// 1. Encode the envelope.
/// 2. Write it to a uniquely named owner-only temp file in the same
///    directory and fsync it.
/// 3. Rename the temp file over the target path.
///
/// Readers see either the old entry or the new one, never a partial file.
pub fn write_entry(path: &Path, envelope: &Envelope) -> Result<()> {
    let buf = encode(envelope)?;

    let parent = path.parent().unwrap_or(Path::new("."));
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let mut suffix = [0u8; 6];
    rand::rngs::OsRng.fill_bytes(&mut suffix);
    let suffix: String = suffix.iter().map(|b| format!("{b:02x}")).collect();
    let tmp_path = parent.join(format!(".{file_name}.{suffix}.tmp"));

    let result = (|| -> Result<()> {
        let mut file = create_private(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    tracing::debug!(path = %path.display(), bytes = buf.len(), "wrote entry");
    Ok(())
}

/// Read and decode the entry at `path`.
pub fn read_entry(path: &Path) -> Result<Envelope> {
    let data = fs::read(path)?;
    decode(&data)
}

#[cfg(unix)]
fn create_private(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(FILE_MODE)
        .open(path)?)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().write(true).create_new(true).open(path)?)
}
