//! Persistent warning ledger.
//!
//! Warnings are the engine's only way to hand a problem to a human. They are
//! kept in a JSON file under the data directory, guarded by an exclusive file
//! lock so concurrent runs (or an operator CLI) cannot clobber each other's
//! writes. Entries survive until an operator discards them.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use sync_core::error::SyncError;

use crate::models::Warning;

const WARNINGS_FILE: &str = "warnings.json";

#[derive(Debug, Clone)]
pub struct WarningLedger {
    path: PathBuf,
}

impl WarningLedger {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(WARNINGS_FILE),
        }
    }

    /// Record a warning. If a live entry already exists for the same id pair
    /// the message stacks onto it (skipping exact duplicates); otherwise the
    /// entry is appended as-is.
    pub fn record(&self, warning: Warning) -> Result<(), SyncError> {
        tracing::warn!(
            order_number = %warning.order_number,
            source_invoice_id = ?warning.source_invoice_id,
            target_document_id = ?warning.target_document_id,
            message = %warning.messages.join("; "),
            "Recording sync warning"
        );
        self.with_locked_file(|warnings| {
            let existing = warnings.iter_mut().find(|w| {
                w.matches(
                    warning.source_invoice_id.as_deref(),
                    warning.target_document_id.as_deref(),
                )
            });
            match existing {
                Some(entry) => {
                    for message in &warning.messages {
                        if !entry.messages.contains(message) {
                            entry.messages.push(message.clone());
                        }
                    }
                }
                None => warnings.push(warning),
            }
            Ok(())
        })
    }

    /// Whether a live warning exists for the given id pair.
    pub fn has_warning_for(
        &self,
        source_id: Option<&str>,
        target_id: Option<&str>,
    ) -> Result<bool, SyncError> {
        Ok(self
            .list()?
            .iter()
            .any(|w| w.matches(source_id, target_id)))
    }

    /// Remove a warning by id. Unknown ids are a no-op.
    pub fn discard(&self, id: Uuid) -> Result<(), SyncError> {
        self.with_locked_file(|warnings| {
            warnings.retain(|w| w.id != id);
            Ok(())
        })
    }

    /// All live warnings. A missing file reads as empty.
    pub fn list(&self) -> Result<Vec<Warning>, SyncError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        FileExt::lock_shared(&file)?;
        let result = read_warnings(&mut file);
        let _ = FileExt::unlock(&file);
        result
    }

    /// Read-modify-write under an exclusive lock.
    fn with_locked_file<F>(&self, mutate: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut Vec<Warning>) -> Result<(), SyncError>,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;

        let result = (|| {
            let mut warnings = read_warnings(&mut file)?;
            mutate(&mut warnings)?;
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            let serialized = serde_json::to_string_pretty(&warnings)?;
            file.write_all(serialized.as_bytes())?;
            Ok(())
        })();

        let _ = FileExt::unlock(&file);
        result
    }
}

fn read_warnings(file: &mut File) -> Result<Vec<Warning>, SyncError> {
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}
