//! Slot snapshots for backup and restore.
//!
//! Uses bincode for a compact binary envelope. The slot's files are stored
//! as their raw text, so restoring a snapshot reproduces them byte for byte
//! even when they contain keys this crate does not model.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_at, Result, SaveError};
use crate::meta_file;
use crate::slot::SaveSlot;

/// Version number for the snapshot format (increment when format changes)
const SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_EXTENSION: &str = "bin";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";
const STAMP_LEN: usize = 18;

/// Serializable copy of one slot's files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    /// Snapshot format version
    pub version: u32,
    /// Name of the slot the files came from
    pub slot: String,
    pub taken_at: DateTime<Utc>,
    /// Raw `meta.txt`
    pub meta_txt: String,
    /// Raw `flags.json`, if the slot had one
    pub flags_json: Option<String>,
}

impl SlotSnapshot {
    /// Read a slot's files as they are on disk.
    pub fn capture(slot: &SaveSlot) -> Result<Self> {
        let meta_path = slot.meta_path();
        if !slot.exists() {
            return Err(SaveError::SlotNotFound(slot.name().to_string()));
        }
        let meta_txt = fs::read_to_string(&meta_path).map_err(io_at(&meta_path))?;

        let flags_path = slot.flags_path();
        let flags_json = match fs::read_to_string(&flags_path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_at(&flags_path)(e)),
        };

        Ok(Self {
            version: SNAPSHOT_VERSION,
            slot: slot.name().to_string(),
            taken_at: Utc::now(),
            meta_txt,
            flags_json,
        })
    }

    fn file_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.slot,
            self.taken_at.format(STAMP_FORMAT),
            SNAPSHOT_EXTENSION
        )
    }
}

/// Save a snapshot to a writer
pub fn save_snapshot<W: Write>(writer: W, snapshot: &SlotSnapshot) -> Result<()> {
    bincode::serialize_into(writer, snapshot)?;
    Ok(())
}

/// Load a snapshot from a reader
pub fn load_snapshot<R: Read>(reader: R) -> Result<SlotSnapshot> {
    let snapshot: SlotSnapshot = bincode::deserialize_from(reader)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

/// Capture `slot` into a new file under `backup_dir` and return its path.
pub fn snapshot_slot(slot: &SaveSlot, backup_dir: &Path) -> Result<PathBuf> {
    let mut snapshot = SlotSnapshot::capture(slot)?;
    fs::create_dir_all(backup_dir).map_err(io_at(backup_dir))?;

    // Two snapshots in the same millisecond must not overwrite each other.
    let mut path = backup_dir.join(snapshot.file_name());
    while path.exists() {
        snapshot.taken_at += Duration::milliseconds(1);
        path = backup_dir.join(snapshot.file_name());
    }
    let file = fs::File::create(&path).map_err(io_at(&path))?;
    let mut writer = BufWriter::new(file);
    save_snapshot(&mut writer, &snapshot)?;
    writer.flush().map_err(io_at(&path))?;

    log::info!("Backed up slot {} to {}", slot.name(), path.display());
    Ok(path)
}

/// Overwrite `slot` with the files stored in the snapshot at `path`.
///
/// The stored `meta.txt` must still decode; a slot is never restored into a
/// state the loader would reject.
pub fn restore_snapshot(slot: &SaveSlot, path: &Path) -> Result<SlotSnapshot> {
    let file = fs::File::open(path).map_err(io_at(path))?;
    let snapshot = load_snapshot(BufReader::new(file))?;

    meta_file::parse_meta(&snapshot.meta_txt).map_err(|source| SaveError::Meta {
        path: path.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(slot.dir()).map_err(io_at(slot.dir()))?;
    meta_file::write_atomic(&slot.meta_path(), snapshot.meta_txt.as_bytes())?;

    let flags_path = slot.flags_path();
    match &snapshot.flags_json {
        Some(text) => meta_file::write_atomic(&flags_path, text.as_bytes())?,
        None if flags_path.exists() => fs::remove_file(&flags_path).map_err(io_at(&flags_path))?,
        None => {}
    }

    if snapshot.slot != slot.name() {
        log::warn!(
            "Restored snapshot of slot {} into slot {}",
            snapshot.slot,
            slot.name()
        );
    }
    log::info!("Restored slot {} from {}", slot.name(), path.display());
    Ok(snapshot)
}

/// Snapshot files for `slot_name`, oldest first.
pub fn list_snapshots(backup_dir: &Path, slot_name: &str) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at(backup_dir)(e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_at(backup_dir))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_snapshot_of(name, slot_name) {
            found.push(path);
        }
    }
    // Timestamps are fixed-width, so name order is time order.
    found.sort();
    Ok(found)
}

/// Delete all but the newest `keep` snapshots of `slot_name`. Returns how many were removed.
pub fn prune_snapshots(backup_dir: &Path, slot_name: &str, keep: usize) -> Result<usize> {
    prune_snapshots_except(backup_dir, slot_name, keep, None)
}

/// Like [`prune_snapshots`], but never deletes `spare`. A spared snapshot
/// still counts toward `keep`.
pub fn prune_snapshots_except(
    backup_dir: &Path,
    slot_name: &str,
    keep: usize,
    spare: Option<&Path>,
) -> Result<usize> {
    let snapshots = list_snapshots(backup_dir, slot_name)?;
    let excess = snapshots.len().saturating_sub(keep);
    let spare = spare.and_then(|p| fs::canonicalize(p).ok());

    let mut removed = 0;
    for path in &snapshots {
        if removed == excess {
            break;
        }
        if spare.is_some() && fs::canonicalize(path).ok() == spare {
            continue;
        }
        fs::remove_file(path).map_err(io_at(path))?;
        log::debug!("Pruned snapshot {}", path.display());
        removed += 1;
    }
    Ok(removed)
}

/// `<slot>-<stamp>.bin`, where the stamp is exactly the fixed-width timestamp.
/// Checking the stamp keeps slot `a` from claiming the snapshots of slot `a-b`.
fn is_snapshot_of(file_name: &str, slot_name: &str) -> bool {
    let Some(rest) = file_name
        .strip_prefix(slot_name)
        .and_then(|r| r.strip_prefix('-'))
        .and_then(|r| r.strip_suffix(SNAPSHOT_EXTENSION))
        .and_then(|r| r.strip_suffix('.'))
    else {
        return false;
    };
    rest.len() == STAMP_LEN
        && rest
            .char_indices()
            .all(|(i, c)| if i == 8 { c == 'T' } else { c.is_ascii_digit() })
}
