//! Save slots on disk.
//!
//! A slot is a directory under the save root holding a `meta.txt` and,
//! optionally, a `flags.json`. Directories whose names start with `.` are
//! never slots; the backup directory lives there.

use std::fs;
use std::path::{Path, PathBuf};

use savedeck_logic::flag::FlagStore;
use savedeck_logic::save_metadata::SaveMetadata;

use crate::error::{io_at, Result, SaveError};
use crate::meta_file::{self, MetaStyle, FLAGS_FILE_NAME, META_FILE_NAME};

/// Everything stored in one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotData {
    pub metadata: SaveMetadata,
    pub flags: Option<FlagStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlot {
    name: String,
    dir: PathBuf,
}

impl SaveSlot {
    /// Address a slot under `root`. The slot need not exist yet.
    pub fn new(root: &Path, name: &str) -> Result<Self> {
        if !is_valid_slot_name(name) {
            return Err(SaveError::InvalidSlotName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            dir: root.join(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE_NAME)
    }

    pub fn flags_path(&self) -> PathBuf {
        self.dir.join(FLAGS_FILE_NAME)
    }

    pub fn exists(&self) -> bool {
        self.meta_path().is_file()
    }

    pub fn load(&self) -> Result<SlotData> {
        if !self.exists() {
            return Err(SaveError::SlotNotFound(self.name.clone()));
        }
        Ok(SlotData {
            metadata: meta_file::read_meta(&self.meta_path())?,
            flags: meta_file::read_flags(&self.flags_path())?,
        })
    }

    /// Write the slot's files. A slot without flags keeps no flag file.
    pub fn store(&self, data: &SlotData, style: MetaStyle) -> Result<()> {
        let meta_path = self.meta_path();
        let text = meta_file::encode_meta(&meta_path, &data.metadata, style)?;
        fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))?;
        meta_file::write_atomic(&meta_path, text.as_bytes())?;

        let flags_path = self.flags_path();
        match &data.flags {
            Some(store) => meta_file::write_flags(&flags_path, store)?,
            None if flags_path.exists() => fs::remove_file(&flags_path).map_err(io_at(&flags_path))?,
            None => {}
        }
        Ok(())
    }

    /// Create a new slot. Fails if the slot already holds a `meta.txt`.
    pub fn create(root: &Path, name: &str, data: &SlotData, style: MetaStyle) -> Result<Self> {
        let slot = Self::new(root, name)?;
        if slot.exists() {
            return Err(SaveError::SlotExists(name.to_string()));
        }
        slot.store(data, style)?;
        log::info!("Created save slot {}", slot.dir.display());
        Ok(slot)
    }
}

fn is_valid_slot_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != ".."
}

/// Every slot under `root`, sorted by name.
pub fn discover_slots(root: &Path) -> Result<Vec<SaveSlot>> {
    let mut slots = Vec::new();
    for entry in fs::read_dir(root).map_err(io_at(root))? {
        let entry = entry.map_err(io_at(root))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::debug!("Skipping non-UTF-8 entry {}", path.display());
            continue;
        };
        if !path.is_dir() || !is_valid_slot_name(name) {
            continue;
        }
        let slot = SaveSlot {
            name: name.to_string(),
            dir: path.clone(),
        };
        if slot.exists() {
            slots.push(slot);
        }
    }
    slots.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(slots)
}
