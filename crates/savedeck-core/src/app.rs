//! The mounted deck: main entry point for working with a save root.
//!
//! A [`SaveDeck`] is created once with [`SaveDeck::mount`], owns every slot
//! it has opened, and is torn down with [`SaveDeck::shutdown`], which writes
//! back any slot with unsaved edits. Dropping a deck without shutting it
//! down discards those edits (and logs a warning).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use savedeck_logic::fields::MetadataField;
use savedeck_logic::flag::{FieldValue, FlagStore};
use savedeck_logic::save_metadata::{validate_metadata, MetadataIssue, SaveMetadata, Severity};

use crate::config::{validate_config, DeckConfig};
use crate::error::{Result, SaveError};
use crate::slot::{discover_slots, SaveSlot, SlotData};
use crate::snapshot;

/// A slot loaded into memory.
#[derive(Debug)]
pub struct OpenSlot {
    slot: SaveSlot,
    data: SlotData,
    dirty: bool,
}

impl OpenSlot {
    pub fn name(&self) -> &str {
        self.slot.name()
    }

    pub fn slot(&self) -> &SaveSlot {
        &self.slot
    }

    pub fn metadata(&self) -> &SaveMetadata {
        &self.data.metadata
    }

    pub fn flags(&self) -> Option<&FlagStore> {
        self.data.flags.as_ref()
    }

    /// True when the in-memory copy differs from what was last written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn issues(&self) -> Vec<MetadataIssue> {
        validate_metadata(&self.data.metadata)
    }
}

/// Result of checking one slot on disk.
#[derive(Debug, Clone)]
pub struct SlotReport {
    pub name: String,
    pub issues: Vec<MetadataIssue>,
    /// Set when the slot's files could not be read at all.
    pub load_error: Option<String>,
}

impl SlotReport {
    pub fn has_errors(&self) -> bool {
        self.load_error.is_some() || self.issues.iter().any(|i| i.severity() == Severity::Error)
    }
}

/// What [`SaveDeck::shutdown`] wrote back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub flushed: Vec<String>,
}

/// Owned context for one mounted save root.
pub struct SaveDeck {
    config: DeckConfig,
    slots: BTreeMap<String, OpenSlot>,
}

impl SaveDeck {
    /// Mount the save root named by `config`.
    ///
    /// The root must already exist as a directory; a missing anchor is an
    /// error rather than something to create.
    pub fn mount(config: DeckConfig) -> Result<Self> {
        let errors = validate_config(&config);
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SaveError::InvalidConfig(joined));
        }
        if !config.save_root.is_dir() {
            return Err(SaveError::MissingAnchor(config.save_root.clone()));
        }

        log::info!("Mounted save root {}", config.save_root.display());
        Ok(Self {
            config,
            slots: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.save_root
    }

    /// Names of all slots on disk, sorted.
    pub fn slot_names(&self) -> Result<Vec<String>> {
        Ok(discover_slots(self.root())?
            .into_iter()
            .map(|s| s.name().to_string())
            .collect())
    }

    /// Load a slot, or return the already-open copy.
    pub fn open(&mut self, name: &str) -> Result<&mut OpenSlot> {
        if !self.slots.contains_key(name) {
            let slot = SaveSlot::new(self.root(), name)?;
            let data = slot.load()?;
            log::debug!("Opened slot {name}");
            self.slots.insert(
                name.to_string(),
                OpenSlot {
                    slot,
                    data,
                    dirty: false,
                },
            );
        }
        self.slots
            .get_mut(name)
            .ok_or_else(|| SaveError::SlotNotFound(name.to_string()))
    }

    /// Create a new slot on disk and open it.
    pub fn create_slot(&mut self, name: &str, metadata: SaveMetadata) -> Result<&mut OpenSlot> {
        let data = SlotData {
            metadata,
            flags: None,
        };
        let slot = SaveSlot::create(self.root(), name, &data, self.config.meta_style)?;
        self.slots.insert(
            name.to_string(),
            OpenSlot {
                slot,
                data,
                dirty: false,
            },
        );
        self.open(name)
    }

    pub fn get_field(&mut self, name: &str, key: &str) -> Result<FieldValue> {
        let field = MetadataField::from_key(key)?;
        Ok(field.get(self.open(name)?.metadata()))
    }

    /// Parse `raw` for the field named `key` and store it. Returns the new value.
    pub fn set_field(&mut self, name: &str, key: &str, raw: &str) -> Result<FieldValue> {
        let field = MetadataField::from_key(key)?;
        let value = field.parse(raw)?;
        let open = self.open(name)?;
        field.set(&mut open.data.metadata, value.clone())?;
        open.dirty = true;
        log::debug!("{name}: {key} = {value}");
        Ok(value)
    }

    /// Set a flag. `path` is `flag` for a primitive flag or `flag.field` for
    /// one field of an object flag; `raw` is parsed as a literal.
    pub fn set_flag(&mut self, name: &str, path: &str, raw: &str) -> Result<()> {
        let (flag, field) = split_flag_path(path)?;
        let value = FieldValue::parse_literal(raw);
        let open = self.open(name)?;
        let store = open.data.flags.get_or_insert_with(FlagStore::new);
        match field {
            Some(field) => store.set_field(flag, field, value)?,
            None => {
                store.insert(flag, value.into())?;
            }
        }
        open.dirty = true;
        log::debug!("{name}: flag {path} = {raw}");
        Ok(())
    }

    /// Remove a flag or one field of an object flag. Returns whether anything was removed.
    pub fn remove_flag(&mut self, name: &str, path: &str) -> Result<bool> {
        let (flag, field) = split_flag_path(path)?;
        let open = self.open(name)?;
        let Some(store) = open.data.flags.as_mut() else {
            return Ok(false);
        };
        let removed = match field {
            Some(field) => store.remove_field(flag, field)?.is_some(),
            None => store.remove(flag).is_some(),
        };
        open.dirty |= removed;
        Ok(removed)
    }

    /// Write a slot back to disk if it has unsaved edits, snapshotting the
    /// previous files first when backups are enabled. Returns whether anything
    /// was written.
    pub fn commit(&mut self, name: &str) -> Result<bool> {
        let backups = self.config.backups;
        let backup_dir = self.config.backup_dir();
        let max_backups = self.config.max_backups;
        let style = self.config.meta_style;

        let open = self.open(name)?;
        if !open.dirty {
            return Ok(false);
        }
        if backups && open.slot.exists() {
            snapshot::snapshot_slot(&open.slot, &backup_dir)?;
            snapshot::prune_snapshots(&backup_dir, name, max_backups)?;
        }
        open.slot.store(&open.data, style)?;
        open.dirty = false;
        log::info!("Saved slot {name}");
        Ok(true)
    }

    /// Snapshot a slot's current files regardless of the backup setting.
    pub fn backup(&mut self, name: &str) -> Result<PathBuf> {
        let backup_dir = self.config.backup_dir();
        let slot = SaveSlot::new(self.root(), name)?;
        let path = snapshot::snapshot_slot(&slot, &backup_dir)?;
        if self.config.backups {
            snapshot::prune_snapshots(&backup_dir, name, self.config.max_backups)?;
        }
        Ok(path)
    }

    /// Replace a slot's files with a snapshot. The slot's current files are
    /// snapshotted first when backups are enabled, and any open copy is
    /// dropped so the next access reloads from disk.
    pub fn restore(&mut self, name: &str, snapshot_path: &Path) -> Result<()> {
        let slot = SaveSlot::new(self.root(), name)?;
        let backup_dir = self.config.backup_dir();
        let backed_up = self.config.backups && slot.exists();
        if backed_up {
            snapshot::snapshot_slot(&slot, &backup_dir)?;
        }
        snapshot::restore_snapshot(&slot, snapshot_path)?;
        if backed_up {
            snapshot::prune_snapshots_except(
                &backup_dir,
                name,
                self.config.max_backups,
                Some(snapshot_path),
            )?;
        }
        if let Some(discarded) = self.slots.remove(name) {
            if discarded.dirty {
                log::warn!("Discarded unsaved edits to slot {name} on restore");
            }
        }
        Ok(())
    }

    /// Snapshot files of a slot, oldest first.
    pub fn snapshots(&self, name: &str) -> Result<Vec<PathBuf>> {
        snapshot::list_snapshots(&self.config.backup_dir(), name)
    }

    /// Validate every slot on disk. Slots that are already open are checked
    /// as held in memory, unsaved edits included.
    pub fn check(&mut self) -> Result<Vec<SlotReport>> {
        let mut reports = Vec::new();
        for name in self.slot_names()? {
            let report = match self.open(&name) {
                Ok(open) => SlotReport {
                    name: name.clone(),
                    issues: open.issues(),
                    load_error: None,
                },
                Err(e) => {
                    log::warn!("Slot {name} failed to load: {e}");
                    SlotReport {
                        name: name.clone(),
                        issues: Vec::new(),
                        load_error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }

    /// Names of open slots with unsaved edits.
    pub fn dirty_slots(&self) -> Vec<String> {
        self.slots
            .values()
            .filter(|s| s.dirty)
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Write back every slot with unsaved edits and release the deck.
    pub fn shutdown(mut self) -> Result<ShutdownReport> {
        let mut report = ShutdownReport::default();
        for name in self.dirty_slots() {
            self.commit(&name)?;
            report.flushed.push(name);
        }
        self.slots.clear();
        log::info!("Unmounted save root {}", self.config.save_root.display());
        Ok(report)
    }
}

/// Split `flag` or `flag.field` on the first `.`. Neither part may be empty.
fn split_flag_path(path: &str) -> Result<(&str, Option<&str>)> {
    let (flag, field) = match path.split_once('.') {
        Some((flag, field)) => (flag, Some(field)),
        None => (path, None),
    };
    if flag.is_empty() || field == Some("") {
        return Err(SaveError::InvalidFlagPath(path.to_string()));
    }
    Ok((flag, field))
}

impl Drop for SaveDeck {
    fn drop(&mut self) {
        let dirty = self.dirty_slots();
        if !dirty.is_empty() {
            log::warn!(
                "Save deck dropped with unsaved edits to {}",
                dirty.join(", ")
            );
        }
    }
}
