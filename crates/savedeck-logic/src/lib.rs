//! Pure save-slot data model for SaveDeck.
//!
//! This crate describes what a save slot contains and what counts as a
//! well-formed value. It does no I/O: functions take plain data and return
//! results, so the same rules apply to files on disk, snapshots, and values
//! typed in by an editor.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`flag`] | Flag values (primitive or flat object) and the named flag store |
//! | [`save_metadata`] | The `meta.txt` record, endings, validation |
//! | [`fields`] | Type-checked access to metadata fields by JSON key |

pub mod fields;
pub mod flag;
pub mod save_metadata;
