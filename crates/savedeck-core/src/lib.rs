//! SaveDeck Core - save-slot persistence
//!
//! Reads, edits, validates and backs up the save slots of a save root. Each
//! slot is a directory holding a `meta.txt` metadata record and an optional
//! `flags.json` flag document; the data model itself lives in
//! `savedeck-logic`.
//!
//! # Example
//!
//! ```rust,no_run
//! use savedeck_core::prelude::*;
//!
//! let config = DeckConfig::load(None)?;
//! let mut deck = SaveDeck::mount(config)?;
//!
//! deck.set_field("slot0", "gold", "9999")?;
//! deck.shutdown()?;
//! # Ok::<(), savedeck_core::error::SaveError>(())
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod meta_file;
pub mod slot;
pub mod snapshot;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::app::{OpenSlot, SaveDeck, ShutdownReport, SlotReport};
    pub use crate::config::DeckConfig;
    pub use crate::error::SaveError;
    pub use crate::meta_file::MetaStyle;
    pub use savedeck_logic::flag::{FieldValue, FlagStore, FlagValue};
    pub use savedeck_logic::save_metadata::SaveMetadata;
}
