//! Text encodings of a slot's files.
//!
//! `meta.txt` holds one [`SaveMetadata`] record as JSON with the game's
//! camelCase keys. `flags.json` is an optional flag document next to it.
//! Both are written to a temporary sibling first and renamed into place so
//! a failed write never leaves a truncated file behind.

use std::fs;
use std::io;
use std::path::Path;

use savedeck_logic::flag::FlagStore;
use savedeck_logic::save_metadata::SaveMetadata;
use serde::{Deserialize, Serialize};

use crate::error::{io_at, Result, SaveError};

pub const META_FILE_NAME: &str = "meta.txt";
pub const FLAGS_FILE_NAME: &str = "flags.json";

/// Output layout for `meta.txt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaStyle {
    /// Single line, as the game writes it.
    #[default]
    Compact,
    /// Indented, for hand editing.
    Pretty,
}

/// Decode a `meta.txt` body. A leading byte-order mark is ignored.
pub fn parse_meta(text: &str) -> Result<SaveMetadata, serde_json::Error> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(text.trim())
}

pub fn render_meta(meta: &SaveMetadata, style: MetaStyle) -> Result<String, serde_json::Error> {
    match style {
        MetaStyle::Compact => serde_json::to_string(meta),
        MetaStyle::Pretty => serde_json::to_string_pretty(meta),
    }
}

pub fn read_meta(path: &Path) -> Result<SaveMetadata> {
    let text = fs::read_to_string(path).map_err(io_at(path))?;
    parse_meta(&text).map_err(|source| SaveError::Meta {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_meta(path: &Path, meta: &SaveMetadata, style: MetaStyle) -> Result<()> {
    let text = encode_meta(path, meta, style)?;
    write_atomic(path, text.as_bytes())
}

/// Render `meta` for writing to `path`. Fails before anything touches disk.
pub(crate) fn encode_meta(path: &Path, meta: &SaveMetadata, style: MetaStyle) -> Result<String> {
    render_meta(meta, style).map_err(|source| SaveError::Meta {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a flag document. A missing file is not an error.
pub fn read_flags(path: &Path) -> Result<Option<FlagStore>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_at(path)(e)),
    };
    FlagStore::from_json_str(&text)
        .map(Some)
        .map_err(|source| SaveError::Flags {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write_flags(path: &Path, store: &FlagStore) -> Result<()> {
    let mut text = store.to_json_string_pretty();
    text.push('\n');
    write_atomic(path, text.as_bytes())
}

/// Write `contents` to `<path>.tmp`, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, contents).map_err(io_at(&tmp))?;
    fs::rename(&tmp, path).map_err(io_at(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use savedeck_logic::flag::FieldValue;

    const GAME_WRITTEN: &str = r#"{"exist":true,"lastTeleportPointPath":"AG_S1/Teleport_01","atSceneGuid":"a1b2c3","lastPos":{"x":-104.5,"y":12.0,"z":0.0},"gold":2310,"level":14,"exp":5120,"skillPointLeft":2,"totalSkillLevel":13,"playTime":18342.75,"deathCount":37,"finishedCreditRoll":false,"secondTimePlay":false,"trueEndTriggered":false,"badEndTriggered":false,"gameMode":1}"#;

    #[test]
    fn parses_game_written_meta() {
        let meta = parse_meta(GAME_WRITTEN).unwrap();
        assert_eq!(meta.gold, 2310);
        assert_eq!(meta.last_pos.x, -104.5);
        assert_eq!(meta.play_time_hms(), "5:05:42");
    }

    #[test]
    fn counters_written_as_floats_parse() {
        let text = GAME_WRITTEN
            .replace(r#""gold":2310"#, r#""gold":2310.0"#)
            .replace(r#""deathCount":37"#, r#""deathCount":37.0"#);
        assert_eq!(parse_meta(&text).unwrap(), parse_meta(GAME_WRITTEN).unwrap());

        let fractional = GAME_WRITTEN.replace(r#""gold":2310"#, r#""gold":2310.5"#);
        assert!(parse_meta(&fractional).is_err());
    }

    #[test]
    fn non_finite_meta_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(META_FILE_NAME);
        let mut meta = parse_meta(GAME_WRITTEN).unwrap();
        meta.last_pos.x = f64::NEG_INFINITY;

        assert!(render_meta(&meta, MetaStyle::Compact).is_err());
        assert!(matches!(
            write_meta(&path, &meta, MetaStyle::Compact),
            Err(SaveError::Meta { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn bom_and_trailing_newline_are_ignored() {
        let text = format!("\u{feff}{GAME_WRITTEN}\r\n");
        assert_eq!(parse_meta(&text).unwrap(), parse_meta(GAME_WRITTEN).unwrap());
    }

    #[test]
    fn compact_render_is_single_line() {
        let meta = parse_meta(GAME_WRITTEN).unwrap();
        let compact = render_meta(&meta, MetaStyle::Compact).unwrap();
        assert!(!compact.contains('\n'));
        assert_eq!(parse_meta(&compact).unwrap(), meta);

        let pretty = render_meta(&meta, MetaStyle::Pretty).unwrap();
        assert!(pretty.contains("\n  \"gold\": 2310"));
    }

    #[test]
    fn write_then_read_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(META_FILE_NAME);
        let meta = parse_meta(GAME_WRITTEN).unwrap();

        write_meta(&path, &meta, MetaStyle::Compact).unwrap();
        assert_eq!(read_meta(&path).unwrap(), meta);
        assert!(!dir.path().join("meta.txt.tmp").exists());
    }

    #[test]
    fn malformed_meta_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(META_FILE_NAME);
        fs::write(&path, "{\"exist\": true}").unwrap();

        let err = read_meta(&path).unwrap_err();
        assert!(matches!(err, SaveError::Meta { .. }));
        assert!(err.to_string().contains("meta.txt"));
    }

    #[test]
    fn missing_flags_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_flags(&dir.path().join(FLAGS_FILE_NAME)).unwrap().is_none());
    }

    #[test]
    fn flags_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FLAGS_FILE_NAME);
        let mut store = FlagStore::new();
        store.set_field("bridge", "lowered", FieldValue::Bool(true)).unwrap();
        store.insert("chapter", FieldValue::Number(3.0).into()).unwrap();

        write_flags(&path, &store).unwrap();
        assert_eq!(read_flags(&path).unwrap(), Some(store));
    }

    #[test]
    fn invalid_flags_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FLAGS_FILE_NAME);
        fs::write(&path, r#"{"deep": {"a": {"b": 1}}}"#).unwrap();
        assert!(matches!(read_flags(&path), Err(SaveError::Flags { .. })));
    }
}
