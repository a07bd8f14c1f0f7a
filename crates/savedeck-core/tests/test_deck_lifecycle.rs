//! Integration tests for the deck lifecycle.
//!
//! Exercises: mount → open → edit → shutdown → remount, against real files
//! in a temporary save root.

use std::fs;
use std::path::Path;

use savedeck_core::prelude::*;
use savedeck_core::snapshot::list_snapshots;
use serde_json::Value;

// ── Helpers ────────────────────────────────────────────────────────────

const GAME_META: &str = r#"{"exist":true,"lastTeleportPointPath":"AG_S1/Teleport_01","atSceneGuid":"a1b2c3","lastPos":{"x":-104.5,"y":12.0,"z":0.0},"gold":2310,"level":14,"exp":5120,"skillPointLeft":2,"totalSkillLevel":13,"playTime":18342.75,"deathCount":37,"finishedCreditRoll":false,"secondTimePlay":false,"trueEndTriggered":false,"badEndTriggered":false,"gameMode":1,"buildVersion":"1.2.0"}"#;

fn seed_root(root: &Path) {
    let slot = root.join("Slot_0");
    fs::create_dir_all(&slot).unwrap();
    fs::write(slot.join("meta.txt"), GAME_META).unwrap();
}

fn config_for(root: &Path) -> DeckConfig {
    DeckConfig {
        save_root: root.to_path_buf(),
        ..DeckConfig::default()
    }
}

// ── Lifecycle ──────────────────────────────────────────────────────────

#[test]
fn edit_survives_remount() {
    let root = tempfile::tempdir().unwrap();
    seed_root(root.path());

    let mut deck = SaveDeck::mount(config_for(root.path())).unwrap();
    assert_eq!(deck.slot_names().unwrap(), vec!["Slot_0".to_string()]);
    deck.set_field("Slot_0", "gold", "99999").unwrap();
    deck.set_field("Slot_0", "secondTimePlay", "true").unwrap();
    deck.set_flag("Slot_0", "boss_rush.unlocked", "true").unwrap();
    let report = deck.shutdown().unwrap();
    assert_eq!(report.flushed, vec!["Slot_0".to_string()]);

    let mut deck = SaveDeck::mount(config_for(root.path())).unwrap();
    let open = deck.open("Slot_0").unwrap();
    assert_eq!(open.metadata().gold, 99999);
    assert!(open.metadata().second_time_play);
    assert_eq!(open.metadata().level, 14);
    assert_eq!(
        open.flags().and_then(|f| f.get("boss_rush")).and_then(|f| f.field("unlocked")),
        Some(&FieldValue::Bool(true))
    );
    deck.shutdown().unwrap();
}

#[test]
fn unknown_keys_survive_an_edit() {
    let root = tempfile::tempdir().unwrap();
    seed_root(root.path());

    let mut deck = SaveDeck::mount(config_for(root.path())).unwrap();
    deck.set_field("Slot_0", "deathCount", "0").unwrap();
    deck.shutdown().unwrap();

    let text = fs::read_to_string(root.path().join("Slot_0/meta.txt")).unwrap();
    let written: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(written["buildVersion"], "1.2.0");
    assert_eq!(written["deathCount"], 0);
    assert_eq!(written["lastPos"]["x"], -104.5);
    assert!(!text.contains('\n'), "compact style keeps the game's single-line layout");
}

#[test]
fn first_commit_backs_up_the_original_file() {
    let root = tempfile::tempdir().unwrap();
    seed_root(root.path());

    let mut deck = SaveDeck::mount(config_for(root.path())).unwrap();
    deck.set_field("Slot_0", "gold", "0").unwrap();
    deck.commit("Slot_0").unwrap();

    let backups = list_snapshots(&deck.config().backup_dir(), "Slot_0").unwrap();
    assert_eq!(backups.len(), 1);

    deck.restore("Slot_0", &backups[0]).unwrap();
    let restored = fs::read_to_string(root.path().join("Slot_0/meta.txt")).unwrap();
    assert_eq!(restored, GAME_META);
    deck.shutdown().unwrap();
}

#[test]
fn backups_can_be_disabled() {
    let root = tempfile::tempdir().unwrap();
    seed_root(root.path());

    let config = DeckConfig {
        backups: false,
        ..config_for(root.path())
    };
    let mut deck = SaveDeck::mount(config).unwrap();
    deck.set_field("Slot_0", "exp", "1").unwrap();
    deck.shutdown().unwrap();

    assert!(!root.path().join(".savedeck-backups").exists());
}

#[test]
fn mounting_a_missing_anchor_fails() {
    let root = tempfile::tempdir().unwrap();
    let result = SaveDeck::mount(config_for(&root.path().join("not-here")));
    assert!(matches!(result, Err(SaveError::MissingAnchor(_))));
}
