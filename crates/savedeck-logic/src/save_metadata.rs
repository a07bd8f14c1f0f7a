//! Save-slot metadata: the record persisted in a slot's `meta.txt`.
//!
//! The JSON keys are the camelCase names the game writes. Keys this crate
//! does not know about are kept in [`SaveMetadata::extra`] and written back
//! unchanged, so an edit never drops data.
//!
//! ```
//! use savedeck_logic::save_metadata::{validate_metadata, SaveMetadata};
//!
//! let meta = SaveMetadata::new_game("start", "scene_01");
//! assert!(meta.exist);
//! assert!(validate_metadata(&meta).is_empty());
//! ```

use std::fmt;

use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::MetadataField;

/// 2^63. Whole numbers at or beyond this magnitude do not fit a counter.
pub const INTEGER_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Decode a counter written either as an integer or as a whole float (`2310.0`).
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    struct WholeNumber;

    impl<'de> Visitor<'de> for WholeNumber {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a whole number")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            if v.fract() == 0.0 && v.abs() < INTEGER_LIMIT {
                Ok(v as i64)
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }
    }

    deserializer.deserialize_any(WholeNumber)
}

/// JSON has no NaN or infinity; refuse to write a number that cannot be read back.
fn finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        Err(ser::Error::custom(format!("{value} is not a finite number")))
    }
}

/// Last recorded player position. All three axes are required when decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(serialize_with = "finite")]
    pub x: f64,
    #[serde(serialize_with = "finite")]
    pub y: f64,
    #[serde(serialize_with = "finite")]
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Full persisted state of one save slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    /// Whether the slot currently holds data.
    pub exist: bool,
    /// Last-used teleport point (checkpoint) path.
    pub last_teleport_point_path: String,
    /// Scene the player currently occupies.
    pub at_scene_guid: String,
    pub last_pos: Position,
    #[serde(deserialize_with = "whole_number")]
    pub gold: i64,
    #[serde(deserialize_with = "whole_number")]
    pub level: i64,
    #[serde(deserialize_with = "whole_number")]
    pub exp: i64,
    /// Unspent skill points.
    #[serde(deserialize_with = "whole_number")]
    pub skill_point_left: i64,
    /// Cumulative skill investment.
    #[serde(deserialize_with = "whole_number")]
    pub total_skill_level: i64,
    /// Elapsed play time in seconds.
    #[serde(serialize_with = "finite")]
    pub play_time: f64,
    #[serde(deserialize_with = "whole_number")]
    pub death_count: i64,
    pub finished_credit_roll: bool,
    pub second_time_play: bool,
    pub true_end_triggered: bool,
    pub bad_end_triggered: bool,
    #[serde(deserialize_with = "whole_number")]
    pub game_mode: i64,
    /// Keys present in the file that are not part of the schema above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SaveMetadata {
    /// An empty slot.
    fn default() -> Self {
        Self {
            exist: false,
            last_teleport_point_path: String::new(),
            at_scene_guid: String::new(),
            last_pos: Position::ORIGIN,
            gold: 0,
            level: 1,
            exp: 0,
            skill_point_left: 0,
            total_skill_level: 0,
            play_time: 0.0,
            death_count: 0,
            finished_credit_roll: false,
            second_time_play: false,
            true_end_triggered: false,
            bad_end_triggered: false,
            game_mode: 0,
            extra: Map::new(),
        }
    }
}

/// Which ending a slot has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    None,
    True,
    Bad,
    /// Both ending flags are set. The game normally prevents this.
    Conflicting,
}

impl SaveMetadata {
    /// A freshly started, occupied slot.
    pub fn new_game(teleport_point: impl Into<String>, scene_guid: impl Into<String>) -> Self {
        Self {
            exist: true,
            last_teleport_point_path: teleport_point.into(),
            at_scene_guid: scene_guid.into(),
            ..Self::default()
        }
    }

    pub fn ending(&self) -> Ending {
        match (self.true_end_triggered, self.bad_end_triggered) {
            (false, false) => Ending::None,
            (true, false) => Ending::True,
            (false, true) => Ending::Bad,
            (true, true) => Ending::Conflicting,
        }
    }

    /// True when any progress counter has moved off its starting value.
    pub fn has_progress(&self) -> bool {
        self.gold > 0
            || self.exp > 0
            || self.level > 1
            || self.death_count > 0
            || self.total_skill_level > 0
            || self.play_time > 0.0
    }

    /// Play time formatted as `H:MM:SS`. Negative or non-finite times show as zero.
    pub fn play_time_hms(&self) -> String {
        let secs = if self.play_time.is_finite() && self.play_time > 0.0 {
            self.play_time as u64
        } else {
            0
        };
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found in a metadata record.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataIssue {
    /// A counter or play time below zero.
    Negative { field: MetadataField, value: f64 },
    /// Play time or a position axis is NaN or infinite.
    NotFinite { field: MetadataField },
    /// Both the true and bad ending flags are set.
    ConflictingEndings,
    /// `exist` is false but the record carries progress.
    EmptySlotWithProgress,
}

impl MetadataIssue {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Negative { .. } | Self::NotFinite { .. } => Severity::Error,
            Self::ConflictingEndings | Self::EmptySlotWithProgress => Severity::Warning,
        }
    }
}

impl std::fmt::Display for MetadataIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negative { field, value } => {
                write!(f, "{} is negative ({})", field.key(), value)
            }
            Self::NotFinite { field } => write!(f, "{} is not a finite number", field.key()),
            Self::ConflictingEndings => {
                f.write_str("both trueEndTriggered and badEndTriggered are set")
            }
            Self::EmptySlotWithProgress => f.write_str("slot is marked empty but carries progress"),
        }
    }
}

/// Check a record against the rules a well-formed save follows.
///
/// Top-level numeric fields must be non-negative. Position axes only need
/// to be finite; world coordinates may be negative.
pub fn validate_metadata(meta: &SaveMetadata) -> Vec<MetadataIssue> {
    let mut issues = Vec::new();

    for field in MetadataField::ALL {
        let Some(value) = field.get(meta).as_f64() else {
            continue;
        };
        if !value.is_finite() {
            issues.push(MetadataIssue::NotFinite { field });
        } else if value < 0.0 && !field.is_position_axis() {
            issues.push(MetadataIssue::Negative { field, value });
        }
    }

    if meta.ending() == Ending::Conflicting {
        issues.push(MetadataIssue::ConflictingEndings);
    }
    if !meta.exist && meta.has_progress() {
        issues.push(MetadataIssue::EmptySlotWithProgress);
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> Value {
        json!({
            "exist": true,
            "lastTeleportPointPath": "start",
            "atSceneGuid": "scene_01",
            "lastPos": {"x": 0, "y": 0, "z": 0},
            "gold": 0,
            "level": 1,
            "exp": 0,
            "skillPointLeft": 0,
            "totalSkillLevel": 0,
            "playTime": 0,
            "deathCount": 0,
            "finishedCreditRoll": false,
            "secondTimePlay": false,
            "trueEndTriggered": false,
            "badEndTriggered": false,
            "gameMode": 0
        })
    }

    #[test]
    fn decodes_camel_case_keys() {
        let meta: SaveMetadata = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(meta, SaveMetadata::new_game("start", "scene_01"));
    }

    #[test]
    fn partial_position_is_rejected() {
        let mut raw = sample_json();
        raw["lastPos"] = json!({"x": 1.0, "y": 2.0});
        assert!(serde_json::from_value::<SaveMetadata>(raw).is_err());
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut raw = sample_json();
        raw.as_object_mut().unwrap().remove("gold");
        assert!(serde_json::from_value::<SaveMetadata>(raw).is_err());
    }

    #[test]
    fn unknown_keys_are_kept() {
        let mut raw = sample_json();
        raw["difficultyTag"] = json!("hard");
        let meta: SaveMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(meta.extra.get("difficultyTag"), Some(&json!("hard")));

        let written = serde_json::to_value(&meta).unwrap();
        assert_eq!(written["difficultyTag"], json!("hard"));
        let reread: SaveMetadata = serde_json::from_value(written).unwrap();
        assert_eq!(reread, meta);
    }

    #[test]
    fn counters_written_as_whole_floats_decode() {
        let mut raw = sample_json();
        raw["gold"] = json!(2310.0);
        raw["level"] = json!(12.0);
        let meta: SaveMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(meta.gold, 2310);
        assert_eq!(meta.level, 12);
    }

    #[test]
    fn fractional_or_huge_counters_are_rejected() {
        for bad in [json!(2.5), json!(1e19), json!(u64::MAX), json!("3")] {
            let mut raw = sample_json();
            raw["exp"] = bad;
            assert!(serde_json::from_value::<SaveMetadata>(raw).is_err());
        }
    }

    #[test]
    fn non_finite_numbers_do_not_serialize() {
        let mut meta = SaveMetadata::new_game("a", "b");
        meta.play_time = f64::NAN;
        assert!(serde_json::to_string(&meta).is_err());

        meta.play_time = 1.0;
        meta.last_pos.z = f64::INFINITY;
        assert!(serde_json::to_string(&meta).is_err());
    }

    #[test]
    fn endings() {
        let mut meta = SaveMetadata::new_game("a", "b");
        assert_eq!(meta.ending(), Ending::None);
        meta.true_end_triggered = true;
        assert_eq!(meta.ending(), Ending::True);
        meta.bad_end_triggered = true;
        assert_eq!(meta.ending(), Ending::Conflicting);
        meta.true_end_triggered = false;
        assert_eq!(meta.ending(), Ending::Bad);
    }

    #[test]
    fn play_time_formatting() {
        let mut meta = SaveMetadata::default();
        assert_eq!(meta.play_time_hms(), "0:00:00");
        meta.play_time = 3_725.9;
        assert_eq!(meta.play_time_hms(), "1:02:05");
        meta.play_time = f64::NAN;
        assert_eq!(meta.play_time_hms(), "0:00:00");
    }

    #[test]
    fn negative_counters_are_errors() {
        let mut meta = SaveMetadata::new_game("a", "b");
        meta.gold = -5;
        meta.death_count = -1;
        let issues = validate_metadata(&meta);
        assert_eq!(issues.len(), 2);
        assert!(issues.contains(&MetadataIssue::Negative {
            field: MetadataField::Gold,
            value: -5.0
        }));
        assert!(issues.iter().all(|i| i.severity() == Severity::Error));
    }

    #[test]
    fn negative_coordinates_are_fine_but_nan_is_not() {
        let mut meta = SaveMetadata::new_game("a", "b");
        meta.last_pos = Position::new(-10.0, 3.5, -0.25);
        assert!(validate_metadata(&meta).is_empty());

        meta.last_pos.y = f64::NAN;
        assert_eq!(
            validate_metadata(&meta),
            vec![MetadataIssue::NotFinite {
                field: MetadataField::LastPosY
            }]
        );
    }

    #[test]
    fn ending_conflict_is_a_warning() {
        let mut meta = SaveMetadata::new_game("a", "b");
        meta.true_end_triggered = true;
        meta.bad_end_triggered = true;
        let issues = validate_metadata(&meta);
        assert_eq!(issues, vec![MetadataIssue::ConflictingEndings]);
        assert_eq!(issues[0].severity(), Severity::Warning);
    }

    #[test]
    fn empty_slot_with_progress_is_flagged() {
        let mut meta = SaveMetadata::default();
        assert!(validate_metadata(&meta).is_empty());
        meta.gold = 300;
        assert_eq!(
            validate_metadata(&meta),
            vec![MetadataIssue::EmptySlotWithProgress]
        );
    }
}
