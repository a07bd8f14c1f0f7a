//! Addressing metadata fields by their JSON key.
//!
//! Editors refer to fields the way the save file spells them (`gold`,
//! `lastPos.x`). Every field reads and writes as a [`FieldValue`] and writes
//! are checked against the field's [`FieldKind`].

use std::fmt;

use thiserror::Error;

use crate::flag::FieldValue;
use crate::save_metadata::{SaveMetadata, INTEGER_LIMIT};

/// Value kind of a metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    /// Whole numbers (counters, identifiers).
    Integer,
    /// Any finite number.
    Number,
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Text => "string",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown field `{0}`")]
    Unknown(String),
    #[error("{field} expects a {expected}, got a {found}")]
    TypeMismatch {
        field: &'static str,
        expected: FieldKind,
        found: &'static str,
    },
    #[error("{field} expects a whole number, got {value}")]
    NotAnInteger { field: &'static str, value: f64 },
    #[error("{field} expects a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} expects a {kind}, could not parse `{raw}`")]
    InvalidLiteral {
        field: &'static str,
        kind: FieldKind,
        raw: String,
    },
}

/// Every addressable field of [`SaveMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Exist,
    LastTeleportPointPath,
    AtSceneGuid,
    LastPosX,
    LastPosY,
    LastPosZ,
    Gold,
    Level,
    Exp,
    SkillPointLeft,
    TotalSkillLevel,
    PlayTime,
    DeathCount,
    FinishedCreditRoll,
    SecondTimePlay,
    TrueEndTriggered,
    BadEndTriggered,
    GameMode,
}

impl MetadataField {
    /// All fields in file order.
    pub const ALL: [MetadataField; 18] = [
        MetadataField::Exist,
        MetadataField::LastTeleportPointPath,
        MetadataField::AtSceneGuid,
        MetadataField::LastPosX,
        MetadataField::LastPosY,
        MetadataField::LastPosZ,
        MetadataField::Gold,
        MetadataField::Level,
        MetadataField::Exp,
        MetadataField::SkillPointLeft,
        MetadataField::TotalSkillLevel,
        MetadataField::PlayTime,
        MetadataField::DeathCount,
        MetadataField::FinishedCreditRoll,
        MetadataField::SecondTimePlay,
        MetadataField::TrueEndTriggered,
        MetadataField::BadEndTriggered,
        MetadataField::GameMode,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Exist => "exist",
            Self::LastTeleportPointPath => "lastTeleportPointPath",
            Self::AtSceneGuid => "atSceneGuid",
            Self::LastPosX => "lastPos.x",
            Self::LastPosY => "lastPos.y",
            Self::LastPosZ => "lastPos.z",
            Self::Gold => "gold",
            Self::Level => "level",
            Self::Exp => "exp",
            Self::SkillPointLeft => "skillPointLeft",
            Self::TotalSkillLevel => "totalSkillLevel",
            Self::PlayTime => "playTime",
            Self::DeathCount => "deathCount",
            Self::FinishedCreditRoll => "finishedCreditRoll",
            Self::SecondTimePlay => "secondTimePlay",
            Self::TrueEndTriggered => "trueEndTriggered",
            Self::BadEndTriggered => "badEndTriggered",
            Self::GameMode => "gameMode",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, FieldError> {
        Self::ALL
            .into_iter()
            .find(|f| f.key() == key)
            .ok_or_else(|| FieldError::Unknown(key.to_string()))
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Exist
            | Self::FinishedCreditRoll
            | Self::SecondTimePlay
            | Self::TrueEndTriggered
            | Self::BadEndTriggered => FieldKind::Bool,
            Self::LastTeleportPointPath | Self::AtSceneGuid => FieldKind::Text,
            Self::LastPosX | Self::LastPosY | Self::LastPosZ | Self::PlayTime => FieldKind::Number,
            Self::Gold
            | Self::Level
            | Self::Exp
            | Self::SkillPointLeft
            | Self::TotalSkillLevel
            | Self::DeathCount
            | Self::GameMode => FieldKind::Integer,
        }
    }

    pub fn is_position_axis(&self) -> bool {
        matches!(self, Self::LastPosX | Self::LastPosY | Self::LastPosZ)
    }

    pub fn get(&self, meta: &SaveMetadata) -> FieldValue {
        match self {
            Self::Exist => meta.exist.into(),
            Self::LastTeleportPointPath => meta.last_teleport_point_path.clone().into(),
            Self::AtSceneGuid => meta.at_scene_guid.clone().into(),
            Self::LastPosX => meta.last_pos.x.into(),
            Self::LastPosY => meta.last_pos.y.into(),
            Self::LastPosZ => meta.last_pos.z.into(),
            Self::Gold => meta.gold.into(),
            Self::Level => meta.level.into(),
            Self::Exp => meta.exp.into(),
            Self::SkillPointLeft => meta.skill_point_left.into(),
            Self::TotalSkillLevel => meta.total_skill_level.into(),
            Self::PlayTime => meta.play_time.into(),
            Self::DeathCount => meta.death_count.into(),
            Self::FinishedCreditRoll => meta.finished_credit_roll.into(),
            Self::SecondTimePlay => meta.second_time_play.into(),
            Self::TrueEndTriggered => meta.true_end_triggered.into(),
            Self::BadEndTriggered => meta.bad_end_triggered.into(),
            Self::GameMode => meta.game_mode.into(),
        }
    }

    /// Write a value, rejecting anything that does not match the field's kind.
    pub fn set(&self, meta: &mut SaveMetadata, value: FieldValue) -> Result<(), FieldError> {
        match self.kind() {
            FieldKind::Bool => {
                let b = self.expect(value.as_bool(), &value)?;
                *self.bool_slot(meta) = b;
            }
            FieldKind::Text => {
                let s = match value {
                    FieldValue::String(s) => s,
                    other => return Err(self.mismatch(&other)),
                };
                match self {
                    Self::LastTeleportPointPath => meta.last_teleport_point_path = s,
                    _ => meta.at_scene_guid = s,
                }
            }
            FieldKind::Number => {
                let n = self.expect(value.as_f64(), &value)?;
                if !n.is_finite() {
                    return Err(FieldError::NotFinite {
                        field: self.key(),
                        value: n,
                    });
                }
                match self {
                    Self::LastPosX => meta.last_pos.x = n,
                    Self::LastPosY => meta.last_pos.y = n,
                    Self::LastPosZ => meta.last_pos.z = n,
                    _ => meta.play_time = n,
                }
            }
            FieldKind::Integer => {
                let n = self.expect(value.as_f64(), &value)?;
                if n.fract() != 0.0 || !n.is_finite() || n.abs() >= INTEGER_LIMIT {
                    return Err(FieldError::NotAnInteger {
                        field: self.key(),
                        value: n,
                    });
                }
                *self.int_slot(meta) = n as i64;
            }
        }
        Ok(())
    }

    /// Parse a user-typed literal according to this field's kind.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, FieldError> {
        let invalid = || FieldError::InvalidLiteral {
            field: self.key(),
            kind: self.kind(),
            raw: raw.to_string(),
        };
        match self.kind() {
            FieldKind::Text => Ok(FieldValue::String(raw.to_string())),
            FieldKind::Bool => raw
                .trim()
                .parse::<bool>()
                .map(FieldValue::Bool)
                .map_err(|_| invalid()),
            FieldKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::from)
                .map_err(|_| invalid()),
            FieldKind::Number => match raw.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(FieldValue::Number(n)),
                _ => Err(invalid()),
            },
        }
    }

    fn expect<T>(&self, v: Option<T>, value: &FieldValue) -> Result<T, FieldError> {
        v.ok_or_else(|| self.mismatch(value))
    }

    fn mismatch(&self, value: &FieldValue) -> FieldError {
        FieldError::TypeMismatch {
            field: self.key(),
            expected: self.kind(),
            found: value.type_name(),
        }
    }

    fn bool_slot<'a>(&self, meta: &'a mut SaveMetadata) -> &'a mut bool {
        match self {
            Self::FinishedCreditRoll => &mut meta.finished_credit_roll,
            Self::SecondTimePlay => &mut meta.second_time_play,
            Self::TrueEndTriggered => &mut meta.true_end_triggered,
            Self::BadEndTriggered => &mut meta.bad_end_triggered,
            _ => &mut meta.exist,
        }
    }

    fn int_slot<'a>(&self, meta: &'a mut SaveMetadata) -> &'a mut i64 {
        match self {
            Self::Level => &mut meta.level,
            Self::Exp => &mut meta.exp,
            Self::SkillPointLeft => &mut meta.skill_point_left,
            Self::TotalSkillLevel => &mut meta.total_skill_level,
            Self::DeathCount => &mut meta.death_count,
            Self::GameMode => &mut meta.game_mode,
            _ => &mut meta.gold,
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
