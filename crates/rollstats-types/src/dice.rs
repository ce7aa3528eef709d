//! Dice groups attached to a roll.

use serde::{Deserialize, Serialize};

/// Which pool a group of dice was rolled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiceKind {
    Base,
    Critical,
    Effect,
    Localisation,
    Power,
    Margin,
    Precision,
}

impl DiceKind {
    pub const ALL: [DiceKind; 7] = [
        DiceKind::Base,
        DiceKind::Critical,
        DiceKind::Effect,
        DiceKind::Localisation,
        DiceKind::Power,
        DiceKind::Margin,
        DiceKind::Precision,
    ];

    /// Submission field name, also stored verbatim in the `dices.type` column.
    pub fn field_name(self) -> &'static str {
        match self {
            DiceKind::Base => "base_dices",
            DiceKind::Critical => "critical_dices",
            DiceKind::Effect => "effect_dices",
            DiceKind::Localisation => "localisation_dices",
            DiceKind::Power => "power_dices",
            DiceKind::Margin => "margin_dices",
            DiceKind::Precision => "precision_dices",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field_name() == name)
    }
}

/// Faces of one dice pool, in the order they were rolled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceGroup {
    pub kind: DiceKind,
    pub faces: Vec<i64>,
}

impl DiceGroup {
    pub fn new(kind: DiceKind, faces: Vec<i64>) -> Self {
        Self { kind, faces }
    }

    pub fn sum(&self) -> i64 {
        self.faces.iter().sum()
    }
}
