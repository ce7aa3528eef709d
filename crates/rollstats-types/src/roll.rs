//! Decoded roll submissions and the outcome of storing them.

use crate::{BooleanField, DiceGroup, DiceKind, IntegerField, TextField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A roll after intake decoding: every value carries its proper type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollSubmission {
    pub integers: BTreeMap<IntegerField, Option<i64>>,
    pub booleans: BTreeMap<BooleanField, bool>,
    pub texts: BTreeMap<TextField, Option<String>>,
    /// At most one group per kind.
    pub dice: Vec<DiceGroup>,
    pub formula_elements: Vec<String>,
    pub invested_energies: Vec<String>,
}

impl RollSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integer(mut self, field: IntegerField, value: i64) -> Self {
        self.integers.insert(field, Some(value));
        self
    }

    pub fn with_flag(mut self, field: BooleanField, value: bool) -> Self {
        self.booleans.insert(field, value);
        self
    }

    pub fn with_text(mut self, field: TextField, value: impl Into<String>) -> Self {
        self.texts.insert(field, Some(value.into()));
        self
    }

    pub fn with_dice(mut self, kind: DiceKind, faces: Vec<i64>) -> Self {
        self.set_dice(DiceGroup::new(kind, faces));
        self
    }

    pub fn with_formula(mut self, elements: &[&str]) -> Self {
        self.formula_elements = elements.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_energies(mut self, energies: &[&str]) -> Self {
        self.invested_energies = energies.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Replace the group of the same kind, if any.
    pub fn set_dice(&mut self, group: DiceGroup) {
        self.dice.retain(|g| g.kind != group.kind);
        self.dice.push(group);
    }

    pub fn integer(&self, field: IntegerField) -> Option<i64> {
        self.integers.get(&field).copied().flatten()
    }

    /// Missing flags read as `false`.
    pub fn flag(&self, field: BooleanField) -> bool {
        self.booleans.get(&field).copied().unwrap_or(false)
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        self.texts.get(&field).and_then(|v| v.as_deref())
    }

    pub fn dice(&self, kind: DiceKind) -> Option<&DiceGroup> {
        self.dice.iter().find(|g| g.kind == kind)
    }

    pub fn faces(&self, kind: DiceKind) -> &[i64] {
        self.dice(kind).map(|g| g.faces.as_slice()).unwrap_or(&[])
    }

    pub fn name(&self) -> Option<&str> {
        self.text(TextField::Name)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.text(TextField::Timestamp)
    }

    pub fn reason(&self) -> Option<&str> {
        self.text(TextField::Reason)
    }

    pub fn margin(&self) -> Option<i64> {
        self.integer(IntegerField::Margin)
    }

    pub fn threshold(&self) -> Option<i64> {
        self.integer(IntegerField::Threshold)
    }

    /// Whether the roll counts towards statistics.
    pub fn is_test(&self) -> bool {
        self.threshold().is_some_and(|t| t > 0)
    }

    /// True when the submission carried any field at all.
    pub fn has_values(&self) -> bool {
        !self.integers.is_empty()
            || !self.booleans.is_empty()
            || !self.texts.is_empty()
            || !self.dice.is_empty()
            || !self.formula_elements.is_empty()
            || !self.invested_energies.is_empty()
    }

    pub fn has_base_dice(&self) -> bool {
        !self.faces(DiceKind::Base).is_empty()
    }
}

/// Why a submission was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No field carried a value.
    Empty,
    /// The roll has no base dice.
    NoBaseDice,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "submission carries no roll data"),
            RejectReason::NoBaseDice => write!(f, "submission carries no base dice"),
        }
    }
}

/// Result of handing a submission to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsertOutcome {
    Stored {
        roll_id: i64,
        /// An earlier roll with the same identity was deleted first.
        replaced: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        ignored_fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        unknown_fields: Vec<String>,
    },
    Rejected {
        reason: RejectReason,
    },
}

impl InsertOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, InsertOutcome::Stored { .. })
    }
}
