//! Static schema of the fields a roll submission may carry.
//!
//! Every accepted field name maps to exactly one [`RollField`]. Names that are
//! not part of the schema fail to parse with [`UnknownField`], so callers have
//! to decide explicitly what to do with them.

use crate::DiceKind;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Nullable integer columns of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerField {
    /// Number of base dice in the pool.
    Number,
    /// Number of faces of each base die.
    Type,
    MaxValue,
    Threshold,
    Margin,
    MarginThrottle,
    TalentLevel,
    BaseEnergyCost,
    CriticalIncrease,
    Precision,
    OptionalPrecision,
    Power,
    OptionalPower,
    MagicPower,
    Speed,
    OptionalSpeed,
    MarginModifier,
    EffectModifier,
    UnderValue,
    SuperpowerModifier,
    Unease,
    ExpendedCharge,
}

impl IntegerField {
    pub const ALL: [IntegerField; 22] = [
        IntegerField::Number,
        IntegerField::Type,
        IntegerField::MaxValue,
        IntegerField::Threshold,
        IntegerField::Margin,
        IntegerField::MarginThrottle,
        IntegerField::TalentLevel,
        IntegerField::BaseEnergyCost,
        IntegerField::CriticalIncrease,
        IntegerField::Precision,
        IntegerField::OptionalPrecision,
        IntegerField::Power,
        IntegerField::OptionalPower,
        IntegerField::MagicPower,
        IntegerField::Speed,
        IntegerField::OptionalSpeed,
        IntegerField::MarginModifier,
        IntegerField::EffectModifier,
        IntegerField::UnderValue,
        IntegerField::SuperpowerModifier,
        IntegerField::Unease,
        IntegerField::ExpendedCharge,
    ];

    pub fn column(self) -> &'static str {
        match self {
            IntegerField::Number => "number",
            IntegerField::Type => "type",
            IntegerField::MaxValue => "max_value",
            IntegerField::Threshold => "threshold",
            IntegerField::Margin => "margin",
            IntegerField::MarginThrottle => "margin_throttle",
            IntegerField::TalentLevel => "talent_level",
            IntegerField::BaseEnergyCost => "base_energy_cost",
            IntegerField::CriticalIncrease => "critical_increase",
            IntegerField::Precision => "precision",
            IntegerField::OptionalPrecision => "optional_precision",
            IntegerField::Power => "power",
            IntegerField::OptionalPower => "optional_power",
            IntegerField::MagicPower => "magic_power",
            IntegerField::Speed => "speed",
            IntegerField::OptionalSpeed => "optional_speed",
            IntegerField::MarginModifier => "margin_modifier",
            IntegerField::EffectModifier => "effect_modifier",
            IntegerField::UnderValue => "under_value",
            IntegerField::SuperpowerModifier => "superpower_modifier",
            IntegerField::Unease => "unease",
            IntegerField::ExpendedCharge => "expended_charge",
        }
    }
}

/// Boolean flags of a roll. Submitted as the literal strings `"true"`/`"false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanField {
    Recording,
    CriticalSuccess,
    CriticalFailure,
    IsMagic,
    IsPower,
    Incantation,
    SomaticComponent,
    MaterialComponent,
    EnergyInvestmentValidated,
}

impl BooleanField {
    pub const ALL: [BooleanField; 9] = [
        BooleanField::Recording,
        BooleanField::CriticalSuccess,
        BooleanField::CriticalFailure,
        BooleanField::IsMagic,
        BooleanField::IsPower,
        BooleanField::Incantation,
        BooleanField::SomaticComponent,
        BooleanField::MaterialComponent,
        BooleanField::EnergyInvestmentValidated,
    ];

    pub fn column(self) -> &'static str {
        match self {
            BooleanField::Recording => "recording",
            BooleanField::CriticalSuccess => "critical_success",
            BooleanField::CriticalFailure => "critical_failure",
            BooleanField::IsMagic => "is_magic",
            BooleanField::IsPower => "is_power",
            BooleanField::Incantation => "incantation",
            BooleanField::SomaticComponent => "somatic_component",
            BooleanField::MaterialComponent => "material_component",
            BooleanField::EnergyInvestmentValidated => "energy_investment_validated",
        }
    }
}

/// Free-text columns of a roll. Empty strings are stored as NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    /// Character name.
    Name,
    /// Opaque client timestamp, part of the roll identity.
    Timestamp,
    /// Test label.
    Reason,
    Effect,
    Distance,
    Focus,
    Duration,
    BlackMagic,
    MagicResistance,
    ArmorPenalty,
    Equipment,
}

impl TextField {
    pub const ALL: [TextField; 11] = [
        TextField::Name,
        TextField::Timestamp,
        TextField::Reason,
        TextField::Effect,
        TextField::Distance,
        TextField::Focus,
        TextField::Duration,
        TextField::BlackMagic,
        TextField::MagicResistance,
        TextField::ArmorPenalty,
        TextField::Equipment,
    ];

    pub fn column(self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::Timestamp => "timestamp",
            TextField::Reason => "reason",
            TextField::Effect => "effect",
            TextField::Distance => "distance",
            TextField::Focus => "focus",
            TextField::Duration => "duration",
            TextField::BlackMagic => "black_magic",
            TextField::MagicResistance => "magic_resistance",
            TextField::ArmorPenalty => "armor_penalty",
            TextField::Equipment => "equipment",
        }
    }
}

/// Client-side fields that are accepted but never stored.
pub const IGNORED_FIELDS: [&str; 3] = ["labels", "tooltips", "equipment_id"];

pub const FORMULA_FIELD: &str = "formula_elements";
pub const ENERGIES_FIELD: &str = "invested_energies";

/// A recognized submission field and how its raw value is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollField {
    Integer(IntegerField),
    Boolean(BooleanField),
    Text(TextField),
    Dice(DiceKind),
    FormulaElements,
    InvestedEnergies,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown roll field '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for RollField {
    type Err = UnknownField;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if let Some(field) = IntegerField::ALL.into_iter().find(|f| f.column() == name) {
            return Ok(RollField::Integer(field));
        }
        if let Some(field) = BooleanField::ALL.into_iter().find(|f| f.column() == name) {
            return Ok(RollField::Boolean(field));
        }
        if let Some(field) = TextField::ALL.into_iter().find(|f| f.column() == name) {
            return Ok(RollField::Text(field));
        }
        if let Some(kind) = DiceKind::from_field_name(name) {
            return Ok(RollField::Dice(kind));
        }
        match name {
            FORMULA_FIELD => Ok(RollField::FormulaElements),
            ENERGIES_FIELD => Ok(RollField::InvestedEnergies),
            _ if IGNORED_FIELDS.contains(&name) => Ok(RollField::Ignored),
            _ => Err(UnknownField(name.to_string())),
        }
    }
}
