//! Decoding of raw, string-keyed roll submissions.
//!
//! Clients (the web form, a chat crawler) send flat maps of strings: booleans
//! as `"true"`, dice and labels as comma-joined lists. Everything is turned
//! into a typed [`RollSubmission`] here so the store never sees raw strings.

use crate::{Result, RollStatsError};
use rollstats_types::{DiceGroup, RollField, RollSubmission};
use tracing::{debug, warn};

/// A decoded submission plus the names that did not make it into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRoll {
    pub submission: RollSubmission,
    /// Known client-only fields that are never stored.
    pub ignored: Vec<String>,
    /// Names outside the field schema.
    pub unknown: Vec<String>,
}

/// Decode a raw field map.
///
/// Unknown names are skipped with a warning. A value that cannot be decoded for
/// its declared kind fails the whole submission.
pub fn decode_fields<I, K, V>(fields: I) -> Result<DecodedRoll>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut decoded = DecodedRoll::default();

    for (key, value) in fields {
        let (key, value) = (key.as_ref(), value.as_ref());
        let field = match key.parse::<RollField>() {
            Ok(field) => field,
            Err(unknown) => {
                warn!(target: "rollstats::intake", "Ignoring {} (value {:?})", unknown, value);
                decoded.unknown.push(unknown.0);
                continue;
            }
        };

        let submission = &mut decoded.submission;
        match field {
            RollField::Integer(f) => {
                submission.integers.insert(f, parse_integer(key, value)?);
            }
            RollField::Boolean(f) => {
                submission.booleans.insert(f, value == "true");
            }
            RollField::Text(f) => {
                let text = (!value.is_empty()).then(|| value.to_string());
                submission.texts.insert(f, text);
            }
            RollField::Dice(kind) => {
                let faces = split_list(value)
                    .map(|face| {
                        face.parse::<i64>().map_err(|_| RollStatsError::InvalidDice {
                            field: key.to_string(),
                            value: face.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                submission.set_dice(DiceGroup::new(kind, faces));
            }
            RollField::FormulaElements => {
                submission.formula_elements = split_list(value).map(str::to_string).collect();
            }
            RollField::InvestedEnergies => {
                submission.invested_energies = split_list(value).map(str::to_string).collect();
            }
            RollField::Ignored => {
                debug!(target: "rollstats::intake", "Skipping client-only field {}", key);
                decoded.ignored.push(key.to_string());
            }
        }
    }

    Ok(decoded)
}

/// `"NaN"` and empty strings are NULL.
fn parse_integer(field: &str, value: &str) -> Result<Option<i64>> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "NaN" {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| RollStatsError::InvalidInteger {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}
