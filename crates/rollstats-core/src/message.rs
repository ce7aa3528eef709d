//! Chat rendering of stored rolls.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rollstats_types::{BooleanField, DiceKind, IntegerField, RollSubmission, TextField};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a campaign wants its rolls posted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Text,
    Embed,
}

/// Outcome of a roll as shown in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollOutcome {
    CriticalSuccess,
    CriticalFailure,
    /// No margin: the dice were rolled without a test.
    SimpleRoll,
    Success,
    Failure,
}

impl RollOutcome {
    pub fn classify(roll: &RollSubmission) -> Self {
        if roll.flag(BooleanField::CriticalSuccess) {
            return RollOutcome::CriticalSuccess;
        }
        if roll.flag(BooleanField::CriticalFailure) {
            return RollOutcome::CriticalFailure;
        }
        match roll.margin() {
            None => RollOutcome::SimpleRoll,
            Some(m) if m >= 1 => RollOutcome::Success,
            Some(_) => RollOutcome::Failure,
        }
    }

    pub fn color(self) -> u32 {
        match self {
            RollOutcome::CriticalSuccess => 0x00ff11,
            RollOutcome::CriticalFailure => 0xff0000,
            RollOutcome::SimpleRoll => 0x0066cc,
            RollOutcome::Success => 0x01890a,
            RollOutcome::Failure => 0xa70101,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RollOutcome::CriticalSuccess => "+ Critical success +",
            RollOutcome::CriticalFailure => "- Critical failure -",
            RollOutcome::SimpleRoll => "Take a chance, roll the dice!",
            RollOutcome::Success => "Success",
            RollOutcome::Failure => "Failure",
        }
    }

    /// Syntax hint used to color the label code block.
    fn code_hint(self) -> &'static str {
        match self {
            RollOutcome::CriticalSuccess | RollOutcome::CriticalFailure => "diff",
            RollOutcome::SimpleRoll => "ini",
            RollOutcome::Success => "cpp",
            RollOutcome::Failure => "fix",
        }
    }

    fn motto(self) -> &'static str {
        match self {
            RollOutcome::CriticalSuccess => "Drinks are on you!",
            RollOutcome::CriticalFailure => "Maybe have a cup of tea first.",
            RollOutcome::SimpleRoll => "Alea jacta est.",
            RollOutcome::Success => "Well done.",
            RollOutcome::Failure => "Better luck next time.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Rich message layout understood by chat services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub author: String,
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum RenderedMessage {
    Text(String),
    Embed(Embed),
}

pub fn render(character: &str, roll: &RollSubmission, format: MessageFormat) -> RenderedMessage {
    match format {
        MessageFormat::Text => RenderedMessage::Text(render_text(character, roll)),
        MessageFormat::Embed => RenderedMessage::Embed(render_embed(character, roll)),
    }
}

pub fn render_text(character: &str, roll: &RollSubmission) -> String {
    let mut lines = Vec::new();

    match roll.margin() {
        Some(margin) => {
            let mut reason = roll.reason().map(|r| format!("{r}: ")).unwrap_or_default();
            reason.push_str(&roll.formula_elements.join(", "));
            lines.push(format!("**@{character}** ({reason}):"));
            lines.push(format!(
                "Margin of {margin} against a threshold of {}",
                display_integer(roll.threshold())
            ));
            push_critical_lines(&mut lines, roll);
            lines.push(format!("Effect dice: {}", join_faces(roll.faces(DiceKind::Effect), ", ")));
            let modifier = effect_modifier(roll);
            if modifier != 0 {
                lines.push(format!("Effect modifier: {modifier}"));
            }
            if let Some(effect) = roll.text(TextField::Effect) {
                lines.push(format!("Effect: {}", expand_effect(effect, margin, effect_throw(roll, margin))));
            }
        }
        None => {
            lines.push(format!(
                "**@{character}** rolled {}d{}: {}",
                display_integer(roll.integer(IntegerField::Number)),
                display_integer(roll.integer(IntegerField::Type)),
                join_faces(roll.faces(DiceKind::Base), ", ")
            ));
            push_critical_lines(&mut lines, roll);
        }
    }

    lines.join("\n")
}

fn push_critical_lines(lines: &mut Vec<String>, roll: &RollSubmission) {
    if roll.flag(BooleanField::CriticalSuccess) {
        lines.push("Critical success!".to_string());
    }
    if roll.flag(BooleanField::CriticalFailure) {
        lines.push("Critical failure...".to_string());
    }
}

pub fn render_embed(character: &str, roll: &RollSubmission) -> Embed {
    let outcome = RollOutcome::classify(roll);
    let base = roll.faces(DiceKind::Base);
    let base_sum: i64 = base.iter().sum();
    let outcome_field = EmbedField::new(
        outcome.label(),
        format!("```{}\n{}```", outcome.code_hint(), outcome.label()),
        roll.margin().is_some(),
    );

    let Some(margin) = roll.margin() else {
        return Embed {
            author: format!("@{character}"),
            title: "A simple roll".to_string(),
            description: String::new(),
            color: outcome.color(),
            fields: vec![
                EmbedField::new("Roll", join_faces(base, " "), true),
                EmbedField::new("Result", base_sum.to_string(), true),
                outcome_field,
            ],
            footer: Some(outcome.motto().to_string()),
        };
    };

    let formula = roll.formula_elements.join(" + ");
    let (title, description) = match roll.reason() {
        Some(reason) => (
            format!(
                "{reason} (level {})",
                display_integer(roll.integer(IntegerField::TalentLevel))
            ),
            format!(
                "Test under {formula} + {reason} ({})",
                display_integer(roll.integer(IntegerField::MaxValue))
            ),
        ),
        None => (
            "Let's roll!".to_string(),
            format!(
                "Test under {formula} ({})",
                display_integer(roll.integer(IntegerField::MaxValue))
            ),
        ),
    };

    let mut fields = vec![
        EmbedField::new("Roll", join_faces(base, " "), true),
        EmbedField::new(
            "Result",
            format!(
                "{base_sum} under {}\nMR: {margin}",
                display_integer(roll.threshold())
            ),
            true,
        ),
        outcome_field,
    ];
    for (kind, name) in [(DiceKind::Critical, "Critical dice"), (DiceKind::Power, "Power dice")] {
        let faces = roll.faces(kind);
        if !faces.is_empty() {
            fields.push(EmbedField::new(name, join_faces(faces, " "), true));
        }
    }
    fields.push(EmbedField::new(
        "Effect dice",
        join_faces(roll.faces(DiceKind::Effect), " "),
        true,
    ));
    let modifier = effect_modifier(roll);
    if modifier != 0 {
        fields.push(EmbedField::new("Effect modifier", modifier.to_string(), true));
    }
    match roll.text(TextField::Effect) {
        Some(effect) => fields.push(EmbedField::new(
            "Effect",
            expand_effect(effect, margin, effect_throw(roll, margin)),
            true,
        )),
        None => fields.push(EmbedField::new("Alea Jacta Est!", "*It's a simple roll*", true)),
    }

    Embed {
        author: format!("@{character}"),
        title,
        description,
        color: outcome.color(),
        fields,
        footer: Some(outcome.motto().to_string()),
    }
}

fn effect_modifier(roll: &RollSubmission) -> i64 {
    roll.integer(IntegerField::EffectModifier).unwrap_or(0)
}

/// Margin plus effect dice plus effect modifier.
fn effect_throw(roll: &RollSubmission, margin: i64) -> i64 {
    margin + roll.faces(DiceKind::Effect).iter().sum::<i64>() + effect_modifier(roll)
}

fn join_faces(faces: &[i64], sep: &str) -> String {
    faces.iter().map(i64::to_string).collect::<Vec<_>>().join(sep)
}

fn display_integer(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Critical flags carried by an embed color: (critical_success, critical_failure).
fn critical_flags(color: u32) -> Option<(bool, bool)> {
    match color {
        0x00ff11 => Some((true, false)),
        0xff0000 => Some((false, true)),
        0x01890a | 0xa70101 | 0x0066cc => Some((false, false)),
        _ => None,
    }
}

/// Read a posted roll embed back into submission fields.
///
/// Returns `None` for embeds that are not rolls: no author, an unknown color,
/// no base dice, or a test whose effect and critical dice disagree with its
/// flags. The embed has no timestamp; callers add it before inserting.
pub fn parse_embed(embed: &Embed) -> Option<Vec<(String, String)>> {
    let name = embed.author.strip_prefix('@').unwrap_or(&embed.author);
    if name.is_empty() {
        return None;
    }
    let (critical_success, critical_failure) = critical_flags(embed.color)?;

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut push = |key: &str, value: String| fields.push((key.to_string(), value));
    push("name", name.to_string());
    push("recording", "false".to_string());
    push("critical_success", critical_success.to_string());
    push("critical_failure", critical_failure.to_string());

    let reason = parse_title(&embed.title);
    match &reason {
        Some((reason, level)) => {
            push("reason", reason.clone());
            push("talent_level", level.clone());
        }
        None => push("talent_level", "0".to_string()),
    }
    let (formula, max_value) =
        parse_description(&embed.description, reason.as_ref().map(|(r, _)| r.as_str()));
    push("formula_elements", formula);
    push("max_value", max_value);

    let mut threshold = None;
    let (mut has_base, mut has_effect, mut has_critical) = (false, false, false);
    for field in &embed.fields {
        let value = field.value.as_str();
        match field.name.as_str() {
            "Roll" => {
                has_base = true;
                push("base_dices", dice_list(value));
                push("number", value.split_whitespace().count().to_string());
                push("type", "6".to_string());
            }
            "Effect dice" => {
                has_effect = true;
                push("effect_dices", dice_list(value));
            }
            "Power dice" => {
                push("power_dices", dice_list(value));
                push("optional_power", value.split_whitespace().count().to_string());
                push("invested_energies", "optional-power".to_string());
            }
            "Critical dice" => {
                has_critical = true;
                push("critical_dices", dice_list(value));
            }
            "Effect modifier" => push("effect_modifier", value.to_string()),
            "Result" => {
                let (t, margin) = parse_result(value);
                threshold = Some(t.clone());
                push("threshold", t);
                if let Some(margin) = margin {
                    push("margin", margin);
                }
            }
            "Effect" => push("effect", value.to_string()),
            _ => {}
        }
    }

    if !has_base {
        debug!(target: "rollstats::intake", "Embed of {} has no base dice", name);
        return None;
    }
    let tested = threshold.and_then(|t| t.parse::<i64>().ok()).is_some_and(|t| t != 0);
    if tested && (!has_effect || critical_success != has_critical) {
        debug!(target: "rollstats::intake", "Embed of {} has inconsistent dice", name);
        return None;
    }
    Some(fields)
}

/// `"<reason> (level <n>)"` into (reason, level).
fn parse_title(title: &str) -> Option<(String, String)> {
    let (reason, rest) = title.rsplit_once(" (level ")?;
    let level = rest.strip_suffix(')')?;
    Some((reason.to_string(), integer_text(level)))
}

/// `"Test under a + b[ + reason] (<max>)"` into ("a,b", max).
fn parse_description(description: &str, reason: Option<&str>) -> (String, String) {
    let Some((formula, rest)) = description.rsplit_once(" (") else {
        return (String::new(), "0".to_string());
    };
    let max_value = rest.strip_suffix(')').unwrap_or(rest);

    let formula = formula.strip_prefix("Test under ").unwrap_or(formula);
    let mut elements: Vec<&str> = formula.split(" + ").filter(|e| !e.is_empty()).collect();
    if reason.is_some() && elements.last().copied() == reason {
        elements.pop();
    }
    (elements.join(","), integer_text(max_value))
}

/// `"<sum> under <threshold>\nMR: <margin>"` into (threshold, margin). A
/// simple roll only shows its sum and has threshold 0.
fn parse_result(value: &str) -> (String, Option<String>) {
    let Some((_, rest)) = value.split_once(" under ") else {
        return ("0".to_string(), None);
    };
    let (threshold, margin) = match rest.split_once("\nMR: ") {
        Some((threshold, margin)) => (threshold, Some(margin.trim().to_string())),
        None => (rest, None),
    };
    (integer_text(threshold), margin)
}

/// Undo `display_integer`: `?` stands for a missing value.
fn integer_text(value: &str) -> String {
    match value.trim() {
        "?" => "NaN".to_string(),
        v => v.to_string(),
    }
}

fn dice_list(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(",")
}

const EFFECT_LETTERS: &str = "ABCDEFGHIJK";

#[rustfmt::skip]
const EFFECT_TABLE: [[i64; 27]; 11] = [
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3],
    [0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4],
    [0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5],
    [0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 2, 2, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6],
    [0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 4, 6, 6, 6, 6, 8, 8, 8, 8],
    [0, 0, 0, 1, 2, 2, 2, 2, 2, 2, 3, 3, 4, 4, 4, 4, 4, 4, 4, 6, 6, 6, 6, 8, 8, 8, 8],
    [0, 0, 0, 1, 2, 2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 5, 5, 5, 5, 7, 7, 7, 7, 9, 9, 9, 9],
    [0, 0, 0, 1, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 5, 6, 6, 6, 6, 8, 8, 8, 8, 9, 9, 9, 9],
    [0, 0, 0, 1, 2, 2, 2, 4, 4, 4, 4, 4, 5, 5, 5, 6, 6, 6, 6, 8, 8, 8, 8, 10, 10, 10, 10],
    [0, 0, 0, 1, 3, 3, 3, 4, 4, 4, 5, 5, 6, 6, 6, 8, 8, 8, 8, 10, 10, 10, 10, 12, 12, 12, 12],
    [0, 0, 0, 1, 3, 3, 3, 5, 5, 5, 5, 5, 6, 6, 6, 8, 8, 8, 8, 10, 10, 10, 10, 12, 12, 12, 12],
];

/// Growth per four points of throw past the end of the table.
const EFFECT_INCREMENT: [i64; 11] = [1, 1, 2, 2, 2, 2, 3, 3, 4, 4, 6];

/// Effect of column `letter` for `throw`. Unknown letters and negative
/// throws yield 0.
pub fn effect_value(letter: char, throw: i64) -> i64 {
    let Some(row) = EFFECT_LETTERS.find(letter) else {
        return 0;
    };
    if throw < 0 {
        return 0;
    }
    let column = &EFFECT_TABLE[row];
    let last = (column.len() - 1) as i64;
    if throw <= last {
        return column[throw as usize];
    }
    let steps = (throw - last + 3) / 4;
    steps * EFFECT_INCREMENT[row] + column[column.len() - 1]
}

static EFFECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s?([ABCDEFGHIJK])\s?([+-]\s?[1-9])?\s?\]").unwrap());

/// Substitute `MR` with the margin and every `[L]` / `[L±k]` token with its
/// effect value at `throw` (shifted by `k`).
pub fn expand_effect(description: &str, margin: i64, throw: i64) -> String {
    let with_margin = description.replace("MR", &margin.to_string());
    EFFECT_PATTERN
        .replace_all(&with_margin, |caps: &Captures| {
            let letter = caps[1].chars().next().unwrap_or(' ');
            let shift = caps
                .get(2)
                .and_then(|m| m.as_str().replace(' ', "").parse::<i64>().ok())
                .unwrap_or(0);
            effect_value(letter, throw + shift).to_string()
        })
        .into_owned()
}
