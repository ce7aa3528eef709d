//! SQLite persistence for the roll log.
//!
//! Rolls live in one table keyed by an autoincrement id that doubles as the
//! insertion sequence. Dice faces, formula elements and invested energies are
//! child tables that cascade with their roll. The aggregation queries are in
//! [`crate::stats`].

use crate::intake::{decode_fields, DecodedRoll};
use crate::Result;
use rollstats_types::{
    BooleanField, InsertOutcome, IntegerField, RejectReason, RollSubmission, TextField,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// SQLite-based roll store.
pub struct RollStore {
    pub(crate) conn: Mutex<Connection>,
}

impl RollStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql())?;
        Ok(())
    }

    /// Decode a raw field map and store it.
    pub fn insert_raw<I, K, V>(&self, campaign: &str, fields: I) -> Result<InsertOutcome>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let decoded = decode_fields(fields)?;
        self.insert_decoded(campaign, &decoded)
    }

    /// Store a roll, replacing any earlier roll with the same
    /// (campaign, name, timestamp).
    pub fn insert_roll(&self, campaign: &str, submission: &RollSubmission) -> Result<InsertOutcome> {
        self.write_roll(campaign, submission, Vec::new(), Vec::new())
    }

    /// Insert an already decoded roll, keeping its ignored and unknown field names in the outcome.
    pub fn insert_decoded(&self, campaign: &str, decoded: &DecodedRoll) -> Result<InsertOutcome> {
        self.write_roll(
            campaign,
            &decoded.submission,
            decoded.ignored.clone(),
            decoded.unknown.clone(),
        )
    }

    fn write_roll(
        &self,
        campaign: &str,
        roll: &RollSubmission,
        ignored_fields: Vec<String>,
        unknown_fields: Vec<String>,
    ) -> Result<InsertOutcome> {
        let rejection = if !roll.has_values() {
            Some(RejectReason::Empty)
        } else if !roll.has_base_dice() {
            Some(RejectReason::NoBaseDice)
        } else {
            None
        };
        if let Some(reason) = rejection {
            warn!(
                target: "rollstats::db",
                "Not storing roll of {:?} in campaign {}: {}",
                roll.name(),
                campaign,
                reason
            );
            return Ok(InsertOutcome::Rejected { reason });
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut replaced = false;
        if let (Some(name), Some(timestamp)) = (roll.name(), roll.timestamp()) {
            let deleted = tx.execute(
                "DELETE FROM rolls WHERE campaign = ?1 AND name = ?2 AND timestamp = ?3",
                params![campaign, name, timestamp],
            )?;
            replaced = deleted > 0;
        }

        let (columns, values) = roll_columns(campaign, roll);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let quoted = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(
            &format!("INSERT INTO rolls ({quoted}) VALUES ({placeholders})"),
            params_from_iter(values.iter()),
        )?;
        let roll_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO dices (roll, "type", dice_index, dice) VALUES (?1, ?2, ?3, ?4)"#,
            )?;
            for group in &roll.dice {
                for (index, face) in group.faces.iter().enumerate() {
                    stmt.execute(params![roll_id, group.kind.field_name(), index as i64, face])?;
                }
            }

            let mut stmt =
                tx.prepare("INSERT INTO formula_elements (roll, element) VALUES (?1, ?2)")?;
            for element in &roll.formula_elements {
                stmt.execute(params![roll_id, element])?;
            }

            let mut stmt =
                tx.prepare("INSERT INTO invested_energies (roll, energy) VALUES (?1, ?2)")?;
            for energy in &roll.invested_energies {
                stmt.execute(params![roll_id, energy])?;
            }
        }

        tx.commit()?;
        debug!(
            target: "rollstats::db",
            "Stored roll {} for {:?} in campaign {} (replaced: {})",
            roll_id,
            roll.name(),
            campaign,
            replaced
        );

        Ok(InsertOutcome::Stored {
            roll_id,
            replaced,
            ignored_fields,
            unknown_fields,
        })
    }

    /// Number of rolls stored for a campaign, qualifying or not.
    pub fn roll_count(&self, campaign: &str) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM rolls WHERE campaign = ?1",
            params![campaign],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

/// Column names and values for the `rolls` row of a submission.
fn roll_columns(campaign: &str, roll: &RollSubmission) -> (Vec<&'static str>, Vec<Value>) {
    let mut columns = vec!["campaign"];
    let mut values = vec![Value::Text(campaign.to_string())];

    for (field, value) in &roll.integers {
        columns.push(field.column());
        values.push(value.map(Value::Integer).unwrap_or(Value::Null));
    }
    for (field, value) in &roll.booleans {
        columns.push(field.column());
        values.push(Value::Integer(*value as i64));
    }
    for (field, value) in &roll.texts {
        columns.push(field.column());
        values.push(value.clone().map(Value::Text).unwrap_or(Value::Null));
    }

    (columns, values)
}

/// DDL for every table, with the `rolls` columns generated from the field schema.
fn schema_sql() -> String {
    let mut columns = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "campaign TEXT NOT NULL".to_string(),
    ];
    columns.extend(
        IntegerField::ALL
            .iter()
            .map(|f| format!("\"{}\" INTEGER", f.column())),
    );
    columns.extend(
        BooleanField::ALL
            .iter()
            .map(|f| format!("\"{}\" INTEGER NOT NULL DEFAULT 0", f.column())),
    );
    columns.extend(TextField::ALL.iter().map(|f| format!("\"{}\" TEXT", f.column())));

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS rolls (
            {}
        );

        CREATE INDEX IF NOT EXISTS idx_rolls_identity ON rolls(campaign, name, timestamp);
        CREATE INDEX IF NOT EXISTS idx_rolls_reason ON rolls(campaign, reason);

        CREATE TABLE IF NOT EXISTS dices (
            roll INTEGER NOT NULL REFERENCES rolls(id) ON DELETE CASCADE,
            "type" TEXT NOT NULL,
            dice_index INTEGER NOT NULL,
            dice INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_dices_roll ON dices(roll);

        CREATE TABLE IF NOT EXISTS formula_elements (
            roll INTEGER NOT NULL REFERENCES rolls(id) ON DELETE CASCADE,
            element TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_formula_elements_roll ON formula_elements(roll);

        CREATE TABLE IF NOT EXISTS invested_energies (
            roll INTEGER NOT NULL REFERENCES rolls(id) ON DELETE CASCADE,
            energy TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invested_energies_roll ON invested_energies(roll);
        "#,
        columns.join(",\n            ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollstats_types::DiceKind;
    use tempfile::TempDir;

    fn create_test_store() -> (RollStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("rolls.sqlite3");
        let store = RollStore::open(&db_path).unwrap();
        (store, temp_dir)
    }

    fn child_count(store: &RollStore, table: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    fn sample_roll(margin: i64) -> RollSubmission {
        RollSubmission::new()
            .with_text(TextField::Name, "Ana")
            .with_text(TextField::Timestamp, "t1")
            .with_integer(IntegerField::Threshold, 8)
            .with_integer(IntegerField::Margin, margin)
            .with_dice(DiceKind::Base, vec![3, 2])
            .with_dice(DiceKind::Effect, vec![4])
            .with_formula(&["strength", "athletics"])
            .with_energies(&["optional-power"])
    }

    #[test]
    fn test_insert_writes_children() {
        let (store, _dir) = create_test_store();
        let outcome = store.insert_roll("camp", &sample_roll(3)).unwrap();
        assert!(matches!(outcome, InsertOutcome::Stored { replaced: false, .. }));

        assert_eq!(store.roll_count("camp").unwrap(), 1);
        assert_eq!(child_count(&store, "dices"), 3);
        assert_eq!(child_count(&store, "formula_elements"), 2);
        assert_eq!(child_count(&store, "invested_energies"), 1);
    }

    #[test]
    fn test_resubmission_replaces_roll_and_children() {
        let (store, _dir) = create_test_store();
        store.insert_roll("camp", &sample_roll(3)).unwrap();
        let outcome = store.insert_roll("camp", &sample_roll(-1)).unwrap();
        assert!(matches!(outcome, InsertOutcome::Stored { replaced: true, .. }));

        assert_eq!(store.roll_count("camp").unwrap(), 1);
        assert_eq!(child_count(&store, "dices"), 3);
        assert_eq!(child_count(&store, "formula_elements"), 2);

        let conn = store.conn.lock().unwrap();
        let margin: i64 = conn
            .query_row("SELECT margin FROM rolls", [], |row| row.get(0))
            .unwrap();
        assert_eq!(margin, -1);
    }

    #[test]
    fn test_same_timestamp_other_campaign_is_kept() {
        let (store, _dir) = create_test_store();
        store.insert_roll("camp", &sample_roll(3)).unwrap();
        store.insert_roll("other", &sample_roll(3)).unwrap();
        assert_eq!(store.roll_count("camp").unwrap(), 1);
        assert_eq!(store.roll_count("other").unwrap(), 1);
    }

    #[test]
    fn test_rolls_without_identity_are_appended() {
        let store = RollStore::open_in_memory().unwrap();
        let roll = RollSubmission::new().with_dice(DiceKind::Base, vec![1, 1]);
        store.insert_roll("camp", &roll).unwrap();
        store.insert_roll("camp", &roll).unwrap();
        assert_eq!(store.roll_count("camp").unwrap(), 2);
    }

    #[test]
    fn test_roll_without_base_dice_is_rejected() {
        let store = RollStore::open_in_memory().unwrap();
        let roll = RollSubmission::new()
            .with_text(TextField::Name, "Ana")
            .with_integer(IntegerField::Threshold, 8)
            .with_dice(DiceKind::Effect, vec![4]);

        let outcome = store.insert_roll("camp", &roll).unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Rejected {
                reason: RejectReason::NoBaseDice
            }
        );
        assert_eq!(store.roll_count("camp").unwrap(), 0);
        assert_eq!(child_count(&store, "dices"), 0);
    }

    #[test]
    fn test_empty_submission_is_rejected() {
        let store = RollStore::open_in_memory().unwrap();
        let outcome = store
            .insert_raw("camp", Vec::<(String, String)>::new())
            .unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Rejected {
                reason: RejectReason::Empty
            }
        );
    }

    #[test]
    fn test_insert_raw_reports_extra_fields() {
        let store = RollStore::open_in_memory().unwrap();
        let outcome = store
            .insert_raw(
                "camp",
                [
                    ("name", "Ana"),
                    ("base_dices", "2,2"),
                    ("labels", "a,b"),
                    ("colour", "blue"),
                ],
            )
            .unwrap();
        match outcome {
            InsertOutcome::Stored {
                ignored_fields,
                unknown_fields,
                ..
            } => {
                assert_eq!(ignored_fields, vec!["labels"]);
                assert_eq!(unknown_fields, vec!["colour"]);
            }
            other => panic!("expected stored roll, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_decoded_keeps_field_lists() {
        let store = RollStore::open_in_memory().unwrap();
        let decoded = decode_fields([
            ("name", "Bo"),
            ("base_dices", "1,6"),
            ("tooltips", "x"),
            ("mood", "grim"),
        ])
        .unwrap();

        let outcome = store.insert_decoded("camp", &decoded).unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Stored {
                roll_id: 1,
                replaced: false,
                ignored_fields: vec!["tooltips".to_string()],
                unknown_fields: vec!["mood".to_string()],
            }
        );
    }

    #[test]
    fn test_failed_insert_rolls_back() {
        let store = RollStore::open_in_memory().unwrap();
        store.insert_roll("camp", &sample_roll(3)).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute_batch("DROP TABLE invested_energies;").unwrap();
        }

        let err = store.insert_roll("camp", &sample_roll(5)).unwrap_err();
        assert!(matches!(err, crate::RollStatsError::DatabaseError(_)));

        // The delete of the earlier roll was rolled back with the failed insert.
        let conn = store.conn.lock().unwrap();
        let margin: i64 = conn
            .query_row("SELECT margin FROM rolls WHERE campaign = 'camp'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(margin, 3);
    }
}
