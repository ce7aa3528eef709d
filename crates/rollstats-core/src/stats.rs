//! Read-side aggregation queries over the roll log.
//!
//! Every query is scoped to one campaign and an optional [`StatsFilter`]. All
//! per-player statistics only look at qualifying rolls (`threshold > 0`).

use crate::streak::longest_streaks;
use crate::{Result, RollStore};
use rollstats_types::{
    CriticalCounts, DiceKind, StatsFilter, StreakRecord, SuccessFailureRate, TestStats,
};
use rusqlite::{params, params_from_iter};
use std::collections::BTreeMap;

/// Success predicate shared by the rate and streak queries.
const SUCCESS_SQL: &str =
    "((COALESCE(r.margin, 0) > 0 OR r.critical_success) AND NOT r.critical_failure)";

/// WHERE clause over `rolls r` and its positional parameters.
struct RollScope {
    clause: String,
    params: Vec<String>,
}

impl RollScope {
    fn new(campaign: &str, filter: &StatsFilter) -> Self {
        let mut scope = Self {
            clause: "r.campaign = ?".to_string(),
            params: vec![campaign.to_string()],
        };
        if let Some(player) = &filter.player {
            scope.clause.push_str(" AND r.name = ?");
            scope.params.push(player.clone());
        }
        if let Some(test) = &filter.test {
            scope.clause.push_str(" AND r.reason = ?");
            scope.params.push(test.clone());
        }
        scope
    }

    /// Only rolls that are tests.
    fn qualifying(mut self) -> Self {
        self.clause.push_str(" AND r.threshold > 0");
        self
    }

    fn named(mut self) -> Self {
        self.clause.push_str(" AND r.name IS NOT NULL");
        self
    }
}

impl RollStore {
    /// Sorted names of every character with a roll in the campaign.
    pub fn players(&self, campaign: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT name FROM rolls WHERE campaign = ?1 AND name IS NOT NULL ORDER BY name",
        )?;
        let players = stmt
            .query_map(params![campaign], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(players)
    }

    /// Number of qualifying rolls per player.
    pub fn count_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, u32>> {
        let scope = RollScope::new(campaign, filter).qualifying().named();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT r.name, COUNT(*) FROM rolls r WHERE {} GROUP BY r.name",
            scope.clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(scope.params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Success and failure percentages per player.
    pub fn success_failure_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, SuccessFailureRate>> {
        let scope = RollScope::new(campaign, filter).qualifying().named();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT r.name, COUNT(CASE WHEN {SUCCESS_SQL} THEN 1 END), COUNT(*) \
             FROM rolls r WHERE {} GROUP BY r.name",
            scope.clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(scope.params.iter()), |row| {
                let successes = row.get::<_, i64>(1)? as f64;
                let total = row.get::<_, i64>(2)? as f64;
                Ok((
                    row.get::<_, String>(0)?,
                    SuccessFailureRate {
                        success_pct: successes / total * 100.0,
                        failure_pct: (total - successes) / total * 100.0,
                    },
                ))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Critical success and failure counts per player.
    pub fn critical_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, CriticalCounts>> {
        let scope = RollScope::new(campaign, filter).qualifying().named();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT r.name, \
                COUNT(CASE WHEN r.critical_success THEN 1 END), \
                COUNT(CASE WHEN r.critical_failure THEN 1 END) \
             FROM rolls r WHERE {} GROUP BY r.name",
            scope.clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(scope.params.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    CriticalCounts {
                        successes: row.get::<_, i64>(1)? as u32,
                        failures: row.get::<_, i64>(2)? as u32,
                    },
                ))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Longest success and failure runs per player, in insertion order.
    pub fn streaks_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, StreakRecord>> {
        let scope = RollScope::new(campaign, filter).qualifying().named();
        let outcomes = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(&format!(
                "SELECT r.name, {SUCCESS_SQL} FROM rolls r WHERE {} ORDER BY r.id ASC",
                scope.clause
            ))?;
            stmt.query_map(params_from_iter(scope.params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(longest_streaks(outcomes))
    }

    /// Thresholds of every qualifying roll, per player.
    pub fn thresholds_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, Vec<i64>>> {
        self.column_by_player(campaign, filter, "threshold")
            .map(|rows| {
                rows.into_iter()
                    .map(|(name, values)| (name, values.into_iter().flatten().collect()))
                    .collect()
            })
    }

    /// Margins of every qualifying roll, per player. A roll may lack a margin.
    pub fn margins_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, Vec<Option<i64>>>> {
        self.column_by_player(campaign, filter, "margin")
    }

    fn column_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
        column: &str,
    ) -> Result<BTreeMap<String, Vec<Option<i64>>>> {
        let scope = RollScope::new(campaign, filter).qualifying().named();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT r.name, r.\"{column}\" FROM rolls r WHERE {} ORDER BY r.name ASC, r.id ASC",
            scope.clause
        ))?;
        let mut rows = stmt.query(params_from_iter(scope.params.iter()))?;

        let mut values: BTreeMap<String, Vec<Option<i64>>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            values
                .entry(row.get(0)?)
                .or_default()
                .push(row.get(1)?);
        }
        Ok(values)
    }

    /// Sums of the two base dice of every qualifying 2d6 roll, per player.
    ///
    /// Rolls with any other pool shape are not part of the population.
    pub fn base_dice_sums_by_player(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, Vec<i64>>> {
        let mut scope = RollScope::new(campaign, filter).qualifying().named();
        scope.clause.push_str(" AND d.\"type\" = ?");
        scope.params.push(DiceKind::Base.field_name().to_string());

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT r.name, SUM(d.dice) FROM dices d JOIN rolls r ON d.roll = r.id \
             WHERE {} AND r.\"type\" = 6 AND r.\"number\" = 2 \
             GROUP BY d.roll ORDER BY d.roll ASC",
            scope.clause
        ))?;
        let mut rows = stmt.query(params_from_iter(scope.params.iter()))?;

        let mut sums: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            sums.entry(row.get(0)?).or_default().push(row.get(1)?);
        }
        Ok(sums)
    }

    /// How often each formula element was used.
    pub fn formula_usage(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, u32>> {
        let scope = RollScope::new(campaign, filter);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT f.element, COUNT(*) FROM formula_elements f JOIN rolls r ON f.roll = r.id \
             WHERE {} GROUP BY f.element",
            scope.clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(scope.params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// How often each energy was invested, scoped variants merged
    /// ("optional-power" and "talent-power" both count as "power").
    pub fn energy_usage(
        &self,
        campaign: &str,
        filter: &StatsFilter,
    ) -> Result<BTreeMap<String, u32>> {
        let scope = RollScope::new(campaign, filter);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT e.energy, COUNT(*) FROM invested_energies e JOIN rolls r ON e.roll = r.id \
             WHERE {} GROUP BY e.energy",
            scope.clause
        ))?;
        let mut rows = stmt.query(params_from_iter(scope.params.iter()))?;

        let mut usage: BTreeMap<String, u32> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let energy: String = row.get(0)?;
            let count = row.get::<_, i64>(1)? as u32;
            *usage.entry(base_energy(&energy).to_string()).or_default() += count;
        }
        Ok(usage)
    }

    /// Count, mean margin and margin standard deviation of every test label,
    /// most frequent first.
    pub fn stats_by_test(&self, campaign: &str, filter: &StatsFilter) -> Result<Vec<TestStats>> {
        let scope = RollScope::new(campaign, filter).qualifying();
        let mut margins: BTreeMap<String, Vec<Option<i64>>> = BTreeMap::new();
        {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(&format!(
                "SELECT r.reason, r.margin FROM rolls r \
                 WHERE {} AND r.reason IS NOT NULL ORDER BY r.id ASC",
                scope.clause
            ))?;
            let mut rows = stmt.query(params_from_iter(scope.params.iter()))?;
            while let Some(row) = rows.next()? {
                margins.entry(row.get(0)?).or_default().push(row.get(1)?);
            }
        }

        let mut stats: Vec<TestStats> = margins
            .into_iter()
            .map(|(test, values)| {
                let count = values.len() as u32;
                let present: Vec<f64> = values.into_iter().flatten().map(|m| m as f64).collect();
                let (mean_margin, margin_std_dev) = match mean_and_std_dev(&present) {
                    Some((mean, std_dev)) => (Some(mean), Some(std_dev)),
                    None => (None, None),
                };
                TestStats {
                    test,
                    count,
                    mean_margin,
                    margin_std_dev,
                }
            })
            .collect();
        // Stable: equal counts keep label order.
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(stats)
    }
}

/// Resource part of a "scope-resource" energy label.
fn base_energy(energy: &str) -> &str {
    energy.rsplit('-').next().unwrap_or(energy)
}

/// Mean and population standard deviation, in two passes.
fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollstats_types::{BooleanField, IntegerField, RollSubmission, TextField};

    const CAMPAIGN: &str = "camp";

    /// Store a qualifying roll and return its builder inputs for chaining.
    fn roll(name: &str, timestamp: &str, threshold: i64, margin: i64) -> RollSubmission {
        RollSubmission::new()
            .with_text(TextField::Name, name)
            .with_text(TextField::Timestamp, timestamp)
            .with_integer(IntegerField::Threshold, threshold)
            .with_integer(IntegerField::Margin, margin)
            .with_dice(DiceKind::Base, vec![3, 4])
    }

    fn store_with(rolls: &[RollSubmission]) -> RollStore {
        let store = RollStore::open_in_memory().unwrap();
        for r in rolls {
            assert!(store.insert_roll(CAMPAIGN, r).unwrap().is_stored());
        }
        store
    }

    fn all() -> StatsFilter {
        StatsFilter::default()
    }

    #[test]
    fn test_players_include_non_testers() {
        let store = store_with(&[roll("Zed", "1", 8, 1), roll("Ana", "2", 0, 0)]);
        assert_eq!(store.players(CAMPAIGN).unwrap(), vec!["Ana", "Zed"]);
        assert!(store.players("elsewhere").unwrap().is_empty());
    }

    #[test]
    fn test_non_tests_are_never_counted() {
        let store = store_with(&[
            roll("Ana", "1", 8, 2),
            roll("Ana", "2", 0, 5).with_flag(BooleanField::CriticalSuccess, true),
            roll("Ana", "3", -1, -5).with_text(TextField::Reason, "Stealth"),
            roll("Bo", "4", 0, 1).with_text(TextField::Reason, "Stealth"),
        ]);

        assert_eq!(store.count_by_player(CAMPAIGN, &all()).unwrap()["Ana"], 1);
        assert!(!store.count_by_player(CAMPAIGN, &all()).unwrap().contains_key("Bo"));
        assert!(!store.success_failure_by_player(CAMPAIGN, &all()).unwrap().contains_key("Bo"));
        assert_eq!(
            store.critical_by_player(CAMPAIGN, &all()).unwrap()["Ana"],
            CriticalCounts::default()
        );
        assert_eq!(store.streaks_by_player(CAMPAIGN, &all()).unwrap()["Ana"].success_streak, 1);
        assert_eq!(store.thresholds_by_player(CAMPAIGN, &all()).unwrap()["Ana"], vec![8]);
        assert_eq!(store.margins_by_player(CAMPAIGN, &all()).unwrap()["Ana"], vec![Some(2)]);
        assert!(store.stats_by_test(CAMPAIGN, &all()).unwrap().is_empty());
    }

    #[test]
    fn test_success_failure_rates_sum_to_hundred() {
        let store = store_with(&[
            roll("Ana", "1", 8, 2),
            roll("Ana", "2", 8, -1),
            roll("Ana", "3", 8, 0).with_flag(BooleanField::CriticalSuccess, true),
            roll("Ana", "4", 8, 3).with_flag(BooleanField::CriticalFailure, true),
        ]);

        let rate = store.success_failure_by_player(CAMPAIGN, &all()).unwrap()["Ana"];
        assert!((rate.success_pct - 50.0).abs() < 1e-9);
        assert!((rate.failure_pct - 50.0).abs() < 1e-9);
        assert!((rate.success_pct + rate.failure_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_critical_counts() {
        let store = store_with(&[
            roll("Ana", "1", 8, 2).with_flag(BooleanField::CriticalSuccess, true),
            roll("Ana", "2", 8, -4).with_flag(BooleanField::CriticalFailure, true),
            roll("Ana", "3", 8, -4).with_flag(BooleanField::CriticalFailure, true),
        ]);
        assert_eq!(
            store.critical_by_player(CAMPAIGN, &all()).unwrap()["Ana"],
            CriticalCounts {
                successes: 1,
                failures: 2
            }
        );
    }

    #[test]
    fn test_streaks_follow_insertion_order_not_timestamp() {
        // Timestamps sort the other way round from insertion.
        let margins = [1, 1, -1, 1, 1, 1, -1];
        let rolls: Vec<_> = margins
            .iter()
            .enumerate()
            .map(|(i, m)| roll("Ana", &format!("{}", 9 - i), 8, *m))
            .collect();
        let store = store_with(&rolls);

        assert_eq!(
            store.streaks_by_player(CAMPAIGN, &all()).unwrap()["Ana"],
            StreakRecord {
                success_streak: 3,
                failure_streak: 1
            }
        );
    }

    #[test]
    fn test_resubmission_leaves_single_margin() {
        let store = store_with(&[roll("Ana", "t", 8, 2), roll("Ana", "t", 8, -3)]);
        assert_eq!(
            store.margins_by_player(CAMPAIGN, &all()).unwrap()["Ana"],
            vec![Some(-3)]
        );
    }

    #[test]
    fn test_filters() {
        let store = store_with(&[
            roll("Ana", "1", 8, 2).with_text(TextField::Reason, "Stealth"),
            roll("Ana", "2", 8, -2).with_text(TextField::Reason, "Climb"),
            roll("Bo", "3", 9, 1).with_text(TextField::Reason, "Stealth"),
        ]);

        let by_player = store
            .count_by_player(CAMPAIGN, &StatsFilter::player("Ana"))
            .unwrap();
        assert_eq!(by_player.len(), 1);
        assert_eq!(by_player["Ana"], 2);

        let by_test = store
            .count_by_player(CAMPAIGN, &StatsFilter::test("Stealth"))
            .unwrap();
        assert_eq!(by_test["Ana"], 1);
        assert_eq!(by_test["Bo"], 1);
    }

    #[test]
    fn test_base_dice_sums_only_for_two_d6() {
        let store = store_with(&[
            roll("Ana", "1", 8, 1)
                .with_integer(IntegerField::Number, 2)
                .with_integer(IntegerField::Type, 6)
                .with_dice(DiceKind::Base, vec![6, 5]),
            roll("Ana", "2", 8, 1)
                .with_integer(IntegerField::Number, 3)
                .with_integer(IntegerField::Type, 6)
                .with_dice(DiceKind::Base, vec![1, 2, 3]),
            roll("Ana", "3", 8, 1)
                .with_integer(IntegerField::Number, 2)
                .with_integer(IntegerField::Type, 6)
                .with_dice(DiceKind::Base, vec![1, 1])
                .with_dice(DiceKind::Effect, vec![6]),
            roll("Ana", "4", 0, 1)
                .with_integer(IntegerField::Number, 2)
                .with_integer(IntegerField::Type, 6),
        ]);

        assert_eq!(
            store.base_dice_sums_by_player(CAMPAIGN, &all()).unwrap()["Ana"],
            vec![11, 2]
        );
    }

    #[test]
    fn test_base_dice_sums_follow_declared_pool() {
        let store = store_with(&[
            roll("Ana", "1", 8, 1),
            roll("Ana", "2", 8, 1)
                .with_integer(IntegerField::Number, 2)
                .with_integer(IntegerField::Type, 6)
                .with_dice(DiceKind::Base, vec![1, 2, 3]),
            roll("Ana", "3", 8, 1)
                .with_integer(IntegerField::Number, 2)
                .with_integer(IntegerField::Type, 8),
        ]);

        assert_eq!(
            store.base_dice_sums_by_player(CAMPAIGN, &all()).unwrap()["Ana"],
            vec![6]
        );
    }

    #[test]
    fn test_usage_counts() {
        let store = store_with(&[
            roll("Ana", "1", 8, 1)
                .with_formula(&["strength", "athletics"])
                .with_energies(&["optional-power", "talent-power"]),
            roll("Bo", "2", 0, 1)
                .with_formula(&["strength"])
                .with_energies(&["speed"]),
        ]);

        let formula = store.formula_usage(CAMPAIGN, &all()).unwrap();
        assert_eq!(formula["strength"], 2);
        assert_eq!(formula["athletics"], 1);

        let energy = store.energy_usage(CAMPAIGN, &all()).unwrap();
        assert_eq!(energy["power"], 2);
        assert_eq!(energy["speed"], 1);
        assert_eq!(energy.len(), 2);

        let energy = store.energy_usage(CAMPAIGN, &StatsFilter::player("Bo")).unwrap();
        assert_eq!(energy.keys().collect::<Vec<_>>(), vec!["speed"]);
    }

    #[test]
    fn test_stats_by_test() {
        let store = store_with(&[
            roll("Ana", "1", 8, 2).with_text(TextField::Reason, "Stealth"),
            roll("Ana", "2", 8, 4).with_text(TextField::Reason, "Stealth"),
            roll("Bo", "3", 8, 6).with_text(TextField::Reason, "Stealth"),
            roll("Bo", "4", 8, -1).with_text(TextField::Reason, "Climb"),
            roll("Bo", "5", 8, 1),
        ]);

        let stats = store.stats_by_test(CAMPAIGN, &all()).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].test, "Stealth");
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[0].mean_margin, Some(4.0));
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((stats[0].margin_std_dev.unwrap() - expected).abs() < 1e-12);
        assert_eq!(stats[1].test, "Climb");
        assert_eq!(stats[1].margin_std_dev, Some(0.0));
    }

    #[test]
    fn test_stats_by_test_without_margins() {
        let store = RollStore::open_in_memory().unwrap();
        store
            .insert_raw(
                CAMPAIGN,
                [
                    ("name", "Ana"),
                    ("threshold", "7"),
                    ("margin", "NaN"),
                    ("reason", "Luck"),
                    ("base_dices", "1,6"),
                ],
            )
            .unwrap();
        let stats = store.stats_by_test(CAMPAIGN, &all()).unwrap();
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].mean_margin, None);
        assert_eq!(stats[0].margin_std_dev, None);
    }

    #[test]
    fn test_empty_campaign_gives_empty_results() {
        let store = RollStore::open_in_memory().unwrap();
        assert!(store.count_by_player(CAMPAIGN, &all()).unwrap().is_empty());
        assert!(store.streaks_by_player(CAMPAIGN, &all()).unwrap().is_empty());
        assert!(store.base_dice_sums_by_player(CAMPAIGN, &all()).unwrap().is_empty());
        assert!(store.energy_usage(CAMPAIGN, &all()).unwrap().is_empty());
    }

    #[test]
    fn test_base_energy() {
        assert_eq!(base_energy("optional-power"), "power");
        assert_eq!(base_energy("a-b-speed"), "speed");
        assert_eq!(base_energy("speed"), "speed");
    }
}
