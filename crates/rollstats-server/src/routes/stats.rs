//! Campaign statistics.

use super::error_response;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rollstats_core::distribution::{aligned_distributions, dice_sum_distributions, unresolved_as_infinite};
use rollstats_core::RollStore;
use rollstats_types::{Cdf, CriticalCounts, StatsFilter, StreakRecord, SuccessFailureRate, TestStats};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub async fn players(
    State(state): State<Arc<AppState>>,
    Path(campaign): Path<String>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let players = state.store.players(&campaign).map_err(error_response)?;
    Ok(Json(players))
}

/// Everything the statistics page shows for one campaign and filter.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub campaign: String,
    pub filter: StatsFilter,
    pub players: Vec<String>,
    pub roll_count: BTreeMap<String, u32>,
    pub success_failure: BTreeMap<String, SuccessFailureRate>,
    pub critical: BTreeMap<String, CriticalCounts>,
    pub streaks: BTreeMap<String, StreakRecord>,
    pub formula_usage: BTreeMap<String, u32>,
    pub energy_usage: BTreeMap<String, u32>,
    pub tests: Vec<TestStats>,
}

impl StatsReport {
    pub fn build(store: &RollStore, campaign: &str, filter: StatsFilter) -> rollstats_core::Result<Self> {
        Ok(Self {
            campaign: campaign.to_string(),
            players: store.players(campaign)?,
            roll_count: store.count_by_player(campaign, &filter)?,
            success_failure: store.success_failure_by_player(campaign, &filter)?,
            critical: store.critical_by_player(campaign, &filter)?,
            streaks: store.streaks_by_player(campaign, &filter)?,
            formula_usage: store.formula_usage(campaign, &filter)?,
            energy_usage: store.energy_usage(campaign, &filter)?,
            tests: store.stats_by_test(campaign, &filter)?,
            filter,
        })
    }
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Path(campaign): Path<String>,
    Query(filter): Query<StatsFilter>,
) -> Result<Json<StatsReport>, (StatusCode, String)> {
    let filter = filter.normalized();
    debug!(target: "rollstats::api", "Stats for {} ({:?})", campaign, filter);
    let report = StatsReport::build(&state.store, &campaign, filter).map_err(error_response)?;
    Ok(Json(report))
}

/// Per-player curves, each family on its own shared axis.
#[derive(Debug, Serialize)]
pub struct DistributionReport {
    /// 2d6 base dice sums, plus the theoretical "Reference" cohort.
    pub base_dice: BTreeMap<String, Cdf>,
    /// Rolls without a margin lower the top of their player's curve.
    pub margins: BTreeMap<String, Cdf>,
    pub thresholds: BTreeMap<String, Cdf>,
}

impl DistributionReport {
    pub fn build(store: &RollStore, campaign: &str, filter: &StatsFilter) -> rollstats_core::Result<Self> {
        let sums = store.base_dice_sums_by_player(campaign, filter)?;
        let margins = store.margins_by_player(campaign, filter)?;
        let thresholds: BTreeMap<String, Vec<f64>> = store
            .thresholds_by_player(campaign, filter)?
            .into_iter()
            .map(|(player, values)| (player, values.into_iter().map(|v| v as f64).collect()))
            .collect();

        Ok(Self {
            base_dice: dice_sum_distributions(&sums),
            margins: aligned_distributions(&unresolved_as_infinite(&margins)),
            thresholds: aligned_distributions(&thresholds),
        })
    }
}

pub async fn distributions(
    State(state): State<Arc<AppState>>,
    Path(campaign): Path<String>,
    Query(filter): Query<StatsFilter>,
) -> Result<Json<DistributionReport>, (StatusCode, String)> {
    let filter = filter.normalized();
    let report = DistributionReport::build(&state.store, &campaign, &filter).map_err(error_response)?;
    Ok(Json(report))
}
