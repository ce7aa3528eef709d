//! Empirical cumulative distributions of roll metrics.
//!
//! Non-finite samples stand for attempts that never resolved: they are dropped
//! from the curve but stay in the denominator, so the curve tops out below 1.0.
//! Curves of cohorts with different supports are made comparable by resampling
//! them at shared "shadow points".

use rollstats_types::Cdf;
use std::collections::BTreeMap;

/// Cohort name of the theoretical 2d6 distribution.
pub const REFERENCE_COHORT: &str = "Reference";

/// X positions used to compare 2d6 sums: the origin, then every possible sum.
pub const TWO_D6_SUPPORT: [f64; 12] = [0.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];

/// The 36 equally likely sums of two six-sided dice.
pub fn two_d6_reference() -> Vec<f64> {
    (1..=6)
        .flat_map(|a| (1..=6).map(move |b| (a + b) as f64))
        .collect()
}

/// Build the step function of `samples`.
///
/// The first knot is always the (0, 0) origin, even when samples are negative.
pub fn cdf(samples: &[f64]) -> Cdf {
    let total = samples.len();
    let mut finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Cdf::default();
    }
    finite.sort_by(|a, b| a.total_cmp(b));

    let resolved = finite.len() as f64;
    let scale = resolved / total as f64;

    let mut bin_edges = vec![0.0];
    let mut heights = vec![0.0];
    let mut cumulative = 0u32;
    for (value, count) in tabulate(&finite) {
        cumulative += count;
        bin_edges.push(value);
        heights.push(cumulative as f64 / resolved * scale);
    }

    Cdf { bin_edges, heights }
}

/// Build the step function of `samples` and resample it at `shadow_points`.
pub fn cdf_aligned(samples: &[f64], shadow_points: &[f64]) -> Cdf {
    align(&cdf(samples), shadow_points)
}

/// Resample a step function at ascending reference positions.
///
/// Each output point carries the height of the last knot at or before its
/// position, or 0 before the first knot. An empty curve stays empty.
///
/// The (0, 0) origin is skipped: it is not ordered with the data knots when
/// samples are negative, and its height equals the value before any knot.
pub fn align(raw: &Cdf, shadow_points: &[f64]) -> Cdf {
    if raw.is_empty() {
        return Cdf::default();
    }

    let edges = &raw.bin_edges[1..];
    let mut bin_edges = Vec::with_capacity(shadow_points.len());
    let mut heights = Vec::with_capacity(shadow_points.len());
    let mut knot = 0;
    let mut height = 0.0;
    for &x in shadow_points {
        while knot < edges.len() && edges[knot] <= x {
            height = raw.heights[knot + 1];
            knot += 1;
        }
        bin_edges.push(x);
        heights.push(height);
    }

    Cdf { bin_edges, heights }
}

/// Run-length (value, count) pairs of an ascending slice.
fn tabulate(sorted: &[f64]) -> Vec<(f64, u32)> {
    let mut runs: Vec<(f64, u32)> = Vec::new();
    for &value in sorted {
        match runs.last_mut() {
            Some((last, count)) if *last == value => *count += 1,
            _ => runs.push((value, 1)),
        }
    }
    runs
}

/// Per-player 2d6 sum curves on the shared 2d6 axis, plus the theoretical
/// reference cohort.
pub fn dice_sum_distributions(sums_by_player: &BTreeMap<String, Vec<i64>>) -> BTreeMap<String, Cdf> {
    let mut curves: BTreeMap<String, Cdf> = sums_by_player
        .iter()
        .map(|(player, sums)| {
            let samples: Vec<f64> = sums.iter().map(|&s| s as f64).collect();
            (player.clone(), cdf_aligned(&samples, &TWO_D6_SUPPORT))
        })
        .collect();
    curves.insert(
        REFERENCE_COHORT.to_string(),
        cdf_aligned(&two_d6_reference(), &TWO_D6_SUPPORT),
    );
    curves
}

/// Curves of every cohort resampled at the union of all cohorts' values.
pub fn aligned_distributions(samples_by_player: &BTreeMap<String, Vec<f64>>) -> BTreeMap<String, Cdf> {
    let shadow_points = shared_support(samples_by_player.values().flatten().copied());
    samples_by_player
        .iter()
        .map(|(player, samples)| (player.clone(), cdf_aligned(samples, &shadow_points)))
        .collect()
}

/// Integer samples with missing values turned into unresolved samples.
pub fn unresolved_as_infinite(values: &BTreeMap<String, Vec<Option<i64>>>) -> BTreeMap<String, Vec<f64>> {
    values
        .iter()
        .map(|(player, values)| {
            let samples = values
                .iter()
                .map(|v| v.map(|v| v as f64).unwrap_or(f64::INFINITY))
                .collect();
            (player.clone(), samples)
        })
        .collect()
}

/// Sorted distinct finite values plus the origin.
fn shared_support(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut support: Vec<f64> = values
        .filter(|v| v.is_finite())
        .chain(std::iter::once(0.0))
        .collect();
    support.sort_by(|a, b| a.total_cmp(b));
    support.dedup_by(|a, b| a.total_cmp(b).is_eq());
    support
}
