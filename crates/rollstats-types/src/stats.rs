//! Records returned by the aggregation queries and the CDF builder.

use serde::{Deserialize, Serialize};

/// Optional narrowing applied to every aggregation query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFilter {
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub test: Option<String>,
}

impl StatsFilter {
    pub fn player(name: impl Into<String>) -> Self {
        Self {
            player: Some(name.into()),
            test: None,
        }
    }

    pub fn test(label: impl Into<String>) -> Self {
        Self {
            player: None,
            test: Some(label.into()),
        }
    }

    /// Empty strings coming from query strings mean "no filter".
    pub fn normalized(self) -> Self {
        Self {
            player: self.player.filter(|p| !p.is_empty()),
            test: self.test.filter(|t| !t.is_empty()),
        }
    }
}

/// Success and failure percentages of one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuccessFailureRate {
    pub success_pct: f64,
    pub failure_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalCounts {
    pub successes: u32,
    pub failures: u32,
}

/// Longest runs of successes and failures ("nimdir index").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub success_streak: u32,
    pub failure_streak: u32,
}

/// Aggregate margins of one test label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStats {
    pub test: String,
    pub count: u32,
    /// `None` when none of the rolls recorded a margin.
    pub mean_margin: Option<f64>,
    /// Population standard deviation around `mean_margin`.
    pub margin_std_dev: Option<f64>,
}

/// Empirical cumulative distribution as a step function.
///
/// `bin_edges[i]` is the x position of knot `i`, `heights[i]` the cumulative
/// fraction reached at that knot. Both are empty when there is nothing to draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cdf {
    pub bin_edges: Vec<f64>,
    pub heights: Vec<f64>,
}

impl Cdf {
    pub fn is_empty(&self) -> bool {
        self.bin_edges.is_empty()
    }

    /// Final height of the curve, below 1.0 when samples were discarded.
    pub fn top(&self) -> f64 {
        self.heights.last().copied().unwrap_or(0.0)
    }
}
