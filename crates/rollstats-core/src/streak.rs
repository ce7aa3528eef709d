//! Longest success/failure runs per player ("nimdir index").

use rollstats_types::StreakRecord;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy)]
struct Run {
    success: bool,
    len: u32,
}

/// Scan state: the open run of every player plus the longest closed runs.
#[derive(Debug, Default)]
pub struct StreakScan {
    open: HashMap<String, Run>,
    best: BTreeMap<String, StreakRecord>,
}

impl StreakScan {
    /// Feed the next outcome of `player`, in insertion order.
    pub fn step(mut self, (player, success): (String, bool)) -> Self {
        let run = self.open.get(&player).copied().unwrap_or(Run {
            success: true,
            len: 0,
        });

        let next = if run.success == success {
            Run {
                success,
                len: run.len + 1,
            }
        } else {
            record(&mut self.best, &player, run);
            Run { success, len: 1 }
        };
        self.open.insert(player, next);
        self
    }

    /// Close every open run and return the records sorted by player.
    pub fn finish(mut self) -> BTreeMap<String, StreakRecord> {
        for (player, run) in std::mem::take(&mut self.open) {
            record(&mut self.best, &player, run);
        }
        self.best
    }
}

fn record(best: &mut BTreeMap<String, StreakRecord>, player: &str, run: Run) {
    let entry = best.entry(player.to_string()).or_default();
    let slot = if run.success {
        &mut entry.success_streak
    } else {
        &mut entry.failure_streak
    };
    *slot = (*slot).max(run.len);
}

/// Longest consecutive success and failure runs of each player.
pub fn longest_streaks<I>(outcomes: I) -> BTreeMap<String, StreakRecord>
where
    I: IntoIterator<Item = (String, bool)>,
{
    outcomes
        .into_iter()
        .fold(StreakScan::default(), StreakScan::step)
        .finish()
}
