//! Phase timing policy
//!
//! Pure functions of the lane counts sampled when a phase is planned. A lane
//! whose count is missing is timed as an empty lane.

use crate::{GreenTiers, SchedulerConfig};
use lane_counter::{LaneId, LANE_COUNT};
use std::collections::BTreeMap;

/// Green time for a lane holding `count` vehicles
pub fn green_duration(count: u32, tiers: &GreenTiers) -> u32 {
    if count < tiers.medium_threshold {
        tiers.short_secs
    } else if count < tiers.long_threshold {
        tiers.medium_secs
    } else {
        tiers.long_secs
    }
}

fn count_for(counts: &BTreeMap<LaneId, u32>, lane: LaneId) -> u32 {
    counts.get(&lane).copied().unwrap_or(0)
}

/// Green plus yellow for one lane's turn
fn turn_secs(counts: &BTreeMap<LaneId, u32>, lane: LaneId, config: &SchedulerConfig) -> u32 {
    green_duration(count_for(counts, lane), &config.tiers) + config.yellow_secs
}

/// Red countdowns for every lane except `excluded`.
///
/// Walks the rotation from `root`, the lane about to go green next, up to and
/// including each waiting lane, summing green plus yellow for every lane
/// walked. Lanes other than `root` also get the additional red clearance.
pub fn cascading_red_times(
    root: LaneId,
    excluded: LaneId,
    counts: &BTreeMap<LaneId, u32>,
    config: &SchedulerConfig,
) -> BTreeMap<LaneId, u32> {
    LaneId::ALL
        .into_iter()
        .filter(|lane| *lane != excluded)
        .map(|lane| {
            let walked = root.distance_to(lane) + 1;
            let mut wait: u32 = root
                .rotation()
                .take(walked)
                .map(|l| turn_secs(counts, l, config))
                .sum();
            if lane != root {
                wait += config.additional_red_secs;
            }
            (lane, wait)
        })
        .collect()
}

/// Red time for a lane that just finished its yellow: one turn for each of
/// the other three lanes, plus the additional red clearance.
pub fn next_red_time(
    finished: LaneId,
    counts: &BTreeMap<LaneId, u32>,
    config: &SchedulerConfig,
) -> u32 {
    let others: u32 = finished
        .next()
        .rotation()
        .take(LANE_COUNT - 1)
        .map(|l| turn_secs(counts, l, config))
        .sum();
    others + config.additional_red_secs
}
