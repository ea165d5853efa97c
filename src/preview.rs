//! Cheap estimation of the solvability of a problem, without running the solver.
//!
//! The results are advisory only: `feasible` is a necessary condition (enough places in total),
//! not a sufficient one, and a "popular" activity is a likely bottleneck but no proof of
//! infeasibility, since the demand counts choices of all ranks.

use crate::{Catalog, Config, Participant};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Activities chosen by fewer participants are reported as underbooked
pub const UNDERBOOKED_THRESHOLD: usize = 3;

/// Utilization (in percent) above which a warning is issued
const HIGH_UTILIZATION: f64 = 90.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PopularActivity {
    pub name: String,
    pub demand: usize,
    pub capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnderbookedActivity {
    pub name: String,
    pub demand: usize,
}

/// Result of the feasibility preview
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Preview {
    pub num_participants: usize,
    pub num_days: usize,
    pub num_activities: usize,
    /// Number of places needed (participants × days)
    pub total_slots: usize,
    /// Number of places offered per day by all activities
    pub capacity_per_day: usize,
    pub total_capacity: usize,
    /// Necessary condition for solvability: total_slots <= total_capacity
    pub feasible: bool,
    /// Percentage of the total capacity needed
    pub utilization: f64,
    /// Number of participants choosing each activity (at any rank)
    pub demand: BTreeMap<String, usize>,
    /// Activities chosen by more participants than fit into them on one day
    pub popular: Vec<PopularActivity>,
    pub underbooked: Vec<UnderbookedActivity>,
    pub warnings: Vec<String>,
}

/// Estimate the solvability of the problem. Never fails: invalid configuration values are replaced
/// by defaults (0 days -> default number of days, capacity 0 -> unlimited).
pub fn preview(participants: &[Participant], catalog: &Catalog, config: &Config) -> Preview {
    let num_days = match config.num_days {
        0 => Config::default().num_days as usize,
        d => d as usize,
    };
    let max_participants = config.max_participants.filter(|m| *m > 0).map(|m| m as usize);
    let num_participants = participants.len();

    let total_slots = num_participants * num_days;
    // Without a limit, each activity can take every participant
    let per_activity = max_participants.unwrap_or(num_participants);
    let capacity_per_day = catalog.len() * per_activity;
    let total_capacity = capacity_per_day * num_days;
    let utilization = if total_capacity == 0 {
        if total_slots == 0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        total_slots as f64 * 100.0 / total_capacity as f64
    };

    let mut demand: BTreeMap<String, usize> =
        catalog.names().iter().map(|n| (n.clone(), 0)).collect();
    for participant in participants {
        let chosen: BTreeSet<&str> = participant.ranked_choices().map(|(_, c)| c).collect();
        for activity in chosen {
            *demand.entry(activity.to_owned()).or_insert(0) += 1;
        }
    }

    let mut popular = Vec::new();
    let mut underbooked = Vec::new();
    for (name, d) in demand.iter() {
        if let Some(max) = max_participants {
            if *d > max {
                popular.push(PopularActivity {
                    name: name.clone(),
                    demand: *d,
                    capacity: max,
                });
            }
        }
        if *d < UNDERBOOKED_THRESHOLD {
            underbooked.push(UnderbookedActivity {
                name: name.clone(),
                demand: *d,
            });
        }
    }

    let mut warnings = Vec::new();
    if total_slots > total_capacity {
        warnings.push(format!(
            "Not enough capacity: {} places needed, but only {} available",
            total_slots, total_capacity
        ));
    } else if utilization > HIGH_UTILIZATION {
        warnings.push(format!(
            "Very high utilization ({:.0}%), possibly not all choices can be fulfilled",
            utilization
        ));
    }
    if num_days > catalog.len() {
        warnings.push(format!(
            "{} days need {} different workshops per participant, but there are only {}",
            num_days,
            num_days,
            catalog.len()
        ));
    }

    Preview {
        num_participants,
        num_days,
        num_activities: catalog.len(),
        total_slots,
        capacity_per_day,
        total_capacity,
        feasible: total_slots <= total_capacity,
        utilization,
        demand,
        popular,
        underbooked,
        warnings,
    }
}
