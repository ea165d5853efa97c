pub mod simple;

use super::preview::Preview;
use super::statistics::Statistics;
use super::{Assignment, Participant};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Format the calculated workshop assignment into a human readable String (e.g. to print it to
/// stdout).
///
/// The output format will look like
/// ```text
/// ===== Workshop name =====
/// --- Day 1 ---
/// Anton Administrator
/// Bertalotta Beispiel
/// --- Day 2 ---
///
/// ===== Another workshop name =====
/// …
/// ```
pub fn format_assignment(
    assignment: &Assignment,
    participants: &[Participant],
    num_days: usize,
) -> String {
    let activities: BTreeSet<&str> = assignment
        .values()
        .flat_map(|a| a.iter().map(|x| x.as_str()))
        .collect();

    let mut result = String::new();
    for activity in activities {
        write!(result, "\n===== {} =====\n", activity).unwrap();
        for day in 0..num_days {
            write!(result, "--- Day {} ---\n", day + 1).unwrap();
            for p in participants.iter() {
                let attends = assignment
                    .get(&p.id)
                    .and_then(|a| a.get(day))
                    .map_or(false, |a| a == activity);
                if attends {
                    write!(result, "{}\n", p.name).unwrap();
                }
            }
        }
    }
    result
}

/// Format the statistics of an assignment as a short human readable summary
pub fn format_statistics(statistics: &Statistics) -> String {
    let mut result = String::new();
    for (metric, value) in statistics.metric_rows() {
        write!(result, "{:<24}{}\n", format!("{}:", metric), value).unwrap();
    }
    result
}

/// Format the result of the feasibility preview into a human readable String
pub fn format_preview(preview: &Preview) -> String {
    let mut result = String::new();
    write!(
        result,
        "{} participants, {} workshops, {} days\n",
        preview.num_participants, preview.num_activities, preview.num_days
    )
    .unwrap();
    write!(
        result,
        "Places needed: {}, available: {} ({} per day), utilization {:.1}%\n",
        preview.total_slots, preview.total_capacity, preview.capacity_per_day, preview.utilization
    )
    .unwrap();
    write!(
        result,
        "Feasible: {}\n",
        if preview.feasible { "yes" } else { "no" }
    )
    .unwrap();
    for a in preview.popular.iter() {
        write!(
            result,
            "Popular: {} (chosen by {}, {} places per day)\n",
            a.name, a.demand, a.capacity
        )
        .unwrap();
    }
    for a in preview.underbooked.iter() {
        write!(result, "Underbooked: {} (chosen by {})\n", a.name, a.demand).unwrap();
    }
    for w in preview.warnings.iter() {
        write!(result, "Warning: {}\n", w).unwrap();
    }
    result
}
