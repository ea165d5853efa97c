//! Evaluation of an assignment: fulfilled choices per rank, occupancy of each activity per day and
//! a quality classification of the overall result.

use crate::{Assignment, Participant, MAX_CHOICES};
use serde::Serialize;
use std::collections::BTreeMap;

/// Participants attending one activity on one day
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Occupancy {
    pub activity: String,
    /// Day number (1-based)
    pub day: usize,
    pub count: usize,
    pub names: Vec<String>,
}

/// Summary of an assignment
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_participants: usize,
    pub num_days: usize,
    /// Number of (participant, day) entries in the assignment
    pub total_slots: usize,
    /// Number of entries matching the participant's first, second, third and fourth choice
    pub rank_counts: [usize; MAX_CHOICES],
    /// Number of entries matching none of the participant's choices
    pub unranked: usize,
    /// Occupancy of each (activity, day) appearing in the assignment, sorted by activity and day
    pub occupancy: Vec<Occupancy>,
}

/// Quality classification of an assignment, based on the satisfaction rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    NeedsImprovement,
    Acceptable,
    Good,
    VeryGood,
    Excellent,
}

impl Quality {
    /// Classify a satisfaction rate (in percent). Lower bounds are inclusive.
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 90.0 {
            Quality::Excellent
        } else if rate >= 80.0 {
            Quality::VeryGood
        } else if rate >= 70.0 {
            Quality::Good
        } else if rate >= 60.0 {
            Quality::Acceptable
        } else {
            Quality::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::Excellent => "excellent",
            Quality::VeryGood => "very good",
            Quality::Good => "good",
            Quality::Acceptable => "acceptable",
            Quality::NeedsImprovement => "needs improvement",
        }
    }
}

impl Statistics {
    /// Classify every entry of the assignment against the participant's choices and collect the
    /// occupancy of the activities.
    ///
    /// Participants without an entry in the assignment count as participants, but do not add any
    /// slots.
    pub fn compute(participants: &[Participant], assignment: &Assignment, num_days: usize) -> Self {
        let mut stats = Statistics {
            total_participants: participants.len(),
            num_days,
            ..Statistics::default()
        };
        let mut occupancy = BTreeMap::<(&str, usize), Vec<&str>>::new();

        for participant in participants {
            let activities = match assignment.get(&participant.id) {
                Some(a) => a,
                None => continue,
            };
            for (day, activity) in activities.iter().enumerate() {
                stats.total_slots += 1;
                match participant.rank_of(activity) {
                    Some(rank) => stats.rank_counts[rank - 1] += 1,
                    None => stats.unranked += 1,
                }
                occupancy
                    .entry((activity.as_str(), day + 1))
                    .or_default()
                    .push(participant.name.as_str());
            }
        }

        stats.occupancy = occupancy
            .into_iter()
            .map(|((activity, day), names)| Occupancy {
                activity: activity.to_owned(),
                day,
                count: names.len(),
                names: names.into_iter().map(String::from).collect(),
            })
            .collect();
        stats
    }

    /// Percentage of entries fulfilling a first or second choice
    pub fn satisfaction_rate(&self) -> f64 {
        if self.total_slots == 0 {
            return 0.0;
        }
        ((self.rank_counts[0] + self.rank_counts[1]) as f64 * 100.0) / self.total_slots as f64
    }

    pub fn quality(&self) -> Quality {
        Quality::from_rate(self.satisfaction_rate())
    }

    /// Total number of attendances of each activity over all days
    pub fn activity_totals(&self) -> BTreeMap<&str, usize> {
        let mut totals = BTreeMap::new();
        for o in self.occupancy.iter() {
            *totals.entry(o.activity.as_str()).or_insert(0) += o.count;
        }
        totals
    }

    /// The statistics as (metric, value) rows, e.g. for a spreadsheet export
    pub fn metric_rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            (
                "Participants".to_owned(),
                self.total_participants.to_string(),
            ),
            ("Days".to_owned(), self.num_days.to_string()),
            ("Assigned slots".to_owned(), self.total_slots.to_string()),
        ];
        for (i, count) in self.rank_counts.iter().enumerate() {
            rows.push((format!("Choice {} fulfilled", i + 1), count.to_string()));
        }
        rows.push(("Other workshop".to_owned(), self.unranked.to_string()));
        rows.push((
            "Satisfaction rate (%)".to_owned(),
            format!("{:.1}", self.satisfaction_rate()),
        ));
        rows.push(("Quality".to_owned(), self.quality().label().to_owned()));
        rows
    }
}
