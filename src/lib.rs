//! Assignment of participants to recurring workshops over multiple days.
//!
//! The crate turns a list of participants with up to four ranked workshop choices into a plan
//! with one workshop per participant and day, maximizing the weighted preference satisfaction
//! under capacity constraints. See `solver::solve()` for the entry point, `preview::preview()`
//! for the cheap solvability estimate and `statistics` for post-processing of a plan.

mod flow;
pub mod io;
pub mod model;
pub mod preview;
pub mod solver;
pub mod statistics;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of ranked choices per participant
pub const MAX_CHOICES: usize = 4;

/// Representation of a participant's data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier of the participant, unique within one solve
    pub id: u32,
    /// Participant's display name. Mainly used for output
    pub name: String,
    /// Cohort (e.g. school class) of the participant. Empty string means no cohort.
    #[serde(default)]
    pub cohort: String,
    /// Ranked workshop choices, most wanted first. Empty entries are placeholders.
    #[serde(default)]
    pub choices: Vec<String>,
}

impl Participant {
    pub fn new(id: u32, name: &str, cohort: &str, choices: &[&str]) -> Self {
        Participant {
            id,
            name: name.to_owned(),
            cohort: cohort.to_owned(),
            choices: choices.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    /// The trimmed choice at the given rank (1-based) or None, if the entry is empty or missing.
    pub fn choice(&self, rank: usize) -> Option<&str> {
        if rank == 0 {
            return None;
        }
        self.choices
            .get(rank - 1)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// Iterate the non-empty choices together with their rank (1-based)
    pub fn ranked_choices(&self) -> impl Iterator<Item = (usize, &str)> {
        self.choices
            .iter()
            .take(MAX_CHOICES)
            .enumerate()
            .map(|(i, c)| (i + 1, c.trim()))
            .filter(|(_, c)| !c.is_empty())
    }

    /// Get the (first) rank of the given activity in the participant's choices
    pub fn rank_of(&self, activity: &str) -> Option<usize> {
        let activity = activity.trim();
        if activity.is_empty() {
            return None;
        }
        self.ranked_choices()
            .find(|(_, c)| *c == activity)
            .map(|(rank, _)| rank)
    }

    /// Check if all four choices are filled
    pub fn has_complete_choices(&self) -> bool {
        (1..=MAX_CHOICES).all(|rank| self.choice(rank).is_some())
    }

    /// Check if the same activity has been chosen more than once
    pub fn has_duplicate_choices(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.ranked_choices().any(|(_, c)| !seen.insert(c))
    }
}

/// The set of schedulable activities (workshops), sorted by name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    names: Vec<String>,
}

impl Catalog {
    /// Derive the catalog as the union of all non-empty choices of the participants.
    pub fn from_participants(participants: &[Participant]) -> Self {
        let names: BTreeSet<&str> = participants
            .iter()
            .flat_map(|p| p.ranked_choices().map(|(_, c)| c))
            .collect();
        Catalog {
            names: names.into_iter().map(String::from).collect(),
        }
    }

    /// Build a catalog from explicitly given activity names. Names are trimmed, blank names are
    /// dropped and duplicates removed.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_owned())
            .filter(|n| !n.is_empty())
            .collect();
        Catalog {
            names: names.into_iter().collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the activity with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .binary_search_by(|n| n.as_str().cmp(name.trim()))
            .ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }
}

/// Policy for keeping participants of the same cohort together
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CohortPolicy {
    RequireTogether,
    PreferSeparate,
    Indifferent,
}

impl Default for CohortPolicy {
    fn default() -> Self {
        CohortPolicy::Indifferent
    }
}

impl std::str::FromStr for CohortPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require-together" => Ok(CohortPolicy::RequireTogether),
            "prefer-separate" => Ok(CohortPolicy::PreferSeparate),
            "indifferent" => Ok(CohortPolicy::Indifferent),
            _ => Err(format!("Unknown cohort policy '{}'", s)),
        }
    }
}

/// Objective weight of each preference rank (index 0 = first choice)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankWeights(pub [u32; MAX_CHOICES]);

impl RankWeights {
    /// Weight of the given rank (1-based)
    pub fn weight(&self, rank: usize) -> u32 {
        match rank {
            1..=MAX_CHOICES => self.0[rank - 1],
            _ => 0,
        }
    }
}

impl Default for RankWeights {
    fn default() -> Self {
        RankWeights([10, 5, 2, 1])
    }
}

/// Configuration of a solve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of workshop days
    pub num_days: u32,
    /// Maximum number of participants per activity and day. None means unlimited.
    pub max_participants: Option<u32>,
    pub cohort_policy: CohortPolicy,
    pub weights: RankWeights,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_days: 3,
            max_participants: None,
            cohort_policy: CohortPolicy::default(),
            weights: RankWeights::default(),
        }
    }
}

impl Config {
    /// Read a JSON settings file. Keys missing in the file are taken from the defaults.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, String> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            format!(
                "Could not open settings file {}: {}",
                path.as_ref().display(),
                e
            )
        })?;
        serde_json::from_reader(file).map_err(|e| e.to_string())
    }
}

/// Result of a solve: the list of activities (one per day) for each participant id
pub type Assignment = BTreeMap<u32, Vec<String>>;

#[cfg(test)]
fn assert_data_consitency(participants: &[Participant], catalog: &Catalog) {
    let mut ids = BTreeSet::new();
    for p in participants {
        assert!(ids.insert(p.id), "Participant id {} is not unique", p.id);
        assert!(p.choices.len() <= MAX_CHOICES);
        for (_, c) in p.ranked_choices() {
            assert!(
                catalog.contains(c),
                "Choice '{}' of participant {} is not in the catalog",
                c,
                p.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_choices() {
        let p = Participant::new(1, "Anna", "5a", &["Pottery", "  ", " Music ", "Pottery"]);
        assert_eq!(p.choice(1), Some("Pottery"));
        assert_eq!(p.choice(2), None);
        assert_eq!(p.choice(3), Some("Music"));
        assert_eq!(p.choice(5), None);
        assert_eq!(
            p.ranked_choices().collect::<Vec<_>>(),
            vec![(1, "Pottery"), (3, "Music"), (4, "Pottery")]
        );
        assert_eq!(p.rank_of("Music"), Some(3));
        assert_eq!(p.rank_of("Pottery"), Some(1));
        assert_eq!(p.rank_of(""), None);
        assert_eq!(p.rank_of("Sports"), None);
        assert!(!p.has_complete_choices());
        assert!(p.has_duplicate_choices());
    }

    #[test]
    fn catalog_from_participants() {
        let participants = vec![
            Participant::new(1, "Anna", "5a", &["Pottery", "Music", "", ""]),
            Participant::new(2, "Ben", "5a", &["Sports", " Music", "Art", "Pottery"]),
        ];
        let catalog = Catalog::from_participants(&participants);
        assert_eq!(catalog.names(), &["Art", "Music", "Pottery", "Sports"]);
        assert_eq!(catalog.index_of("Pottery"), Some(2));
        assert_eq!(catalog.index_of(" Sports "), Some(3));
        assert_eq!(catalog.index_of(""), None);
        assert_data_consitency(&participants, &catalog);

        let catalog = Catalog::from_names(vec!["b", " a", "", "b "]);
        assert_eq!(catalog.names(), &["a", "b"]);
    }

    #[test]
    fn config_defaults() {
        let config: Config = serde_json::from_str(r#"{"num_days": 5}"#).unwrap();
        assert_eq!(config.num_days, 5);
        assert_eq!(config.max_participants, None);
        assert_eq!(config.cohort_policy, CohortPolicy::Indifferent);
        assert_eq!(config.weights, RankWeights([10, 5, 2, 1]));

        let config: Config = serde_json::from_str(
            r#"{"max_participants": 12, "cohort_policy": "require-together",
                "weights": [8, 4, 2, 0]}"#,
        )
        .unwrap();
        assert_eq!(config.num_days, 3);
        assert_eq!(config.max_participants, Some(12));
        assert_eq!(config.cohort_policy, CohortPolicy::RequireTogether);
        assert_eq!(config.weights.weight(2), 4);
        assert_eq!(config.weights.weight(5), 0);

        assert_eq!(
            "prefer-separate".parse::<CohortPolicy>(),
            Ok(CohortPolicy::PreferSeparate)
        );
        assert!("sometimes".parse::<CohortPolicy>().is_err());
    }

    #[test]
    fn config_load() {
        let resources =
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("src/io/test_resources");
        let config = Config::load(resources.join("settings.json")).unwrap();
        assert_eq!(config.num_days, 4);
        assert_eq!(config.cohort_policy, CohortPolicy::PreferSeparate);
        // Missing keys
        assert_eq!(config.max_participants, None);
        assert_eq!(config.weights, RankWeights::default());

        let result = Config::load(resources.join("no_such_settings.json"));
        assert!(result.unwrap_err().contains("no_such_settings.json"));
    }
}
