//! The constraint builder: translation of participants, catalog and configuration into a binary
//! program with one variable per (participant, activity, day).
//!
//! The `Model` holds the objective coefficients as a 3-dimensional array and the complete list of
//! linear constraints. The solver reads the weights and capacities from here and verifies its
//! resulting plan against the constraint list.

use crate::{Catalog, CohortPolicy, Config, Participant, MAX_CHOICES};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Weight type of the objective function
pub type Weight = u64;

/// Plan representation: the activity index for each participant (rows) and day (columns)
pub type Plan = ndarray::Array2<usize>;

/// Validation errors, detected before any constraint is built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("The number of days must be at least 1")]
    NoDays,
    #[error("The maximum number of participants per workshop must be a positive number")]
    ZeroCapacity,
    #[error("At least one preference weight must be greater than 0")]
    AllWeightsZero,
    #[error("Participant {id} has no name")]
    MissingName { id: u32 },
    #[error("Participant {id} has {count} choices, but at most 4 are allowed")]
    TooManyChoices { id: u32, count: usize },
    #[error("Participant id {id} is used more than once")]
    DuplicateId { id: u32 },
    #[error("Workshop '{activity}' chosen by participant {id} is not in the list of workshops")]
    UnknownActivity { id: u32, activity: String },
    #[error("Cannot build a model without participants or workshops")]
    EmptyProblem,
}

/// Kind (and subject) of a linear constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Exactly one activity for participant (index) on day
    OneActivityPerDay { participant: usize, day: usize },
    /// Participant (index) attends activity at most once
    NoRepeat { participant: usize, activity: usize },
    /// Limited number of participants in activity on day
    Capacity { activity: usize, day: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    AtMost,
}

/// A linear constraint over binary variables with unit coefficients: Σ x_v (=|≤) rhs
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub variables: Vec<usize>,
    pub relation: Relation,
    pub rhs: u32,
}

impl LinearConstraint {
    /// Check the constraint for the given variable values
    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let lhs = self.variables.iter().filter(|v| values[**v]).count() as u32;
        match self.relation {
            Relation::Equal => lhs == self.rhs,
            Relation::AtMost => lhs <= self.rhs,
        }
    }
}

/// The complete binary program of one solve
pub struct Model {
    pub num_participants: usize,
    pub num_activities: usize,
    pub num_days: usize,
    /// Configured capacity per activity and day
    pub capacity: Option<u32>,
    /// Objective coefficient of each variable, indexed by [participant, activity, day]
    pub objective: ndarray::Array3<Weight>,
    pub constraints: Vec<LinearConstraint>,
    /// Participant indexes of each cohort with at least two members. Only filled with the
    /// require-together policy.
    pub cohorts: Vec<Vec<usize>>,
    /// Number of cohort mates ranking an activity, indexed by [participant, activity]. Used as a
    /// secondary objective with the require-together policy; all zero otherwise.
    pub affinity: ndarray::Array2<Weight>,
}

impl Model {
    /// Index of the variable x[participant, activity, day]
    pub fn variable(&self, participant: usize, activity: usize, day: usize) -> usize {
        (participant * self.num_activities + activity) * self.num_days + day
    }

    pub fn num_variables(&self) -> usize {
        self.num_participants * self.num_activities * self.num_days
    }

    /// Objective contribution of participant attending activity (on any day)
    pub fn preference_weight(&self, participant: usize, activity: usize) -> Weight {
        self.objective[[participant, activity, 0]]
    }

    /// Convert a plan into the values of the binary variables
    pub fn variable_values(&self, plan: &Plan) -> Vec<bool> {
        let mut values = vec![false; self.num_variables()];
        for ((p, d), a) in plan.indexed_iter() {
            values[self.variable(p, *a, d)] = true;
        }
        values
    }

    /// Objective value of the given plan
    pub fn objective_value(&self, plan: &Plan) -> Weight {
        plan.indexed_iter()
            .map(|((p, d), a)| self.objective[[p, *a, d]])
            .sum()
    }

    /// All constraints violated by the given plan
    pub fn violations(&self, plan: &Plan) -> Vec<&LinearConstraint> {
        if plan.dim() != (self.num_participants, self.num_days)
            || plan.iter().any(|a| *a >= self.num_activities)
        {
            // A malformed plan violates everything
            return self.constraints.iter().collect();
        }
        let values = self.variable_values(plan);
        self.constraints
            .iter()
            .filter(|c| !c.is_satisfied(&values))
            .collect()
    }
}

/// Check the configuration values. Participants are not considered.
pub fn validate_config(config: &Config) -> Result<(), InputError> {
    if config.num_days < 1 {
        return Err(InputError::NoDays);
    }
    if config.max_participants == Some(0) {
        return Err(InputError::ZeroCapacity);
    }
    if config.weights.0.iter().all(|w| *w == 0) {
        return Err(InputError::AllWeightsZero);
    }

    if config.num_days > 10 {
        warn!("More than 10 days ({}) is unusual.", config.num_days);
    }
    if let Some(max) = config.max_participants {
        if max < 5 {
            warn!("Very small group size ({} < 5).", max);
        } else if max > 50 {
            warn!("Very large group size ({} > 50).", max);
        }
    }
    if config.weights.weight(1) < config.weights.weight(2) {
        warn!("The first choice is weighted lower than the second choice.");
    }
    Ok(())
}

/// Check participants and catalog for consistency
pub fn validate_participants(
    participants: &[Participant],
    catalog: &Catalog,
) -> Result<(), InputError> {
    let mut ids = HashSet::new();
    let mut incomplete = 0;
    let mut duplicates = 0;
    let mut no_cohort = 0;
    for p in participants {
        if p.name.trim().is_empty() {
            return Err(InputError::MissingName { id: p.id });
        }
        if p.choices.len() > MAX_CHOICES {
            return Err(InputError::TooManyChoices {
                id: p.id,
                count: p.choices.len(),
            });
        }
        if !ids.insert(p.id) {
            return Err(InputError::DuplicateId { id: p.id });
        }
        if let Some((_, c)) = p.ranked_choices().find(|(_, c)| !catalog.contains(c)) {
            return Err(InputError::UnknownActivity {
                id: p.id,
                activity: c.to_owned(),
            });
        }
        if !p.has_complete_choices() {
            incomplete += 1;
        }
        if p.has_duplicate_choices() {
            duplicates += 1;
        }
        if p.cohort.trim().is_empty() {
            no_cohort += 1;
        }
    }

    if incomplete > 0 {
        warn!("{} participants did not fill all 4 choices.", incomplete);
    }
    if duplicates > 0 {
        warn!(
            "{} participants chose the same workshop more than once.",
            duplicates
        );
    }
    if no_cohort > 0 {
        warn!("{} participants have no cohort.", no_cohort);
    }
    Ok(())
}

/// Validate the input and build the binary program.
pub fn build(
    participants: &[Participant],
    catalog: &Catalog,
    config: &Config,
) -> Result<Model, InputError> {
    validate_config(config)?;
    validate_participants(participants, catalog)?;
    build_unchecked(participants, catalog, config)
}

/// Build the binary program from input, which has already passed `validate_config()` and
/// `validate_participants()`. Choices outside the catalog are ignored.
pub(crate) fn build_unchecked(
    participants: &[Participant],
    catalog: &Catalog,
    config: &Config,
) -> Result<Model, InputError> {
    if participants.is_empty() || catalog.is_empty() {
        return Err(InputError::EmptyProblem);
    }

    let n_p = participants.len();
    let n_a = catalog.len();
    let n_d = config.num_days as usize;

    // Objective coefficients: every choice adds its weight for each day of the activity
    let mut objective = ndarray::Array3::<Weight>::zeros([n_p, n_a, n_d]);
    for (p, participant) in participants.iter().enumerate() {
        for (rank, choice) in participant.ranked_choices() {
            if let Some(a) = catalog.index_of(choice) {
                let weight = config.weights.weight(rank) as Weight;
                for d in 0..n_d {
                    objective[[p, a, d]] += weight;
                }
            }
        }
    }

    let mut model = Model {
        num_participants: n_p,
        num_activities: n_a,
        num_days: n_d,
        capacity: config.max_participants,
        objective,
        constraints: Vec::with_capacity(n_p * n_d + n_p * n_a + n_a * n_d),
        cohorts: Vec::new(),
        affinity: ndarray::Array2::zeros([n_p, n_a]),
    };

    // Constraint 1: Each participant gets exactly one activity per day
    for p in 0..n_p {
        for d in 0..n_d {
            let variables = (0..n_a).map(|a| model.variable(p, a, d)).collect();
            model.constraints.push(LinearConstraint {
                kind: ConstraintKind::OneActivityPerDay {
                    participant: p,
                    day: d,
                },
                variables,
                relation: Relation::Equal,
                rhs: 1,
            });
        }
    }

    // Constraint 2: No participant attends an activity twice
    for p in 0..n_p {
        for a in 0..n_a {
            let variables = (0..n_d).map(|d| model.variable(p, a, d)).collect();
            model.constraints.push(LinearConstraint {
                kind: ConstraintKind::NoRepeat {
                    participant: p,
                    activity: a,
                },
                variables,
                relation: Relation::AtMost,
                rhs: 1,
            });
        }
    }

    // Constraint 3: Maximum participants per activity and day
    if let Some(max) = config.max_participants {
        for a in 0..n_a {
            for d in 0..n_d {
                let variables = (0..n_p).map(|p| model.variable(p, a, d)).collect();
                model.constraints.push(LinearConstraint {
                    kind: ConstraintKind::Capacity {
                        activity: a,
                        day: d,
                    },
                    variables,
                    relation: Relation::AtMost,
                    rhs: max,
                });
            }
        }
    }

    // Cohort cohesion (soft)
    match config.cohort_policy {
        CohortPolicy::RequireTogether => {
            add_cohort_groups(&mut model, participants, catalog);
        }
        CohortPolicy::PreferSeparate => {
            info!("Cohort policy 'prefer-separate' has no effect on the assignment.");
        }
        CohortPolicy::Indifferent => (),
    }

    Ok(model)
}

/// Group participants by cohort and calculate the cohort affinity of each participant towards each
/// activity.
fn add_cohort_groups(model: &mut Model, participants: &[Participant], catalog: &Catalog) {
    let mut cohorts = BTreeMap::<&str, Vec<usize>>::new();
    for (p, participant) in participants.iter().enumerate() {
        let cohort = participant.cohort.trim();
        if !cohort.is_empty() {
            cohorts.entry(cohort).or_default().push(p);
        }
    }
    model.cohorts = cohorts
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();

    for members in model.cohorts.iter() {
        // Number of members ranking each activity (each member counted once)
        let mut popularity = vec![0 as Weight; catalog.len()];
        let mut chosen = vec![Vec::new(); members.len()];
        for (i, p) in members.iter().enumerate() {
            let mut activities: Vec<usize> = participants[*p]
                .ranked_choices()
                .filter_map(|(_, c)| catalog.index_of(c))
                .collect();
            activities.sort_unstable();
            activities.dedup();
            for a in activities.iter() {
                popularity[*a] += 1;
            }
            chosen[i] = activities;
        }
        for (i, p) in members.iter().enumerate() {
            for (a, count) in popularity.iter().enumerate() {
                let own = if chosen[i].binary_search(&a).is_ok() {
                    1
                } else {
                    0
                };
                model.affinity[[*p, a]] = *count - own;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RankWeights;

    fn create_simple_input() -> (Vec<Participant>, Catalog) {
        let participants = vec![
            Participant::new(0, "Anna Schmidt", "5a", &["Pottery", "Music", "Sports", "Art"]),
            Participant::new(1, "Ben Müller", "5a", &["Sports", "Music", "Pottery", "Art"]),
            Participant::new(2, "Clara Weber", "5b", &["Music", "Art", "", ""]),
        ];
        let catalog = Catalog::from_participants(&participants);
        (participants, catalog)
    }

    #[test]
    fn test_variables_and_constraints() {
        let (participants, catalog) = create_simple_input();
        let config = Config {
            num_days: 3,
            max_participants: Some(2),
            ..Config::default()
        };
        let model = build(&participants, &catalog, &config).unwrap();

        assert_eq!(model.num_variables(), 3 * 4 * 3);
        assert_eq!(model.objective.dim(), (3, 4, 3));
        // 3*3 one-per-day + 3*4 no-repeat + 4*3 capacity
        assert_eq!(model.constraints.len(), 9 + 12 + 12);

        let mut seen = vec![false; model.num_variables()];
        for p in 0..3 {
            for a in 0..4 {
                for d in 0..3 {
                    let v = model.variable(p, a, d);
                    assert!(!seen[v], "Variable index {} used twice", v);
                    seen[v] = true;
                }
            }
        }

        for c in model.constraints.iter() {
            match c.kind {
                ConstraintKind::OneActivityPerDay { .. } => {
                    assert_eq!(c.variables.len(), 4);
                    assert_eq!((c.relation, c.rhs), (Relation::Equal, 1));
                }
                ConstraintKind::NoRepeat { .. } => {
                    assert_eq!(c.variables.len(), 3);
                    assert_eq!((c.relation, c.rhs), (Relation::AtMost, 1));
                }
                ConstraintKind::Capacity { .. } => {
                    assert_eq!(c.variables.len(), 3);
                    assert_eq!((c.relation, c.rhs), (Relation::AtMost, 2));
                }
            }
        }

        // Without capacity, no capacity constraints
        let model = build(&participants, &catalog, &Config::default()).unwrap();
        assert_eq!(model.constraints.len(), 9 + 12);
    }

    #[test]
    fn test_objective() {
        let participants = vec![
            Participant::new(0, "Anna", "", &["Pottery", "Music", "", "Pottery"]),
            Participant::new(1, "Ben", "", &["Art"]),
        ];
        let catalog = Catalog::from_participants(&participants);
        let config = Config {
            num_days: 2,
            weights: RankWeights([10, 5, 2, 1]),
            ..Config::default()
        };
        let model = build(&participants, &catalog, &config).unwrap();
        let art = catalog.index_of("Art").unwrap();
        let music = catalog.index_of("Music").unwrap();
        let pottery = catalog.index_of("Pottery").unwrap();

        // Duplicate choices add up
        assert_eq!(model.preference_weight(0, pottery), 11);
        assert_eq!(model.preference_weight(0, music), 5);
        assert_eq!(model.preference_weight(0, art), 0);
        assert_eq!(model.preference_weight(1, art), 10);
        for d in 0..2 {
            assert_eq!(model.objective[[0, pottery, d]], 11);
        }

        let plan = ndarray::arr2(&[[pottery, music], [art, music]]);
        assert_eq!(model.objective_value(&plan), 11 + 5 + 10);
        assert!(model.violations(&plan).is_empty());

        // Repeated activity
        let plan = ndarray::arr2(&[[pottery, pottery], [art, music]]);
        let violations = model.violations(&plan);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].kind,
            ConstraintKind::NoRepeat {
                participant: 0,
                activity: pottery
            }
        );
    }

    #[test]
    fn test_validation_errors() {
        let (participants, catalog) = create_simple_input();

        let config = Config {
            num_days: 0,
            ..Config::default()
        };
        assert_eq!(
            build(&participants, &catalog, &config).err(),
            Some(InputError::NoDays)
        );
        let config = Config {
            max_participants: Some(0),
            ..Config::default()
        };
        assert_eq!(
            build(&participants, &catalog, &config).err(),
            Some(InputError::ZeroCapacity)
        );
        let config = Config {
            weights: RankWeights([0, 0, 0, 0]),
            ..Config::default()
        };
        assert_eq!(
            build(&participants, &catalog, &config).err(),
            Some(InputError::AllWeightsZero)
        );

        let mut broken = participants.clone();
        broken[1].name = "  ".to_owned();
        assert_eq!(
            validate_participants(&broken, &catalog).err(),
            Some(InputError::MissingName { id: 1 })
        );

        let mut broken = participants.clone();
        broken[2].id = 0;
        assert_eq!(
            validate_participants(&broken, &catalog).err(),
            Some(InputError::DuplicateId { id: 0 })
        );

        let mut broken = participants.clone();
        broken[0].choices.push("Chess".to_owned());
        assert_eq!(
            validate_participants(&broken, &catalog).err(),
            Some(InputError::TooManyChoices { id: 0, count: 5 })
        );

        let small_catalog = Catalog::from_names(vec!["Music", "Art"]);
        assert_eq!(
            validate_participants(&participants, &small_catalog).err(),
            Some(InputError::UnknownActivity {
                id: 0,
                activity: "Pottery".to_owned()
            })
        );

        assert_eq!(
            build(&[], &catalog, &Config::default()).err(),
            Some(InputError::EmptyProblem)
        );
    }

    #[test]
    fn test_build_unchecked() {
        let (participants, catalog) = create_simple_input();
        let config = Config {
            max_participants: Some(2),
            ..Config::default()
        };
        let checked = build(&participants, &catalog, &config).unwrap();
        let unchecked = build_unchecked(&participants, &catalog, &config).unwrap();
        assert_eq!(unchecked.objective, checked.objective);
        assert_eq!(unchecked.constraints, checked.constraints);

        // No second validation: unknown choices are only rejected by `build()`
        let small_catalog = Catalog::from_names(vec!["Music", "Art", "Sports"]);
        assert!(build(&participants, &small_catalog, &config).is_err());
        let model = build_unchecked(&participants, &small_catalog, &config).unwrap();
        assert_eq!(model.num_activities, 3);
        let music = small_catalog.index_of("Music").unwrap();
        assert_eq!(model.preference_weight(0, music), 5);
        assert_eq!(
            build_unchecked(&[], &catalog, &config).err(),
            Some(InputError::EmptyProblem)
        );
    }

    #[test]
    fn test_cohort_affinity() {
        let (participants, catalog) = create_simple_input();
        let config = Config {
            cohort_policy: CohortPolicy::RequireTogether,
            ..Config::default()
        };
        let model = build(&participants, &catalog, &config).unwrap();
        // Cohort 5b has only one member
        assert_eq!(model.cohorts, vec![vec![0, 1]]);

        let art = catalog.index_of("Art").unwrap();
        let music = catalog.index_of("Music").unwrap();
        let sports = catalog.index_of("Sports").unwrap();
        // Both members of 5a rank every activity except the own one counted once
        assert_eq!(model.affinity[[0, sports]], 1);
        assert_eq!(model.affinity[[1, music]], 1);
        assert_eq!(model.affinity[[2, art]], 0);

        let model = build(&participants, &catalog, &Config::default()).unwrap();
        assert!(model.cohorts.is_empty());
        assert!(model.affinity.iter().all(|a| *a == 0));
    }
}
