//! The assignment solver.
//!
//! A participant's score only depends on the set of activities they attend, not on the days. Any
//! selection with `num_days` distinct activities per participant and at most `max * num_days`
//! participants per activity can be split into days without breaking the capacity (edge colouring
//! of a bipartite graph, see `days`). Thus, the binary program of `model` is solved exactly in two
//! steps:
//!
//! 1. Selection of the activities as a min-cost flow (source -> participant -> activity -> sink)
//! 2. Distribution of each participant's activities over the days
//!
//! With the require-together cohort policy, the cohort affinity is added to the flow costs as a
//! strictly secondary objective, and `cohesion` moves cohort mates onto the same days afterwards.
//! Neither step changes the preference score.

mod cohesion;
mod days;

use crate::flow::{Capacity, Cost, FlowNetwork};
use crate::model::{self, InputError, Model, Plan, Weight};
use crate::statistics::Statistics;
use crate::{Assignment, Catalog, Config, Participant};
use log::{debug, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Additional parameters of a solve, which do not affect the result (if it is found)
#[derive(Clone, Debug, Default)]
pub struct SolveOptions {
    /// Abort the solve after this time
    pub time_limit: Option<Duration>,
}

/// Structural reasons, why no valid assignment exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Infeasibility {
    #[error("there are no workshops")]
    NoActivities,
    #[error(
        "{days} days require {days} different workshops for each participant, but there are only \
        {activities} workshops"
    )]
    NotEnoughActivities { days: usize, activities: usize },
    #[error("{demand} places are required, but the workshops offer only {capacity} places")]
    InsufficientCapacity { demand: usize, capacity: usize },
}

/// Failure of a solve
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveFailure {
    #[error("Invalid input: {0}")]
    Invalid(#[from] InputError),
    #[error("No valid assignment exists: {0}")]
    Infeasible(Infeasibility),
    #[error("The optimization was aborted after the time limit of {limit:?}")]
    Timeout { limit: Duration },
    #[error("The optimization failed: {0}")]
    Internal(String),
}

impl SolveFailure {
    /// True if the input has no valid assignment at all (in contrast to a failed solve attempt)
    pub fn is_infeasible(&self) -> bool {
        matches!(self, SolveFailure::Infeasible(_))
    }
}

/// A successful solve
#[derive(Debug, Clone)]
pub struct Solution {
    pub assignment: Assignment,
    pub statistics: Statistics,
    /// Value of the preference objective
    pub score: Weight,
    pub elapsed: Duration,
}

pub type Outcome = Result<Solution, SolveFailure>;

/// Time budget of a single solve
pub(crate) struct Budget {
    limit: Option<Duration>,
    deadline: Option<Instant>,
}

impl Budget {
    fn new(start: Instant, limit: Option<Duration>) -> Self {
        Budget {
            limit,
            deadline: limit.map(|l| start + l),
        }
    }

    fn timeout(&self) -> SolveFailure {
        SolveFailure::Timeout {
            limit: self.limit.unwrap_or_default(),
        }
    }

    /// Fail with `Timeout`, if the deadline has passed
    pub(crate) fn check(&self) -> Result<(), SolveFailure> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(self.timeout()),
            _ => Ok(()),
        }
    }
}

/// Main method of the module: calculate an optimal assignment of activities to participants for
/// each day.
///
/// All failure modes (invalid input, infeasibility, timeout, internal errors) are returned as
/// `SolveFailure`. An assignment is only returned if it satisfies all constraints.
pub fn solve(
    participants: &[Participant],
    catalog: &Catalog,
    config: &Config,
    options: &SolveOptions,
) -> Outcome {
    let start = Instant::now();
    let budget = Budget::new(start, options.time_limit);
    let num_days = config.num_days as usize;

    model::validate_config(config)?;
    model::validate_participants(participants, catalog)?;

    if participants.is_empty() {
        info!("No participants given. Nothing to do.");
        let assignment = Assignment::new();
        return Ok(Solution {
            statistics: Statistics::compute(participants, &assignment, num_days),
            assignment,
            score: 0,
            elapsed: start.elapsed(),
        });
    }
    check_structure(participants.len(), catalog.len(), config)
        .map_err(SolveFailure::Infeasible)?;

    let model = model::build_unchecked(participants, catalog, config)?;
    info!(
        "Built model with {} variables and {} constraints",
        model.num_variables(),
        model.constraints.len()
    );

    let (plan, score) = panic::catch_unwind(AssertUnwindSafe(|| run_solver(&model, &budget)))
        .map_err(|payload| SolveFailure::Internal(panic_message(payload)))??;

    let assignment = to_assignment(participants, catalog, &plan);
    let statistics = Statistics::compute(participants, &assignment, num_days);
    let elapsed = start.elapsed();
    info!("Found optimal assignment with score {} in {:?}", score, elapsed);
    Ok(Solution {
        assignment,
        statistics,
        score,
        elapsed,
    })
}

/// Run `solve()` on a separate thread and pass the outcome to the `on_done` callback.
///
/// The inputs are shared immutable snapshots, so the caller may go on using them while the solve
/// is running.
pub fn spawn<F>(
    participants: Arc<Vec<Participant>>,
    catalog: Arc<Catalog>,
    config: Config,
    options: SolveOptions,
    on_done: F,
) -> thread::JoinHandle<()>
where
    F: FnOnce(Outcome) + Send + 'static,
{
    thread::spawn(move || {
        let outcome = solve(&participants, &catalog, &config, &options);
        on_done(outcome);
    })
}

/// Cheap checks for infeasibility, which are independent of the participants' choices
fn check_structure(
    num_participants: usize,
    num_activities: usize,
    config: &Config,
) -> Result<(), Infeasibility> {
    let num_days = config.num_days as usize;
    if num_activities == 0 {
        return Err(Infeasibility::NoActivities);
    }
    if num_days > num_activities {
        return Err(Infeasibility::NotEnoughActivities {
            days: num_days,
            activities: num_activities,
        });
    }
    if let Some(max) = config.max_participants {
        if num_activities * (max as usize) < num_participants {
            return Err(Infeasibility::InsufficientCapacity {
                demand: num_participants * num_days,
                capacity: num_activities * (max as usize) * num_days,
            });
        }
    }
    Ok(())
}

/// Solve the model: select the activities, distribute them over the days, verify the result.
fn run_solver(model: &Model, budget: &Budget) -> Result<(Plan, Weight), SolveFailure> {
    let (selection, score) = select_activities(model, budget)?;
    let mut plan = days::split_days(model, &selection, budget)?;
    if !model.cohorts.is_empty() {
        let before = cohesion::cohesion_score(model, &plan);
        let gain = cohesion::improve(model, &mut plan, budget)?;
        debug!(
            "Cohort cohesion improved from {} to {} shared pairs",
            before,
            before + gain
        );
    }
    verify(model, &plan, score)?;
    Ok((plan, score))
}

/// Factor for the preference weights in the flow costs, such that any difference in the preference
/// score outweighs all affinity differences.
fn lexicographic_factor(model: &Model) -> Cost {
    1 + model.affinity.iter().map(|a| *a as Cost).sum::<Cost>()
}

/// Select `num_days` distinct activities for each participant, maximizing the preference score,
/// by calculating a min-cost flow.
///
/// Returns the list of selected activity indexes for each participant and the preference score.
fn select_activities(
    model: &Model,
    budget: &Budget,
) -> Result<(Vec<Vec<usize>>, Weight), SolveFailure> {
    let n_p = model.num_participants;
    let n_a = model.num_activities;
    let n_d = model.num_days;
    let source = 0;
    let participant_node = |p: usize| 1 + p;
    let activity_node = |a: usize| 1 + n_p + a;
    let sink = 1 + n_p + n_a;
    let factor = lexicographic_factor(model);

    let mut network = FlowNetwork::new(n_p + n_a + 2);
    for p in 0..n_p {
        network.add_edge(source, participant_node(p), n_d as Capacity, 0);
    }
    let mut choice_edges = ndarray::Array2::<usize>::zeros([n_p, n_a]);
    for p in 0..n_p {
        for a in 0..n_a {
            let profit = model.preference_weight(p, a) as Cost * factor
                + model.affinity[[p, a]] as Cost;
            choice_edges[[p, a]] =
                network.add_edge(participant_node(p), activity_node(a), 1, -profit);
        }
    }
    // Each participant attends an activity at most once, so n_p is unlimited
    let places = match model.capacity {
        Some(max) => (max as usize * n_d).min(n_p),
        None => n_p,
    };
    for a in 0..n_a {
        network.add_edge(activity_node(a), sink, places as Capacity, 0);
    }

    let demand = n_p * n_d;
    let result = network
        .min_cost_flow(source, sink, demand as Capacity, budget.deadline)
        .map_err(|_| budget.timeout())?;
    debug!(
        "Min-cost flow finished with flow {} and cost {}",
        result.flow, result.cost
    );
    if (result.flow as usize) < demand {
        return Err(SolveFailure::Infeasible(
            Infeasibility::InsufficientCapacity {
                demand,
                capacity: places * n_a,
            },
        ));
    }

    let selection = (0..n_p)
        .map(|p| {
            (0..n_a)
                .filter(|a| network.flow(choice_edges[[p, *a]]) > 0)
                .collect()
        })
        .collect();
    let score = (-result.cost / factor) as Weight;
    Ok((selection, score))
}

/// Check the plan against all constraints of the model and compare its objective value with the
/// expected score.
fn verify(model: &Model, plan: &Plan, expected_score: Weight) -> Result<(), SolveFailure> {
    let violations = model.violations(plan);
    if let Some(constraint) = violations.first() {
        return Err(SolveFailure::Internal(format!(
            "Calculated plan violates {} constraints, e.g. {:?}",
            violations.len(),
            constraint.kind
        )));
    }
    let score = model.objective_value(plan);
    if score != expected_score {
        return Err(SolveFailure::Internal(format!(
            "Calculated plan has score {}, expected {}",
            score, expected_score
        )));
    }
    Ok(())
}

/// Convert the index-based plan into the name-based assignment
fn to_assignment(participants: &[Participant], catalog: &Catalog, plan: &Plan) -> Assignment {
    participants
        .iter()
        .zip(plan.outer_iter())
        .map(|(p, row)| {
            (
                p.id,
                row.iter().map(|a| catalog.names()[*a].clone()).collect(),
            )
        })
        .collect()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("Solver panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("Solver panicked: {}", message)
    } else {
        "Solver panicked".to_owned()
    }
}
