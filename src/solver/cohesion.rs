//! Cohort cohesion: move cohort mates into the same activity on the same day.
//!
//! Swapping two days of a single participant keeps their set of activities, so the preference score
//! stays unchanged. We greedily apply every swap, that fits into the capacity and increases the
//! number of same-cohort pairs sharing an (activity, day).

use super::{Budget, SolveFailure};
use crate::model::{Model, Plan};
use log::debug;

/// Upper limit for the number of improvement sweeps over all participants
const MAX_SWEEPS: usize = 100;

/// Number of same-cohort pairs of participants, attending the same activity on the same day
pub(super) fn cohesion_score(model: &Model, plan: &Plan) -> u64 {
    let mut score = 0;
    for members in model.cohorts.iter() {
        let mut count = ndarray::Array2::<u64>::zeros([model.num_activities, model.num_days]);
        for p in members.iter() {
            for (d, a) in plan.row(*p).iter().enumerate() {
                count[[*a, d]] += 1;
            }
        }
        score += count.iter().map(|k| k * k.saturating_sub(1) / 2).sum::<u64>();
    }
    score
}

/// Incrementally maintained counts for evaluating day swaps
struct Counts<'a> {
    model: &'a Model,
    /// Cohort index of each participant, if they belong to a cohort with multiple members
    cohort_of: Vec<Option<usize>>,
    occupancy: ndarray::Array2<u32>,
    cohort_count: ndarray::Array3<u64>,
}

impl<'a> Counts<'a> {
    fn new(model: &'a Model, plan: &Plan) -> Self {
        let mut cohort_of = vec![None; model.num_participants];
        for (c, members) in model.cohorts.iter().enumerate() {
            for p in members.iter() {
                cohort_of[*p] = Some(c);
            }
        }
        let mut occupancy = ndarray::Array2::<u32>::zeros([model.num_activities, model.num_days]);
        let mut cohort_count = ndarray::Array3::<u64>::zeros([
            model.cohorts.len(),
            model.num_activities,
            model.num_days,
        ]);
        for ((p, d), a) in plan.indexed_iter() {
            occupancy[[*a, d]] += 1;
            if let Some(c) = cohort_of[p] {
                cohort_count[[c, *a, d]] += 1;
            }
        }
        Counts {
            model,
            cohort_of,
            occupancy,
            cohort_count,
        }
    }

    fn has_room(&self, activity: usize, day: usize) -> bool {
        match self.model.capacity {
            Some(max) => self.occupancy[[activity, day]] < max,
            None => true,
        }
    }

    /// Change of the cohesion score, if participant p swapped their activities of day i and j
    fn gain(&self, plan: &Plan, p: usize, i: usize, j: usize) -> i64 {
        let c = match self.cohort_of[p] {
            Some(c) => c,
            None => return 0,
        };
        let x = plan[[p, i]];
        let y = plan[[p, j]];
        let count = |a: usize, d: usize| self.cohort_count[[c, a, d]] as i64;
        (count(x, j) + count(y, i)) - (count(x, i) - 1) - (count(y, j) - 1)
    }

    fn swap(&mut self, plan: &mut Plan, p: usize, i: usize, j: usize) {
        let x = plan[[p, i]];
        let y = plan[[p, j]];
        plan[[p, i]] = y;
        plan[[p, j]] = x;
        self.occupancy[[x, i]] -= 1;
        self.occupancy[[y, j]] -= 1;
        self.occupancy[[x, j]] += 1;
        self.occupancy[[y, i]] += 1;
        if let Some(c) = self.cohort_of[p] {
            self.cohort_count[[c, x, i]] -= 1;
            self.cohort_count[[c, y, j]] -= 1;
            self.cohort_count[[c, x, j]] += 1;
            self.cohort_count[[c, y, i]] += 1;
        }
    }
}

/// Improve the cohesion of the plan by day swaps. Returns the gain in shared pairs.
///
/// If a swap does not fit into the capacity, a partner attending the same two activities on the
/// opposite days may swap at the same time, which leaves the occupancy unchanged.
pub(super) fn improve(
    model: &Model,
    plan: &mut Plan,
    budget: &Budget,
) -> Result<u64, SolveFailure> {
    let n_d = model.num_days;
    let mut counts = Counts::new(model, plan);

    let mut total_gain = 0;
    for sweep in 0..MAX_SWEEPS {
        budget.check()?;
        let mut improved = false;
        for members in model.cohorts.iter() {
            for &p in members.iter() {
                for i in 0..n_d {
                    for j in (i + 1)..n_d {
                        let gain = counts.gain(plan, p, i, j);
                        if gain <= 0 {
                            continue;
                        }
                        let (x, y) = (plan[[p, i]], plan[[p, j]]);
                        if counts.has_room(x, j) && counts.has_room(y, i) {
                            counts.swap(plan, p, i, j);
                            total_gain += gain as u64;
                            improved = true;
                            continue;
                        }

                        counts.swap(plan, p, i, j);
                        let partner = (0..model.num_participants)
                            .filter(|q| *q != p && plan[[*q, i]] == y && plan[[*q, j]] == x)
                            .map(|q| (q, counts.gain(plan, q, i, j)))
                            .find(|(_, g)| gain + g > 0);
                        match partner {
                            Some((q, g)) => {
                                counts.swap(plan, q, i, j);
                                total_gain += (gain + g) as u64;
                                improved = true;
                            }
                            // Undo
                            None => counts.swap(plan, p, i, j),
                        }
                    }
                }
            }
        }
        if !improved {
            debug!("Cohesion improvement converged after {} sweeps", sweep + 1);
            break;
        }
    }
    Ok(total_gain)
}
