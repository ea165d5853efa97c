//! Distribution of the selected activities over the days.
//!
//! Each activity's attendees are split into groups of at most `num_days` participants. In the
//! bipartite graph of participants and groups, every participant has degree `num_days` and every
//! group has degree `<= num_days`, so the edges can be coloured with `num_days` colours (König's
//! theorem). A colour is a day: each participant gets exactly one activity per day, and each
//! activity gets at most one participant per group and day, i.e. at most `max` participants.

use super::{Budget, SolveFailure};
use crate::model::{Model, Plan};

/// Proper edge colouring of a bipartite graph. `neighbour[[v, c]]` is the vertex connected to `v`
/// by the edge with colour `c`.
pub(super) struct EdgeColouring {
    neighbour: ndarray::Array2<Option<usize>>,
}

impl EdgeColouring {
    pub(super) fn new(num_vertices: usize, num_colours: usize) -> Self {
        EdgeColouring {
            neighbour: ndarray::Array2::from_elem([num_vertices, num_colours], None),
        }
    }

    pub(super) fn neighbour(&self, vertex: usize, colour: usize) -> Option<usize> {
        self.neighbour[[vertex, colour]]
    }

    fn free_colour(&self, vertex: usize) -> Option<usize> {
        self.neighbour
            .row(vertex)
            .iter()
            .position(|n| n.is_none())
    }

    fn set(&mut self, u: usize, v: usize, colour: usize) {
        self.neighbour[[u, colour]] = Some(v);
        self.neighbour[[v, colour]] = Some(u);
    }

    /// Insert and colour the edge (u, v). If the colour free at `u` is used at `v`, the
    /// alternating path of that colour and a colour free at `v` is swapped first.
    ///
    /// Fails if `u` or `v` already has an edge of every colour.
    pub(super) fn insert(&mut self, u: usize, v: usize) -> Result<(), SolveFailure> {
        let no_colour = || {
            SolveFailure::Internal(format!(
                "No free day left for edge ({}, {}) in day distribution",
                u, v
            ))
        };
        let alpha = self.free_colour(u).ok_or_else(no_colour)?;
        let beta = self.free_colour(v).ok_or_else(no_colour)?;

        if self.neighbour[[v, alpha]].is_some() {
            let mut path = Vec::new();
            let mut x = v;
            let mut colour = alpha;
            while let Some(y) = self.neighbour[[x, colour]] {
                path.push((x, y, colour));
                x = y;
                colour = if colour == alpha { beta } else { alpha };
            }
            for (x, y, colour) in path.iter() {
                self.neighbour[[*x, *colour]] = None;
                self.neighbour[[*y, *colour]] = None;
            }
            for (x, y, colour) in path {
                self.set(x, y, if colour == alpha { beta } else { alpha });
            }
        }
        self.set(u, v, alpha);
        Ok(())
    }
}

/// Distribute the selected activities of each participant over the days, respecting the capacity.
///
/// `selection` must contain exactly `num_days` distinct activities for each participant and each
/// activity must be selected at most `max * num_days` times.
pub(super) fn split_days(
    model: &Model,
    selection: &[Vec<usize>],
    budget: &Budget,
) -> Result<Plan, SolveFailure> {
    let n_p = model.num_participants;
    let n_d = model.num_days;

    let mut attendees = vec![Vec::new(); model.num_activities];
    for (p, activities) in selection.iter().enumerate() {
        for a in activities.iter() {
            attendees[*a].push(p);
        }
    }

    // Groups of at most n_d attendees; vertex index of group g is n_p + g
    let mut group_activity = Vec::new();
    let mut edges = Vec::new();
    for (a, participants) in attendees.iter().enumerate() {
        for chunk in participants.chunks(n_d) {
            let group = group_activity.len();
            group_activity.push(a);
            edges.extend(chunk.iter().map(|p| (*p, n_p + group)));
        }
    }

    let mut colouring = EdgeColouring::new(n_p + group_activity.len(), n_d);
    for (i, (p, group)) in edges.into_iter().enumerate() {
        if i % 1024 == 0 {
            budget.check()?;
        }
        colouring.insert(p, group)?;
    }

    let mut plan = Plan::zeros([n_p, n_d]);
    for p in 0..n_p {
        for day in 0..n_d {
            let group = colouring.neighbour(p, day).ok_or_else(|| {
                SolveFailure::Internal(format!("Participant {} has no activity on day {}", p, day))
            })?;
            plan[[p, day]] = group_activity[group - n_p];
        }
    }
    Ok(plan)
}
