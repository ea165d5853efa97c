//! Min-cost flow by successive shortest paths with node potentials (Dijkstra on reduced costs).
//!
//! Capacities are integral, so the resulting flow is integral as well. This makes the kernel an
//! exact solver for transportation-type binary programs: every optimal flow is an optimal 0/1
//! assignment.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Type of edge costs and the total cost of a flow.
///
/// The solver combines the preference weights with a lexicographic factor, so we need more range
/// than the weights themselves.
pub type Cost = i128;

/// Type of edge capacities and flow amounts
pub type Capacity = u32;

const INFINITE: Cost = Cost::MAX;

/// Returned when the deadline passed before the flow was complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    /// Residual capacity
    capacity: Capacity,
    cost: Cost,
}

/// Result of a min-cost flow computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowResult {
    pub flow: Capacity,
    pub cost: Cost,
}

/// A directed flow network. Every edge is stored together with its reverse (residual) edge at
/// index `id ^ 1`.
pub struct FlowNetwork {
    edges: Vec<Edge>,
    adjacency: Vec<Vec<usize>>,
    /// Original capacity of each forward edge (indexed by edge id / 2)
    initial_capacity: Vec<Capacity>,
}

impl FlowNetwork {
    pub fn new(num_nodes: usize) -> Self {
        FlowNetwork {
            edges: Vec::new(),
            adjacency: vec![Vec::new(); num_nodes],
            initial_capacity: Vec::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Add an edge and return its id
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: Capacity, cost: Cost) -> usize {
        let id = self.edges.len();
        self.edges.push(Edge { to, capacity, cost });
        self.edges.push(Edge {
            to: from,
            capacity: 0,
            cost: -cost,
        });
        self.adjacency[from].push(id);
        self.adjacency[to].push(id + 1);
        self.initial_capacity.push(capacity);
        id
    }

    /// Current flow on the edge with the given id
    pub fn flow(&self, edge: usize) -> Capacity {
        self.initial_capacity[edge / 2] - self.edges[edge].capacity
    }

    /// Send up to `limit` units of flow from `source` to `sink` with minimal total cost.
    ///
    /// The network must not contain negative cycles (which is always true for networks without
    /// any flow yet and acyclic edge structure). If the `deadline` passes between two
    /// augmentations, `Interrupted` is returned and the network is left with a partial flow.
    pub fn min_cost_flow(
        &mut self,
        source: usize,
        sink: usize,
        limit: Capacity,
        deadline: Option<Instant>,
    ) -> Result<FlowResult, Interrupted> {
        let n = self.num_nodes();
        let mut potential = self.initial_potentials();
        let mut result = FlowResult { flow: 0, cost: 0 };

        while result.flow < limit {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Interrupted);
                }
            }

            // Dijkstra on reduced costs
            let mut dist = vec![INFINITE; n];
            let mut previous_edge = vec![usize::MAX; n];
            let mut heap = BinaryHeap::new();
            dist[source] = 0;
            heap.push(Reverse((0 as Cost, source)));
            while let Some(Reverse((d, u))) = heap.pop() {
                if d > dist[u] {
                    continue;
                }
                for &e in self.adjacency[u].iter() {
                    let edge = &self.edges[e];
                    if edge.capacity == 0 {
                        continue;
                    }
                    let next = d + edge.cost + potential[u] - potential[edge.to];
                    if next < dist[edge.to] {
                        dist[edge.to] = next;
                        previous_edge[edge.to] = e;
                        heap.push(Reverse((next, edge.to)));
                    }
                }
            }
            if dist[sink] == INFINITE {
                break;
            }

            // Update potentials. Unreachable nodes get the maximum distance to keep all reduced
            // costs of residual edges non-negative.
            let max_dist = dist.iter().filter(|d| **d != INFINITE).max().copied().unwrap_or(0);
            for (v, d) in dist.iter().enumerate() {
                potential[v] += if *d == INFINITE { max_dist } else { *d };
            }

            // Find bottleneck and augment
            let mut amount = limit - result.flow;
            let mut v = sink;
            while v != source {
                let e = previous_edge[v];
                amount = amount.min(self.edges[e].capacity);
                v = self.edges[e ^ 1].to;
            }
            let mut v = sink;
            while v != source {
                let e = previous_edge[v];
                self.edges[e].capacity -= amount;
                self.edges[e ^ 1].capacity += amount;
                result.cost += amount as Cost * self.edges[e].cost;
                v = self.edges[e ^ 1].to;
            }
            result.flow += amount;
        }

        Ok(result)
    }

    /// Bellman-Ford from a virtual node, connected to every node with cost 0. Gives potentials with
    /// non-negative reduced costs for all edges with residual capacity.
    fn initial_potentials(&self) -> Vec<Cost> {
        let n = self.num_nodes();
        let mut potential = vec![0 as Cost; n];
        for _ in 0..n {
            let mut changed = false;
            for (u, edges) in self.adjacency.iter().enumerate() {
                for &e in edges {
                    let edge = &self.edges[e];
                    if edge.capacity > 0 && potential[u] + edge.cost < potential[edge.to] {
                        potential[edge.to] = potential[u] + edge.cost;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        potential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn simple_assignment() {
        // Two workers, two jobs: 0->A costs 1, 0->B costs 3, 1->A costs 2, 1->B costs 5.
        // Optimal: 0->B, 1->A with cost 5 (vs 0->A, 1->B with cost 6)
        let mut network = FlowNetwork::new(6);
        let (s, w0, w1, a, b, t) = (0, 1, 2, 3, 4, 5);
        network.add_edge(s, w0, 1, 0);
        network.add_edge(s, w1, 1, 0);
        let e0a = network.add_edge(w0, a, 1, 1);
        let e0b = network.add_edge(w0, b, 1, 3);
        let e1a = network.add_edge(w1, a, 1, 2);
        let e1b = network.add_edge(w1, b, 1, 5);
        network.add_edge(a, t, 1, 0);
        network.add_edge(b, t, 1, 0);

        let result = network.min_cost_flow(s, t, 10, None).unwrap();
        assert_eq!(result, FlowResult { flow: 2, cost: 5 });
        assert_eq!(network.flow(e0a), 0);
        assert_eq!(network.flow(e0b), 1);
        assert_eq!(network.flow(e1a), 1);
        assert_eq!(network.flow(e1b), 0);
    }

    #[test]
    fn negative_costs_and_rerouting() {
        // Maximization as negative costs. The greedy first path (0->A with -10) must be rerouted
        // to reach the optimum 0->B, 1->A with -9 + -8 = -17 instead of -10 + -1 = -11.
        let mut network = FlowNetwork::new(6);
        let (s, w0, w1, a, b, t) = (0, 1, 2, 3, 4, 5);
        network.add_edge(s, w0, 1, 0);
        network.add_edge(s, w1, 1, 0);
        let e0a = network.add_edge(w0, a, 1, -10);
        let e0b = network.add_edge(w0, b, 1, -9);
        let e1a = network.add_edge(w1, a, 1, -8);
        network.add_edge(w1, b, 1, -1);
        network.add_edge(a, t, 1, 0);
        network.add_edge(b, t, 1, 0);

        let result = network.min_cost_flow(s, t, 2, None).unwrap();
        assert_eq!(result, FlowResult { flow: 2, cost: -17 });
        assert_eq!(network.flow(e0a), 0);
        assert_eq!(network.flow(e0b), 1);
        assert_eq!(network.flow(e1a), 1);
    }

    #[test]
    fn limited_capacity() {
        // Three units wanted, only two can pass the middle edge
        let mut network = FlowNetwork::new(3);
        network.add_edge(0, 1, 3, 0);
        network.add_edge(1, 2, 2, 4);
        let result = network.min_cost_flow(0, 2, 3, None).unwrap();
        assert_eq!(result, FlowResult { flow: 2, cost: 8 });
    }

    #[test]
    fn deadline_passed() {
        let mut network = FlowNetwork::new(2);
        network.add_edge(0, 1, 1, 0);
        let deadline = Instant::now() - Duration::from_millis(1);
        assert_eq!(
            network.min_cost_flow(0, 1, 1, Some(deadline)),
            Err(Interrupted)
        );
    }
}
