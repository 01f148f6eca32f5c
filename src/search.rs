//! Best-first search over jump points.
//!
//! A regular A* successor function only sees the node being expanded; jump
//! point search also needs that node's parent to derive the travel
//! direction, so this variant threads the parent through to the successor
//! closure. Adapted from the classic A* formulation over an
//! [IndexMap](indexmap::IndexMap) of parents, with frontier entries holding
//! map indices instead of cloned nodes.

use fxhash::FxBuildHasher;
use indexmap::map::Entry::{Occupied, Vacant};
use indexmap::IndexMap;
use log::warn;
use num_traits::Zero;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Frontier entry ordered as a min-heap on `f = g + h`. Between entries with
/// equal `f` the larger `g` wins, which favors nodes closer to the goal and
/// cuts down on re-expansion.
struct FrontierEntry<C> {
    estimate: C,
    cost: C,
    index: usize,
}

impl<C: PartialEq> PartialEq for FrontierEntry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.estimate.eq(&other.estimate) && self.cost.eq(&other.cost)
    }
}

impl<C: PartialEq> Eq for FrontierEntry<C> {}

impl<C: Ord> PartialOrd for FrontierEntry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: Ord> Ord for FrontierEntry<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.estimate.cmp(&self.estimate) {
            Ordering::Equal => self.cost.cmp(&other.cost),
            ord => ord,
        }
    }
}

/// Walks the parent indices back from the accepted node and returns the
/// node sequence in start-to-goal order.
fn rebuild_path<N, V, F>(parents: &FxIndexMap<N, V>, mut parent_of: F, goal_index: usize) -> Vec<N>
where
    N: Eq + Hash + Clone,
    F: FnMut(&V) -> usize,
{
    let mut path: Vec<N> = itertools::unfold(goal_index, |index| {
        parents.get_index(*index).map(|(node, value)| {
            *index = parent_of(value);
            node.clone()
        })
    })
    .collect();
    path.reverse();
    path
}

/// Searches from `start` until `success` accepts a node or the frontier runs
/// dry. `successors` receives the parent (if any) next to the node it
/// expands. Returns the accepted node's waypoint chain and accumulated cost.
pub(crate) fn best_first_search<N, C, FN, IN, FH, FS>(
    start: &N,
    mut successors: FN,
    mut heuristic: FH,
    mut success: FS,
) -> Option<(Vec<N>, C)>
where
    N: Eq + Hash + Clone,
    C: Zero + Ord + Copy,
    FN: FnMut(Option<&N>, &N) -> IN,
    IN: IntoIterator<Item = (N, C)>,
    FH: FnMut(&N) -> C,
    FS: FnMut(&N) -> bool,
{
    let mut frontier = BinaryHeap::new();
    frontier.push(FrontierEntry {
        estimate: Zero::zero(),
        cost: Zero::zero(),
        index: 0,
    });
    let mut parents: FxIndexMap<N, (usize, C)> = FxIndexMap::default();
    parents.insert(start.clone(), (usize::MAX, Zero::zero()));

    while let Some(FrontierEntry { cost, index, .. }) = frontier.pop() {
        let expansion = {
            let (node, &(parent_index, best_cost)) = parents.get_index(index).unwrap();
            if success(node) {
                let waypoints = rebuild_path(&parents, |&(parent, _)| parent, index);
                return Some((waypoints, cost));
            }
            // A node can sit in the frontier more than once; entries queued
            // before a cheaper route was found are stale and dropped here.
            if cost > best_cost {
                continue;
            }
            let parent_node = parents.get_index(parent_index).map(|(node, _)| node);
            successors(parent_node, node)
        };
        for (successor, move_cost) in expansion {
            let new_cost = cost + move_cost;
            let estimate;
            let successor_index;
            match parents.entry(successor) {
                Vacant(entry) => {
                    estimate = new_cost + heuristic(entry.key());
                    successor_index = entry.index();
                    entry.insert((index, new_cost));
                }
                Occupied(mut entry) => {
                    if entry.get().1 > new_cost {
                        estimate = new_cost + heuristic(entry.key());
                        successor_index = entry.index();
                        entry.insert((index, new_cost));
                    } else {
                        continue;
                    }
                }
            }
            frontier.push(FrontierEntry {
                estimate,
                cost: new_cost,
                index: successor_index,
            });
        }
    }
    warn!("frontier exhausted although the goal was reported reachable");
    None
}
