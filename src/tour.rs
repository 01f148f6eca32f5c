//! Closed-tour solving over the distance matrix.

use log::{info, warn};

use crate::error::Error;
use crate::lkh::{self, LkhConfig};
use crate::matrix::DistanceMatrix;

/// Visiting order over POI indices, closed: the starting index appears
/// again at the end.
#[derive(Clone, Debug, PartialEq)]
pub struct Tour {
    pub order: Vec<usize>,
    pub total_distance: f32,
}

/// Cost of a closed order under `matrix`.
pub(crate) fn tour_distance(matrix: &DistanceMatrix, order: &[usize]) -> f32 {
    order
        .windows(2)
        .map(|edge| matrix.get(edge[0], edge[1]))
        .sum()
}

/// Produces a closed tour visiting every POI index once. The external
/// solver is tried first; any failure there degrades transparently to the
/// nearest-neighbour construction. Only an empty matrix cannot produce a
/// tour at all.
pub fn solve_tour(matrix: &DistanceMatrix, config: &LkhConfig) -> Result<Tour, Error> {
    if matrix.size() == 0 {
        return Err(Error::EmptyPoiSet);
    }
    if config.enabled {
        match lkh::solve(matrix, config) {
            Ok(tour) => {
                info!(
                    "external solver tour over {} POIs, total distance {}",
                    matrix.size(),
                    tour.total_distance
                );
                return Ok(tour);
            }
            Err(err) => warn!(
                "external solver unavailable ({}), using nearest-neighbour fallback",
                err
            ),
        }
    }
    Ok(nearest_neighbor(matrix))
}

/// Greedy closed tour: start at index 0, repeatedly move to the nearest
/// unvisited POI, close the loop at the end. No optimality guarantee; this
/// is the dependency-free degradation path.
pub fn nearest_neighbor(matrix: &DistanceMatrix) -> Tour {
    let n = matrix.size();
    let mut order = Vec::with_capacity(n + 1);
    let mut visited = vec![false; n];
    let mut total_distance = 0.0f32;
    order.push(0);
    visited[0] = true;
    for _ in 1..n {
        let current = order[order.len() - 1];
        let mut next: Option<(usize, f32)> = None;
        for candidate in 0..n {
            if visited[candidate] {
                continue;
            }
            let cost = matrix.get(current, candidate);
            match next {
                Some((_, best)) if cost >= best => {}
                _ => next = Some((candidate, cost)),
            }
        }
        if let Some((candidate, cost)) = next {
            order.push(candidate);
            visited[candidate] = true;
            total_distance += cost;
        }
    }
    total_distance += matrix.get(order[order.len() - 1], 0);
    order.push(0);
    Tour {
        order,
        total_distance,
    }
}
