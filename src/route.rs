//! Stitching the tour's segment paths into one continuous route.

use grid_util::point::Point;
use log::warn;

use crate::jps::GridPath;
use crate::matrix::PathTable;
use crate::tour::Tour;

/// The full tour route: every cell along the way, with the junction points
/// shared by consecutive segments stored once, and the summed cost of the
/// traversed segments.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub points: Vec<Point>,
    pub total_cost: i32,
}

/// Concatenates the stored segment paths along the tour's edges. Segments
/// without a stored path (possible when the pair matrix was built with a
/// cutoff the tour disagreed with) are skipped with a warning rather than
/// failing the route.
pub fn reconstruct_route(tour: &Tour, paths: &PathTable) -> Route {
    let mut route = Route {
        points: Vec::new(),
        total_cost: 0,
    };
    for edge in tour.order.windows(2) {
        let (from, to) = (edge[0], edge[1]);
        let Some(segment) = paths.get(from, to) else {
            warn!("no stored path for tour edge {} -> {}, omitting the segment", from, to);
            continue;
        };
        append_segment(&mut route, segment, expected_start(paths, from));
    }
    route
}

/// The cell a segment leaving `poi` must start at, taken from the
/// diagonal's trivial path.
fn expected_start(paths: &PathTable, poi: usize) -> Option<Point> {
    paths
        .get(poi, poi)
        .and_then(|trivial| trivial.points.first().copied())
}

fn append_segment(route: &mut Route, segment: &GridPath, expected_start: Option<Point>) {
    // Both cells of a pair share one stored path, so the segment backing
    // this edge may be recorded in the opposite orientation.
    let reversed = match expected_start {
        Some(start) => {
            segment.points.first() != Some(&start) && segment.points.last() == Some(&start)
        }
        None => false,
    };
    if reversed {
        for point in segment.points.iter().rev() {
            push_deduplicated(route, *point);
        }
    } else {
        for point in segment.points.iter() {
            push_deduplicated(route, *point);
        }
    }
    route.total_cost += segment.total_cost;
}

/// Appends a point unless it repeats the route's current endpoint, which
/// drops exactly the shared junction between consecutive segments.
fn push_deduplicated(route: &mut Route, point: Point) {
    if route.points.last() != Some(&point) {
        route.points.push(point);
    }
}
