//! End-to-end pipeline tests using the built-in fallback solver, so the
//! outcome does not depend on an LKH installation.

use grid_tour::{
    build_all_pairs, plan_route, LkhConfig, MatrixCache, PlannerConfig, PoiGrid,
};
use grid_util::point::Point;

fn warehouse() -> PoiGrid {
    PoiGrid::from_ascii(&[
        "P.......P", //
        "..##.....",
        "..##..#..",
        "......#..",
        "P.....#.P",
    ], 50.0)
}

fn fallback_config() -> PlannerConfig {
    PlannerConfig {
        lkh: LkhConfig::disabled(),
        ..PlannerConfig::default()
    }
}

#[test]
fn plans_a_closed_tour_with_a_continuous_route() {
    let grid = warehouse();
    let plan = plan_route(&grid, &fallback_config()).unwrap();

    let n = grid.pois().len();
    assert_eq!(plan.tour.order.len(), n + 1);
    assert_eq!(plan.tour.order.first(), plan.tour.order.last());
    let mut visited = plan.tour.order[..n].to_vec();
    visited.sort_unstable();
    assert_eq!(visited, (0..n).collect::<Vec<_>>());

    // The route is a continuous walk: one step between consecutive cells,
    // never through an obstacle.
    let route = &plan.route;
    assert!(route.points.len() > 1);
    for pair in route.points.windows(2) {
        let dist = (pair[0].x - pair[1].x).abs() + (pair[0].y - pair[1].y).abs();
        assert_eq!(dist, 1, "route jumps from {:?} to {:?}", pair[0], pair[1]);
        assert!(grid.is_walkable(pair[1]));
    }

    // It starts and ends at the tour's starting POI.
    let start = grid.pois()[plan.tour.order[0]];
    assert_eq!(route.points.first(), Some(&start));
    assert_eq!(route.points.last(), Some(&start));

    // Its cost is the sum of the traversed segment costs, which for a fully
    // connected matrix equals the tour distance.
    let matrix_total: f32 = plan
        .tour
        .order
        .windows(2)
        .map(|e| plan.matrices.distances.get(e[0], e[1]))
        .sum();
    assert_eq!(route.total_cost as f32, matrix_total);
    assert_eq!(plan.tour.total_distance, matrix_total);
}

#[test]
fn validation_blocks_the_pipeline() {
    let mut grid = warehouse();
    grid.add_poi(Point::new(100, 100));
    let err = plan_route(&grid, &fallback_config()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("POI 4"), "unexpected message: {message}");
    assert!(message.contains("(100, 100)"), "unexpected message: {message}");
}

#[test]
fn second_run_is_served_from_the_cache() {
    let grid = warehouse();
    let dir = tempfile::tempdir().unwrap();
    let cache = MatrixCache::for_grid(dir.path(), &grid);

    let first = build_all_pairs(&grid, f32::INFINITY, Some(&cache));
    assert!(cache.path().exists());

    // A fresh load must reproduce the computed values bit for bit.
    let second = build_all_pairs(&grid, f32::INFINITY, Some(&cache));
    let n = first.distances.size();
    for from in 0..n {
        for to in 0..n {
            assert_eq!(
                first.distances.get(from, to).to_bits(),
                second.distances.get(from, to).to_bits()
            );
            assert_eq!(
                first.paths.get(from, to).map(|p| &p.points),
                second.paths.get(from, to).map(|p| &p.points)
            );
        }
    }
}

#[test]
fn editing_the_grid_invalidates_the_cache() {
    let mut grid = warehouse();
    let dir = tempfile::tempdir().unwrap();
    let cache = MatrixCache::new(dir.path().join("layout.jps"));

    build_all_pairs(&grid, f32::INFINITY, Some(&cache));
    assert!(cache.load(&grid).is_some());

    grid.set_obstacle(4, 0);
    assert!(cache.load(&grid).is_none());

    // Recomputation through the builder still succeeds and rewrites the
    // cache for the new layout.
    let rebuilt = build_all_pairs(&grid, f32::INFINITY, Some(&cache));
    assert_eq!(rebuilt.distances.size(), grid.pois().len());
    assert!(cache.load(&grid).is_some());
}

#[test]
fn cutoff_excluded_pairs_stay_out_of_matrix_and_route() {
    let grid = warehouse();
    let plan = plan_route(
        &grid,
        &PlannerConfig {
            euclidean_cutoff: 5.0,
            lkh: LkhConfig::disabled(),
            ..PlannerConfig::default()
        },
    )
    .unwrap();

    // Only the two vertical pairs (straight-line distance 4) survive the
    // cutoff; the horizontal and diagonal pairs stay unreachable even
    // though grid paths exist.
    let distances = &plan.matrices.distances;
    assert_eq!(distances.get(0, 2), 4.0);
    assert_eq!(distances.get(1, 3), 4.0);
    assert!(!distances.is_reachable(0, 1));
    assert!(!distances.is_reachable(0, 3));

    // The tour still visits everything; the route walks the two stored
    // segments (5 cells each) and omits the excluded edges entirely.
    assert_eq!(plan.tour.order, vec![0, 2, 1, 3, 0]);
    assert!(plan.tour.total_distance.is_infinite());
    assert_eq!(plan.route.points.len(), 10);
    assert_eq!(plan.route.total_cost, 8);
}
