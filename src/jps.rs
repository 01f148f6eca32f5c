//! Cardinal-movement jump point search between grid cells.
//!
//! Runs of obstacle-free straight movement are skipped instead of being
//! expanded cell by cell: a run only surfaces a search node at the goal, at
//! a forced cell (an obstacle directly beside the run), or at a cell whose
//! perpendicular probe can reach such a cell. Connected components over the
//! walkable cells are precomputed so that pairs with no path are rejected
//! without flooding the map.

use grid_util::point::Point;
use log::debug;
use petgraph::unionfind::UnionFind;

use crate::grid::{CellKind, PoiGrid};
use crate::search::best_first_search;

/// The four movement directions in the order east, north, west, south.
const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

#[inline]
fn step(p: Point, dir: usize) -> Point {
    let (dx, dy) = DIRECTIONS[dir];
    Point::new(p.x + dx, p.y + dy)
}

#[inline]
fn perpendicular(dir: usize) -> (usize, usize) {
    ((dir + 1) % 4, (dir + 3) % 4)
}

/// Direction index of the straight run from `from` to `to`.
fn direction_between(from: &Point, to: &Point) -> usize {
    match ((to.x - from.x).signum(), (to.y - from.y).signum()) {
        (0, 1) => 1,
        (-1, 0) => 2,
        (0, -1) => 3,
        _ => 0,
    }
}

fn manhattan(a: &Point, b: &Point) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// A concrete route between two cells: the full cell sequence and the summed
/// step cost. Non-empty for any found route; a trivial path (start equals
/// goal) is a single point with cost zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridPath {
    pub points: Vec<Point>,
    pub total_cost: i32,
}

impl GridPath {
    pub fn trivial(p: Point) -> GridPath {
        GridPath {
            points: vec![p],
            total_cost: 0,
        }
    }
}

/// Expands a chain of jump point waypoints into a path that can be followed
/// cell by cell.
pub fn waypoints_to_path(waypoints: Vec<Point>) -> Vec<Point> {
    let mut path: Vec<Point> = Vec::new();
    for next in waypoints {
        match path.last().copied() {
            None => path.push(next),
            Some(mut current) => {
                while current != next {
                    current = Point::new(
                        current.x + (next.x - current.x).signum(),
                        current.y + (next.y - current.y).signum(),
                    );
                    path.push(current);
                }
            }
        }
    }
    path
}

/// Shortest-path searcher over a borrowed [PoiGrid]. Building one
/// precomputes the connected components; all searches afterwards are
/// read-only, so a single instance can serve many pairs concurrently.
pub struct Pathfinder<'a> {
    grid: &'a PoiGrid,
    components: UnionFind<usize>,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a PoiGrid) -> Pathfinder<'a> {
        let mut components = UnionFind::new(grid.width() * grid.height());
        for y in 0..grid.height() as i32 {
            for x in 0..grid.width() as i32 {
                let p = Point::new(x, y);
                if !grid.is_walkable(p) {
                    continue;
                }
                for q in [Point::new(x + 1, y), Point::new(x, y + 1)] {
                    if grid.is_walkable(q) {
                        components.union(cell_index(grid, p), cell_index(grid, q));
                    }
                }
            }
        }
        Pathfinder { grid, components }
    }

    /// Whether two walkable cells lie in the same connected component.
    pub fn reachable(&self, a: Point, b: Point) -> bool {
        self.grid.is_walkable(a)
            && self.grid.is_walkable(b)
            && self
                .components
                .equiv(cell_index(self.grid, a), cell_index(self.grid, b))
    }

    fn obstacle_at(&self, p: Point) -> bool {
        self.grid.in_bounds(p) && self.grid.kind(p) == CellKind::Obstacle
    }

    /// A cell is forced for a run direction when an in-bounds obstacle sits
    /// directly to either side: a turn may become both viable and necessary
    /// there, so the run has to surface a decision point.
    fn is_forced(&self, p: Point, dir: usize) -> bool {
        let (left, right) = perpendicular(dir);
        self.obstacle_at(step(p, left)) || self.obstacle_at(step(p, right))
    }

    /// Straight probe without further branching: reports whether a run in
    /// `dir` reaches the goal or a forced cell before being blocked.
    fn probe(&self, from: Point, dir: usize, goal: Point) -> bool {
        let mut current = from;
        loop {
            current = step(current, dir);
            if !self.grid.is_walkable(current) {
                return false;
            }
            if current == goal || self.is_forced(current, dir) {
                return true;
            }
        }
    }

    /// Advances from `from` along `dir` until a jump point is found,
    /// returning it with the run cost, or [None] when the run dead-ends.
    fn jump(&self, from: Point, dir: usize, goal: Point) -> Option<(Point, i32)> {
        let (left, right) = perpendicular(dir);
        let mut current = from;
        let mut cost = 0;
        loop {
            current = step(current, dir);
            if !self.grid.is_walkable(current) {
                return None;
            }
            cost += 1;
            if current == goal || self.is_forced(current, dir) {
                return Some((current, cost));
            }
            // A goal or forced cell off to the side would otherwise be
            // passed by, since runs only ever move along one axis.
            if self.probe(current, left, goal) || self.probe(current, right, goal) {
                return Some((current, cost));
            }
        }
    }

    fn successors(&self, parent: Option<&Point>, node: &Point, goal: Point) -> Vec<(Point, i32)> {
        match parent {
            Some(parent) => {
                let dir = direction_between(parent, node);
                let (left, right) = perpendicular(dir);
                let mut found = Vec::new();
                for d in [dir, left, right] {
                    if self.grid.is_walkable(step(*node, d)) {
                        if let Some(jump_point) = self.jump(*node, d, goal) {
                            found.push(jump_point);
                        }
                    }
                }
                found
            }
            // The start has no travel direction yet; expand its raw
            // neighborhood.
            None => (0..4)
                .map(|d| step(*node, d))
                .filter(|p| self.grid.is_walkable(*p))
                .map(|p| (p, 1))
                .collect(),
        }
    }

    /// Cost-optimal path between two walkable cells, or [None] when the
    /// goal cannot be reached. An unreachable goal is an expected outcome
    /// for the caller, not an error.
    pub fn find_path(&self, start: Point, goal: Point) -> Option<GridPath> {
        if !self.grid.is_walkable(start) || !self.grid.is_walkable(goal) {
            return None;
        }
        if start == goal {
            return Some(GridPath::trivial(start));
        }
        if !self.reachable(start, goal) {
            debug!("{:?} and {:?} are on different components", start, goal);
            return None;
        }
        best_first_search(
            &start,
            |parent, node| self.successors(parent, node, goal),
            |node| manhattan(node, &goal),
            |node| *node == goal,
        )
        .map(|(waypoints, total_cost)| GridPath {
            points: waypoints_to_path(waypoints),
            total_cost,
        })
    }
}

fn cell_index(grid: &PoiGrid, p: Point) -> usize {
    p.y as usize * grid.width() + p.x as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_follows_grid(grid: &PoiGrid, path: &GridPath) {
        assert_eq!(path.total_cost as usize, path.points.len() - 1);
        for pair in path.points.windows(2) {
            assert_eq!(manhattan(&pair[0], &pair[1]), 1);
            assert!(grid.is_walkable(pair[1]));
        }
    }

    #[test]
    fn straight_line_on_open_grid() {
        let grid = PoiGrid::new(5, 5, 1.0);
        let finder = Pathfinder::new(&grid);
        let path = finder
            .find_path(Point::new(0, 0), Point::new(4, 0))
            .unwrap();
        assert_eq!(path.total_cost, 4);
        assert!(path.points.iter().all(|p| p.y == 0));
        assert_follows_grid(&grid, &path);
    }

    #[test]
    fn detour_through_the_gap() {
        // A wall on x = 2 with a single gap at the top; the straight-line
        // distance is 4, the true cost is the detour through the gap.
        let grid = PoiGrid::from_ascii(&[
            "..#..", //
            "..#..",
            "..#..",
            "..#..",
            ".....",
        ], 1.0);
        let finder = Pathfinder::new(&grid);
        let path = finder
            .find_path(Point::new(0, 2), Point::new(4, 2))
            .unwrap();
        assert_eq!(path.total_cost, 8);
        assert!(path.points.contains(&Point::new(2, 4)));
        assert_follows_grid(&grid, &path);
    }

    #[test]
    fn trivial_path_for_identical_endpoints() {
        let grid = PoiGrid::new(3, 3, 1.0);
        let finder = Pathfinder::new(&grid);
        let path = finder
            .find_path(Point::new(1, 1), Point::new(1, 1))
            .unwrap();
        assert_eq!(path.points, vec![Point::new(1, 1)]);
        assert_eq!(path.total_cost, 0);
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let grid = PoiGrid::from_ascii(&[
            ".....", //
            ".###.",
            ".#.#.",
            ".###.",
            ".....",
        ], 1.0);
        let finder = Pathfinder::new(&grid);
        assert!(!finder.reachable(Point::new(0, 0), Point::new(2, 2)));
        assert!(finder.find_path(Point::new(0, 0), Point::new(2, 2)).is_none());
    }

    #[test]
    fn corner_to_corner_cost() {
        let grid = PoiGrid::new(6, 6, 1.0);
        let finder = Pathfinder::new(&grid);
        let path = finder
            .find_path(Point::new(0, 0), Point::new(5, 5))
            .unwrap();
        assert_eq!(path.total_cost, 10);
        assert_follows_grid(&grid, &path);
    }

    #[test]
    fn waypoint_expansion_fills_runs() {
        let expanded = waypoints_to_path(vec![
            Point::new(0, 0),
            Point::new(3, 0),
            Point::new(3, 2),
        ]);
        assert_eq!(
            expanded,
            vec![
                Point::new(0, 0),
                Point::new(1, 0),
                Point::new(2, 0),
                Point::new(3, 0),
                Point::new(3, 1),
                Point::new(3, 2),
            ]
        );
    }
}
