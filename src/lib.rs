//! # grid_tour
//!
//! Obstacle-aware closed-tour planning on uniform-cost grids. Shortest
//! paths between points of interest are found with a cardinal-movement
//! [Jump Point Search](https://en.wikipedia.org/wiki/Jump_point_search)
//! variant, the pairwise costs are assembled into a distance matrix backed
//! by a versioned on-disk cache, a closed tour over that matrix is solved
//! by delegating to an external
//! [LKH](http://webhotel4.ruc.dk/~keld/research/LKH/) process (with a
//! built-in nearest-neighbour fallback), and the tour's segment paths are
//! stitched into one continuous route.
//!
//! The stages are also usable on their own: [build_all_pairs],
//! [solve_tour] and [reconstruct_route] are the seams between them.

pub mod cache;
pub mod error;
pub mod grid;
pub mod jps;
pub mod lkh;
pub mod matrix;
pub mod route;
mod search;
pub mod tour;

pub use cache::MatrixCache;
pub use error::{Error, Result};
pub use grid::{CellKind, PoiGrid};
pub use jps::{GridPath, Pathfinder};
pub use lkh::LkhConfig;
pub use matrix::{build_all_pairs, DistanceMatrix, PairMatrices, PathTable};
pub use route::{reconstruct_route, Route};
pub use tour::{nearest_neighbor, solve_tour, Tour};

/// Settings for a full planning run.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// Straight-line prefilter for the pair matrix: pairs further apart
    /// than this are never searched. Infinite by default.
    pub euclidean_cutoff: f32,
    /// Cache location for the pair matrices, if any.
    pub cache: Option<MatrixCache>,
    pub lkh: LkhConfig,
}

impl Default for PlannerConfig {
    fn default() -> PlannerConfig {
        PlannerConfig {
            euclidean_cutoff: f32::INFINITY,
            cache: None,
            lkh: LkhConfig::default(),
        }
    }
}

/// Everything a planning run produces.
#[derive(Clone, Debug)]
pub struct TourPlan {
    pub matrices: PairMatrices,
    pub tour: Tour,
    pub route: Route,
}

/// Runs the whole pipeline: validates the POIs, builds (or loads) the pair
/// matrices, solves the closed tour and reconstructs the continuous route.
pub fn plan_route(grid: &PoiGrid, config: &PlannerConfig) -> Result<TourPlan> {
    grid.validate_pois()?;
    let matrices = build_all_pairs(grid, config.euclidean_cutoff, config.cache.as_ref());
    let tour = solve_tour(&matrices.distances, &config.lkh)?;
    let route = reconstruct_route(&tour, &matrices.paths);
    Ok(TourPlan {
        matrices,
        tour,
        route,
    })
}
