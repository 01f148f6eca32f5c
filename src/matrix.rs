//! All-pairs path and distance computation between points of interest.

use std::sync::Arc;

use grid_util::point::Point;
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;

use crate::cache::MatrixCache;
use crate::grid::PoiGrid;
use crate::jps::{GridPath, Pathfinder};

/// Flattened square cost matrix over POI indices, row-major. Entries start
/// out unreachable (infinite) and stay that way for pairs the builder
/// skipped or could not connect. Symmetric by construction: one search
/// populates both cells of a pair.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    size: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    pub fn new(size: usize) -> DistanceMatrix {
        DistanceMatrix {
            size,
            data: vec![f32::INFINITY; size * size],
        }
    }

    /// Number of POIs (the matrix is `size`×`size`).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> f32 {
        self.data[from * self.size + to]
    }

    pub fn set(&mut self, from: usize, to: usize, cost: f32) {
        self.data[from * self.size + to] = cost;
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.get(from, to).is_finite()
    }
}

/// Flattened table of the segment paths behind the distance matrix. The two
/// cells of an unordered pair hold handles to one shared path, so each path
/// is stored, and eventually released, exactly once.
#[derive(Clone, Debug)]
pub struct PathTable {
    size: usize,
    slots: Vec<Option<Arc<GridPath>>>,
}

impl PathTable {
    pub fn new(size: usize) -> PathTable {
        PathTable {
            size,
            slots: vec![None; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> Option<&Arc<GridPath>> {
        self.slots[from * self.size + to].as_ref()
    }

    pub fn set(&mut self, from: usize, to: usize, path: Arc<GridPath>) {
        self.slots[from * self.size + to] = Some(path);
    }

    /// Stores one path for both orientations of a pair.
    pub fn set_shared(&mut self, a: usize, b: usize, path: Arc<GridPath>) {
        self.slots[a * self.size + b] = Some(Arc::clone(&path));
        self.slots[b * self.size + a] = Some(path);
    }
}

/// Distance matrix and path table produced by [build_all_pairs]. Created
/// once per run, by computation or cache load, and dropped together.
#[derive(Clone, Debug)]
pub struct PairMatrices {
    pub distances: DistanceMatrix,
    pub paths: PathTable,
}

impl PairMatrices {
    pub fn new(size: usize) -> PairMatrices {
        PairMatrices {
            distances: DistanceMatrix::new(size),
            paths: PathTable::new(size),
        }
    }
}

fn euclidean(a: &Point, b: &Point) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Computes paths and distances for every POI pair within `cutoff` (straight
/// line). One search serves both orientations of a pair, and the diagonal
/// gets trivial zero-cost paths without searching. With a cache handle the
/// result is loaded from disk when the stored grid still matches, and
/// written back after a fresh computation.
pub fn build_all_pairs(grid: &PoiGrid, cutoff: f32, cache: Option<&MatrixCache>) -> PairMatrices {
    if let Some(cache) = cache {
        if let Some(hit) = cache.load(grid) {
            info!(
                "loaded {0}x{0} pair matrices from cache",
                hit.distances.size()
            );
            return hit;
        }
    }

    let pois = grid.pois();
    let n = pois.len();
    let mut result = PairMatrices::new(n);
    let finder = Pathfinder::new(grid);

    // The straight-line cutoff and the component check only ever skip
    // pairs; a matrix entry always carries the searched path cost, never
    // the Euclidean value.
    let pairs: Vec<(usize, usize)> = (0..n)
        .tuple_combinations()
        .filter(|&(i, j)| euclidean(&pois[i], &pois[j]) <= cutoff)
        .filter(|&(i, j)| finder.reachable(pois[i], pois[j]))
        .collect();

    // Every pair's search is independent. Results are collected and written
    // back in pair order, keeping the layout deterministic regardless of
    // how the pool schedules them.
    let found: Vec<(usize, usize, Option<GridPath>)> = pairs
        .into_par_iter()
        .map(|(i, j)| {
            let path = finder.find_path(pois[i], pois[j]);
            (i, j, path)
        })
        .collect();

    let mut connected = 0usize;
    for (i, j, path) in found {
        let Some(path) = path else { continue };
        result.distances.set(i, j, path.total_cost as f32);
        result.distances.set(j, i, path.total_cost as f32);
        result.paths.set_shared(i, j, Arc::new(path));
        connected += 1;
    }
    for (i, poi) in pois.iter().enumerate() {
        result.distances.set(i, i, 0.0);
        result.paths.set(i, i, Arc::new(GridPath::trivial(*poi)));
    }
    info!("pair matrices built: {} POIs, {} connected pairs", n, connected);

    if let Some(cache) = cache {
        if let Err(err) = cache.save(grid, &result) {
            warn!("could not write matrix cache: {}", err);
        }
    }
    result
}
