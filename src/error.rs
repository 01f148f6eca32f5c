//! Error taxonomy for the planning pipeline.
//!
//! Expected conditions are not represented here: unreachable pairs stay
//! infinite in the matrix, cache misses trigger recomputation and external
//! solver failures degrade to the built-in heuristic. What remains is
//! invalid input, the inability to produce any tour at all, and cache write
//! failures surfaced to callers who asked for a cache.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("POI {index} at ({x}, {y}) is outside the {width}x{height} grid")]
    PoiOutOfBounds {
        index: usize,
        x: i32,
        y: i32,
        width: usize,
        height: usize,
    },
    #[error("POI {index} at ({x}, {y}) collides with an obstacle")]
    PoiOnObstacle { index: usize, x: i32, y: i32 },
    #[error("POI {index} at ({x}, {y}) is not marked as a point of interest")]
    PoiUnmarked { index: usize, x: i32, y: i32 },
    #[error("cannot produce a tour for an empty set of points of interest")]
    EmptyPoiSet,
    #[error("matrix cache {path:?}: {source}")]
    Cache { path: PathBuf, source: io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
