//! Versioned binary cache for the pair matrices.
//!
//! Layout (little-endian): the magic bytes `J` `P` `S` `0x01`, a u32 format
//! version, the u64 grid content hash, a u32 POI count, poi_count² f32
//! distances in row-major order, then one path record per cell: a u16 point
//! count, the points as i16 x/y pairs, and an i16 total cost. A zero point
//! count means the cell holds no path and carries no further bytes.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use grid_util::point::Point;
use log::{debug, warn};

use crate::error::Error;
use crate::grid::PoiGrid;
use crate::jps::GridPath;
use crate::matrix::PairMatrices;

pub const CACHE_MAGIC: [u8; 4] = [b'J', b'P', b'S', 0x01];
pub const CACHE_VERSION: u32 = 3;
pub const CACHE_EXTENSION: &str = "jps";

/// Handle to a cache file location.
#[derive(Clone, Debug)]
pub struct MatrixCache {
    path: PathBuf,
}

impl MatrixCache {
    pub fn new(path: impl Into<PathBuf>) -> MatrixCache {
        MatrixCache { path: path.into() }
    }

    /// Conventional per-layout location: a file named after the grid's
    /// content hash inside `dir`.
    pub fn for_grid(dir: &Path, grid: &PoiGrid) -> MatrixCache {
        MatrixCache {
            path: dir.join(format!("{:016x}.{}", grid.content_hash(), CACHE_EXTENSION)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attempts to read matrices for `grid`. Any mismatch against the live
    /// grid (magic, version, stored hash, POI count) and any unreadable or
    /// truncated file is a miss, meaning "recompute from scratch", never an
    /// error.
    pub fn load(&self, grid: &PoiGrid) -> Option<PairMatrices> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                debug!("no matrix cache at {}: {}", self.path.display(), err);
                return None;
            }
        };
        match read_matrices(&mut BufReader::new(file), grid) {
            Ok(matrices) => matrices,
            Err(err) => {
                warn!(
                    "discarding unreadable matrix cache {}: {}",
                    self.path.display(),
                    err
                );
                None
            }
        }
    }

    /// Writes the matrices keyed by the grid's current hash. Best-effort:
    /// callers treat a failure as a warning, the in-memory result stays
    /// valid either way.
    pub fn save(&self, grid: &PoiGrid, matrices: &PairMatrices) -> Result<(), Error> {
        write_matrices(grid, matrices, &self.path).map_err(|source| Error::Cache {
            path: self.path.clone(),
            source,
        })
    }
}

fn read_matrices<R: Read>(reader: &mut R, grid: &PoiGrid) -> io::Result<Option<PairMatrices>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != CACHE_MAGIC {
        debug!("matrix cache magic mismatch");
        return Ok(None);
    }
    let version = read_u32(reader)?;
    if version != CACHE_VERSION {
        debug!("matrix cache version {} (want {})", version, CACHE_VERSION);
        return Ok(None);
    }
    let stored_hash = read_u64(reader)?;
    if stored_hash != grid.content_hash() {
        debug!("matrix cache was built for a different grid layout");
        return Ok(None);
    }
    let poi_count = read_u32(reader)? as usize;
    if poi_count != grid.pois().len() {
        debug!(
            "matrix cache holds {} POIs, the grid has {}",
            poi_count,
            grid.pois().len()
        );
        return Ok(None);
    }

    let mut matrices = PairMatrices::new(poi_count);
    for from in 0..poi_count {
        for to in 0..poi_count {
            matrices.distances.set(from, to, read_f32(reader)?);
        }
    }
    let mut records: Vec<Option<GridPath>> = Vec::with_capacity(poi_count * poi_count);
    for _ in 0..poi_count * poi_count {
        records.push(read_path(reader)?);
    }
    // The save path writes one shared path into both cells of a pair;
    // collapse the twin records back into a single shared handle.
    for from in 0..poi_count {
        for to in from..poi_count {
            let Some(path) = records[from * poi_count + to].take() else {
                continue;
            };
            let path = Arc::new(path);
            if from == to {
                matrices.paths.set(from, to, path);
            } else {
                matrices.paths.set_shared(from, to, path);
            }
        }
    }
    Ok(Some(matrices))
}

fn read_path<R: Read>(reader: &mut R) -> io::Result<Option<GridPath>> {
    let count = read_u16(reader)? as usize;
    if count == 0 {
        return Ok(None);
    }
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let x = read_i16(reader)? as i32;
        let y = read_i16(reader)? as i32;
        points.push(Point::new(x, y));
    }
    let total_cost = read_i16(reader)? as i32;
    Ok(Some(GridPath { points, total_cost }))
}

fn write_matrices(grid: &PoiGrid, matrices: &PairMatrices, path: &Path) -> io::Result<()> {
    let n = matrices.distances.size();
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&CACHE_MAGIC)?;
    writer.write_all(&CACHE_VERSION.to_le_bytes())?;
    writer.write_all(&grid.content_hash().to_le_bytes())?;
    writer.write_all(&(n as u32).to_le_bytes())?;
    for from in 0..n {
        for to in 0..n {
            writer.write_all(&matrices.distances.get(from, to).to_le_bytes())?;
        }
    }
    for from in 0..n {
        for to in 0..n {
            match matrices.paths.get(from, to) {
                Some(segment) => write_path(&mut writer, segment)?,
                None => writer.write_all(&0u16.to_le_bytes())?,
            }
        }
    }
    writer.flush()
}

fn write_path<W: Write>(writer: &mut W, path: &GridPath) -> io::Result<()> {
    let count = u16::try_from(path.points.len())
        .map_err(|_| invalid_data("path longer than the u16 record limit"))?;
    writer.write_all(&count.to_le_bytes())?;
    for p in &path.points {
        writer.write_all(&narrow_i16(p.x)?.to_le_bytes())?;
        writer.write_all(&narrow_i16(p.y)?.to_le_bytes())?;
    }
    writer.write_all(&narrow_i16(path.total_cost)?.to_le_bytes())?;
    Ok(())
}

fn narrow_i16(value: i32) -> io::Result<i16> {
    i16::try_from(value).map_err(|_| invalid_data("value outside the i16 record range"))
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_i16<R: Read>(reader: &mut R) -> io::Result<i16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}
