//! Terrain model: obstacle classification, points of interest and the
//! content hash used for cache invalidation.

use core::fmt;
use grid_util::point::Point;

use crate::error::Error;

/// Classification of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Free,
    Poi,
    Obstacle,
}

impl CellKind {
    fn code(self) -> u8 {
        match self {
            CellKind::Free => 0,
            CellKind::Poi => 1,
            CellKind::Obstacle => 2,
        }
    }

    fn from_code(code: u8) -> CellKind {
        match code {
            1 => CellKind::Poi,
            2 => CellKind::Obstacle,
            _ => CellKind::Free,
        }
    }
}

/// [PoiGrid] holds the obstacle layout, the ordered list of points of
/// interest and the physical edge length of one cell. It is populated by a
/// loader up front and borrowed read-only for the rest of a planning run.
#[derive(Clone, Debug)]
pub struct PoiGrid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    pois: Vec<Point>,
    cell_size: f32,
}

impl PoiGrid {
    pub fn new(width: usize, height: usize, cell_size: f32) -> PoiGrid {
        PoiGrid {
            width,
            height,
            cells: vec![CellKind::Free.code(); width * height],
            pois: Vec::new(),
            cell_size,
        }
    }

    /// Builds a grid from a character map: `#` marks an obstacle, `P` a
    /// point of interest, anything else a free cell. Row 0 is y = 0; POIs
    /// are numbered in reading order.
    pub fn from_ascii(rows: &[&str], cell_size: f32) -> PoiGrid {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        let mut grid = PoiGrid::new(width, height, cell_size);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                match c {
                    '#' => grid.set_obstacle(x, y),
                    'P' => {
                        grid.add_poi(Point::new(x as i32, y as i32));
                    }
                    _ => {}
                }
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Edge length of one cell in world units.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// The points of interest in their fixed visiting-index order.
    pub fn pois(&self) -> &[Point] {
        &self.pois
    }

    pub fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width() && (p.y as usize) < self.height()
    }

    fn code_at(&self, x: usize, y: usize) -> u8 {
        self.cells[y * self.width + x]
    }

    /// Classification of an in-bounds cell.
    pub fn kind(&self, p: Point) -> CellKind {
        CellKind::from_code(self.code_at(p.x as usize, p.y as usize))
    }

    /// A cell can be traversed if it is inside the grid and not an obstacle.
    pub fn is_walkable(&self, p: Point) -> bool {
        self.in_bounds(p) && self.kind(p) != CellKind::Obstacle
    }

    pub fn set_obstacle(&mut self, x: usize, y: usize) {
        self.cells[y * self.width + x] = CellKind::Obstacle.code();
    }

    /// Marks a cell as a point of interest, appends it to the POI list and
    /// returns its index. An out-of-bounds point is still recorded so that
    /// [validate_pois](Self::validate_pois) can report it.
    pub fn add_poi(&mut self, p: Point) -> usize {
        if self.in_bounds(p) {
            self.cells[p.y as usize * self.width + p.x as usize] = CellKind::Poi.code();
        }
        self.pois.push(p);
        self.pois.len() - 1
    }

    /// Deterministic fingerprint of the cell layout and POI count. Used only
    /// for cache invalidation; a collision can mask a stale cache, which is
    /// an accepted risk.
    pub fn content_hash(&self) -> u64 {
        let mut hash: u64 = 0;
        for y in 0..self.height() {
            for x in 0..self.width() {
                hash = hash.wrapping_mul(31).wrapping_add(self.code_at(x, y) as u64);
            }
        }
        hash.wrapping_mul(31).wrapping_add(self.pois.len() as u64)
    }

    /// Center of a cell in world units.
    pub fn cell_center(&self, p: Point) -> (f32, f32) {
        (
            (p.x as f32 + 0.5) * self.cell_size,
            (p.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// The cell containing a world coordinate.
    pub fn world_to_cell(&self, x: f32, y: f32) -> Point {
        Point::new(
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Checks that every point of interest is in bounds, off obstacles and
    /// marked as a POI cell. The pipeline refuses to start on the first
    /// offending point.
    pub fn validate_pois(&self) -> Result<(), Error> {
        for (index, p) in self.pois.iter().enumerate() {
            if !self.in_bounds(*p) {
                return Err(Error::PoiOutOfBounds {
                    index,
                    x: p.x,
                    y: p.y,
                    width: self.width(),
                    height: self.height(),
                });
            }
            match self.kind(*p) {
                CellKind::Obstacle => {
                    return Err(Error::PoiOnObstacle { index, x: p.x, y: p.y })
                }
                CellKind::Free => return Err(Error::PoiUnmarked { index, x: p.x, y: p.y }),
                CellKind::Poi => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for PoiGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for y in 0..self.height() {
            for x in 0..self.width() {
                let c = match CellKind::from_code(self.code_at(x, y)) {
                    CellKind::Free => '.',
                    CellKind::Poi => 'P',
                    CellKind::Obstacle => '#',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
