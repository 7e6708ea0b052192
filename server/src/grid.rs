//! Tile map generation and queries.
//!
//! The map is a fixed lattice of indestructible walls (the border plus every
//! cell with even x and even y) with destructible soft blocks scattered over
//! the remaining cells. Two 3×3 corners next to the primary spawns are always
//! left open so the first two players can move and bomb safely.

use rand::Rng;
use shared::Cell;

/// Side length of the open square kept in the top-left and bottom-right.
const SAFE_ZONE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Builds a fresh map: structural walls plus soft blocks seeded with
    /// probability `density` outside the safe zones.
    pub fn generate<R: Rng + ?Sized>(width: usize, height: usize, density: f64, rng: &mut R) -> Self {
        let density = density.clamp(0.0, 1.0);
        let mut cells = Vec::with_capacity(width * height);

        for y in 0..height {
            for x in 0..width {
                let cell = if is_structural_wall(x, y, width, height) {
                    Cell::Wall
                } else if !in_safe_zone(x, y, width, height) && rng.gen_bool(density) {
                    Cell::SoftBlock
                } else {
                    Cell::Empty
                };
                cells.push(cell);
            }
        }

        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Cell at `(x, y)`, or `None` outside the map.
    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Overwrites a cell. Returns false when `(x, y)` is off the map.
    pub fn set(&mut self, x: i32, y: i32, cell: Cell) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Walls stop blasts; anything off the map counts as wall.
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.get(x, y).map_or(true, |cell| cell == Cell::Wall)
    }

    pub fn is_soft_block(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == Some(Cell::SoftBlock)
    }

    /// Whether a player may not stand on this cell.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.get(x, y).map_or(true, |cell| cell != Cell::Empty)
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|c| **c == cell).count()
    }

    /// Row-major cell codes, as sent to clients.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|cell| cell.code()).collect())
            .collect()
    }
}

pub fn is_structural_wall(x: usize, y: usize, width: usize, height: usize) -> bool {
    x == 0 || y == 0 || x + 1 == width || y + 1 == height || (x % 2 == 0 && y % 2 == 0)
}

fn in_safe_zone(x: usize, y: usize, width: usize, height: usize) -> bool {
    let top_left = x < SAFE_ZONE && y < SAFE_ZONE;
    let bottom_right = x + SAFE_ZONE + 1 > width && y + SAFE_ZONE + 1 > height;
    top_left || bottom_right
}

/// Position of the `index`-th cell in a clockwise spiral that starts at the
/// top-left corner and winds inward: top row left to right, right column
/// downward, bottom row right to left, left column upward, then the next
/// ring. Returns `None` once every cell has been visited.
pub fn spiral_cell(width: usize, height: usize, index: usize) -> Option<(usize, usize)> {
    let (mut top, mut left) = (0i64, 0i64);
    let (mut bottom, mut right) = (height as i64 - 1, width as i64 - 1);
    let mut remaining = index as i64;

    while top <= bottom && left <= right {
        let row_len = right - left + 1;
        if remaining < row_len {
            return Some(((left + remaining) as usize, top as usize));
        }
        remaining -= row_len;
        top += 1;

        let col_len = (bottom - top + 1).max(0);
        if remaining < col_len {
            return Some((right as usize, (top + remaining) as usize));
        }
        remaining -= col_len;
        right -= 1;

        // A lone remaining row or column must not be walked back over.
        if top <= bottom {
            let row_len = (right - left + 1).max(0);
            if remaining < row_len {
                return Some(((right - remaining) as usize, bottom as usize));
            }
            remaining -= row_len;
        }
        bottom -= 1;

        if left <= right {
            let col_len = (bottom - top + 1).max(0);
            if remaining < col_len {
                return Some((left as usize, (bottom - remaining) as usize));
            }
            remaining -= col_len;
        }
        left += 1;
    }

    None
}
