use glam::IVec2;
use serde::{Deserialize, Serialize};

/// Direction in which a product travels through a port.
///
/// Variants are ordered clockwise (in screen space, +y pointing down), so a
/// quarter turn to the right is `index + 1 (mod 4)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Left,
    Up,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Left,
        Direction::Up,
        Direction::Right,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Down => 0,
            Self::Left => 1,
            Self::Up => 2,
            Self::Right => 3,
        }
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }

    pub fn rotate_cw(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn rotate_ccw(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Grid-space unit step in the direction of travel: +x = right, +y = down.
    pub fn offset(self) -> IVec2 {
        match self {
            Self::Down => IVec2::new(0, 1),
            Self::Left => IVec2::new(-1, 0),
            Self::Up => IVec2::new(0, -1),
            Self::Right => IVec2::new(1, 0),
        }
    }
}

/// Whether a port receives or sends products.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

/// A port on a structure: a cell offset inside the footprint plus the
/// direction products travel when they pass through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    /// Cell offset from the structure's top-left corner (x = column, y = row).
    pub offset: IVec2,
    pub direction: Direction,
}

impl Transfer {
    pub fn new(x: i32, y: i32, direction: Direction) -> Self {
        Self {
            offset: IVec2::new(x, y),
            direction,
        }
    }

    /// Port after a clockwise quarter turn of a footprint `height` rows tall.
    pub fn rotated_cw(self, height: usize) -> Self {
        Self {
            offset: IVec2::new(height as i32 - 1 - self.offset.y, self.offset.x),
            direction: self.direction.rotate_cw(),
        }
    }

    /// Port after a counter-clockwise quarter turn of a footprint `width` columns wide.
    pub fn rotated_ccw(self, width: usize) -> Self {
        Self {
            offset: IVec2::new(self.offset.y, width as i32 - 1 - self.offset.x),
            direction: self.direction.rotate_ccw(),
        }
    }

    /// Absolute grid position of this port for a structure whose origin is at `origin`.
    pub fn at(self, origin: IVec2) -> IVec2 {
        origin + self.offset
    }
}

/// A cell that carries its own orientation and turns along with its grid.
pub trait Rotate {
    fn rotate_cw(&mut self);
    fn rotate_ccw(&mut self);
}

/// Row-major H×W matrix of optional cells. Empty cells are part of the
/// bounding box but occupy nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid<T> {
    height: usize,
    width: usize,
    cells: Vec<Option<T>>,
}

impl<T> TileGrid<T> {
    /// Build a grid from rows. Rows shorter than the first are padded with
    /// empty cells, longer ones are truncated.
    pub fn from_rows(rows: Vec<Vec<Option<T>>>) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(height * width);
        for row in rows {
            let mut row = row.into_iter();
            for _ in 0..width {
                cells.push(row.next().flatten());
            }
        }
        Self {
            height,
            width,
            cells,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.cells[row * self.width + col].as_ref()
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.cells[row * self.width + col].as_mut()
    }

    /// Occupied cells as `(row, col, cell)`, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, c)| c.as_ref().map(|c| (i / width, i % width, c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width.max(1);
        self.cells
            .iter_mut()
            .enumerate()
            .filter_map(move |(i, c)| c.as_mut().map(|c| (i / width, i % width, c)))
    }

    /// Same shape, each occupied cell mapped through `f`.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> TileGrid<U> {
        TileGrid {
            height: self.height,
            width: self.width,
            cells: self.cells.iter().map(|c| c.as_ref().map(&mut f)).collect(),
        }
    }
}

impl<T: Rotate> TileGrid<T> {
    /// Quarter turn clockwise: `new[j][H-1-i] = old[i][j]`.
    pub fn rotate_cw(&mut self) {
        let (h, w) = (self.height, self.width);
        self.rearrange(|i, j| (j, h - 1 - i), Rotate::rotate_cw);
        self.height = w;
        self.width = h;
    }

    /// Quarter turn counter-clockwise: `new[W-1-j][i] = old[i][j]`.
    pub fn rotate_ccw(&mut self) {
        let (h, w) = (self.height, self.width);
        self.rearrange(|i, j| (w - 1 - j, i), Rotate::rotate_ccw);
        self.height = w;
        self.width = h;
    }

    /// Move every cell to `target(row, col)` in the transposed-size grid,
    /// turning occupied cells with `turn`.
    fn rearrange(&mut self, target: impl Fn(usize, usize) -> (usize, usize), turn: fn(&mut T)) {
        let (h, w) = (self.height, self.width);
        let old = std::mem::take(&mut self.cells);
        let mut rotated: Vec<Option<T>> = (0..old.len()).map(|_| None).collect();
        for (index, cell) in old.into_iter().enumerate() {
            let Some(mut cell) = cell else { continue };
            turn(&mut cell);
            let (row, col) = target(index / w, index % w);
            // New grid is w rows by h columns.
            rotated[row * h + col] = Some(cell);
        }
        self.cells = rotated;
    }
}
