use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::error::{GameError, Result};
use crate::{Coords, TermInt};

/// Set of objects occupying one playground square, packed into a byte.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cell(u8);

impl Cell {
    pub const EMPTY: Cell = Cell(0);
    pub const BORDER: Cell = Cell(1);
    pub const FOOD: Cell = Cell(2);
    pub const BOMB: Cell = Cell(4);
    /// Reserved, the game logic never sets it.
    pub const CLEAR: Cell = Cell(8);
    pub const SNAKE: Cell = Cell(16);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any of the flags in `other` are set.
    pub fn intersects(self, other: Cell) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: Cell) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Cell {
    type Output = Cell;

    fn bitor(self, rhs: Cell) -> Cell {
        Cell(self.0 | rhs.0)
    }
}

impl BitOrAssign for Cell {
    fn bitor_assign(&mut self, rhs: Cell) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Cell {
    type Output = Cell;

    fn bitand(self, rhs: Cell) -> Cell {
        Cell(self.0 & rhs.0)
    }
}

impl Not for Cell {
    type Output = Cell;

    fn not(self) -> Cell {
        Cell(!self.0)
    }
}

/// Rectangular array of cells. The outermost rows and columns are the border.
#[derive(Clone, Debug)]
pub struct Grid {
    rows: TermInt,
    cols: TermInt,
    cells: Vec<Cell>,
}

impl Grid {
    pub const MIN_SIZE: TermInt = 3;

    pub fn new(rows: TermInt, cols: TermInt) -> Result<Self> {
        if rows < Self::MIN_SIZE || cols < Self::MIN_SIZE {
            return Err(GameError::TooSmall { rows, cols });
        }

        let mut grid = Grid { rows, cols, cells: vec![Cell::EMPTY; rows as usize * cols as usize] };

        for col in 0..cols {
            grid.set((0, col), Cell::BORDER);
            grid.set((rows - 1, col), Cell::BORDER);
        }

        for row in 0..rows {
            grid.set((row, 0), Cell::BORDER);
            grid.set((row, cols - 1), Cell::BORDER);
        }

        Ok(grid)
    }

    pub fn rows(&self) -> TermInt {
        self.rows
    }

    pub fn cols(&self) -> TermInt {
        self.cols
    }

    pub fn get(&self, pos: Coords) -> Cell {
        self.cells[self.index(pos)]
    }

    pub fn set(&mut self, pos: Coords, cell: Cell) {
        let i = self.index(pos);
        self.cells[i] = cell;
    }

    pub fn is_border(&self, (row, col): Coords) -> bool {
        row == 0 || col == 0 || row >= self.rows - 1 || col >= self.cols - 1
    }

    /// All positions that are not part of the border frame.
    pub fn interior(&self) -> impl Iterator<Item = Coords> + '_ {
        (1..self.rows - 1).flat_map(move |row| (1..self.cols - 1).map(move |col| (row, col)))
    }

    fn index(&self, (row, col): Coords) -> usize {
        self.cols as usize * row as usize + col as usize
    }
}
