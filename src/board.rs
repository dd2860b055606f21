//! Playfield grid, collision detection and row clearing

use crate::tetromino::{Shape, TetrominoType};

/// Standard board dimensions
pub const COLS: usize = 10;
pub const ROWS: usize = 20;

/// A cell on the board - either empty or filled by a piece type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(TetrominoType),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Cell::Filled(_))
    }

    /// Persisted cell code, 0 for empty
    pub fn code(&self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Filled(t) => t.code(),
        }
    }

    pub fn from_code(code: u8) -> Option<Cell> {
        if code == 0 {
            return Some(Cell::Empty);
        }
        TetrominoType::from_code(code).map(Cell::Filled)
    }
}

/// The game board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Grid stored as [row][col], row 0 is the top, rows increase downward
    cells: [[Cell; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; COLS]; ROWS],
        }
    }

    /// Get the cell at (x, y), `None` when out of bounds
    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        let (x, y) = Self::index(x, y)?;
        Some(self.cells[y][x])
    }

    fn index(x: i32, y: i32) -> Option<(usize, usize)> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= COLS || y >= ROWS {
            return None;
        }
        Some((x, y))
    }

    /// True when every cell of `shape` placed at (x, y) is on the board and empty
    pub fn is_valid(&self, x: i32, y: i32, shape: &Shape) -> bool {
        shape
            .iter()
            .all(|&(dx, dy)| matches!(self.get(x.saturating_add(dx), y.saturating_add(dy)), Some(Cell::Empty)))
    }

    /// Paint `shape` at (x, y). Cells falling outside the board are skipped.
    pub fn place(&mut self, x: i32, y: i32, shape: &Shape, piece_type: TetrominoType) {
        for &(dx, dy) in shape {
            if let Some((col, row)) = Self::index(x.saturating_add(dx), y.saturating_add(dy)) {
                self.cells[row][col] = Cell::Filled(piece_type);
            }
        }
    }

    /// Fill a whole row with one type (game-over curtain)
    pub fn fill_row(&mut self, row: usize, piece_type: TetrominoType) {
        if let Some(cells) = self.cells.get_mut(row) {
            *cells = [Cell::Filled(piece_type); COLS];
        }
    }

    /// Full rows, bottom row first
    pub fn find_full_rows(&self) -> Vec<usize> {
        (0..ROWS).rev().filter(|&row| self.is_row_full(row)).collect()
    }

    /// Remove the given rows and drop everything above them.
    ///
    /// Rows are removed smallest index first: deleting a row only moves the
    /// rows above it, so larger indices still point at the right row.
    pub fn collapse_rows(&mut self, rows: &[usize]) {
        let mut sorted: Vec<usize> = rows.iter().copied().filter(|&r| r < ROWS).collect();
        sorted.sort_unstable();
        sorted.dedup();

        for target in sorted {
            for row in (1..=target).rev() {
                self.cells[row] = self.cells[row - 1];
            }
            self.cells[0] = [Cell::Empty; COLS];
        }
    }

    /// Clear every cell
    pub fn reset(&mut self) {
        self.cells = [[Cell::Empty; COLS]; ROWS];
    }

    fn is_row_full(&self, row: usize) -> bool {
        self.cells[row].iter().all(|cell| cell.is_filled())
    }

    pub fn is_empty(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|cell| cell.is_empty()))
    }

    /// Rows from top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[Cell; COLS]> {
        self.cells.iter()
    }

    /// Cell codes in column-major order (x outer, y inner)
    pub fn to_codes(&self) -> Vec<u8> {
        let mut codes = Vec::with_capacity(COLS * ROWS);
        for x in 0..COLS {
            for y in 0..ROWS {
                codes.push(self.cells[y][x].code());
            }
        }
        codes
    }

    /// Inverse of [`Board::to_codes`]. Rejects anything but exactly
    /// `COLS * ROWS` known codes.
    pub fn from_codes(codes: &[u8]) -> Option<Board> {
        if codes.len() != COLS * ROWS {
            return None;
        }
        let mut board = Board::new();
        for (i, &code) in codes.iter().enumerate() {
            let (x, y) = (i / ROWS, i % ROWS);
            board.cells[y][x] = Cell::from_code(code)?;
        }
        Some(board)
    }
}
