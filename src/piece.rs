//! Active falling piece logic

use crate::board::{Board, COLS};
use crate::tetromino::{Rotation, RotationDirection, Shape, TetrominoType};

/// Horizontal nudges tried in order when a rotation is blocked.
/// The same list applies to every piece and every rotation transition.
pub const KICK_OFFSETS: [i32; 5] = [0, 1, -1, 2, -2];

/// Column the 4x4 shape box starts at when a piece spawns
pub const SPAWN_X: i32 = COLS as i32 / 2 - 2;
pub const SPAWN_Y: i32 = 0;

/// An active falling piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// The type of tetromino
    pub piece_type: TetrominoType,
    /// Current rotation state
    pub rotation: Rotation,
    /// Top-left corner of the shape box, y grows downward
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// Create a new piece at the spawn position
    pub fn new(piece_type: TetrominoType) -> Self {
        Self {
            piece_type,
            rotation: Rotation::North,
            x: SPAWN_X,
            y: SPAWN_Y,
        }
    }

    pub fn shape(&self) -> Shape {
        self.piece_type.shape(self.rotation)
    }

    /// Get the absolute (x, y) of all 4 blocks
    pub fn block_positions(&self) -> [(i32, i32); 4] {
        self.shape().map(|(dx, dy)| (self.x + dx, self.y + dy))
    }

    /// Whether the piece fits where it is
    pub fn fits(&self, board: &Board) -> bool {
        board.is_valid(self.x, self.y, &self.shape())
    }

    /// Whether the piece could move one row down
    pub fn can_fall(&self, board: &Board) -> bool {
        board.is_valid(self.x, self.y + 1, &self.shape())
    }

    /// Shift by (dx, dy) if the target fits. Leaves the piece alone otherwise.
    pub fn try_move(&mut self, dx: i32, dy: i32, board: &Board) -> bool {
        if board.is_valid(self.x + dx, self.y + dy, &self.shape()) {
            self.x += dx;
            self.y += dy;
            true
        } else {
            false
        }
    }

    /// Rotate, trying each horizontal kick in [`KICK_OFFSETS`] order.
    /// A rotation with no fitting kick changes nothing.
    pub fn try_rotate(&mut self, direction: RotationDirection, board: &Board) -> bool {
        let new_rotation = direction.apply(self.rotation);
        let new_shape = self.piece_type.shape(new_rotation);

        match KICK_OFFSETS
            .iter()
            .find(|&&kick| board.is_valid(self.x + kick, self.y, &new_shape))
        {
            Some(&kick) => {
                self.x += kick;
                self.rotation = new_rotation;
                true
            }
            None => false,
        }
    }

    /// Row the piece would land on if dropped straight down
    pub fn ghost_y(&self, board: &Board) -> i32 {
        let shape = self.shape();
        let mut ghost_y = self.y;
        while board.is_valid(self.x, ghost_y + 1, &shape) {
            ghost_y += 1;
        }
        ghost_y
    }

    /// Hard drop - move down as far as possible and return distance dropped
    pub fn hard_drop(&mut self, board: &Board) -> i32 {
        let landing = self.ghost_y(board);
        let distance = landing - self.y;
        self.y = landing;
        distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ROWS;

    fn block(board: &mut Board, x: i32, y: i32) {
        board.place(x, y, &[(0, 0); 4], TetrominoType::O);
    }

    #[test]
    fn test_spawn_position() {
        let piece = Piece::new(TetrominoType::T);
        assert_eq!((piece.x, piece.y), (3, 0));
        assert_eq!(piece.rotation, Rotation::North);
    }

    #[test]
    fn test_move_blocked_by_wall() {
        let board = Board::new();
        let mut piece = Piece::new(TetrominoType::O);
        // O occupies box columns 1..=2
        let mut moves = 0;
        while piece.try_move(-1, 0, &board) {
            moves += 1;
        }
        assert_eq!(moves, 4);
        assert_eq!(piece.x, -1);
        assert!(!piece.try_move(-1, 0, &board));
        assert_eq!(piece.x, -1);
    }

    #[test]
    fn test_rotation_without_kick() {
        let board = Board::new();
        let mut piece = Piece::new(TetrominoType::T);
        assert!(piece.try_rotate(RotationDirection::Clockwise, &board));
        assert_eq!(piece.rotation, Rotation::East);
        assert_eq!(piece.x, SPAWN_X);
        assert!(piece.try_rotate(RotationDirection::CounterClockwise, &board));
        assert_eq!(piece.rotation, Rotation::North);
    }

    fn j_west() -> Piece {
        Piece {
            piece_type: TetrominoType::J,
            rotation: Rotation::West,
            x: 3,
            y: 10,
        }
    }

    #[test]
    fn test_kick_prefers_right_over_left() {
        let mut board = Board::new();
        let north = TetrominoType::J.shape(Rotation::North);
        // The J hook corner at (3, 10) is only covered without a kick
        block(&mut board, 3, 10);
        assert!(!board.is_valid(3, 10, &north));
        assert!(board.is_valid(4, 10, &north));
        assert!(board.is_valid(2, 10, &north));

        let mut piece = j_west();
        assert!(piece.fits(&board));
        assert!(piece.try_rotate(RotationDirection::Clockwise, &board));
        assert_eq!(piece.rotation, Rotation::North);
        assert_eq!(piece.x, 4);
    }

    #[test]
    fn test_kick_falls_back_to_left() {
        let mut board = Board::new();
        // (5, 11) is covered by kicks 0 and +1 but not -1
        block(&mut board, 5, 11);
        let mut piece = j_west();
        assert!(piece.try_rotate(RotationDirection::Clockwise, &board));
        assert_eq!(piece.x, 2);
        assert_eq!(piece.y, 10);
    }

    #[test]
    fn test_rotation_fails_silently() {
        let mut board = Board::new();
        let mut piece = Piece {
            piece_type: TetrominoType::I,
            rotation: Rotation::West,
            x: 3,
            y: 10,
        };
        for x in 0..COLS as i32 {
            if x != 4 {
                block(&mut board, x, 11);
            }
        }
        let before = piece;
        assert!(!piece.try_rotate(RotationDirection::Clockwise, &board));
        assert_eq!(piece, before);
    }

    #[test]
    fn test_ghost_and_hard_drop() {
        let board = Board::new();
        let mut piece = Piece::new(TetrominoType::I);
        // North I occupies box row 1, so it lands with y = ROWS - 2
        assert_eq!(piece.ghost_y(&board), ROWS as i32 - 2);
        assert_eq!(piece.y, 0);
        let distance = piece.hard_drop(&board);
        assert_eq!(distance, ROWS as i32 - 2);
        assert!(!piece.can_fall(&board));
        assert_eq!(piece.hard_drop(&board), 0);
    }

    #[test]
    fn test_ghost_stops_on_stack() {
        let mut board = Board::new();
        block(&mut board, 4, 12);
        let piece = Piece::new(TetrominoType::O);
        // O bottom row is box row 1; lands with bottom on row 11
        assert_eq!(piece.ghost_y(&board), 10);
    }
}
