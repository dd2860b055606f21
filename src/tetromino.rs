//! Tetromino definitions and shapes
//!
//! Shapes live in a 4x4 box with `(dx, dy)` offsets, x increasing to the
//! right and y increasing downward. Rotations are superimposed tables rather
//! than computed, so every state can be tuned independently.

/// A relative cell displacement `(dx, dy)`.
pub type Offset = (i32, i32);

/// Four offsets covering one tetromino.
pub type Shape = [Offset; 4];

/// The piece types. `Dead` is only painted by the game-over fill and never
/// comes out of the bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TetrominoType {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
    Dead,
}

impl TetrominoType {
    /// The seven spawnable types, in index order
    pub fn all() -> [TetrominoType; 7] {
        [
            TetrominoType::I,
            TetrominoType::O,
            TetrominoType::T,
            TetrominoType::S,
            TetrominoType::Z,
            TetrominoType::J,
            TetrominoType::L,
        ]
    }

    /// Position in `all()`; `Dead` sorts after the real pieces
    pub fn index(&self) -> usize {
        match self {
            TetrominoType::I => 0,
            TetrominoType::O => 1,
            TetrominoType::T => 2,
            TetrominoType::S => 3,
            TetrominoType::Z => 4,
            TetrominoType::J => 5,
            TetrominoType::L => 6,
            TetrominoType::Dead => 7,
        }
    }

    /// Grid cell code: index + 1, leaving 0 for an empty cell
    pub fn code(&self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_code(code: u8) -> Option<TetrominoType> {
        match code {
            1..=7 => Some(Self::all()[code as usize - 1]),
            8 => Some(TetrominoType::Dead),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TetrominoType::I => "I",
            TetrominoType::O => "O",
            TetrominoType::T => "T",
            TetrominoType::S => "S",
            TetrominoType::Z => "Z",
            TetrominoType::J => "J",
            TetrominoType::L => "L",
            TetrominoType::Dead => "Dead",
        }
    }

    /// Parse a spawnable piece name. `Dead` is deliberately not accepted.
    pub fn from_name(name: &str) -> Option<TetrominoType> {
        Self::all().into_iter().find(|t| t.name() == name.trim())
    }

    /// Get the shape offsets for this tetromino at a given rotation
    ///
    /// `O` ignores rotation. `Dead` has no shape of its own and reuses the
    /// `O` square so the lookup stays total.
    pub fn shape(&self, rotation: Rotation) -> Shape {
        use Rotation::*;
        match self {
            // ....     ..#.     ....     .#..
            // ####     ..#.     ....     .#..
            // ....     ..#.     ####     .#..
            // ....     ..#.     ....     .#..
            TetrominoType::I => match rotation {
                North => [(0, 1), (1, 1), (2, 1), (3, 1)],
                East => [(2, 0), (2, 1), (2, 2), (2, 3)],
                South => [(0, 2), (1, 2), (2, 2), (3, 2)],
                West => [(1, 0), (1, 1), (1, 2), (1, 3)],
            },
            TetrominoType::O | TetrominoType::Dead => [(1, 0), (2, 0), (1, 1), (2, 1)],
            TetrominoType::T => match rotation {
                North => [(1, 0), (0, 1), (1, 1), (2, 1)],
                East => [(1, 0), (1, 1), (2, 1), (1, 2)],
                South => [(0, 1), (1, 1), (2, 1), (1, 2)],
                West => [(1, 0), (0, 1), (1, 1), (1, 2)],
            },
            TetrominoType::S => match rotation {
                North => [(1, 0), (2, 0), (0, 1), (1, 1)],
                East => [(1, 0), (1, 1), (2, 1), (2, 2)],
                South => [(1, 1), (2, 1), (0, 2), (1, 2)],
                West => [(0, 0), (0, 1), (1, 1), (1, 2)],
            },
            TetrominoType::Z => match rotation {
                North => [(0, 0), (1, 0), (1, 1), (2, 1)],
                East => [(2, 0), (1, 1), (2, 1), (1, 2)],
                South => [(0, 1), (1, 1), (1, 2), (2, 2)],
                West => [(1, 0), (0, 1), (1, 1), (0, 2)],
            },
            TetrominoType::J => match rotation {
                North => [(0, 0), (0, 1), (1, 1), (2, 1)],
                East => [(1, 0), (2, 0), (1, 1), (1, 2)],
                South => [(0, 1), (1, 1), (2, 1), (2, 2)],
                West => [(1, 0), (1, 1), (0, 2), (1, 2)],
            },
            TetrominoType::L => match rotation {
                North => [(2, 0), (0, 1), (1, 1), (2, 1)],
                East => [(1, 0), (1, 1), (1, 2), (2, 2)],
                South => [(0, 1), (1, 1), (2, 1), (0, 2)],
                West => [(0, 0), (1, 0), (1, 1), (1, 2)],
            },
        }
    }

    /// Compact shape for the "next piece" box, anchored at (0, 0)
    pub fn preview_shape(&self) -> Shape {
        match self {
            TetrominoType::I => [(0, 0), (1, 0), (2, 0), (3, 0)],
            TetrominoType::O | TetrominoType::Dead => [(0, 0), (1, 0), (0, 1), (1, 1)],
            TetrominoType::T => [(1, 0), (0, 1), (1, 1), (2, 1)],
            TetrominoType::S => [(1, 0), (2, 0), (0, 1), (1, 1)],
            TetrominoType::Z => [(0, 0), (1, 0), (1, 1), (2, 1)],
            TetrominoType::J => [(0, 0), (0, 1), (1, 1), (2, 1)],
            TetrominoType::L => [(2, 0), (0, 1), (1, 1), (2, 1)],
        }
    }
}

/// Rotation states, clockwise from the spawn orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    North, // Spawn state
    East,  // Clockwise from North
    South, // 180 from North
    West,  // Counter-clockwise from North
}

impl Rotation {
    /// Rotate clockwise: North → East → South → West → North
    pub fn cw(&self) -> Rotation {
        match self {
            Rotation::North => Rotation::East,
            Rotation::East => Rotation::South,
            Rotation::South => Rotation::West,
            Rotation::West => Rotation::North,
        }
    }

    /// Rotate counter-clockwise: North → West → South → East → North
    pub fn ccw(&self) -> Rotation {
        match self {
            Rotation::North => Rotation::West,
            Rotation::West => Rotation::South,
            Rotation::South => Rotation::East,
            Rotation::East => Rotation::North,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Rotation::North => 0,
            Rotation::East => 1,
            Rotation::South => 2,
            Rotation::West => 3,
        }
    }

    pub fn from_index(index: i64) -> Option<Rotation> {
        match index {
            0 => Some(Rotation::North),
            1 => Some(Rotation::East),
            2 => Some(Rotation::South),
            3 => Some(Rotation::West),
            _ => None,
        }
    }
}

/// Direction for rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

impl RotationDirection {
    pub fn apply(&self, rotation: Rotation) -> Rotation {
        match self {
            RotationDirection::Clockwise => rotation.cw(),
            RotationDirection::CounterClockwise => rotation.ccw(),
        }
    }
}
