//! Blockfall - a falling-block puzzle engine
//!
//! The engine owns the board, the falling piece, scoring and the phase
//! timers. It draws nothing and reads no input: a front end calls the
//! command methods on [`GameSession`], pumps its [`Scheduler`] and renders
//! from the accessors and the queued [`GameEvent`]s.

pub mod bag;
pub mod board;
pub mod game;
pub mod persist;
pub mod piece;
pub mod scheduler;
pub mod score;
pub mod settings;
pub mod tetromino;

pub use board::{Board, Cell, COLS, ROWS};
pub use game::{Action, GameConfig, GameEvent, GameSession, GameSummary, Phase, SpawnStats};
pub use persist::{SaveStore, SaveValue, SavedGame};
pub use piece::Piece;
pub use scheduler::{Scheduler, Timer, TimerHandle, VirtualScheduler, WallClockScheduler};
pub use score::Score;
pub use settings::Settings;
pub use tetromino::{Rotation, RotationDirection, TetrominoType};
