//! Saving and resuming a game as flat key/value pairs
//!
//! Only a game with a falling piece is resumable. Everything read back is
//! optional: missing or malformed values fall back to defaults and never
//! abort the load.

use crate::bag::Bag;
use crate::board::{Board, COLS, ROWS};
use crate::game::{GameSession, Phase, SpawnStats};
use crate::piece::{Piece, SPAWN_Y};
use crate::scheduler::Scheduler;
use crate::score::Score;
use crate::tetromino::{Rotation, TetrominoType};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const KEY_HAS_SAVED_GAME: &str = "has-saved-game";
pub const KEY_SCORE: &str = "score";
pub const KEY_TOP_SCORE: &str = "top-score";
pub const KEY_LEVEL: &str = "level";
pub const KEY_LINES: &str = "lines";
pub const KEY_STARTING_LEVEL: &str = "starting-level";
pub const KEY_GRID: &str = "grid";
pub const KEY_CURRENT_TYPE: &str = "current-piece-type";
pub const KEY_CURRENT_X: &str = "current-x";
pub const KEY_CURRENT_Y: &str = "current-y";
pub const KEY_CURRENT_ROTATION: &str = "current-rotation";
pub const KEY_NEXT_TYPE: &str = "next-piece-type";
pub const KEY_BAG: &str = "bag-contents";
pub const KEY_PIECE_STATS: &str = "piece-stats";

/// Column used when a save has no piece x
const DEFAULT_RESTORED_X: i32 = 4;

/// How far a saved origin may sit outside the board
const COORD_MARGIN: i32 = 4;

/// A single stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Flat key/value store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaveStore {
    values: BTreeMap<String, SaveValue>,
}

impl SaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), SaveValue::Bool(value));
    }

    pub fn put_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), SaveValue::Int(value));
    }

    pub fn put_text(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), SaveValue::Text(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&SaveValue> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            SaveValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            SaveValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            SaveValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Default save file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "blockfall", "blockfall").map(|dirs| dirs.data_dir().join("savegame.toml"))
    }

    /// Load a store from a TOML file. An unreadable or corrupt file gives an
    /// empty store, which reads as "no saved game".
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&contents) {
            Ok(store) => store,
            Err(e) => {
                warn!("Ignoring corrupt save file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the store as TOML, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create save dir: {}", e))?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize: {}", e))?;
        fs::write(path, contents).map_err(|e| format!("Failed to write save file: {}", e))?;
        Ok(())
    }
}

/// Everything needed to put a game back where it was
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedGame {
    pub score: u64,
    pub top_score: u64,
    pub lines: u32,
    pub starting_level: u32,
    pub board: Board,
    pub piece: Piece,
    pub next_piece: TetrominoType,
    pub bag: Vec<TetrominoType>,
    pub stats: SpawnStats,
}

/// Serialize a session. Games that are not in `Falling` are written as
/// "no saved game", but the top score is always kept.
pub fn encode<S: Scheduler>(session: &GameSession<S>) -> SaveStore {
    let mut store = SaveStore::new();
    let score = session.score();
    store.put_int(KEY_TOP_SCORE, score.top as i64);

    let piece = match session.current_piece() {
        Some(piece) if session.phase() == Phase::Falling => *piece,
        _ => {
            store.put_bool(KEY_HAS_SAVED_GAME, false);
            return store;
        }
    };

    store.put_bool(KEY_HAS_SAVED_GAME, true);
    store.put_int(KEY_SCORE, score.points as i64);
    store.put_int(KEY_LEVEL, score.level as i64);
    store.put_int(KEY_LINES, score.lines as i64);
    store.put_int(KEY_STARTING_LEVEL, score.starting_level as i64);
    store.put_text(KEY_GRID, join(session.board().to_codes()));
    store.put_text(KEY_CURRENT_TYPE, piece.piece_type.name());
    store.put_int(KEY_CURRENT_X, piece.x as i64);
    store.put_int(KEY_CURRENT_Y, piece.y as i64);
    store.put_int(KEY_CURRENT_ROTATION, piece.rotation.index() as i64);
    store.put_text(KEY_NEXT_TYPE, session.next_piece().name());
    store.put_text(
        KEY_BAG,
        session
            .bag()
            .contents()
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(","),
    );
    store.put_text(KEY_PIECE_STATS, join(session.stats().counts()));
    store
}

/// Read a saved game back. `None` means there is nothing to resume.
pub fn decode(store: &SaveStore) -> Option<SavedGame> {
    if !store.get_bool(KEY_HAS_SAVED_GAME).unwrap_or(false) {
        return None;
    }

    let score = read_count(store, KEY_SCORE);
    let top_score = read_count(store, KEY_TOP_SCORE).max(score);
    let lines = read_small_count(store, KEY_LINES);
    let starting_level = read_small_count(store, KEY_STARTING_LEVEL);

    let board = match store.get_text(KEY_GRID) {
        Some(grid) => parse_grid(grid).unwrap_or_else(|| {
            warn!("Saved grid is corrupt, starting from an empty board");
            Board::new()
        }),
        None => Board::new(),
    };

    let piece_type = read_piece_type(store, KEY_CURRENT_TYPE);
    let rotation = store
        .get_int(KEY_CURRENT_ROTATION)
        .map(|r| {
            Rotation::from_index(r).unwrap_or_else(|| {
                warn!("Saved rotation {} out of range", r);
                Rotation::North
            })
        })
        .unwrap_or_default();
    let piece = Piece {
        piece_type,
        rotation,
        x: read_coord(store, KEY_CURRENT_X, DEFAULT_RESTORED_X, COLS),
        y: read_coord(store, KEY_CURRENT_Y, SPAWN_Y, ROWS),
    };

    let saved = SavedGame {
        score,
        top_score,
        lines,
        starting_level,
        board,
        piece,
        next_piece: read_piece_type(store, KEY_NEXT_TYPE),
        bag: store.get_text(KEY_BAG).map(parse_bag).unwrap_or_default(),
        stats: store
            .get_text(KEY_PIECE_STATS)
            .and_then(parse_stats)
            .unwrap_or_default(),
    };

    if let Some(level) = store.get_int(KEY_LEVEL) {
        let mut expected = Score::new(0, 0);
        expected.restore(saved.score, saved.lines, saved.starting_level);
        if level != expected.level as i64 {
            warn!("Saved level {} does not match lines, using {}", level, expected.level);
        }
    }
    Some(saved)
}

/// Best score kept in a store, 0 when absent
pub fn stored_top_score(store: &SaveStore) -> u64 {
    read_count(store, KEY_TOP_SCORE)
}

impl<S: Scheduler> GameSession<S> {
    /// Serialize this session, see [`encode`]
    pub fn save_state(&self) -> SaveStore {
        encode(self)
    }

    /// Restore from a store. Returns false (and leaves the session alone)
    /// when there is nothing to resume.
    pub fn restore_state(&mut self, store: &SaveStore) -> bool {
        self.set_top_score(stored_top_score(store));
        match decode(store) {
            Some(saved) => self.resume(saved),
            None => false,
        }
    }

    /// Put a decoded game into play. A falling piece that does not fit the
    /// saved board cannot be trusted, so a fresh game starts instead.
    pub fn resume(&mut self, saved: SavedGame) -> bool {
        self.set_top_score(saved.top_score);
        if !saved.piece.fits(&saved.board) {
            warn!(
                "Saved {} piece at ({}, {}) collides with the board, starting a new game",
                saved.piece.piece_type.name(),
                saved.piece.x,
                saved.piece.y
            );
            self.start_new_game(saved.starting_level);
            return false;
        }

        let mut score = Score::new(saved.starting_level, saved.top_score);
        score.restore(saved.score, saved.lines, saved.starting_level);
        let bag = Bag::with_contents(self.seed(), saved.bag);
        self.load_state(saved.board, saved.piece, saved.next_piece, bag, score, saved.stats);
        true
    }
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Comma-separated fields with blanks (e.g. a trailing comma) skipped
fn fields(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|f| !f.is_empty())
}

fn parse_grid(s: &str) -> Option<Board> {
    let codes: Vec<u8> = fields(s).map(|f| f.parse().ok()).collect::<Option<_>>()?;
    Board::from_codes(&codes)
}

/// A bag is at most one permutation minus the piece already dealt, without
/// repeats. Anything else is discarded and the next pull reshuffles.
fn parse_bag(s: &str) -> Vec<TetrominoType> {
    let parsed: Option<Vec<TetrominoType>> = fields(s).map(TetrominoType::from_name).collect();
    match parsed {
        Some(bag) if bag.len() < 7 && bag.iter().enumerate().all(|(i, t)| !bag[..i].contains(t)) => bag,
        _ => {
            warn!("Saved bag {:?} is corrupt, discarding it", s);
            Vec::new()
        }
    }
}

fn parse_stats(s: &str) -> Option<SpawnStats> {
    let counts: Vec<u32> = fields(s).map(|f| f.parse().ok()).collect::<Option<_>>()?;
    let counts: [u32; 7] = counts.try_into().ok()?;
    Some(SpawnStats::from_counts(counts))
}

fn read_count(store: &SaveStore, key: &str) -> u64 {
    match store.get_int(key) {
        Some(v) => u64::try_from(v).unwrap_or_else(|_| {
            warn!("Saved {} is negative ({}), using 0", key, v);
            0
        }),
        None => 0,
    }
}

/// Counter that must fit a `u32` (lines, levels)
fn read_small_count(store: &SaveStore, key: &str) -> u32 {
    let value = read_count(store, key);
    u32::try_from(value).unwrap_or_else(|_| {
        warn!("Saved {} is out of range ({}), using 0", key, value);
        0
    })
}

/// Piece origin, allowed to hang at most a shape's width past either edge
fn read_coord(store: &SaveStore, key: &str, default: i32, extent: usize) -> i32 {
    let Some(v) = store.get_int(key) else {
        return default;
    };
    let margin = COORD_MARGIN as i64;
    if (-margin..=extent as i64 + margin).contains(&v) {
        v as i32
    } else {
        warn!("Saved {} out of range ({}), using {}", key, v, default);
        default
    }
}

fn read_piece_type(store: &SaveStore, key: &str) -> TetrominoType {
    match store.get_text(key) {
        Some(name) => TetrominoType::from_name(name).unwrap_or_else(|| {
            warn!("Unknown piece type {:?} for {}, using I", name, key);
            TetrominoType::I
        }),
        None => TetrominoType::I,
    }
}
