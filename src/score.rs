//! Scoring, level progression and gravity speed

use std::time::Duration;

/// Highest level a new game can start on
pub const MAX_STARTING_LEVEL: u32 = 9;

/// Lines needed per level
const LINES_PER_LEVEL: u32 = 10;

/// Base points for clearing 1-4 rows at once, multiplied by `level + 1`
pub fn line_clear_base(rows: usize) -> u64 {
    match rows {
        1 => 40,
        2 => 100,
        3 => 300,
        4 => 1200,
        _ => 0,
    }
}

/// Gravity interval for a level
pub fn fall_interval(level: u32) -> Duration {
    let ms = match level {
        0 => 700,
        1 => 600,
        2 => 500,
        3 => 400,
        4 => 300,
        5 => 250,
        6 => 200,
        7 => 150,
        8 => 100,
        9..=12 => 80,
        13..=15 => 70,
        16..=18 => 50,
        19..=28 => 30,
        _ => 20,
    };
    Duration::from_millis(ms)
}

/// Score, top score, lines and level for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    /// Current score
    pub points: u64,
    /// Best score seen, carried across sessions
    pub top: u64,
    /// Total lines cleared
    pub lines: u32,
    /// Current level, always `starting_level + lines / 10`
    pub level: u32,
    /// Level the session started on
    pub starting_level: u32,
}

impl Score {
    pub fn new(starting_level: u32, top: u64) -> Self {
        let starting_level = starting_level.min(MAX_STARTING_LEVEL);
        Self {
            points: 0,
            top,
            lines: 0,
            level: starting_level,
            starting_level,
        }
    }

    /// Add points and raise the top score if beaten
    pub fn award(&mut self, points: u64) {
        self.points = self.points.saturating_add(points);
        self.top = self.top.max(self.points);
    }

    /// Award a line clear at the current level (before the lines count).
    /// Returns the points awarded.
    pub fn add_clear(&mut self, rows: usize) -> u64 {
        let points = line_clear_base(rows) * (self.level as u64 + 1);
        self.award(points);
        points
    }

    /// Count cleared lines and recompute the level
    pub fn add_lines(&mut self, rows: usize) {
        self.lines = self.lines.saturating_add(rows as u32);
        self.level = self.starting_level + self.lines / LINES_PER_LEVEL;
    }

    /// Restore counters from saved values, deriving the level again
    pub fn restore(&mut self, points: u64, lines: u32, starting_level: u32) {
        self.starting_level = starting_level.min(MAX_STARTING_LEVEL);
        self.points = points;
        self.lines = lines;
        self.level = self.starting_level + self.lines / LINES_PER_LEVEL;
        self.top = self.top.max(points);
    }

    /// Add score for soft drop (1 point per cell)
    pub fn add_soft_drop(&mut self, cells: u32) {
        self.award(cells as u64);
    }

    /// Add score for hard drop (2 points per cell)
    pub fn add_hard_drop(&mut self, cells: u32) {
        self.award(cells as u64 * 2);
    }

    pub fn fall_interval(&self) -> Duration {
        fall_interval(self.level)
    }
}
