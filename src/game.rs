//! Core game state and logic
//!
//! [`GameSession`] owns the board, the falling piece, the bag and the
//! counters, and moves between phases as its timers fire:
//!
//! ```text
//! Falling ──lock──▶ LineClearing ──flash──▶ Falling
//!    │
//!    └─spawn blocked──▶ GameOverPending ──▶ GameOverFilling ──▶ GameOverDone
//! ```
//!
//! Pausing is orthogonal to the phase. All input arrives as commands and all
//! output leaves as queued [`GameEvent`]s.

use crate::bag::Bag;
use crate::board::{Board, ROWS};
use crate::piece::Piece;
use crate::scheduler::{Scheduler, Timer, TimerHandle};
use crate::score::Score;
use crate::tetromino::{RotationDirection, TetrominoType};
use std::time::Duration;
use tracing::{debug, info};

/// Timing knobs for the phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// How long a resting piece may still be shifted before it locks
    pub lock_delay: Duration,
    /// Flash window between detecting full rows and collapsing them
    pub line_clear: Duration,
    /// Pause between topping out and the fill animation
    pub game_over_pause: Duration,
    /// Time between two rows of the fill animation
    pub game_over_fill: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lock_delay: Duration::from_millis(500),
            line_clear: Duration::from_millis(400),
            game_over_pause: Duration::from_millis(1000),
            game_over_fill: Duration::from_millis(100),
        }
    }
}

/// Where the session is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A piece is falling (or resting on the lock delay)
    Falling,
    /// Full rows are flashing and will collapse when the timer fires
    LineClearing,
    /// Topped out, waiting before the fill animation starts
    GameOverPending,
    /// Painting the board with dead rows from the bottom up
    GameOverFilling,
    /// Terminal
    GameOverDone,
}

/// Input actions the game can process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    SoftDrop,
    HardDrop,
    RotateCW,
    RotateCCW,
}

/// How many of each piece type have spawned this session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnStats {
    counts: [u32; 7],
}

impl SpawnStats {
    /// Build from counters in `TetrominoType::all()` order
    pub fn from_counts(counts: [u32; 7]) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> [u32; 7] {
        self.counts
    }

    pub fn get(&self, piece_type: TetrominoType) -> u32 {
        self.counts.get(piece_type.index()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TetrominoType, u32)> + '_ {
        TetrominoType::all().into_iter().zip(self.counts.iter().copied())
    }

    fn record(&mut self, piece_type: TetrominoType) {
        if let Some(count) = self.counts.get_mut(piece_type.index()) {
            *count += 1;
        }
    }
}

/// Final numbers reported with [`GameEvent::GameOver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub score: u64,
    pub top_score: u64,
    pub level: u32,
    pub lines: u32,
    pub stats: SpawnStats,
}

/// Notifications for whoever presents the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    ScoreChanged { score: u64, top_score: u64 },
    LevelChanged { level: u32, lines: u32 },
    NextPiece(TetrominoType),
    StatsChanged(SpawnStats),
    /// Rows that started flashing, bottom first
    LinesClearing(Vec<usize>),
    GameOver(GameSummary),
}

/// The main game struct
pub struct GameSession<S: Scheduler> {
    /// The game board
    board: Board,
    /// Current falling piece, absent between lock and the next spawn
    current_piece: Option<Piece>,
    next_piece: TetrominoType,
    /// Piece bag randomizer
    bag: Bag,
    seed: u64,
    score: Score,
    stats: SpawnStats,
    phase: Phase,
    paused: bool,
    /// Rows waiting to collapse while `LineClearing`
    clearing_rows: Vec<usize>,
    /// Rows the fill animation has painted so far
    filled_rows: usize,
    config: GameConfig,
    scheduler: S,
    gravity_timer: Option<TimerHandle>,
    /// At most one lock delay is ever armed
    lock_timer: Option<TimerHandle>,
    /// Line-clear flash or game-over staging, whichever the phase needs
    phase_timer: Option<TimerHandle>,
    events: Vec<GameEvent>,
}

impl<S: Scheduler> GameSession<S> {
    /// Create a session and start a game at level 0
    pub fn new(scheduler: S, config: GameConfig) -> Self {
        Self::with_seed(scheduler, config, rand::random())
    }

    /// Create a session with a fixed bag seed
    pub fn with_seed(scheduler: S, config: GameConfig, seed: u64) -> Self {
        let mut session = Self {
            board: Board::new(),
            current_piece: None,
            next_piece: TetrominoType::I,
            bag: Bag::with_seed(seed),
            seed,
            score: Score::new(0, 0),
            stats: SpawnStats::default(),
            phase: Phase::Falling,
            paused: false,
            clearing_rows: Vec::new(),
            filled_rows: 0,
            config,
            scheduler,
            gravity_timer: None,
            lock_timer: None,
            phase_timer: None,
            events: Vec::new(),
        };
        session.start_new_game(0);
        session
    }

    /// Throw away the current game and start over at `starting_level`
    /// (clamped to 0..=9). The top score survives.
    pub fn start_new_game(&mut self, starting_level: u32) {
        self.cancel_all_timers();
        self.board.reset();
        self.current_piece = None;
        self.score = Score::new(starting_level, self.score.top);
        self.stats = SpawnStats::default();
        self.phase = Phase::Falling;
        self.paused = false;
        self.clearing_rows.clear();
        self.filled_rows = 0;

        self.bag.clear();
        self.next_piece = self.bag.pull();

        info!("New game at level {}", self.score.starting_level);
        self.emit_score();
        self.emit_level();
        self.spawn_piece();
    }

    /// New game at the same starting level
    pub fn restart_game(&mut self) {
        self.start_new_game(self.score.starting_level);
    }

    /// Suspend or resume every timer. Resuming re-arms the current phase's
    /// timers from their full duration.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        if paused {
            debug!("Paused in {:?}", self.phase);
            self.cancel_all_timers();
            return;
        }

        debug!("Resumed in {:?}", self.phase);
        match self.phase {
            Phase::Falling => {
                self.arm_gravity();
                if self.current_piece.is_some_and(|p| !p.can_fall(&self.board)) {
                    self.arm_lock_delay();
                }
            }
            Phase::LineClearing => {
                self.phase_timer = Some(self.scheduler.schedule_once(self.config.line_clear, Timer::LineClear));
            }
            Phase::GameOverPending => {
                self.phase_timer =
                    Some(self.scheduler.schedule_once(self.config.game_over_pause, Timer::GameOverStart));
            }
            Phase::GameOverFilling => {
                self.phase_timer =
                    Some(self.scheduler.schedule_repeating(self.config.game_over_fill, Timer::GameOverFill));
            }
            Phase::GameOverDone => {}
        }
    }

    /// Process an action
    pub fn process_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.move_left(),
            Action::MoveRight => self.move_right(),
            Action::SoftDrop => self.soft_drop(),
            Action::HardDrop => self.hard_drop(),
            Action::RotateCW => self.rotate_clockwise(),
            Action::RotateCCW => self.rotate_counter_clockwise(),
        }
    }

    pub fn move_left(&mut self) {
        self.shift(-1);
    }

    pub fn move_right(&mut self) {
        self.shift(1);
    }

    pub fn rotate_clockwise(&mut self) {
        self.rotate(RotationDirection::Clockwise);
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.rotate(RotationDirection::CounterClockwise);
    }

    /// One row down, one point
    pub fn soft_drop(&mut self) {
        if !self.accepts_input() {
            return;
        }
        let moved = match &mut self.current_piece {
            Some(piece) => piece.try_move(0, 1, &self.board),
            None => false,
        };
        if moved {
            self.cancel_lock_delay();
            self.award(1);
        }
    }

    /// Drop to the ghost row and lock immediately, two points per row
    pub fn hard_drop(&mut self) {
        if !self.accepts_input() {
            return;
        }
        let distance = match &mut self.current_piece {
            Some(piece) => piece.hard_drop(&self.board),
            None => return,
        };
        if distance > 0 {
            self.award(distance as u64 * 2);
        }
        self.lock_piece();
    }

    /// Dispatch every timer that has come due
    pub fn pump(&mut self) {
        while let Some(timer) = self.scheduler.pop_due() {
            self.on_timer(timer);
        }
    }

    /// Drain queued notifications
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_piece(&self) -> Option<&Piece> {
        self.current_piece.as_ref()
    }

    pub fn next_piece(&self) -> TetrominoType {
        self.next_piece
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn stats(&self) -> SpawnStats {
        self.stats
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Topped out, whether or not the animation has finished
    pub fn is_game_over(&self) -> bool {
        matches!(
            self.phase,
            Phase::GameOverPending | Phase::GameOverFilling | Phase::GameOverDone
        )
    }

    /// Rows currently flashing, empty outside `LineClearing`
    pub fn clearing_rows(&self) -> &[usize] {
        &self.clearing_rows
    }

    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Gravity interval at the current level
    pub fn fall_interval(&self) -> Duration {
        self.score.fall_interval()
    }

    /// Absolute cells of the falling piece
    pub fn active_cells(&self) -> Option<[(i32, i32); 4]> {
        self.current_piece.map(|p| p.block_positions())
    }

    /// Where the falling piece would land
    pub fn ghost_cells(&self) -> Option<[(i32, i32); 4]> {
        self.current_piece.map(|p| {
            let ghost_y = p.ghost_y(&self.board);
            p.shape().map(|(dx, dy)| (p.x + dx, ghost_y + dy))
        })
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Carry a persisted best score into this session
    pub fn set_top_score(&mut self, top: u64) {
        if top > self.score.top {
            self.score.top = top;
            self.emit_score();
        }
    }

    /// Replace the whole game state, e.g. from a save. The caller has already
    /// checked that `piece` fits on `board`.
    pub(crate) fn load_state(
        &mut self,
        board: Board,
        piece: Piece,
        next_piece: TetrominoType,
        bag: Bag,
        score: Score,
        stats: SpawnStats,
    ) {
        self.cancel_all_timers();
        let top = self.score.top.max(score.top);
        self.board = board;
        self.current_piece = Some(piece);
        self.next_piece = next_piece;
        self.bag = bag;
        self.score = score;
        self.score.top = top.max(self.score.points);
        self.stats = stats;
        self.phase = Phase::Falling;
        self.paused = false;
        self.clearing_rows.clear();
        self.filled_rows = 0;

        self.emit_score();
        self.emit_level();
        self.events.push(GameEvent::NextPiece(self.next_piece));
        self.events.push(GameEvent::StatsChanged(self.stats));
        self.arm_gravity();
        if !piece.can_fall(&self.board) {
            self.arm_lock_delay();
        }
    }

    fn accepts_input(&self) -> bool {
        self.phase == Phase::Falling && !self.paused && self.current_piece.is_some()
    }

    fn shift(&mut self, dx: i32) {
        if !self.accepts_input() {
            return;
        }
        let moved = match &mut self.current_piece {
            Some(piece) => piece.try_move(dx, 0, &self.board),
            None => false,
        };
        if moved {
            self.refresh_lock_delay();
        }
    }

    fn rotate(&mut self, direction: RotationDirection) {
        if !self.accepts_input() {
            return;
        }
        let rotated = match &mut self.current_piece {
            Some(piece) => piece.try_rotate(direction, &self.board),
            None => false,
        };
        if rotated {
            self.refresh_lock_delay();
        }
    }

    /// After a shift or rotation: restart the lock delay if the piece is
    /// resting, drop it if the piece can fall again
    fn refresh_lock_delay(&mut self) {
        let resting = self.current_piece.is_some_and(|p| !p.can_fall(&self.board));
        self.cancel_lock_delay();
        if resting {
            self.arm_lock_delay();
        }
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Gravity => {
                self.gravity_timer = None;
                self.gravity_tick();
            }
            Timer::LockDelay => {
                self.lock_timer = None;
                if self.phase == Phase::Falling
                    && self.current_piece.is_some_and(|p| !p.can_fall(&self.board))
                {
                    self.lock_piece();
                }
            }
            Timer::LineClear => {
                self.phase_timer = None;
                if self.phase == Phase::LineClearing {
                    self.finish_line_clear();
                }
            }
            Timer::GameOverStart => {
                self.phase_timer = None;
                if self.phase == Phase::GameOverPending {
                    self.phase = Phase::GameOverFilling;
                    self.filled_rows = 0;
                    self.phase_timer =
                        Some(self.scheduler.schedule_repeating(self.config.game_over_fill, Timer::GameOverFill));
                    self.fill_next_row();
                }
            }
            Timer::GameOverFill => {
                if self.phase == Phase::GameOverFilling {
                    self.fill_next_row();
                }
            }
        }
    }

    fn gravity_tick(&mut self) {
        if self.phase != Phase::Falling || self.paused {
            return;
        }
        let moved = match &mut self.current_piece {
            Some(piece) => piece.try_move(0, 1, &self.board),
            None => return,
        };
        if moved {
            self.cancel_lock_delay();
        } else if self.lock_timer.is_none() {
            self.arm_lock_delay();
        }
        self.arm_gravity();
    }

    /// Commit the piece and either start a line clear or spawn the next one
    fn lock_piece(&mut self) {
        self.cancel_lock_delay();
        let Some(piece) = self.current_piece.take() else {
            return;
        };

        self.board.place(piece.x, piece.y, &piece.shape(), piece.piece_type);
        debug!(
            "Locked {} at ({}, {}) rotation {}",
            piece.piece_type.name(),
            piece.x,
            piece.y,
            piece.rotation.index()
        );

        let full_rows = self.board.find_full_rows();
        if full_rows.is_empty() {
            self.spawn_piece();
            return;
        }

        let points = self.score.add_clear(full_rows.len());
        info!(
            "Clearing {} row(s) at level {} for {} points",
            full_rows.len(),
            self.score.level,
            points
        );
        self.emit_score();

        self.cancel_gravity();
        self.phase = Phase::LineClearing;
        self.events.push(GameEvent::LinesClearing(full_rows.clone()));
        self.clearing_rows = full_rows;
        self.phase_timer = Some(self.scheduler.schedule_once(self.config.line_clear, Timer::LineClear));
    }

    fn finish_line_clear(&mut self) {
        let rows = std::mem::take(&mut self.clearing_rows);
        self.board.collapse_rows(&rows);

        let level_before = self.score.level;
        self.score.add_lines(rows.len());
        if self.score.level != level_before {
            info!("Level up: {} -> {}", level_before, self.score.level);
        }
        self.emit_score();
        self.emit_level();

        self.phase = Phase::Falling;
        self.spawn_piece();
    }

    /// Promote the next piece and pull a new one. Tops out if it does not fit.
    fn spawn_piece(&mut self) {
        let piece_type = self.next_piece;
        self.next_piece = self.bag.pull();
        self.stats.record(piece_type);
        self.events.push(GameEvent::NextPiece(self.next_piece));
        self.events.push(GameEvent::StatsChanged(self.stats));

        let piece = Piece::new(piece_type);
        if !piece.fits(&self.board) {
            self.top_out(piece);
            return;
        }

        debug!("Spawned {}, next {}", piece_type.name(), self.next_piece.name());
        self.current_piece = Some(piece);
        if !self.paused {
            self.arm_gravity();
        }
    }

    fn top_out(&mut self, piece: Piece) {
        info!(
            "Game over: score {}, lines {}, level {}",
            self.score.points, self.score.lines, self.score.level
        );
        self.cancel_all_timers();
        // Leave the piece that did not fit visible, clipped to the board
        self.board.place(piece.x, piece.y, &piece.shape(), piece.piece_type);
        self.current_piece = None;
        self.phase = Phase::GameOverPending;
        if !self.paused {
            self.phase_timer =
                Some(self.scheduler.schedule_once(self.config.game_over_pause, Timer::GameOverStart));
        }
    }

    /// Paint the next dead row, bottom to top, and finish after the top row
    fn fill_next_row(&mut self) {
        if self.filled_rows < ROWS {
            self.board.fill_row(ROWS - 1 - self.filled_rows, TetrominoType::Dead);
            self.filled_rows += 1;
        }
        if self.filled_rows < ROWS {
            return;
        }

        if let Some(handle) = self.phase_timer.take() {
            self.scheduler.cancel(handle);
        }
        self.phase = Phase::GameOverDone;
        self.events.push(GameEvent::GameOver(GameSummary {
            score: self.score.points,
            top_score: self.score.top,
            level: self.score.level,
            lines: self.score.lines,
            stats: self.stats,
        }));
    }

    fn award(&mut self, points: u64) {
        self.score.award(points);
        self.emit_score();
    }

    fn emit_score(&mut self) {
        self.events.push(GameEvent::ScoreChanged {
            score: self.score.points,
            top_score: self.score.top,
        });
    }

    fn emit_level(&mut self) {
        self.events.push(GameEvent::LevelChanged {
            level: self.score.level,
            lines: self.score.lines,
        });
    }

    fn arm_gravity(&mut self) {
        self.cancel_gravity();
        let interval = self.score.fall_interval();
        self.gravity_timer = Some(self.scheduler.schedule_once(interval, Timer::Gravity));
    }

    fn cancel_gravity(&mut self) {
        if let Some(handle) = self.gravity_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn arm_lock_delay(&mut self) {
        self.cancel_lock_delay();
        self.lock_timer = Some(self.scheduler.schedule_once(self.config.lock_delay, Timer::LockDelay));
    }

    fn cancel_lock_delay(&mut self) {
        if let Some(handle) = self.lock_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn cancel_all_timers(&mut self) {
        self.cancel_gravity();
        self.cancel_lock_delay();
        if let Some(handle) = self.phase_timer.take() {
            self.scheduler.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{COLS, Cell};
    use crate::piece::{SPAWN_X, SPAWN_Y};
    use crate::scheduler::VirtualScheduler;
    use crate::tetromino::Rotation;

    fn session() -> GameSession<VirtualScheduler> {
        let mut s = GameSession::with_seed(VirtualScheduler::new(), GameConfig::default(), 7);
        s.take_events();
        s
    }

    fn advance(s: &mut GameSession<VirtualScheduler>, ms: u64) {
        s.scheduler_mut().advance(Duration::from_millis(ms));
        s.pump();
    }

    /// Swap the falling piece for a known one. Timers stay as they are.
    fn put_piece(s: &mut GameSession<VirtualScheduler>, piece_type: TetrominoType, rotation: Rotation, x: i32, y: i32) {
        s.current_piece = Some(Piece {
            piece_type,
            rotation,
            x,
            y,
        });
    }

    fn block(s: &mut GameSession<VirtualScheduler>, x: i32, y: i32) {
        s.board.place(x, y, &[(0, 0); 4], TetrominoType::O);
    }

    /// Fill `row` except the given columns
    fn fill_except(s: &mut GameSession<VirtualScheduler>, row: i32, holes: &[i32]) {
        for x in 0..COLS as i32 {
            if !holes.contains(&x) {
                block(s, x, row);
            }
        }
    }

    fn game_over_events(events: &[GameEvent]) -> usize {
        events.iter().filter(|e| matches!(e, GameEvent::GameOver(_))).count()
    }

    #[test]
    fn test_new_game_spawns_first_piece() {
        let s = session();
        assert_eq!(s.phase(), Phase::Falling);
        let piece = s.current_piece().copied().unwrap();
        assert_eq!((piece.x, piece.y), (SPAWN_X, SPAWN_Y));
        assert_eq!(piece.rotation, Rotation::North);
        assert_eq!(s.stats().total(), 1);
        assert_eq!(s.stats().get(piece.piece_type), 1);
        assert_eq!(s.bag().contents().len(), 5);
        assert_eq!(s.score().points, 0);
    }

    #[test]
    fn test_hard_drop_locks_and_spawns_next() {
        let mut s = session();
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, SPAWN_Y);
        let next = s.next_piece();

        s.hard_drop();

        // North I sits in box row 1, so it descends 18 rows to the floor
        assert_eq!(s.score().points, 36);
        for x in 3..7 {
            assert_eq!(s.board().get(x, 19), Some(Cell::Filled(TetrominoType::I)));
        }
        let piece = s.current_piece().copied().unwrap();
        assert_eq!(piece.piece_type, next);
        assert_eq!((piece.x, piece.y), (SPAWN_X, SPAWN_Y));
        assert_eq!(s.phase(), Phase::Falling);
        let events = s.take_events();
        assert!(events.contains(&GameEvent::ScoreChanged { score: 36, top_score: 36 }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::NextPiece(_))));
    }

    #[test]
    fn test_hard_drop_five_rows_awards_ten() {
        let mut s = session();
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, 13);
        s.hard_drop();
        assert_eq!(s.score().points, 10);
    }

    #[test]
    fn test_soft_drop_awards_one_point() {
        let mut s = session();
        let y = s.current_piece().unwrap().y;
        s.soft_drop();
        assert_eq!(s.current_piece().unwrap().y, y + 1);
        assert_eq!(s.score().points, 1);

        // Blocked soft drop changes nothing
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, 18);
        s.soft_drop();
        assert_eq!(s.score().points, 1);
        assert_eq!(s.current_piece().unwrap().y, 18);
    }

    #[test]
    fn test_gravity_follows_level_speed() {
        let mut s = session();
        advance(&mut s, 699);
        assert_eq!(s.current_piece().unwrap().y, 0);
        advance(&mut s, 1);
        assert_eq!(s.current_piece().unwrap().y, 1);
        advance(&mut s, 1400);
        assert_eq!(s.current_piece().unwrap().y, 3);

        s.start_new_game(8);
        s.take_events();
        advance(&mut s, 100);
        assert_eq!(s.current_piece().unwrap().y, 1);
    }

    #[test]
    fn test_lock_delay_after_blocked_tick() {
        let mut s = session();
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, 18);

        // Gravity at 700 finds the piece resting and arms the 500ms delay
        advance(&mut s, 1199);
        assert_eq!(s.current_piece().unwrap().y, 18);
        assert_eq!(s.board().get(3, 19), Some(Cell::Empty));

        advance(&mut s, 1);
        assert_eq!(s.board().get(3, 19), Some(Cell::Filled(TetrominoType::I)));
        assert_eq!(s.current_piece().unwrap().y, 0);
        assert_eq!(s.stats().total(), 2);
    }

    #[test]
    fn test_lateral_move_rearms_lock_delay() {
        let mut s = session();
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, 18);
        advance(&mut s, 1000);

        s.move_left();
        assert_eq!(s.current_piece().unwrap().x, SPAWN_X - 1);

        // The first deadline (1200) passes without a lock
        advance(&mut s, 300);
        assert_eq!(s.current_piece().unwrap().y, 18);
        assert_eq!(s.stats().total(), 1);

        advance(&mut s, 200);
        assert_eq!(s.board().get(2, 19), Some(Cell::Filled(TetrominoType::I)));
        assert_eq!(s.stats().total(), 2);
    }

    #[test]
    fn test_move_off_ledge_cancels_lock_delay() {
        let mut s = session();
        block(&mut s, 4, 10);
        // O covers box columns 1..=2, so at x=3 it rests on (4, 10)
        put_piece(&mut s, TetrominoType::O, Rotation::North, SPAWN_X, 8);
        advance(&mut s, 700);
        assert_eq!(s.current_piece().unwrap().y, 8);

        s.move_right();
        assert!(s.current_piece().unwrap().can_fall(s.board()));
        advance(&mut s, 700);
        let piece = s.current_piece().copied().unwrap();
        assert_eq!(piece.piece_type, TetrominoType::O);
        assert_eq!(piece.y, 9);
        assert_eq!(s.board().get(5, 9), Some(Cell::Empty));
    }

    #[test]
    fn test_rotation_commands() {
        let mut s = session();
        put_piece(&mut s, TetrominoType::T, Rotation::North, SPAWN_X, 5);
        s.rotate_clockwise();
        assert_eq!(s.current_piece().unwrap().rotation, Rotation::East);
        s.rotate_counter_clockwise();
        s.rotate_counter_clockwise();
        assert_eq!(s.current_piece().unwrap().rotation, Rotation::West);
        s.process_action(Action::RotateCW);
        assert_eq!(s.current_piece().unwrap().rotation, Rotation::North);
    }

    #[test]
    fn test_single_line_clear_flow() {
        let mut s = session();
        fill_except(&mut s, 19, &[3, 4, 5, 6]);
        block(&mut s, 0, 18);
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, SPAWN_Y);

        s.hard_drop();
        assert_eq!(s.phase(), Phase::LineClearing);
        assert_eq!(s.clearing_rows(), &[19]);
        assert!(s.current_piece().is_none());
        // 18 rows of hard drop plus a single at level 0
        assert_eq!(s.score().points, 36 + 40);
        assert!(s.take_events().contains(&GameEvent::LinesClearing(vec![19])));

        // Input is ignored during the flash
        s.move_left();
        s.hard_drop();
        assert_eq!(s.score().points, 76);

        advance(&mut s, 399);
        assert_eq!(s.phase(), Phase::LineClearing);
        advance(&mut s, 1);
        assert_eq!(s.phase(), Phase::Falling);
        assert_eq!(s.score().lines, 1);
        assert_eq!(s.board().get(0, 19), Some(Cell::Filled(TetrominoType::O)));
        assert_eq!(s.board().get(1, 19), Some(Cell::Empty));
        assert!(s.current_piece().is_some());
        assert!(s.take_events().contains(&GameEvent::LevelChanged { level: 0, lines: 1 }));
    }

    #[test]
    fn test_tetris_at_level_two() {
        let mut s = session();
        s.start_new_game(2);
        for row in 16..20 {
            fill_except(&mut s, row, &[0]);
        }
        // Vertical I occupies box column 1
        put_piece(&mut s, TetrominoType::I, Rotation::West, -1, 0);

        s.hard_drop();
        assert_eq!(s.clearing_rows(), &[19, 18, 17, 16]);
        assert_eq!(s.score().points, 16 * 2 + 3600);

        advance(&mut s, 400);
        assert!(s.board().is_empty());
        assert_eq!(s.score().lines, 4);
        assert_eq!(s.score().level, 2);
    }

    #[test]
    fn test_level_up_speeds_gravity() {
        let mut s = session();
        s.score.lines = 9;
        fill_except(&mut s, 19, &[3, 4, 5, 6]);
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, SPAWN_Y);
        s.hard_drop();
        advance(&mut s, 400);
        assert_eq!(s.score().level, 1);
        assert_eq!(s.fall_interval(), Duration::from_millis(600));

        let y = s.current_piece().unwrap().y;
        advance(&mut s, 600);
        assert_eq!(s.current_piece().unwrap().y, y + 1);
    }

    fn top_out(s: &mut GameSession<VirtualScheduler>) {
        // Two non-full rows across the spawn area
        fill_except(s, 0, &[9]);
        fill_except(s, 1, &[9]);
        s.current_piece = None;
        s.spawn_piece();
    }

    #[test]
    fn test_game_over_sequence() {
        let mut s = session();
        let doomed = s.next_piece();
        top_out(&mut s);

        assert_eq!(s.phase(), Phase::GameOverPending);
        assert!(s.is_game_over());
        assert!(s.current_piece().is_none());
        let shape = doomed.shape(Rotation::North);
        for (dx, dy) in shape {
            assert_eq!(s.board().get(SPAWN_X + dx, SPAWN_Y + dy), Some(Cell::Filled(doomed)));
        }

        // Commands do nothing once topped out
        s.move_left();
        s.hard_drop();

        advance(&mut s, 999);
        assert_eq!(s.phase(), Phase::GameOverPending);
        advance(&mut s, 1);
        assert_eq!(s.phase(), Phase::GameOverFilling);
        assert_eq!(s.board().get(0, 19), Some(Cell::Filled(TetrominoType::Dead)));
        assert_eq!(s.board().get(0, 18), Some(Cell::Empty));

        advance(&mut s, 100);
        assert_eq!(s.board().get(0, 18), Some(Cell::Filled(TetrominoType::Dead)));
        assert_eq!(s.board().get(0, 17), Some(Cell::Empty));

        // 20 rows: the first at 1000ms, the last 19 ticks later
        advance(&mut s, 1799);
        assert_eq!(s.phase(), Phase::GameOverFilling);
        assert_eq!(game_over_events(&s.take_events()), 0);
        advance(&mut s, 1);
        assert_eq!(s.phase(), Phase::GameOverDone);
        assert!(s
            .board()
            .rows()
            .all(|row| row.iter().all(|c| *c == Cell::Filled(TetrominoType::Dead))));

        let events = s.take_events();
        assert_eq!(game_over_events(&events), 1);

        advance(&mut s, 10_000);
        assert_eq!(game_over_events(&s.take_events()), 0);
        assert_eq!(s.scheduler().pending(), 0);
    }

    #[test]
    fn test_game_over_summary() {
        let mut s = session();
        s.award(120);
        top_out(&mut s);
        advance(&mut s, 5000);
        let summary = s
            .take_events()
            .into_iter()
            .find_map(|e| match e {
                GameEvent::GameOver(summary) => Some(summary),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.score, 120);
        assert_eq!(summary.top_score, 120);
        assert_eq!(summary.stats.total(), 2);
    }

    #[test]
    fn test_pause_freezes_gravity_and_input() {
        let mut s = session();
        s.set_paused(true);
        assert!(s.is_paused());
        advance(&mut s, 5000);
        assert_eq!(s.current_piece().unwrap().y, 0);
        s.move_right();
        s.soft_drop();
        assert_eq!(s.current_piece().unwrap().x, SPAWN_X);
        assert_eq!(s.score().points, 0);

        s.set_paused(false);
        advance(&mut s, 700);
        assert_eq!(s.current_piece().unwrap().y, 1);
    }

    #[test]
    fn test_pause_freezes_line_clear_flash() {
        let mut s = session();
        fill_except(&mut s, 19, &[3, 4, 5, 6]);
        put_piece(&mut s, TetrominoType::I, Rotation::North, SPAWN_X, SPAWN_Y);
        s.hard_drop();
        advance(&mut s, 200);

        s.set_paused(true);
        advance(&mut s, 1000);
        assert_eq!(s.phase(), Phase::LineClearing);

        // The flash restarts from its full length
        s.set_paused(false);
        advance(&mut s, 399);
        assert_eq!(s.phase(), Phase::LineClearing);
        advance(&mut s, 1);
        assert_eq!(s.phase(), Phase::Falling);
    }

    #[test]
    fn test_pause_during_game_over_fill() {
        let mut s = session();
        top_out(&mut s);
        advance(&mut s, 1000);
        s.set_paused(true);
        advance(&mut s, 10_000);
        assert_eq!(s.phase(), Phase::GameOverFilling);
        s.set_paused(false);
        advance(&mut s, 1900);
        assert_eq!(s.phase(), Phase::GameOverDone);
    }

    #[test]
    fn test_restart_keeps_starting_level_and_top_score() {
        let mut s = session();
        s.start_new_game(3);
        s.award(500);
        top_out(&mut s);
        advance(&mut s, 5000);
        assert_eq!(s.phase(), Phase::GameOverDone);

        s.restart_game();
        assert_eq!(s.phase(), Phase::Falling);
        assert!(s.board().is_empty());
        assert_eq!(s.score().points, 0);
        assert_eq!(s.score().top, 500);
        assert_eq!(s.score().level, 3);
        assert_eq!(s.stats().total(), 1);
        assert!(s.current_piece().is_some());
    }

    #[test]
    fn test_new_game_clamps_level() {
        let mut s = session();
        s.start_new_game(15);
        assert_eq!(s.score().starting_level, 9);
        assert_eq!(s.fall_interval(), Duration::from_millis(80));
    }

    #[test]
    fn test_ghost_cells_on_floor() {
        let s = session();
        let ghost = s.ghost_cells().unwrap();
        let active = s.active_cells().unwrap();
        let max_y = ghost.iter().map(|c| c.1).max().unwrap();
        assert_eq!(max_y, 19);
        for (g, a) in ghost.iter().zip(active.iter()) {
            assert_eq!(g.0, a.0);
        }
    }

    #[test]
    fn test_spawn_stats_count_every_piece() {
        let mut s = session();
        for _ in 0..6 {
            s.hard_drop();
        }
        // A new game starts on a fresh bag, so the first seven are one of each
        assert_eq!(s.stats().total(), 7);
        assert!(s.stats().iter().all(|(_, n)| n == 1));
    }

    #[test]
    fn test_top_score_from_storage() {
        let mut s = session();
        s.set_top_score(900);
        assert_eq!(s.score().top, 900);
        s.award(10);
        assert_eq!(s.score().top, 900);
        assert!(s.take_events().contains(&GameEvent::ScoreChanged { score: 10, top_score: 900 }));
    }
}
