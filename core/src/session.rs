use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

use crate::{generate_with, CellUpdate, CellView, Coord2, GameBoard, LevelConfig, OpenOutcome};

/// Cadence at which a host should re-read the session clock for display.
pub const TIMER_TICK: Duration = Duration::from_millis(250);

/// Pause between winning a level and the host calling
/// [`GameSession::advance_level`].
pub const LEVEL_ADVANCE_DELAY: Duration = Duration::from_millis(600);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Playing,
    Won,
    Lost,
}

impl SessionState {
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Totals for one session, across every level played since the last restart.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub level: u32,
    pub elapsed_seconds: u64,
    pub opened_count: u32,
    pub flagged_count: u32,
}

/// Receives engine notifications. Every method defaults to a no-op so a host
/// implements only what it renders or persists.
pub trait SessionObserver {
    fn cell_changed(&mut self, _update: CellUpdate) {}
    fn won(&mut self) {}
    fn lost(&mut self) {}
    fn level_advanced(&mut self, _level: u32) {}
    /// Called once per finished game, win or loss, with the final totals.
    fn record_result(&mut self, _stats: &SessionStats) {}
}

/// Headless observer for drivers that only poll state.
impl SessionObserver for () {}

/// A run of consecutive levels: builds boards, forwards player intents to the
/// board while playing, and tracks win/loss, timing, and totals.
///
/// The session is synchronous and single-owner. The two timing behaviors the
/// original game drives with timers stay outside: a host re-reads
/// [`GameSession::stats`] every [`TIMER_TICK`] for the clock display, and
/// calls [`GameSession::advance_level`] [`LEVEL_ADVANCE_DELAY`] after a win.
/// Both are cancellable for free, a stale call after a restart lands in the
/// wrong state and is ignored.
#[derive(Debug)]
pub struct GameSession {
    state: SessionState,
    base_config: LevelConfig,
    config: LevelConfig,
    board: Option<GameBoard>,
    stats: SessionStats,
    rng: SmallRng,
    level_started: Option<Instant>,
    banked: Duration,
}

impl GameSession {
    /// A session starting from the standard first level.
    pub fn new(seed: u64) -> Self {
        Self::with_config(LevelConfig::initial(), seed)
    }

    /// A session whose first level (and every restart) uses `config`.
    /// The configuration must be buildable, see [`LevelConfig::validate`].
    pub fn with_config(config: LevelConfig, seed: u64) -> Self {
        Self {
            state: SessionState::Idle,
            base_config: config,
            config,
            board: None,
            stats: SessionStats::default(),
            rng: SmallRng::seed_from_u64(seed),
            level_started: None,
            banked: Duration::ZERO,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> LevelConfig {
        self.config
    }

    pub fn board(&self) -> Option<&GameBoard> {
        self.board.as_ref()
    }

    /// Wall-clock time spent on the current level.
    pub fn level_elapsed(&self) -> Duration {
        self.level_started.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Current totals; `elapsed_seconds` covers the whole session so far.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            elapsed_seconds: (self.banked + self.level_elapsed()).as_secs(),
            ..self.stats
        }
    }

    /// Resets the totals and begins level 1 with a fresh board.
    pub fn start(&mut self) {
        self.stats = SessionStats {
            level: 1,
            ..SessionStats::default()
        };
        self.banked = Duration::ZERO;
        self.config = self.base_config;
        self.build_board();
        self.state = SessionState::Playing;
        log::debug!("session started: {:?}", self.config);
    }

    /// Explicit restart from any state. Identical to [`GameSession::start`];
    /// the separate name mirrors the input surface the UI drives.
    pub fn restart(&mut self) {
        self.start();
    }

    /// Forwards an open intent. Ignored unless playing; out-of-bounds
    /// coordinates are ignored too, the UI is the only coordinate source.
    pub fn open(&mut self, coords: Coord2, obs: &mut dyn SessionObserver) {
        if !self.state.is_playing() {
            return;
        }
        let Some(board) = self.board.as_mut() else {
            return;
        };

        let before = board.revealed_count();
        let mut updates = Vec::new();
        let Ok(outcome) = board.open(coords, &mut self.rng, &mut updates) else {
            return;
        };
        let after = board.revealed_count();

        self.stats.opened_count += u32::from(after - before);
        flush(updates, obs);
        self.settle(outcome, obs);
    }

    /// Forwards a flag toggle. Ignored unless playing or when out of bounds.
    pub fn toggle_flag(&mut self, coords: Coord2, obs: &mut dyn SessionObserver) {
        if !self.state.is_playing() {
            return;
        }
        let Some(board) = self.board.as_mut() else {
            return;
        };

        let mut updates = Vec::new();
        let Ok(outcome) = board.toggle_flag(coords, &mut updates) else {
            return;
        };

        if outcome.has_update()
            && updates
                .last()
                .is_some_and(|update| update.view == CellView::Flagged)
        {
            // only placements count toward the session total, like removals
            // never subtract from it
            self.stats.flagged_count += 1;
        }
        flush(updates, obs);
    }

    /// Forwards a chord intent. Ignored unless playing or when out of bounds.
    pub fn chord(&mut self, coords: Coord2, obs: &mut dyn SessionObserver) {
        if !self.state.is_playing() {
            return;
        }
        let Some(board) = self.board.as_mut() else {
            return;
        };

        let before = board.revealed_count();
        let mut updates = Vec::new();
        let Ok(outcome) = board.chord(coords, &mut updates) else {
            return;
        };
        let after = board.revealed_count();

        self.stats.opened_count += u32::from(after - before);
        flush(updates, obs);
        self.settle(outcome, obs);
    }

    /// Moves a won session to the next, harder level. Intended to be called
    /// [`LEVEL_ADVANCE_DELAY`] after the win; a no-op in any other state, so
    /// a timer that outlives a restart cannot touch the new board.
    pub fn advance_level(&mut self, obs: &mut dyn SessionObserver) {
        if self.state != SessionState::Won {
            return;
        }

        self.config = self.config.next();
        self.stats.level += 1;
        self.build_board();
        self.state = SessionState::Playing;
        log::debug!("advanced to level {}: {:?}", self.stats.level, self.config);
        obs.level_advanced(self.stats.level);
    }

    fn build_board(&mut self) {
        let minefield = generate_with(&mut self.rng, self.config);
        self.board = Some(GameBoard::new(minefield));
        self.level_started = Some(Instant::now());
    }

    fn settle(&mut self, outcome: OpenOutcome, obs: &mut dyn SessionObserver) {
        match outcome {
            OpenOutcome::Won => {
                self.stop_clock();
                self.state = SessionState::Won;
                obs.won();
                obs.record_result(&self.stats());
            }
            OpenOutcome::Exploded => {
                self.stop_clock();
                self.state = SessionState::Lost;
                if let Some(board) = self.board.as_mut() {
                    let mut updates = Vec::new();
                    board.reveal_mines(&mut updates);
                    flush(updates, obs);
                }
                obs.lost();
                obs.record_result(&self.stats());
            }
            OpenOutcome::Opened | OpenOutcome::Unchanged => {}
        }
    }

    fn stop_clock(&mut self) {
        self.banked += self.level_elapsed();
        self.level_started = None;
    }
}

fn flush(updates: Vec<CellUpdate>, obs: &mut dyn SessionObserver) {
    for update in updates {
        obs.cell_changed(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellState;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<CellUpdate>,
        wins: u32,
        losses: u32,
        levels: Vec<u32>,
        results: Vec<SessionStats>,
    }

    impl SessionObserver for Recorder {
        fn cell_changed(&mut self, update: CellUpdate) {
            self.updates.push(update);
        }
        fn won(&mut self) {
            self.wins += 1;
        }
        fn lost(&mut self) {
            self.losses += 1;
        }
        fn level_advanced(&mut self, level: u32) {
            self.levels.push(level);
        }
        fn record_result(&mut self, stats: &SessionStats) {
            self.results.push(*stats);
        }
    }

    /// 1x2 with one mine: the single safe cell wins on the first open,
    /// wherever the mine is, thanks to the safe-first-click rule.
    fn instant_win_config() -> LevelConfig {
        LevelConfig {
            rows: 1,
            cols: 2,
            mine_ratio: 0.5,
        }
    }

    /// 2x2 with one mine: the first open is safe and reveals a single
    /// numbered cell, leaving the mine findable via `has_mine_at`.
    fn one_mine_config() -> LevelConfig {
        LevelConfig {
            rows: 2,
            cols: 2,
            mine_ratio: 0.25,
        }
    }

    #[test]
    fn session_is_idle_until_started() {
        let mut session = GameSession::new(1);
        let mut rec = Recorder::default();

        session.open((0, 0), &mut rec);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.board().is_none());
        assert!(rec.updates.is_empty());
    }

    #[test]
    fn start_builds_a_board_and_enters_playing() {
        let mut session = GameSession::new(1);
        session.start();

        assert_eq!(session.state(), SessionState::Playing);
        let board = session.board().unwrap();
        assert_eq!(board.size(), (10, 8));
        assert_eq!(board.total_mines(), 9);
        assert_eq!(session.stats().level, 1);
    }

    #[test]
    fn winning_the_level_notifies_and_records() {
        let mut session = GameSession::with_config(instant_win_config(), 5);
        let mut rec = Recorder::default();
        session.start();

        session.open((0, 0), &mut rec);

        assert_eq!(session.state(), SessionState::Won);
        assert_eq!(rec.wins, 1);
        assert_eq!(rec.results.len(), 1);
        assert_eq!(rec.results[0].opened_count, 1);
        assert_eq!(session.stats().opened_count, 1);
    }

    #[test]
    fn advance_level_steps_the_difficulty_and_resumes_play() {
        let mut session = GameSession::with_config(instant_win_config(), 5);
        let mut rec = Recorder::default();
        session.start();
        session.open((0, 0), &mut rec);

        session.advance_level(&mut rec);

        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.stats().level, 2);
        assert_eq!(rec.levels, vec![2]);
        let next = session.config();
        assert!(next.rows >= 1 && next.cols >= 2);
        assert!(session.board().is_some());
    }

    #[test]
    fn advance_level_outside_won_is_ignored() {
        let mut session = GameSession::with_config(instant_win_config(), 5);
        let mut rec = Recorder::default();
        session.start();

        session.advance_level(&mut rec);
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.stats().level, 1);
        assert!(rec.levels.is_empty());
    }

    #[test]
    fn restart_cancels_a_pending_advance() {
        let mut session = GameSession::with_config(instant_win_config(), 5);
        let mut rec = Recorder::default();
        session.start();
        session.open((0, 0), &mut rec);
        assert_eq!(session.state(), SessionState::Won);

        session.restart();
        // the host's advance timer fires late, after the restart
        session.advance_level(&mut rec);

        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.stats().level, 1);
        assert!(rec.levels.is_empty());
    }

    #[test]
    fn hitting_a_mine_loses_and_reveals_the_minefield() {
        let mut session = GameSession::with_config(one_mine_config(), 9);
        let mut rec = Recorder::default();
        session.start();

        // first open is always safe on this board and cannot cascade,
        // every cell neighbors the single mine
        session.open((0, 0), &mut rec);
        assert_eq!(session.state(), SessionState::Playing);

        let board = session.board().unwrap();
        let mine = (0..2)
            .flat_map(|r| (0..2).map(move |c| (r, c)))
            .find(|&pos| board.has_mine_at(pos))
            .unwrap();

        session.open(mine, &mut rec);

        assert_eq!(session.state(), SessionState::Lost);
        assert_eq!(rec.losses, 1);
        assert_eq!(rec.results.len(), 1);
        assert!(rec
            .updates
            .iter()
            .any(|update| update.view == CellView::Mine));

        // further input is ignored
        let before = rec.updates.len();
        session.open((0, 0), &mut rec);
        session.toggle_flag((0, 0), &mut rec);
        assert_eq!(rec.updates.len(), before);
    }

    #[test]
    fn flag_totals_count_placements_only() {
        let mut session = GameSession::with_config(one_mine_config(), 2);
        let mut rec = Recorder::default();
        session.start();

        session.toggle_flag((1, 1), &mut rec);
        session.toggle_flag((1, 1), &mut rec);
        session.toggle_flag((1, 1), &mut rec);

        assert_eq!(session.stats().flagged_count, 2);
        assert_eq!(session.board().unwrap().flagged_count(), 1);
        assert_eq!(session.board().unwrap().cell((1, 1)), CellState::Flagged);
    }

    #[test]
    fn out_of_bounds_input_is_silently_ignored() {
        let mut session = GameSession::with_config(one_mine_config(), 2);
        let mut rec = Recorder::default();
        session.start();

        session.open((9, 9), &mut rec);
        session.toggle_flag((0, 200), &mut rec);
        session.chord((200, 0), &mut rec);

        assert_eq!(session.state(), SessionState::Playing);
        assert!(rec.updates.is_empty());
        assert_eq!(session.stats().opened_count, 0);
    }

    #[test]
    fn totals_accumulate_across_levels() {
        let mut session = GameSession::with_config(instant_win_config(), 11);
        let mut rec = Recorder::default();
        session.start();

        session.open((0, 0), &mut rec);
        session.advance_level(&mut rec);
        let opened_before = session.stats().opened_count;
        assert_eq!(opened_before, 1);

        // restart wipes the totals again
        session.restart();
        assert_eq!(session.stats().opened_count, 0);
        assert_eq!(session.stats().level, 1);
    }

    #[test]
    fn stats_snapshot_serializes() {
        let stats = SessionStats {
            level: 3,
            elapsed_seconds: 42,
            opened_count: 57,
            flagged_count: 6,
        };

        let json = serde_json::to_string(&stats).unwrap();
        let back: SessionStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
