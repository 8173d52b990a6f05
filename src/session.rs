use crate::content::{Puzzle, Question, Statement};
use crate::scoring::{apply_outcome, Mode, Outcome, Participant, Side};
use crate::stats::SessionResult;
use crate::target::{Position, Target, TargetRegistry};
use crate::timer::{Scheduler, TaskId};
use chrono::Local;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

pub const CLOCK_INTERVAL_MS: u64 = 1000;
pub const TARGET_TTL_MS: u64 = 3000;
pub const DUEL_SPAWN_GATE: f64 = 0.7;
pub const PUZZLE_ADVANCE_DELAY_MS: u64 = 2000;
pub const QUIZ_QUESTIONS_PER_SESSION: usize = 10;
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    TimeUp,
    LivesExhausted,
    QuestionsExhausted,
    Stopped,
}

/// Everything the engine schedules. One repeating clock, one repeating
/// spawner, a one-shot expiry per live target, and a one-shot advance delay
/// per solved puzzle.
#[derive(Clone, Debug, PartialEq)]
enum Task {
    ClockTick,
    SpawnTick,
    TargetExpiry(u64),
    PuzzleAdvance(Side),
}

/// Owned handles for every outstanding scheduled callback of one session.
/// Released exactly once, on termination; nothing can fire afterwards.
#[derive(Debug, Default)]
struct TimerScope {
    clock: Option<TaskId>,
    spawner: Option<TaskId>,
    expiries: HashMap<u64, TaskId>,
    puzzle_waits: [Option<TaskId>; 2],
}

impl TimerScope {
    fn release(&mut self, scheduler: &mut Scheduler<Task>) {
        if let Some(id) = self.clock.take() {
            scheduler.cancel(id);
        }
        if let Some(id) = self.spawner.take() {
            scheduler.cancel(id);
        }
        for (_, id) in self.expiries.drain() {
            scheduler.cancel(id);
        }
        for slot in &mut self.puzzle_waits {
            if let Some(id) = slot.take() {
                scheduler.cancel(id);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: Mode,
    pub time_limit_secs: u32,
    pub player_names: Vec<String>,
    pub content: crate::content::ContentSet,
    /// Fixed RNG seed for reproducible sessions; tests rely on this.
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(mode: Mode, content: crate::content::ContentSet) -> Self {
        Self {
            mode,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            player_names: Vec::new(),
            content,
            seed: None,
        }
    }
}

#[derive(Debug)]
struct QuizState {
    questions: Vec<Question>,
    current: usize,
    answered: [bool; 2],
}

#[derive(Debug)]
struct PuzzleSide {
    index: usize,
    placed: Vec<String>,
    tray: Vec<String>,
    awaiting_advance: bool,
    finished: bool,
}

/// Read-only view of one player's puzzle board.
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleView {
    pub index: usize,
    pub total: usize,
    pub placed: Vec<String>,
    pub tray: Vec<String>,
    pub awaiting_advance: bool,
    pub finished: bool,
}

/// Read-only state for rendering; taking one never mutates the engine.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub status: SessionStatus,
    pub time_limit_secs: u32,
    pub time_remaining_secs: u32,
    pub targets: Vec<Target>,
    pub participants: Vec<Participant>,
    pub end_reason: Option<EndReason>,
    pub ignored_events: u32,
}

/// One play-through: owns the clock, the spawner, the target registry and
/// the participants, and sequences idle, running, ended. A fresh `Session`
/// is built for play-again; an ended one only hands out its result.
#[derive(Debug)]
pub struct Session {
    pub mode: Mode,
    status: SessionStatus,
    time_limit_secs: u32,
    time_remaining_secs: u32,
    participants: Vec<Participant>,
    registry: TargetRegistry,
    statements: Vec<Statement>,
    puzzles: Vec<Puzzle>,
    quiz: Option<QuizState>,
    puzzle_sides: Vec<PuzzleSide>,
    scheduler: Scheduler<Task>,
    timers: TimerScope,
    rng: StdRng,
    player_names: Vec<String>,
    next_target_id: u64,
    started_at_ms: u64,
    ended_at_ms: u64,
    end_reason: Option<EndReason>,
    result_emitted: bool,
    ignored_events: u32,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let sides = Side::for_mode(config.mode);
        let mut player_names = config.player_names;
        for (i, side) in sides.iter().enumerate() {
            let fallback = match side {
                Side::Solo => "player",
                Side::Left => "player 1",
                Side::Right => "player 2",
            };
            if player_names.len() <= i {
                player_names.push(fallback.to_string());
            } else if player_names[i].trim().is_empty() {
                player_names[i] = fallback.to_string();
            }
        }
        player_names.truncate(sides.len());
        let participants = sides
            .iter()
            .enumerate()
            .map(|(i, side)| Participant::new(*side, player_names[i].clone(), config.mode))
            .collect();

        Self {
            mode: config.mode,
            status: SessionStatus::Idle,
            time_limit_secs: config.time_limit_secs,
            time_remaining_secs: config.time_limit_secs,
            participants,
            registry: TargetRegistry::new(),
            statements: config.content.statements,
            puzzles: config.content.puzzles,
            quiz: Self::build_quiz(config.mode, config.content.questions),
            puzzle_sides: Vec::new(),
            scheduler: Scheduler::new(),
            timers: TimerScope::default(),
            rng,
            player_names,
            next_target_id: 1,
            started_at_ms: 0,
            ended_at_ms: 0,
            end_reason: None,
            result_emitted: false,
            ignored_events: 0,
        }
    }

    fn build_quiz(mode: Mode, questions: Vec<Question>) -> Option<QuizState> {
        if mode != Mode::QuizDuel {
            return None;
        }
        Some(QuizState {
            questions,
            current: 0,
            answered: [false, false],
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, side: Side) -> Option<&Participant> {
        self.participants.iter().find(|p| p.side == side)
    }

    pub fn ignored_events(&self) -> u32 {
        self.ignored_events
    }

    pub fn puzzles(&self) -> &[Puzzle] {
        &self.puzzles
    }

    /// Transition idle to running: reset per-play state and arm the clock
    /// and (for target modes) the spawner. Starting anything but an idle
    /// session is ignored.
    pub fn start(&mut self) {
        if self.status != SessionStatus::Idle {
            self.ignored_events += 1;
            return;
        }
        self.status = SessionStatus::Running;
        self.time_remaining_secs = self.time_limit_secs;
        self.started_at_ms = self.scheduler.now_ms();
        self.participants = Side::for_mode(self.mode)
            .iter()
            .enumerate()
            .map(|(i, side)| Participant::new(*side, self.player_names[i].clone(), self.mode))
            .collect();

        self.timers.clock = Some(self.scheduler.every(CLOCK_INTERVAL_MS, Task::ClockTick));
        if self.mode.uses_targets() {
            self.timers.spawner = Some(
                self.scheduler
                    .every(self.mode.spawn_interval_ms(), Task::SpawnTick),
            );
        }
        if let Some(quiz) = self.quiz.as_mut() {
            quiz.questions.shuffle(&mut self.rng);
            quiz.questions.truncate(QUIZ_QUESTIONS_PER_SESSION);
            quiz.current = 0;
            quiz.answered = [false, false];
        }
        if self.mode == Mode::PuzzleDuel {
            self.puzzle_sides = (0..2).map(|_| self.fresh_puzzle_side(0)).collect();
        }
    }

    fn fresh_puzzle_side(&mut self, index: usize) -> PuzzleSide {
        let mut tray = self
            .puzzles
            .get(index)
            .map(|p| p.fragments.clone())
            .unwrap_or_default();
        tray.shuffle(&mut self.rng);
        PuzzleSide {
            index,
            placed: Vec::new(),
            tray,
            awaiting_advance: false,
            finished: false,
        }
    }

    /// Advance the engine by `delta_ms` of host time, firing whatever came
    /// due. Once a task in the batch terminates the session, the remainder
    /// of the batch observes `Ended` and no-ops.
    pub fn on_tick(&mut self, delta_ms: u64) {
        if self.status != SessionStatus::Running {
            return;
        }
        for task in self.scheduler.advance(delta_ms) {
            if self.status != SessionStatus::Running {
                self.ignored_events += 1;
                continue;
            }
            self.dispatch(task);
        }
    }

    fn dispatch(&mut self, task: Task) {
        match task {
            Task::ClockTick => {
                self.time_remaining_secs = self.time_remaining_secs.saturating_sub(1);
                if self.time_remaining_secs == 0 {
                    self.end(EndReason::TimeUp);
                }
            }
            Task::SpawnTick => self.spawn_targets(),
            Task::TargetExpiry(id) => {
                // The interaction may have claimed this target first; a
                // missing id is the expected race outcome, not an error.
                self.timers.expiries.remove(&id);
                self.registry.remove_if_present(id);
            }
            Task::PuzzleAdvance(side) => self.advance_puzzle(side),
        }
    }

    fn spawn_targets(&mut self) {
        if self.statements.is_empty() {
            return; // nothing in the pool, try again next tick
        }
        match self.mode {
            Mode::Hoax => self.spawn_one(Side::Solo),
            Mode::HoaxDuel => {
                for side in [Side::Left, Side::Right] {
                    if self.rng.gen_bool(DUEL_SPAWN_GATE) {
                        self.spawn_one(side);
                    }
                }
            }
            _ => {}
        }
    }

    fn spawn_one(&mut self, side: Side) {
        let statement = self.statements[self.rng.gen_range(0..self.statements.len())].clone();
        // Bands keep targets clear of the HUD strip at the top of the play
        // area; the duel panes are narrower so targets sit further left.
        let position = match self.mode {
            Mode::Hoax => Position {
                x: 10.0 + self.rng.gen::<f64>() * 70.0,
                y: 15.0 + self.rng.gen::<f64>() * 60.0,
            },
            _ => Position {
                x: self.rng.gen::<f64>() * 85.0,
                y: 5.0 + self.rng.gen::<f64>() * 70.0,
            },
        };
        let id = self.next_target_id;
        self.next_target_id += 1;
        let now = self.scheduler.now_ms();
        self.registry.insert(Target {
            id,
            statement,
            side,
            position,
            spawned_at_ms: now,
            expires_at_ms: now + TARGET_TTL_MS,
        });
        let timer = self.scheduler.once(TARGET_TTL_MS, Task::TargetExpiry(id));
        self.timers.expiries.insert(id, timer);
    }

    /// A player shoots a target. First claim wins: if the TTL expiry already
    /// removed the id this is a silent no-op. Duel targets can only be
    /// claimed from their own stream.
    pub fn interact(&mut self, target_id: u64, side: Side) -> Option<Outcome> {
        if self.status != SessionStatus::Running {
            self.ignored_events += 1;
            return None;
        }
        let owner = self
            .registry
            .iter()
            .find(|t| t.id == target_id)
            .map(|t| t.side);
        match owner {
            None => {
                self.ignored_events += 1;
                return None;
            }
            Some(owner) if owner != side => {
                self.ignored_events += 1;
                return None;
            }
            Some(_) => {}
        }
        let target = self.registry.remove_if_present(target_id)?;
        if let Some(timer) = self.timers.expiries.remove(&target_id) {
            self.scheduler.cancel(timer);
        }

        let outcome = if target.statement.deceptive {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };
        self.apply(side, outcome);
        if self.mode == Mode::Hoax {
            if let Some(p) = self.participant(side) {
                if p.out_of_lives() {
                    self.end(EndReason::LivesExhausted);
                }
            }
        }
        Some(outcome)
    }

    fn apply(&mut self, side: Side, outcome: Outcome) {
        let mode = self.mode;
        if let Some(p) = self.participants.iter_mut().find(|p| p.side == side) {
            apply_outcome(p, outcome, mode);
        }
    }

    /// Quiz duel: record one answer for `side` on the current question and
    /// lock that side until the question advances.
    pub fn answer(&mut self, side: Side, option_index: usize) -> Option<Outcome> {
        if self.status != SessionStatus::Running || self.mode != Mode::QuizDuel {
            self.ignored_events += 1;
            return None;
        }
        let already = match self.quiz.as_ref() {
            Some(quiz) => quiz.answered[side.index()],
            None => return None,
        };
        if already {
            self.ignored_events += 1;
            return None;
        }
        let quiz = self.quiz.as_mut()?;
        let question = quiz.questions.get(quiz.current)?;
        let outcome = if option_index == question.correct_index {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };
        quiz.answered[side.index()] = true;
        self.apply(side, outcome);
        Some(outcome)
    }

    pub fn current_question(&self) -> Option<(&Question, [bool; 2], usize, usize)> {
        let quiz = self.quiz.as_ref()?;
        let question = quiz.questions.get(quiz.current)?;
        Some((question, quiz.answered, quiz.current, quiz.questions.len()))
    }

    pub fn both_answered(&self) -> bool {
        self.quiz
            .as_ref()
            .map(|q| q.answered.iter().all(|a| *a))
            .unwrap_or(false)
    }

    /// Move to the next question once both players have answered. Running
    /// out of questions ends the session.
    pub fn advance_question(&mut self) {
        if self.status != SessionStatus::Running || self.mode != Mode::QuizDuel {
            self.ignored_events += 1;
            return;
        }
        if !self.both_answered() {
            return;
        }
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };
        if quiz.current + 1 < quiz.questions.len() {
            quiz.current += 1;
            quiz.answered = [false, false];
        } else {
            self.end(EndReason::QuestionsExhausted);
        }
    }

    /// Puzzle duel: move a tray fragment onto the board. Completing the
    /// sentence scores it; a wrong assembly clears the board and reshuffles
    /// that player's tray.
    pub fn place_fragment(&mut self, side: Side, tray_index: usize) -> Option<Outcome> {
        if self.status != SessionStatus::Running || self.mode != Mode::PuzzleDuel {
            self.ignored_events += 1;
            return None;
        }
        let idx = side.index();
        let correct = {
            let ps = self.puzzle_sides.get(idx)?;
            if ps.awaiting_advance || ps.finished || tray_index >= ps.tray.len() {
                return None;
            }
            self.puzzles.get(ps.index)?.fragments.clone()
        };

        let piece = self.puzzle_sides[idx].tray.remove(tray_index);
        self.puzzle_sides[idx].placed.push(piece);
        if self.puzzle_sides[idx].placed.len() < correct.len() {
            return None;
        }

        if self.puzzle_sides[idx].placed == correct {
            self.puzzle_sides[idx].awaiting_advance = true;
            self.timers.puzzle_waits[idx] = Some(
                self.scheduler
                    .once(PUZZLE_ADVANCE_DELAY_MS, Task::PuzzleAdvance(side)),
            );
            self.apply(side, Outcome::Correct);
            Some(Outcome::Correct)
        } else {
            let ps = &mut self.puzzle_sides[idx];
            ps.placed.clear();
            ps.tray = correct;
            ps.tray.shuffle(&mut self.rng);
            self.apply(side, Outcome::Incorrect);
            Some(Outcome::Incorrect)
        }
    }

    /// Return a placed fragment to the tray.
    pub fn recall_fragment(&mut self, side: Side, placed_index: usize) {
        if self.status != SessionStatus::Running || self.mode != Mode::PuzzleDuel {
            self.ignored_events += 1;
            return;
        }
        if let Some(ps) = self.puzzle_sides.get_mut(side.index()) {
            if !ps.awaiting_advance && placed_index < ps.placed.len() {
                let piece = ps.placed.remove(placed_index);
                ps.tray.push(piece);
            }
        }
    }

    fn advance_puzzle(&mut self, side: Side) {
        let idx = side.index();
        self.timers.puzzle_waits[idx] = None;
        let next = match self.puzzle_sides.get(idx) {
            Some(ps) => ps.index + 1,
            None => return,
        };
        if next < self.puzzles.len() {
            self.puzzle_sides[idx] = self.fresh_puzzle_side(next);
        } else if let Some(ps) = self.puzzle_sides.get_mut(idx) {
            ps.awaiting_advance = false;
            ps.finished = true;
        }
    }

    pub fn puzzle_view(&self, side: Side) -> Option<PuzzleView> {
        let ps = self.puzzle_sides.get(side.index())?;
        Some(PuzzleView {
            index: ps.index,
            total: self.puzzles.len(),
            placed: ps.placed.clone(),
            tray: ps.tray.clone(),
            awaiting_advance: ps.awaiting_advance,
            finished: ps.finished,
        })
    }

    /// Stop the session early. Safe to call repeatedly; once ended every
    /// further call is a counted no-op.
    pub fn stop(&mut self) {
        match self.status {
            SessionStatus::Running => self.end(EndReason::Stopped),
            _ => self.ignored_events += 1,
        }
    }

    /// Terminal transition. Idempotent: the first trigger wins, cancels all
    /// outstanding timers through the owned scope, clears the registry, and
    /// freezes participant state.
    fn end(&mut self, reason: EndReason) {
        if self.status == SessionStatus::Ended {
            return;
        }
        self.status = SessionStatus::Ended;
        self.end_reason = Some(reason);
        self.ended_at_ms = self.scheduler.now_ms();
        self.timers.release(&mut self.scheduler);
        self.registry.clear();
    }

    /// The single authoritative result, yielded at most once per session.
    /// `None` before termination and on every call after the first.
    pub fn final_result(&mut self) -> Option<SessionResult> {
        if self.status != SessionStatus::Ended || self.result_emitted {
            return None;
        }
        self.result_emitted = true;
        Some(SessionResult {
            mode: self.mode,
            participants: self.participants.clone(),
            elapsed_secs: (self.ended_at_ms - self.started_at_ms) as f64 / 1000.0,
            finished_at: Local::now(),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            status: self.status,
            time_limit_secs: self.time_limit_secs,
            time_remaining_secs: self.time_remaining_secs,
            targets: self.registry.iter().cloned().collect(),
            participants: self.participants.clone(),
            end_reason: self.end_reason,
            ignored_events: self.ignored_events,
        }
    }

    pub fn targets_on(&self, side: Side) -> Vec<Target> {
        self.registry.on_side(side).into_iter().cloned().collect()
    }

    #[cfg(test)]
    fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::bundled_content;
    use assert_matches::assert_matches;

    fn config(mode: Mode) -> SessionConfig {
        let mut cfg = SessionConfig::new(mode, bundled_content());
        cfg.seed = Some(7);
        cfg
    }

    fn running(mode: Mode) -> Session {
        let mut session = Session::new(config(mode));
        session.start();
        session
    }

    fn first_target_where(session: &Session, deceptive: bool) -> Option<Target> {
        session
            .snapshot()
            .targets
            .into_iter()
            .find(|t| t.statement.deceptive == deceptive)
    }

    /// Tick until a target with the wanted classification is live.
    fn spawn_until(session: &mut Session, deceptive: bool) -> Target {
        for _ in 0..200 {
            if let Some(t) = first_target_where(session, deceptive) {
                return t;
            }
            session.on_tick(100);
        }
        panic!("no target with deceptive={deceptive} spawned");
    }

    #[test]
    fn starts_idle_and_runs() {
        let mut session = Session::new(config(Mode::Hoax));
        assert_eq!(session.status(), SessionStatus::Idle);
        session.start();
        assert_eq!(session.status(), SessionStatus::Running);
        assert_eq!(session.time_remaining_secs(), 60);
        assert_eq!(session.participants().len(), 1);
    }

    #[test]
    fn double_start_is_ignored() {
        let mut session = running(Mode::Hoax);
        let before = session.ignored_events();
        session.start();
        assert_eq!(session.ignored_events(), before + 1);
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn clock_counts_down_monotonically() {
        let mut session = running(Mode::QuizDuel);
        let mut last = session.time_remaining_secs();
        for _ in 0..30 {
            session.on_tick(500);
            let now = session.time_remaining_secs();
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 45);
    }

    #[test]
    fn clock_exhaustion_ends_session_at_exactly_zero() {
        let mut cfg = config(Mode::QuizDuel);
        cfg.time_limit_secs = 3;
        let mut session = Session::new(cfg);
        session.start();

        session.on_tick(2999);
        assert_eq!(session.time_remaining_secs(), 1);
        assert_eq!(session.status(), SessionStatus::Running);

        session.on_tick(1);
        assert_eq!(session.time_remaining_secs(), 0);
        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.end_reason(), Some(EndReason::TimeUp));
    }

    #[test]
    fn spawner_populates_registry() {
        let mut session = running(Mode::Hoax);
        session.on_tick(1200);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.targets.len(), 1);
        let target = &snapshot.targets[0];
        assert!(target.position.x >= 10.0 && target.position.x <= 80.0);
        assert!(target.position.y >= 15.0 && target.position.y <= 75.0);
        assert_eq!(target.expires_at_ms - target.spawned_at_ms, TARGET_TTL_MS);
    }

    #[test]
    fn empty_pool_spawn_tick_is_noop() {
        let mut cfg = config(Mode::Hoax);
        cfg.content.statements.clear();
        let mut session = Session::new(cfg);
        session.start();
        session.on_tick(5000);
        assert!(session.snapshot().targets.is_empty());
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn targets_expire_after_ttl() {
        let mut session = running(Mode::Hoax);
        session.on_tick(1200);
        assert_eq!(session.snapshot().targets.len(), 1);
        // first expiry lands at 4200, well before more than two more spawns
        session.on_tick(3000);
        let ids: Vec<u64> = session.snapshot().targets.iter().map(|t| t.id).collect();
        assert!(!ids.contains(&1), "first target should have expired");
    }

    #[test]
    fn shooting_hoax_scores_and_removes() {
        let mut session = running(Mode::Hoax);
        let target = spawn_until(&mut session, true);

        let outcome = session.interact(target.id, Side::Solo);
        assert_matches!(outcome, Some(Outcome::Correct));
        assert!(session.snapshot().targets.iter().all(|t| t.id != target.id));
        assert_eq!(session.participant(Side::Solo).unwrap().score, 100);
    }

    #[test]
    fn interaction_wins_race_against_expiry() {
        let mut session = running(Mode::Hoax);
        session.on_tick(1200);
        let target = session.snapshot().targets[0].clone();

        // 1 ms before the 3000 ms TTL fires
        session.on_tick(TARGET_TTL_MS - 1);
        assert!(session.interact(target.id, Side::Solo).is_some());
        let after_claim = session.participant(Side::Solo).unwrap().clone();

        // the expiry deadline passes; it must be a no-op
        let ignored_before = session.ignored_events();
        session.on_tick(1);
        assert_eq!(session.participant(Side::Solo).unwrap(), &after_claim);
        assert_eq!(session.ignored_events(), ignored_before);
    }

    #[test]
    fn stale_interaction_is_silent_noop() {
        let mut session = running(Mode::Hoax);
        session.on_tick(1200);
        let target = session.snapshot().targets[0].clone();
        session.on_tick(TARGET_TTL_MS); // expiry claims it
        let before = session.participant(Side::Solo).unwrap().clone();

        assert!(session.interact(target.id, Side::Solo).is_none());
        assert_eq!(session.participant(Side::Solo).unwrap(), &before);
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn solo_scenario_two_hits_one_miss() {
        // two hoax hits then one genuine: 200 - 50 = 150, lives 2
        let mut cfg = config(Mode::Hoax);
        cfg.time_limit_secs = 600; // searching for specific targets takes ticks
        let mut session = Session::new(cfg);
        session.start();
        for _ in 0..2 {
            let t = spawn_until(&mut session, true);
            assert_matches!(session.interact(t.id, Side::Solo), Some(Outcome::Correct));
        }
        let t = spawn_until(&mut session, false);
        assert_matches!(session.interact(t.id, Side::Solo), Some(Outcome::Incorrect));

        let p = session.participant(Side::Solo).unwrap();
        assert_eq!(p.score, 150);
        assert_eq!(p.lives_remaining, Some(2));
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn losing_all_lives_ends_session() {
        let mut cfg = config(Mode::Hoax);
        cfg.time_limit_secs = 600;
        let mut session = Session::new(cfg);
        session.start();
        for _ in 0..3 {
            let t = spawn_until(&mut session, false);
            session.interact(t.id, Side::Solo);
        }
        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.end_reason(), Some(EndReason::LivesExhausted));
        assert!(session.snapshot().targets.is_empty());
    }

    #[test]
    fn duel_targets_claimable_only_from_own_stream() {
        let mut session = running(Mode::HoaxDuel);
        let mut left = None;
        for _ in 0..100 {
            session.on_tick(800);
            if let Some(t) = session.targets_on(Side::Left).first() {
                left = Some(t.clone());
                break;
            }
        }
        let left = left.expect("left stream spawns");

        assert!(session.interact(left.id, Side::Right).is_none());
        assert!(session.interact(left.id, Side::Left).is_some());
    }

    #[test]
    fn ended_session_ignores_everything() {
        let mut session = running(Mode::Hoax);
        let target = spawn_until(&mut session, true);
        session.stop();
        assert_eq!(session.status(), SessionStatus::Ended);
        let frozen = session.participants().to_vec();

        assert!(session.interact(target.id, Side::Solo).is_none());
        session.on_tick(10_000);
        session.stop();
        assert_eq!(session.participants(), frozen.as_slice());
        assert!(session.ignored_events() > 0);
    }

    #[test]
    fn termination_cancels_all_timers() {
        let mut session = running(Mode::Hoax);
        session.on_tick(1200);
        assert!(session.pending_tasks() > 0);
        session.stop();
        assert_eq!(session.pending_tasks(), 0);
    }

    #[test]
    fn result_emitted_exactly_once() {
        let mut session = running(Mode::Hoax);
        assert!(session.final_result().is_none()); // still running
        session.stop();

        let result = session.final_result().expect("first take yields result");
        assert_eq!(result.participants.len(), 1);
        assert_eq!(result.mode, Mode::Hoax);
        assert!(session.final_result().is_none());

        session.stop(); // second trigger must not re-arm emission
        assert!(session.final_result().is_none());
    }

    #[test]
    fn quiz_duel_locks_and_advances() {
        let mut session = running(Mode::QuizDuel);
        let (question, answered, index, _total) = session.current_question().unwrap();
        assert_eq!((index, answered), (0, [false, false]));
        let correct = question.correct_index;
        let wrong = (correct + 1) % question.options.len();

        assert_matches!(session.answer(Side::Left, correct), Some(Outcome::Correct));
        // locked: a second answer from the same side is rejected
        assert!(session.answer(Side::Left, correct).is_none());
        // not both answered yet, so advancing is a no-op
        session.advance_question();
        assert_eq!(session.current_question().unwrap().2, 0);

        assert_matches!(session.answer(Side::Right, wrong), Some(Outcome::Incorrect));
        assert!(session.both_answered());
        session.advance_question();
        assert_eq!(session.current_question().unwrap().2, 1);
        assert_eq!(session.current_question().unwrap().1, [false, false]);

        let left = session.participant(Side::Left).unwrap();
        let right = session.participant(Side::Right).unwrap();
        assert_eq!((left.score, left.correct_count), (10, 1));
        assert_eq!((right.score, right.correct_count), (0, 0));
    }

    #[test]
    fn quiz_exhaustion_ends_session() {
        let mut session = running(Mode::QuizDuel);
        let total = session.current_question().unwrap().3;
        for _ in 0..total {
            let q = session.current_question().unwrap().0.clone();
            session.answer(Side::Left, q.correct_index);
            session.answer(Side::Right, q.correct_index);
            session.advance_question();
        }
        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.end_reason(), Some(EndReason::QuestionsExhausted));
    }

    #[test]
    fn puzzle_correct_assembly_scores_and_schedules_advance() {
        let mut session = running(Mode::PuzzleDuel);
        let view = session.puzzle_view(Side::Left).unwrap();
        let correct = session.puzzles()[view.index].fragments.clone();

        let mut outcome = None;
        for piece in &correct {
            let view = session.puzzle_view(Side::Left).unwrap();
            let at = view.tray.iter().position(|f| f == piece).unwrap();
            outcome = session.place_fragment(Side::Left, at);
        }
        assert_matches!(outcome, Some(Outcome::Correct));
        let p = session.participant(Side::Left).unwrap();
        assert_eq!((p.score, p.correct_count), (10, 1));

        let view = session.puzzle_view(Side::Left).unwrap();
        assert!(view.awaiting_advance);
        // placements are frozen during the advance delay
        assert!(session.place_fragment(Side::Left, 0).is_none());

        session.on_tick(PUZZLE_ADVANCE_DELAY_MS);
        let view = session.puzzle_view(Side::Left).unwrap();
        assert_eq!(view.index, 1);
        assert!(view.placed.is_empty());
        assert!(!view.awaiting_advance);
        // the other side is untouched
        assert_eq!(session.puzzle_view(Side::Right).unwrap().index, 0);
    }

    #[test]
    fn puzzle_wrong_assembly_reshuffles() {
        let mut session = running(Mode::PuzzleDuel);
        let view = session.puzzle_view(Side::Left).unwrap();
        let correct = session.puzzles()[view.index].fragments.clone();
        assert_ne!(view.tray, correct, "seeded shuffle must permute the tray");

        // place the tray left to right, which is not the reading order
        let len = view.tray.len();
        let mut outcome = None;
        for _ in 0..len {
            outcome = session.place_fragment(Side::Left, 0);
        }
        assert_matches!(outcome, Some(Outcome::Incorrect));

        let p = session.participant(Side::Left).unwrap();
        assert_eq!((p.score, p.incorrect_count), (0, 1));
        let view = session.puzzle_view(Side::Left).unwrap();
        assert!(view.placed.is_empty());
        assert_eq!(view.tray.len(), len);
        assert_eq!(view.index, 0);
    }

    #[test]
    fn puzzle_recall_returns_piece_to_tray() {
        let mut session = running(Mode::PuzzleDuel);
        session.place_fragment(Side::Right, 0);
        let view = session.puzzle_view(Side::Right).unwrap();
        assert_eq!(view.placed.len(), 1);
        let tray_len = view.tray.len();

        session.recall_fragment(Side::Right, 0);
        let view = session.puzzle_view(Side::Right).unwrap();
        assert!(view.placed.is_empty());
        assert_eq!(view.tray.len(), tray_len + 1);
    }

    #[test]
    fn clock_exhaustion_silences_rest_of_batch() {
        let mut cfg = config(Mode::Hoax);
        cfg.time_limit_secs = 1;
        let mut session = Session::new(cfg);
        session.start();
        // the clock ends the session at 1000 ms; the spawn task due at
        // 1200 ms in the same advance batch must observe Ended and no-op
        let ignored_before = session.ignored_events();
        session.on_tick(1200);
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(session.snapshot().targets.is_empty());
        assert!(session.ignored_events() > ignored_before);
    }

    #[test]
    fn snapshot_never_mutates() {
        let mut session = running(Mode::Hoax);
        session.on_tick(1200);
        let snap_a = session.snapshot();
        let snap_b = session.snapshot();
        assert_eq!(snap_a.targets.len(), snap_b.targets.len());
        assert_eq!(snap_a.time_remaining_secs, snap_b.time_remaining_secs);
        assert_eq!(session.status(), SessionStatus::Running);
    }

    #[test]
    fn default_player_names_fill_in() {
        let session = Session::new(config(Mode::HoaxDuel));
        let names: Vec<&str> = session
            .participants()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["player 1", "player 2"]);
    }
}
