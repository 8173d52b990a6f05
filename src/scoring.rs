use crate::content::ContentKind;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const SOLO_LIVES: u32 = 3;

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    ValueEnum,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum Mode {
    /// solo hoax-shooting: +100 per hoax, -50 and a life per genuine headline
    Hoax,
    /// two-player hoax-shooting on split streams
    HoaxDuel,
    /// two-player quiz, one answer per player per question
    QuizDuel,
    /// two-player sentence assembly
    PuzzleDuel,
}

impl Mode {
    pub fn is_duel(&self) -> bool {
        !matches!(self, Mode::Hoax)
    }

    pub fn participant_count(&self) -> usize {
        if self.is_duel() {
            2
        } else {
            1
        }
    }

    /// Hoax modes spawn timed targets; quiz and puzzle advance on player
    /// action only.
    pub fn uses_targets(&self) -> bool {
        matches!(self, Mode::Hoax | Mode::HoaxDuel)
    }

    pub fn content_kind(&self) -> ContentKind {
        match self {
            Mode::Hoax | Mode::HoaxDuel => ContentKind::Statement,
            Mode::QuizDuel => ContentKind::Question,
            Mode::PuzzleDuel => ContentKind::Fragment,
        }
    }

    /// Spawn cadence for target modes, in milliseconds.
    pub fn spawn_interval_ms(&self) -> u64 {
        match self {
            Mode::Hoax => 1200,
            _ => 800,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Solo,
    Left,
    Right,
}

impl Side {
    pub fn index(&self) -> usize {
        match self {
            Side::Solo | Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn for_mode(mode: Mode) -> Vec<Side> {
        if mode.is_duel() {
            vec![Side::Left, Side::Right]
        } else {
            vec![Side::Solo]
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// Per-player score state. Mutated only by `apply_outcome`; the session
/// freezes it by refusing events once ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub side: Side,
    pub name: String,
    pub score: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub lives_remaining: Option<u32>,
}

impl Participant {
    pub fn new(side: Side, name: impl Into<String>, mode: Mode) -> Self {
        let lives_remaining = match mode {
            Mode::Hoax => Some(SOLO_LIVES),
            _ => None,
        };
        Self {
            side,
            name: name.into(),
            score: 0,
            correct_count: 0,
            incorrect_count: 0,
            lives_remaining,
        }
    }

    pub fn out_of_lives(&self) -> bool {
        self.lives_remaining == Some(0)
    }
}

/// Apply one classified outcome to a participant under the given mode's
/// rules. Scores never go below zero (`saturating_sub` is the clamp).
pub fn apply_outcome(participant: &mut Participant, outcome: Outcome, mode: Mode) {
    match (mode, outcome) {
        (Mode::Hoax, Outcome::Correct) => {
            participant.score += 100;
            participant.correct_count += 1;
        }
        (Mode::Hoax, Outcome::Incorrect) => {
            participant.score = participant.score.saturating_sub(50);
            participant.incorrect_count += 1;
            if let Some(lives) = participant.lives_remaining.as_mut() {
                *lives = lives.saturating_sub(1);
            }
        }
        (Mode::HoaxDuel, Outcome::Correct) => {
            participant.score += 10;
            participant.correct_count += 1;
        }
        (Mode::HoaxDuel, Outcome::Incorrect) => {
            participant.score = participant.score.saturating_sub(5);
            participant.incorrect_count += 1;
        }
        (Mode::QuizDuel | Mode::PuzzleDuel, Outcome::Correct) => {
            participant.score += 10;
            participant.correct_count += 1;
        }
        (Mode::QuizDuel | Mode::PuzzleDuel, Outcome::Incorrect) => {
            participant.incorrect_count += 1;
        }
    }
}
