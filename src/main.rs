pub mod config;
pub mod content;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod stats;
pub mod target;
pub mod timer;
pub mod ui;

use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::content::{bundled_content, fetch_or_fallback, FileContentProvider};
use crate::runtime::{
    CrosstermEventSource, FixedTicker, GameEvent, GameEventSource, Runner, Ticker,
};
use crate::scoring::{Mode, Side};
use crate::session::{Session, SessionConfig, SessionStatus};
use crate::stats::{LeaderboardEntry, MemoryStatsStore, SessionResult, StatsDb, StatsStore};
use crate::ui::{
    keyed_targets, ui, LEFT_OPTION_KEYS, LEFT_TARGET_KEYS, LEFT_TRAY_KEYS, RIGHT_OPTION_KEYS,
    RIGHT_TARGET_KEYS, RIGHT_TRAY_KEYS, SOLO_TARGET_KEYS,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use time_humanize::{Accuracy, HumanTime, Tense};

const TICK_RATE_MS: u64 = 100;
const LEADERBOARD_SIZE: usize = 10;

/// terminal arcade trainer for spotting hoax headlines
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal arcade trainer for spotting hoax headlines: shoot fake news solo, or face a friend in hoax-shooting, quiz, and sentence-puzzle duels. Scores land on a local leaderboard."
)]
pub struct Cli {
    /// game mode to play
    #[clap(short = 'm', long, value_enum, default_value_t = Mode::Hoax)]
    mode: Mode,

    /// session length in seconds
    #[clap(short = 's', long)]
    time_limit: Option<u32>,

    /// name of player one
    #[clap(long)]
    player_one: Option<String>,

    /// name of player two (duel modes)
    #[clap(long)]
    player_two: Option<String>,

    /// JSON content file overriding the bundled headline/question/puzzle sets
    #[clap(short = 'c', long)]
    content: Option<PathBuf>,

    /// fixed RNG seed for reproducible sessions
    #[clap(long)]
    seed: Option<u64>,

    /// persist the given time limit, player names and content path as defaults
    #[clap(long)]
    save_config: bool,

    /// print the top scores for the selected mode and exit
    #[clap(long)]
    leaderboard: bool,

    /// write the full session history as CSV to stdout and exit
    #[clap(long)]
    export_csv: bool,
}

impl Cli {
    /// Merge CLI flags over the persisted config into one session config.
    fn to_session_config(&self, stored: &Config) -> SessionConfig {
        let content = match self.content.as_ref().or(stored.content_path.as_ref()) {
            Some(path) => fetch_or_fallback(&FileContentProvider::new(path)),
            None => bundled_content(),
        };
        let mut cfg = SessionConfig::new(self.mode, content);
        cfg.time_limit_secs = self.time_limit.unwrap_or(stored.time_limit_secs);
        let one = self
            .player_one
            .clone()
            .unwrap_or_else(|| stored.player_one.clone());
        let two = self
            .player_two
            .clone()
            .unwrap_or_else(|| stored.player_two.clone());
        cfg.player_names = vec![one, two];
        cfg.seed = self.seed;
        cfg
    }

    /// The stored config with this invocation's overrides folded in.
    fn to_config(&self, stored: &Config) -> Config {
        Config {
            time_limit_secs: self.time_limit.unwrap_or(stored.time_limit_secs),
            player_one: self
                .player_one
                .clone()
                .unwrap_or_else(|| stored.player_one.clone()),
            player_two: self
                .player_two
                .clone()
                .unwrap_or_else(|| stored.player_two.clone()),
            content_path: self.content.clone().or_else(|| stored.content_path.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Ready,
    Playing,
    Results,
    Leaderboard,
}

#[derive(Debug)]
pub struct App {
    pub config: SessionConfig,
    pub session: Session,
    pub state: AppState,
    pub last_result: Option<SessionResult>,
    pub board: Vec<LeaderboardEntry>,
    pub status_line: Option<String>,
}

impl App {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: Session::new(config.clone()),
            config,
            state: AppState::Ready,
            last_result: None,
            board: Vec::new(),
            status_line: None,
        }
    }

    /// Play again: a fresh session with the same settings, started at once.
    pub fn reset(&mut self) {
        self.session = Session::new(self.config.clone());
        self.last_result = None;
        self.session.start();
        self.state = AppState::Playing;
    }

    /// Take the session's single result and hand it to the stats store.
    /// Safe to call on every ended-session sighting; only the first call per
    /// session yields a result to submit.
    pub fn finish(&mut self, store: &mut dyn StatsStore) {
        if let Some(result) = self.session.final_result() {
            if let Err(e) = store.record_session(&result) {
                self.status_line = Some(format!("could not save result: {e}"));
            }
            self.last_result = Some(result);
        }
        self.state = AppState::Results;
    }

    fn load_board(&mut self, store: &mut dyn StatsStore) {
        match store.leaderboard(self.session.mode, LEADERBOARD_SIZE) {
            Ok(entries) => self.board = entries,
            Err(e) => self.status_line = Some(format!("could not read leaderboard: {e}")),
        }
        self.state = AppState::Leaderboard;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn shoot(session: &mut Session, side: Side, keys: &[char], pressed: char) {
    if let Some((_, id)) = keyed_targets(session, side, keys)
        .into_iter()
        .find(|(k, _)| *k == pressed)
    {
        session.interact(id, side);
    }
}

fn recall_last(session: &mut Session, side: Side) {
    if let Some(view) = session.puzzle_view(side) {
        if !view.placed.is_empty() {
            session.recall_fragment(side, view.placed.len() - 1);
        }
    }
}

fn handle_playing_key(app: &mut App, code: KeyCode) {
    let session = &mut app.session;
    match session.mode {
        Mode::Hoax => {
            if let KeyCode::Char(c) = code {
                shoot(session, Side::Solo, &SOLO_TARGET_KEYS, c);
            }
        }
        Mode::HoaxDuel => {
            if let KeyCode::Char(c) = code {
                shoot(session, Side::Left, &LEFT_TARGET_KEYS, c);
                shoot(session, Side::Right, &RIGHT_TARGET_KEYS, c);
            }
        }
        Mode::QuizDuel => match code {
            KeyCode::Enter => session.advance_question(),
            KeyCode::Char(c) => {
                if let Some(i) = LEFT_OPTION_KEYS.iter().position(|k| *k == c) {
                    session.answer(Side::Left, i);
                } else if let Some(i) = RIGHT_OPTION_KEYS.iter().position(|k| *k == c) {
                    session.answer(Side::Right, i);
                }
            }
            _ => {}
        },
        Mode::PuzzleDuel => {
            if let KeyCode::Char(c) = code {
                if let Some(i) = LEFT_TRAY_KEYS.iter().position(|k| *k == c) {
                    session.place_fragment(Side::Left, i);
                } else if let Some(i) = RIGHT_TRAY_KEYS.iter().position(|k| *k == c) {
                    session.place_fragment(Side::Right, i);
                } else if c == 'z' {
                    recall_last(session, Side::Left);
                } else if c == 'm' {
                    recall_last(session, Side::Right);
                }
            }
        }
    }
}

fn handle_key(app: &mut App, store: &mut dyn StatsStore, key: KeyEvent) -> Flow {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Flow::Quit;
    }

    match app.state {
        AppState::Ready => match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => {
                app.session.start();
                app.state = AppState::Playing;
            }
            KeyCode::Char('l') => app.load_board(store),
            KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
            _ => {}
        },
        AppState::Playing => match key.code {
            KeyCode::Esc => {
                app.session.stop();
                app.finish(store);
            }
            code => {
                handle_playing_key(app, code);
                if app.session.status() == SessionStatus::Ended {
                    app.finish(store);
                }
            }
        },
        AppState::Results => match key.code {
            KeyCode::Char('r') => app.reset(),
            KeyCode::Char('l') => app.load_board(store),
            KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
            _ => {}
        },
        AppState::Leaderboard => match key.code {
            KeyCode::Char('b') | KeyCode::Backspace => {
                app.state = if app.last_result.is_some() {
                    AppState::Results
                } else {
                    AppState::Ready
                };
            }
            KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
            _ => {}
        },
    }
    Flow::Continue
}

fn run_app<B: Backend, E: GameEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &mut dyn StatsStore,
    runner: &mut Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;

        match runner.step() {
            GameEvent::Tick(delta_ms) => {
                if app.state == AppState::Playing {
                    app.session.on_tick(delta_ms);
                    if app.session.status() == SessionStatus::Ended {
                        app.finish(store);
                    }
                }
            }
            GameEvent::Resize => {}
            GameEvent::Key(key) => {
                if handle_key(app, store, key) == Flow::Quit {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn open_store(app: &mut App) -> Box<dyn StatsStore> {
    match StatsDb::new() {
        Ok(db) => Box::new(db),
        Err(e) => {
            // keep playing; scores just will not persist this run
            app.status_line = Some(format!("stats store unavailable: {e}"));
            Box::new(MemoryStatsStore::default())
        }
    }
}

fn print_leaderboard(mode: Mode) -> Result<(), Box<dyn Error>> {
    let db = StatsDb::new()?;
    let entries = db.leaderboard(mode, LEADERBOARD_SIZE)?;
    if entries.is_empty() {
        println!("no scores recorded for {mode} yet");
        return Ok(());
    }
    println!("top scores: {mode}");
    let now = chrono::Local::now();
    for (i, e) in entries.iter().enumerate() {
        let age_secs = (now - e.finished_at).num_seconds().max(0) as u64;
        let when = HumanTime::from(Duration::from_secs(age_secs))
            .to_text_en(Accuracy::Rough, Tense::Past);
        println!("{:>2}. {:<20} {:>6}  {}", i + 1, e.player, e.score, when);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.export_csv {
        let db = StatsDb::new()?;
        db.export_csv(io::stdout())?;
        return Ok(());
    }
    if cli.leaderboard {
        return print_leaderboard(cli.mode);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let stored = config_store.load();
    if cli.save_config {
        if let Err(e) = config_store.save(&cli.to_config(&stored)) {
            eprintln!("could not save config: {e}");
        }
    }
    let session_config = cli.to_session_config(&stored);
    let mut app = App::new(session_config);
    let mut store = open_store(&mut app);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = run_app(&mut terminal, &mut app, store.as_mut(), &mut runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
