use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

static ASSET_DIR: Dir = include_dir!("assets");

/// Minimum usable pool sizes per content kind. A fetched set smaller than
/// this is replaced wholesale by the bundled defaults so a session always
/// has enough material to run.
pub const MIN_STATEMENTS: usize = 1;
pub const MIN_QUESTIONS: usize = 1;
pub const MIN_PUZZLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Statement,
    Question,
    Fragment,
}

/// A headline shown as a shootable target. `deceptive` marks hoax items;
/// shooting a genuine one is the wrong move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: String,
    pub text: String,
    pub deceptive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

/// A sentence split into fragments; `fragments` is the correct reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub fragments: Vec<String>,
}

/// Everything a session might draw from, fetched once at session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSet {
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub puzzles: Vec<Puzzle>,
}

impl ContentSet {
    /// Substitute bundled defaults for any kind that came back too small.
    /// Never fails: an unreachable or empty backing store degrades to the
    /// built-in sets.
    pub fn with_fallbacks(mut self) -> Self {
        let bundled = bundled_content();
        if self.statements.len() < MIN_STATEMENTS {
            self.statements = bundled.statements;
        }
        if self.questions.len() < MIN_QUESTIONS {
            self.questions = bundled.questions;
        }
        if self.puzzles.len() < MIN_PUZZLES {
            self.puzzles = bundled.puzzles;
        }
        self
    }

    pub fn len_of(&self, kind: ContentKind) -> usize {
        match kind {
            ContentKind::Statement => self.statements.len(),
            ContentKind::Question => self.questions.len(),
            ContentKind::Fragment => self.puzzles.len(),
        }
    }
}

/// Source of gameable content. Implementations may hit disk or a remote
/// store; callers apply `with_fallbacks` so fetch failures never hard-fail
/// a session start.
pub trait ContentProvider {
    fn fetch(&self) -> io::Result<ContentSet>;
}

/// Reads a single JSON document with `statements` / `questions` / `puzzles`
/// arrays. Missing keys deserialize to empty lists.
#[derive(Debug, Clone)]
pub struct FileContentProvider {
    path: PathBuf,
}

impl FileContentProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ContentProvider for FileContentProvider {
    fn fetch(&self) -> io::Result<ContentSet> {
        let bytes = fs::read(&self.path)?;
        serde_json::from_slice(&bytes).map_err(io::Error::other)
    }
}

/// Always-empty provider; sessions started with it run entirely on the
/// bundled defaults.
#[derive(Debug, Clone, Default)]
pub struct EmptyContentProvider;

impl ContentProvider for EmptyContentProvider {
    fn fetch(&self) -> io::Result<ContentSet> {
        Ok(ContentSet::default())
    }
}

/// Fetch from a provider and degrade to bundled content on error or when a
/// set is below its minimum. This is the only fetch entry point the session
/// controller uses.
pub fn fetch_or_fallback(provider: &dyn ContentProvider) -> ContentSet {
    provider
        .fetch()
        .unwrap_or_default()
        .with_fallbacks()
}

/// Bundled default sets, embedded at compile time. The asset travels inside
/// the binary, so a missing or unparsable file is a build defect and panics
/// instead of surfacing as a runtime `Result`.
pub fn bundled_content() -> ContentSet {
    let file = ASSET_DIR
        .get_file("default_content.json")
        .expect("bundled content asset present");
    serde_json::from_slice(file.contents()).expect("bundled content asset parses")
}
