use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
    Frame,
};
use itertools::Itertools;
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

use crate::scoring::{Mode, Side};
use crate::session::{EndReason, Session};
use crate::stats::LeaderboardEntry;
use crate::{App, AppState};

pub const SOLO_TARGET_KEYS: [char; 9] = ['1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub const LEFT_TARGET_KEYS: [char; 5] = ['a', 's', 'd', 'f', 'g'];
pub const RIGHT_TARGET_KEYS: [char; 5] = ['h', 'j', 'k', 'l', ';'];
pub const LEFT_OPTION_KEYS: [char; 4] = ['a', 's', 'd', 'f'];
pub const RIGHT_OPTION_KEYS: [char; 4] = ['h', 'j', 'k', 'l'];
pub const LEFT_TRAY_KEYS: [char; 6] = ['1', '2', '3', '4', '5', '6'];
pub const RIGHT_TRAY_KEYS: [char; 6] = ['q', 'w', 'e', 'r', 't', 'y'];

/// Live targets for one stream paired with their hotkeys, in spawn order.
/// The renderer and the key dispatcher both go through this so a key always
/// hits the target it is drawn next to.
pub fn keyed_targets(session: &Session, side: Side, keys: &[char]) -> Vec<(char, u64)> {
    session
        .targets_on(side)
        .iter()
        .sorted_by_key(|t| t.id)
        .zip(keys.iter())
        .map(|(t, k)| (*k, t.id))
        .collect()
}

/// Truncate to a display width, appending an ellipsis when cut.
fn fit(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        if out.width() + 2 > max_width {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

fn end_reason_label(reason: Option<EndReason>) -> &'static str {
    match reason {
        Some(EndReason::TimeUp) => "TIME UP",
        Some(EndReason::LivesExhausted) => "OUT OF LIVES",
        Some(EndReason::QuestionsExhausted) => "ALL QUESTIONS ANSWERED",
        Some(EndReason::Stopped) => "STOPPED",
        None => "",
    }
}

fn hud_line(session: &Session) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut spans = vec![Span::styled(
        format!(
            " {}  {}:{:02} ",
            session.mode,
            session.time_remaining_secs() / 60,
            session.time_remaining_secs() % 60
        ),
        bold,
    )];
    for p in session.participants() {
        let mut label = format!("  {} {}", p.name, p.score);
        if let Some(lives) = p.lives_remaining {
            label.push(' ');
            for _ in 0..lives {
                label.push('♥');
            }
        }
        spans.push(Span::styled(label, bold.fg(Color::Cyan)));
    }
    Line::from(spans)
}

fn render_targets(session: &Session, side: Side, keys: &[char], pane: Rect, buf: &mut Buffer) {
    if pane.width < 6 || pane.height == 0 {
        return;
    }
    let keyed = keyed_targets(session, side, keys);
    for target in session.targets_on(side).iter().sorted_by_key(|t| t.id) {
        let key = keyed
            .iter()
            .find(|(_, id)| *id == target.id)
            .map(|(k, _)| *k);
        let label = match key {
            Some(k) => format!("[{k}] {}", target.statement.text),
            None => format!("    {}", target.statement.text),
        };
        let x = pane.x + (target.position.x / 100.0 * (pane.width.saturating_sub(1)) as f64) as u16;
        let y = pane.y + (target.position.y / 100.0 * (pane.height.saturating_sub(1)) as f64) as u16;
        let room = (pane.x + pane.width).saturating_sub(x) as usize;
        let style = Style::default().add_modifier(Modifier::BOLD);
        buf.set_string(x, y, fit(&label, room), style);
    }
}

fn render_hoax(session: &Session, area: Rect, buf: &mut Buffer) {
    match session.mode {
        Mode::Hoax => render_targets(session, Side::Solo, &SOLO_TARGET_KEYS, area, buf),
        Mode::HoaxDuel => {
            let panes = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(area);
            for (side, keys, pane) in [
                (Side::Left, &LEFT_TARGET_KEYS, panes[0]),
                (Side::Right, &RIGHT_TARGET_KEYS, panes[1]),
            ] {
                let named = session
                    .participant(side)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                let block = Block::default().borders(Borders::ALL).title(named);
                let inner = block.inner(pane);
                block.render(pane, buf);
                render_targets(session, side, keys, inner, buf);
            }
        }
        _ => {}
    }
}

fn render_quiz(session: &Session, area: Rect, buf: &mut Buffer) {
    let Some((question, answered, index, total)) = session.current_question() else {
        return;
    };
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Question {}/{}", index + 1, total),
            dim,
        )),
        Line::from(""),
        Line::from(Span::styled(question.text.clone(), bold)),
        Line::from(""),
    ];
    for (i, option) in question.options.iter().enumerate() {
        let left = LEFT_OPTION_KEYS.get(i).copied().unwrap_or('?');
        let right = RIGHT_OPTION_KEYS.get(i).copied().unwrap_or('?');
        lines.push(Line::from(format!("[{left}/{right}]  {option}")));
    }
    lines.push(Line::from(""));
    let marks = session
        .participants()
        .iter()
        .map(|p| {
            let done = answered[p.side.index()];
            format!("{} {}", p.name, if done { "✓" } else { "…" })
        })
        .join("    ");
    lines.push(Line::from(Span::styled(marks, dim)));
    if session.both_answered() {
        lines.push(Line::from(Span::styled("press enter for the next question", dim)));
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_puzzle(session: &Session, area: Rect, buf: &mut Buffer) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    for (side, keys, recall_key, pane) in [
        (Side::Left, &LEFT_TRAY_KEYS, 'z', panes[0]),
        (Side::Right, &RIGHT_TRAY_KEYS, 'm', panes[1]),
    ] {
        let Some(view) = session.puzzle_view(side) else {
            continue;
        };
        let named = session
            .participant(side)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let block = Block::default().borders(Borders::ALL).title(named);
        let inner = block.inner(pane);
        block.render(pane, buf);

        let mut lines = vec![Line::from(Span::styled(
            format!("Sentence {}/{}", view.index + 1, view.total),
            dim,
        ))];
        lines.push(Line::from(""));
        let placed = if view.placed.is_empty() {
            "_".to_string()
        } else {
            view.placed.iter().join(" ")
        };
        lines.push(Line::from(Span::styled(placed, bold)));
        lines.push(Line::from(""));
        if view.finished {
            lines.push(Line::from(Span::styled("all sentences done", dim)));
        } else if view.awaiting_advance {
            lines.push(Line::from(Span::styled(
                "correct! next sentence coming up",
                bold.fg(Color::Green),
            )));
        } else {
            for (i, frag) in view.tray.iter().enumerate() {
                let key = keys.get(i).copied().unwrap_or('?');
                lines.push(Line::from(format!("[{key}] {frag}")));
            }
            lines.push(Line::from(Span::styled(
                format!("[{recall_key}] take back last piece"),
                dim,
            )));
        }
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let mut lines = vec![
        Line::from(Span::styled(
            end_reason_label(app.session.end_reason()),
            bold.fg(Color::Yellow),
        )),
        Line::from(""),
    ];
    for p in app.session.participants() {
        lines.push(Line::from(Span::styled(
            format!(
                "{}  {} points  ({} right, {} wrong)",
                p.name, p.score, p.correct_count, p.incorrect_count
            ),
            bold,
        )));
    }
    if let Some(result) = &app.last_result {
        lines.push(Line::from(""));
        match result.winner() {
            Some(winner) => lines.push(Line::from(Span::styled(
                format!("{} wins!", winner.name),
                bold.fg(Color::Green),
            ))),
            None if result.participants.len() > 1 => {
                lines.push(Line::from(Span::styled("it's a tie", bold)))
            }
            None => {}
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(r) play again  (l) leaderboard  (esc) quit",
        dim,
    )));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_ready(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let lines = vec![
        Line::from(Span::styled("HOAXBUSTER", bold.fg(Color::Cyan))),
        Line::from(""),
        Line::from(Span::styled(format!("mode: {}", app.session.mode), bold)),
        Line::from(""),
        Line::from(Span::styled(
            "(enter) start  (l) leaderboard  (esc) quit",
            dim,
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // HUD
                Constraint::Min(1),    // play area
                Constraint::Length(1), // status line
            ])
            .split(area);

        Paragraph::new(hud_line(&self.session)).render(chunks[0], buf);

        match self.state {
            AppState::Ready => render_ready(self, chunks[1], buf),
            AppState::Playing => match self.session.mode {
                Mode::Hoax | Mode::HoaxDuel => render_hoax(&self.session, chunks[1], buf),
                Mode::QuizDuel => render_quiz(&self.session, chunks[1], buf),
                Mode::PuzzleDuel => render_puzzle(&self.session, chunks[1], buf),
            },
            AppState::Results => render_results(self, chunks[1], buf),
            AppState::Leaderboard => {} // drawn by render_leaderboard via ui()
        }

        if let Some(status) = &self.status_line {
            Paragraph::new(Span::styled(
                status.clone(),
                Style::default().fg(Color::Red),
            ))
            .render(chunks[2], buf);
        }
    }
}

pub fn render_leaderboard(mode: Mode, entries: &[LeaderboardEntry], f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let now = chrono::Local::now();
    let rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let age_secs = (now - e.finished_at).num_seconds().max(0) as u64;
            let when = HumanTime::from(std::time::Duration::from_secs(age_secs))
                .to_text_en(Accuracy::Rough, Tense::Past);
            Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(e.player.clone()),
                Cell::from(e.score.to_string()),
                Cell::from(when),
            ])
        })
        .collect();

    let header = Row::new(vec!["#", "player", "score", "when"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let table = Table::new(
        rows,
        &[
            Constraint::Length(4),
            Constraint::Length(20),
            Constraint::Length(8),
            Constraint::Min(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Leaderboard: {mode}")),
    );
    f.render_widget(table, chunks[0]);

    let hint = Paragraph::new(Span::styled(
        "(b) back  (esc) quit",
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center);
    f.render_widget(hint, chunks[1]);
}

pub fn ui(app: &App, f: &mut Frame) {
    match app.state {
        AppState::Leaderboard => render_leaderboard(app.session.mode, &app.board, f),
        _ => f.render_widget(app, f.area()),
    }
}
