//! Main TUI application state and logic

use crate::parser::error::SyntaxError;
use crate::tokenizer::{Mark, TokenInfo};
use crate::trace::{TraceEvent, TraceLog};
use crate::ui::panes::{self, ParseOutcome, SourceRenderData, SourceScrollState};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

/// Delay between events while auto-playing.
const PLAY_INTERVAL: Duration = Duration::from_millis(100);

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Source,
    Trace,
    Tokens,
}

impl FocusedPane {
    /// Move focus to the next pane (source -> trace -> tokens)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Source => FocusedPane::Trace,
            FocusedPane::Trace => FocusedPane::Tokens,
            FocusedPane::Tokens => FocusedPane::Source,
        }
    }

    /// Move focus to the previous pane
    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Source => FocusedPane::Tokens,
            FocusedPane::Trace => FocusedPane::Source,
            FocusedPane::Tokens => FocusedPane::Trace,
        }
    }
}

/// Replays a recorded parse over its source.
pub struct App {
    pub source: String,

    /// Tokens the tokenizer buffered during the parse
    pub tokens: Vec<TokenInfo>,

    pub trace: TraceLog,

    /// Set when the parse was rejected
    pub error: Option<SyntaxError>,

    /// Index of the trace event being shown
    pub position: usize,

    pub focused_pane: FocusedPane,

    pub source_scroll: SourceScrollState,
    pub trace_scroll: usize,
    pub tokens_scroll: usize,

    pub should_quit: bool,
    pub status_message: String,
    pub is_playing: bool,
    pub last_play_time: Instant,
}

impl App {
    pub fn new(
        source: String,
        tokens: Vec<TokenInfo>,
        trace: TraceLog,
        error: Option<SyntaxError>,
    ) -> Self {
        let status_message = match &error {
            Some(err) => format!("{}: {}", err.kind, err.message),
            None => String::from("Parsed successfully"),
        };
        App {
            source,
            tokens,
            trace,
            error,
            position: 0,
            focused_pane: FocusedPane::Trace,
            source_scroll: SourceScrollState::new(),
            trace_scroll: 0,
            tokens_scroll: 0,
            should_quit: false,
            status_message,
            is_playing: false,
            last_play_time: Instant::now(),
        }
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if self.is_playing && self.last_play_time.elapsed() >= PLAY_INTERVAL {
                if !self.step_forward() {
                    self.is_playing = false;
                    self.status_message = "Playback complete".to_string();
                }
                self.last_play_time = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn current_event(&self) -> Option<&TraceEvent> {
        self.trace.get(self.position)
    }

    /// Token mark the current event is looking at.
    pub fn current_mark(&self) -> Option<Mark> {
        self.current_event().map(TraceEvent::position)
    }

    pub fn current_token(&self) -> Option<&TokenInfo> {
        self.current_mark().and_then(|mark| self.tokens.get(mark))
    }

    fn outcome(&self) -> ParseOutcome {
        if self.error.is_some() {
            ParseOutcome::Rejected
        } else {
            ParseOutcome::Accepted
        }
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Panes above, status bar at bottom
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(main_chunks[0]);

        // Left column: Source (top) | Tokens (bottom)
        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(columns[0]);

        let mark = self.current_mark();
        let current = mark.and_then(|mark| self.tokens.get(mark));
        let data = SourceRenderData {
            source: &self.source,
            tokens: &self.tokens,
            current,
            error: self.error.as_ref(),
        };
        panes::render_source_pane(
            frame,
            left_rows[0],
            &data,
            self.focused_pane == FocusedPane::Source,
            &mut self.source_scroll,
        );

        panes::render_tokens_pane(
            frame,
            left_rows[1],
            &self.tokens,
            mark,
            self.focused_pane == FocusedPane::Tokens,
            &mut self.tokens_scroll,
        );

        panes::render_trace_pane(
            frame,
            columns[1],
            &self.trace,
            self.position,
            self.focused_pane == FocusedPane::Trace,
            &mut self.trace_scroll,
        );

        panes::render_status_bar(
            frame,
            main_chunks[1],
            &self.status_message,
            self.position,
            self.trace.len(),
            self.outcome(),
            self.is_playing,
        );
    }

    /// Handle keyboard events
    fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            // Number keys step forward N events directly
            KeyCode::Char(c @ '1'..='9') => {
                self.is_playing = false;
                let n = c.to_digit(10).unwrap_or(1) as usize;
                let stepped = (0..n).take_while(|_| self.step_forward()).count();
                self.status_message = format!("Stepped forward {} event(s)", stepped);
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Left => {
                self.is_playing = false;
                if self.step_backward() {
                    self.describe_position();
                }
            }
            KeyCode::Right => {
                self.is_playing = false;
                if self.step_forward() {
                    self.describe_position();
                }
            }
            KeyCode::Char('e') => {
                self.is_playing = false;
                match self.exit_of(self.position) {
                    Some(index) => {
                        self.position = index;
                        self.describe_position();
                    }
                    None => self.status_message = "Not at a rule entry".to_string(),
                }
            }
            KeyCode::Up => match self.focused_pane {
                FocusedPane::Source => {
                    if let Some(row) = self.source_scroll.target_line_row {
                        self.source_scroll.target_line_row = Some(row.saturating_add(1));
                    }
                }
                FocusedPane::Trace => {
                    self.step_backward();
                }
                FocusedPane::Tokens => {
                    self.jump_to_token(false);
                }
            },
            KeyCode::Down => match self.focused_pane {
                FocusedPane::Source => {
                    if let Some(row) = self.source_scroll.target_line_row {
                        self.source_scroll.target_line_row = Some(row.saturating_sub(1));
                    }
                }
                FocusedPane::Trace => {
                    self.step_forward();
                }
                FocusedPane::Tokens => {
                    self.jump_to_token(true);
                }
            },
            KeyCode::Char(' ') => {
                self.is_playing = !self.is_playing;
                self.status_message = if self.is_playing {
                    "Playing...".to_string()
                } else {
                    "Paused".to_string()
                };
            }
            KeyCode::Enter => {
                self.is_playing = false;
                self.position = self.trace.len().saturating_sub(1);
                self.status_message = "Jumped to end".to_string();
            }
            KeyCode::Backspace => {
                self.is_playing = false;
                self.position = 0;
                self.status_message = "Jumped to start".to_string();
            }
            _ => {}
        }
    }

    /// Advance one event. False at the end of the trace.
    fn step_forward(&mut self) -> bool {
        if self.position + 1 < self.trace.len() {
            self.position += 1;
            true
        } else {
            self.status_message = "Cannot step forward: end of trace".to_string();
            false
        }
    }

    fn step_backward(&mut self) -> bool {
        if self.position > 0 {
            self.position -= 1;
            true
        } else {
            self.status_message = "Cannot step backward: start of trace".to_string();
            false
        }
    }

    /// Index of the event that closes the rule entered at `index`.
    pub fn exit_of(&self, index: usize) -> Option<usize> {
        let TraceEvent::Enter { rule, mark, depth } = self.trace.get(index)? else {
            return None;
        };
        self.trace.events()[index + 1..]
            .iter()
            .position(|event| {
                matches!(event, TraceEvent::Exit { rule: r, mark: m, depth: d, .. }
                    if r == rule && m == mark && d == depth)
            })
            .map(|offset| index + 1 + offset)
    }

    /// Move to the nearest event looking at a later (or earlier) token.
    fn jump_to_token(&mut self, forward: bool) {
        let Some(mark) = self.current_mark() else {
            return;
        };
        let events = self.trace.events();
        let found = if forward {
            events[self.position..]
                .iter()
                .position(|event| event.position() > mark)
                .map(|offset| self.position + offset)
        } else {
            events[..self.position]
                .iter()
                .rposition(|event| event.position() < mark)
        };
        if let Some(index) = found {
            self.position = index;
            self.describe_position();
        }
    }

    fn describe_position(&mut self) {
        self.status_message = match self.current_token() {
            Some(tok) => format!("at {} {:?} ({})", tok.kind, tok.text, tok.start),
            None => "at end of input".to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let mut trace = TraceLog::new(100);
        trace.push(TraceEvent::Enter {
            rule: "sum",
            mark: 0,
            depth: 0,
        });
        trace.push(TraceEvent::Enter {
            rule: "term",
            mark: 0,
            depth: 1,
        });
        trace.push(TraceEvent::Exit {
            rule: "term",
            mark: 0,
            end: 1,
            matched: true,
            depth: 1,
        });
        trace.push(TraceEvent::Exit {
            rule: "sum",
            mark: 0,
            end: 3,
            matched: true,
            depth: 0,
        });
        App::new("1 + 2\n".to_string(), Vec::new(), trace, None)
    }

    #[test]
    fn test_exit_of_matches_rule_and_depth() {
        let app = app();
        assert_eq!(app.exit_of(0), Some(3));
        assert_eq!(app.exit_of(1), Some(2));
        assert_eq!(app.exit_of(2), None);
    }

    #[test]
    fn test_stepping_stops_at_the_ends() {
        let mut app = app();
        assert!(!app.step_backward());
        assert!(app.step_forward());
        assert!(app.step_forward());
        assert!(app.step_forward());
        assert!(!app.step_forward());
        assert_eq!(app.position, 3);
    }

    #[test]
    fn test_jump_to_later_token() {
        let mut app = app();
        app.jump_to_token(true);
        assert_eq!(app.position, 2);
        assert_eq!(app.current_mark(), Some(1));
        app.jump_to_token(false);
        assert_eq!(app.position, 1);
    }

    #[test]
    fn test_focus_cycles() {
        let pane = FocusedPane::Source;
        assert_eq!(pane.next().next().next(), pane);
        assert_eq!(pane.next().prev(), pane);
    }
}
