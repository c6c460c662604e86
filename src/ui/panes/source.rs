//! Source pane rendering
//!
//! Shows the program being parsed, styled from the tokens the tokenizer has
//! buffered so far. The token under the current trace event gets a
//! highlighted background and, when the parse failed, the reported error
//! range is painted in the error color.
//!
//! Text that no buffered token covers (comments, whitespace, and anything
//! past the point where the parser stopped reading) is drawn plain, except
//! that a `#` outside any token starts a comment.

use crate::parser::error::SyntaxError;
use crate::tokenizer::token::is_keyword;
use crate::tokenizer::{TokenInfo, TokenKind};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn token_style(tok: &TokenInfo) -> Style {
    let style = Style::default();
    match tok.kind {
        TokenKind::Name if is_keyword(&tok.text) => style
            .fg(DEFAULT_THEME.keyword)
            .add_modifier(Modifier::BOLD),
        TokenKind::String
        | TokenKind::FStringStart
        | TokenKind::FStringMiddle
        | TokenKind::FStringEnd
        | TokenKind::SearchPath => style.fg(DEFAULT_THEME.string),
        TokenKind::Number => style.fg(DEFAULT_THEME.number),
        TokenKind::MacroParam => style
            .fg(DEFAULT_THEME.secondary)
            .add_modifier(Modifier::ITALIC),
        TokenKind::Op if tok.text.len() > 1 && tok.text.ends_with(&['(', '[', '{'][..]) => {
            style.fg(DEFAULT_THEME.shell)
        }
        TokenKind::Op if tok.text == "$" || tok.text == "!" => style.fg(DEFAULT_THEME.shell),
        TokenKind::ErrorToken => style.fg(DEFAULT_THEME.error),
        _ => style.fg(DEFAULT_THEME.fg),
    }
}

/// Character range `tok` covers on physical line `line_no`.
fn columns_on_line(tok: &TokenInfo, line_no: usize, width: usize) -> Option<(usize, usize)> {
    if line_no < tok.start.line || line_no > tok.end.line {
        return None;
    }
    let start = if line_no == tok.start.line {
        tok.start.column
    } else {
        0
    };
    let end = if line_no == tok.end.line {
        tok.end.column
    } else {
        width
    };
    let (start, end) = (start.min(width), end.min(width));
    (start < end).then_some((start, end))
}

/// Style one physical line. Styles are assigned per character, then
/// collapsed into runs.
fn highlight_line(
    line_no: usize,
    line: &str,
    tokens: &[TokenInfo],
    current: Option<&TokenInfo>,
    error: Option<&SyntaxError>,
) -> Vec<Span<'static>> {
    let chars: Vec<char> = line.chars().collect();
    let width = chars.len();
    let mut styles = vec![Style::default().fg(DEFAULT_THEME.fg); width];
    let mut covered = vec![false; width];

    for tok in tokens {
        if let Some((start, end)) = columns_on_line(tok, line_no, width) {
            let style = token_style(tok);
            for col in start..end {
                styles[col] = style;
                covered[col] = true;
            }
        }
    }

    if let Some(hash) = (0..width).find(|&col| !covered[col] && chars[col] == '#') {
        for col in hash..width {
            if !covered[col] {
                styles[col] = Style::default().fg(DEFAULT_THEME.comment);
            }
        }
    }

    if let Some((start, end)) = current.and_then(|tok| columns_on_line(tok, line_no, width)) {
        for style in &mut styles[start..end] {
            *style = style.bg(DEFAULT_THEME.token_bg).add_modifier(Modifier::BOLD);
        }
    }

    if let Some(err) = error.filter(|err| err.start.line == line_no) {
        let start = err.start.column.min(width);
        let end = if err.end.line == line_no && err.end.column > err.start.column {
            err.end.column.min(width)
        } else {
            (start + 1).min(width)
        };
        for style in &mut styles[start..end] {
            *style = Style::default()
                .bg(DEFAULT_THEME.error)
                .fg(ratatui::style::Color::White)
                .add_modifier(Modifier::BOLD);
        }
    }

    let mut spans = Vec::new();
    let mut run_start = 0;
    for col in 1..=width {
        if col == width || styles[col] != styles[run_start] {
            let text: String = chars[run_start..col].iter().collect();
            spans.push(Span::styled(text, styles[run_start]));
            run_start = col;
        }
    }
    spans
}

/// Scroll state for the source pane
pub struct SourceScrollState {
    pub offset: usize,
    /// Visual row the current line is pinned to while stepping.
    pub target_line_row: Option<usize>,
}

impl SourceScrollState {
    pub fn new() -> Self {
        SourceScrollState {
            offset: 0,
            target_line_row: None,
        }
    }
}

impl Default for SourceScrollState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the source pane draws.
pub struct SourceRenderData<'a> {
    pub source: &'a str,
    pub tokens: &'a [TokenInfo],
    pub current: Option<&'a TokenInfo>,
    pub error: Option<&'a SyntaxError>,
}

/// Render the source code pane
pub fn render_source_pane(
    frame: &mut Frame,
    area: Rect,
    data: &SourceRenderData,
    is_focused: bool,
    scroll_state: &mut SourceScrollState,
) {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };

    let block = Block::default()
        .title(" Source ")
        .borders(Borders::ALL)
        .border_style(border_style);

    let lines: Vec<&str> = data.source.lines().collect();
    let total_lines = lines.len();
    let current_line = data
        .current
        .map(|tok| tok.start.line)
        .or_else(|| data.error.map(|err| err.start.line))
        .unwrap_or(0);

    let visible_height = area.height.saturating_sub(2).max(1) as usize;

    let target_row = scroll_state
        .target_line_row
        .unwrap_or(visible_height / 2)
        .min(visible_height.saturating_sub(1));
    scroll_state.target_line_row = Some(target_row);

    // Keep the current line at the pinned row
    if current_line > 0 && current_line <= total_lines {
        scroll_state.offset = (current_line - 1).saturating_sub(target_row);
        if total_lines > visible_height {
            scroll_state.offset = scroll_state.offset.min(total_lines - visible_height);
        } else {
            scroll_state.offset = 0;
        }
    }

    let visible_lines: Vec<Line> = lines
        .iter()
        .enumerate()
        .skip(scroll_state.offset)
        .take(visible_height)
        .map(|(idx, line)| {
            let line_no = idx + 1;
            let is_current = line_no == current_line;
            let num_style = if is_current {
                Style::default()
                    .fg(DEFAULT_THEME.secondary)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(DEFAULT_THEME.comment)
            };

            let mut spans = vec![Span::styled(format!("{:4} ", line_no), num_style)];
            let mut content = highlight_line(line_no, line, data.tokens, data.current, data.error);
            if is_current {
                for span in &mut content {
                    span.style = Style::default()
                        .bg(DEFAULT_THEME.current_line_bg)
                        .patch(span.style);
                }
            }
            spans.extend(content);
            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(visible_lines).block(block);
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_all;

    fn text(spans: &[Span]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_highlight_keeps_text_intact() {
        let source = "if x:  # note\n";
        let tokens = tokenize_all(source).unwrap();
        let spans = highlight_line(1, "if x:  # note", &tokens, None, None);
        assert_eq!(text(&spans), "if x:  # note");
        assert_eq!(spans[0].content, "if");
        assert!(spans[0].style.add_modifier.contains(Modifier::BOLD));
        let comment = spans.last().unwrap();
        assert_eq!(comment.content, "# note");
        assert_eq!(comment.style.fg, Some(DEFAULT_THEME.comment));
    }

    #[test]
    fn test_current_token_is_highlighted() {
        let tokens = tokenize_all("a + bc\n").unwrap();
        let current = tokens.iter().find(|t| t.text == "bc");
        let spans = highlight_line(1, "a + bc", &tokens, current, None);
        let last = spans.last().unwrap();
        assert_eq!(last.content, "bc");
        assert_eq!(last.style.bg, Some(DEFAULT_THEME.token_bg));
    }

    #[test]
    fn test_multiline_token_columns() {
        let tokens = tokenize_all("s = '''a\nbc'''\n").unwrap();
        let string = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(columns_on_line(string, 1, 8), Some((4, 8)));
        assert_eq!(columns_on_line(string, 2, 5), Some((0, 5)));
        assert_eq!(columns_on_line(string, 3, 0), None);
    }
}
