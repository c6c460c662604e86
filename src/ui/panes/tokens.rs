//! Token buffer pane rendering

use crate::tokenizer::{Mark, TokenInfo};
use crate::ui::panes::trace::follow;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Padding, Paragraph},
    Frame,
};

/// Render the buffered tokens, one per row, marking the token at `mark`.
pub fn render_tokens_pane(
    frame: &mut Frame,
    area: Rect,
    tokens: &[TokenInfo],
    mark: Option<Mark>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };

    let block = Block::default()
        .title(format!(" Tokens ({}) ", tokens.len()))
        .borders(Borders::ALL)
        .border_style(border_style);

    if tokens.is_empty() {
        let paragraph = Paragraph::new("(no tokens)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    if let Some(mark) = mark {
        *scroll_offset = follow(mark.min(tokens.len() - 1), *scroll_offset, visible_height, tokens.len());
    }

    let items: Vec<ListItem> = tokens
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(idx, tok)| {
            let selected = mark == Some(idx);
            let base = if selected {
                Style::default()
                    .bg(DEFAULT_THEME.token_bg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let line = Line::from(vec![
                Span::styled(format!("{:>5} ", idx), base.fg(DEFAULT_THEME.comment)),
                Span::styled(
                    format!("{:>5}-{:<5} ", tok.start.to_string(), tok.end.to_string()),
                    base.fg(DEFAULT_THEME.comment),
                ),
                Span::styled(format!("{:<14} ", tok.kind.name()), base.fg(DEFAULT_THEME.primary)),
                Span::styled(format!("{:?}", tok.text), base.fg(DEFAULT_THEME.fg)),
            ]);
            ListItem::new(line)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
