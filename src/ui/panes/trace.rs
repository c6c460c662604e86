//! Trace pane rendering
//!
//! Lists recorded parser events, indented by rule depth, with the event
//! the viewer is positioned on highlighted and kept in view.

use crate::trace::{TraceEvent, TraceLog};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Padding, Paragraph},
    Frame,
};

fn event_style(event: &TraceEvent) -> Style {
    let style = Style::default();
    match event {
        TraceEvent::Enter { .. } => style.fg(DEFAULT_THEME.fg),
        TraceEvent::Exit { matched: true, .. } => style.fg(DEFAULT_THEME.success),
        TraceEvent::Exit { .. } => style.fg(DEFAULT_THEME.comment),
        TraceEvent::MemoHit { .. } => style.fg(DEFAULT_THEME.primary),
        TraceEvent::Grow { .. } => style.fg(DEFAULT_THEME.secondary),
        TraceEvent::SecondPass => style.fg(DEFAULT_THEME.error).add_modifier(Modifier::BOLD),
    }
}

/// First visible row so that `selected` stays on screen.
pub(crate) fn follow(selected: usize, offset: usize, visible: usize, total: usize) -> usize {
    let mut offset = offset;
    if selected < offset {
        offset = selected;
    } else if selected >= offset + visible {
        offset = selected + 1 - visible;
    }
    offset.min(total.saturating_sub(visible))
}

/// Render the trace pane
pub fn render_trace_pane(
    frame: &mut Frame,
    area: Rect,
    trace: &TraceLog,
    position: usize,
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

    let title = if trace.dropped() > 0 {
        format!(
            " Parse Trace ({} dropped past {}) ",
            trace.dropped(),
            trace.limit()
        )
    } else {
        " Parse Trace ".to_string()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    if trace.is_empty() {
        let paragraph = Paragraph::new("(no events recorded)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    *scroll_offset = follow(position, *scroll_offset, visible_height, trace.len());

    let items: Vec<ListItem> = trace
        .events()
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(idx, event)| {
            let mut style = event_style(event);
            if idx == position {
                style = style.bg(DEFAULT_THEME.current_line_bg).add_modifier(Modifier::BOLD);
            }
            ListItem::new(format!("{:>6} {}", idx + 1, event)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_keeps_selection_visible() {
        assert_eq!(follow(0, 0, 10, 100), 0);
        assert_eq!(follow(15, 0, 10, 100), 6);
        assert_eq!(follow(3, 6, 10, 100), 3);
        assert_eq!(follow(99, 95, 10, 100), 90);
        assert_eq!(follow(2, 0, 10, 4), 0);
    }
}
