use super::state::{ChatApp, ChatEntry};
use super::theme::Palette;
use crate::layout::{self, BubbleBody, BubbleSize};
use crate::markdown::wrap_line;
use crate::utf8_safe::{display_width, tail_by_columns, wrap_to_width};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span, Text},
    widgets::{
        block::{Position, Title},
        Block, BorderType, Borders, Paragraph,
    },
    Frame,
};

/// Render the history, the input box, and the status indicator.
pub(crate) fn draw(frame: &mut Frame<'_>, app: &mut ChatApp) {
    let palette = Palette::for_mode(app.dark_mode());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.size());

    draw_history(frame, app, &palette, chunks[0]);
    draw_input(frame, app, &palette, chunks[1]);
    draw_status(frame, app, &palette, chunks[2]);
}

fn measure_all(entries: &[ChatEntry], area_width: u16) -> Vec<BubbleSize> {
    entries
        .iter()
        .map(|entry| {
            layout::measure(
                &entry.body,
                entry.message.content.chars().count(),
                layout::header_cols(&entry.message),
                area_width,
            )
        })
        .collect()
}

/// Bubbles are stacked top to bottom; the view is anchored to the newest
/// message and scrolled up by `scroll_from_bottom` rows.
fn draw_history(frame: &mut Frame<'_>, app: &mut ChatApp, palette: &Palette, area: Rect) {
    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background)),
        area,
    );
    if area.height == 0 || area.width == 0 {
        return;
    }

    let sizes = measure_all(app.entries(), area.width);
    let total: u32 = sizes.iter().map(|size| u32::from(size.height)).sum();
    let viewport = u32::from(area.height);
    let max_scroll = total.saturating_sub(viewport);
    app.clamp_scroll(u16::try_from(max_scroll).unwrap_or(u16::MAX));
    let view_top = max_scroll.saturating_sub(u32::from(app.scroll_from_bottom()));
    let view_bottom = view_top + viewport;

    let mut top = 0u32;
    for (entry, size) in app.entries().iter().zip(sizes) {
        let bottom = top + u32::from(size.height);
        let bubble_top = top;
        top = bottom;
        if bottom <= view_top || bubble_top >= view_bottom {
            continue;
        }
        let clipped_above = view_top.saturating_sub(bubble_top);
        let visible_top = bubble_top.max(view_top);
        let visible_bottom = bottom.min(view_bottom);
        let height = u16::try_from(visible_bottom - visible_top).unwrap_or(area.height);
        let y = area.y + u16::try_from(visible_top - view_top).unwrap_or(0);
        let width = size.width.min(area.width);
        let x = if entry.message.is_user {
            area.x + area.width - width
        } else {
            area.x
        };
        let skip = u16::try_from(clipped_above).unwrap_or(u16::MAX);
        render_bubble(frame, entry, size, skip, palette, Rect::new(x, y, width, height));
    }
}

fn render_bubble(
    frame: &mut Frame<'_>,
    entry: &ChatEntry,
    size: BubbleSize,
    skip_rows: u16,
    palette: &Palette,
    rect: Rect,
) {
    let message = &entry.message;
    let is_user = message.is_user;

    let mut tags = vec![Span::styled(
        format!(" {} ", layout::role_label(is_user)),
        palette.role_tag(is_user),
    )];
    if is_user {
        if let Some(source) = message.source {
            tags.push(Span::raw(" "));
            tags.push(Span::styled(
                format!(" {} ", source.label()),
                palette.source_tag(source),
            ));
        }
    }
    let time = Span::styled(
        message.timestamp.format("%H:%M:%S").to_string(),
        palette.timestamp(),
    );
    let time_alignment = if is_user {
        Alignment::Right
    } else {
        Alignment::Left
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(palette.bubble_border(is_user))
        .title(Title::from(Line::from(tags)))
        .title(
            Title::from(time)
                .alignment(time_alignment)
                .position(Position::Bottom),
        );

    // Rows are wrapped here; the paragraph itself never wraps.
    let body = body_lines(&entry.body, size.inner_width(), is_user, palette);
    let paragraph = Paragraph::new(body)
        .block(block)
        .style(palette.body(is_user))
        .scroll((skip_rows, 0));
    frame.render_widget(paragraph, rect);
}

fn body_lines(body: &BubbleBody, width: usize, is_user: bool, palette: &Palette) -> Text<'static> {
    match body {
        BubbleBody::Plain(text) => {
            let style = palette.body(is_user);
            Text::from(
                wrap_to_width(text, width)
                    .into_iter()
                    .map(|row| Line::from(Span::styled(row, style)))
                    .collect::<Vec<_>>(),
            )
        }
        BubbleBody::Markdown(lines) => {
            let mut rows = Vec::new();
            for line in lines {
                for row in wrap_line(line, width) {
                    let spans: Vec<Span<'static>> = row
                        .into_iter()
                        .map(|part| {
                            let style = palette.markdown(line.block, part.inline);
                            Span::styled(part.text, style)
                        })
                        .collect();
                    rows.push(Line::from(spans));
                }
            }
            Text::from(rows)
        }
    }
}

fn draw_input(frame: &mut Frame<'_>, app: &ChatApp, palette: &Palette, area: Rect) {
    let inner_width = usize::from(area.width.saturating_sub(2));
    // Keep one column free for the cursor.
    let visible = tail_by_columns(app.input_text(), inner_width.saturating_sub(1));
    let hints = Line::from(vec![
        Span::styled(" Enter ", palette.hint_key()),
        Span::styled("send  ", palette.hint()),
        Span::styled("Ctrl+S ", palette.hint_key()),
        Span::styled("stop voice  ", palette.hint()),
        Span::styled("Ctrl+D ", palette.hint_key()),
        Span::styled("theme  ", palette.hint()),
        Span::styled("Ctrl+C ", palette.hint_key()),
        Span::styled("quit ", palette.hint()),
    ]);
    let body = if app.input_text().is_empty() {
        Line::from(Span::styled("Type your message here...", palette.hint()))
    } else {
        Line::from(visible.to_string())
    };
    let input = Paragraph::new(body)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(palette.border())
                .title(Span::styled(" Message ", palette.hint_key()))
                .title_bottom(hints),
        )
        .style(palette.input());
    frame.render_widget(input, area);

    let cursor_offset = u16::try_from(display_width(visible)).unwrap_or(u16::MAX);
    let cursor_x = area
        .x
        .saturating_add(1)
        .saturating_add(cursor_offset.min(area.width.saturating_sub(2)));
    frame.set_cursor(cursor_x, area.y.saturating_add(1));
}

fn draw_status(frame: &mut Frame<'_>, app: &ChatApp, palette: &Palette, area: Rect) {
    let status = app.status();
    let mut spans = vec![Span::styled(
        format!(" {} ", status.display_text()),
        palette.status(status),
    )];
    if let Some(notice) = app.notice() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(notice.to_string(), palette.hint()));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(palette.border())
        .title(Span::styled(" Status ", palette.hint()));
    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .block(block)
            .style(Style::default().bg(palette.background)),
        area,
    );
}
