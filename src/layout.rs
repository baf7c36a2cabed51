//! Bubble sizing in terminal columns.
//!
//! A bubble is a bordered box whose top border carries the role and source
//! tags and whose bottom border carries the time, so its height is the
//! wrapped body row count plus two.

use crate::markdown::{self, MdLine};
use crate::message::Message;
use crate::utf8_safe::{widest_line, wrap_to_width};

/// Hard cap on bubble width, borders included.
pub const MAX_BUBBLE_COLS: u16 = 81;
/// Share of the chat area a bubble may take.
const MAX_AREA_PERCENT: u32 = 80;
const SHORT_TEXT_CHARS: usize = 10;
const MEDIUM_TEXT_CHARS: usize = 30;
const SHORT_TEXT_MIN_COLS: u16 = 10;
const MEDIUM_TEXT_MIN_COLS: u16 = 15;
const MARKDOWN_MIN_COLS: u16 = 19;
const BORDER_COLS: u16 = 2;
const BORDER_ROWS: u16 = 2;
/// "HH:MM:SS" in the bottom border.
const TIMESTAMP_COLS: usize = 8;

pub fn role_label(is_user: bool) -> &'static str {
    if is_user {
        "User"
    } else {
        "Assistant"
    }
}

/// Columns the border labels need. Source tags are only shown on user
/// messages.
pub fn header_cols(message: &Message) -> u16 {
    let mut cols = role_label(message.is_user).len() + 2;
    if message.is_user {
        if let Some(source) = message.source {
            cols += source.label().len() + 3;
        }
    }
    u16::try_from(cols.max(TIMESTAMP_COLS)).unwrap_or(u16::MAX)
}

/// Parsed body of a bubble, ready for wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleBody {
    Plain(String),
    Markdown(Vec<MdLine>),
}

impl BubbleBody {
    /// User messages are never rendered as markdown.
    pub fn for_message(message: &Message) -> Self {
        if !message.is_user && markdown::looks_like_markdown(&message.content) {
            BubbleBody::Markdown(markdown::render_markdown(&message.content))
        } else {
            BubbleBody::Plain(message.content.clone())
        }
    }

    pub fn is_markdown(&self) -> bool {
        matches!(self, BubbleBody::Markdown(_))
    }

    fn content_width(&self, inner: usize) -> usize {
        match self {
            BubbleBody::Plain(text) => widest_line(&wrap_to_width(text, inner)),
            BubbleBody::Markdown(lines) => markdown::wrapped_width(lines, inner),
        }
    }

    /// Body rows when wrapped to `inner` columns (never zero).
    pub fn rows(&self, inner: usize) -> usize {
        let rows = match self {
            BubbleBody::Plain(text) => wrap_to_width(text, inner).len(),
            BubbleBody::Markdown(lines) => markdown::wrapped_height(lines, inner),
        };
        rows.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleSize {
    /// Outer width including borders.
    pub width: u16,
    /// Outer height including borders.
    pub height: u16,
}

impl BubbleSize {
    pub fn inner_width(self) -> usize {
        usize::from(self.width.saturating_sub(BORDER_COLS)).max(1)
    }
}

/// Widest bubble allowed in an area `area_width` columns wide.
pub fn max_bubble_width(area_width: u16) -> u16 {
    let share = u32::from(area_width) * MAX_AREA_PERCENT / 100;
    let share = u16::try_from(share).unwrap_or(u16::MAX);
    share.min(MAX_BUBBLE_COLS).max(BORDER_COLS + 1)
}

fn min_bubble_width(body: &BubbleBody, char_count: usize) -> u16 {
    if body.is_markdown() {
        MARKDOWN_MIN_COLS
    } else if char_count < SHORT_TEXT_CHARS {
        SHORT_TEXT_MIN_COLS
    } else if char_count < MEDIUM_TEXT_CHARS {
        MEDIUM_TEXT_MIN_COLS
    } else {
        0
    }
}

/// Size a bubble for `body` inside an area `area_width` columns wide.
///
/// `char_count` is the character length of the raw message text; short
/// messages get a minimum width so their bubbles do not collapse. The bubble
/// is also kept wide enough for `header_cols` of border labels.
pub fn measure(
    body: &BubbleBody,
    char_count: usize,
    header_cols: u16,
    area_width: u16,
) -> BubbleSize {
    let max_width = max_bubble_width(area_width);
    let max_inner = usize::from(max_width - BORDER_COLS).max(1);
    let content = body.content_width(max_inner);
    let content = u16::try_from(content).unwrap_or(u16::MAX);
    let wanted = content
        .saturating_add(BORDER_COLS)
        .max(min_bubble_width(body, char_count))
        .max(header_cols.saturating_add(BORDER_COLS));
    let width = wanted.min(max_width);
    let inner = usize::from(width.saturating_sub(BORDER_COLS)).max(1);
    let rows = u16::try_from(body.rows(inner)).unwrap_or(u16::MAX);
    BubbleSize {
        width,
        height: rows.saturating_add(BORDER_ROWS),
    }
}

/// Convenience wrapper measuring a message directly.
pub fn measure_message(message: &Message, area_width: u16) -> (BubbleBody, BubbleSize) {
    let body = BubbleBody::for_message(message);
    let size = measure(
        &body,
        message.content.chars().count(),
        header_cols(message),
        area_width,
    );
    (body, size)
}
