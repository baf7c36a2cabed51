use crate::markdown::{Block, Inline};
use crate::message::{SourceTag, Status};
use ratatui::style::{Color, Modifier, Style};

/// Colours for one theme. Toggling dark mode swaps the whole palette, so every
/// bubble is re-skinned on the next draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Palette {
    pub(super) background: Color,
    pub(super) user_bubble: Color,
    pub(super) user_text: Color,
    pub(super) assistant_bubble: Color,
    pub(super) assistant_text: Color,
    pub(super) user_role: Color,
    pub(super) assistant_role: Color,
    pub(super) timestamp: Color,
    pub(super) code: Color,
    pub(super) heading: Color,
    pub(super) link: Color,
    pub(super) border: Color,
    pub(super) input_text: Color,
    pub(super) hint: Color,
    pub(super) idle: Color,
}

const WHITE: Color = Color::Rgb(255, 255, 255);
const TEXT_SOURCE: Color = Color::Rgb(0x55, 0x55, 0x55);
const STT_SOURCE: Color = Color::Rgb(0x1E, 0x8E, 0x3E);
const LISTENING: Color = Color::Rgb(0x4C, 0xAF, 0x50);
const PROCESSING: Color = Color::Rgb(0x21, 0x96, 0xF3);
const SPEAKING: Color = Color::Rgb(0xFF, 0x98, 0x00);

const DARK: Palette = Palette {
    background: Color::Rgb(0x12, 0x12, 0x12),
    user_bubble: Color::Rgb(0xBB, 0x86, 0xFC),
    user_text: Color::Rgb(0xBB, 0x86, 0xFC),
    assistant_bubble: Color::Rgb(0x44, 0x44, 0x44),
    assistant_text: Color::Rgb(0xE0, 0xE0, 0xE0),
    user_role: Color::Rgb(0x9C, 0x27, 0xB0),
    assistant_role: Color::Rgb(0x67, 0x3A, 0xB7),
    timestamp: Color::Rgb(0xAA, 0xAA, 0xAA),
    code: Color::Rgb(0xE0, 0xC0, 0x80),
    heading: Color::Rgb(0xBB, 0x86, 0xFC),
    link: Color::Rgb(0x64, 0xB5, 0xF6),
    border: Color::Rgb(0x44, 0x44, 0x44),
    input_text: Color::Rgb(0xE0, 0xE0, 0xE0),
    hint: Color::Rgb(0x77, 0x77, 0x77),
    idle: Color::Rgb(0xBB, 0xBB, 0xBB),
};

const LIGHT: Palette = Palette {
    background: Color::Rgb(0xFF, 0xFF, 0xFF),
    user_bubble: Color::Rgb(0x21, 0x96, 0xF3),
    user_text: Color::Rgb(0x15, 0x65, 0xC0),
    assistant_bubble: Color::Rgb(0xCC, 0xCC, 0xCC),
    assistant_text: Color::Rgb(0x33, 0x33, 0x33),
    user_role: Color::Rgb(0x15, 0x65, 0xC0),
    assistant_role: Color::Rgb(0x00, 0x79, 0x6B),
    timestamp: Color::Rgb(0x77, 0x77, 0x77),
    code: Color::Rgb(0x8E, 0x24, 0xAA),
    heading: Color::Rgb(0x00, 0x79, 0x6B),
    link: Color::Rgb(0x19, 0x76, 0xD2),
    border: Color::Rgb(0xCC, 0xCC, 0xCC),
    input_text: Color::Rgb(0x33, 0x33, 0x33),
    hint: Color::Rgb(0x99, 0x99, 0x99),
    idle: Color::Rgb(0x77, 0x77, 0x77),
};

impl Palette {
    pub(super) fn for_mode(dark_mode: bool) -> Self {
        if dark_mode {
            DARK
        } else {
            LIGHT
        }
    }

    pub(super) fn bubble_border(&self, is_user: bool) -> Style {
        let color = if is_user {
            self.user_bubble
        } else {
            self.assistant_bubble
        };
        Style::default().fg(color)
    }

    pub(super) fn body(&self, is_user: bool) -> Style {
        let color = if is_user {
            self.user_text
        } else {
            self.assistant_text
        };
        Style::default().fg(color).bg(self.background)
    }

    pub(super) fn role_tag(&self, is_user: bool) -> Style {
        let color = if is_user {
            self.user_role
        } else {
            self.assistant_role
        };
        Style::default()
            .fg(WHITE)
            .bg(color)
            .add_modifier(Modifier::BOLD)
    }

    pub(super) fn source_tag(&self, source: SourceTag) -> Style {
        let color = match source {
            SourceTag::Text => TEXT_SOURCE,
            SourceTag::Stt => STT_SOURCE,
        };
        Style::default()
            .fg(WHITE)
            .bg(color)
            .add_modifier(Modifier::BOLD)
    }

    pub(super) fn timestamp(&self) -> Style {
        Style::default().fg(self.timestamp)
    }

    /// Idle is muted; the active states get a solid highlight.
    pub(super) fn status(&self, status: Status) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        match status {
            Status::Idle => style.fg(self.idle),
            Status::Listening => style.fg(WHITE).bg(LISTENING),
            Status::Processing => style.fg(WHITE).bg(PROCESSING),
            Status::Speaking => style.fg(WHITE).bg(SPEAKING),
        }
    }

    /// Style for a run of rendered markdown.
    pub(super) fn markdown(&self, block: Block, inline: Inline) -> Style {
        let mut style = self.body(false);
        match block {
            Block::Heading(_) => {
                style = style.fg(self.heading).add_modifier(Modifier::BOLD);
            }
            Block::Quote => style = style.add_modifier(Modifier::ITALIC),
            Block::TableRow { header: true } => style = style.add_modifier(Modifier::BOLD),
            Block::Rule => style = style.fg(self.hint),
            _ => {}
        }
        if inline.code {
            style = style.fg(self.code);
        }
        if inline.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if inline.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if inline.strike {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        if inline.link {
            style = style.fg(self.link).add_modifier(Modifier::UNDERLINED);
        }
        style
    }

    pub(super) fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub(super) fn input(&self) -> Style {
        Style::default().fg(self.input_text).bg(self.background)
    }

    pub(super) fn hint(&self) -> Style {
        Style::default().fg(self.hint)
    }

    pub(super) fn hint_key(&self) -> Style {
        Style::default()
            .fg(self.input_text)
            .add_modifier(Modifier::BOLD)
    }
}
