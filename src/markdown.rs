//! Markdown detection and terminal rendering for assistant replies.
//!
//! Replies are parsed with pulldown-cmark into [`MdLine`]s (one per logical
//! line with its block kind and inline emphasis) and then word-wrapped into
//! display rows by [`wrap_line`]. The UI maps emphasis to colours; layout uses
//! the wrapped row count for bubble height.

use crate::utf8_safe::display_width;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::OnceLock;

/// Block kind of a rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Paragraph,
    Heading(u8),
    ListItem,
    Quote,
    Code,
    TableRow { header: bool },
    Rule,
}

/// Inline emphasis carried by a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inline {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub link: bool,
    pub strike: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledText {
    pub text: String,
    pub inline: Inline,
}

impl StyledText {
    fn new(text: impl Into<String>, inline: Inline) -> Self {
        Self {
            text: text.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdLine {
    pub block: Block,
    /// Leading marker (list bullet, quote bar) kept out of word wrapping.
    pub marker: Option<String>,
    pub spans: Vec<StyledText>,
}

impl MdLine {
    fn new(block: Block, marker: Option<String>) -> Self {
        Self {
            block,
            marker,
            spans: Vec::new(),
        }
    }

    fn blank() -> Self {
        Self::new(Block::Paragraph, None)
    }

    /// Plain text of the line without styling.
    pub fn plain_text(&self) -> String {
        let mut out = self.marker.clone().unwrap_or_default();
        for span in &self.spans {
            out.push_str(&span.text);
        }
        out
    }
}

fn markdown_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\*\*.+\*\*",
            r"\*.+\*",
            r"#+\s",
            r"(?m)^\s*[-*+]\s",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("markdown pattern should compile"))
        .collect()
    })
}

/// Heuristic used to decide whether an assistant reply renders as markdown.
///
/// User messages are always plain text; callers check `is_user` first.
pub fn looks_like_markdown(text: &str) -> bool {
    if text.contains("```") || text.contains('|') {
        return true;
    }
    if text.contains('[') && text.contains("](") {
        return true;
    }
    markdown_patterns().iter().any(|re| re.is_match(text))
}

struct Renderer {
    lines: Vec<MdLine>,
    current: Option<MdLine>,
    inline: Inline,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code: bool,
    code_buf: String,
    cell_index: usize,
    needs_gap: bool,
}

impl Renderer {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: None,
            inline: Inline::default(),
            lists: Vec::new(),
            quote_depth: 0,
            in_code: false,
            code_buf: String::new(),
            cell_index: 0,
            needs_gap: false,
        }
    }

    fn flush(&mut self) {
        if let Some(line) = self.current.take() {
            self.lines.push(line);
        }
    }

    fn gap(&mut self) {
        if self.needs_gap && !self.lines.is_empty() {
            self.lines.push(MdLine::blank());
        }
        self.needs_gap = false;
    }

    fn quote_marker(&self) -> Option<String> {
        (self.quote_depth > 0).then(|| "│ ".repeat(self.quote_depth))
    }

    fn begin(&mut self, block: Block, marker: Option<String>) {
        self.flush();
        self.gap();
        let marker = match (self.quote_marker(), marker) {
            (Some(quote), Some(marker)) => Some(format!("{quote}{marker}")),
            (quote, marker) => marker.or(quote),
        };
        let block = if self.quote_depth > 0 && block == Block::Paragraph {
            Block::Quote
        } else {
            block
        };
        self.current = Some(MdLine::new(block, marker));
    }

    fn push_text(&mut self, text: &str, inline: Inline) {
        if self.current.is_none() {
            self.begin(Block::Paragraph, None);
        }
        if let Some(line) = self.current.as_mut() {
            match line.spans.last_mut() {
                Some(last) if last.inline == inline => last.text.push_str(text),
                _ => line.spans.push(StyledText::new(text, inline)),
            }
        }
    }

    fn item_marker(&mut self) -> String {
        let indent = "  ".repeat(self.lists.len().saturating_sub(1));
        match self.lists.last_mut() {
            Some(Some(next)) => {
                let marker = format!("{indent}{next}. ");
                *next += 1;
                marker
            }
            _ => format!("{indent}• "),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                let item_line_open = self
                    .current
                    .as_ref()
                    .is_some_and(|line| line.block == Block::ListItem && line.spans.is_empty());
                if !item_line_open {
                    self.begin(Block::Paragraph, None);
                }
            }
            Tag::Heading { level, .. } => self.begin(Block::Heading(level as u8), None),
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.in_code = true;
                self.code_buf.clear();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.gap();
                        let mut label = MdLine::new(Block::Code, None);
                        label.spans.push(StyledText::new(
                            format!("[{lang}]"),
                            Inline {
                                italic: true,
                                ..Inline::default()
                            },
                        ));
                        self.lines.push(label);
                    }
                }
            }
            Tag::List(start) => {
                self.flush();
                if self.lists.is_empty() {
                    self.gap();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let marker = self.item_marker();
                self.begin(Block::ListItem, Some(marker));
            }
            Tag::Table(_) => {
                self.flush();
                self.gap();
            }
            Tag::TableHead => {
                self.begin(Block::TableRow { header: true }, None);
                self.cell_index = 0;
            }
            Tag::TableRow => {
                self.begin(Block::TableRow { header: false }, None);
                self.cell_index = 0;
            }
            Tag::TableCell => {
                if self.cell_index > 0 {
                    self.push_text(" │ ", Inline::default());
                }
                self.cell_index += 1;
            }
            Tag::Emphasis => self.inline.italic = true,
            Tag::Strong => self.inline.bold = true,
            Tag::Strikethrough => self.inline.strike = true,
            Tag::Link { .. } => self.inline.link = true,
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) => {
                self.flush();
                self.needs_gap = self.lists.is_empty();
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.needs_gap = true;
            }
            TagEnd::CodeBlock => {
                self.in_code = false;
                let code = std::mem::take(&mut self.code_buf);
                let inline = Inline {
                    code: true,
                    ..Inline::default()
                };
                for row in code.trim_end_matches('\n').split('\n') {
                    let mut line = MdLine::new(Block::Code, self.quote_marker());
                    line.spans.push(StyledText::new(row, inline));
                    self.lines.push(line);
                }
                self.needs_gap = true;
            }
            TagEnd::Item => self.flush(),
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                self.needs_gap = self.lists.is_empty();
            }
            TagEnd::TableHead | TagEnd::TableRow => self.flush(),
            TagEnd::Table => {
                self.flush();
                self.needs_gap = true;
            }
            TagEnd::Emphasis => self.inline.italic = false,
            TagEnd::Strong => self.inline.bold = false,
            TagEnd::Strikethrough => self.inline.strike = false,
            TagEnd::Link => self.inline.link = false,
            _ => {}
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) if self.in_code => self.code_buf.push_str(&text),
            Event::Text(text) => {
                let inline = self.inline;
                self.push_text(&text, inline);
            }
            Event::Code(code) => {
                let inline = Inline {
                    code: true,
                    ..self.inline
                };
                self.push_text(&code, inline);
            }
            Event::SoftBreak => {
                let inline = self.inline;
                self.push_text(" ", inline);
            }
            Event::HardBreak => {
                let block = self.current.as_ref().map(|line| line.block);
                self.flush();
                let block = match block {
                    Some(Block::ListItem) | None => Block::Paragraph,
                    Some(other) => other,
                };
                self.current = Some(MdLine::new(block, self.quote_marker()));
            }
            Event::Rule => {
                self.flush();
                self.gap();
                self.lines.push(MdLine::new(Block::Rule, None));
                self.needs_gap = true;
            }
            Event::TaskListMarker(done) => {
                let inline = self.inline;
                self.push_text(if done { "[x] " } else { "[ ] " }, inline);
            }
            Event::Html(raw) | Event::InlineHtml(raw) => {
                let inline = self.inline;
                self.push_text(raw.trim_end_matches('\n'), inline);
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<MdLine> {
        self.flush();
        while self.lines.last().is_some_and(|line| {
            line.block == Block::Paragraph && line.marker.is_none() && line.spans.is_empty()
        }) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Parse markdown into logical lines.
pub fn render_markdown(content: &str) -> Vec<MdLine> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut renderer = Renderer::new();
    for event in Parser::new_ext(content, options) {
        renderer.event(event);
    }
    renderer.finish()
}

struct Word {
    parts: Vec<StyledText>,
    width: usize,
}

fn words_of(spans: &[StyledText]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = Word {
        parts: Vec::new(),
        width: 0,
    };
    for span in spans {
        for ch in span.text.chars() {
            if ch.is_whitespace() {
                if !current.parts.is_empty() {
                    words.push(std::mem::replace(
                        &mut current,
                        Word {
                            parts: Vec::new(),
                            width: 0,
                        },
                    ));
                }
                continue;
            }
            current.width += display_width(ch.encode_utf8(&mut [0u8; 4]));
            match current.parts.last_mut() {
                Some(part) if part.inline == span.inline => part.text.push(ch),
                _ => current.parts.push(StyledText::new(ch.to_string(), span.inline)),
            }
        }
    }
    if !current.parts.is_empty() {
        words.push(current);
    }
    words
}

fn push_part(row: &mut Vec<StyledText>, part: StyledText) {
    match row.last_mut() {
        Some(last) if last.inline == part.inline => last.text.push_str(&part.text),
        _ => row.push(part),
    }
}

fn split_by_columns(spans: &[StyledText], width: usize, lead: &str) -> Vec<Vec<StyledText>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut used = display_width(lead);
    if !lead.is_empty() {
        row.push(StyledText::new(lead, Inline::default()));
    }
    for span in spans {
        for ch in span.text.chars() {
            let w = display_width(ch.encode_utf8(&mut [0u8; 4]));
            if used + w > width && used > display_width(lead) {
                rows.push(std::mem::take(&mut row));
                used = 0;
                if !lead.is_empty() {
                    row.push(StyledText::new(lead, Inline::default()));
                    used = display_width(lead);
                }
            }
            push_part(&mut row, StyledText::new(ch.to_string(), span.inline));
            used += w;
        }
    }
    rows.push(row);
    rows
}

/// Wrap one logical line into display rows of at most `width` columns.
///
/// The marker appears on the first row and continuation rows are indented
/// under it. Code rows keep their whitespace and break by column.
pub fn wrap_line(line: &MdLine, width: usize) -> Vec<Vec<StyledText>> {
    let width = width.max(1);
    let marker = line.marker.clone().unwrap_or_default();
    if line.block == Block::Rule {
        return vec![vec![StyledText::new("─".repeat(width), Inline::default())]];
    }
    if line.block == Block::Code {
        return split_by_columns(&line.spans, width, &marker);
    }

    let marker_width = display_width(&marker);
    let hanging = if marker_width < width {
        " ".repeat(marker_width)
    } else {
        String::new()
    };
    let mut rows = Vec::new();
    let mut row: Vec<StyledText> = Vec::new();
    let mut used = 0;
    let mut has_word = false;
    if !marker.is_empty() {
        row.push(StyledText::new(marker.clone(), Inline::default()));
        used = marker_width;
    }

    for word in words_of(&line.spans) {
        let gap = usize::from(has_word);
        if used + gap + word.width > width && has_word {
            rows.push(std::mem::take(&mut row));
            used = 0;
            has_word = false;
            if !hanging.is_empty() {
                row.push(StyledText::new(hanging.clone(), Inline::default()));
                used = hanging.len();
            }
        }
        if has_word {
            let inline = row.last().map(|part| part.inline).unwrap_or_default();
            push_part(&mut row, StyledText::new(" ", inline));
            used += 1;
        }
        if used + word.width <= width {
            for part in word.parts {
                push_part(&mut row, part);
            }
            used += word.width;
            has_word = true;
            continue;
        }
        let lead = if row.is_empty() { "" } else { hanging.as_str() };
        let mut pieces = split_by_columns(&word.parts, width.saturating_sub(used).max(1), "");
        let last = pieces.pop().unwrap_or_default();
        for piece in pieces {
            for part in piece {
                push_part(&mut row, part);
            }
            rows.push(std::mem::take(&mut row));
            if !lead.is_empty() {
                row.push(StyledText::new(lead, Inline::default()));
            }
        }
        used = display_width(lead);
        for part in last {
            used += display_width(&part.text);
            push_part(&mut row, part);
        }
        has_word = true;
    }
    rows.push(row);
    rows
}

/// Total display rows for rendered markdown at `width` columns.
pub fn wrapped_height(lines: &[MdLine], width: usize) -> usize {
    lines.iter().map(|line| wrap_line(line, width).len()).sum()
}

/// Widest display row for rendered markdown at `width` columns.
pub fn wrapped_width(lines: &[MdLine], width: usize) -> usize {
    lines
        .iter()
        .flat_map(|line| wrap_line(line, width))
        .map(|row| row.iter().map(|part| display_width(&part.text)).sum::<usize>())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(row: &[StyledText]) -> String {
        row.iter().map(|part| part.text.as_str()).collect()
    }

    #[test]
    fn detects_common_markdown() {
        assert!(looks_like_markdown("```\ncode\n```"));
        assert!(looks_like_markdown("this is **bold** text"));
        assert!(looks_like_markdown("an *aside* here"));
        assert!(looks_like_markdown("# Title"));
        assert!(looks_like_markdown("intro\n- one\n- two"));
        assert!(looks_like_markdown("a | b"));
        assert!(looks_like_markdown("see [docs](https://example.com)"));
    }

    #[test]
    fn plain_text_is_not_markdown() {
        assert!(!looks_like_markdown("The answer is 4."));
        assert!(!looks_like_markdown("rate is 5% - roughly"));
        assert!(!looks_like_markdown("[not a link]"));
    }

    #[test]
    fn renders_heading_and_paragraph() {
        let lines = render_markdown("# Hello\n\nSome **bold** words.");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].block, Block::Heading(1));
        assert_eq!(lines[0].plain_text(), "Hello");
        assert_eq!(lines[1].plain_text(), "");
        assert_eq!(lines[2].plain_text(), "Some bold words.");
        assert!(lines[2]
            .spans
            .iter()
            .any(|span| span.text == "bold" && span.inline.bold));
    }

    #[test]
    fn renders_lists_with_markers() {
        let lines = render_markdown("- apples\n- pears\n\n1. first\n2. second");
        let texts: Vec<String> = lines.iter().map(MdLine::plain_text).collect();
        assert_eq!(
            texts,
            vec!["• apples", "• pears", "", "1. first", "2. second"]
        );
        assert!(lines.iter().all(|l| l.plain_text().is_empty() || l.block == Block::ListItem));
    }

    #[test]
    fn renders_code_blocks_verbatim() {
        let lines = render_markdown("```rust\nfn main() {\n    let x = 1;\n}\n```");
        let texts: Vec<String> = lines.iter().map(MdLine::plain_text).collect();
        assert_eq!(texts, vec!["[rust]", "fn main() {", "    let x = 1;", "}"]);
        assert!(lines[2].spans[0].inline.code);
    }

    #[test]
    fn renders_tables_as_rows() {
        let lines = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |");
        assert_eq!(lines[0].block, Block::TableRow { header: true });
        assert_eq!(lines[0].plain_text(), "a │ b");
        assert_eq!(lines[1].plain_text(), "1 │ 2");
    }

    #[test]
    fn wraps_list_items_with_hanging_indent() {
        let lines = render_markdown("- one two three four");
        let rows = wrap_line(&lines[0], 10);
        let texts: Vec<String> = rows.iter().map(|row| row_text(row)).collect();
        assert_eq!(texts, vec!["• one two", "  three", "  four"]);
    }

    #[test]
    fn wraps_code_by_columns() {
        let lines = render_markdown("```\nabcdefgh\n```");
        let rows = wrap_line(&lines[0], 3);
        let texts: Vec<String> = rows.iter().map(|row| row_text(row)).collect();
        assert_eq!(texts, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn long_words_split_across_rows() {
        let lines = render_markdown("**abcdefghij**");
        let rows = wrap_line(&lines[0], 4);
        let texts: Vec<String> = rows.iter().map(|row| row_text(row)).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
        assert!(rows.iter().flatten().all(|part| part.inline.bold));
    }

    #[test]
    fn height_counts_wrapped_rows() {
        let lines = render_markdown("# Hi\n\nalpha beta gamma");
        assert_eq!(wrapped_height(&lines, 80), 3);
        assert_eq!(wrapped_height(&lines, 6), 5);
        assert_eq!(wrapped_width(&lines, 80), "alpha beta gamma".len());
    }
}
