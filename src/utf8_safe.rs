//! UTF-8 and display-column aware string helpers.
//!
//! Everything here works on char boundaries and terminal columns, never raw
//! byte offsets, so multi-byte and double-width glyphs cannot cause panics.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Returns a prefix of the string up to `max_chars` characters.
pub fn safe_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncates a string to `max_chars` characters, ending in `…` when cut.
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 1 {
        return String::from("…");
    }
    format!("{}…", safe_prefix(s, max_chars - 1))
}

/// Terminal columns taken by `s`.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn glyph_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Word-wrap `text` to `width` columns.
///
/// Existing line breaks are kept, blank lines survive as empty strings, and
/// words wider than `width` are split across lines by column.
pub fn wrap_to_width(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let raw_line = raw_line.trim_end_matches('\r');
        if raw_line.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut current_width = 0usize;
        for word in raw_line.split_whitespace() {
            let word_width = display_width(word);
            let gap = usize::from(!current.is_empty());
            if current_width + gap + word_width <= width {
                if gap == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += gap + word_width;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            if word_width <= width {
                current.push_str(word);
                current_width = word_width;
                continue;
            }
            for ch in word.chars() {
                let w = glyph_width(ch);
                if current_width + w > width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(ch);
                current_width += w;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Width of the widest line after wrapping.
pub fn widest_line(lines: &[String]) -> usize {
    lines.iter().map(|line| display_width(line)).max().unwrap_or(0)
}

/// Longest suffix of `s` that fits in `max_cols` columns.
pub fn tail_by_columns(s: &str, max_cols: usize) -> &str {
    let mut used = 0usize;
    let mut start = s.len();
    for (idx, ch) in s.char_indices().rev() {
        let w = glyph_width(ch);
        if used + w > max_cols {
            break;
        }
        used += w;
        start = idx;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_prefix() {
        assert_eq!(safe_prefix("hello", 3), "hel");
        assert_eq!(safe_prefix("hello", 10), "hello");
        assert_eq!(safe_prefix("hello", 0), "");
        assert_eq!(safe_prefix("你好世界", 2), "你好");
        assert_eq!(safe_prefix("🦀Rust", 2), "🦀R");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("hello", 10), "hello");
        assert_eq!(ellipsize("hello world", 8), "hello w…");
        assert_eq!(ellipsize("你好世界", 3), "你好…");
        assert_eq!(ellipsize("test", 1), "…");
        assert_eq!(ellipsize("test", 0), "…");
    }

    #[test]
    fn wrap_breaks_on_words() {
        assert_eq!(
            wrap_to_width("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
    }

    #[test]
    fn wrap_keeps_paragraphs() {
        assert_eq!(wrap_to_width("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn wrap_splits_long_words_by_column() {
        assert_eq!(wrap_to_width("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_to_width("你好世界", 4), vec!["你好", "世界"]);
    }

    #[test]
    fn widest_line_counts_columns() {
        let lines = wrap_to_width("hi 你好", 20);
        assert_eq!(widest_line(&lines), 7);
        assert_eq!(widest_line(&[]), 0);
    }

    #[test]
    fn tail_keeps_the_end_that_fits() {
        assert_eq!(tail_by_columns("hello world", 5), "world");
        assert_eq!(tail_by_columns("short", 10), "short");
        assert_eq!(tail_by_columns("a你好", 3), "好");
        assert_eq!(tail_by_columns("abc", 0), "");
    }
}
