use once_cell::sync::Lazy;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const REVERSE_ON: &str = "\x1b[7m";
pub const REVERSE_OFF: &str = "\x1b[27m";

static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\x1b\\[[0-9;]*[A-Za-z]").expect("valid style regex"));

/// Removes embedded style sequences, leaving only printable text.
/// Unterminated sequences do not match the pattern and pass through as
/// literal text. Idempotent.
pub fn strip_style(line: &str) -> String {
    STYLE_RE.replace_all(line, "").into_owned()
}

/// Width of `text` in terminal display cells: style sequences count 0,
/// wide characters 2, combining marks 0.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(strip_style(text).as_str())
}

/// Returns the line with a reverse-video cursor marker at
/// `display_col`, preserving embedded style sequences. The marker
/// replaces the cell it lands on; a column inside a wide character
/// blanks that character's cells instead of splitting it. At or past
/// the end of the line a reversed space is appended.
pub fn insert_cursor_marker(line: &str, display_col: usize) -> String {
    let mut out = String::with_capacity(line.len() + REVERSE_ON.len() + REVERSE_OFF.len() + 4);
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut col = 0usize;

    while i < line.len() {
        if bytes[i] == 0x1b && i + 1 < line.len() && bytes[i + 1] == b'[' {
            let mut j = i + 2;
            while j < line.len() && !bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            if j < line.len() {
                j += 1;
            }
            out.push_str(&line[i..j]);
            i = j;
            continue;
        }

        let Some(ch) = line[i..].chars().next() else {
            break;
        };
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);

        if width > 0 && col == display_col {
            out.push_str(REVERSE_ON);
            out.push(ch);
            out.push_str(REVERSE_OFF);
            out.push_str(&line[i + ch.len_utf8()..]);
            return out;
        }

        if width > 0 && col + width > display_col {
            // Column lands inside a wide character: both of its cells
            // become spaces so the glyph is never cut in half.
            out.push(' ');
            out.push_str(REVERSE_ON);
            out.push(' ');
            out.push_str(REVERSE_OFF);
            out.push_str(&line[i + ch.len_utf8()..]);
            return out;
        }

        col += width;
        out.push(ch);
        i += ch.len_utf8();
    }

    out.push_str(REVERSE_ON);
    out.push(' ');
    out.push_str(REVERSE_OFF);
    out
}

/// Wraps the inclusive display-column range `[start, end]` in the
/// given SGR codes, skipping embedded style sequences so existing
/// colors inside the range are overridden rather than corrupted. The
/// range closes with a reset; styling that carried past the range is
/// dropped, matching how the rest of the span math treats a styled
/// run as one unit.
pub fn highlight_span(line: &str, start: usize, end: usize, codes: &str) -> String {
    if end < start {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + codes.len() + 8);
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut col = 0usize;
    let mut open = false;

    while i < line.len() {
        if bytes[i] == 0x1b && i + 1 < line.len() && bytes[i + 1] == b'[' {
            let mut j = i + 2;
            while j < line.len() && !bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            if j < line.len() {
                j += 1;
            }
            out.push_str(&line[i..j]);
            i = j;
            continue;
        }

        let Some(ch) = line[i..].chars().next() else {
            break;
        };
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);

        if open && width > 0 && col > end {
            out.push_str("\x1b[0m");
            open = false;
        }
        if !open && width > 0 && col >= start && col <= end {
            out.push_str(&format!("\x1b[{codes}m"));
            open = true;
        }

        col += width;
        out.push(ch);
        i += ch.len_utf8();
    }

    if open {
        out.push_str("\x1b[0m");
    }
    out
}

/// Converts a styled line into ratatui spans for painting: SGR
/// sequences update the running style, other sequences are dropped.
pub fn ansi_spans(line: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut style = Style::default();
    let mut current = String::new();
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < line.len() {
        if bytes[i] == 0x1b && i + 1 < line.len() && bytes[i + 1] == b'[' {
            let mut j = i + 2;
            while j < line.len() && !bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            if j < line.len() {
                if bytes[j] == b'm' {
                    if !current.is_empty() {
                        spans.push(Span::styled(std::mem::take(&mut current), style));
                    }
                    style = apply_sgr(style, &line[i + 2..j]);
                }
                i = j + 1;
                continue;
            }
            // Unterminated sequence stays literal, same as strip_style.
        }

        let Some(ch) = line[i..].chars().next() else {
            break;
        };
        current.push(ch);
        i += ch.len_utf8();
    }

    if !current.is_empty() {
        spans.push(Span::styled(current, style));
    }
    if spans.is_empty() {
        spans.push(Span::raw(String::new()));
    }
    Line::from(spans)
}

fn apply_sgr(mut style: Style, params: &str) -> Style {
    if params.is_empty() {
        return Style::default();
    }
    for part in params.split(';') {
        let code: u8 = if part.is_empty() {
            0
        } else {
            match part.parse() {
                Ok(code) => code,
                Err(_) => continue,
            }
        };
        style = match code {
            0 => Style::default(),
            1 => style.add_modifier(Modifier::BOLD),
            3 => style.add_modifier(Modifier::ITALIC),
            4 => style.add_modifier(Modifier::UNDERLINED),
            7 => style.add_modifier(Modifier::REVERSED),
            22 => style.remove_modifier(Modifier::BOLD),
            23 => style.remove_modifier(Modifier::ITALIC),
            24 => style.remove_modifier(Modifier::UNDERLINED),
            27 => style.remove_modifier(Modifier::REVERSED),
            30 => style.fg(Color::Black),
            31 => style.fg(Color::Red),
            32 => style.fg(Color::Green),
            33 => style.fg(Color::Yellow),
            34 => style.fg(Color::Blue),
            35 => style.fg(Color::Magenta),
            36 => style.fg(Color::Cyan),
            37 => style.fg(Color::Gray),
            39 => {
                style.fg = None;
                style
            }
            90 => style.fg(Color::DarkGray),
            91 => style.fg(Color::LightRed),
            92 => style.fg(Color::LightGreen),
            93 => style.fg(Color::LightYellow),
            94 => style.fg(Color::LightBlue),
            95 => style.fg(Color::LightMagenta),
            96 => style.fg(Color::LightCyan),
            97 => style.fg(Color::White),
            _ => style,
        };
    }
    style
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLED: &str = "\x1b[1;33msee\x1b[0m http://a.test";

    #[test]
    fn strip_style_removes_sequences() {
        assert_eq!(strip_style(STYLED), "see http://a.test");
    }

    #[test]
    fn strip_style_is_idempotent() {
        let once = strip_style(STYLED);
        assert_eq!(strip_style(&once), once);
    }

    #[test]
    fn unterminated_sequence_stays_literal() {
        let line = "before \x1b[33";
        assert_eq!(strip_style(line), line);
    }

    #[test]
    fn display_width_ignores_style_sequences() {
        assert_eq!(display_width(STYLED), "see http://a.test".len());
        assert_eq!(display_width(&strip_style(STYLED)), display_width(STYLED));
    }

    #[test]
    fn display_width_counts_wide_characters_twice() {
        assert_eq!(display_width("日本語"), 6);
        assert_eq!(display_width("a日b"), 4);
    }

    #[test]
    fn display_width_ignores_combining_marks() {
        // 'e' followed by a combining acute accent
        assert_eq!(display_width("e\u{0301}"), 1);
    }

    #[test]
    fn marker_reverses_the_cell_at_the_column() {
        let marked = insert_cursor_marker("abc", 1);
        assert_eq!(marked, format!("a{REVERSE_ON}b{REVERSE_OFF}c"));
    }

    #[test]
    fn marker_preserves_existing_style_sequences() {
        let marked = insert_cursor_marker("\x1b[33mabc\x1b[0m", 0);
        assert!(marked.starts_with("\x1b[33m"));
        assert_eq!(strip_style(&marked), "abc");
    }

    #[test]
    fn marker_replaces_rather_than_inserts() {
        let line = "hello";
        for col in 0..display_width(line) {
            let marked = insert_cursor_marker(line, col);
            assert_eq!(display_width(&marked), display_width(line), "col {col}");
        }
    }

    #[test]
    fn marker_at_end_appends_one_cell() {
        let line = "hi";
        let marked = insert_cursor_marker(line, 2);
        assert_eq!(display_width(&marked), 3);
        assert_eq!(marked, format!("hi{REVERSE_ON} {REVERSE_OFF}"));
    }

    #[test]
    fn marker_past_end_appends_one_cell() {
        let marked = insert_cursor_marker("hi", 40);
        assert_eq!(display_width(&marked), 3);
    }

    #[test]
    fn marker_inside_wide_character_blanks_its_cells() {
        // Column 1 is the second cell of the two-cell glyph.
        let marked = insert_cursor_marker("日x", 1);
        assert_eq!(marked, format!(" {REVERSE_ON} {REVERSE_OFF}x"));
        assert_eq!(display_width(&marked), 3);
    }

    #[test]
    fn marker_on_empty_line_is_a_single_cell() {
        let marked = insert_cursor_marker("", 0);
        assert_eq!(display_width(&marked), 1);
    }

    #[test]
    fn highlight_span_wraps_the_column_range() {
        let lit = highlight_span("see http://a.test now", 4, 16, "7");
        assert_eq!(lit, "see \x1b[7mhttp://a.test\x1b[0m now");
    }

    #[test]
    fn highlight_span_skips_existing_sequences() {
        let line = "see \x1b[4;34mhttp://a.test\x1b[0m now";
        let lit = highlight_span(line, 4, 16, "7");
        assert_eq!(strip_style(&lit), "see http://a.test now");
        assert_eq!(display_width(&lit), display_width(line));
        let reversed = lit.find("\x1b[7m").unwrap();
        assert_eq!(strip_style(&lit[..reversed]), "see ");
    }

    #[test]
    fn highlight_span_closes_at_line_end() {
        let lit = highlight_span("tail http://a.test", 5, 17, "7");
        assert!(lit.ends_with("\x1b[0m"));
    }

    #[test]
    fn highlight_span_ignores_inverted_range() {
        assert_eq!(highlight_span("abc", 2, 1, "7"), "abc");
    }

    #[test]
    fn ansi_spans_text_matches_stripped_line() {
        let line = "\x1b[1;33mtitle\x1b[0m plain \x1b[4;34mhttp://a.test\x1b[0m";
        let spans = ansi_spans(line);
        let joined: String = spans
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(joined, strip_style(line));
    }

    #[test]
    fn ansi_spans_apply_color_and_modifiers() {
        let spans = ansi_spans("\x1b[1;33mwarm\x1b[0m cold");
        assert_eq!(spans.spans[0].style.fg, Some(Color::Yellow));
        assert!(spans.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(spans.spans[1].style, Style::default());
    }

    #[test]
    fn ansi_spans_reset_clears_previous_style() {
        let spans = ansi_spans("\x1b[32ma\x1b[mb");
        assert_eq!(spans.spans[1].style, Style::default());
    }
}
