use once_cell::sync::Lazy;
use regex::Regex;

use crate::text;

/// A hyperlink located within the line buffer. `start`/`end` are
/// inclusive; display columns when built from rendered lines, raw byte
/// offsets on the markdown fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub url: String,
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

// Stops at whitespace, style escapes, and bracket/paren punctuation so
// a styled URL run matches exactly the visible URL text.
static RENDERED_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s\x1b\[\]()]+").expect("valid url regex"));

static BRACKET_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid bracket link regex"));

static BARE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)]+").expect("valid bare url regex"));

/// Builds the link index from rendered, styled lines. Spans are in
/// display columns over the style-stripped text; matches that strip to
/// nothing are discarded.
pub fn from_rendered(lines: &[String]) -> Vec<Link> {
    let mut links = Vec::new();
    for (line_no, line) in lines.iter().enumerate() {
        for found in RENDERED_URL_RE.find_iter(line) {
            let url = text::strip_style(found.as_str());
            if url.is_empty() {
                continue;
            }
            let start = text::display_width(&line[..found.start()]);
            let end = start + text::display_width(&url) - 1;
            links.push(Link {
                text: url.clone(),
                url,
                line: line_no,
                start,
                end,
            });
        }
    }
    links
}

/// Fallback index over raw markdown, used when rendering fails. Spans
/// are byte offsets into each raw line; a bracket link covers the
/// whole `[text](url)` construct. Bare URLs inside a bracket link are
/// not reported separately, keeping spans non-overlapping.
pub fn from_markdown(markdown: &str) -> Vec<Link> {
    let mut links = Vec::new();
    for (line_no, line) in markdown.lines().enumerate() {
        let mut bracket_ranges: Vec<(usize, usize)> = Vec::new();
        for caps in BRACKET_LINK_RE.captures_iter(line) {
            let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            bracket_ranges.push((whole.start(), whole.end()));
            links.push(Link {
                text: label.as_str().to_string(),
                url: url.as_str().to_string(),
                line: line_no,
                start: whole.start(),
                end: whole.end() - 1,
            });
        }
        for found in BARE_URL_RE.find_iter(line) {
            let inside_bracket = bracket_ranges
                .iter()
                .any(|&(start, end)| found.start() >= start && found.start() < end);
            if inside_bracket {
                continue;
            }
            links.push(Link {
                text: found.as_str().to_string(),
                url: found.as_str().to_string(),
                line: line_no,
                start: found.start(),
                end: found.end() - 1,
            });
        }
    }
    links.sort_by_key(|link| (link.line, link.start));
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn rendered_url_span_in_display_columns() {
        let lines = buffer(&["see http://a.test/x here", "second line"]);
        let links = from_rendered(&lines);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "http://a.test/x");
        assert_eq!(links[0].line, 0);
        assert_eq!(links[0].start, 4);
        assert_eq!(links[0].end, 18);
    }

    #[test]
    fn style_sequences_do_not_shift_columns() {
        let lines = buffer(&["see \x1b[4;34mhttp://a.test/x\x1b[0m here"]);
        let links = from_rendered(&lines);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].start, 4);
        assert_eq!(links[0].end, 18);
    }

    #[test]
    fn wide_characters_before_url_count_two_columns() {
        let lines = buffer(&["日本 http://a.test"]);
        let links = from_rendered(&lines);
        assert_eq!(links[0].start, 5);
    }

    #[test]
    fn multiple_urls_on_one_line() {
        let lines = buffer(&["http://a.test and http://b.test"]);
        let links = from_rendered(&lines);
        assert_eq!(links.len(), 2);
        assert!(links[0].end < links[1].start);
    }

    #[test]
    fn lines_without_urls_produce_no_spans() {
        let links = from_rendered(&buffer(&["no links here", ""]));
        assert!(links.is_empty());
    }

    #[test]
    fn bracket_link_spans_whole_construct() {
        let links = from_markdown("click [here](http://b.test)");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "here");
        assert_eq!(links[0].url, "http://b.test");
        assert_eq!(links[0].start, 6);
        assert_eq!(links[0].end, "click [here](http://b.test)".len() - 1);
    }

    #[test]
    fn bare_url_inside_bracket_link_is_not_duplicated() {
        let links = from_markdown("click [here](http://b.test) or http://c.test");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "http://b.test");
        assert_eq!(links[1].url, "http://c.test");
    }

    #[test]
    fn spans_are_ordered_by_line_then_start() {
        let links = from_markdown("http://b.test then [a](http://a.test)\nhttp://c.test");
        let order: Vec<(usize, usize)> = links.iter().map(|l| (l.line, l.start)).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(links[2].line, 1);
    }
}
