use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const RESET: &str = "\x1b[0m";
const STYLE_HEADING_1: &str = "1;4;33";
const STYLE_HEADING_2: &str = "1;33";
const STYLE_HEADING_3: &str = "1;35";
const STYLE_HEADING_REST: &str = "35";
const STYLE_BULLET_MARKER: &str = "33";
const STYLE_QUOTE: &str = "32";
const STYLE_CODE: &str = "36";
const STYLE_LINK: &str = "4;34";

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)]+").expect("valid url regex"));

/// Renders article markdown into ANSI-styled lines at a fixed width.
/// The output is the viewer's line buffer: link URLs stay visible in the
/// text so the link index can locate them by display column.
#[derive(Default)]
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, input: &str, width: usize) -> Result<Vec<String>> {
        if width == 0 {
            bail!("render width must be positive");
        }

        let mut opts = Options::empty();
        opts.insert(Options::ENABLE_STRIKETHROUGH);
        opts.insert(Options::ENABLE_TABLES);
        opts.insert(Options::ENABLE_TASKLISTS);
        opts.insert(Options::ENABLE_FOOTNOTES);

        let parser = Parser::new_ext(input, opts);
        let mut writer = MarkdownWriter::default();
        writer.consume(parser);
        Ok(writer.into_lines(width))
    }
}

#[derive(Default)]
struct MarkdownWriter {
    lines: Vec<RenderLine>,
    buffer: String,
    list_stack: Vec<ListState>,
    current_item: Option<ListMeta>,
    blockquote_depth: usize,
    heading_level: Option<u8>,
    code_block: Option<CodeMeta>,
    link_target: Option<String>,
}

#[derive(Clone, Copy)]
struct ListState {
    ordered: bool,
    index: usize,
}

#[derive(Clone)]
struct ListMeta {
    indent: usize,
    marker: String,
}

#[derive(Default)]
struct CodeMeta {
    language: Option<String>,
    buffer: String,
}

#[derive(Clone)]
enum RenderLine {
    Text(String),
    Heading {
        level: u8,
        text: String,
    },
    Bullet {
        indent: usize,
        marker: String,
        text: String,
    },
    Quote {
        depth: usize,
        text: String,
    },
    Code(String),
    Separator,
}

impl MarkdownWriter {
    fn consume<'a, I>(&mut self, parser: I)
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in parser {
            match event {
                Event::Start(tag) => self.start_tag(tag),
                Event::End(tag) => self.end_tag(tag),
                Event::Text(text) => self.text(text),
                Event::Code(code) => self.inline_code(code),
                Event::Html(_) | Event::InlineHtml(_) => {}
                Event::FootnoteReference(name) => self.append_text(format!("[{}]", name)),
                Event::HardBreak => self.append_text("\n"),
                Event::SoftBreak => self.append_text(" "),
                Event::Rule => {
                    self.flush_buffer();
                    self.lines.push(RenderLine::Text("―".repeat(20)));
                    self.lines.push(RenderLine::Separator);
                }
                Event::TaskListMarker(done) => {
                    self.append_text(if done { "[x] " } else { "[ ] " });
                }
            }
        }
        self.flush_buffer();
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.flush_buffer(),
            Tag::Heading { level, .. } => {
                self.flush_buffer();
                self.heading_level = Some(level_to_u8(level));
            }
            Tag::BlockQuote => {
                self.flush_buffer();
                self.blockquote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush_buffer();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.into_string()),
                    _ => None,
                };
                self.code_block = Some(CodeMeta {
                    language,
                    buffer: String::new(),
                });
            }
            Tag::List(start) => {
                let index = start.unwrap_or(1) as usize;
                self.list_stack.push(ListState {
                    ordered: start.is_some(),
                    index,
                });
            }
            Tag::Item => {
                self.flush_buffer();
                let indent = self.list_stack.len().saturating_sub(1);
                if let Some(state) = self.list_stack.last() {
                    let marker = if state.ordered {
                        format!("{}.", state.index)
                    } else {
                        "•".to_string()
                    };
                    self.current_item = Some(ListMeta { indent, marker });
                }
            }
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => {}
            Tag::Link { dest_url, .. } => {
                self.link_target = Some(dest_url.into_string());
            }
            Tag::Image { .. } => {
                self.append_text("[image]");
            }
            Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => {
                self.append_text("| ");
            }
            Tag::FootnoteDefinition(_) => {}
            Tag::HtmlBlock => {}
            Tag::MetadataBlock(_) => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_buffer();
                self.lines.push(RenderLine::Separator);
            }
            TagEnd::Heading(_) => {
                if let Some(level) = self.heading_level.take() {
                    let text = self.consume_buffer();
                    if !text.is_empty() {
                        self.lines.push(RenderLine::Heading { level, text });
                        self.lines.push(RenderLine::Separator);
                    }
                }
            }
            TagEnd::BlockQuote => {
                self.flush_buffer();
                if self.blockquote_depth > 0 {
                    self.blockquote_depth -= 1;
                }
                self.lines.push(RenderLine::Separator);
            }
            TagEnd::CodeBlock => {
                if let Some(mut meta) = self.code_block.take() {
                    if let Some(lang) = meta.language.take() {
                        self.lines.push(RenderLine::Text(format!("```{}", lang)));
                    } else {
                        self.lines.push(RenderLine::Text("```".to_string()));
                    }
                    for line in meta.buffer.split('\n') {
                        self.lines.push(RenderLine::Code(line.to_string()));
                    }
                    self.lines.push(RenderLine::Text("```".to_string()));
                    self.lines.push(RenderLine::Separator);
                }
            }
            TagEnd::List(_) => {
                self.flush_buffer();
                self.list_stack.pop();
                self.lines.push(RenderLine::Separator);
            }
            TagEnd::Item => {
                self.flush_buffer();
                if let Some(state) = self.list_stack.last_mut() {
                    state.index += 1;
                }
                self.current_item = None;
            }
            TagEnd::Link => {
                // Keep the destination visible next to its label; the
                // link index finds links by URL text.
                if let Some(url) = self.link_target.take() {
                    if !self.buffer.ends_with(&url) {
                        self.append_text(format!(" ({url})"));
                    }
                }
            }
            TagEnd::Table | TagEnd::TableHead | TagEnd::TableRow | TagEnd::TableCell => {}
            TagEnd::FootnoteDefinition => {}
            _ => {}
        }
    }

    fn text(&mut self, text: CowStr<'_>) {
        if let Some(code) = self.code_block.as_mut() {
            code.buffer.push_str(&text);
        } else {
            self.append_text(text);
        }
    }

    fn inline_code(&mut self, code: CowStr<'_>) {
        self.append_text(format!("`{}`", code));
    }

    fn append_text<T: AsRef<str>>(&mut self, text: T) {
        self.buffer.push_str(text.as_ref());
    }

    fn flush_buffer(&mut self) {
        let text = self.consume_buffer();
        if text.is_empty() {
            return;
        }

        if let Some(level) = self.heading_level {
            self.lines.push(RenderLine::Heading { level, text });
            return;
        }

        if let Some(code) = self.code_block.as_mut() {
            if !code.buffer.is_empty() {
                code.buffer.push('\n');
            }
            code.buffer.push_str(&text);
            return;
        }

        if let Some(item) = &self.current_item {
            self.lines.push(RenderLine::Bullet {
                indent: item.indent,
                marker: item.marker.clone(),
                text,
            });
            return;
        }

        if self.blockquote_depth > 0 {
            self.lines.push(RenderLine::Quote {
                depth: self.blockquote_depth,
                text,
            });
            return;
        }

        self.lines.push(RenderLine::Text(text));
    }

    fn consume_buffer(&mut self) -> String {
        let text = self.buffer.trim().to_string();
        self.buffer.clear();
        text
    }

    fn into_lines(mut self, width: usize) -> Vec<String> {
        while matches!(self.lines.last(), Some(RenderLine::Separator)) {
            self.lines.pop();
        }

        let mut styled = Vec::with_capacity(self.lines.len());
        for line in self.lines {
            match line {
                RenderLine::Text(content) => {
                    for wrapped in wrap_at(&content, width) {
                        styled.push(style_urls(&wrapped, ""));
                    }
                }
                RenderLine::Heading { level, text } => {
                    let codes = heading_codes(level);
                    for wrapped in wrap_at(&text, width) {
                        styled.push(paint(&wrapped, codes));
                    }
                }
                RenderLine::Bullet {
                    indent,
                    marker,
                    text,
                } => {
                    let lead = "  ".repeat(indent);
                    let hang = " ".repeat(UnicodeWidthStr::width(marker.as_str()) + 1);
                    let body_width = width.saturating_sub(lead.len() + hang.len()).max(1);
                    for (idx, wrapped) in wrap_at(&text, body_width).into_iter().enumerate() {
                        let body = style_urls(&wrapped, "");
                        if idx == 0 {
                            let marker = paint(&marker, STYLE_BULLET_MARKER);
                            styled.push(format!("{lead}{marker} {body}"));
                        } else {
                            styled.push(format!("{lead}{hang}{body}"));
                        }
                    }
                }
                RenderLine::Quote { depth, text } => {
                    let prefix = ">".repeat(depth.max(1));
                    let body_width = width.saturating_sub(prefix.len() + 1).max(1);
                    for wrapped in wrap_at(&text, body_width) {
                        let body = style_urls(&wrapped, STYLE_QUOTE);
                        styled.push(format!("\x1b[{STYLE_QUOTE}m{prefix} {body}{RESET}"));
                    }
                }
                RenderLine::Code(text) => {
                    for chunk in hard_wrap(&text, width) {
                        styled.push(paint(&chunk, STYLE_CODE));
                    }
                }
                RenderLine::Separator => styled.push(String::new()),
            }
        }

        if styled.is_empty() {
            styled.push(String::new());
        }
        styled
    }
}

/// Prose wrapping. Words never break, so a token wider than the target
/// (typically a URL) overflows on a line of its own instead of being
/// split; splitting a URL would cut its link span in two.
fn wrap_at(text: &str, width: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }
    let options = WrapOptions::new(width.max(1)).break_words(false);
    wrap(text, options)
        .into_iter()
        .map(|cow| cow.into_owned())
        .collect()
}

/// Code lines have no word structure to respect; break at the last
/// display cell that still fits.
fn hard_wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut cells = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if cells + w > width && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            cells = 0;
        }
        current.push(ch);
        cells += w;
    }
    chunks.push(current);
    chunks
}

fn paint(text: &str, codes: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("\x1b[{codes}m{text}{RESET}")
}

/// Styles URL runs in a wrapped plain line. `base` is the enclosing
/// line style to restore after each URL, empty for unstyled text.
fn style_urls(line: &str, base: &str) -> String {
    URL_RE
        .replace_all(line, |caps: &regex::Captures<'_>| {
            if base.is_empty() {
                format!("\x1b[{STYLE_LINK}m{}{RESET}", &caps[0])
            } else {
                format!("\x1b[{STYLE_LINK}m{}{RESET}\x1b[{base}m", &caps[0])
            }
        })
        .into_owned()
}

fn heading_codes(level: u8) -> &'static str {
    match level {
        1 => STYLE_HEADING_1,
        2 => STYLE_HEADING_2,
        3 => STYLE_HEADING_3,
        _ => STYLE_HEADING_REST,
    }
}

fn level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
