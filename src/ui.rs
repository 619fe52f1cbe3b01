use std::cell::Cell;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::article::Fetcher;
use crate::config::Config;
use crate::feed::{Article, Channel, FeedError, Reader};
use crate::links::{self, Link};
use crate::markdown::Renderer;
use crate::state::AppState;
use crate::text;
use crate::viewport::{LinkHitMode, Viewport};

const COLOR_ACCENT: Color = Color::Yellow;
const COLOR_DIM: Color = Color::DarkGray;

/// SGR codes for the link the cursor is resting on (bold yellow
/// underline, distinct from the reverse-video cursor cell).
const ACTIVE_LINK_CODES: &str = "1;4;33";

/// Rows reserved for chrome around the article text (status bar plus
/// borders); the remainder is the navigable window.
const CONTENT_CHROME_ROWS: u16 = 3;
const FALLBACK_VISIBLE_HEIGHT: usize = 10;

const LANDING_ENTRIES: &[&str] = &["Browse feeds", "Manage feeds", "Quit"];

/// Screens are a closed set; transitions only happen in `handle_key`
/// and async completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Landing,
    Feeds,
    Articles,
    Content,
    Manage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Url,
    Category,
    Tags,
}

#[derive(Debug, Clone, Default)]
struct AddFeedForm {
    active: bool,
    field_index: usize,
    url: String,
    category: String,
    tags: String,
}

impl AddFeedForm {
    const FIELDS: [FormField; 3] = [FormField::Url, FormField::Category, FormField::Tags];

    fn field(&self) -> FormField {
        Self::FIELDS[self.field_index.min(Self::FIELDS.len() - 1)]
    }

    fn value_mut(&mut self) -> &mut String {
        match self.field() {
            FormField::Url => &mut self.url,
            FormField::Category => &mut self.category,
            FormField::Tags => &mut self.tags,
        }
    }

    fn next_field(&mut self) -> bool {
        if self.field_index + 1 < Self::FIELDS.len() {
            self.field_index += 1;
            false
        } else {
            true
        }
    }
}

enum AsyncResponse {
    Feed {
        url: String,
        result: Result<Channel, FeedError>,
    },
    Article {
        result: Result<Article>,
    },
    StateSaved {
        result: Result<()>,
    },
}

pub struct Options {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub state: AppState,
    pub state_path: Option<PathBuf>,
    pub reader: Arc<Reader>,
    pub fetcher: Arc<Fetcher>,
    pub status_message: String,
}

pub struct Model {
    config: Config,
    config_path: Option<PathBuf>,
    state: AppState,
    state_path: Option<PathBuf>,
    reader: Arc<Reader>,
    fetcher: Arc<Fetcher>,
    renderer: Renderer,

    view: View,
    landing_index: usize,
    channels: Vec<Channel>,
    selected_feed: usize,
    selected_article: usize,
    form: AddFeedForm,

    article: Option<Article>,
    lines: Vec<String>,
    article_links: Vec<Link>,
    viewport: Viewport,
    link_hit_mode: LinkHitMode,
    rendered_width: usize,
    raw_fallback: bool,

    pending_feeds: usize,
    pending_article: bool,
    status_message: String,
    needs_redraw: bool,
    terminal_rows: Cell<u16>,
    terminal_cols: Cell<u16>,

    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            config: options.config,
            config_path: options.config_path,
            state: options.state,
            state_path: options.state_path,
            reader: options.reader,
            fetcher: options.fetcher,
            renderer: Renderer::new(),
            view: View::Landing,
            landing_index: 0,
            channels: Vec::new(),
            selected_feed: 0,
            selected_article: 0,
            form: AddFeedForm::default(),
            article: None,
            lines: Vec::new(),
            article_links: Vec::new(),
            viewport: Viewport::new(),
            link_hit_mode: LinkHitMode::Nearest,
            rendered_width: 0,
            raw_fallback: false,
            pending_feeds: 0,
            pending_article: false,
            status_message: options.status_message,
            needs_redraw: true,
            terminal_rows: Cell::new(0),
            terminal_cols: Cell::new(0),
            response_tx,
            response_rx,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.needs_redraw = true;
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {err}");
                                self.needs_redraw = true;
                            }
                        }
                    }
                    Event::Resize(_, _) => {
                        self.needs_redraw = true;
                    }
                    _ => {}
                }
            }

            if self.poll_async() {
                self.needs_redraw = true;
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
            }
        }

        Ok(())
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Feed { url, result } => {
                self.pending_feeds = self.pending_feeds.saturating_sub(1);
                match result {
                    Ok(channel) => {
                        self.install_channel(channel);
                        if self.pending_feeds == 0 {
                            self.status_message =
                                format!("{} feed(s) loaded", self.channels.len());
                        }
                    }
                    Err(err) => {
                        self.status_message = if err.is_transient() {
                            format!("Failed to load {url}: {err} (press r to retry)")
                        } else {
                            format!("Failed to parse {url}: {err}")
                        };
                    }
                }
            }
            AsyncResponse::Article { result } => {
                self.pending_article = false;
                match result {
                    Ok(article) => {
                        self.article = Some(article);
                        self.viewport = Viewport::new();
                        self.rendered_width = 0;
                        self.view = View::Content;
                        self.status_message.clear();
                    }
                    Err(err) => {
                        self.status_message = format!("Failed to load article: {err}");
                    }
                }
            }
            AsyncResponse::StateSaved { result } => {
                if let Err(err) = result {
                    self.status_message = format!("Failed to save read state: {err}");
                }
            }
        }
    }

    /// Channels stay in config order; a reload replaces the previous
    /// copy in place.
    fn install_channel(&mut self, channel: Channel) {
        if let Some(existing) = self
            .channels
            .iter_mut()
            .find(|existing| existing.feed_url == channel.feed_url)
        {
            *existing = channel;
            return;
        }
        let position = self
            .config
            .feeds
            .iter()
            .position(|feed| feed.url == channel.feed_url);
        match position {
            Some(target) => {
                let insert_at = self
                    .channels
                    .iter()
                    .filter(|loaded| {
                        self.config
                            .feeds
                            .iter()
                            .position(|feed| feed.url == loaded.feed_url)
                            .map_or(false, |index| index < target)
                    })
                    .count();
                self.channels.insert(insert_at, channel);
            }
            None => self.channels.push(channel),
        }
    }

    fn refresh_feeds(&mut self) {
        if self.config.feeds.is_empty() {
            self.status_message = "No feeds configured. Press a to add one.".to_string();
            return;
        }
        for feed in &self.config.feeds {
            let url = feed.url.clone();
            let reader = Arc::clone(&self.reader);
            let tx = self.response_tx.clone();
            self.pending_feeds += 1;
            thread::spawn(move || {
                let result = reader.read(&url);
                let _ = tx.send(AsyncResponse::Feed { url, result });
            });
        }
        self.status_message = format!("Loading {} feed(s)…", self.pending_feeds);
    }

    fn open_selected_article(&mut self) {
        let Some(item) = self
            .channels
            .get(self.selected_feed)
            .and_then(|channel| channel.items.get(self.selected_article))
        else {
            return;
        };
        let link = item.link.clone();
        if link.is_empty() {
            self.status_message = "Article has no link".to_string();
            return;
        }

        if self.config.mark_read_on_view {
            self.state.mark_read(&link);
            if self.config.auto_save {
                self.save_state_async();
            }
        }

        self.pending_article = true;
        self.status_message = "Loading article…".to_string();
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = fetcher.extract(&link);
            let _ = tx.send(AsyncResponse::Article { result });
        });
    }

    fn save_state_async(&self) {
        let Some(path) = self.state_path.clone() else {
            return;
        };
        let state = self.state.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = state.save(&path);
            let _ = tx.send(AsyncResponse::StateSaved { result });
        });
    }

    fn save_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        if let Err(err) = self.config.save(&path) {
            self.status_message = format!("Failed to save config: {err}");
        }
    }

    /// Renders the open article into the line buffer at the current
    /// width, rebuilding the link index. Render failure falls back to
    /// the raw markdown with byte-offset link spans.
    fn ensure_rendered(&mut self) {
        let width = self.render_width();
        if width == self.rendered_width && !self.lines.is_empty() {
            return;
        }
        let Some(article) = &self.article else {
            return;
        };
        match self.renderer.render(&article.content, width) {
            Ok(lines) => {
                self.article_links = links::from_rendered(&lines);
                self.lines = lines;
                self.raw_fallback = false;
            }
            Err(_) => {
                self.lines = article.content.lines().map(str::to_string).collect();
                self.article_links = links::from_markdown(&article.content);
                self.raw_fallback = true;
            }
        }
        self.rendered_width = width;
        self.viewport
            .clamp_to_window(self.visible_height().max(1));
    }

    fn render_width(&self) -> usize {
        let cols = self.terminal_cols.get() as usize;
        cols.saturating_sub(2).max(20)
    }

    fn visible_height(&self) -> usize {
        let rows = self.terminal_rows.get();
        if rows > CONTENT_CHROME_ROWS {
            (rows - CONTENT_CHROME_ROWS) as usize
        } else {
            FALLBACK_VISIBLE_HEIGHT
        }
    }

    fn active_link(&self) -> Option<&Link> {
        self.viewport
            .link_under_cursor(&self.lines, &self.article_links, self.link_hit_mode)
    }

    /// Styles one content row for painting: the active link's span gets
    /// the highlight, then the cursor row gets its marker. The marker
    /// runs last so the cursor cell wins where the two overlap. Raw
    /// fallback spans are byte offsets, not columns, so the highlight
    /// is skipped there.
    fn compose_content_line(&self, row: usize, line: &str) -> String {
        let mut composed = line.to_string();
        if !self.raw_fallback {
            if let Some(link) = self.active_link() {
                if link.line == row {
                    composed =
                        text::highlight_span(&composed, link.start, link.end, ACTIVE_LINK_CODES);
                }
            }
        }
        if row == self.viewport.cursor_line() {
            composed = text::insert_cursor_marker(&composed, self.viewport.cursor_x());
        }
        composed
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let handled = match self.view {
            View::Landing => self.handle_landing_key(key),
            View::Feeds => self.handle_feeds_key(key),
            View::Articles => self.handle_articles_key(key),
            View::Content => self.handle_content_key(key)?,
            View::Manage => self.handle_manage_key(key),
        };
        if handled {
            return Ok(true);
        }
        self.needs_redraw = true;
        Ok(false)
    }

    fn handle_landing_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.landing_index + 1 < LANDING_ENTRIES.len() {
                    self.landing_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.landing_index = self.landing_index.saturating_sub(1);
            }
            KeyCode::Enter => match self.landing_index {
                0 => {
                    self.view = View::Feeds;
                    if self.channels.is_empty() && self.pending_feeds == 0 {
                        self.refresh_feeds();
                    }
                }
                1 => self.view = View::Manage,
                _ => return true,
            },
            _ => {}
        }
        false
    }

    fn handle_feeds_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.view = View::Landing,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_feed + 1 < self.channels.len() {
                    self.selected_feed += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_feed = self.selected_feed.saturating_sub(1);
            }
            KeyCode::Char('r') => self.refresh_feeds(),
            KeyCode::Char('a') => {
                self.view = View::Manage;
                self.form = AddFeedForm {
                    active: true,
                    ..AddFeedForm::default()
                };
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                if self.selected_feed < self.channels.len() {
                    self.selected_article = 0;
                    self.view = View::Articles;
                }
            }
            _ => {}
        }
        false
    }

    fn handle_articles_key(&mut self, key: KeyEvent) -> bool {
        let items_len = self
            .channels
            .get(self.selected_feed)
            .map(|channel| channel.items.len())
            .unwrap_or(0);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('h') => self.view = View::Feeds,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_article + 1 < items_len {
                    self.selected_article += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_article = self.selected_article.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                if !self.pending_article {
                    self.open_selected_article();
                }
            }
            KeyCode::Char('o') => {
                if let Some(item) = self
                    .channels
                    .get(self.selected_feed)
                    .and_then(|channel| channel.items.get(self.selected_article))
                {
                    self.open_in_browser(&item.link.clone());
                }
            }
            _ => {}
        }
        false
    }

    fn handle_content_key(&mut self, key: KeyEvent) -> Result<bool> {
        let visible = self.visible_height();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                // Position state is per-article and dies with the view.
                self.view = View::Articles;
                self.article = None;
                self.lines.clear();
                self.article_links.clear();
                self.viewport = Viewport::new();
                self.rendered_width = 0;
                self.status_message.clear();
            }
            KeyCode::Char('j') | KeyCode::Down => self.viewport.move_down(&self.lines, visible),
            KeyCode::Char('k') | KeyCode::Up => self.viewport.move_up(&self.lines),
            KeyCode::Char('h') | KeyCode::Left => self.viewport.move_left(),
            KeyCode::Char('l') | KeyCode::Right => self.viewport.move_right(&self.lines),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.viewport.page_down(&self.lines, visible)
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.viewport.page_up(visible)
            }
            KeyCode::PageDown => self.viewport.page_down(&self.lines, visible),
            KeyCode::PageUp => self.viewport.page_up(visible),
            KeyCode::Char('g') | KeyCode::Home => self.viewport.jump_to_top(),
            KeyCode::Char('G') | KeyCode::End => self.viewport.jump_to_bottom(&self.lines),
            KeyCode::Char('o') | KeyCode::Enter => {
                match self.active_link().map(|link| link.url.clone()) {
                    Some(url) => self.open_in_browser(&url),
                    None => self.status_message = "No link under cursor".to_string(),
                }
            }
            KeyCode::Char('c') => match self.active_link().map(|link| link.url.clone()) {
                Some(url) => self.copy_to_clipboard(&url)?,
                None => self.status_message = "No link under cursor".to_string(),
            },
            _ => {}
        }
        Ok(false)
    }

    fn handle_manage_key(&mut self, key: KeyEvent) -> bool {
        if self.form.active {
            self.handle_form_key(key);
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.view = View::Feeds,
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected_feed + 1 < self.config.feeds.len() {
                    self.selected_feed += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_feed = self.selected_feed.saturating_sub(1);
            }
            KeyCode::Char('a') => {
                self.form = AddFeedForm {
                    active: true,
                    ..AddFeedForm::default()
                };
            }
            KeyCode::Char('d') => {
                if let Some(feed) = self.config.feeds.get(self.selected_feed) {
                    let url = feed.url.clone();
                    self.config.remove_feed(&url);
                    self.channels.retain(|channel| channel.feed_url != url);
                    self.selected_feed = self
                        .selected_feed
                        .min(self.config.feeds.len().saturating_sub(1));
                    self.save_config();
                    self.status_message = format!("Removed {url}");
                }
            }
            _ => {}
        }
        false
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.form = AddFeedForm::default();
            }
            KeyCode::Tab => {
                if self.form.next_field() {
                    self.form.field_index = 0;
                }
            }
            KeyCode::Enter => {
                if self.form.next_field() {
                    self.submit_form();
                }
            }
            KeyCode::Backspace => {
                self.form.value_mut().pop();
            }
            KeyCode::Char('v') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                match paste_from_clipboard() {
                    Ok(pasted) => self.form.value_mut().push_str(pasted.trim()),
                    Err(err) => self.status_message = format!("Clipboard error: {err}"),
                }
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.form.value_mut().push(ch);
            }
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        let url = self.form.url.trim().to_string();
        if url.is_empty() {
            self.status_message = "Feed URL is required".to_string();
            self.form.field_index = 0;
            return;
        }
        let tags: Vec<String> = self
            .form
            .tags
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        if self.config.add_feed(&url, &self.form.category, tags) {
            self.save_config();
            self.status_message = format!("Added {url}");
        } else {
            self.status_message = format!("{url} is already configured");
        }
        self.form = AddFeedForm::default();
    }

    fn open_in_browser(&mut self, url: &str) {
        if url.is_empty() {
            self.status_message = "No link to open".to_string();
            return;
        }
        match webbrowser::open(url) {
            Ok(()) => self.status_message = format!("Opened {url}"),
            Err(err) => self.status_message = format!("Failed to open browser: {err}"),
        }
    }

    fn copy_to_clipboard(&mut self, url: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("opening clipboard")?;
        clipboard
            .set_text(url.to_string())
            .context("writing clipboard")?;
        self.status_message = format!("Copied {url}");
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        self.terminal_rows.set(full.height);
        self.terminal_cols.set(full.width);

        if self.view == View::Content {
            self.ensure_rendered();
        }

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(full);

        match self.view {
            View::Landing => self.draw_landing(frame, layout[0]),
            View::Feeds => self.draw_feeds(frame, layout[0]),
            View::Articles => self.draw_articles(frame, layout[0]),
            View::Content => self.draw_content(frame, layout[0]),
            View::Manage => self.draw_manage(frame, layout[0]),
        }

        let status = Paragraph::new(self.status_line())
            .style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_widget(status, layout[1]);
    }

    fn status_line(&self) -> Line<'static> {
        if !self.status_message.is_empty() {
            return Line::from(self.status_message.clone());
        }
        match self.view {
            View::Landing => Line::from("j/k move · enter select · q quit"),
            View::Feeds => Line::from("j/k move · enter open · r refresh · a add · q back"),
            View::Articles => Line::from("j/k move · enter read · o browser · esc back"),
            View::Content => {
                let total = self.lines.len();
                let current = if total == 0 {
                    0
                } else {
                    self.viewport.cursor_line().min(total - 1) + 1
                };
                let mut parts = vec![Span::raw(format!("line {current}/{total}"))];
                if self.raw_fallback {
                    parts.push(Span::styled(
                        "  (raw)".to_string(),
                        Style::default().fg(COLOR_DIM),
                    ));
                }
                if let Some(link) = self.active_link() {
                    parts.push(Span::raw("  "));
                    parts.push(Span::styled(
                        link.url.clone(),
                        Style::default().fg(COLOR_ACCENT),
                    ));
                }
                parts.push(Span::styled(
                    "  o open · c copy · esc back".to_string(),
                    Style::default().fg(COLOR_DIM),
                ));
                Line::from(parts)
            }
            View::Manage => {
                if self.form.active {
                    Line::from("type · tab next field · enter submit · ctrl+v paste · esc cancel")
                } else {
                    Line::from("j/k move · a add · d delete · esc back")
                }
            }
        }
    }

    fn draw_landing(&self, frame: &mut Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = LANDING_ENTRIES
            .iter()
            .map(|entry| ListItem::new(Line::from(entry.to_string())))
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(self.landing_index));
        let list = List::new(items)
            .block(
                Block::default()
                    .title(Span::styled(
                        " rss-tui ",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_feeds(&self, frame: &mut Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = if self.channels.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                if self.pending_feeds > 0 {
                    "Loading feeds…"
                } else {
                    "No feeds loaded. Press r to refresh or a to add one."
                },
                Style::default().fg(COLOR_DIM),
            )))]
        } else {
            self.channels
                .iter()
                .map(|channel| {
                    let category = self
                        .config
                        .feeds
                        .iter()
                        .find(|feed| feed.url == channel.feed_url)
                        .map(|feed| feed.category.as_str())
                        .unwrap_or("");
                    let mut spans = vec![Span::raw(channel.title.clone())];
                    if !category.is_empty() {
                        spans.push(Span::styled(
                            format!("  [{category}]"),
                            Style::default().fg(COLOR_DIM),
                        ));
                    }
                    spans.push(Span::styled(
                        format!("  {} items", channel.items.len()),
                        Style::default().fg(COLOR_DIM),
                    ));
                    ListItem::new(Line::from(spans))
                })
                .collect()
        };

        let mut list_state = ListState::default();
        if !self.channels.is_empty() {
            list_state.select(Some(self.selected_feed.min(self.channels.len() - 1)));
        }
        let list = List::new(items)
            .block(Block::default().title(" Feeds ").borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_articles(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(channel) = self.channels.get(self.selected_feed) else {
            frame.render_widget(
                Paragraph::new("No feed selected")
                    .block(Block::default().title(" Articles ").borders(Borders::ALL)),
                area,
            );
            return;
        };

        let items: Vec<ListItem> = channel
            .items
            .iter()
            .map(|item| {
                let read = self.state.is_read(&item.link);
                let marker = if read { "  " } else { "• " };
                let style = if read {
                    Style::default().fg(COLOR_DIM)
                } else {
                    Style::default()
                };
                let mut spans = vec![Span::styled(format!("{marker}{}", item.title), style)];
                if !item.pub_date.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", item.pub_date),
                        Style::default().fg(COLOR_DIM),
                    ));
                }
                let mut lines = vec![Line::from(spans)];
                if !item.description.is_empty() {
                    let preview: String = item.description.chars().take(120).collect();
                    lines.push(Line::from(Span::styled(
                        format!("    {preview}"),
                        Style::default().fg(COLOR_DIM),
                    )));
                }
                ListItem::new(lines)
            })
            .collect();

        let mut list_state = ListState::default();
        if !channel.items.is_empty() {
            list_state.select(Some(self.selected_article.min(channel.items.len() - 1)));
        }
        let title = format!(" {} ", channel.title);
        let list = List::new(items)
            .block(Block::default().title(title).borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_content(&self, frame: &mut Frame<'_>, area: Rect) {
        let visible = self.visible_height();
        let scroll = self.viewport.scroll();

        let mut rendered: Vec<Line<'static>> = Vec::with_capacity(visible);
        for (offset, line) in self.lines.iter().skip(scroll).take(visible).enumerate() {
            let row = scroll + offset;
            rendered.push(text::ansi_spans(&self.compose_content_line(row, line)));
        }

        let title = match &self.article {
            Some(article) if !article.author.is_empty() => {
                format!(" {} — {} ", article.title, article.author)
            }
            Some(article) => format!(" {} ", article.title),
            None => " Article ".to_string(),
        };
        let paragraph = Paragraph::new(Text::from(rendered)).block(
            Block::default()
                .title(Span::styled(
                    title,
                    Style::default().add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_manage(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.form.active {
            self.draw_add_form(frame, area);
            return;
        }

        let items: Vec<ListItem> = if self.config.feeds.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "No feeds configured. Press a to add one.",
                Style::default().fg(COLOR_DIM),
            )))]
        } else {
            self.config
                .feeds
                .iter()
                .map(|feed| {
                    let mut spans = vec![Span::raw(feed.url.clone())];
                    if !feed.category.is_empty() {
                        spans.push(Span::styled(
                            format!("  [{}]", feed.category),
                            Style::default().fg(COLOR_DIM),
                        ));
                    }
                    if !feed.tags.is_empty() {
                        spans.push(Span::styled(
                            format!("  {}", feed.tags.join(", ")),
                            Style::default().fg(COLOR_DIM),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect()
        };

        let mut list_state = ListState::default();
        if !self.config.feeds.is_empty() {
            list_state.select(Some(self.selected_feed.min(self.config.feeds.len() - 1)));
        }
        let list = List::new(items)
            .block(Block::default().title(" Manage feeds ").borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_add_form(&self, frame: &mut Frame<'_>, area: Rect) {
        let field_line = |label: &str, value: &str, field: FormField| {
            let marker = if self.form.field() == field { "> " } else { "  " };
            let style = if self.form.field() == field {
                Style::default().fg(COLOR_ACCENT)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{marker}{label}: "), style),
                Span::raw(value.to_string()),
            ])
        };

        let lines = vec![
            Line::from(""),
            field_line("URL", &self.form.url, FormField::Url),
            field_line("Category", &self.form.category, FormField::Category),
            field_line("Tags (comma separated)", &self.form.tags, FormField::Tags),
        ];
        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().title(" Add feed ").borders(Borders::ALL))
            .alignment(Alignment::Left);
        frame.render_widget(paragraph, area);
    }
}

fn paste_from_clipboard() -> Result<String> {
    let mut clipboard = arboard::Clipboard::new().context("opening clipboard")?;
    clipboard.get_text().context("reading clipboard")
}
