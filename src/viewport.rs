use crate::links::Link;
use crate::text;

const MIN_PAGE_STEP: usize = 5;

/// Maximum distance, in display columns, at which the lenient hit mode
/// still snaps to the nearest link on the cursor line.
const NEARBY_THRESHOLD: usize = 10;

/// Strictness of `link_under_cursor`: `Exact` requires the cursor to
/// sit inside a span; `Nearest` allows one cell of slack and then
/// falls back to the closest link on the line within a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkHitMode {
    #[default]
    Exact,
    Nearest,
}

/// Position state over the rendered line buffer: the first visible
/// line, plus a 2-D cursor relative to the visible window. All
/// mutation goes through the named operations; out-of-range moves
/// clamp silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    scroll: usize,
    cursor_x: usize,
    cursor_y: usize,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn cursor_x(&self) -> usize {
        self.cursor_x
    }

    pub fn cursor_y(&self) -> usize {
        self.cursor_y
    }

    /// Absolute buffer index of the line under the cursor.
    pub fn cursor_line(&self) -> usize {
        self.scroll + self.cursor_y
    }

    /// Moves the cursor one row down within the window, scrolling once
    /// the bottom row is reached. The column re-clamps to the new
    /// line's width; it never wraps to the next line.
    pub fn move_down(&mut self, lines: &[String], visible_height: usize) {
        if visible_height > 0 && self.cursor_y + 1 < visible_height {
            self.cursor_y += 1;
            self.clamp_x(lines);
        } else {
            self.scroll_down(lines);
        }
    }

    pub fn move_up(&mut self, lines: &[String]) {
        if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.clamp_x(lines);
        } else {
            self.scroll_up();
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_x = self.cursor_x.saturating_sub(1);
    }

    /// The cursor may rest one column past the last cell, matching the
    /// `0 <= cursor_x <= width` invariant.
    pub fn move_right(&mut self, lines: &[String]) {
        if let Some(line) = lines.get(self.cursor_line()) {
            if self.cursor_x < text::display_width(line) {
                self.cursor_x += 1;
            }
        }
    }

    pub fn scroll_down(&mut self, lines: &[String]) {
        if self.scroll < lines.len().saturating_sub(1) {
            self.scroll += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn page_down(&mut self, lines: &[String], visible_height: usize) {
        let step = (visible_height / 2).max(MIN_PAGE_STEP);
        self.scroll = (self.scroll + step).min(lines.len().saturating_sub(1));
    }

    pub fn page_up(&mut self, visible_height: usize) {
        let step = (visible_height / 2).max(MIN_PAGE_STEP);
        self.scroll = self.scroll.saturating_sub(step);
    }

    pub fn jump_to_top(&mut self) {
        *self = Self::default();
    }

    /// Scrolls so the last line sits alone at the top of the window.
    /// Deliberately kept from the long-standing `G` behavior rather
    /// than showing a full final page.
    pub fn jump_to_bottom(&mut self, lines: &[String]) {
        self.scroll = lines.len().saturating_sub(1);
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    /// Pulls the cursor row back inside the window after the window
    /// shrinks (terminal resize, re-render).
    pub fn clamp_to_window(&mut self, visible_height: usize) {
        if visible_height > 0 && self.cursor_y >= visible_height {
            self.cursor_y = visible_height - 1;
        }
    }

    fn clamp_x(&mut self, lines: &[String]) {
        if let Some(line) = lines.get(self.cursor_line()) {
            let width = text::display_width(line);
            if self.cursor_x > width {
                self.cursor_x = width;
            }
        }
    }

    /// Pure query: the link whose span contains the cursor, or under
    /// `Nearest` mode the closest link on the cursor line within
    /// `NEARBY_THRESHOLD` columns.
    pub fn link_under_cursor<'a>(
        &self,
        lines: &[String],
        article_links: &'a [Link],
        mode: LinkHitMode,
    ) -> Option<&'a Link> {
        let line_no = self.cursor_line();
        if line_no >= lines.len() {
            return None;
        }
        let line_width = text::display_width(&lines[line_no]);

        let mut closest: Option<(&Link, usize)> = None;
        for link in article_links.iter().filter(|link| link.line == line_no) {
            if self.cursor_x >= link.start && self.cursor_x <= link.end {
                return Some(link);
            }
            if mode == LinkHitMode::Exact {
                continue;
            }
            // One cell of slack absorbs off-by-one column math around
            // styled text.
            if self.cursor_x + 1 >= link.start
                && self.cursor_x <= link.end + 1
                && self.cursor_x <= line_width
            {
                return Some(link);
            }
            let center = (link.start + link.end) / 2;
            let distance = self.cursor_x.abs_diff(center);
            if closest.map_or(true, |(_, best)| distance < best) {
                closest = Some((link, distance));
            }
        }

        match mode {
            LinkHitMode::Exact => None,
            LinkHitMode::Nearest => closest
                .and_then(|(link, distance)| (distance <= NEARBY_THRESHOLD).then_some(link)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("line number {i}")).collect()
    }

    #[test]
    fn move_down_within_window_advances_cursor_row() {
        let lines = buffer(10);
        let mut vp = Viewport::new();
        vp.move_down(&lines, 3);
        assert_eq!((vp.scroll(), vp.cursor_y()), (0, 1));
    }

    #[test]
    fn move_down_at_bottom_row_scrolls_instead() {
        let lines = buffer(10);
        let mut vp = Viewport::new();
        vp.move_down(&lines, 3);
        vp.move_down(&lines, 3);
        assert_eq!((vp.scroll(), vp.cursor_y()), (0, 2));
        vp.move_down(&lines, 3);
        assert_eq!((vp.scroll(), vp.cursor_y()), (1, 2));
    }

    #[test]
    fn move_up_at_top_row_scrolls_back() {
        let lines = buffer(10);
        let mut vp = Viewport::new();
        vp.page_down(&lines, 10);
        vp.move_up(&lines);
        assert_eq!(vp.scroll(), 4);
        assert_eq!(vp.cursor_y(), 0);
    }

    #[test]
    fn vertical_move_reclamps_cursor_column() {
        let lines = vec!["hello".to_string(), "abc".to_string()];
        let mut vp = Viewport::new();
        for _ in 0..5 {
            vp.move_right(&lines);
        }
        assert_eq!(vp.cursor_x(), 5);
        vp.move_down(&lines, 5);
        assert_eq!(vp.cursor_x(), 3);
    }

    #[test]
    fn move_right_stops_at_line_width() {
        let lines = vec!["ab".to_string()];
        let mut vp = Viewport::new();
        for _ in 0..5 {
            vp.move_right(&lines);
        }
        assert_eq!(vp.cursor_x(), 2);
    }

    #[test]
    fn move_left_stops_at_zero() {
        let lines = vec!["ab".to_string()];
        let mut vp = Viewport::new();
        vp.move_left();
        assert_eq!(vp.cursor_x(), 0);
        vp.move_right(&lines);
        vp.move_left();
        assert_eq!(vp.cursor_x(), 0);
    }

    #[test]
    fn scroll_stops_at_last_line() {
        let lines = buffer(3);
        let mut vp = Viewport::new();
        for _ in 0..10 {
            vp.scroll_down(&lines);
        }
        assert_eq!(vp.scroll(), 2);
    }

    #[test]
    fn page_step_is_half_window_with_floor() {
        let lines = buffer(100);
        let mut vp = Viewport::new();
        vp.page_down(&lines, 30);
        assert_eq!(vp.scroll(), 15);
        vp.page_up(30);
        assert_eq!(vp.scroll(), 0);

        let mut small = Viewport::new();
        small.page_down(&lines, 4);
        assert_eq!(small.scroll(), 5);
    }

    #[test]
    fn page_down_clamps_to_last_line() {
        let lines = buffer(8);
        let mut vp = Viewport::new();
        vp.page_down(&lines, 40);
        assert_eq!(vp.scroll(), 7);
    }

    #[test]
    fn jump_to_bottom_places_last_line_at_top() {
        let lines = buffer(50);
        let mut vp = Viewport::new();
        vp.move_down(&lines, 10);
        vp.move_right(&lines);
        vp.jump_to_bottom(&lines);
        assert_eq!((vp.scroll(), vp.cursor_x(), vp.cursor_y()), (49, 0, 0));
        vp.jump_to_top();
        assert_eq!((vp.scroll(), vp.cursor_x(), vp.cursor_y()), (0, 0, 0));
    }

    #[test]
    fn empty_buffer_operations_are_no_ops() {
        let lines: Vec<String> = Vec::new();
        let mut vp = Viewport::new();
        vp.move_down(&lines, 0);
        vp.move_up(&lines);
        vp.move_right(&lines);
        vp.scroll_down(&lines);
        vp.page_down(&lines, 10);
        vp.jump_to_bottom(&lines);
        assert_eq!(vp, Viewport::new());
        assert!(vp
            .link_under_cursor(&lines, &[], LinkHitMode::Nearest)
            .is_none());
    }

    #[test]
    fn clamp_to_window_pulls_cursor_row_back() {
        let lines = buffer(20);
        let mut vp = Viewport::new();
        for _ in 0..7 {
            vp.move_down(&lines, 10);
        }
        assert_eq!(vp.cursor_y(), 7);
        vp.clamp_to_window(4);
        assert_eq!(vp.cursor_y(), 3);
    }

    fn link_at(line: usize, start: usize, end: usize) -> Link {
        Link {
            text: "x".to_string(),
            url: "http://a.test".to_string(),
            line,
            start,
            end,
        }
    }

    #[test]
    fn exact_mode_requires_cursor_inside_span() {
        let lines = vec!["aaaa http://a.test aaaa".to_string()];
        let links = vec![link_at(0, 5, 17)];
        let mut vp = Viewport::new();
        for _ in 0..5 {
            vp.move_right(&lines);
        }
        assert!(vp
            .link_under_cursor(&lines, &links, LinkHitMode::Exact)
            .is_some());
        vp.move_left();
        assert!(vp
            .link_under_cursor(&lines, &links, LinkHitMode::Exact)
            .is_none());
    }

    #[test]
    fn nearest_mode_snaps_within_threshold() {
        let lines = vec!["x".repeat(40)];
        let links = vec![link_at(0, 20, 24)];
        let vp = Viewport::new();
        // Cursor at 0, link center at 22: beyond the threshold.
        assert!(vp
            .link_under_cursor(&lines, &links, LinkHitMode::Nearest)
            .is_none());

        let mut near = Viewport::new();
        for _ in 0..15 {
            near.move_right(&lines);
        }
        assert!(near
            .link_under_cursor(&lines, &links, LinkHitMode::Nearest)
            .is_some());
    }

    #[test]
    fn links_on_other_lines_never_match() {
        let lines = vec!["http://a.test".to_string(), "plain".to_string()];
        let links = vec![link_at(0, 0, 12)];
        let mut vp = Viewport::new();
        vp.move_down(&lines, 5);
        assert!(vp
            .link_under_cursor(&lines, &links, LinkHitMode::Nearest)
            .is_none());
    }
}
