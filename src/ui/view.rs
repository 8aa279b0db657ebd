use quickrun::config::ThemeConfig;
use quickrun::{Entry, Error, Row, Surface};

pub const SEARCH_HEIGHT: f32 = 20.0;
pub const ROW_HEIGHT: f32 = 44.0;

pub struct DisplayRow {
    pub entry: Entry,
    pub quick_key: Option<String>,
}

/// What the renderer draws, as last pushed by the launcher.
#[derive(Default)]
pub struct View {
    pub rows: Vec<DisplayRow>,
    pub selected: Option<usize>,
    pub list_visible: bool,
    pub chrome_class: Option<String>,
    pub busy: bool,
    pub quick_mode: bool,
    pub query: String,
    dirty: bool,
    fault: Option<String>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns and clears the redraw flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// First invariant violation seen since the last call.
    pub fn take_fault(&mut self) -> Option<Error> {
        self.fault.take().map(Error::Surface)
    }

    fn fail(&mut self, message: String) {
        log::error!("{}", message);
        self.fault.get_or_insert(message);
    }
}

impl Surface for View {
    fn replace_rows(&mut self, rows: &[Row<'_>]) {
        self.rows = rows
            .iter()
            .map(|r| DisplayRow {
                entry: r.entry.clone(),
                quick_key: r.quick_key.map(str::to_string),
            })
            .collect();
        self.dirty = true;
    }

    fn set_selection(&mut self, index: Option<usize>) {
        if let Some(i) = index.filter(|&i| i >= self.rows.len()) {
            self.fail(format!("selection {} out of range for {} rows", i, self.rows.len()));
            return;
        }
        self.selected = index;
        self.dirty = true;
    }

    fn set_visible(&mut self, visible: bool) {
        self.list_visible = visible;
        self.dirty = true;
    }

    fn set_chrome_class(&mut self, class: Option<&str>) {
        self.chrome_class = class.map(str::to_string);
        self.dirty = true;
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            self.dirty = true;
        }
    }
}

/// Row geometry shared by drawing and pointer hit-testing.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub padding: f32,
    pub width: f32,
    pub list_top: f32,
    pub visible_rows: usize,
    pub scroll: usize,
}

impl Layout {
    pub fn new(theme: &ThemeConfig, width: u32, height: u32, total: usize, selected: Option<usize>) -> Self {
        let list_top = theme.padding + SEARCH_HEIGHT + theme.spacing;
        let room = (height as f32 - list_top - theme.padding).max(0.0);
        let visible_rows = (room / ROW_HEIGHT) as usize;
        let selected = selected.unwrap_or(0);

        // Keep the selection near the middle once the list overflows.
        let scroll = if total <= visible_rows {
            0
        } else if selected < visible_rows / 2 {
            0
        } else if selected >= total - visible_rows / 2 {
            total.saturating_sub(visible_rows)
        } else {
            selected - visible_rows / 2
        };

        Self {
            padding: theme.padding,
            width: width as f32,
            list_top,
            visible_rows,
            scroll,
        }
    }

    /// Indices of the rows on screen.
    pub fn visible(&self, total: usize) -> std::ops::Range<usize> {
        self.scroll..total.min(self.scroll + self.visible_rows)
    }

    pub fn row_top(&self, index: usize) -> f32 {
        self.list_top + (index.saturating_sub(self.scroll)) as f32 * ROW_HEIGHT
    }

    /// Row under the pointer position, if any.
    pub fn row_at(&self, x: f64, y: f64, total: usize) -> Option<usize> {
        let (x, y) = (x as f32, y as f32);
        if x < self.padding / 2.0 || x > self.width - self.padding / 2.0 || y < self.list_top {
            return None;
        }
        let offset = ((y - self.list_top) / ROW_HEIGHT) as usize;
        if offset >= self.visible_rows {
            return None;
        }
        let index = self.scroll + offset;
        (index < total).then_some(index)
    }
}
