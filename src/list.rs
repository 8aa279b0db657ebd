//! The displayed result list: selection, quick-activation labels, visibility
//! and class propagation.
//!
//! All state changes go through methods that push the outcome to a
//! [`Surface`], so the engine can be driven without a window.

use crate::model::Entry;

/// One displayed row as handed to the surface.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub entry: &'a Entry,
    /// Quick-activation key bound to this position, if any.
    pub quick_key: Option<&'a str>,
}

/// Whatever draws the list.
pub trait Surface {
    /// The displayed sequence changed; rows carry their per-row class via the entry.
    fn replace_rows(&mut self, rows: &[Row<'_>]);
    fn set_selection(&mut self, index: Option<usize>);
    fn set_visible(&mut self, visible: bool);
    /// Class of the selected row for top-level styling; `None` clears it.
    fn set_chrome_class(&mut self, class: Option<&str>);
    /// A generation is still waiting on modules.
    fn set_busy(&mut self, _busy: bool) {}
}

pub struct ResultList {
    entries: Vec<Entry>,
    selected: Option<usize>,
    quick_keys: Vec<String>,
    always_show: bool,
    quick_mode: bool,
    visible: bool,
}

impl ResultList {
    pub fn new(quick_keys: Vec<String>, always_show: bool) -> Self {
        Self {
            entries: Vec::new(),
            selected: None,
            quick_keys,
            always_show,
            quick_mode: false,
            visible: always_show,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Entry> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn quick_mode(&self) -> bool {
        self.quick_mode
    }

    /// Quick-activation key shown on row `index`.
    pub fn quick_key(&self, index: usize) -> Option<&str> {
        if index < self.entries.len() {
            self.quick_keys.get(index).map(String::as_str)
        } else {
            None
        }
    }

    /// Row bound to the quick-activation `key`, if that row exists.
    pub fn quick_target(&self, key: &str) -> Option<usize> {
        self.quick_keys
            .iter()
            .position(|k| k == key)
            .filter(|&i| i < self.entries.len())
    }

    /// Swaps in a new displayed sequence and resets the selection to the top.
    pub fn replace(&mut self, entries: Vec<Entry>, surface: &mut dyn Surface) {
        self.entries = entries;
        self.selected = if self.entries.is_empty() { None } else { Some(0) };

        let rows: Vec<Row<'_>> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| Row {
                entry,
                quick_key: self.quick_keys.get(i).map(String::as_str),
            })
            .collect();
        surface.replace_rows(&rows);

        log::debug!("ResultList: {} rows", self.entries.len());
        self.update_visibility(surface);
        self.publish_selection(surface);
    }

    pub fn clear(&mut self, surface: &mut dyn Surface) {
        self.replace(Vec::new(), surface);
    }

    /// Selects row `index`; out-of-range indices are ignored.
    pub fn select(&mut self, index: usize, surface: &mut dyn Surface) {
        if index >= self.entries.len() || self.selected == Some(index) {
            return;
        }
        self.selected = Some(index);
        self.publish_selection(surface);
    }

    /// Pointer entered row `index`; mouse and keyboard share one selection.
    pub fn hover(&mut self, index: usize, surface: &mut dyn Surface) {
        self.select(index, surface);
    }

    /// Moves the selection by `delta` rows, wrapping at both ends.
    pub fn move_selection(&mut self, delta: i32, surface: &mut dyn Surface) {
        if self.entries.is_empty() {
            return;
        }
        let len = self.entries.len() as i64;
        let current = self.selected.unwrap_or(0) as i64;
        let next = (current + delta as i64).rem_euclid(len) as usize;
        self.select(next, surface);
    }

    /// Enters or leaves quick-activation mode. Class propagation pauses while
    /// it is active.
    pub fn set_quick_mode(&mut self, enabled: bool, surface: &mut dyn Surface) {
        let enabled = enabled && !self.quick_keys.is_empty();
        if self.quick_mode == enabled {
            return;
        }
        self.quick_mode = enabled;
        if !enabled {
            self.publish_selection(surface);
        }
    }

    fn update_visibility(&mut self, surface: &mut dyn Surface) {
        self.visible = self.always_show || !self.entries.is_empty();
        surface.set_visible(self.visible);
    }

    fn publish_selection(&self, surface: &mut dyn Surface) {
        surface.set_selection(self.selected);
        if self.quick_mode {
            return;
        }
        surface.set_chrome_class(self.selected().map(|e| e.class.as_str()));
    }
}
