/// Ranking hint carried by every entry.
///
/// The order of the variants is the merge order: every `Normal` entry sorts
/// before every `AlwaysBottom` entry, whatever module produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Matching {
    #[default]
    Normal,
    AlwaysBottom,
}

/// One result row.
///
/// Entries are produced by modules and never mutated afterwards; the list
/// swaps whole sequences instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub label: String,         // Primary text
    pub sub: Option<String>,   // Second line; absent means a vertically centered row
    pub exec: String,          // Command handed to the executor
    pub class: String,         // Theming tag, usually the owning module's name
    pub icon: Option<String>,  // Icon name or path
    pub image: Option<String>, // Full-width preview image
    pub icon_is_image: bool,   // Treat `icon` as a picture file instead of a themed icon
    pub hide_text: bool,
    pub drag_drop: bool,
    pub drag_drop_data: Option<String>, // Path exported on drag
    pub matching: Matching,
}

impl Entry {
    pub fn new(label: impl Into<String>, exec: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            exec: exec.into(),
            class: class.into(),
            ..Default::default()
        }
    }

    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_matching(mut self, matching: Matching) -> Self {
        self.matching = matching;
        self
    }

    /// Marks the entry as draggable, exporting `path` to drop targets.
    pub fn draggable(mut self, path: impl Into<String>) -> Self {
        self.drag_drop = true;
        self.drag_drop_data = Some(path.into());
        self
    }

    pub fn is_two_line(&self) -> bool {
        self.sub.as_deref().is_some_and(|s| !s.is_empty())
    }
}
