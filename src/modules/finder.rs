use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use directories::BaseDirs;
use serde::Deserialize;
use walkdir::{DirEntry, WalkDir};
use crate::config::Config;
use crate::matcher::FuzzyMatcher;
use crate::model::Entry;
use super::{CancelToken, Common, Module, ModuleResult};

pub const NAME: &str = "finder";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
struct Options {
    root: Option<PathBuf>,
    max_depth: usize,
    show_hidden: bool,
    /// Cap on entries returned per query.
    limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root: None,
            max_depth: 4,
            show_hidden: false,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedFile {
    name: String,
    path: PathBuf,
}

/// Files below a root directory. Results can be dragged out of the launcher.
pub struct Finder {
    common: Common,
    root: PathBuf,
    max_depth: usize,
    show_hidden: bool,
    limit: usize,
    index: OnceLock<Vec<IndexedFile>>,
}

impl Finder {
    pub fn setup(config: &Config) -> Option<Self> {
        let common = Common::from_config(NAME, config)?;
        let options: Options = config.module(NAME)?.options();
        let root = options
            .root
            .or_else(|| BaseDirs::new().map(|d| d.home_dir().to_path_buf()))?;

        Some(Self {
            common,
            root,
            max_depth: options.max_depth,
            show_hidden: options.show_hidden,
            limit: options.limit,
            index: OnceLock::new(),
        })
    }

    /// Files under the root, walked on first use.
    ///
    /// A walk interrupted by `cancel` yields `None` and leaves nothing cached,
    /// so the next query starts over.
    fn index(&self, cancel: &CancelToken) -> Option<&[IndexedFile]> {
        if let Some(files) = self.index.get() {
            return Some(files.as_slice());
        }

        let show_hidden = self.show_hidden;
        let walker = WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_entry(|e| show_hidden || e.depth() == 0 || !is_hidden(e));

        let mut files = Vec::new();
        for entry in walker.flatten() {
            if cancel.is_cancelled() {
                log::debug!("Finder: walk of {:?} cancelled after {} files", self.root, files.len());
                return None;
            }
            if entry.file_type().is_file() {
                files.push(IndexedFile {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.into_path(),
                });
            }
        }

        log::info!("Finder: indexed {} files under {:?}", files.len(), self.root);
        Some(self.index.get_or_init(|| files).as_slice())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}

fn parent_label(path: &Path) -> String {
    path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default()
}

impl Module for Finder {
    fn name(&self) -> &str {
        NAME
    }

    fn prefix(&self) -> &str {
        &self.common.prefix
    }

    fn switcher_exclusive(&self) -> bool {
        self.common.switcher_exclusive
    }

    fn entries(&self, cancel: &CancelToken, term: &str) -> ModuleResult {
        let Some(term) = self.common.strip(term) else {
            return Ok(Vec::new());
        };
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let Some(files) = self.index(cancel) else {
            return Ok(Vec::new());
        };
        let ranked = FuzzyMatcher::new().rank(term, files, |f| f.name.as_str(), || !cancel.is_cancelled());

        Ok(ranked
            .into_iter()
            .take(self.limit)
            .map(|(i, _)| {
                let file = &files[i];
                let path = file.path.to_string_lossy().into_owned();
                Entry::new(file.name.clone(), format!("xdg-open {}", shell_words::quote(&path)), NAME)
                    .with_sub(parent_label(&file.path))
                    .with_icon(Some("text-x-generic".to_string()))
                    .draggable(path)
            })
            .collect())
    }
}
