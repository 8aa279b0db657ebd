use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use directories::BaseDirs;
use regex::Regex;
use serde::Deserialize;
use crate::config::Config;
use crate::history::{self, History};
use crate::matcher::FuzzyMatcher;
use crate::model::Entry;
use super::{CancelToken, Common, Module, ModuleResult};

pub const NAME: &str = "applications";

/// Score added per recorded launch.
const HISTORY_BOOST: u32 = 100;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct Options {
    /// Directories searched for `.desktop` files; XDG defaults when empty.
    dirs: Vec<PathBuf>,
    /// Regexes matched against name and file path; hits are never shown.
    blacklist: Vec<String>,
    /// Skip the usage history bias.
    no_history: bool,
}

#[derive(Debug, Clone)]
struct App {
    name: String,
    exec: String,
    comment: Option<String>,
    icon: Option<String>,
}

/// Installed desktop applications, ranked fuzzily with a usage bias.
pub struct Applications {
    common: Common,
    dirs: Vec<PathBuf>,
    blacklist: Vec<Regex>,
    terminal: Option<String>,
    history: History,
    apps: OnceLock<Vec<App>>,
}

impl Applications {
    pub fn setup(config: &Config) -> Option<Self> {
        let common = Common::from_config(NAME, config)?;
        let options: Options = config.module(NAME)?.options();

        let blacklist = options
            .blacklist
            .iter()
            .filter_map(|s| match Regex::new(s) {
                Ok(re) => Some(re),
                Err(e) => {
                    log::warn!("Applications: bad blacklist pattern '{}': {}", s, e);
                    None
                }
            })
            .collect();

        let dirs = if options.dirs.is_empty() { default_dirs() } else { options.dirs };
        let history = if options.no_history { History::default() } else { history::load_history() };

        Some(Self {
            common,
            dirs,
            blacklist,
            terminal: config.general.terminal.clone(),
            history,
            apps: OnceLock::new(),
        })
    }

    /// Scanned applications; `None` if the first scan was cancelled.
    fn apps(&self, cancel: &CancelToken) -> Option<&[App]> {
        if let Some(apps) = self.apps.get() {
            return Some(apps.as_slice());
        }
        let apps = self.scan(cancel)?;
        Some(self.apps.get_or_init(|| apps).as_slice())
    }

    fn scan(&self, cancel: &CancelToken) -> Option<Vec<App>> {
        let mut apps = Vec::new();

        for dir in &self.dirs {
            let Ok(read_dir) = fs::read_dir(dir) else { continue };
            log::debug!("Scanning desktop files in {:?}", dir);

            for entry in read_dir.flatten() {
                if cancel.is_cancelled() {
                    log::debug!("Applications: scan cancelled after {} entries", apps.len());
                    return None;
                }
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) != Some("desktop") {
                    continue;
                }
                let Ok(content) = fs::read_to_string(&path) else { continue };
                let Some(parsed) = parse_desktop_file(&content) else { continue };
                if self.is_blacklisted(&parsed.name, &path) {
                    continue;
                }

                let name = match &parsed.container {
                    Some(c) => format!("{} ({})", parsed.name, c),
                    None => parsed.name,
                };
                let exec = match (&self.terminal, parsed.terminal) {
                    (Some(term), true) => format!("{} {}", term, parsed.exec),
                    _ => parsed.exec,
                };

                apps.push(App {
                    name,
                    exec,
                    comment: parsed.comment,
                    icon: parsed.icon,
                });
            }
        }

        log::info!("Applications: found {} entries", apps.len());
        Some(apps)
    }

    fn is_blacklisted(&self, name: &str, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.blacklist.iter().any(|re| re.is_match(name) || re.is_match(&path))
    }
}

impl Module for Applications {
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

        let Some(apps) = self.apps(cancel) else {
            return Ok(Vec::new());
        };
        let mut ranked = FuzzyMatcher::new().rank(term, apps, |a| a.name.as_str(), || !cancel.is_cancelled());

        for (i, score) in ranked.iter_mut() {
            *score += self.history.count(&apps[*i].exec) * HISTORY_BOOST;
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(ranked
            .into_iter()
            .map(|(i, _)| {
                let app = &apps[i];
                let entry = Entry::new(app.name.clone(), app.exec.clone(), NAME).with_icon(app.icon.clone());
                match &app.comment {
                    Some(comment) => entry.with_sub(comment.clone()),
                    None => entry,
                }
            })
            .collect())
    }
}

fn default_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(base_dirs) = BaseDirs::new() {
        dirs.push(base_dirs.data_dir().join("applications"));
    }
    dirs.push(PathBuf::from("/usr/share/applications"));
    dirs.push(PathBuf::from("/usr/local/share/applications"));
    dirs
}

#[derive(Debug, Default, PartialEq)]
struct DesktopFile {
    name: String,
    exec: String,
    comment: Option<String>,
    icon: Option<String>,
    terminal: bool,
    container: Option<String>,
}

fn parse_desktop_file(content: &str) -> Option<DesktopFile> {
    let mut name = None;
    let mut exec = None;
    let mut comment = None;
    let mut icon = None;
    let mut terminal = false;
    let mut hidden = false;
    let mut in_main_group = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') { continue; }

        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group { continue; }

        let Some((key, value)) = line.split_once('=') else { continue };
        match key.trim() {
            "Name" => name = Some(value.trim().to_string()),
            "Comment" => comment = Some(value.trim().to_string()),
            "Icon" => icon = Some(value.trim().to_string()),
            "Terminal" => terminal = value.trim() == "true",
            "NoDisplay" | "Hidden" => hidden |= value.trim() == "true",
            "Exec" => {
                // Field codes like %U only make sense to file managers.
                let clean: Vec<&str> = value.split_whitespace().filter(|s| !s.starts_with('%')).collect();
                exec = Some(clean.join(" "));
            }
            _ => {}
        }
    }

    if hidden { return None; }

    let exec = exec.filter(|e| !e.is_empty())?;
    let container = container_name(&exec);

    Some(DesktopFile {
        name: name?,
        exec,
        comment: comment.filter(|c| !c.is_empty()),
        icon,
        terminal,
        container,
    })
}

/// Container a distrobox/toolbox wrapper launches into, if any.
fn container_name(exec: &str) -> Option<String> {
    let flags: &[&str] = if exec.contains("distrobox-enter") {
        &["-n", "--name"]
    } else if exec.contains("toolbox run") {
        &["-c", "--container"]
    } else {
        return None;
    };

    let parts: Vec<&str> = exec.split_whitespace().collect();
    let pos = parts.iter().position(|p| flags.contains(p))?;
    parts.get(pos + 1).map(|s| s.to_string())
}
