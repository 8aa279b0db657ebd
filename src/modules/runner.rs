use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use serde::Deserialize;
use crate::config::Config;
use crate::matcher::FuzzyMatcher;
use crate::model::Entry;
use super::{CancelToken, Common, Module, ModuleResult};

pub const NAME: &str = "runner";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct Options {
    /// Search these directories instead of `$PATH`.
    paths: Vec<PathBuf>,
    /// Wrap commands in `general.terminal`.
    terminal: bool,
}

/// Executables on `$PATH`, launched with whatever arguments were typed.
pub struct Runner {
    common: Common,
    paths: Vec<PathBuf>,
    terminal: Option<String>,
    bins: OnceLock<Vec<String>>,
}

impl Runner {
    pub fn setup(config: &Config) -> Option<Self> {
        let common = Common::from_config(NAME, config)?;
        let options: Options = config.module(NAME)?.options();

        let paths = if options.paths.is_empty() {
            env::var_os("PATH")
                .map(|p| env::split_paths(&p).collect())
                .unwrap_or_default()
        } else {
            options.paths
        };
        let terminal = if options.terminal { config.general.terminal.clone() } else { None };

        Some(Self {
            common,
            paths,
            terminal,
            bins: OnceLock::new(),
        })
    }

    /// `None` when `cancel` fires mid-scan; the next query scans again.
    fn bins(&self, cancel: &CancelToken) -> Option<&[String]> {
        if let Some(bins) = self.bins.get() {
            return Some(bins.as_slice());
        }
        let mut names = BTreeSet::new();
        for dir in &self.paths {
            if cancel.is_cancelled() {
                log::debug!("Runner: scan cancelled");
                return None;
            }
            log::debug!("Scanning binaries in {:?}", dir);
            names.extend(executables_in(dir));
        }
        log::info!("Runner: found {} entries", names.len());
        Some(self.bins.get_or_init(|| names.into_iter().collect()).as_slice())
    }
}

/// File names of the executable regular files directly inside `dir`.
pub(crate) fn executables_in(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };

    read_dir
        .flatten()
        .filter(|entry| {
            fs::metadata(entry.path())
                .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        })
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect()
}

impl Module for Runner {
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
        let command_line = term.trim();
        let Some(program) = command_line.split_whitespace().next() else {
            return Ok(Vec::new());
        };
        let args = command_line[program.len()..].trim_start();

        let Some(bins) = self.bins(cancel) else {
            return Ok(Vec::new());
        };
        let ranked = FuzzyMatcher::new().rank(program, bins, |b| b.as_str(), || !cancel.is_cancelled());

        Ok(ranked
            .into_iter()
            .map(|(i, _)| {
                let bin = &bins[i];
                let line = if args.is_empty() { bin.clone() } else { format!("{} {}", bin, args) };
                let exec = match &self.terminal {
                    Some(term) => format!("{} {}", term, line),
                    None => line.clone(),
                };
                Entry::new(line, exec, NAME).with_icon(Some("utilities-terminal".to_string()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use crate::config::{parse_config, ModuleConfig};

    fn make_exec(dir: &Path, name: &str, mode: u32) {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn runner_in(dir: &Path, prefix: &str) -> Runner {
        let mut config = parse_config("").unwrap();
        let mut block = ModuleConfig::new(NAME, prefix);
        block.options.insert(
            "paths".into(),
            toml::Value::Array(vec![toml::Value::String(dir.to_string_lossy().into_owned())]),
        );
        config.modules = vec![block];
        Runner::setup(&config).unwrap()
    }

    #[test]
    fn only_executables_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        make_exec(dir.path(), "htop", 0o755);
        make_exec(dir.path(), "readme", 0o644);
        fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(executables_in(dir.path()), vec!["htop".to_string()]);
    }

    #[test]
    fn arguments_are_carried_into_exec() {
        let dir = tempfile::tempdir().unwrap();
        make_exec(dir.path(), "htop", 0o755);
        let runner = runner_in(dir.path(), "!");

        let entries = runner.entries(&CancelToken::never(), "!htop -d 10").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "htop -d 10");
        assert_eq!(entries[0].exec, "htop -d 10");
        assert_eq!(entries[0].class, "runner");

        assert!(runner.entries(&CancelToken::never(), "htop").unwrap().is_empty());
    }

    #[test]
    fn cancelled_path_scan_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        make_exec(dir.path(), "htop", 0o755);
        let runner = runner_in(dir.path(), "");

        let stale = CancelToken::new(Arc::new(AtomicU64::new(2)), 1);
        assert!(runner.entries(&stale, "htop").unwrap().is_empty());
        assert!(runner.bins.get().is_none());

        assert_eq!(runner.entries(&CancelToken::never(), "htop").unwrap().len(), 1);
    }
}
