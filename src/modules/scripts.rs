use std::path::PathBuf;
use std::sync::OnceLock;
use serde::Deserialize;
use crate::config::{project_dirs, Config};
use crate::matcher::FuzzyMatcher;
use crate::model::Entry;
use super::runner::executables_in;
use super::{CancelToken, Common, Module, ModuleResult};

pub const NAME: &str = "scripts";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct Options {
    /// Defaults to `scripts/` in the config directory.
    dir: Option<PathBuf>,
}

/// User scripts kept next to the config file.
pub struct Scripts {
    common: Common,
    dir: Option<PathBuf>,
    scripts: OnceLock<Vec<String>>,
}

impl Scripts {
    pub fn setup(config: &Config) -> Option<Self> {
        let common = Common::from_config(NAME, config)?;
        let options: Options = config.module(NAME)?.options();
        let dir = options
            .dir
            .or_else(|| project_dirs().map(|d| d.config_dir().join("scripts")));

        Some(Self {
            common,
            dir,
            scripts: OnceLock::new(),
        })
    }

    fn scripts(&self, cancel: &CancelToken) -> Option<&[String]> {
        if let Some(scripts) = self.scripts.get() {
            return Some(scripts.as_slice());
        }
        if cancel.is_cancelled() {
            return None;
        }
        let names = match &self.dir {
            Some(dir) if dir.exists() => {
                let mut names = executables_in(dir);
                names.sort();
                log::info!("Scripts: found {} entries", names.len());
                names
            }
            Some(dir) => {
                log::debug!("Scripts directory {:?} does not exist, skipping", dir);
                Vec::new()
            }
            None => Vec::new(),
        };
        Some(self.scripts.get_or_init(|| names).as_slice())
    }
}

impl Module for Scripts {
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
        let (Some(dir), false) = (&self.dir, term.is_empty()) else {
            return Ok(Vec::new());
        };

        let Some(scripts) = self.scripts(cancel) else {
            return Ok(Vec::new());
        };
        let ranked = FuzzyMatcher::new().rank(term, scripts, |s| s.as_str(), || !cancel.is_cancelled());

        Ok(ranked
            .into_iter()
            .map(|(i, _)| {
                let path = dir.join(&scripts[i]);
                Entry::new(scripts[i].clone(), path.to_string_lossy(), NAME).with_sub("Script")
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ModuleConfig};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn lists_executable_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("backup.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = parse_config("").unwrap();
        let mut block = ModuleConfig::new(NAME, "");
        block.options.insert("dir".into(), toml::Value::String(dir.path().to_string_lossy().into_owned()));
        config.modules = vec![block];

        let module = Scripts::setup(&config).unwrap();
        let entries = module.entries(&CancelToken::never(), "back").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "backup.sh");
        assert_eq!(entries[0].exec, script.to_string_lossy());
    }
}
