use crate::config::Config;
use crate::matcher::FuzzyMatcher;
use crate::model::Entry;
use super::{CancelToken, Common, Module, ModuleResult};

pub const NAME: &str = "switcher";

/// Lists the other configured modules. Activating one of its entries pins the
/// session to that module; the entry's `exec` carries the module name.
pub struct Switcher {
    common: Common,
    targets: Vec<String>,
}

impl Switcher {
    pub fn setup(config: &Config) -> Option<Self> {
        let common = Common::from_config(NAME, config)?;
        let targets = config
            .enabled_modules()
            .filter(|name| *name != NAME)
            .map(str::to_string)
            .collect();

        Some(Self { common, targets })
    }
}

/// Whether `entry` asks to pin a module rather than launch a command.
pub fn is_switch(entry: &Entry) -> bool {
    entry.class == NAME
}

impl Module for Switcher {
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

        let picked: Vec<usize> = if term.is_empty() {
            (0..self.targets.len()).collect()
        } else {
            FuzzyMatcher::new()
                .rank(term, &self.targets, |t| t.as_str(), || !cancel.is_cancelled())
                .into_iter()
                .map(|(i, _)| i)
                .collect()
        };

        Ok(picked
            .into_iter()
            .map(|i| {
                let target = &self.targets[i];
                Entry::new(target.clone(), target.clone(), NAME).with_sub("Switch module")
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn lists_other_enabled_modules() {
        let config = parse_config(
            r#"
            [[modules]]
            name = "applications"
            [[modules]]
            name = "finder"
            disabled = true
            [[modules]]
            name = "websearch"
            [[modules]]
            name = "switcher"
            prefix = "/"
            "#,
        )
        .unwrap();

        let switcher = Switcher::setup(&config).unwrap();
        let entries = switcher.entries(&CancelToken::never(), "/web").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].exec, "websearch");
        assert!(is_switch(&entries[0]));

        let labels: Vec<_> = switcher
            .entries(&CancelToken::never(), "/ap")
            .unwrap()
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, ["applications"]);
    }
}
