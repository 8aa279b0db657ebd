use crate::config::Config;
use crate::modules::{self, Module};

/// Live module instances in configured order.
///
/// Read-only once built; the orchestrator shares it with worker threads
/// behind an `Arc`.
pub struct Registry {
    modules: Vec<Box<dyn Module>>,
    min_prefix_len: usize,
}

impl Registry {
    /// Sets up every enabled block. Blocks whose setup yields nothing, and
    /// repeated names, are dropped.
    pub fn from_config(config: &Config) -> Self {
        let modules = config
            .modules
            .iter()
            .filter_map(|block| modules::setup(&block.name, config))
            .collect();
        Self::new(modules, config.search.min_prefix_len)
    }

    pub fn new(modules: Vec<Box<dyn Module>>, min_prefix_len: usize) -> Self {
        let mut unique: Vec<Box<dyn Module>> = Vec::with_capacity(modules.len());
        for module in modules {
            if unique.iter().any(|m| m.name() == module.name()) {
                log::warn!("Module '{}' configured twice, keeping the first", module.name());
                continue;
            }
            unique.push(module);
        }

        log::info!(
            "Registry: {} modules [{}]",
            unique.len(),
            unique.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
        );

        Self {
            modules: unique,
            min_prefix_len,
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&dyn Module> {
        self.modules.get(slot).map(|m| m.as_ref())
    }

    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name())
    }

    fn addresses(&self, module: &dyn Module, term: &str) -> bool {
        modules::strip_prefix(module.prefix(), term, self.min_prefix_len).is_some()
    }

    /// Slots of the modules that should receive `term`, in configured order.
    ///
    /// With a pinned module only that module runs. Otherwise a switcher-exclusive
    /// module runs alone when the term carries its prefix, and stays out of the
    /// general fan-out when it does not.
    pub fn eligible(&self, term: &str, pinned: Option<&str>) -> Vec<usize> {
        if let Some(name) = pinned {
            return self.slot_of(name).into_iter().collect();
        }

        let exclusive = self.modules.iter().position(|m| {
            m.switcher_exclusive() && !m.prefix().is_empty() && self.addresses(m.as_ref(), term)
        });
        if let Some(slot) = exclusive {
            return vec![slot];
        }

        self.modules
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.switcher_exclusive() && self.addresses(m.as_ref(), term))
            .map(|(slot, _)| slot)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Entry;
    use crate::modules::{CancelToken, ModuleResult};

    /// Module returning fixed labels, used across the crate's tests.
    pub(crate) struct Fixed {
        pub name: &'static str,
        pub prefix: &'static str,
        pub exclusive: bool,
        pub labels: Vec<&'static str>,
    }

    impl Fixed {
        pub(crate) fn new(name: &'static str, prefix: &'static str, labels: &[&'static str]) -> Self {
            Self { name, prefix, exclusive: false, labels: labels.to_vec() }
        }
    }

    impl Module for Fixed {
        fn name(&self) -> &str { self.name }
        fn prefix(&self) -> &str { self.prefix }
        fn switcher_exclusive(&self) -> bool { self.exclusive }
        fn entries(&self, _cancel: &CancelToken, _term: &str) -> ModuleResult {
            Ok(self.labels.iter().map(|l| Entry::new(*l, *l, self.name)).collect())
        }
    }

    fn registry(modules: Vec<Fixed>) -> Registry {
        Registry::new(modules.into_iter().map(|m| Box::new(m) as Box<dyn Module>).collect(), 2)
    }

    #[test]
    fn eligibility_follows_prefix_and_min_length() {
        let reg = registry(vec![
            Fixed::new("apps", "", &[]),
            Fixed::new("web", "g ", &[]),
        ]);
        assert_eq!(reg.eligible("cats", None), [0]);
        assert_eq!(reg.eligible("g ", None), [0]);
        assert_eq!(reg.eligible("g c", None), [0]);
        assert_eq!(reg.eligible("g cats", None), [0, 1]);
    }

    #[test]
    fn pinned_module_runs_alone() {
        let reg = registry(vec![
            Fixed::new("apps", "", &[]),
            Fixed::new("web", "g ", &[]),
        ]);
        assert_eq!(reg.eligible("anything", Some("web")), [1]);
        assert!(reg.eligible("anything", Some("missing")).is_empty());
    }

    #[test]
    fn exclusive_module_runs_alone_when_addressed() {
        let mut files = Fixed::new("files", "~", &[]);
        files.exclusive = true;
        let reg = registry(vec![Fixed::new("apps", "", &[]), files]);

        assert_eq!(reg.eligible("~notes", None), [1]);
        assert_eq!(reg.eligible("notes", None), [0]);
    }

    #[test]
    fn duplicate_names_keep_first_in_order() {
        let reg = registry(vec![
            Fixed::new("apps", "", &["a"]),
            Fixed::new("web", "", &[]),
            Fixed::new("apps", "", &["b"]),
        ]);
        assert_eq!(reg.names().collect::<Vec<_>>(), ["apps", "web"]);
        assert_eq!(reg.slot_of("web"), Some(1));
    }

    #[test]
    fn from_config_drops_disabled_blocks() {
        let config = crate::config::parse_config(
            "[[modules]]\nname = \"websearch\"\n[[modules]]\nname = \"switcher\"\ndisabled = true\n",
        )
        .unwrap();
        let reg = Registry::from_config(&config);
        assert_eq!(reg.names().collect::<Vec<_>>(), ["websearch"]);
    }
}
