//! Search modules and the contract they share.
//!
//! A module turns a query term into an ordered list of [`Entry`] values. The
//! core only knows the [`Module`] trait; concrete providers are built from
//! their `[[modules]]` block by [`setup`].

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use crate::config::Config;
use crate::model::Entry;

pub mod applications;
pub mod finder;
pub mod runner;
pub mod scripts;
pub mod switcher;
pub mod websearch;

/// Failure inside a module. The orchestrator logs it and treats the module as
/// having returned nothing.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type ModuleResult = Result<Vec<Entry>, ModuleError>;

/// A pluggable result provider.
///
/// Instances are created once per session and shared across worker threads,
/// so `entries` may run concurrently with other modules' calls.
pub trait Module: Send + Sync {
    /// Stable identifier, matching the `name` of the module's config block.
    fn name(&self) -> &str;

    /// Activation prefix; empty means the module sees every term.
    fn prefix(&self) -> &str;

    fn switcher_exclusive(&self) -> bool;

    /// Results for `term`, best first.
    ///
    /// Returns an empty list when the term does not address this module. Long
    /// scans must poll `cancel` and return early once it fires.
    fn entries(&self, cancel: &CancelToken, term: &str) -> ModuleResult;
}

/// Cancellation handle handed to each module call.
///
/// A token belongs to one generation and reads as cancelled as soon as a newer
/// generation is dispatched. It is advisory: the orchestrator still discards
/// late replies on its own.
#[derive(Debug, Clone)]
pub struct CancelToken {
    latest: Arc<AtomicU64>,
    generation: u64,
}

impl CancelToken {
    pub fn new(latest: Arc<AtomicU64>, generation: u64) -> Self {
        Self { latest, generation }
    }

    /// A token that never fires.
    pub fn never() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)), 0)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// Text left for a module once its prefix is removed.
///
/// Unprefixed modules get the whole term. A prefixed module gets `None` unless
/// the term starts with the prefix and at least `min_len` characters follow it.
pub fn strip_prefix<'t>(prefix: &str, term: &'t str, min_len: usize) -> Option<&'t str> {
    if prefix.is_empty() {
        return Some(term);
    }
    let rest = term.strip_prefix(prefix)?;
    (rest.chars().count() >= min_len).then_some(rest)
}

/// Term as seen by a module the session is pinned to.
///
/// The prefix is optional once a module is addressed directly, so a bare term
/// gets it prepended and the module's own stripping still applies.
pub fn address<'t>(prefix: &str, term: &'t str) -> Cow<'t, str> {
    if prefix.is_empty() || term.starts_with(prefix) {
        Cow::Borrowed(term)
    } else {
        Cow::Owned(format!("{}{}", prefix, term))
    }
}

/// Builds the module called `name` from its config block.
///
/// `None` when the block is absent, disabled, or names an unknown provider.
pub fn setup(name: &str, config: &Config) -> Option<Box<dyn Module>> {
    let block = config.module(name)?;
    if block.disabled {
        log::debug!("Module '{}' disabled by config", name);
        return None;
    }

    match name {
        applications::NAME => applications::Applications::setup(config).map(boxed),
        finder::NAME => finder::Finder::setup(config).map(boxed),
        runner::NAME => runner::Runner::setup(config).map(boxed),
        scripts::NAME => scripts::Scripts::setup(config).map(boxed),
        switcher::NAME => switcher::Switcher::setup(config).map(boxed),
        websearch::NAME => websearch::Websearch::setup(config).map(boxed),
        other => {
            log::warn!("Unknown module '{}' in config, skipping", other);
            None
        }
    }
}

fn boxed<M: Module + 'static>(module: M) -> Box<dyn Module> {
    Box::new(module)
}

/// Fields every module copies out of its block during setup.
#[derive(Debug, Clone, Default)]
pub(crate) struct Common {
    pub prefix: String,
    pub switcher_exclusive: bool,
    pub min_prefix_len: usize,
}

impl Common {
    /// Reads the shared keys for `name`; `None` if absent or disabled.
    pub(crate) fn from_config(name: &str, config: &Config) -> Option<Self> {
        let block = config.module(name).filter(|m| !m.disabled)?;
        Some(Self {
            prefix: block.prefix.clone(),
            switcher_exclusive: block.switcher_exclusive,
            min_prefix_len: config.search.min_prefix_len,
        })
    }

    pub(crate) fn strip<'t>(&self, term: &'t str) -> Option<&'t str> {
        strip_prefix(&self.prefix, term, self.min_prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ModuleConfig};

    #[test]
    fn strip_prefix_rules() {
        assert_eq!(strip_prefix("", "cats", 2), Some("cats"));
        assert_eq!(strip_prefix("", "", 2), Some(""));
        assert_eq!(strip_prefix("g ", "g cats", 2), Some("cats"));
        assert_eq!(strip_prefix("g ", "g ", 2), None);
        assert_eq!(strip_prefix("g ", "g c", 2), None);
        assert_eq!(strip_prefix("g ", "g ca", 2), Some("ca"));
        assert_eq!(strip_prefix("g ", "cats", 2), None);
        assert_eq!(strip_prefix("g ", "g ", 0), Some(""));
    }

    #[test]
    fn strip_prefix_counts_characters_not_bytes() {
        assert_eq!(strip_prefix("?", "?é", 2), None);
        assert_eq!(strip_prefix("?", "?éa", 2), Some("éa"));
    }

    #[test]
    fn pinned_terms_get_the_prefix_once() {
        assert_eq!(address("?", "cats"), "?cats");
        assert_eq!(address("?", "?cats"), "?cats");
        assert_eq!(address("", "cats"), "cats");
        assert_eq!(strip_prefix("?", &address("?", "cats"), 2), Some("cats"));
    }

    #[test]
    fn cancel_token_fires_on_newer_generation() {
        let latest = Arc::new(AtomicU64::new(3));
        let token = CancelToken::new(Arc::clone(&latest), 3);
        assert!(!token.is_cancelled());
        latest.store(4, Ordering::Release);
        assert!(token.is_cancelled());
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn setup_skips_absent_disabled_and_unknown() {
        let mut config = parse_config("").unwrap();
        config.modules = vec![ModuleConfig::new("websearch", "g ")];
        assert!(setup("websearch", &config).is_some());
        assert!(setup("finder", &config).is_none());

        config.modules[0].disabled = true;
        assert!(setup("websearch", &config).is_none());

        config.modules = vec![ModuleConfig::new("bogus", "")];
        assert!(setup("bogus", &config).is_none());
    }
}
