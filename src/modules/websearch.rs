use serde::Deserialize;
use url::form_urlencoded;
use crate::config::Config;
use crate::model::{Entry, Matching};
use super::{CancelToken, Common, Module, ModuleResult};

pub const NAME: &str = "websearch";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
struct Options {
    /// Search URL; the escaped term is appended.
    engine: String,
    label: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            engine: "https://www.google.com/search?q=".to_string(),
            label: "Search with Google".to_string(),
        }
    }
}

/// Fallback provider offering a web search for whatever was typed.
///
/// Its single entry is `AlwaysBottom`, so it only shows below real matches.
pub struct Websearch {
    common: Common,
    options: Options,
}

impl Websearch {
    pub fn setup(config: &Config) -> Option<Self> {
        let common = Common::from_config(NAME, config)?;
        let options = config.module(NAME)?.options();
        Some(Self { common, options })
    }

    fn url_for(&self, term: &str) -> String {
        let escaped: String = form_urlencoded::byte_serialize(term.as_bytes()).collect();
        format!("{}{}", self.options.engine, escaped)
    }
}

impl Module for Websearch {
    fn name(&self) -> &str {
        NAME
    }

    fn prefix(&self) -> &str {
        &self.common.prefix
    }

    fn switcher_exclusive(&self) -> bool {
        self.common.switcher_exclusive
    }

    fn entries(&self, _cancel: &CancelToken, term: &str) -> ModuleResult {
        let Some(term) = self.common.strip(term) else {
            return Ok(Vec::new());
        };
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let entry = Entry::new(
            self.options.label.clone(),
            format!("xdg-open {}", self.url_for(term)),
            NAME,
        )
        .with_sub("Websearch")
        .with_matching(Matching::AlwaysBottom);

        Ok(vec![entry])
    }
}
