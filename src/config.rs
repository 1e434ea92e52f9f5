use serde::{Deserialize, Serialize};
use std::path::Path;

/// Job settings loadable from a YAML file. Every field is optional;
/// command-line flags take precedence over file values.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(default)]
    pub expression: Option<String>,
    /// Kind letters, e.g. "nwr" or "w".
    #[serde(default)]
    pub kinds: Option<String>,
    #[serde(default)]
    pub include_refs: Option<bool>,
    #[serde(default)]
    pub max_results: Option<u64>,
}

impl JobConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
