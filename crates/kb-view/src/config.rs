//! Environment configuration.

use std::path::PathBuf;

/// What to load and which collection to project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// `KB_SNAPSHOT`, default `snapshot.json`.
    pub snapshot_path: PathBuf,
    /// `KB_FOCUS`; the root sentinel when unset.
    pub focus: Option<String>,
    /// `KB_CHAIN`, comma separated; the focus's first route when empty.
    pub ancestor_chain: Vec<String>,
    /// `KB_PRETTY` = `1` or `true`.
    pub pretty: bool,
}

impl ViewConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let snapshot_path = get("KB_SNAPSHOT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "snapshot.json".to_string())
            .into();
        let focus = get("KB_FOCUS")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let ancestor_chain = get("KB_CHAIN")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let pretty = get("KB_PRETTY")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);
        Self {
            snapshot_path,
            focus,
            ancestor_chain,
            pretty,
        }
    }
}
