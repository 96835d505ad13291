//! Universe configuration: the ordered list of symbols a run processes.
//!
//! The universe is a TOML file with an optional name and a `symbols` array.
//! Order is preserved (it fixes the order of log lines); symbols are trimmed,
//! upper-cased, and deduplicated keeping the first occurrence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The complete universe configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default)]
    pub name: Option<String>,
    pub symbols: Vec<String>,
}

impl Universe {
    /// Build a universe from any list of tickers, normalizing it.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: None,
            symbols: normalize(symbols),
        }
    }

    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("read universe file {}: {e}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let raw: Universe =
            toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))?;
        Ok(Self {
            name: raw.name,
            symbols: normalize(raw.symbols),
        })
    }

    /// Symbols in processing order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Small built-in universe of large-cap US names, used when no universe
    /// is configured.
    pub fn default_us() -> Self {
        let mut universe = Self::from_symbols([
            "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "AVGO", "JPM", "V", "JNJ", "UNH",
            "XOM", "WMT", "PG", "KO", "HD", "SPY", "QQQ",
        ]);
        universe.name = Some("default-us".into());
        universe
    }
}

fn normalize<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
