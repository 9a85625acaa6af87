//! Blacklist of domains that must not resolve.
//!
//! Loaded from a line-oriented `domain::marker` file at the start of every
//! listening session and read-only afterwards.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::info;

use crate::error::ConfigError;

const SEPARATOR: &str = "::";

/// Blacklisted domains mapped to their marker.
///
/// The marker is an opaque annotation from the file (usually an IP address);
/// blocking never uses it.
#[derive(Debug, Default)]
pub struct Blacklist {
    entries: FxHashMap<String, String>,
}

impl Blacklist {
    /// Load the blacklist from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let blacklist = Self::parse(&text)?;
        info!(path = %path.display(), entries = blacklist.len(), "Loaded blacklist");

        Ok(blacklist)
    }

    /// Parse blacklist entries, one `domain::marker` per line.
    ///
    /// Every line must split into exactly one non-empty domain and a marker.
    /// Blank lines and comments are malformed too.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = FxHashMap::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            let malformed = || ConfigError::MalformedLine {
                line: index + 1,
                content: line.to_string(),
            };

            let mut parts = line.split(SEPARATOR);
            let (Some(domain), Some(marker), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(malformed());
            };

            let domain = normalize(domain.trim());
            if domain.is_empty() {
                return Err(malformed());
            }

            entries.insert(domain, marker.trim().to_string());
        }

        Ok(Self { entries })
    }

    /// Find the marker of the most specific blacklisted suffix of `domain`.
    ///
    /// Tries the full name first, then each parent down to the top-level
    /// label, so an exact entry wins over an entry for a parent domain.
    pub fn matches(&self, domain: &str) -> Option<&str> {
        let domain = normalize(domain);
        let mut current = domain.as_str();

        loop {
            if let Some(marker) = self.entries.get(current) {
                return Some(marker);
            }
            match current.find('.') {
                Some(pos) => current = &current[pos + 1..],
                None => return None,
            }
        }
    }

    /// Returns the number of domains in the blacklist.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(domain: &str) -> String {
    domain.trim_end_matches('.').to_lowercase()
}
