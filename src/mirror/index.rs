//! In-memory indices of one mirror run

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Returns the hex-encoded SHA-256 checksum of `data`
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Maps a content checksum to every path that received that content
///
/// Paths keep insertion order; the first one is the link source for the rest.
#[derive(Debug, Default)]
pub struct ContentHashIndex {
    paths: HashMap<String, Vec<PathBuf>>,
}

impl ContentHashIndex {
    /// Registers `path` under `hash` and returns all paths for that hash
    pub fn register(&mut self, hash: &str, path: &Path) -> &[PathBuf] {
        let paths = self.paths.entry(hash.to_string()).or_default();
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_path_buf());
        }
        paths
    }

    pub fn get(&self, hash: &str) -> &[PathBuf] {
        self.paths.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct checksums
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Maps a redirect target URL to the URLs that redirected to it
///
/// Aliases are kept as URLs; their file paths depend on the content type of
/// the target and are computed when the target is saved.
#[derive(Debug, Default)]
pub struct RedirectAliasIndex {
    aliases: HashMap<String, Vec<Url>>,
}

impl RedirectAliasIndex {
    /// Records `from` as an alias of `to`
    ///
    /// Aliases already pointing at `from` move over to `to`, so chains of
    /// redirects end up at the final target.
    pub fn record(&mut self, from: &Url, to: &Url) {
        let mut carried = self.aliases.remove(from.as_str()).unwrap_or_default();
        carried.insert(0, from.clone());

        let aliases = self.aliases.entry(to.as_str().to_string()).or_default();
        for alias in carried {
            if alias != *to && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
    }

    /// Returns the aliases of `target`
    pub fn get(&self, target: &Url) -> &[Url] {
        self.aliases
            .get(target.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
