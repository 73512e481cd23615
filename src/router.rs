//! Path routing: exact routes, plus prefix routes that accept a path
//! surplus (e.g. `/static/...`).

use std::{collections::HashMap, fmt::Debug};

use anyhow::{Result, bail};
use kstring::KString;

use crate::path::path_segments;

/// Normalized key: segments joined by '/', without leading or
/// trailing slashes; "" is the root.
fn route_key(path: &str) -> String {
    path_segments(path).collect::<Vec<_>>().join("/")
}

#[derive(Debug)]
pub struct Router<T> {
    exact: HashMap<KString, T>,
    prefix: HashMap<KString, T>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Router {
            exact: HashMap::new(),
            prefix: HashMap::new(),
        }
    }
}

impl<T: Debug> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Using path *strings*, and chaining.
    pub fn add(&mut self, path: &str, val: T) -> Result<&mut Self> {
        let key = KString::from_string(route_key(path));
        if let Some(old) = self.exact.get(&key) {
            bail!("already contained an entry for {path:?}: {old:?}")
        }
        self.exact.insert(key, val);
        Ok(self)
    }

    /// Route `path` and everything below it.
    pub fn add_prefix(&mut self, path: &str, val: T) -> Result<&mut Self> {
        let key = KString::from_string(route_key(path));
        if let Some(old) = self.prefix.get(&key) {
            bail!("already contained a prefix entry for {path:?}: {old:?}")
        }
        self.prefix.insert(key, val);
        Ok(self)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.exact.contains_key(route_key(path).as_str())
    }

    /// Exact matches win, otherwise the longest matching prefix
    /// entry. Also returns the rest of the path after the matched
    /// part (always empty for exact matches).
    pub fn get<'p>(&self, path: &'p str) -> Option<(&T, Vec<&'p str>)> {
        let segments: Vec<&str> = path_segments(path).collect();
        if let Some(val) = self.exact.get(segments.join("/").as_str()) {
            return Some((val, Vec::new()))
        }
        for n in (0..=segments.len()).rev() {
            if let Some(val) = self.prefix.get(segments[..n].join("/").as_str()) {
                return Some((val, segments[n..].to_vec()))
            }
        }
        None
    }

    /// Exact routes, sorted by path.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.exact.keys().map(|k| k.as_str()).collect();
        paths.sort();
        paths
    }
}
