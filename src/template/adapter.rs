//! Read-only data providers answering dotted-path lookups for a
//! registered first path segment (e.g. `.Site.Title`).

use super::value::{Value, descend};

pub trait DataAdapter: Send + Sync {
    /// `path` is the full path including the prefix segment the
    /// adapter was registered under. None means the path is unknown.
    fn get(&self, path: &[&str]) -> Option<Value>;
}

/// Allow closures to be used as adapters.
impl<F> DataAdapter for F
where F: Fn(&[&str]) -> Option<Value> + Send + Sync
{
    fn get(&self, path: &[&str]) -> Option<Value> {
        self(path)
    }
}

/// Serves a fixed value; the prefix segment is skipped and the rest
/// of the path is looked up in the value.
#[derive(Debug, Clone)]
pub struct ValueAdapter(pub Value);

impl DataAdapter for ValueAdapter {
    fn get(&self, path: &[&str]) -> Option<Value> {
        let rest = path.get(1..).unwrap_or(&[]);
        descend(&self.0, rest).cloned()
    }
}
