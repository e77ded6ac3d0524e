use std::collections::HashMap;
use std::sync::Mutex;

/// Two-way mapping between client-facing playlist names and backend uris.
///
/// Names must be unique on the wire while backends may hand out duplicates,
/// so clashes get a ` [2]`, ` [3]`, ... suffix.
#[derive(Debug, Default)]
pub struct UriMapper {
    inner: Mutex<Maps>,
}

#[derive(Debug, Default)]
struct Maps {
    uri_by_name: HashMap<String, String>,
    name_by_uri: HashMap<String, String>,
}

impl UriMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `uri` under a unique form of `name` and returns that form.
    pub fn insert(&self, name: &str, uri: &str) -> String {
        let mut maps = self.inner.lock().expect("uri map poisoned");
        if let Some(existing) = maps.name_by_uri.get(uri) {
            return existing.clone();
        }
        let base = name.replace('/', "|").replace(['\n', '\r'], " ");
        let mut candidate = base.clone();
        let mut suffix = 2;
        while maps.uri_by_name.contains_key(&candidate) {
            candidate = format!("{base} [{suffix}]");
            suffix += 1;
        }
        maps.uri_by_name.insert(candidate.clone(), uri.to_string());
        maps.name_by_uri.insert(uri.to_string(), candidate.clone());
        candidate
    }

    pub fn uri_for(&self, name: &str) -> Option<String> {
        let maps = self.inner.lock().expect("uri map poisoned");
        maps.uri_by_name.get(name).cloned()
    }

    pub fn forget(&self, uri: &str) {
        let mut maps = self.inner.lock().expect("uri map poisoned");
        if let Some(name) = maps.name_by_uri.remove(uri) {
            maps.uri_by_name.remove(&name);
        }
    }
}
