//! Ordered request header collection.

use serde::{Deserialize, Serialize};

/// Name of the bearer-token header.
pub const AUTHORIZATION: &str = "Authorization";

/// A single `name: value` request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: &str) -> Self {
        Self::new(AUTHORIZATION, format!("Bearer {token}"))
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header set with unique (case-insensitive) names.
///
/// Inserting a header whose name already exists replaces the earlier entry
/// in place, so a refreshed `Authorization` header never accumulates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Header>", into = "Vec<Header>")]
pub struct HeaderSet {
    entries: Vec<Header>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, keeping its original position on replace.
    pub fn insert(&mut self, header: Header) {
        match self.entries.iter().position(|h| h.is_named(&header.name)) {
            Some(idx) => {
                let name = header.name.clone();
                self.entries[idx] = header;
                // Drop any later duplicates that slipped in under another casing.
                let mut seen = false;
                self.entries.retain(|h| {
                    if !h.is_named(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push(header),
        }
    }

    /// Value of the header called `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.is_named(name))
            .map(|h| h.value.as_str())
    }

    /// Number of entries called `name`. Always 0 or 1.
    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|h| h.is_named(name)).count()
    }

    pub fn remove(&mut self, name: &str) -> Option<Header> {
        let idx = self.entries.iter().position(|h| h.is_named(name))?;
        Some(self.entries.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Header> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        let mut set = Self::new();
        for header in iter {
            set.insert(header);
        }
        set
    }
}

impl From<Vec<Header>> for HeaderSet {
    fn from(headers: Vec<Header>) -> Self {
        headers.into_iter().collect()
    }
}

impl From<HeaderSet> for Vec<Header> {
    fn from(set: HeaderSet) -> Self {
        set.entries
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
