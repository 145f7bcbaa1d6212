//! The stored record.

use core::fmt;

/// A `(key, id)` pair plus its liveness flag.
///
/// Identity is the `(key, id)` pair; two records sharing a key with
/// different ids coexist. `live == false` marks a tombstone while the
/// record sits in a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    key: String,
    id: i32,
    pub(crate) live: bool,
}

impl Record {
    pub fn new(key: impl Into<String>, id: i32) -> Self {
        Self {
            key: key.into(),
            id,
            live: true,
        }
    }

    /// Sentinel returned by lookups that miss: `key = ""`, `id = 0`, not live.
    pub fn empty() -> Self {
        Self {
            key: String::new(),
            id: 0,
            live: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.id == 0 && !self.live
    }

    pub(crate) fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    #[inline]
    pub(crate) fn matches(&self, key: &str, id: i32) -> bool {
        self.id == id && self.key == key
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.id)?;
        if !self.live {
            f.write_str(" deleted")?;
        }
        Ok(())
    }
}
