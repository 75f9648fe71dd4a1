use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a blob key in bytes (matches common object stores).
pub const MAX_KEY_LEN: usize = 1024;

/// Name of a byte-stream resource in a blob store.
///
/// Keys are opaque strings. `/` is allowed and backends may give it
/// hierarchy meaning, so keys are rejected when they would escape or
/// alias such a hierarchy:
///
/// - must be non-empty and at most [`MAX_KEY_LEN`] bytes
/// - must not contain NUL or a backslash
/// - must not start or end with `/`
/// - no segment may be empty, `.` or `..`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey(String);

impl BlobKey {
    /// Validate and wrap a key.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        validate(&key)?;
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `/`-separated segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns `true` if the key begins with `prefix` (plain string prefix).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

fn validate(key: &str) -> Result<(), TypeError> {
    let fail = |reason: &str| TypeError::InvalidBlobKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(fail("key is empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(fail("key exceeds 1024 bytes"));
    }
    if key.contains('\0') {
        return Err(fail("key contains NUL"));
    }
    if key.contains('\\') {
        return Err(fail("key contains a backslash"));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(fail("key starts or ends with '/'"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(fail("empty path segment")),
            "." | ".." => return Err(fail("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({:?})", self.0)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BlobKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BlobKey {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BlobKey> for String {
    fn from(key: BlobKey) -> Self {
        key.0
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BlobKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
