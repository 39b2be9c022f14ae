//! ChannelType - Cheap-to-clone vendor channel type code
//!
//! Uses Arc<str> internally, cloned into every metric label and log line.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Short vendor code of a channel (e.g. `WAC`, `FBA`, `TG`).
///
/// Codes are normalized to upper case on construction so lookups in the
/// handler registry and the ordering wait-list are case-insensitive.
///
/// # Examples
/// ```
/// use contracts::ChannelType;
///
/// let ct: ChannelType = "wac".into();
/// assert_eq!(ct, "WAC");
/// ```
#[derive(Clone, Default)]
pub struct ChannelType(Arc<str>);

impl ChannelType {
    /// Create a new ChannelType from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s.trim().to_ascii_uppercase()))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ChannelType {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ChannelType {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChannelType {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelType {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChannelType {
    #[inline]
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelType({:?})", self.0)
    }
}

impl PartialEq for ChannelType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ChannelType {}

impl PartialEq<str> for ChannelType {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ChannelType {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Must match str hashing so HashMap<ChannelType, _> can be queried by &str
impl Hash for ChannelType {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ChannelType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
