//! Cache Entry Types
//!
//! An entry lives in exactly one tier. The tier is not a separate flag that
//! could drift from the tier stores: it is the tag of [`Placement`], which also
//! carries the entry's position key in the owning store.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Cache tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Most-recently-used tier, evicted by recency
    Mru,
    /// Most-frequently-used tier, evicted by access count
    Mfu,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Mru => write!(f, "MRU"),
            Tier::Mfu => write!(f, "MFU"),
        }
    }
}

/// Position of an entry inside its tier store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Recency stamp; larger is more recent
    Mru { stamp: u64 },
    /// Insertion sequence into MFU, breaks access-count ties (older first)
    Mfu { seq: u64 },
}

impl Placement {
    #[inline]
    pub(crate) fn tier(&self) -> Tier {
        match self {
            Placement::Mru { .. } => Tier::Mru,
            Placement::Mfu { .. } => Tier::Mfu,
        }
    }
}

/// Stored record
pub(crate) struct Entry {
    value: Bytes,
    access_count: u64,
    placement: Placement,
}

impl Entry {
    /// Fresh entry at the given MRU stamp
    pub(crate) fn new(value: Bytes, stamp: u64) -> Self {
        Self {
            value,
            access_count: 0,
            placement: Placement::Mru { stamp },
        }
    }

    #[inline]
    pub(crate) fn value(&self) -> &Bytes {
        &self.value
    }

    #[inline]
    pub(crate) fn set_value(&mut self, value: Bytes) {
        self.value = value;
    }

    #[inline]
    pub(crate) fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Record an access and return the new count
    #[inline]
    pub(crate) fn record_access(&mut self) -> u64 {
        self.access_count = self.access_count.saturating_add(1);
        self.access_count
    }

    #[inline]
    pub(crate) fn placement(&self) -> Placement {
        self.placement
    }

    #[inline]
    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    #[inline]
    pub(crate) fn tier(&self) -> Tier {
        self.placement.tier()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("size", &self.value.len())
            .field("access_count", &self.access_count)
            .field("tier", &self.tier())
            .finish()
    }
}

/// Key summary returned by [`crate::Cache::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo<K> {
    /// The key
    pub key: K,
    /// Tier the key currently lives in
    pub tier: Tier,
    /// Accesses since insertion
    pub access_count: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_mru() {
        let entry = Entry::new(Bytes::from_static(b"value"), 7);
        assert_eq!(entry.tier(), Tier::Mru);
        assert_eq!(entry.placement(), Placement::Mru { stamp: 7 });
        assert_eq!(entry.access_count(), 0);
        assert_eq!(entry.value().as_ref(), b"value");
    }

    #[test]
    fn test_access_tracking() {
        let mut entry = Entry::new(Bytes::new(), 0);
        assert_eq!(entry.record_access(), 1);
        assert_eq!(entry.record_access(), 2);
        assert_eq!(entry.access_count(), 2);
    }

    #[test]
    fn test_placement_drives_tier() {
        let mut entry = Entry::new(Bytes::new(), 0);
        entry.set_placement(Placement::Mfu { seq: 3 });
        assert_eq!(entry.tier(), Tier::Mfu);
    }

    #[test]
    fn test_empty_value_is_kept() {
        let mut entry = Entry::new(Bytes::from_static(b"x"), 0);
        entry.set_value(Bytes::new());
        assert!(entry.value().is_empty());
    }

    #[test]
    fn test_tier_display_and_serde() {
        assert_eq!(Tier::Mru.to_string(), "MRU");
        assert_eq!(Tier::Mfu.to_string(), "MFU");
        assert_eq!(serde_json::to_string(&Tier::Mfu).unwrap(), "\"mfu\"");
    }

    #[test]
    fn test_entry_debug() {
        let entry = Entry::new(Bytes::from_static(b"Test"), 0);
        let debug = format!("{:?}", entry);
        assert!(debug.contains("Entry"));
        assert!(debug.contains("access_count"));
    }
}
