//! Keys and tenants
//!
//! Every entity in the execution state is addressed by a 64-bit key. Keys are
//! partition-aware: the upper bits carry the partition that generated them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of low bits reserved for the per-partition counter.
const PARTITION_BITS_SHIFT: u32 = 51;

/// Entity key (element instance, process definition, job, variable, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub i64);

impl Key {
    /// Partition that generated this key.
    #[inline]
    #[must_use]
    pub fn partition_id(self) -> u16 {
        // Shift result is at most 12 bits wide.
        u16::try_from(self.0 >> PARTITION_BITS_SHIFT).unwrap_or(0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Generates keys for one partition.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    partition_id: u16,
    next: i64,
}

impl KeyGenerator {
    /// Create a generator starting at the first key of `partition_id`.
    #[must_use]
    pub fn new(partition_id: u16) -> Self {
        Self {
            partition_id,
            next: 1,
        }
    }

    /// Next unused key.
    pub fn next_key(&mut self) -> Key {
        let key = (i64::from(self.partition_id) << PARTITION_BITS_SHIFT) | self.next;
        self.next += 1;
        Key(key)
    }

    /// Partition encoded into every generated key
    #[inline]
    #[must_use]
    pub fn partition_id(&self) -> u16 {
        self.partition_id
    }
}

/// Tenant owning a process definition or instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Tenant used when multi-tenancy is disabled.
    pub const DEFAULT: &'static str = "<default>";

    /// Tenant with the given id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Tenant id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn generated_keys_carry_partition() {
        let mut keys = KeyGenerator::new(3);
        let first = keys.next_key();
        let second = keys.next_key();

        assert_eq!(first.partition_id(), 3);
        assert_eq!(second.partition_id(), 3);
        assert!(second > first);
    }

    #[test]
    fn default_tenant() {
        assert_eq!(TenantId::default().as_str(), "<default>");
    }

    proptest! {
        #[test]
        fn prop_keys_stay_in_their_partition(partition_id in 0u16..4096, count in 1usize..200) {
            let mut keys = KeyGenerator::new(partition_id);
            let generated: Vec<Key> = (0..count).map(|_| keys.next_key()).collect();

            prop_assert!(generated.iter().all(|k| k.partition_id() == partition_id));
            prop_assert!(generated.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
