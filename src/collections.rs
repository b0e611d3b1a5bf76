//! Collection types tuned for the mesh engine's hot paths.
//!
//! All internal maps key on vertex ids, triangle keys, or small integer
//! tuples, none of which are attacker-controlled, so the non-cryptographic
//! `FxHasher` is used throughout.

use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet, FxHasher};
use smallvec::SmallVec;

/// `HashMap` with the fast non-cryptographic hasher.
///
/// # Examples
///
/// ```
/// use trigen::collections::FastHashMap;
///
/// let mut map: FastHashMap<u64, usize> = FastHashMap::default();
/// map.insert(123, 456);
/// assert_eq!(map.get(&123), Some(&456));
/// ```
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// `HashSet` with the fast non-cryptographic hasher.
pub type FastHashSet<T> = FxHashSet<T>;

/// The hasher behind [`FastHashMap`] and [`FastHashSet`].
pub type FastHasher = FxHasher;

/// Build-hasher for constructing the fast maps with explicit capacity.
pub type FastBuildHasher = FxBuildHasher;

/// Stack-allocated buffer for small per-operation collections (cavity rims,
/// legalization stacks) that spills to the heap past `N` elements.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Create a [`FastHashMap`] with pre-allocated capacity.
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, FastBuildHasher::default())
}

/// Create a [`FastHashSet`] with pre-allocated capacity.
#[must_use]
pub fn fast_hash_set_with_capacity<T>(capacity: usize) -> FastHashSet<T> {
    FastHashSet::with_capacity_and_hasher(capacity, FastBuildHasher::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_helpers_reserve_upfront() {
        let map = fast_hash_map_with_capacity::<u64, usize>(100);
        assert!(map.capacity() >= 100);

        let set = fast_hash_set_with_capacity::<u64>(50);
        assert!(set.capacity() >= 50);
    }

    #[test]
    fn small_buffer_stays_inline_within_capacity() {
        let mut buffer: SmallBuffer<i32, 8> = SmallBuffer::new();
        for i in 0..8 {
            buffer.push(i);
        }
        assert!(!buffer.spilled());
        buffer.push(8);
        assert!(buffer.spilled());
    }
}
