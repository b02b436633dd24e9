//! FILENAME: cube-engine/src/source.rs
//! Record Source - the grouping primitives the enumerator needs.
//!
//! A source only has to partition its records by a derived key and hand
//! out all of its records as one bucket. In-memory collections implement
//! this directly; a remote store can implement it by pushing the grouping
//! down and raising `CubeError::Source` on failure.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::error::CubeError;

/// One partition of the source: the shared key and its member records.
#[derive(Debug, Clone)]
pub struct Group<'a, K, T> {
    pub key: K,
    pub records: Vec<&'a T>,
}

/// A collection of records that supports grouping.
pub trait CubeSource {
    type Record;

    /// Partitions the records by `key`. Every record lands in exactly one
    /// group; groups with no records are never produced.
    fn partition<K, F>(&self, key: F) -> Result<Vec<Group<'_, K, Self::Record>>, CubeError>
    where
        K: Eq + Hash,
        F: Fn(&Self::Record) -> K;

    /// All records as a single group (grouping by a constant).
    fn single_group(&self) -> Result<Vec<&Self::Record>, CubeError>;
}

/// Partitions an in-memory record stream by `key`.
/// Groups are returned in order of first appearance.
pub fn partition_records<'a, T, K, F, I>(records: I, key: F) -> Vec<Group<'a, K, T>>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index: FxHashMap<K, usize> = FxHashMap::default();
    let mut buckets: Vec<Vec<&'a T>> = Vec::new();

    for record in records {
        let slot = *index.entry(key(record)).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(record);
    }

    let mut keys: Vec<(K, usize)> = index.into_iter().collect();
    keys.sort_unstable_by_key(|&(_, slot)| slot);

    keys.into_iter()
        .zip(buckets)
        .map(|((key, _), records)| Group { key, records })
        .collect()
}

impl<T> CubeSource for [T] {
    type Record = T;

    fn partition<K, F>(&self, key: F) -> Result<Vec<Group<'_, K, T>>, CubeError>
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        Ok(partition_records(self.iter(), key))
    }

    fn single_group(&self) -> Result<Vec<&T>, CubeError> {
        Ok(self.iter().collect())
    }
}

impl<T> CubeSource for Vec<T> {
    type Record = T;

    fn partition<K, F>(&self, key: F) -> Result<Vec<Group<'_, K, T>>, CubeError>
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        self.as_slice().partition(key)
    }

    fn single_group(&self) -> Result<Vec<&T>, CubeError> {
        self.as_slice().single_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_in_first_seen_order() {
        let words = vec!["pear", "apple", "plum", "avocado", "peach"];
        let groups = words.partition(|w| w.chars().next()).unwrap();

        let keys: Vec<Option<char>> = groups.iter().map(|g| g.key).collect();
        assert_eq!(keys, vec![Some('p'), Some('a')]);
        assert_eq!(groups[0].records, vec![&"pear", &"plum", &"peach"]);
        assert_eq!(groups[1].records, vec![&"apple", &"avocado"]);
    }

    #[test]
    fn test_empty_source() {
        let empty: Vec<u32> = Vec::new();
        assert!(empty.partition(|v| *v).unwrap().is_empty());
        assert!(empty.single_group().unwrap().is_empty());
    }

    #[test]
    fn test_single_group_holds_everything() {
        let values = [3, 1, 2];
        assert_eq!(values[..].single_group().unwrap(), vec![&3, &1, &2]);
    }
}
