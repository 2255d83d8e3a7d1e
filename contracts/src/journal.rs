//! # Journal
//!
//! Undo records for maps that are mutated in place. While a run is open,
//! the journal remembers the value each key held before its first write.
//! Rolling back puts those values back; committing forgets them. Both cost
//! as much as the keys the run touched, whatever the size of the map.

use std::collections::BTreeMap;

/// Prior values of the keys written during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal<K, V> {
    prior: BTreeMap<K, Option<V>>,
}

impl<K, V> Default for Journal<K, V> {
    fn default() -> Self {
        Self {
            prior: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Journal<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers `current` as the value of `key`, unless an earlier write
    /// in this run already did.
    pub fn record(&mut self, key: &K, current: Option<&V>) {
        if !self.prior.contains_key(key) {
            self.prior.insert(key.clone(), current.cloned());
        }
    }

    /// Every key written during the run.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.prior.keys()
    }

    /// Keys that did not exist before the run.
    pub fn inserted(&self) -> impl Iterator<Item = &K> {
        self.prior
            .iter()
            .filter(|(_, prior)| prior.is_none())
            .map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.prior.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prior.is_empty()
    }

    /// Restores every remembered value into `map`.
    pub fn undo(self, map: &mut BTreeMap<K, V>) {
        for (key, prior) in self.prior {
            match prior {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
    }

    /// The remembered `(key, prior value)` pairs.
    pub fn into_entries(self) -> impl Iterator<Item = (K, Option<V>)> {
        self.prior.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_restores_first_seen_values() {
        let mut map = BTreeMap::from([(1, "one"), (2, "two")]);
        let mut journal = Journal::new();

        journal.record(&1, map.get(&1));
        map.insert(1, "uno");
        journal.record(&1, map.get(&1));
        map.insert(1, "eins");

        journal.record(&3, map.get(&3));
        map.insert(3, "three");

        assert_eq!(journal.len(), 2);
        assert_eq!(journal.inserted().copied().collect::<Vec<_>>(), vec![3]);

        journal.undo(&mut map);
        assert_eq!(map, BTreeMap::from([(1, "one"), (2, "two")]));
    }

    #[test]
    fn untouched_keys_are_not_recorded() {
        let map = BTreeMap::from([(1, 'a'), (2, 'b'), (3, 'c')]);
        let mut journal: Journal<i32, char> = Journal::new();
        journal.record(&2, map.get(&2));
        assert_eq!(journal.keys().copied().collect::<Vec<_>>(), vec![2]);
    }
}
