//! Topic alias state.
//!
//! A topic alias is a `u16` a client may send in lieu of a topic string to
//! save bandwidth. Aliases are scoped to a single connection and direction;
//! the client->broker bindings live in a [`TopicAliasMapping`] owned by the
//! connection, while the memory they pin is accounted globally by the
//! [`TopicAliasLimiter`].

use std::num::NonZeroU16;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::collections::{hash_map, FnvHashMap};

/// Per-connection alias table, indexed 1..=N where N is the Topic Alias
/// Maximum advertised in CONNACK. Alias 0 is not valid on the wire, so slot
/// `alias - 1` holds the binding for `alias`.
///
/// Created at CONNECT. The connection returns every bound topic to the
/// limiter when it tears down.
#[derive(Debug)]
pub struct TopicAliasMapping {
    slots: Box<[Option<String>]>,
}

impl TopicAliasMapping {
    pub fn new(maximum: u16) -> Self {
        TopicAliasMapping {
            slots: vec![None; usize::from(maximum)].into_boxed_slice(),
        }
    }

    /// The Topic Alias Maximum this table was sized for.
    pub fn maximum(&self) -> u16 {
        self.slots.len() as u16
    }

    /// The topic bound to `alias`, or `None` if the alias is unmapped or
    /// exceeds [`Self::maximum`].
    pub fn get(&self, alias: NonZeroU16) -> Option<&str> {
        self.slots
            .get(usize::from(alias.get()) - 1)?
            .as_deref()
    }

    /// Binds `alias` to `topic`, returning the previously bound topic if any.
    ///
    /// Panics if `alias` exceeds [`Self::maximum`]; the decoder checks the
    /// bound before touching the table.
    pub fn insert(&mut self, alias: NonZeroU16, topic: String) -> Option<String> {
        self.slots[usize::from(alias.get()) - 1].replace(topic)
    }

    /// Empties the table, yielding each bound topic exactly once.
    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}

/// Process-wide accounting of the bytes pinned by live topic alias bindings.
///
/// Every binding holds its own copy of the topic string, so each usage
/// contributes the topic's byte length, duplicates included. `add_usage` and
/// `remove_usage` are linearizable; `limit_exceeded` reads the byte counter
/// and may observe concurrent increments from other connections.
#[derive(Debug)]
pub struct TopicAliasLimiter {
    hard_limit: usize,
    bytes_in_use: AtomicUsize,
    usages: Mutex<FnvHashMap<String, usize>>,
}

impl TopicAliasLimiter {
    pub fn new(hard_limit: usize) -> Self {
        TopicAliasLimiter {
            hard_limit,
            bytes_in_use: AtomicUsize::new(0),
            usages: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn add_usage(&self, topic: &str) {
        let mut usages = self.lock_usages();

        *usages.entry(topic.to_owned()).or_insert(0) += 1;
        self.bytes_in_use.fetch_add(topic.len(), Ordering::AcqRel);
    }

    /// Releases one usage of `topic`. A topic with no tracked usages is
    /// ignored, so the byte counter cannot underflow.
    pub fn remove_usage(&self, topic: &str) {
        let mut usages = self.lock_usages();

        let hash_map::Entry::Occupied(mut entry) = usages.entry(topic.to_owned()) else {
            return;
        };

        *entry.get_mut() -= 1;
        if *entry.get() == 0 {
            entry.remove();
        }

        self.bytes_in_use.fetch_sub(topic.len(), Ordering::AcqRel);
    }

    /// True while the tracked bytes exceed the configured hard limit.
    pub fn limit_exceeded(&self) -> bool {
        self.bytes_in_use.load(Ordering::Acquire) > self.hard_limit
    }

    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use.load(Ordering::Acquire)
    }

    /// Live usages of `topic` across all connections.
    pub fn usage_count(&self, topic: &str) -> usize {
        self.lock_usages().get(topic).copied().unwrap_or(0)
    }

    fn lock_usages(&self) -> MutexGuard<'_, FnvHashMap<String, usize>> {
        // The map stays consistent even if a holder panicked mid-update,
        // since each operation touches one entry.
        self.usages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU16;

    use super::{TopicAliasLimiter, TopicAliasMapping};

    fn alias(n: u16) -> NonZeroU16 {
        NonZeroU16::new(n).unwrap()
    }

    #[test]
    fn mapping_bind_and_lookup() {
        let mut mapping = TopicAliasMapping::new(3);
        assert_eq!(mapping.maximum(), 3);
        assert_eq!(mapping.get(alias(1)), None);

        assert_eq!(mapping.insert(alias(1), "foo".to_owned()), None);
        assert_eq!(mapping.get(alias(1)), Some("foo"));

        // Rebinding yields the previous topic.
        assert_eq!(
            mapping.insert(alias(1), "bar".to_owned()),
            Some("foo".to_owned())
        );
        assert_eq!(mapping.get(alias(1)), Some("bar"));

        // Out of range is indistinguishable from unmapped here; the decoder
        // checks `maximum()` first to tell the cases apart.
        assert_eq!(mapping.get(alias(4)), None);
    }

    #[test]
    fn mapping_drain_empties_all_slots() {
        let mut mapping = TopicAliasMapping::new(4);
        mapping.insert(alias(1), "a".to_owned());
        mapping.insert(alias(3), "b".to_owned());

        let mut drained: Vec<String> = mapping.drain().collect();
        drained.sort();
        assert_eq!(drained, ["a", "b"]);

        assert_eq!(mapping.get(alias(1)), None);
        assert_eq!(mapping.get(alias(3)), None);
    }

    #[test]
    fn zero_maximum_disables_aliases() {
        let mapping = TopicAliasMapping::new(0);
        assert_eq!(mapping.maximum(), 0);
        assert_eq!(mapping.get(alias(1)), None);
    }

    #[test]
    fn limiter_counts_bytes_per_usage() {
        let limiter = TopicAliasLimiter::new(100);

        limiter.add_usage("abcd");
        limiter.add_usage("abcd");
        limiter.add_usage("xy");

        assert_eq!(limiter.bytes_in_use(), 10);
        assert_eq!(limiter.usage_count("abcd"), 2);

        limiter.remove_usage("abcd");
        assert_eq!(limiter.bytes_in_use(), 6);
        assert_eq!(limiter.usage_count("abcd"), 1);
    }

    #[test]
    fn limiter_ignores_unknown_removals() {
        let limiter = TopicAliasLimiter::new(100);
        limiter.add_usage("abcd");

        limiter.remove_usage("never-added");
        limiter.remove_usage("abcd");
        limiter.remove_usage("abcd");

        assert_eq!(limiter.bytes_in_use(), 0);
        assert_eq!(limiter.usage_count("abcd"), 0);
    }

    #[test]
    fn limit_exceeded_is_strictly_greater() {
        let limiter = TopicAliasLimiter::new(4);

        limiter.add_usage("abcd");
        assert!(!limiter.limit_exceeded());

        limiter.add_usage("e");
        assert!(limiter.limit_exceeded());

        limiter.remove_usage("e");
        assert!(!limiter.limit_exceeded());
    }
}
