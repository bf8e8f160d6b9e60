pub use std::collections::hash_map;

/// Re-export of [`std::collections::HashMap`] using [`fnv::FnvBuildHasher`].
///
/// Only for maps whose keys are not attacker-controlled enough for HashDOS
/// to be a concern (small fixed ranges, interned strings).
pub type FnvHashMap<K, V> = std::collections::HashMap<K, V, fnv::FnvBuildHasher>;
