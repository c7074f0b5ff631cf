//! Hash collections keyed with the fast non-cryptographic Fx hasher.

pub type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;
