//! Composite, order-sensitive cache keys.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use sqlbind_types::Value;

const MULTIPLIER: i64 = 37;
const SEED_HASH: i64 = 17;

/// A composite fingerprint identifying one cacheable statement invocation.
///
/// A key accumulates contributions (statement id, paging bounds, SQL text,
/// ordered parameter values, environment id) through [`CacheKey::update`].
/// It maintains a running hash, a checksum and a count; two keys are equal
/// iff all three match *and* every positional contribution is equal. Hash
/// collisions across unequal keys are tolerated; the checksum and the
/// positional comparison resolve them.
///
/// Contributions are order-sensitive: the same values contributed in a
/// different order produce a different key in general.
#[derive(Debug, Clone)]
pub struct CacheKey {
    hash: i64,
    checksum: i64,
    pieces: Vec<Value>,
}

impl CacheKey {
    /// Create an empty key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hash: SEED_HASH,
            checksum: 0,
            pieces: Vec::new(),
        }
    }

    /// Create a key from an ordered sequence of contributions.
    #[must_use]
    pub fn from_pieces<I>(pieces: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut key = Self::new();
        for piece in pieces {
            key.update(piece);
        }
        key
    }

    /// Add one contribution, updating hash, checksum and count.
    pub fn update(&mut self, piece: Value) {
        let base = piece_hash(&piece);
        let count = self.pieces.len() as i64 + 1;
        self.checksum = self.checksum.wrapping_add(base);
        let scaled = base.wrapping_mul(count);
        self.hash = self.hash.wrapping_mul(MULTIPLIER).wrapping_add(scaled);
        self.pieces.push(piece);
    }

    /// Add several contributions in order.
    pub fn update_all<I>(&mut self, pieces: I)
    where
        I: IntoIterator<Item = Value>,
    {
        for piece in pieces {
            self.update(piece);
        }
    }

    /// Number of contributions so far.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.pieces.len()
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash
            || self.checksum != other.checksum
            || self.pieces.len() != other.pieces.len()
        {
            return false;
        }
        // Positional, array-aware comparison resolves hash collisions.
        self.pieces == other.pieces
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.hash);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.checksum)?;
        for piece in &self.pieces {
            write!(f, ":{piece}")?;
        }
        Ok(())
    }
}

/// Stable per-contribution hash; NULL hashes to 1 like the reference rule.
fn piece_hash(piece: &Value) -> i64 {
    if piece.is_null() {
        return 1;
    }
    let mut hasher = DefaultHasher::new();
    piece.hash(&mut hasher);
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key_of(values: &[Value]) -> CacheKey {
        CacheKey::from_pieces(values.iter().cloned())
    }

    #[test]
    fn test_same_contributions_same_key() {
        let a = key_of(&[Value::Text("stmt".into()), Value::Int(0), Value::Int(512)]);
        let b = key_of(&[Value::Text("stmt".into()), Value::Int(0), Value::Int(512)]);
        assert_eq!(a, b);
        let mut hasher_a = DefaultHasher::new();
        let mut hasher_b = DefaultHasher::new();
        a.hash(&mut hasher_a);
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[test]
    fn test_reordered_contributions_differ() {
        let a = key_of(&[Value::Int(1), Value::Int(2)]);
        let b = key_of(&[Value::Int(2), Value::Int(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_count_participates_in_equality() {
        let a = key_of(&[Value::Int(1)]);
        let b = key_of(&[Value::Int(1), Value::Null]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_null_contribution_is_significant() {
        let a = key_of(&[Value::Null]);
        let b = key_of(&[Value::Null]);
        assert_eq!(a, b);
        assert_eq!(a.update_count(), 1);
    }

    #[test]
    fn test_array_pieces_compare_elementwise() {
        let a = key_of(&[Value::Array(vec![Value::Int(1), Value::Int(2)])]);
        let b = key_of(&[Value::Array(vec![Value::Int(1), Value::Int(2)])]);
        assert_eq!(a, b);
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_map(Value::Float),
            ".{0,12}".prop_map(Value::Text),
        ]
    }

    proptest! {
        #[test]
        fn prop_equality_is_reflexive(values in proptest::collection::vec(arb_value(), 0..8)) {
            let key = key_of(&values);
            prop_assert_eq!(&key, &key.clone());
        }

        #[test]
        fn prop_same_sequence_builds_equal_keys(values in proptest::collection::vec(arb_value(), 0..8)) {
            let a = key_of(&values);
            let b = key_of(&values);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_equal_keys_have_equal_hash(
            xs in proptest::collection::vec(arb_value(), 0..6),
            ys in proptest::collection::vec(arb_value(), 0..6),
        ) {
            let a = key_of(&xs);
            let b = key_of(&ys);
            if a == b {
                let mut ha = DefaultHasher::new();
                let mut hb = DefaultHasher::new();
                a.hash(&mut ha);
                b.hash(&mut hb);
                prop_assert_eq!(ha.finish(), hb.finish());
            }
        }
    }
}
