use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A price-level key.
///
/// Prices are opaque real numbers: no tick normalization, no epsilon
/// tolerance. Two prices are the same level iff they compare equal under
/// [`f64::total_cmp`], which gives `f64` the total order `Ord`/`Eq` need
/// without silently merging distinct bit patterns the way a `PartialEq`
/// shim over `==` would for e.g. `-0.0` and `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct Price(pub f64);

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Price {}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Bit-pattern hash to stay consistent with the bit-pattern `Eq`
        // above (`total_cmp` distinguishes e.g. `-0.0` from `0.0`, so a
        // plain `==`-based hash would violate the Hash/Eq contract).
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Price {
    fn from(value: f64) -> Self {
        Price(value)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
