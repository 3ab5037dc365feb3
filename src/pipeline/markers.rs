//! Marker symbol assignment for chart series
//!
//! Every active series key in a render gets one symbol from a fixed, ordered
//! [`PALETTE`]. Keys are de-duplicated and sorted lexicographically, then the
//! palette is walked cyclically: key `i` gets `palette[i % PALETTE.len()]`.
//!
//! - The same set of keys always yields the same assignment
//! - Up to `PALETTE.len()` keys never share a symbol
//! - Beyond that, symbols repeat from the start of the palette

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Marker shapes available to charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerSymbol {
    Circle,
    Diamond,
    Square,
    Cross,
    Plus,
    Up,
    Down,
    Left,
    Right,
    Asterisk,
}

impl MarkerSymbol {
    pub fn display_name(&self) -> &'static str {
        match self {
            MarkerSymbol::Circle => "Circle",
            MarkerSymbol::Diamond => "Diamond",
            MarkerSymbol::Square => "Square",
            MarkerSymbol::Cross => "Cross",
            MarkerSymbol::Plus => "Plus",
            MarkerSymbol::Up => "Triangle up",
            MarkerSymbol::Down => "Triangle down",
            MarkerSymbol::Left => "Triangle left",
            MarkerSymbol::Right => "Triangle right",
            MarkerSymbol::Asterisk => "Asterisk",
        }
    }
}

/// Fixed palette, in assignment order
pub const PALETTE: [MarkerSymbol; 10] = [
    MarkerSymbol::Circle,
    MarkerSymbol::Diamond,
    MarkerSymbol::Square,
    MarkerSymbol::Cross,
    MarkerSymbol::Plus,
    MarkerSymbol::Up,
    MarkerSymbol::Down,
    MarkerSymbol::Left,
    MarkerSymbol::Right,
    MarkerSymbol::Asterisk,
];

/// Series key → marker symbol for one render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolAssignment {
    symbols: BTreeMap<String, MarkerSymbol>,
}

impl SymbolAssignment {
    pub fn get(&self, key: &str) -> Option<MarkerSymbol> {
        self.symbols.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, MarkerSymbol)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether two keys share a symbol
    pub fn has_collisions(&self) -> bool {
        let distinct: BTreeSet<MarkerSymbol> = self.symbols.values().copied().collect();
        distinct.len() < self.symbols.len()
    }
}

/// Canonical (sorted, de-duplicated) form of a key set
pub fn canonical_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|k| k.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn assign_from_palette(keys: Vec<String>, palette: &[MarkerSymbol]) -> SymbolAssignment {
    let symbols = keys
        .into_iter()
        .enumerate()
        .map(|(i, key)| (key, palette[i % palette.len()]))
        .collect();
    SymbolAssignment { symbols }
}

/// Strategy mapping active series keys to symbols
pub trait MarkerStrategy: Send + Sync {
    fn assign(&self, keys: &[String]) -> SymbolAssignment;
}

/// Deterministic assignment: sorted keys, palette walked cyclically
#[derive(Debug, Clone, Copy, Default)]
pub struct CyclicMarkers;

impl MarkerStrategy for CyclicMarkers {
    fn assign(&self, keys: &[String]) -> SymbolAssignment {
        assign_from_palette(canonical_keys(keys), &PALETTE)
    }
}

/// Palette shuffled before the cyclic walk
///
/// Collision-free up to the palette size like [`CyclicMarkers`], but only
/// reproducible when a seed is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomMarkers {
    seed: Option<u64>,
}

impl RandomMarkers {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl MarkerStrategy for RandomMarkers {
    fn assign(&self, keys: &[String]) -> SymbolAssignment {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut palette = PALETTE;
        match self.seed {
            Some(seed) => palette.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed)),
            None => palette.shuffle(&mut rand::thread_rng()),
        }
        assign_from_palette(canonical_keys(keys), &palette)
    }
}

/// Assign symbols with the default cyclic strategy
pub fn assign<I, S>(keys: I) -> SymbolAssignment
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    assign_from_palette(canonical_keys(keys), &PALETTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("TI{:02}_X", i)).collect()
    }

    #[test]
    fn test_palette_is_distinct() {
        let distinct: BTreeSet<_> = PALETTE.iter().collect();
        assert_eq!(distinct.len(), PALETTE.len());
        assert!(PALETTE.len() >= 10);
    }

    #[test]
    fn test_wraparound_after_palette() {
        let assignment = assign(keys(12));
        assert_eq!(assignment.len(), 12);
        assert_eq!(assignment.get("TI11_X"), assignment.get("TI01_X"));
        assert_eq!(assignment.get("TI12_X"), assignment.get("TI02_X"));
        assert_eq!(assignment.get("TI01_X"), Some(MarkerSymbol::Circle));
        assert!(assignment.has_collisions());
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let assignment = assign(["TI1_Y", "TI1_X", "TI1_X"]);
        assert_eq!(assignment.len(), 2);
        assert_eq!(assignment.get("TI1_X"), Some(MarkerSymbol::Circle));
        assert_eq!(assignment.get("TI1_Y"), Some(MarkerSymbol::Diamond));
    }

    #[test]
    fn test_empty() {
        assert!(assign(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_seeded_random_is_reproducible_and_injective() {
        let strategy = RandomMarkers::new(Some(42));
        let first = strategy.assign(&keys(10));
        let second = strategy.assign(&keys(10));
        assert_eq!(first, second);
        assert!(!first.has_collisions());
    }

    #[test]
    fn test_unseeded_random_is_injective() {
        let assignment = RandomMarkers::new(None).assign(&keys(8));
        assert_eq!(assignment.len(), 8);
        assert!(!assignment.has_collisions());
    }

    proptest! {
        #[test]
        fn test_assignment_is_order_independent(
            mut input in prop::collection::vec("[A-Z0-9]{1,4}_(X|Y)", 0..25),
            rotate in 0usize..25
        ) {
            let original = CyclicMarkers.assign(&input);
            if !input.is_empty() {
                let by = rotate % input.len();
                input.rotate_left(by);
            }
            input.reverse();
            prop_assert_eq!(original, CyclicMarkers.assign(&input));
        }

        #[test]
        fn test_injective_within_palette(
            input in prop::collection::btree_set("[A-Z0-9]{1,4}_(X|Y)", 0..=10)
        ) {
            let keys: Vec<String> = input.into_iter().collect();
            let assignment = assign(&keys);
            prop_assert_eq!(assignment.len(), keys.len());
            prop_assert!(!assignment.has_collisions());
        }
    }
}
