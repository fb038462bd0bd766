//! Color Assignment Enumeration
//!
//! Given a slot count `k` and a palette of `m` colors, every valid assignment
//! of palette colors to slots is produced lazily, in a fixed order determined
//! only by the palette's native ordering:
//!
//! | regime        | condition | tuples                          |
//! |---------------|-----------|---------------------------------|
//! | exact         | k == m    | m! permutations                 |
//! | undersupplied | k < m     | m!/(m-k)! k-permutations        |
//! | oversupplied  | k > m     | m^k - m, monochrome tuples removed |
//!
//! The first two share one routine (k-permutations of m).

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::color::HexColor;

/// Palette colors assigned positionally to a pattern's slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorTuple(Vec<HexColor>);

impl ColorTuple {
    pub fn new(colors: Vec<HexColor>) -> Self {
        Self(colors)
    }

    pub fn colors(&self) -> &[HexColor] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every entry is the same color.
    pub fn is_monochrome(&self) -> bool {
        match self.0.split_first() {
            Some((first, rest)) => rest.iter().all(|c| c == first),
            None => false,
        }
    }

    /// Uppercase `#RRGGBB` strings, in slot order.
    pub fn to_hex_strings(&self) -> Vec<String> {
        self.0.iter().map(|c| c.to_string()).collect()
    }
}

impl fmt::Display for ColorTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.to_hex_strings().join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationRegime {
    /// k == m
    Exact,
    /// k < m
    Undersupplied,
    /// k > m
    Oversupplied,
}

impl EnumerationRegime {
    /// `None` for degenerate input (`k == 0` or `m == 0`).
    pub fn select(k: usize, m: usize) -> Option<Self> {
        if k == 0 || m == 0 {
            return None;
        }
        Some(match k.cmp(&m) {
            std::cmp::Ordering::Equal => Self::Exact,
            std::cmp::Ordering::Less => Self::Undersupplied,
            std::cmp::Ordering::Greater => Self::Oversupplied,
        })
    }
}

pub type ColorTuples<'a> = Box<dyn Iterator<Item = ColorTuple> + 'a>;

/// Enumerate every valid color tuple for `k` slots over `palette`.
///
/// Each call builds a fresh iterator; the sequence is identical across calls.
/// Palette entries are taken positionally, duplicates are not collapsed.
pub fn enumerate(k: usize, palette: &[HexColor]) -> ColorTuples<'_> {
    match EnumerationRegime::select(k, palette.len()) {
        None => Box::new(std::iter::empty()),
        Some(EnumerationRegime::Exact | EnumerationRegime::Undersupplied) => {
            Box::new(k_permutations(k, palette))
        }
        Some(EnumerationRegime::Oversupplied) => Box::new(cartesian_power(k, palette)),
    }
}

fn k_permutations(k: usize, palette: &[HexColor]) -> impl Iterator<Item = ColorTuple> + '_ {
    palette.iter().copied().permutations(k).map(ColorTuple)
}

fn cartesian_power(k: usize, palette: &[HexColor]) -> impl Iterator<Item = ColorTuple> + '_ {
    (0..k)
        .map(|_| palette.iter().copied())
        .multi_cartesian_product()
        .map(ColorTuple)
        .filter(|t| !t.is_monochrome())
}

/// Number of tuples `enumerate(k, palette)` yields for a palette of `m`
/// distinct colors. `None` on overflow.
pub fn tuple_count(k: usize, m: usize) -> Option<u128> {
    let (k128, m128) = (k as u128, m as u128);
    match EnumerationRegime::select(k, m)? {
        EnumerationRegime::Exact | EnumerationRegime::Undersupplied => {
            ((m128 - k128 + 1)..=m128).try_fold(1u128, |acc, f| acc.checked_mul(f))
        }
        EnumerationRegime::Oversupplied => {
            let k32 = u32::try_from(k).ok()?;
            m128.checked_pow(k32)?.checked_sub(m128)
        }
    }
}
